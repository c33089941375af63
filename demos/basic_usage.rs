//! # olap-column-reader 使用案例
//!
//! 演示读路径的核心功能：
//!
//! 1. 定义表结构并构建内存分区（含 column top）
//! 2. 写出列文件并以 mmap 方式加载第二个分区
//! 3. 正向扫描全表，按列类型读取
//! 4. column top 之前的行读出 NULL
//! 5. A / B 双路径读取同一列的两个值
//! 6. latest-by-value 查找（带截止时间）
//! 7. UTF-8 编解码工具

use std::time::Duration;

use olap_column_reader::{
    cancel::Deadline,
    column_writer::ColumnWriter,
    common::ColumnType,
    cursor::{
        DataFrameRowCursorFactory, FrameList, LatestByValueCursor, ScanDirection, TableRowCursor,
    },
    field_type::{ColumnMeta, Value},
    symbol::SymbolMap,
    utf8,
    ColumnRef, ColumnSource, ReaderConfig, TableRecord, TableSnapshotBuilder,
};

const SYMBOLS: [&str; 3] = ["btc", "eth", "sol"];

fn main() -> olap_column_reader::Result<()> {
    println!("═══════════════════════════════════════════════════════════");
    println!("   olap-column-reader 读路径演示                            ");
    println!("═══════════════════════════════════════════════════════════\n");

    // =========================================================================
    // 1. 表结构 + 内存分区
    // =========================================================================
    println!("【1】构建内存分区 p0 ...");
    // trades (ts TIMESTAMP, sym SYMBOL, price DOUBLE, note VARCHAR, src IPv4, qty INT)
    // qty 列在 p0 写入 3 行之后才加入表
    let schema = vec![
        ColumnMeta::new(0, "ts",    ColumnType::Timestamp),
        ColumnMeta::new(1, "sym",   ColumnType::Symbol),
        ColumnMeta::new(2, "price", ColumnType::Double),
        ColumnMeta::new(3, "note",  ColumnType::Varchar),
        ColumnMeta::new(4, "src",   ColumnType::IPv4),
        ColumnMeta::new(5, "qty",   ColumnType::Int),
    ];

    let trade = |ts: i64, sym: &str, price: f64, note: Option<&str>, qty: Option<i32>| vec![
        Value::Timestamp(ts),
        Value::Symbol(sym.into()),
        Value::Double(price),
        note.map_or(Value::Null, |n| Value::Varchar(n.into())),
        Value::IPv4(0x0A00_0000 | ts as i32),
        qty.map_or(Value::Null, Value::Int),
    ];

    let mut builder = TableSnapshotBuilder::new(schema.clone())
        .with_config(ReaderConfig::default().with_populate_mappings(true))
        .with_symbols(1, SYMBOLS);

    builder.add_partition(&[0, 0, 0, 0, 0, 3], vec![
        trade(1, "btc", 64_000.5, Some("open"), None),
        trade(2, "eth", 3_100.0, None, None),
        trade(3, "btc", 64_010.0, Some("größer"), None),
        trade(4, "sol", 150.25, Some("ascii"), Some(10)),
        trade(5, "eth", 3_105.5, None, Some(20)),
    ])?;
    println!("    ✓ p0: 5 行，qty column top = 3\n");

    // =========================================================================
    // 2. 写出列文件，mmap 加载 p1
    // =========================================================================
    println!("【2】写出 p1 列文件并映射 ...");
    let dir = std::env::temp_dir().join(format!("olap-column-reader-demo-{}", std::process::id()));
    std::fs::create_dir_all(&dir).map_err(|e| olap_column_reader::ReadError::Io(e.to_string()))?;

    let mut dict = SymbolMap::from_values(SYMBOLS);
    let mut writers: Vec<ColumnWriter> = schema.iter().cloned().map(ColumnWriter::new).collect();
    let p1_rows = vec![
        trade(11, "sol", 151.0, Some("p1"), Some(1)),
        trade(12, "btc", 64_100.0, None, Some(2)),
        trade(13, "sol", 152.5, Some("last"), Some(3)),
    ];
    for row in &p1_rows {
        for (w, v) in writers.iter_mut().zip(row) {
            w.add_value(v, Some(&mut dict))?;
        }
    }
    for w in writers {
        w.write_files(&dir)?;
    }
    builder.map_partition_dir(&dir, p1_rows.len() as i64, &[0; 6])?;
    let snapshot = builder.build();
    println!("    dir        = {}", dir.display());
    println!("    partitions = {}", snapshot.partition_count());
    println!("    total rows = {}\n", snapshot.total_rows());

    // =========================================================================
    // 3. 全表正向扫描
    // =========================================================================
    println!("【3】全表正向扫描 ...");
    let factory = DataFrameRowCursorFactory::new(ScanDirection::Forward);
    println!("    plan: {}", factory.plan());

    let mut record = TableRecord::new(&snapshot);
    let refs: Vec<ColumnRef> = (0..record.column_count())
        .map(|i| ColumnRef::of(&record, i))
        .collect::<olap_column_reader::Result<_>>()?;

    let cursor = TableRowCursor::new(FrameList::of_source(&snapshot, ScanDirection::Forward), factory);
    for id in cursor {
        record.jump_to_row_id(id);
        let cells = refs.iter()
            .map(|r| r.read(&record).map(|v| v.to_string()))
            .collect::<olap_column_reader::Result<Vec<_>>>()?;
        println!("    {id:>5}  {}", cells.join(" | "));
    }
    println!();

    // =========================================================================
    // 4. column top
    // =========================================================================
    println!("【4】column top 之前的行 ...");
    for row in [1, 4] {
        record.jump_to(0, row);
        println!("    p0 row {row}: qty = {}", record.get_value(5)?);
    }
    println!();

    // =========================================================================
    // 5. A / B 双路径
    // =========================================================================
    println!("【5】A / B 读取 ...");
    record.jump_to(0, 0);
    let note_a = record.get_varchar_a(3)?;
    let sym_a  = record.get_sym_a(1)?;
    record.jump_to(0, 2);
    let note_b = record.get_varchar_b(3)?;
    let sym_b  = record.get_sym_b(1)?;
    println!("    A: sym={sym_a:?} note={:?}", note_a.map(|v| v.to_string_checked()).transpose()?);
    println!("    B: sym={sym_b:?} note={:?}", note_b.map(|v| v.to_string_checked()).transpose()?);
    println!(
        "    compare(A, B) = {:?}\n",
        utf8::compare(note_a.map(|v| v.bytes()), note_b.map(|v| v.bytes()))
    );

    // =========================================================================
    // 6. latest-by-value
    // =========================================================================
    println!("【6】latest-by-value ...");
    for sym in ["btc", "eth", "doge"] {
        let frames = FrameList::of_source(&snapshot, ScanDirection::Backward);
        let signal = Deadline::after(Duration::from_secs(5));
        let mut latest = LatestByValueCursor::for_value(&snapshot, frames, 1, sym, signal)?;
        if latest.has_next()? {
            let r = latest.record();
            println!("    {sym:<4} → row {} ts={} price={}", r.row_id(), r.get_timestamp(0)?, r.get_double(2)?);
        } else {
            println!("    {sym:<4} → 未找到");
        }
    }
    println!();

    // =========================================================================
    // 7. UTF-8 工具
    // =========================================================================
    println!("【7】UTF-8 编解码 ...");
    let bytes = "aé😀".as_bytes();
    let mut units: Vec<u16> = Vec::new();
    utf8::decode(bytes, &mut units)?;
    println!("    validate(\"aé😀\") = {} 字符, {} 个 UTF-16 code unit", utf8::validate(bytes)?, units.len());
    match utf8::validate(&[0xE0, 0x80, 0x80]) {
        Ok(n)  => println!("    overlong 序列意外通过: {n}"),
        Err(e) => println!("    overlong 序列被拒绝: {e}"),
    }
    println!("    hash_code(\"btc\") = {}", utf8::hash_code(b"btc"));

    let _ = std::fs::remove_dir_all(&dir);

    println!("\n═══════════════════════════════════════════════════════════");
    println!("   全部演示完成 ✓");
    println!("═══════════════════════════════════════════════════════════");
    Ok(())
}
