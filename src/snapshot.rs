//! 读快照：列元数据 + 分区状态 + 扁平 region 列表 + 符号字典
//!
//! 快照构建完成后不可变，可在多个线程间共享；每个线程持有自己的
//! `TableRecord` / 游标，通过 `ColumnSource` 读取 region。

use std::fmt;
use std::path::Path;
use log::debug;
use crate::column_writer::{data_file_name, index_file_name, ColumnWriter};
use crate::common::{
    ColumnIndex, ColumnType, PartitionIndex, ReadError, RegionIndex, Result, RowId, RowNumber,
};
use crate::config::ReaderConfig;
use crate::field_type::{ColumnMeta, Value};
use crate::memory::{ColumnMemory, ReadMemory};
use crate::resolver::{column_base_of, SLOTS_PER_COLUMN};
use crate::symbol::{SymbolMap, SymbolTable};

// ── ColumnSource ──────────────────────────────────────────────────────────────

/// region / column top / 字典的提供方
pub trait ColumnSource: Sync {
    fn column_count(&self) -> usize;
    fn column_type(&self, column: ColumnIndex) -> Option<ColumnType>;
    fn column_name(&self, column: ColumnIndex) -> Option<&str>;

    fn partition_count(&self) -> usize;
    fn partition_row_count(&self, partition: PartitionIndex) -> RowNumber;

    fn column_base(&self, partition: PartitionIndex) -> usize {
        column_base_of(partition as usize, self.column_count())
    }

    fn partition_index(&self, column_base: usize) -> PartitionIndex {
        let width = self.column_count() * SLOTS_PER_COLUMN;
        if width == 0 { 0 } else { (column_base / width) as PartitionIndex }
    }

    /// 非负；列在该分区自第 `column_top` 行起才有数据
    fn column_top(&self, column_base: usize, column: ColumnIndex) -> i64;

    fn region(&self, index: RegionIndex) -> Option<&dyn ReadMemory>;

    fn symbol_table(&self, column: ColumnIndex) -> Option<&dyn SymbolTable>;

    fn config(&self) -> &ReaderConfig;
}

// ── TableSnapshot ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct PartitionState {
    row_count:   RowNumber,
    column_tops: Vec<i64>,
}

pub struct TableSnapshot {
    columns:    Vec<ColumnMeta>,
    partitions: Vec<PartitionState>,
    regions:    Vec<ColumnMemory>,
    symbols:    Vec<Option<Box<dyn SymbolTable>>>,
    config:     ReaderConfig,
}

impl TableSnapshot {
    pub fn columns(&self) -> &[ColumnMeta] { &self.columns }

    pub fn column_index(&self, name: &str) -> Option<ColumnIndex> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn total_rows(&self) -> RowNumber {
        self.partitions.iter().map(|p| p.row_count).sum()
    }
}

impl fmt::Debug for TableSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableSnapshot")
            .field("columns", &self.columns)
            .field("partitions", &self.partitions)
            .field("regions", &self.regions.len())
            .field("config", &self.config)
            .finish()
    }
}

impl ColumnSource for TableSnapshot {
    fn column_count(&self) -> usize { self.columns.len() }

    fn column_type(&self, column: ColumnIndex) -> Option<ColumnType> {
        self.columns.get(column).map(|c| c.column_type)
    }

    fn column_name(&self, column: ColumnIndex) -> Option<&str> {
        self.columns.get(column).map(|c| c.name.as_str())
    }

    fn partition_count(&self) -> usize { self.partitions.len() }

    fn partition_row_count(&self, partition: PartitionIndex) -> RowNumber {
        self.partitions.get(partition as usize).map_or(0, |p| p.row_count)
    }

    fn column_top(&self, column_base: usize, column: ColumnIndex) -> i64 {
        let p = self.partition_index(column_base) as usize;
        self.partitions.get(p)
            .and_then(|p| p.column_tops.get(column))
            .copied()
            .unwrap_or(0)
    }

    fn region(&self, index: RegionIndex) -> Option<&dyn ReadMemory> {
        self.regions.get(index).map(|r| r as &dyn ReadMemory)
    }

    fn symbol_table(&self, column: ColumnIndex) -> Option<&dyn SymbolTable> {
        self.symbols.get(column).and_then(|s| s.as_deref())
    }

    fn config(&self) -> &ReaderConfig { &self.config }
}

// ── TableSnapshotBuilder ──────────────────────────────────────────────────────

/// 逐分区组装快照；分区按添加顺序编号
pub struct TableSnapshotBuilder {
    columns:    Vec<ColumnMeta>,
    partitions: Vec<PartitionState>,
    regions:    Vec<ColumnMemory>,
    dicts:      Vec<SymbolMap>,
    external:   Vec<Option<Box<dyn SymbolTable>>>,
    config:     ReaderConfig,
}

impl TableSnapshotBuilder {
    pub fn new(columns: Vec<ColumnMeta>) -> Self {
        let n = columns.len();
        Self {
            columns,
            partitions: Vec::new(),
            regions:    Vec::new(),
            dicts:      (0..n).map(|_| SymbolMap::new()).collect(),
            external:   (0..n).map(|_| None).collect(),
            config:     ReaderConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    /// 用外部字典替代内置 `SymbolMap`；只对映射分区有意义
    pub fn with_symbol_table(mut self, column: ColumnIndex, table: Box<dyn SymbolTable>) -> Self {
        if let Some(slot) = self.external.get_mut(column) {
            *slot = Some(table);
        }
        self
    }

    /// 预先写入字典值，使 key 与外部约定一致
    pub fn with_symbols<I, S>(mut self, column: ColumnIndex, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some(dict) = self.dicts.get_mut(column) {
            for v in values { dict.intern(v.as_ref()); }
        }
        self
    }

    fn check_tops(&self, column_tops: &[i64]) -> Result<()> {
        if column_tops.len() != self.columns.len() {
            return Err(ReadError::Malformed(format!(
                "expected {} column tops, got {}", self.columns.len(), column_tops.len()
            )));
        }
        if let Some(t) = column_tops.iter().find(|&&t| t < 0) {
            return Err(ReadError::Malformed(format!("negative column top {t}")));
        }
        Ok(())
    }

    /// 由内存中的行构建一个分区；`column_tops` 之前的单元格被忽略
    pub fn add_partition<I>(&mut self, column_tops: &[i64], rows: I) -> Result<PartitionIndex>
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        self.check_tops(column_tops)?;
        let mut writers: Vec<ColumnWriter> = self.columns.iter()
            .zip(column_tops)
            .map(|(m, &top)| ColumnWriter::new(m.clone()).with_column_top(top))
            .collect();

        let mut row_count: RowNumber = 0;
        for row in rows {
            if row.len() != writers.len() {
                return Err(ReadError::Malformed(format!(
                    "row {row_count} has {} values, table has {} columns", row.len(), writers.len()
                )));
            }
            for ((w, value), dict) in writers.iter_mut().zip(&row).zip(self.dicts.iter_mut()) {
                w.add_value(value, Some(dict))?;
            }
            row_count += 1;
        }

        self.check_capacity(row_count)?;
        for w in writers {
            let (primary, secondary) = w.finalize();
            self.regions.push(ColumnMemory::from_vec(primary));
            self.regions.push(ColumnMemory::from_vec(secondary));
        }
        Ok(self.push_partition(row_count, column_tops))
    }

    /// 映射分区目录中的列文件（`<name>.d` / `<name>.i`）
    pub fn map_partition_dir(
        &mut self,
        dir: &Path,
        row_count: RowNumber,
        column_tops: &[i64],
    ) -> Result<PartitionIndex> {
        self.check_tops(column_tops)?;
        self.check_capacity(row_count)?;
        let populate = self.config.populate_mappings;
        let mut mapped = Vec::with_capacity(self.columns.len() * SLOTS_PER_COLUMN);
        for c in &self.columns {
            let data = ColumnMemory::map_file(dir.join(data_file_name(&c.name)), populate)?;
            let index = if c.column_type.is_var_length() {
                ColumnMemory::map_file(dir.join(index_file_name(&c.name)), populate)?
            } else {
                ColumnMemory::empty()
            };
            mapped.push(data);
            mapped.push(index);
        }
        self.regions.extend(mapped);
        let p = self.push_partition(row_count, column_tops);
        debug!("mapped partition {} from {} ({} rows)", p, dir.display(), row_count);
        Ok(p)
    }

    /// 下一个分区的最后一行必须能打包进 RowId
    fn check_capacity(&self, row_count: RowNumber) -> Result<()> {
        if row_count < 0 {
            return Err(ReadError::Malformed(format!("negative row count {row_count}")));
        }
        let next = PartitionIndex::try_from(self.partitions.len()).unwrap_or(PartitionIndex::MAX);
        RowId::try_new(next, (row_count - 1).max(0)).map(drop)
    }

    fn push_partition(&mut self, row_count: RowNumber, column_tops: &[i64]) -> PartitionIndex {
        self.partitions.push(PartitionState { row_count, column_tops: column_tops.to_vec() });
        (self.partitions.len() - 1) as PartitionIndex
    }

    pub fn build(self) -> TableSnapshot {
        let symbols = self.columns.iter()
            .zip(self.external)
            .zip(self.dicts)
            .map(|((c, ext), dict)| match (c.column_type, ext) {
                (_, Some(ext))           => Some(ext),
                (ColumnType::Symbol, None) => Some(Box::new(dict) as Box<dyn SymbolTable>),
                _                        => None,
            })
            .collect();
        let snapshot = TableSnapshot {
            columns:    self.columns,
            partitions: self.partitions,
            regions:    self.regions,
            symbols,
            config:     self.config,
        };
        debug!(
            "built snapshot: {} columns, {} partitions, {} rows",
            snapshot.columns.len(), snapshot.partitions.len(), snapshot.total_rows()
        );
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<ColumnMeta> {
        vec![
            ColumnMeta::new(0, "ts",  ColumnType::Timestamp),
            ColumnMeta::new(1, "ccy", ColumnType::Symbol),
            ColumnMeta::new(2, "memo", ColumnType::String),
        ]
    }

    fn row(ts: i64, ccy: &str, memo: Option<&str>) -> Vec<Value> {
        vec![
            Value::Timestamp(ts),
            Value::Symbol(ccy.into()),
            memo.map_or(Value::Null, |m| Value::Str(m.into())),
        ]
    }

    #[test]
    fn partitions_beyond_row_id_range_are_rejected() {
        use crate::common::MAX_LOCAL_ROW;
        let mut b = TableSnapshotBuilder::new(schema());
        let err = b.map_partition_dir(Path::new("/no/such/dir"), MAX_LOCAL_ROW + 2, &[0, 0, 0]).unwrap_err();
        assert!(matches!(err, ReadError::RowIdOutOfRange { partition: 0, .. }), "{err}");
        let err = b.map_partition_dir(Path::new("/no/such/dir"), -1, &[0, 0, 0]).unwrap_err();
        assert!(matches!(err, ReadError::Malformed(_)), "{err}");
        assert_eq!(b.build().partition_count(), 0);
    }

    #[test]
    fn partitions_get_consecutive_column_bases() {
        let mut b = TableSnapshotBuilder::new(schema());
        b.add_partition(&[0, 0, 0], vec![row(1, "eur", None)]).unwrap();
        b.add_partition(&[0, 0, 1], vec![row(2, "usd", None), row(3, "eur", Some("x"))]).unwrap();
        let snap = b.build();

        assert_eq!(snap.partition_count(), 2);
        assert_eq!(snap.total_rows(), 3);
        assert_eq!(snap.column_base(1), 6);
        assert_eq!(snap.partition_index(6), 1);
        assert_eq!(snap.column_top(6, 2), 1);
        assert_eq!(snap.column_top(0, 2), 0);
        assert_eq!(snap.region(6).unwrap().size(), 16);
        assert!(snap.region(12).is_none());
        assert_eq!(snap.symbol_table(1).unwrap().size(), 2);
        assert!(snap.symbol_table(0).is_none());
        assert_eq!(snap.column_index("memo"), Some(2));
    }

    #[test]
    fn rejects_inconsistent_partitions() {
        let mut b = TableSnapshotBuilder::new(schema());
        assert!(b.add_partition(&[0, 0], Vec::<Vec<Value>>::new()).is_err());
        assert!(b.add_partition(&[0, -1, 0], Vec::<Vec<Value>>::new()).is_err());
        let short = vec![vec![Value::Timestamp(1)]];
        assert!(matches!(b.add_partition(&[0, 0, 0], short), Err(ReadError::Malformed(_))));
    }

    #[test]
    fn maps_partition_directories() {
        let dir = tempfile::tempdir().unwrap();
        let cols = schema();
        let mut dict = SymbolMap::new();
        let mut writers: Vec<ColumnWriter> = cols.iter().cloned().map(ColumnWriter::new).collect();
        for r in [row(10, "eur", Some("a")), row(20, "gbp", None)] {
            for (w, v) in writers.iter_mut().zip(&r) {
                w.add_value(v, Some(&mut dict)).unwrap();
            }
        }
        for w in writers { w.write_files(dir.path()).unwrap(); }

        let mut b = TableSnapshotBuilder::new(cols)
            .with_config(ReaderConfig::default().with_populate_mappings(true))
            .with_symbol_table(1, Box::new(dict));
        let p = b.map_partition_dir(dir.path(), 2, &[0, 0, 0]).unwrap();
        let snap = b.build();

        assert_eq!(p, 0);
        assert_eq!(snap.region(0).unwrap().get_long(8).unwrap(), 20);
        assert_eq!(snap.symbol_table(1).unwrap().value_of(1), Some("gbp"));
        assert_eq!(snap.region(5).unwrap().get_long(8).unwrap(), 6);

        let mut missing = TableSnapshotBuilder::new(schema());
        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(
            missing.map_partition_dir(empty.path(), 0, &[0, 0, 0]),
            Err(ReadError::Io(_))
        ));
    }
}
