//! 行视图：游标定位到 (partition, row) 后，按列序号读取类型化值
//!
//! 视图本身不拥有数据，只借用快照；返回的字符串 / 二进制 / 符号视图的生命周期
//! 绑定快照而非视图，因此 A、B 两条读取路径得到的值可以同时存活。

use std::fmt;
use crate::common::{
    ColumnIndex, ColumnType, PartitionIndex, ReadError, Result, RowId, RowNumber,
    GEO_BYTE_NULL, GEO_INT_NULL, GEO_LONG_NULL, GEO_SHORT_NULL, INT_NULL, IPV4_NULL, LONG_NULL,
};
use crate::field_type::{ipv4_to_long, write_ipv4, Long128, Long256, Value};
use crate::memory::{NullMemory, ReadMemory};
use crate::resolver::{primary_column_index, resolve, Resolved};
use crate::snapshot::ColumnSource;
use crate::utf8::{Utf16Sink, Utf8View};
use crate::varlen::Utf16View;

static NULL_MEMORY: NullMemory = NullMemory;

pub struct TableRecord<'a, S: ColumnSource + ?Sized> {
    source:      &'a S,
    /// 查询可见列序号 → 表列序号
    projection:  Option<Vec<ColumnIndex>>,
    partition:   PartitionIndex,
    column_base: usize,
    row:         RowNumber,
}

impl<'a, S: ColumnSource + ?Sized> TableRecord<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source, projection: None, partition: 0, column_base: 0, row: 0 }
    }

    pub fn with_projection(mut self, columns: Vec<ColumnIndex>) -> Self {
        self.projection = Some(columns);
        self
    }

    /// 重新绑定到另一个快照，位置归零
    pub fn of(&mut self, source: &'a S) {
        self.source = source;
        self.jump_to(0, 0);
    }

    pub fn jump_to(&mut self, partition: PartitionIndex, row: RowNumber) {
        self.partition   = partition;
        self.column_base = self.source.column_base(partition);
        self.row         = row;
    }

    pub fn jump_to_row_id(&mut self, id: RowId) { self.jump_to(id.partition(), id.local_row()); }

    pub fn set_row(&mut self, row: RowNumber) { self.row = row; }
    pub fn increment_row(&mut self) { self.row += 1; }

    pub fn partition_index(&self) -> PartitionIndex { self.partition }
    pub fn row(&self) -> RowNumber { self.row }
    pub fn row_id(&self) -> RowId { RowId::new(self.partition, self.row) }
    pub fn update_row_id(&self) -> RowId { self.row_id() }
    pub fn source(&self) -> &'a S { self.source }

    pub fn column_count(&self) -> usize {
        self.projection.as_ref().map_or(self.source.column_count(), Vec::len)
    }

    pub fn column_type(&self, col: ColumnIndex) -> Result<ColumnType> {
        let (_, t) = self.deref_column(col)?;
        Ok(t)
    }

    // ── 地址解析 ──

    fn deref_column(&self, col: ColumnIndex) -> Result<(ColumnIndex, ColumnType)> {
        let count = self.column_count();
        let table_col = match &self.projection {
            Some(p) => p.get(col).copied(),
            None    => Some(col).filter(|&c| c < count),
        }
        .ok_or(ReadError::ColumnOutOfBounds { column: col, count })?;
        let t = self.source.column_type(table_col).ok_or(ReadError::ColumnOutOfBounds {
            column: table_col,
            count:  self.source.column_count(),
        })?;
        Ok((table_col, t))
    }

    fn checked(&self, col: ColumnIndex, accepts: &[ColumnType], expected: &'static str)
        -> Result<(ColumnIndex, ColumnType)>
    {
        let (table_col, t) = self.deref_column(col)?;
        if accepts.contains(&t) {
            Ok((table_col, t))
        } else {
            Err(ReadError::TypeMismatch { column: col, expected, actual: t })
        }
    }

    fn region(&self, index: usize) -> Result<&'a dyn ReadMemory> {
        let source: &'a S = self.source;
        source.region(index)
            .ok_or_else(|| ReadError::Malformed(format!("region {index} is not mapped")))
    }

    /// 定长 / 符号列：列不存在时落到 `NullMemory` 偏移 0
    fn fixed(&self, col: ColumnIndex, accepts: &[ColumnType], expected: &'static str)
        -> Result<(&'a dyn ReadMemory, u64)>
    {
        match self.locate(col, accepts, expected)? {
            Resolved::Present { region, offset } => Ok((self.region(region)?, offset)),
            Resolved::Absent                     => Ok((&NULL_MEMORY as &dyn ReadMemory, 0)),
        }
    }

    fn locate(&self, col: ColumnIndex, accepts: &[ColumnType], expected: &'static str) -> Result<Resolved> {
        let (table_col, t) = self.checked(col, accepts, expected)?;
        let top = self.source.column_top(self.column_base, table_col);
        Ok(resolve(self.column_base, table_col, t, self.row, top))
    }

    /// 变长列：读 index region 中的负载偏移，返回 data region 与该偏移
    fn var(&self, col: ColumnIndex, t: ColumnType, expected: &'static str) -> Result<(&'a dyn ReadMemory, i64)> {
        match self.locate(col, &[t], expected)? {
            Resolved::Present { region, offset } => {
                let data_offset = self.region(region)?.get_long(offset)?;
                Ok((self.region(region - 1)?, data_offset))
            }
            Resolved::Absent => Ok((&NULL_MEMORY as &dyn ReadMemory, 0)),
        }
    }

    // ── 定长标量 ──

    pub fn get_bool(&self, col: ColumnIndex) -> Result<bool> {
        let (m, off) = self.fixed(col, &[ColumnType::Boolean], "BOOLEAN")?;
        m.get_bool(off)
    }

    pub fn get_byte(&self, col: ColumnIndex) -> Result<i8> {
        let (m, off) = self.fixed(col, &[ColumnType::Byte], "BYTE")?;
        m.get_byte(off)
    }

    pub fn get_short(&self, col: ColumnIndex) -> Result<i16> {
        let (m, off) = self.fixed(col, &[ColumnType::Short], "SHORT")?;
        m.get_short(off)
    }

    pub fn get_char(&self, col: ColumnIndex) -> Result<u16> {
        let (m, off) = self.fixed(col, &[ColumnType::Char], "CHAR")?;
        m.get_char(off)
    }

    pub fn get_int(&self, col: ColumnIndex) -> Result<i32> {
        let (m, off) = self.fixed(col, &[ColumnType::Int], "INT")?;
        m.get_int(off)
    }

    /// LONG，以及同为 8 字节整数的 DATE / TIMESTAMP
    pub fn get_long(&self, col: ColumnIndex) -> Result<i64> {
        let (m, off) = self.fixed(
            col, &[ColumnType::Long, ColumnType::Date, ColumnType::Timestamp], "LONG",
        )?;
        m.get_long(off)
    }

    pub fn get_date(&self, col: ColumnIndex) -> Result<i64> {
        let (m, off) = self.fixed(col, &[ColumnType::Date], "DATE")?;
        m.get_long(off)
    }

    pub fn get_timestamp(&self, col: ColumnIndex) -> Result<i64> {
        let (m, off) = self.fixed(col, &[ColumnType::Timestamp], "TIMESTAMP")?;
        m.get_long(off)
    }

    pub fn get_float(&self, col: ColumnIndex) -> Result<f32> {
        let (m, off) = self.fixed(col, &[ColumnType::Float], "FLOAT")?;
        m.get_float(off)
    }

    pub fn get_double(&self, col: ColumnIndex) -> Result<f64> {
        let (m, off) = self.fixed(col, &[ColumnType::Double], "DOUBLE")?;
        m.get_double(off)
    }

    pub fn get_ipv4(&self, col: ColumnIndex) -> Result<i32> {
        let (m, off) = self.fixed(col, &[ColumnType::IPv4], "IPv4")?;
        m.get_ipv4(off)
    }

    pub fn get_long_ipv4(&self, col: ColumnIndex) -> Result<i64> {
        Ok(ipv4_to_long(self.get_ipv4(col)?))
    }

    /// 点分十进制写入 sink；NULL 返回 false
    pub fn get_ipv4_text(&self, col: ColumnIndex, sink: &mut dyn fmt::Write) -> Result<bool> {
        Ok(write_ipv4(self.get_ipv4(col)?, sink)?)
    }

    // ── Geohash：列不存在时直接返回各宽度的 NULL ──

    pub fn get_geo_byte(&self, col: ColumnIndex) -> Result<i8> {
        match self.locate(col, &[ColumnType::GeoByte], "GEOHASH(b)")? {
            Resolved::Present { region, offset } => self.region(region)?.get_byte(offset),
            Resolved::Absent                     => Ok(GEO_BYTE_NULL),
        }
    }

    pub fn get_geo_short(&self, col: ColumnIndex) -> Result<i16> {
        match self.locate(col, &[ColumnType::GeoShort], "GEOHASH(s)")? {
            Resolved::Present { region, offset } => self.region(region)?.get_short(offset),
            Resolved::Absent                     => Ok(GEO_SHORT_NULL),
        }
    }

    pub fn get_geo_int(&self, col: ColumnIndex) -> Result<i32> {
        match self.locate(col, &[ColumnType::GeoInt], "GEOHASH(i)")? {
            Resolved::Present { region, offset } => self.region(region)?.get_int(offset),
            Resolved::Absent                     => Ok(GEO_INT_NULL),
        }
    }

    pub fn get_geo_long(&self, col: ColumnIndex) -> Result<i64> {
        match self.locate(col, &[ColumnType::GeoLong], "GEOHASH(l)")? {
            Resolved::Present { region, offset } => self.region(region)?.get_long(offset),
            Resolved::Absent                     => Ok(GEO_LONG_NULL),
        }
    }

    // ── 宽整数 ──

    pub fn get_long128(&self, col: ColumnIndex) -> Result<Long128> {
        let (m, off) = self.fixed(col, &[ColumnType::Long128, ColumnType::Uuid], "LONG128")?;
        m.get_long128(off)
    }

    pub fn get_long128_lo(&self, col: ColumnIndex) -> Result<i64> { Ok(self.get_long128(col)?.lo) }
    pub fn get_long128_hi(&self, col: ColumnIndex) -> Result<i64> { Ok(self.get_long128(col)?.hi) }

    /// UUID 文本（8-4-4-4-12）；NULL 不写入并返回 false
    pub fn get_uuid_text(&self, col: ColumnIndex, sink: &mut dyn fmt::Write) -> Result<bool> {
        Ok(self.get_long128(col)?.write_uuid(sink)?)
    }

    pub fn get_long256(&self, col: ColumnIndex) -> Result<Long256> {
        let (m, off) = self.fixed(col, &[ColumnType::Long256], "LONG256")?;
        m.get_long256(off)
    }

    /// 直接把 256 位值的十六进制文本写入 sink；NULL 或列不存在时返回 false
    pub fn get_long256_text(&self, col: ColumnIndex, sink: &mut dyn fmt::Write) -> Result<bool> {
        let (m, off) = self.fixed(col, &[ColumnType::Long256], "LONG256")?;
        m.get_long256_text(off, sink)
    }

    // ── STRING ──

    pub fn get_str_a(&self, col: ColumnIndex) -> Result<Option<Utf16View<'a>>> {
        let (m, off) = self.var(col, ColumnType::String, "STRING")?;
        m.get_str(off)
    }

    pub fn get_str_b(&self, col: ColumnIndex) -> Result<Option<Utf16View<'a>>> {
        let (m, off) = self.var(col, ColumnType::String, "STRING")?;
        m.get_str(off)
    }

    pub fn get_str_len(&self, col: ColumnIndex) -> Result<i32> {
        let (m, off) = self.var(col, ColumnType::String, "STRING")?;
        m.get_str_len(off)
    }

    // ── BINARY ──

    pub fn get_bin_a(&self, col: ColumnIndex) -> Result<Option<&'a [u8]>> {
        let (m, off) = self.var(col, ColumnType::Binary, "BINARY")?;
        m.get_bin(off)
    }

    pub fn get_bin_b(&self, col: ColumnIndex) -> Result<Option<&'a [u8]>> {
        let (m, off) = self.var(col, ColumnType::Binary, "BINARY")?;
        m.get_bin(off)
    }

    pub fn get_bin_len(&self, col: ColumnIndex) -> Result<i64> {
        let (m, off) = self.var(col, ColumnType::Binary, "BINARY")?;
        m.get_bin_len(off)
    }

    // ── VARCHAR ──

    pub fn get_varchar_a(&self, col: ColumnIndex) -> Result<Option<Utf8View<'a>>> {
        let (m, off) = self.var(col, ColumnType::Varchar, "VARCHAR")?;
        m.get_varchar(off)
    }

    pub fn get_varchar_b(&self, col: ColumnIndex) -> Result<Option<Utf8View<'a>>> {
        let (m, off) = self.var(col, ColumnType::Varchar, "VARCHAR")?;
        m.get_varchar(off)
    }

    pub fn get_varchar_size(&self, col: ColumnIndex) -> Result<i32> {
        let (m, off) = self.var(col, ColumnType::Varchar, "VARCHAR")?;
        m.get_varchar_size(off)
    }

    /// 解码为 UTF-16 写入 sink；ASCII 值跳过解码，NULL 返回 false
    pub fn get_varchar_utf16<T: Utf16Sink>(&self, col: ColumnIndex, sink: &mut T) -> Result<bool> {
        match self.get_varchar_a(col)? {
            Some(v) => {
                v.to_utf16(sink, self.source.config().validate_text)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ── SYMBOL ──

    pub fn get_sym_key(&self, col: ColumnIndex) -> Result<i32> {
        let (m, off) = self.fixed(col, &[ColumnType::Symbol], "SYMBOL")?;
        m.get_int(off)
    }

    fn symbols(&self, col: ColumnIndex) -> Result<&'a dyn crate::symbol::SymbolTable> {
        let (table_col, _) = self.deref_column(col)?;
        let source: &'a S = self.source;
        source.symbol_table(table_col)
            .ok_or_else(|| ReadError::Malformed(format!("no symbol table for column {table_col}")))
    }

    pub fn get_sym_a(&self, col: ColumnIndex) -> Result<Option<&'a str>> {
        let key = self.get_sym_key(col)?;
        Ok(self.symbols(col)?.value_of(key))
    }

    pub fn get_sym_b(&self, col: ColumnIndex) -> Result<Option<&'a str>> {
        let key = self.get_sym_key(col)?;
        Ok(self.symbols(col)?.value_b_of(key))
    }

    // ── 通用读取 ──

    /// 按列类型读出拥有型值；各类型的 NULL 表示统一为 `Value::Null`
    pub fn get_value(&self, col: ColumnIndex) -> Result<Value> {
        let t = self.column_type(col)?;
        let v = match t {
            ColumnType::Boolean   => Value::Bool(self.get_bool(col)?),
            ColumnType::Byte      => Value::Byte(self.get_byte(col)?),
            ColumnType::Short     => Value::Short(self.get_short(col)?),
            ColumnType::Char      => Value::Char(self.get_char(col)?),
            ColumnType::Int       => match self.get_int(col)? {
                INT_NULL => Value::Null,
                v        => Value::Int(v),
            },
            ColumnType::Long      => null_long(self.get_long(col)?, Value::Long),
            ColumnType::Date      => null_long(self.get_date(col)?, Value::Date),
            ColumnType::Timestamp => null_long(self.get_timestamp(col)?, Value::Timestamp),
            ColumnType::Float     => match self.get_float(col)? {
                v if v.is_nan() => Value::Null,
                v               => Value::Float(v),
            },
            ColumnType::Double    => match self.get_double(col)? {
                v if v.is_nan() => Value::Null,
                v               => Value::Double(v),
            },
            ColumnType::IPv4      => match self.get_ipv4(col)? {
                IPV4_NULL => Value::Null,
                v         => Value::IPv4(v),
            },
            ColumnType::GeoByte   => null_geo(self.get_geo_byte(col)? as i64),
            ColumnType::GeoShort  => null_geo(self.get_geo_short(col)? as i64),
            ColumnType::GeoInt    => null_geo(self.get_geo_int(col)? as i64),
            ColumnType::GeoLong   => null_geo(self.get_geo_long(col)?),
            ColumnType::Long128 | ColumnType::Uuid => {
                let v = self.get_long128(col)?;
                match (v.is_null(), t) {
                    (true, _)                => Value::Null,
                    (false, ColumnType::Uuid) => Value::Uuid(v),
                    (false, _)               => Value::Long128(v),
                }
            }
            ColumnType::Long256   => {
                let v = self.get_long256(col)?;
                if v.is_null() { Value::Null } else { Value::Long256(v) }
            }
            ColumnType::Symbol    => self.get_sym_a(col)?
                .map_or(Value::Null, |s| Value::Symbol(s.to_owned())),
            ColumnType::String    => self.get_str_a(col)?
                .map_or(Value::Null, |s| Value::Str(s.to_string_lossy())),
            ColumnType::Binary    => self.get_bin_a(col)?
                .map_or(Value::Null, |b| Value::Binary(b.to_vec())),
            ColumnType::Varchar   => match self.get_varchar_a(col)? {
                Some(v) => Value::Varchar(v.to_string_checked()?),
                None    => Value::Null,
            },
        };
        Ok(v)
    }

    /// data region 偏移（诊断用）；列不存在时为 `None`
    pub fn data_region_of(&self, col: ColumnIndex) -> Result<Option<usize>> {
        let (table_col, t) = self.deref_column(col)?;
        let top = self.source.column_top(self.column_base, table_col);
        Ok(match resolve(self.column_base, table_col, t, self.row, top) {
            Resolved::Present { .. } => Some(primary_column_index(self.column_base, table_col)),
            Resolved::Absent         => None,
        })
    }
}

fn null_long(v: i64, wrap: fn(i64) -> Value) -> Value {
    if v == LONG_NULL { Value::Null } else { wrap(v) }
}

fn null_geo(v: i64) -> Value {
    if v == GEO_LONG_NULL { Value::Null } else { Value::GeoHash(v) }
}

// ── ColumnRef ─────────────────────────────────────────────────────────────────

/// 查询引擎持有的列引用：按值复制，不需要按类型实例化访问器对象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRef {
    pub index:       ColumnIndex,
    pub column_type: ColumnType,
}

impl ColumnRef {
    pub fn new(index: ColumnIndex, column_type: ColumnType) -> Self { Self { index, column_type } }

    /// 由视图当前的列类型构造
    pub fn of<S: ColumnSource + ?Sized>(record: &TableRecord<'_, S>, index: ColumnIndex) -> Result<Self> {
        Ok(Self::new(index, record.column_type(index)?))
    }

    pub fn read<S: ColumnSource + ?Sized>(&self, record: &TableRecord<'_, S>) -> Result<Value> {
        let actual = record.column_type(self.index)?;
        if actual != self.column_type {
            return Err(ReadError::TypeMismatch {
                column:   self.index,
                expected: self.column_type.name(),
                actual,
            });
        }
        record.get_value(self.index)
    }
}
