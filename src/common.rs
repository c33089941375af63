//! 全局基础类型、空值常量与错误定义

use thiserror::Error;

// ── ID 类型别名 ───────────────────────────────────────────────────────────────

/// 分区在快照中的序号
pub type PartitionIndex = u32;
/// 列序号（表级，未经投影映射）
pub type ColumnIndex    = usize;
/// 扁平 region 列表中的下标
pub type RegionIndex    = usize;
/// 分区内的本地行号
pub type RowNumber      = i64;

// ── 空值常量 ──────────────────────────────────────────────────────────────────

pub const INT_NULL:    i32 = i32::MIN;
pub const LONG_NULL:   i64 = i64::MIN;
pub const IPV4_NULL:   i32 = 0;
/// 字符串 / 二进制长度字段中的 NULL 标记
pub const NULL_LEN:    i32 = -1;
pub const BIN_NULL_LEN: i64 = -1;

/// Geohash 在各宽度下保留的 NULL 位模式
pub const GEO_BYTE_NULL:  i8  = -1;
pub const GEO_SHORT_NULL: i16 = -1;
pub const GEO_INT_NULL:   i32 = -1;
pub const GEO_LONG_NULL:  i64 = -1;

/// 符号列的 NULL key
pub const SYMBOL_NULL_KEY: i32 = i32::MIN;

// ── RowId ─────────────────────────────────────────────────────────────────────

const LOCAL_ROW_BITS: u32 = 44;
const LOCAL_ROW_MASK: i64 = (1i64 << LOCAL_ROW_BITS) - 1;
// 符号位恒为 0，raw 值的大小顺序与 (partition, row) 一致
const PARTITION_BITS: u32 = 63 - LOCAL_ROW_BITS;
const PARTITION_MASK: i64 = (1i64 << PARTITION_BITS) - 1;

/// RowId 能表示的最大分区序号
pub const MAX_PARTITION: PartitionIndex = PARTITION_MASK as PartitionIndex;
/// RowId 能表示的最大分区内行号
pub const MAX_LOCAL_ROW: RowNumber = LOCAL_ROW_MASK;

/// (partition, local row) 打包成的不透明行句柄
///
/// 第 44..63 位为分区序号（19 位），低 44 位为分区内行号，最高位不用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(i64);

impl RowId {
    /// 调用方保证坐标在 [`MAX_PARTITION`] / [`MAX_LOCAL_ROW`] 之内；
    /// 快照构建时已校验过分区数与行数
    pub fn new(partition: PartitionIndex, row: RowNumber) -> Self {
        debug_assert!(partition <= MAX_PARTITION, "partition out of range: {partition}");
        debug_assert!((0..=MAX_LOCAL_ROW).contains(&row), "local row out of range: {row}");
        Self::pack(partition, row)
    }

    pub fn try_new(partition: PartitionIndex, row: RowNumber) -> Result<Self> {
        if partition > MAX_PARTITION || !(0..=MAX_LOCAL_ROW).contains(&row) {
            return Err(ReadError::RowIdOutOfRange { partition, row });
        }
        Ok(Self::pack(partition, row))
    }

    fn pack(partition: PartitionIndex, row: RowNumber) -> Self {
        Self(((partition as i64 & PARTITION_MASK) << LOCAL_ROW_BITS) | (row & LOCAL_ROW_MASK))
    }

    pub fn from_raw(raw: i64) -> Self { Self(raw) }
    pub fn raw(self) -> i64 { self.0 }
    pub fn partition(self) -> PartitionIndex {
        ((self.0 >> LOCAL_ROW_BITS) & PARTITION_MASK) as PartitionIndex
    }
    pub fn local_row(self) -> RowNumber { self.0 & LOCAL_ROW_MASK }
}

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.partition(), self.local_row())
    }
}

// ── 列类型 ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    Byte, Short, Char, Int, Long,
    Float, Double,
    Date, Timestamp,
    IPv4,
    GeoByte, GeoShort, GeoInt, GeoLong,
    Long128, Uuid,
    Long256,
    Symbol,
    String,
    Binary,
    Varchar,
}

/// 列在物理存储上的形态（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// 定长列，参数为单值字节宽度
    Fixed(usize),
    /// 变长列：data region + index region
    VarLength,
    /// 字典编码列：4 字节 key
    Dictionary,
}

impl ColumnType {
    pub fn kind(self) -> ColumnKind {
        match self {
            Self::Boolean | Self::Byte | Self::GeoByte          => ColumnKind::Fixed(1),
            Self::Short | Self::Char | Self::GeoShort           => ColumnKind::Fixed(2),
            Self::Int | Self::Float | Self::IPv4 | Self::GeoInt => ColumnKind::Fixed(4),
            Self::Long | Self::Double | Self::Date
            | Self::Timestamp | Self::GeoLong                   => ColumnKind::Fixed(8),
            Self::Long128 | Self::Uuid                          => ColumnKind::Fixed(16),
            Self::Long256                                       => ColumnKind::Fixed(32),
            Self::Symbol                                        => ColumnKind::Dictionary,
            Self::String | Self::Binary | Self::Varchar         => ColumnKind::VarLength,
        }
    }

    /// 主 region 中每行占用的字节数；变长列按 index region 的 8 字节计
    pub fn stride(self) -> usize {
        match self.kind() {
            ColumnKind::Fixed(w)   => w,
            ColumnKind::Dictionary => 4,
            ColumnKind::VarLength  => 8,
        }
    }

    pub fn is_var_length(self) -> bool { self.kind() == ColumnKind::VarLength }

    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean   => "BOOLEAN",
            Self::Byte      => "BYTE",
            Self::Short     => "SHORT",
            Self::Char      => "CHAR",
            Self::Int       => "INT",
            Self::Long      => "LONG",
            Self::Float     => "FLOAT",
            Self::Double    => "DOUBLE",
            Self::Date      => "DATE",
            Self::Timestamp => "TIMESTAMP",
            Self::IPv4      => "IPv4",
            Self::GeoByte   => "GEOHASH(b)",
            Self::GeoShort  => "GEOHASH(s)",
            Self::GeoInt    => "GEOHASH(i)",
            Self::GeoLong   => "GEOHASH(l)",
            Self::Long128   => "LONG128",
            Self::Uuid      => "UUID",
            Self::Long256   => "LONG256",
            Self::Symbol    => "SYMBOL",
            Self::String    => "STRING",
            Self::Binary    => "BINARY",
            Self::Varchar   => "VARCHAR",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── 错误 ──────────────────────────────────────────────────────────────────────

/// 错误大类，调用方据此决定是否中止外层操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 规划器 / schema 缺陷，不可重试
    Programming,
    /// 数据损坏或非法编码
    Malformed,
    /// 协作式取消
    Cancelled,
    Io,
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("column index out of bounds: {column} >= {count}")]
    ColumnOutOfBounds { column: usize, count: usize },
    #[error("column {column} is {actual}, cannot read as {expected}")]
    TypeMismatch { column: usize, expected: &'static str, actual: ColumnType },
    #[error("read out of bounds: offset={offset} len={len} size={size}")]
    OutOfBounds { offset: u64, len: usize, size: u64 },
    #[error("row id out of range: partition={partition} row={row}")]
    RowIdOutOfRange { partition: PartitionIndex, row: RowNumber },
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("invalid UTF-8 at byte {position}")]
    InvalidUtf8 { position: usize },
    #[error("malformed column data: {0}")]
    Malformed(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("column file I/O error: {0}")]
    Io(String),
    #[error("text sink rejected write")]
    Sink(#[from] std::fmt::Error),
}

impl ReadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ColumnOutOfBounds { .. }
            | Self::TypeMismatch { .. }
            | Self::OutOfBounds { .. }
            | Self::RowIdOutOfRange { .. }
            | Self::Unsupported(_)              => ErrorKind::Programming,
            Self::InvalidUtf8 { .. }
            | Self::Malformed(_)                => ErrorKind::Malformed,
            Self::Cancelled                     => ErrorKind::Cancelled,
            Self::Io(_) | Self::Sink(_)         => ErrorKind::Io,
        }
    }

    pub fn is_cancelled(&self) -> bool { matches!(self, Self::Cancelled) }
}

pub type Result<T> = std::result::Result<T, ReadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_id_round_trips() {
        for (p, r) in [(0u32, 0i64), (0, 1), (3, 150), (1023, LOCAL_ROW_MASK), (7, 1 << 40)] {
            let id = RowId::new(p, r);
            assert_eq!(id.partition(), p);
            assert_eq!(id.local_row(), r);
            assert_eq!(RowId::from_raw(id.raw()), id);
        }
    }

    #[test]
    fn row_id_boundaries() {
        let last = RowId::new(MAX_PARTITION, MAX_LOCAL_ROW);
        assert_eq!(last.partition(), MAX_PARTITION);
        assert_eq!(last.local_row(), MAX_LOCAL_ROW);
        assert!(last.raw() > 0);
        assert!(last > RowId::new(MAX_PARTITION - 1, MAX_LOCAL_ROW));

        let id = RowId::try_new(300_000, 5).unwrap();
        assert_eq!((id.partition(), id.local_row()), (300_000, 5));

        for (p, r) in [(MAX_PARTITION + 1, 0), (600_000, 5), (0, MAX_LOCAL_ROW + 1), (0, -1)] {
            let err = RowId::try_new(p, r).unwrap_err();
            assert!(matches!(err, ReadError::RowIdOutOfRange { .. }), "{p}:{r}");
            assert_eq!(err.kind(), ErrorKind::Programming);
        }
    }

    #[test]
    fn row_ids_order_by_partition_then_row() {
        assert!(RowId::new(1, 0) > RowId::new(0, 999_999));
        assert!(RowId::new(2, 5) < RowId::new(2, 6));
    }

    #[test]
    fn var_length_columns_use_eight_byte_index_stride() {
        assert_eq!(ColumnType::String.stride(), 8);
        assert_eq!(ColumnType::Varchar.stride(), 8);
        assert_eq!(ColumnType::Binary.stride(), 8);
        assert_eq!(ColumnType::Symbol.stride(), 4);
        assert_eq!(ColumnType::Long256.stride(), 32);
        assert_eq!(ColumnType::Uuid.stride(), 16);
    }

    #[test]
    fn error_kinds() {
        assert_eq!(ReadError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(ReadError::InvalidUtf8 { position: 3 }.kind(), ErrorKind::Malformed);
        assert_eq!(
            ReadError::ColumnOutOfBounds { column: 9, count: 2 }.kind(),
            ErrorKind::Programming,
        );
    }
}
