//! 列元数据与运行时值类型（宽整数、IPv4、UUID 文本化）

use std::fmt::{self, Write};
use crate::common::{ColumnIndex, ColumnType, IPV4_NULL, LONG_NULL};

// ── 宽整数 ────────────────────────────────────────────────────────────────────

/// 128 位值：两个相邻 8 字节字，低位在前
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Long128 {
    pub lo: i64,
    pub hi: i64,
}

impl Long128 {
    pub const NULL: Self = Self { lo: LONG_NULL, hi: LONG_NULL };

    pub fn new(lo: i64, hi: i64) -> Self { Self { lo, hi } }

    pub fn is_null(&self) -> bool { *self == Self::NULL }

    /// 按 UUID 规范格式 8-4-4-4-12 输出；NULL 不写任何内容并返回 false
    pub fn write_uuid<W: Write + ?Sized>(&self, sink: &mut W) -> Result<bool, fmt::Error> {
        if self.is_null() {
            return Ok(false);
        }
        let (hi, lo) = (self.hi as u64, self.lo as u64);
        write!(
            sink,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            hi >> 32,
            (hi >> 16) & 0xFFFF,
            hi & 0xFFFF,
            lo >> 48,
            lo & 0xFFFF_FFFF_FFFF,
        )?;
        Ok(true)
    }
}

/// 256 位值：四个 8 字节字，`l0` 为最低位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Long256 {
    pub l0: i64,
    pub l1: i64,
    pub l2: i64,
    pub l3: i64,
}

impl Long256 {
    pub const NULL: Self = Self { l0: LONG_NULL, l1: LONG_NULL, l2: LONG_NULL, l3: LONG_NULL };

    pub fn new(l0: i64, l1: i64, l2: i64, l3: i64) -> Self { Self { l0, l1, l2, l3 } }

    pub fn is_null(&self) -> bool { *self == Self::NULL }

    /// `0x` 加去掉前导零的十六进制；零值输出 `0x00`，NULL 不输出并返回 false
    pub fn write_hex<W: Write + ?Sized>(&self, sink: &mut W) -> Result<bool, fmt::Error> {
        if self.is_null() {
            return Ok(false);
        }
        sink.write_str("0x")?;
        let words = [self.l3 as u64, self.l2 as u64, self.l1 as u64, self.l0 as u64];
        match words.iter().position(|&w| w != 0) {
            None => sink.write_str("00")?,
            Some(first) => {
                write!(sink, "{:x}", words[first])?;
                for w in &words[first + 1..] {
                    write!(sink, "{:016x}", w)?;
                }
            }
        }
        Ok(true)
    }
}

// ── IPv4 ──────────────────────────────────────────────────────────────────────

/// IPv4 按无符号扩展为 i64；NULL 映射为 `LONG_NULL`
pub fn ipv4_to_long(ip: i32) -> i64 {
    if ip == IPV4_NULL { LONG_NULL } else { ip as u32 as i64 }
}

/// 点分十进制输出；NULL 返回 false
pub fn write_ipv4<W: Write + ?Sized>(ip: i32, sink: &mut W) -> Result<bool, fmt::Error> {
    if ip == IPV4_NULL {
        return Ok(false);
    }
    let [a, b, c, d] = (ip as u32).to_be_bytes();
    write!(sink, "{a}.{b}.{c}.{d}")?;
    Ok(true)
}

// ── 列元数据 ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub column_index: ColumnIndex,
    pub name:         String,
    pub column_type:  ColumnType,
}

impl ColumnMeta {
    pub fn new(column_index: ColumnIndex, name: &str, column_type: ColumnType) -> Self {
        Self { column_index, name: name.into(), column_type }
    }
}

// ── 运行时值 ──────────────────────────────────────────────────────────────────

/// 单元格的拥有型表示，用于诊断输出与通用读取
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Char(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Date(i64),
    Timestamp(i64),
    IPv4(i32),
    GeoHash(i64),
    Long128(Long128),
    Uuid(Long128),
    Long256(Long256),
    Symbol(String),
    Str(String),
    Binary(Vec<u8>),
    Varchar(String),
}

impl Value {
    pub fn is_null(&self) -> bool { matches!(self, Self::Null) }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null         => "NULL",
            Self::Bool(_)      => "BOOLEAN",
            Self::Byte(_)      => "BYTE",
            Self::Short(_)     => "SHORT",
            Self::Char(_)      => "CHAR",
            Self::Int(_)       => "INT",
            Self::Long(_)      => "LONG",
            Self::Float(_)     => "FLOAT",
            Self::Double(_)    => "DOUBLE",
            Self::Date(_)      => "DATE",
            Self::Timestamp(_) => "TIMESTAMP",
            Self::IPv4(_)      => "IPv4",
            Self::GeoHash(_)   => "GEOHASH",
            Self::Long128(_)   => "LONG128",
            Self::Uuid(_)      => "UUID",
            Self::Long256(_)   => "LONG256",
            Self::Symbol(_)    => "SYMBOL",
            Self::Str(_)       => "STRING",
            Self::Binary(_)    => "BINARY",
            Self::Varchar(_)   => "VARCHAR",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Byte(v)                                    => Some(*v as i64),
            Self::Short(v)                                   => Some(*v as i64),
            Self::Int(v)                                     => Some(*v as i64),
            Self::Long(v) | Self::Date(v) | Self::Timestamp(v)
            | Self::GeoHash(v)                               => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Symbol(s) | Self::Str(s) | Self::Varchar(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null         => write!(f, "NULL"),
            Self::Bool(v)      => write!(f, "{v}"),
            Self::Byte(v)      => write!(f, "{v}"),
            Self::Short(v)     => write!(f, "{v}"),
            Self::Char(v)      => write!(f, "{}", char::from_u32(*v as u32).unwrap_or(char::REPLACEMENT_CHARACTER)),
            Self::Int(v)       => write!(f, "{v}"),
            Self::Long(v)      => write!(f, "{v}"),
            Self::Float(v)     => write!(f, "{v}"),
            Self::Double(v)    => write!(f, "{v}"),
            Self::Date(v)      => write!(f, "{v}"),
            Self::Timestamp(v) => write!(f, "{v}"),
            Self::IPv4(v)      => write_ipv4(*v, f).map(|_| ()),
            Self::GeoHash(v)   => write!(f, "{v:#x}"),
            Self::Long128(v)   => write!(f, "{:016x}{:016x}", v.hi as u64, v.lo as u64),
            Self::Uuid(v)      => v.write_uuid(f).map(|_| ()),
            Self::Long256(v)   => v.write_hex(f).map(|_| ()),
            Self::Symbol(s) | Self::Str(s) | Self::Varchar(s) => f.write_str(s),
            Self::Binary(b)    => {
                for x in b { write!(f, "{x:02x}")?; }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_text_layout() {
        let v = Long128::new(0x89ab_cdef_0123_4567u64 as i64, 0x0123_4567_89ab_cdefu64 as i64);
        let mut s = String::new();
        assert!(v.write_uuid(&mut s).unwrap());
        assert_eq!(s, "01234567-89ab-cdef-89ab-cdef01234567");

        let mut empty = String::new();
        assert!(!Long128::NULL.write_uuid(&mut empty).unwrap());
        assert!(empty.is_empty());
    }

    #[test]
    fn long256_hex_strips_leading_zero_words() {
        let mut s = String::new();
        Long256::new(0x10, 0, 0, 0).write_hex(&mut s).unwrap();
        assert_eq!(s, "0x10");

        s.clear();
        Long256::new(1, 0xff, 0, 0).write_hex(&mut s).unwrap();
        assert_eq!(s, "0xff0000000000000001");

        s.clear();
        assert!(Long256::new(0, 0, 0, 0).write_hex(&mut s).unwrap());
        assert_eq!(s, "0x00");

        s.clear();
        assert!(!Long256::NULL.write_hex(&mut s).unwrap());
        assert_eq!(s, "");
    }

    #[test]
    fn ipv4_formatting_and_widening() {
        let mut s = String::new();
        assert!(write_ipv4(150, &mut s).unwrap());
        assert_eq!(s, "0.0.0.150");

        s.clear();
        assert!(write_ipv4(0xC0A8_0001u32 as i32, &mut s).unwrap());
        assert_eq!(s, "192.168.0.1");
        assert_eq!(ipv4_to_long(0xFFFF_FFFFu32 as i32), 0xFFFF_FFFF);
        assert_eq!(ipv4_to_long(IPV4_NULL), LONG_NULL);
        assert!(!write_ipv4(IPV4_NULL, &mut String::new()).unwrap());
    }

    #[test]
    fn value_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::IPv4(0x0A00_0001).to_string(), "10.0.0.1");
        assert_eq!(Value::Binary(vec![0xde, 0xad]).to_string(), "dead");
        assert_eq!(Value::Varchar("x".into()).as_str(), Some("x"));
        assert_eq!(Value::Timestamp(7).as_i64(), Some(7));
    }
}
