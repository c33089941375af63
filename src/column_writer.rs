//! 列文件写入器（构建快照 / 测试夹具用）
//!
//! 每列独立维护两块缓冲，与读路径的两个 region 槽位一一对应：
//!   - primary：定长值 / 符号 key / 变长负载
//!   - secondary：变长列每行一个 i64 负载偏移，其余列为空
//!
//! 行号小于 column top 的行不落盘。

use std::fs;
use std::path::Path;
use log::debug;
use crate::common::{
    ColumnKind, ColumnType, ReadError, Result, RowNumber,
    GEO_BYTE_NULL, GEO_INT_NULL, GEO_LONG_NULL, GEO_SHORT_NULL, INT_NULL, IPV4_NULL, LONG_NULL,
};
use crate::field_type::{ColumnMeta, Long128, Long256, Value};
use crate::symbol::SymbolMap;
use crate::varlen;

/// 列文件名：`<name>.d` 存 primary，`<name>.i` 存变长列的偏移
pub fn data_file_name(name: &str) -> String { format!("{name}.d") }
pub fn index_file_name(name: &str) -> String { format!("{name}.i") }

pub struct ColumnWriter {
    pub meta:   ColumnMeta,
    primary:    Vec<u8>,
    secondary:  Vec<u8>,
    column_top: i64,
    // 分区内行号（含 column top 之前的行）
    next_row:   RowNumber,
}

impl ColumnWriter {
    pub fn new(meta: ColumnMeta) -> Self {
        Self { meta, primary: Vec::new(), secondary: Vec::new(), column_top: 0, next_row: 0 }
    }

    pub fn with_column_top(mut self, column_top: i64) -> Self {
        self.column_top = column_top.max(0);
        self
    }

    pub fn column_top(&self) -> i64 { self.column_top }

    /// 追加一个值；符号列通过 `symbols` 分配 key
    pub fn add_value(&mut self, value: &Value, symbols: Option<&mut SymbolMap>) -> Result<()> {
        let row = self.next_row;
        self.next_row += 1;
        if row < self.column_top {
            return Ok(());
        }
        let t = self.meta.column_type;
        match t.kind() {
            ColumnKind::Fixed(_)   => self.put_fixed(value),
            ColumnKind::Dictionary => self.put_symbol(value, symbols),
            ColumnKind::VarLength  => self.put_var(value),
        }
    }

    fn mismatch(&self, value: &Value) -> ReadError {
        ReadError::TypeMismatch {
            column:   self.meta.column_index,
            expected: value.type_name(),
            actual:   self.meta.column_type,
        }
    }

    fn put_fixed(&mut self, value: &Value) -> Result<()> {
        let out = &mut self.primary;
        match (self.meta.column_type, value) {
            (ColumnType::Boolean, Value::Bool(v))      => out.push(*v as u8),
            (ColumnType::Boolean, Value::Null)         => out.push(0),
            (ColumnType::Byte, Value::Byte(v))         => out.push(*v as u8),
            (ColumnType::Byte, Value::Null)            => out.push(0),
            (ColumnType::Short, Value::Short(v))       => out.extend_from_slice(&v.to_le_bytes()),
            (ColumnType::Short, Value::Null)           => out.extend_from_slice(&0i16.to_le_bytes()),
            (ColumnType::Char, Value::Char(v))         => out.extend_from_slice(&v.to_le_bytes()),
            (ColumnType::Char, Value::Null)            => out.extend_from_slice(&0u16.to_le_bytes()),
            (ColumnType::Int, Value::Int(v))           => out.extend_from_slice(&v.to_le_bytes()),
            (ColumnType::Int, Value::Null)             => out.extend_from_slice(&INT_NULL.to_le_bytes()),
            (ColumnType::Long, Value::Long(v))
            | (ColumnType::Date, Value::Date(v))
            | (ColumnType::Timestamp, Value::Timestamp(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (ColumnType::Long | ColumnType::Date | ColumnType::Timestamp, Value::Null) =>
                out.extend_from_slice(&LONG_NULL.to_le_bytes()),
            (ColumnType::Float, Value::Float(v))       => out.extend_from_slice(&v.to_le_bytes()),
            (ColumnType::Float, Value::Null)           => out.extend_from_slice(&f32::NAN.to_le_bytes()),
            (ColumnType::Double, Value::Double(v))     => out.extend_from_slice(&v.to_le_bytes()),
            (ColumnType::Double, Value::Null)          => out.extend_from_slice(&f64::NAN.to_le_bytes()),
            (ColumnType::IPv4, Value::IPv4(v))         => out.extend_from_slice(&v.to_le_bytes()),
            (ColumnType::IPv4, Value::Null)            => out.extend_from_slice(&IPV4_NULL.to_le_bytes()),
            (ColumnType::GeoByte, Value::GeoHash(v))   => out.push(*v as i8 as u8),
            (ColumnType::GeoByte, Value::Null)         => out.push(GEO_BYTE_NULL as u8),
            (ColumnType::GeoShort, Value::GeoHash(v))  => out.extend_from_slice(&(*v as i16).to_le_bytes()),
            (ColumnType::GeoShort, Value::Null)        => out.extend_from_slice(&GEO_SHORT_NULL.to_le_bytes()),
            (ColumnType::GeoInt, Value::GeoHash(v))    => out.extend_from_slice(&(*v as i32).to_le_bytes()),
            (ColumnType::GeoInt, Value::Null)          => out.extend_from_slice(&GEO_INT_NULL.to_le_bytes()),
            (ColumnType::GeoLong, Value::GeoHash(v))   => out.extend_from_slice(&v.to_le_bytes()),
            (ColumnType::GeoLong, Value::Null)         => out.extend_from_slice(&GEO_LONG_NULL.to_le_bytes()),
            (ColumnType::Long128, Value::Long128(v))
            | (ColumnType::Uuid, Value::Uuid(v))       => put_long128(out, v),
            (ColumnType::Long128 | ColumnType::Uuid, Value::Null) => put_long128(out, &Long128::NULL),
            (ColumnType::Long256, Value::Long256(v))   => put_long256(out, v),
            (ColumnType::Long256, Value::Null)         => put_long256(out, &Long256::NULL),
            _ => return Err(self.mismatch(value)),
        }
        Ok(())
    }

    fn put_symbol(&mut self, value: &Value, symbols: Option<&mut SymbolMap>) -> Result<()> {
        let key = match (value, symbols) {
            (Value::Null, Some(map))      => map.key_for(None),
            (Value::Symbol(s), Some(map)) => map.intern(s),
            (Value::Null | Value::Symbol(_), None) => {
                return Err(ReadError::Unsupported(format!(
                    "symbol column '{}' written without a dictionary", self.meta.name
                )));
            }
            _ => return Err(self.mismatch(value)),
        };
        self.primary.extend_from_slice(&key.to_le_bytes());
        Ok(())
    }

    fn put_var(&mut self, value: &Value) -> Result<()> {
        let data = &mut self.primary;
        let offset = match (self.meta.column_type, value) {
            (ColumnType::String, Value::Str(s))     => varlen::append_str(data, Some(s.as_str())),
            (ColumnType::String, Value::Null)       => varlen::append_str(data, None),
            (ColumnType::Binary, Value::Binary(b))  => varlen::append_bin(data, Some(b.as_slice())),
            (ColumnType::Binary, Value::Null)       => varlen::append_bin(data, None),
            (ColumnType::Varchar, Value::Varchar(s)) => varlen::append_varchar(data, Some(s.as_str())),
            (ColumnType::Varchar, Value::Null)      => varlen::append_varchar(data, None),
            _ => return Err(self.mismatch(value)),
        };
        self.secondary.extend_from_slice(&offset.to_le_bytes());
        Ok(())
    }

    /// 分区内已写入的行数（含 column top 之前的行）
    pub fn num_rows(&self) -> RowNumber { self.next_row }

    /// 完成写入，返回 (primary, secondary) 两块字节
    pub fn finalize(self) -> (Vec<u8>, Vec<u8>) {
        (self.primary, self.secondary)
    }

    /// 把两块缓冲写成分区目录下的列文件；非变长列只写 `.d`
    pub fn write_files(self, dir: &Path) -> Result<()> {
        let name   = self.meta.name.clone();
        let is_var = self.meta.column_type.is_var_length();
        let (primary, secondary) = self.finalize();
        let io = |e: std::io::Error| ReadError::Io(format!("write column '{name}': {e}"));
        fs::write(dir.join(data_file_name(&name)), &primary).map_err(io)?;
        if is_var {
            fs::write(dir.join(index_file_name(&name)), &secondary).map_err(io)?;
        }
        debug!("wrote column '{}' to {} ({} bytes)", name, dir.display(), primary.len());
        Ok(())
    }
}

fn put_long128(out: &mut Vec<u8>, v: &Long128) {
    out.extend_from_slice(&v.lo.to_le_bytes());
    out.extend_from_slice(&v.hi.to_le_bytes());
}

fn put_long256(out: &mut Vec<u8>, v: &Long256) {
    for w in [v.l0, v.l1, v.l2, v.l3] {
        out.extend_from_slice(&w.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{ByteOrder, LittleEndian};
    use crate::symbol::SymbolTable;

    #[test]
    fn rows_below_column_top_are_not_written() {
        let mut w = ColumnWriter::new(ColumnMeta::new(0, "qty", ColumnType::Int)).with_column_top(2);
        for v in [Value::Null, Value::Null, Value::Int(7), Value::Null] {
            w.add_value(&v, None).unwrap();
        }
        assert_eq!(w.num_rows(), 4);
        let (data, index) = w.finalize();
        assert_eq!(data.len(), 8);
        assert_eq!(LittleEndian::read_i32(&data), 7);
        assert_eq!(LittleEndian::read_i32(&data[4..]), INT_NULL);
        assert!(index.is_empty());
    }

    #[test]
    fn var_length_values_record_offsets() {
        let mut w = ColumnWriter::new(ColumnMeta::new(0, "note", ColumnType::Varchar));
        w.add_value(&Value::Varchar("ab".into()), None).unwrap();
        w.add_value(&Value::Null, None).unwrap();
        let (data, index) = w.finalize();
        assert_eq!(LittleEndian::read_i64(&index), 0);
        assert_eq!(LittleEndian::read_i64(&index[8..]), 6);
        assert_eq!(data.len(), 10);
    }

    #[test]
    fn symbols_are_interned_and_mismatches_rejected() {
        let mut dict = SymbolMap::new();
        let mut w = ColumnWriter::new(ColumnMeta::new(3, "ccy", ColumnType::Symbol));
        w.add_value(&Value::Symbol("eur".into()), Some(&mut dict)).unwrap();
        w.add_value(&Value::Symbol("eur".into()), Some(&mut dict)).unwrap();
        assert_eq!(dict.size(), 1);

        let err = w.add_value(&Value::Int(1), Some(&mut dict)).unwrap_err();
        assert!(matches!(err, ReadError::TypeMismatch { column: 3, .. }));
        assert!(w.add_value(&Value::Symbol("x".into()), None).is_err());
    }
}
