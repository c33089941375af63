use std::fmt;
use crate::common::{ReadError, Result, BIN_NULL_LEN, INT_NULL, IPV4_NULL, LONG_NULL, NULL_LEN};
use crate::field_type::{Long128, Long256};
use crate::utf8::Utf8View;
use crate::varlen::Utf16View;
use super::ReadMemory;

/// 列尚未存在时的零长度哨兵 region
///
/// 无状态，可全局共享；任何偏移上的读取都返回对应类型的 NULL，从不越界。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NullMemory;

impl NullMemory {
    pub const INSTANCE: NullMemory = NullMemory;

    /// 哨兵没有底层文件
    pub fn fd(&self) -> i32 { -1 }

    pub fn map_file(&self, path: &str) -> Result<()> {
        Err(ReadError::Unsupported(format!("null memory cannot map '{path}'")))
    }

    pub fn whole_file(&self) -> Result<&[u8]> {
        Err(ReadError::Unsupported("null memory has no backing file".into()))
    }
}

impl ReadMemory for NullMemory {
    fn size(&self) -> u64 { 0 }

    fn get_bool(&self, _: u64) -> Result<bool>     { Ok(false) }
    fn get_byte(&self, _: u64) -> Result<i8>       { Ok(0) }
    fn get_short(&self, _: u64) -> Result<i16>     { Ok(0) }
    fn get_char(&self, _: u64) -> Result<u16>      { Ok(0) }
    fn get_int(&self, _: u64) -> Result<i32>       { Ok(INT_NULL) }
    fn get_long(&self, _: u64) -> Result<i64>      { Ok(LONG_NULL) }
    fn get_float(&self, _: u64) -> Result<f32>     { Ok(f32::NAN) }
    fn get_double(&self, _: u64) -> Result<f64>    { Ok(f64::NAN) }
    fn get_ipv4(&self, _: u64) -> Result<i32>      { Ok(IPV4_NULL) }
    fn get_long128(&self, _: u64) -> Result<Long128> { Ok(Long128::NULL) }
    fn get_long256(&self, _: u64) -> Result<Long256> { Ok(Long256::NULL) }

    fn get_long256_text(&self, _: u64, _: &mut dyn fmt::Write) -> Result<bool> { Ok(false) }

    fn get_str(&self, _: i64) -> Result<Option<Utf16View<'_>>>     { Ok(None) }
    fn get_str_len(&self, _: i64) -> Result<i32>                   { Ok(NULL_LEN) }
    fn get_bin(&self, _: i64) -> Result<Option<&[u8]>>             { Ok(None) }
    fn get_bin_len(&self, _: i64) -> Result<i64>                   { Ok(BIN_NULL_LEN) }
    fn get_varchar(&self, _: i64) -> Result<Option<Utf8View<'_>>>  { Ok(None) }
    fn get_varchar_size(&self, _: i64) -> Result<i32>              { Ok(NULL_LEN) }

    fn is_mapped(&self, _: u64, len: u64) -> bool { len == 0 }
    fn page_count(&self) -> usize { 0 }
    fn extend(&self, _: u64) -> Result<()> { Ok(()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_getter_returns_null_at_any_offset() {
        let m = NullMemory::INSTANCE;
        for off in [0u64, 8, 1 << 40] {
            assert!(!m.get_bool(off).unwrap());
            assert_eq!(m.get_byte(off).unwrap(), 0);
            assert_eq!(m.get_short(off).unwrap(), 0);
            assert_eq!(m.get_int(off).unwrap(), INT_NULL);
            assert_eq!(m.get_long(off).unwrap(), LONG_NULL);
            assert!(m.get_float(off).unwrap().is_nan());
            assert!(m.get_double(off).unwrap().is_nan());
            assert_eq!(m.get_ipv4(off).unwrap(), IPV4_NULL);
            assert!(m.get_long128(off).unwrap().is_null());
            assert!(m.get_long256(off).unwrap().is_null());
        }
        assert!(m.get_str(0).unwrap().is_none());
        assert_eq!(m.get_str_len(0).unwrap(), NULL_LEN);
        assert!(m.get_bin(0).unwrap().is_none());
        assert_eq!(m.get_bin_len(0).unwrap(), BIN_NULL_LEN);
        assert!(m.get_varchar(0).unwrap().is_none());

        let mut s = String::new();
        assert!(!m.get_long256_text(0, &mut s).unwrap());
        assert!(s.is_empty());
    }

    #[test]
    fn structural_operations() {
        let m = NullMemory;
        assert_eq!(m.size(), 0);
        assert_eq!(m.page_count(), 0);
        assert_eq!(m.fd(), -1);
        assert!(m.extend(1 << 20).is_ok());
        assert!(!m.is_mapped(0, 1));
        assert!(matches!(m.map_file("x.d"), Err(ReadError::Unsupported(_))));
        assert_eq!(m.whole_file().unwrap_err().kind(), crate::common::ErrorKind::Programming);
    }
}
