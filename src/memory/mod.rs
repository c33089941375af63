//! 只读列内存 region
//!
//! 每个 region 是一段拥有或映射的定长字节缓冲，所有类型化读取都做显式越界检查：
//! - **ColumnMemory** ：堆内存（`Vec<u8>`）或 `memmap2` 只读映射的列文件
//! - **NullMemory** ：零长度哨兵，列尚不存在的行经由它返回各类型的 NULL

mod null;

pub use null::NullMemory;

use std::fmt;
use std::fs::File;
use std::path::Path;
use byteorder::{ByteOrder, LittleEndian};
use log::debug;
use memmap2::{Mmap, MmapOptions};
use crate::common::{ReadError, Result};
use crate::field_type::{Long128, Long256};
use crate::utf8::Utf8View;
use crate::varlen::{self, Utf16View};

/// 越界检查后的切片；`offset + len` 溢出同样视为越界
pub(crate) fn checked_slice(data: &[u8], offset: u64, len: usize) -> Result<&[u8]> {
    let size = data.len() as u64;
    let end  = offset.checked_add(len as u64);
    match end {
        Some(end) if end <= size => Ok(&data[offset as usize..end as usize]),
        _ => Err(ReadError::OutOfBounds { offset, len, size }),
    }
}

// ── 定宽值解码 ────────────────────────────────────────────────────────────────

/// 可从小端字节直接解码的定宽值
pub(crate) trait FixedValue: Copy {
    const WIDTH: usize;
    fn decode(bytes: &[u8]) -> Self;
}

macro_rules! fixed_value {
    ($t:ty, $w:expr, |$b:ident| $body:expr) => {
        impl FixedValue for $t {
            const WIDTH: usize = $w;
            #[inline]
            fn decode($b: &[u8]) -> Self { $body }
        }
    };
}

fixed_value!(bool, 1, |b| b[0] != 0);
fixed_value!(i8,   1, |b| b[0] as i8);
fixed_value!(i16,  2, |b| LittleEndian::read_i16(b));
fixed_value!(u16,  2, |b| LittleEndian::read_u16(b));
fixed_value!(i32,  4, |b| LittleEndian::read_i32(b));
fixed_value!(i64,  8, |b| LittleEndian::read_i64(b));
fixed_value!(f32,  4, |b| LittleEndian::read_f32(b));
fixed_value!(f64,  8, |b| LittleEndian::read_f64(b));
fixed_value!(Long128, 16, |b| Long128::new(LittleEndian::read_i64(&b[..8]), LittleEndian::read_i64(&b[8..16])));
fixed_value!(Long256, 32, |b| Long256::new(
    LittleEndian::read_i64(&b[..8]),
    LittleEndian::read_i64(&b[8..16]),
    LittleEndian::read_i64(&b[16..24]),
    LittleEndian::read_i64(&b[24..32]),
));

// ── ReadMemory ────────────────────────────────────────────────────────────────

/// 只读内存 region 的类型化读取契约
///
/// 偏移均以字节计。变长读取的 `offset` 是 data region 内的负载偏移
/// （由 index region 读出）。
pub trait ReadMemory {
    fn size(&self) -> u64;

    fn get_bool(&self, offset: u64) -> Result<bool>;
    fn get_byte(&self, offset: u64) -> Result<i8>;
    fn get_short(&self, offset: u64) -> Result<i16>;
    fn get_char(&self, offset: u64) -> Result<u16>;
    fn get_int(&self, offset: u64) -> Result<i32>;
    fn get_long(&self, offset: u64) -> Result<i64>;
    fn get_float(&self, offset: u64) -> Result<f32>;
    fn get_double(&self, offset: u64) -> Result<f64>;
    fn get_ipv4(&self, offset: u64) -> Result<i32>;
    fn get_long128(&self, offset: u64) -> Result<Long128>;
    fn get_long256(&self, offset: u64) -> Result<Long256>;
    /// 直接把 256 位值以文本写入 sink，不构造中间对象
    /// NULL 时不写入并返回 false
    fn get_long256_text(&self, offset: u64, sink: &mut dyn fmt::Write) -> Result<bool>;

    fn get_str(&self, offset: i64) -> Result<Option<Utf16View<'_>>>;
    fn get_str_len(&self, offset: i64) -> Result<i32>;
    fn get_bin(&self, offset: i64) -> Result<Option<&[u8]>>;
    fn get_bin_len(&self, offset: i64) -> Result<i64>;
    fn get_varchar(&self, offset: i64) -> Result<Option<Utf8View<'_>>>;
    fn get_varchar_size(&self, offset: i64) -> Result<i32>;

    // ── 结构性操作 ──
    fn is_mapped(&self, offset: u64, len: u64) -> bool;
    fn page_count(&self) -> usize;
    /// 只读 region 不可增长；请求的大小不超过当前大小时视为成功
    fn extend(&self, size: u64) -> Result<()>;
}

// ── ColumnMemory ──────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Backing {
    Heap(Vec<u8>),
    Mapped(Mmap),
}

/// 列文件的只读 region
#[derive(Debug)]
pub struct ColumnMemory {
    backing: Backing,
}

impl ColumnMemory {
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { backing: Backing::Heap(bytes) }
    }

    pub fn empty() -> Self { Self::from_vec(Vec::new()) }

    /// 只读映射整个列文件；零长度文件得到空 region
    pub fn map_file<P: AsRef<Path>>(path: P, populate: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| ReadError::Io(format!("open '{}': {e}", path.display())))?;
        let len = file.metadata()
            .map_err(|e| ReadError::Io(format!("stat '{}': {e}", path.display())))?
            .len();
        if len == 0 {
            debug!("column file '{}' is empty", path.display());
            return Ok(Self::empty());
        }
        let mut opts = MmapOptions::new();
        if populate {
            opts.populate();
        }
        // 列文件由外部写入端封存后才交给读路径，映射期间不会被截断
        let mmap = unsafe { opts.map(&file) }
            .map_err(|e| ReadError::Io(format!("mmap '{}': {e}", path.display())))?;
        debug!("mapped column file '{}' ({} bytes)", path.display(), len);
        Ok(Self { backing: Backing::Mapped(mmap) })
    }

    pub fn bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Heap(v)   => v,
            Backing::Mapped(m) => m,
        }
    }

    pub fn is_file_backed(&self) -> bool { matches!(self.backing, Backing::Mapped(_)) }

    #[inline]
    fn read<T: FixedValue>(&self, offset: u64) -> Result<T> {
        Ok(T::decode(checked_slice(self.bytes(), offset, T::WIDTH)?))
    }
}

const PAGE_SIZE: u64 = 4096;

impl ReadMemory for ColumnMemory {
    fn size(&self) -> u64 { self.bytes().len() as u64 }

    fn get_bool(&self, offset: u64) -> Result<bool>     { self.read(offset) }
    fn get_byte(&self, offset: u64) -> Result<i8>       { self.read(offset) }
    fn get_short(&self, offset: u64) -> Result<i16>     { self.read(offset) }
    fn get_char(&self, offset: u64) -> Result<u16>      { self.read(offset) }
    fn get_int(&self, offset: u64) -> Result<i32>       { self.read(offset) }
    fn get_long(&self, offset: u64) -> Result<i64>      { self.read(offset) }
    fn get_float(&self, offset: u64) -> Result<f32>     { self.read(offset) }
    fn get_double(&self, offset: u64) -> Result<f64>    { self.read(offset) }
    fn get_ipv4(&self, offset: u64) -> Result<i32>      { self.read(offset) }
    fn get_long128(&self, offset: u64) -> Result<Long128> { self.read(offset) }
    fn get_long256(&self, offset: u64) -> Result<Long256> { self.read(offset) }

    fn get_long256_text(&self, offset: u64, sink: &mut dyn fmt::Write) -> Result<bool> {
        let v: Long256 = self.read(offset)?;
        Ok(v.write_hex(sink)?)
    }

    fn get_str(&self, offset: i64) -> Result<Option<Utf16View<'_>>> { varlen::read_str(self.bytes(), offset) }
    fn get_str_len(&self, offset: i64) -> Result<i32>               { varlen::read_str_len(self.bytes(), offset) }
    fn get_bin(&self, offset: i64) -> Result<Option<&[u8]>>         { varlen::read_bin(self.bytes(), offset) }
    fn get_bin_len(&self, offset: i64) -> Result<i64>               { varlen::read_bin_len(self.bytes(), offset) }
    fn get_varchar(&self, offset: i64) -> Result<Option<Utf8View<'_>>> { varlen::read_varchar(self.bytes(), offset) }
    fn get_varchar_size(&self, offset: i64) -> Result<i32>          { varlen::read_varchar_size(self.bytes(), offset) }

    fn is_mapped(&self, offset: u64, len: u64) -> bool {
        offset.checked_add(len).map_or(false, |end| end <= self.size())
    }

    fn page_count(&self) -> usize {
        self.size().div_ceil(PAGE_SIZE) as usize
    }

    fn extend(&self, size: u64) -> Result<()> {
        if size <= self.size() {
            Ok(())
        } else {
            Err(ReadError::Unsupported(format!(
                "cannot extend read-only region from {} to {size} bytes", self.size()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn le(values: &[i64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn typed_reads_are_little_endian_and_bounds_checked() {
        let mem = ColumnMemory::from_vec(le(&[0x0102_0304_0506_0708, -1]));
        assert_eq!(mem.get_long(0).unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(mem.get_int(0).unwrap(), 0x0506_0708);
        assert_eq!(mem.get_short(0).unwrap(), 0x0708);
        assert_eq!(mem.get_byte(0).unwrap(), 0x08);
        assert_eq!(mem.get_long(8).unwrap(), -1);
        assert!(mem.get_bool(0).unwrap());

        assert!(matches!(mem.get_long(9), Err(ReadError::OutOfBounds { offset: 9, len: 8, size: 16 })));
        assert!(mem.get_long(u64::MAX).is_err());
        assert!(mem.get_byte(16).is_err());
    }

    #[test]
    fn wide_values_read_adjacent_words() {
        let mem = ColumnMemory::from_vec(le(&[1, 2, 3, 4]));
        assert_eq!(mem.get_long128(0).unwrap(), Long128::new(1, 2));
        assert_eq!(mem.get_long128(16).unwrap(), Long128::new(3, 4));
        assert_eq!(mem.get_long256(0).unwrap(), Long256::new(1, 2, 3, 4));
        let mut s = String::new();
        assert!(mem.get_long256_text(0, &mut s).unwrap());
        assert_eq!(s, format!("0x4{:016x}{:016x}{:016x}", 3, 2, 1));
        assert!(mem.get_long256(8).is_err());
    }

    #[test]
    fn structural_queries() {
        let mem = ColumnMemory::from_vec(vec![0; 5000]);
        assert_eq!(mem.page_count(), 2);
        assert!(mem.is_mapped(4000, 1000));
        assert!(!mem.is_mapped(4000, 1001));
        assert!(mem.extend(100).is_ok());
        assert!(matches!(mem.extend(6000), Err(ReadError::Unsupported(_))));
        assert!(!mem.is_file_backed());
    }

    #[test]
    fn maps_column_files() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("price.d");
        let mut f = File::create(&path).unwrap();
        f.write_all(&le(&[10, 20, 30])).unwrap();
        f.sync_all().unwrap();

        let mem = ColumnMemory::map_file(&path, true).unwrap();
        assert!(mem.is_file_backed());
        assert_eq!(mem.size(), 24);
        assert_eq!(mem.get_long(16).unwrap(), 30);

        let empty = dir.path().join("empty.d");
        File::create(&empty).unwrap();
        let mem = ColumnMemory::map_file(&empty, false).unwrap();
        assert_eq!(mem.size(), 0);

        let missing = ColumnMemory::map_file(dir.path().join("nope.d"), false);
        assert!(matches!(missing, Err(ReadError::Io(_))));
    }
}
