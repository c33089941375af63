//! 变长列 data region 的负载格式
//!
//! ```text
//! STRING  : len  (i32 LE, UTF-16 code unit 数, -1 = NULL) │ UTF-16LE × len
//! BINARY  : len  (i64 LE, 字节数, -1 = NULL)               │ bytes × len
//! VARCHAR : hdr  (i32 LE, -1 = NULL, 否则 size<<1 | ascii) │ UTF-8 × size
//! ```
//!
//! index region 每行一个 i64，指向该行负载在 data region 中的起始偏移。

use byteorder::{ByteOrder, LittleEndian};
use crate::common::{ReadError, Result, BIN_NULL_LEN, NULL_LEN};
use crate::memory::checked_slice;
use crate::utf8::{StringSink, Utf16Sink, Utf8View};

const STR_HEADER:     usize = 4;
const BIN_HEADER:     usize = 8;
const VARCHAR_HEADER: usize = 4;

// ── Utf16View ─────────────────────────────────────────────────────────────────

/// 借用自 data region 的 UTF-16LE 字符串，按需解码，不分配
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Utf16View<'a> {
    bytes: &'a [u8],
}

impl<'a> Utf16View<'a> {
    /// code unit 数
    pub fn len(&self) -> usize { self.bytes.len() / 2 }
    pub fn is_empty(&self) -> bool { self.bytes.is_empty() }

    /// 越界时为 `None`
    pub fn unit_at(&self, i: usize) -> Option<u16> {
        let lo = i.checked_mul(2)?;
        self.bytes.get(lo..lo.checked_add(2)?).map(LittleEndian::read_u16)
    }

    pub fn units(&self) -> impl Iterator<Item = u16> + 'a {
        self.bytes.chunks_exact(2).map(LittleEndian::read_u16)
    }

    pub fn write_to<S: Utf16Sink>(&self, sink: &mut S) {
        for u in self.units() { sink.put(u); }
    }

    /// 孤立代理替换为 U+FFFD
    pub fn to_string_lossy(&self) -> String {
        let mut sink = StringSink::new();
        self.write_to(&mut sink);
        sink.into_string()
    }

    pub fn eq_str(&self, s: &str) -> bool {
        let mut mine = self.units();
        for u in s.encode_utf16() {
            if mine.next() != Some(u) {
                return false;
            }
        }
        mine.next().is_none()
    }
}

// ── 读取 ──────────────────────────────────────────────────────────────────────

fn payload_offset(offset: i64) -> Result<u64> {
    u64::try_from(offset).map_err(|_| ReadError::Malformed(format!("negative data offset {offset}")))
}

pub fn read_str_len(data: &[u8], offset: i64) -> Result<i32> {
    let off = payload_offset(offset)?;
    Ok(LittleEndian::read_i32(checked_slice(data, off, STR_HEADER)?))
}

pub fn read_str(data: &[u8], offset: i64) -> Result<Option<Utf16View<'_>>> {
    let len = read_str_len(data, offset)?;
    if len == NULL_LEN {
        return Ok(None);
    }
    if len < 0 {
        return Err(ReadError::Malformed(format!("string length {len} at offset {offset}")));
    }
    let start = payload_offset(offset)? + STR_HEADER as u64;
    let bytes = checked_slice(data, start, len as usize * 2)?;
    Ok(Some(Utf16View { bytes }))
}

pub fn read_bin_len(data: &[u8], offset: i64) -> Result<i64> {
    let off = payload_offset(offset)?;
    Ok(LittleEndian::read_i64(checked_slice(data, off, BIN_HEADER)?))
}

pub fn read_bin(data: &[u8], offset: i64) -> Result<Option<&[u8]>> {
    let len = read_bin_len(data, offset)?;
    if len == BIN_NULL_LEN {
        return Ok(None);
    }
    let len = usize::try_from(len)
        .map_err(|_| ReadError::Malformed(format!("binary length {len} at offset {offset}")))?;
    let start = payload_offset(offset)? + BIN_HEADER as u64;
    Ok(Some(checked_slice(data, start, len)?))
}

/// VARCHAR 字节数；NULL 为 `NULL_LEN`
/// 读取 varchar 头；`None` 表示 NULL，其余负值视为损坏
fn varchar_header(data: &[u8], offset: i64) -> Result<Option<(u64, i32)>> {
    let off = payload_offset(offset)?;
    let hdr = LittleEndian::read_i32(checked_slice(data, off, VARCHAR_HEADER)?);
    if hdr == NULL_LEN {
        return Ok(None);
    }
    if hdr < 0 {
        return Err(ReadError::Malformed(format!("varchar header {hdr:#x} at offset {offset}")));
    }
    Ok(Some((off, hdr)))
}

pub fn read_varchar_size(data: &[u8], offset: i64) -> Result<i32> {
    Ok(varchar_header(data, offset)?.map_or(NULL_LEN, |(_, hdr)| hdr >> 1))
}

pub fn read_varchar(data: &[u8], offset: i64) -> Result<Option<Utf8View<'_>>> {
    let Some((off, hdr)) = varchar_header(data, offset)? else {
        return Ok(None);
    };
    let size  = (hdr >> 1) as usize;
    let ascii = hdr & 1 == 1;
    let bytes = checked_slice(data, off + VARCHAR_HEADER as u64, size)?;
    Ok(Some(Utf8View::new(bytes, ascii)))
}

// ── 追加（构建测试 / 演示快照用）──────────────────────────────────────────────

/// 追加一个 STRING 负载，返回其在 data region 中的偏移
pub fn append_str(data: &mut Vec<u8>, value: Option<&str>) -> i64 {
    let offset = data.len() as i64;
    match value {
        None => data.extend_from_slice(&NULL_LEN.to_le_bytes()),
        Some(s) => {
            let units: Vec<u16> = s.encode_utf16().collect();
            data.extend_from_slice(&(units.len() as i32).to_le_bytes());
            for u in units { data.extend_from_slice(&u.to_le_bytes()); }
        }
    }
    offset
}

pub fn append_bin(data: &mut Vec<u8>, value: Option<&[u8]>) -> i64 {
    let offset = data.len() as i64;
    match value {
        None => data.extend_from_slice(&BIN_NULL_LEN.to_le_bytes()),
        Some(b) => {
            data.extend_from_slice(&(b.len() as i64).to_le_bytes());
            data.extend_from_slice(b);
        }
    }
    offset
}

pub fn append_varchar(data: &mut Vec<u8>, value: Option<&str>) -> i64 {
    let offset = data.len() as i64;
    match value {
        None => data.extend_from_slice(&NULL_LEN.to_le_bytes()),
        Some(s) => {
            let hdr = ((s.len() as i32) << 1) | s.is_ascii() as i32;
            data.extend_from_slice(&hdr.to_le_bytes());
            data.extend_from_slice(s.as_bytes());
        }
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_payloads() {
        let mut data = Vec::new();
        let a = append_str(&mut data, Some("héllo😀"));
        let b = append_str(&mut data, None);
        let c = append_str(&mut data, Some(""));

        let v = read_str(&data, a).unwrap().unwrap();
        assert_eq!(v.len(), 7);
        assert!(v.eq_str("héllo😀"));
        assert!(!v.eq_str("héllo"));
        assert_eq!(v.to_string_lossy(), "héllo😀");
        assert_eq!(read_str_len(&data, a).unwrap(), 7);
        assert_eq!(v.unit_at(1), Some('é' as u16));
        assert_eq!(v.unit_at(5), Some(0xD83D));
        assert_eq!(v.unit_at(7), None);
        assert_eq!(v.unit_at(usize::MAX), None);

        assert!(read_str(&data, b).unwrap().is_none());
        assert_eq!(read_str_len(&data, b).unwrap(), NULL_LEN);

        let empty = read_str(&data, c).unwrap().unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn binary_and_varchar_payloads() {
        let mut data = Vec::new();
        let a = append_bin(&mut data, Some(&[1, 2, 3]));
        let b = append_bin(&mut data, None);
        let c = append_varchar(&mut data, Some("plain"));
        let d = append_varchar(&mut data, Some("ünï"));
        let e = append_varchar(&mut data, None);

        assert_eq!(read_bin(&data, a).unwrap(), Some(&[1u8, 2, 3][..]));
        assert_eq!(read_bin_len(&data, a).unwrap(), 3);
        assert_eq!(read_bin(&data, b).unwrap(), None);

        let plain = read_varchar(&data, c).unwrap().unwrap();
        assert!(plain.is_ascii());
        assert_eq!(plain.as_ascii_str(), Some("plain"));
        let uni = read_varchar(&data, d).unwrap().unwrap();
        assert!(!uni.is_ascii());
        assert_eq!(uni.to_string_checked().unwrap(), "ünï");
        assert_eq!(read_varchar_size(&data, d).unwrap(), "ünï".len() as i32);
        assert!(read_varchar(&data, e).unwrap().is_none());
        assert_eq!(read_varchar_size(&data, e).unwrap(), NULL_LEN);
    }

    #[test]
    fn corrupt_offsets_and_lengths_are_reported() {
        let mut data = Vec::new();
        append_str(&mut data, Some("abc"));
        assert!(matches!(read_str(&data, -8), Err(ReadError::Malformed(_))));
        assert!(matches!(read_str(&data, 100), Err(ReadError::OutOfBounds { .. })));

        // 长度字段超出 region
        let mut bad = Vec::new();
        bad.extend_from_slice(&50i32.to_le_bytes());
        assert!(matches!(read_str(&bad, 0), Err(ReadError::OutOfBounds { .. })));
        assert!(matches!(read_varchar(&(-4i32).to_le_bytes(), 0), Err(ReadError::Malformed(_))));
        assert!(matches!(read_varchar_size(&(-4i32).to_le_bytes(), 0), Err(ReadError::Malformed(_))));
        assert_eq!(read_varchar_size(&NULL_LEN.to_le_bytes(), 0).unwrap(), NULL_LEN);
    }
}
