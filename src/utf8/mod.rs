//! UTF-8 编解码与字节级文本运算
//!
//! 所有函数直接作用于 `&[u8]`，不做中间分配：
//! - **validate / decode** ：严格校验，遇到第一个非法序列立即失败（fail closed）；
//!   多字节辅助函数先检查剩余长度再读取后续字节，畸形输入也不会越界
//! - **compare / equals** ：按无符号字节序比较（与 UTF-16 code unit 序不同：
//!   BMP 之外的码点在两种序下排序不一致），`None` 小于任何序列
//! - **ASCII 模式搜索** ：区分 / 不区分大小写（模式须由调用方预先转小写）、
//!   前后缀、第 n 次出现（负数表示从尾部数起）
//!
//! 除 validate / decode 外，其余函数假定输入为合法 UTF-8。

mod sequence;

pub use sequence::{StringSink, Utf16Sink, Utf8Sink, Utf8View};

use std::cmp::Ordering;
use byteorder::{ByteOrder, LittleEndian};
use crate::common::{ReadError, Result};

const ASCII_MASK: u64 = 0x8080_8080_8080_8080;

// ── 多字节解码原语 ────────────────────────────────────────────────────────────

/// 单个字符解码结果：BMP 字符为一个 code unit，补充平面为代理对
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Units {
    One(u16),
    Pair(u16, u16),
}

#[inline]
fn is_continuation(b: u8) -> bool { b & 0xC0 == 0x80 }

/// 解码 `bytes[i..]` 处以 `lead` 开头的多字节序列，返回 (宽度, code unit)
#[inline]
fn decode_multi_byte(bytes: &[u8], i: usize) -> Option<(usize, Units)> {
    let rest = &bytes[i..];
    let lead = rest[0];
    match lead {
        // 0xC0 / 0xC1 只能产生过长编码
        0xC2..=0xDF => {
            if rest.len() < 2 || !is_continuation(rest[1]) {
                return None;
            }
            let c = ((lead as u16 & 0x1F) << 6) | (rest[1] as u16 & 0x3F);
            Some((2, Units::One(c)))
        }
        0xE0..=0xEF => {
            if rest.len() < 3 {
                return None;
            }
            let (b2, b3) = (rest[1], rest[2]);
            if !is_continuation(b2) || !is_continuation(b3) || (lead == 0xE0 && b2 < 0xA0) {
                return None;
            }
            let c = ((lead as u16 & 0x0F) << 12) | ((b2 as u16 & 0x3F) << 6) | (b3 as u16 & 0x3F);
            if (0xD800..=0xDFFF).contains(&c) {
                return None;
            }
            Some((3, Units::One(c)))
        }
        0xF0..=0xF7 => {
            if rest.len() < 4 {
                return None;
            }
            let (b2, b3, b4) = (rest[1], rest[2], rest[3]);
            if !is_continuation(b2) || !is_continuation(b3) || !is_continuation(b4) {
                return None;
            }
            let cp = ((lead as u32 & 0x07) << 18)
                | ((b2 as u32 & 0x3F) << 12)
                | ((b3 as u32 & 0x3F) << 6)
                | (b4 as u32 & 0x3F);
            if !(0x10000..=0x10FFFF).contains(&cp) {
                return None;
            }
            let v = cp - 0x10000;
            Some((4, Units::Pair(0xD800 + (v >> 10) as u16, 0xDC00 + (v & 0x3FF) as u16)))
        }
        _ => None,
    }
}

#[inline]
fn put_units<S: Utf16Sink>(sink: &mut S, units: Units) {
    match units {
        Units::One(c)        => sink.put(c),
        Units::Pair(hi, lo)  => { sink.put(hi); sink.put(lo); }
    }
}

// ── 校验 / 解码 ───────────────────────────────────────────────────────────────

/// 整段是否全为 ASCII（按 8 字节字长批量检查）
pub fn is_ascii(bytes: &[u8]) -> bool {
    let mut chunks = bytes.chunks_exact(8);
    for chunk in &mut chunks {
        if LittleEndian::read_u64(chunk) & ASCII_MASK != 0 {
            return false;
        }
    }
    chunks.remainder().iter().all(|&b| b < 0x80)
}

/// 校验 UTF-8 并返回字符（码点）数
///
/// 空输入返回 `Ok(0)`，与非法输入的 `Err(InvalidUtf8)` 可区分。
pub fn validate(bytes: &[u8]) -> Result<usize> {
    let mut len = 0usize;
    let mut i   = 0usize;
    while i < bytes.len() {
        // ASCII 快速路径：整字跳过
        if i + 8 <= bytes.len() && LittleEndian::read_u64(&bytes[i..i + 8]) & ASCII_MASK == 0 {
            i   += 8;
            len += 8;
            continue;
        }
        if bytes[i] < 0x80 {
            i += 1;
        } else {
            let (n, _) = decode_multi_byte(bytes, i)
                .ok_or(ReadError::InvalidUtf8 { position: i })?;
            i += n;
        }
        len += 1;
    }
    Ok(len)
}

/// 解码为 UTF-16；失败时 sink 内容处于未定义状态，调用方应先 `clear`
pub fn decode<S: Utf16Sink>(bytes: &[u8], sink: &mut S) -> Result<()> {
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        if b < 0x80 {
            sink.put(b as u16);
            i += 1;
        } else {
            let (n, units) = decode_multi_byte(bytes, i)
                .ok_or(ReadError::InvalidUtf8 { position: i })?;
            put_units(sink, units);
            i += n;
        }
    }
    Ok(())
}

/// 解码直到遇到 ASCII 终止字节（不消费），返回已读取的字节数
pub fn decode_until<S: Utf16Sink>(bytes: &[u8], sink: &mut S, terminator: u8) -> Result<usize> {
    debug_assert!(terminator < 0x80, "terminator must be ASCII");
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        if b == terminator {
            return Ok(i);
        }
        if b < 0x80 {
            sink.put(b as u16);
            i += 1;
        } else {
            let (n, units) = decode_multi_byte(bytes, i)
                .ok_or(ReadError::InvalidUtf8 { position: i })?;
            put_units(sink, units);
            i += n;
        }
    }
    Ok(i)
}

/// 写入端保证合法时使用的解码：不检查续字节位型，只保证不越界，截断的尾部被丢弃
pub fn decode_unchecked<S: Utf16Sink>(bytes: &[u8], sink: &mut S) {
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        let n = match b {
            0x00..=0xBF => 1,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            _           => 4,
        };
        if i + n > bytes.len() {
            return;
        }
        let s = &bytes[i..i + n];
        match n {
            1 => sink.put(if b < 0x80 { b as u16 } else { 0xFFFD }),
            2 => sink.put(((b as u16 & 0x1F) << 6) | (s[1] as u16 & 0x3F)),
            3 => sink.put(((b as u16 & 0x0F) << 12) | ((s[1] as u16 & 0x3F) << 6) | (s[2] as u16 & 0x3F)),
            _ => {
                let cp = ((b as u32 & 0x07) << 18)
                    | ((s[1] as u32 & 0x3F) << 12)
                    | ((s[2] as u32 & 0x3F) << 6)
                    | (s[3] as u32 & 0x3F);
                let v = cp.wrapping_sub(0x10000) & 0xFFFFF;
                sink.put(0xD800 + (v >> 10) as u16);
                sink.put(0xDC00 + (v & 0x3FF) as u16);
            }
        }
        i += n;
    }
}

/// 解码首个 1~3 字节字符，返回 (消费字节数, code unit)；非法或需代理对时返回 `None`
pub fn decode_char(bytes: &[u8]) -> Option<(usize, u16)> {
    let b = *bytes.first()?;
    if b < 0x80 {
        return Some((1, b as u16));
    }
    match decode_multi_byte(bytes, 0)? {
        (n, Units::One(c)) => Some((n, c)),
        (_, Units::Pair(..)) => None,
    }
}

// ── 比较 ──────────────────────────────────────────────────────────────────────

/// 按无符号字节序比较；`None` 排在任何序列之前，前缀较短者较小
pub fn compare(l: Option<&[u8]>, r: Option<&[u8]>) -> Ordering {
    match (l, r) {
        (None, None)       => Ordering::Equal,
        (None, Some(_))    => Ordering::Less,
        (Some(_), None)    => Ordering::Greater,
        (Some(l), Some(r)) => {
            let min = l.len().min(r.len());
            for i in 0..min {
                match l[i].cmp(&r[i]) {
                    Ordering::Equal => {}
                    ord             => return ord,
                }
            }
            l.len().cmp(&r.len())
        }
    }
}

pub fn equals(l: &[u8], r: &[u8]) -> bool {
    if l.len() != r.len() {
        return false;
    }
    // 8 字节一组比较，剩余部分逐字节
    let mut lc = l.chunks_exact(8);
    let mut rc = r.chunks_exact(8);
    for (a, b) in (&mut lc).zip(&mut rc) {
        if LittleEndian::read_u64(a) != LittleEndian::read_u64(b) {
            return false;
        }
    }
    lc.remainder() == rc.remainder()
}

/// 可为空的相等比较：两者都为 `None` 视为相等
pub fn equals_nc(l: Option<&[u8]>, r: Option<&[u8]>) -> bool {
    match (l, r) {
        (None, None)       => true,
        (Some(l), Some(r)) => equals(l, r),
        _                  => false,
    }
}

pub fn equals_ascii(ascii: &str, seq: &[u8]) -> bool {
    ascii.as_bytes() == seq
}

pub fn equals_ignore_case_ascii(l: &[u8], r: &[u8]) -> bool {
    l.len() == r.len()
        && l.iter().zip(r).all(|(&a, &b)| to_lower_case_ascii(a) == to_lower_case_ascii(b))
}

/// 不经缓冲直接比较 UTF-16 与 UTF-8 文本
pub fn equals_utf16(utf16: &[u16], seq: &[u8]) -> bool {
    let (mut ci, mut ui) = (0usize, 0usize);
    while ui < seq.len() && ci < utf16.len() {
        let b = seq[ui];
        if b < 0x80 {
            if utf16[ci] != b as u16 {
                return false;
            }
            ci += 1;
            ui += 1;
            continue;
        }
        match decode_multi_byte(seq, ui) {
            Some((n, Units::One(c))) => {
                if utf16[ci] != c {
                    return false;
                }
                ci += 1;
                ui += n;
            }
            Some((n, Units::Pair(hi, lo))) => {
                if ci + 1 >= utf16.len() || utf16[ci] != hi || utf16[ci + 1] != lo {
                    return false;
                }
                ci += 2;
                ui += n;
            }
            None => return false,
        }
    }
    ui == seq.len() && ci == utf16.len()
}

// ── 搜索 ──────────────────────────────────────────────────────────────────────

#[inline]
fn to_lower_case_ascii(b: u8) -> u8 {
    if b.is_ascii_uppercase() { b + 32 } else { b }
}

/// 在 `seq[lo..hi]` 中查找 `term` 的首次出现；空 term 匹配在 `lo`
pub fn index_of(seq: &[u8], lo: usize, hi: usize, term: &[u8]) -> Option<usize> {
    let n = term.len();
    if n == 0 {
        return Some(lo);
    }
    let hi = hi.min(seq.len());
    if hi < lo + n {
        return None;
    }
    let first = term[0];
    (lo..=hi - n).find(|&i| seq[i] == first && seq[i + 1..i + n] == term[1..])
}

pub fn contains(seq: &[u8], term: &[u8]) -> bool {
    index_of(seq, 0, seq.len(), term).is_some()
}

pub fn contains_ascii(seq: &[u8], ascii_term: &str) -> bool {
    contains(seq, ascii_term.as_bytes())
}

/// 不区分大小写的查找；`term_lc` 须已是小写 ASCII
pub fn index_of_lower_case_ascii(seq: &[u8], lo: usize, hi: usize, term_lc: &[u8]) -> Option<usize> {
    let n = term_lc.len();
    if n == 0 {
        return Some(lo);
    }
    let hi = hi.min(seq.len());
    if hi < lo + n {
        return None;
    }
    (lo..=hi - n).find(|&i| {
        seq[i..i + n].iter().zip(term_lc).all(|(&b, &t)| to_lower_case_ascii(b) == t)
    })
}

pub fn contains_lower_case_ascii(seq: &[u8], term_lc: &[u8]) -> bool {
    index_of_lower_case_ascii(seq, 0, seq.len(), term_lc).is_some()
}

/// 第 `occurrence` 次出现的 ASCII 字符位置；负数从尾部计数，0 恒为 `None`
pub fn index_of_ascii_char(seq: &[u8], lo: usize, hi: usize, c: u8, occurrence: i32) -> Option<usize> {
    let hi = hi.min(seq.len());
    if occurrence == 0 || lo >= hi {
        return None;
    }
    let range = &seq[lo..hi];
    let nth   = occurrence.unsigned_abs() as usize - 1;
    if occurrence > 0 {
        range.iter().enumerate().filter(|&(_, &b)| b == c).nth(nth).map(|(i, _)| lo + i)
    } else {
        range.iter().enumerate().rev().filter(|&(_, &b)| b == c).nth(nth).map(|(i, _)| lo + i)
    }
}

/// 第 `occurrence` 次（不重叠）出现的 ASCII 子串位置；负数从尾部计数
///
/// 空 term 与 `occurrence == 0` 均返回 `None`。
pub fn index_of_ascii_term(seq: &[u8], lo: usize, hi: usize, ascii_term: &str, occurrence: i32) -> Option<usize> {
    let term = ascii_term.as_bytes();
    let n    = term.len();
    let hi   = hi.min(seq.len());
    if n == 0 || occurrence == 0 || hi < lo + n {
        return None;
    }
    let mut count = 0i32;
    if occurrence > 0 {
        let mut i = lo;
        while i + n <= hi {
            if &seq[i..i + n] == term {
                count += 1;
                if count == occurrence {
                    return Some(i);
                }
                i += n;
            } else {
                i += 1;
            }
        }
    } else {
        let mut end = hi;
        while end >= lo + n {
            let start = end - n;
            if &seq[start..end] == term {
                count -= 1;
                if count == occurrence {
                    return Some(start);
                }
                end = start;
            } else {
                end -= 1;
            }
        }
    }
    None
}

pub fn last_index_of_ascii(seq: &[u8], c: u8) -> Option<usize> {
    seq.iter().rposition(|&b| b == c)
}

pub fn starts_with(seq: &[u8], prefix: &[u8]) -> bool {
    seq.len() >= prefix.len() && equals(&seq[..prefix.len()], prefix)
}

pub fn starts_with_ascii(seq: &[u8], ascii_prefix: &str) -> bool {
    starts_with(seq, ascii_prefix.as_bytes())
}

/// `prefix_lc` 须已是小写 ASCII
pub fn starts_with_lower_case_ascii(seq: &[u8], prefix_lc: &[u8]) -> bool {
    seq.len() >= prefix_lc.len()
        && seq.iter().zip(prefix_lc).all(|(&b, &p)| to_lower_case_ascii(b) == p)
}

pub fn ends_with(seq: &[u8], suffix: &[u8]) -> bool {
    seq.len() >= suffix.len() && equals(&seq[seq.len() - suffix.len()..], suffix)
}

pub fn ends_with_ascii(seq: &[u8], ascii_suffix: &str) -> bool {
    ends_with(seq, ascii_suffix.as_bytes())
}

pub fn ends_with_ascii_char(seq: &[u8], c: u8) -> bool {
    seq.last() == Some(&c)
}

/// `suffix_lc` 须已是小写 ASCII
pub fn ends_with_lower_case_ascii(seq: &[u8], suffix_lc: &[u8]) -> bool {
    seq.len() >= suffix_lc.len()
        && seq[seq.len() - suffix_lc.len()..]
            .iter()
            .zip(suffix_lc)
            .all(|(&b, &s)| to_lower_case_ascii(b) == s)
}

// ── 哈希 / 拷贝 ───────────────────────────────────────────────────────────────

/// 31 乘数滚动哈希（字节按有符号参与），跨进程稳定
pub fn hash_code(seq: &[u8]) -> i32 {
    seq.iter().fold(0i32, |h, &b| h.wrapping_mul(31).wrapping_add(b as i8 as i32))
}

pub fn lower_case_ascii_hash_code(seq: &[u8]) -> i32 {
    seq.iter()
        .fold(0i32, |h, &b| h.wrapping_mul(31).wrapping_add(to_lower_case_ascii(b) as i8 as i32))
}

/// 按字符区间 `[char_lo, char_hi)` 拷贝 UTF-8 字节，返回拷贝的字节数
pub fn str_cpy_chars<S: Utf8Sink>(
    seq:     Utf8View<'_>,
    char_lo: usize,
    char_hi: usize,
    sink:    &mut S,
) -> Result<usize> {
    let bytes = seq.bytes();
    if seq.is_ascii() {
        let hi = char_hi.min(bytes.len());
        let lo = char_lo.min(hi);
        sink.put_slice(&bytes[lo..hi]);
        return Ok(hi - lo);
    }
    let mut copied = 0usize;
    let mut pos    = 0usize;
    let mut i      = 0usize;
    while i < bytes.len() && pos < char_hi {
        let n = if bytes[i] < 0x80 {
            1
        } else {
            decode_multi_byte(bytes, i)
                .ok_or(ReadError::InvalidUtf8 { position: i })?
                .0
        };
        if pos >= char_lo {
            sink.put_slice(&bytes[i..i + n]);
            copied += n;
        }
        i   += n;
        pos += 1;
    }
    Ok(copied)
}
