//! UTF-8 视图与 UTF-16 / UTF-8 sink

use crate::common::Result;
use super::{decode, decode_unchecked, is_ascii, validate};

// ── Sink ──────────────────────────────────────────────────────────────────────

/// 接收 UTF-16 code unit 的目标缓冲
pub trait Utf16Sink {
    fn put(&mut self, unit: u16);
    fn clear(&mut self);
}

impl Utf16Sink for Vec<u16> {
    fn put(&mut self, unit: u16) { self.push(unit); }
    fn clear(&mut self) { Vec::clear(self); }
}

/// 接收 UTF-8 字节的目标缓冲
pub trait Utf8Sink {
    fn put(&mut self, b: u8);
    fn put_slice(&mut self, bytes: &[u8]) {
        for &b in bytes { self.put(b); }
    }
}

impl Utf8Sink for Vec<u8> {
    fn put(&mut self, b: u8) { self.push(b); }
    fn put_slice(&mut self, bytes: &[u8]) { self.extend_from_slice(bytes); }
}

/// 把 UTF-16 code unit 拼回 `String` 的可复用 sink
///
/// 高代理先暂存，遇到低代理时组合成一个 `char`；孤立代理写为 U+FFFD。
#[derive(Debug, Default, Clone)]
pub struct StringSink {
    buf:          String,
    pending_high: Option<u16>,
}

impl StringSink {
    pub fn new() -> Self { Self::default() }

    pub fn as_str(&self) -> &str { &self.buf }

    pub fn into_string(mut self) -> String {
        self.flush_pending();
        self.buf
    }

    fn flush_pending(&mut self) {
        if self.pending_high.take().is_some() {
            self.buf.push(char::REPLACEMENT_CHARACTER);
        }
    }
}

impl Utf16Sink for StringSink {
    fn put(&mut self, unit: u16) {
        match unit {
            0xD800..=0xDBFF => {
                self.flush_pending();
                self.pending_high = Some(unit);
            }
            0xDC00..=0xDFFF => match self.pending_high.take() {
                Some(hi) => {
                    let cp = 0x10000 + (((hi as u32) - 0xD800) << 10) + ((unit as u32) - 0xDC00);
                    self.buf.push(char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
                None => self.buf.push(char::REPLACEMENT_CHARACTER),
            },
            _ => {
                self.flush_pending();
                self.buf.push(char::from_u32(unit as u32).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
        }
    }

    fn clear(&mut self) {
        self.buf.clear();
        self.pending_high = None;
    }
}

// ── Utf8View ──────────────────────────────────────────────────────────────────

/// 借用自列内存的 UTF-8 字节序列，附带写入端给出的 ASCII 标志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Utf8View<'a> {
    bytes: &'a [u8],
    ascii: bool,
}

impl<'a> Utf8View<'a> {
    pub fn new(bytes: &'a [u8], ascii: bool) -> Self { Self { bytes, ascii } }

    /// 由字节推断 ASCII 标志
    pub fn of(bytes: &'a [u8]) -> Self { Self { bytes, ascii: is_ascii(bytes) } }

    pub fn bytes(&self) -> &'a [u8] { self.bytes }
    pub fn size(&self) -> usize { self.bytes.len() }
    pub fn is_empty(&self) -> bool { self.bytes.is_empty() }
    pub fn is_ascii(&self) -> bool { self.ascii }

    /// 字符数；ASCII 序列直接返回字节数
    pub fn char_len(&self) -> Result<usize> {
        if self.ascii { Ok(self.bytes.len()) } else { validate(self.bytes) }
    }

    /// ASCII 序列无需解码，直接按字节重解释为 `&str`
    pub fn as_ascii_str(&self) -> Option<&'a str> {
        if self.ascii { std::str::from_utf8(self.bytes).ok() } else { None }
    }

    /// 解码到 UTF-16 sink；`validate == false` 时跳过格式检查（仍不越界）
    pub fn to_utf16<S: Utf16Sink>(&self, sink: &mut S, validate: bool) -> Result<()> {
        if self.ascii {
            for &b in self.bytes { sink.put(b as u16); }
            return Ok(());
        }
        if validate {
            decode(self.bytes, sink)
        } else {
            decode_unchecked(self.bytes, sink);
            Ok(())
        }
    }

    pub fn to_string_checked(&self) -> Result<String> {
        if let Some(s) = self.as_ascii_str() {
            return Ok(s.to_owned());
        }
        let mut sink = StringSink::new();
        decode(self.bytes, &mut sink)?;
        Ok(sink.into_string())
    }
}
