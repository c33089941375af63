//! 符号列字典查询
//!
//! 符号列的定长 region 每行存一个 i32 key，由列级字典解析为字符串。
//! 字典由外部构建并在快照生命周期内保持不变，这里只负责查询。

use std::collections::HashMap;
use crate::common::SYMBOL_NULL_KEY;

/// 列级字典的查询契约
///
/// `value_of` 与 `value_b_of` 是两条独立的解析路径；返回值借用字典本身，
/// 两者可同时存活而互不覆盖。
pub trait SymbolTable: Send + Sync {
    fn value_of(&self, key: i32) -> Option<&str>;

    fn value_b_of(&self, key: i32) -> Option<&str> { self.value_of(key) }

    /// 反查 key；不存在的值返回 `None`
    fn key_of(&self, value: &str) -> Option<i32>;

    fn size(&self) -> usize;
}

/// 内存字典：key 即插入顺序
#[derive(Debug, Default, Clone)]
pub struct SymbolMap {
    values: Vec<String>,
    keys:   HashMap<String, i32>,
}

impl SymbolMap {
    pub fn new() -> Self { Self::default() }

    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = Self::new();
        for v in values { map.intern(v.as_ref()); }
        map
    }

    /// 返回已有 key，或追加新值并分配下一个 key
    pub fn intern(&mut self, value: &str) -> i32 {
        if let Some(&k) = self.keys.get(value) {
            return k;
        }
        let key = self.values.len() as i32;
        self.values.push(value.to_owned());
        self.keys.insert(value.to_owned(), key);
        key
    }

    /// NULL 值映射为 `SYMBOL_NULL_KEY`
    pub fn key_for(&mut self, value: Option<&str>) -> i32 {
        value.map_or(SYMBOL_NULL_KEY, |v| self.intern(v))
    }
}

impl SymbolTable for SymbolMap {
    fn value_of(&self, key: i32) -> Option<&str> {
        if key < 0 {
            return None;
        }
        self.values.get(key as usize).map(String::as_str)
    }

    fn key_of(&self, value: &str) -> Option<i32> { self.keys.get(value).copied() }

    fn size(&self) -> usize { self.values.len() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_assigns_dense_keys() {
        let mut m = SymbolMap::new();
        assert_eq!(m.intern("eur"), 0);
        assert_eq!(m.intern("usd"), 1);
        assert_eq!(m.intern("eur"), 0);
        assert_eq!(m.key_for(None), SYMBOL_NULL_KEY);
        assert_eq!(m.size(), 2);
        assert_eq!(m.key_of("usd"), Some(1));
        assert_eq!(m.key_of("gbp"), None);
    }

    #[test]
    fn a_and_b_lookups_do_not_alias() {
        let m = SymbolMap::from_values(["alpha", "beta"]);
        let a = m.value_of(0);
        let b = m.value_b_of(1);
        assert_eq!(a, Some("alpha"));
        assert_eq!(b, Some("beta"));
        assert_eq!(m.value_of(SYMBOL_NULL_KEY), None);
        assert_eq!(m.value_of(7), None);
    }
}
