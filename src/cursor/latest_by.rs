//! latest-by-value 游标
//!
//! 给定符号列与 key，返回该列等于 key 的最新一行。首次 `has_next` 时执行且只执行一次
//! 反向扫描：frame 按 source 给出的顺序（最新在前），frame 内从 `row_hi - 1` 到 `row_lo`。
//! 之后 `to_top` 只会重新产出已找到的那一行，不再扫描。
//!
//! ```text
//! Uninitialized ──has_next──▶ Searching ──▶ Found(row) / Exhausted
//!       ▲                         │
//!       │                    取消 / 读取失败
//!       │                         ▼
//!       └──── reset / of ───── Failed
//! ```
//!
//! 失败只报告一次：之后 `has_next` 返回 `false`，迭代器结束，直到显式 `reset` 或 `of`。

use log::{debug, trace, warn};
use crate::cancel::CancellationSignal;
use crate::common::{ColumnIndex, ColumnType, ReadError, Result, RowId};
use crate::record::TableRecord;
use crate::snapshot::ColumnSource;
use super::DataFrameSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Uninitialized,
    Searching,
    Found(RowId),
    Exhausted,
    /// 上一次搜索被取消或读取失败
    Failed,
}

pub struct LatestByValueCursor<'a, S, F, C>
where
    S: ColumnSource + ?Sized,
    F: DataFrameSource,
    C: CancellationSignal,
{
    frames:       F,
    record:       TableRecord<'a, S>,
    column:       ColumnIndex,
    symbol_key:   i32,
    // 值不在字典中时不可能匹配
    key_known:    bool,
    signal:       C,
    state:        SearchState,
    // to_top 之后是否还有一行待产出
    has_next:     bool,
    rows_scanned: u64,
}

impl<'a, S, F, C> LatestByValueCursor<'a, S, F, C>
where
    S: ColumnSource + ?Sized,
    F: DataFrameSource,
    C: CancellationSignal,
{
    /// `column` 必须是符号列
    pub fn new(source: &'a S, frames: F, column: ColumnIndex, symbol_key: i32, signal: C) -> Result<Self> {
        let record = TableRecord::new(source);
        check_symbol_column(&record, column)?;
        Ok(Self {
            frames,
            record,
            column,
            symbol_key,
            key_known:    true,
            signal,
            state:        SearchState::Uninitialized,
            has_next:     false,
            rows_scanned: 0,
        })
    }

    /// 先经列字典把值换成 key；字典中不存在的值不可能匹配，游标直接耗尽
    pub fn for_value(source: &'a S, frames: F, column: ColumnIndex, value: &str, signal: C) -> Result<Self> {
        let key = source.symbol_table(column).and_then(|t| t.key_of(value));
        let mut cursor = Self::new(source, frames, column, key.unwrap_or(crate::common::SYMBOL_NULL_KEY), signal)?;
        if key.is_none() {
            cursor.key_known = false;
            cursor.state     = SearchState::Exhausted;
        }
        Ok(cursor)
    }

    /// 重新绑定到另一个快照与 frame source，下一次 `has_next` 重新搜索；
    /// 符号 key 不变，新快照须共享同一字典
    pub fn of(&mut self, source: &'a S, frames: F) -> Result<()> {
        check_symbol_column(&TableRecord::new(source), self.column)?;
        self.record.of(source);
        self.frames = frames;
        self.reset();
        Ok(())
    }

    /// 丢弃上一次的搜索结果（包括失败），frame source 回到起点
    pub fn reset(&mut self) {
        self.frames.to_top();
        self.state        = if self.key_known { SearchState::Uninitialized } else { SearchState::Exhausted };
        self.has_next     = false;
        self.rows_scanned = 0;
    }

    pub fn has_next(&mut self) -> Result<bool> {
        if self.state == SearchState::Uninitialized {
            self.find()?;
            self.to_top();
        }
        if self.has_next {
            self.has_next = false;
            if let SearchState::Found(id) = self.state {
                self.record.jump_to_row_id(id);
            }
            return Ok(true);
        }
        Ok(false)
    }

    /// 重新产出已找到的行；搜索尚未执行时不触发搜索
    pub fn to_top(&mut self) {
        self.has_next = matches!(self.state, SearchState::Found(_));
    }

    /// 游标从不预先计数
    pub fn size(&self) -> Option<u64> { None }

    pub fn state(&self) -> SearchState { self.state }

    pub fn rows_scanned(&self) -> u64 { self.rows_scanned }

    /// 定位在已找到行上的视图
    pub fn record(&self) -> &TableRecord<'a, S> { &self.record }

    pub fn frames(&self) -> &F { &self.frames }

    pub fn plan(&self) -> String {
        let source = self.record.source();
        let name = source.column_name(self.column).unwrap_or("?");
        format!("Row backward scan\n  symbolFilter: {}={}", name, self.symbol_key)
    }

    fn find(&mut self) -> Result<()> {
        self.state = SearchState::Searching;
        match self.scan() {
            Ok(found) => {
                self.state = found.map_or(SearchState::Exhausted, SearchState::Found);
                let limit = self.record.source().config().scan_log_rows;
                if self.rows_scanned >= limit {
                    debug!(
                        "latest-by on column {} key {}: {:?} after {} rows",
                        self.column, self.symbol_key, self.state, self.rows_scanned
                    );
                } else {
                    trace!(
                        "latest-by on column {} key {}: {:?} after {} rows",
                        self.column, self.symbol_key, self.state, self.rows_scanned
                    );
                }
                Ok(())
            }
            Err(e) => {
                if e.is_cancelled() {
                    warn!("latest-by scan cancelled after {} rows", self.rows_scanned);
                }
                self.state = SearchState::Failed;
                self.frames.to_top();
                Err(e)
            }
        }
    }

    fn scan(&mut self) -> Result<Option<RowId>> {
        self.rows_scanned = 0;
        while let Some(frame) = self.frames.next_frame() {
            trace!("latest-by frame {:?}", frame);
            let mut row = frame.row_hi - 1;
            self.record.jump_to(frame.partition_index, row);
            while row >= frame.row_lo {
                self.signal.check()?;
                self.record.set_row(row);
                self.rows_scanned += 1;
                if self.record.get_sym_key(self.column)? == self.symbol_key {
                    return Ok(Some(self.record.row_id()));
                }
                row -= 1;
            }
        }
        Ok(None)
    }
}

fn check_symbol_column<S: ColumnSource + ?Sized>(record: &TableRecord<'_, S>, column: ColumnIndex) -> Result<()> {
    let actual = record.column_type(column)?;
    if actual != ColumnType::Symbol {
        return Err(ReadError::TypeMismatch { column, expected: "SYMBOL", actual });
    }
    Ok(())
}

impl<'a, S, F, C> Iterator for LatestByValueCursor<'a, S, F, C>
where
    S: ColumnSource + ?Sized,
    F: DataFrameSource,
    C: CancellationSignal,
{
    type Item = Result<RowId>;

    fn next(&mut self) -> Option<Result<RowId>> {
        match self.has_next() {
            Ok(true)  => Some(Ok(self.record.row_id())),
            Ok(false) => None,
            Err(e)    => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use crate::cancel::{CancelFlag, NeverCancel};
    use crate::cursor::{DataFrame, FrameList, ScanDirection};
    use crate::field_type::{ColumnMeta, Value};
    use crate::snapshot::{TableSnapshot, TableSnapshotBuilder};

    /// 统计完整扫描（从第一个 frame 开始）的次数
    struct CountingFrames {
        inner:      FrameList,
        fetched:    usize,
        full_scans: usize,
    }

    impl CountingFrames {
        fn new(inner: FrameList) -> Self { Self { inner, fetched: 0, full_scans: 0 } }
    }

    impl DataFrameSource for CountingFrames {
        fn next_frame(&mut self) -> Option<DataFrame> {
            if self.fetched == 0 {
                self.full_scans += 1;
            }
            self.fetched += 1;
            self.inner.next_frame()
        }

        fn to_top(&mut self) {
            self.fetched = 0;
            self.inner.to_top();
        }
    }

    /// 第 `limit` 次检查之后触发取消
    struct TripAfter {
        checks: Cell<u64>,
        limit:  u64,
    }

    impl CancellationSignal for TripAfter {
        fn is_cancelled(&self) -> bool {
            let n = self.checks.get() + 1;
            self.checks.set(n);
            n > self.limit
        }
    }

    /// 三个分区，每个分区 4 行；sym 列按 (partition, row) 取值
    fn snapshot() -> TableSnapshot {
        let cols = vec![
            ColumnMeta::new(0, "ts",  ColumnType::Timestamp),
            ColumnMeta::new(1, "sym", ColumnType::Symbol),
        ];
        let data: [[&str; 4]; 3] = [
            ["a", "b", "a", "c"],
            ["b", "b", "c", "b"],
            ["c", "a", "b", "b"],
        ];
        let mut b = TableSnapshotBuilder::new(cols).with_symbols(1, ["a", "b", "c", "d"]);
        for (p, rows) in data.iter().enumerate() {
            let rows = rows.iter().enumerate().map(|(r, s)| vec![
                Value::Timestamp((p * 10 + r) as i64),
                Value::Symbol(s.to_string()),
            ]);
            b.add_partition(&[0, 0], rows).unwrap();
        }
        b.build()
    }

    fn key(snap: &TableSnapshot, v: &str) -> i32 {
        snap.symbol_table(1).unwrap().key_of(v).unwrap()
    }

    fn newest_first(snap: &TableSnapshot) -> CountingFrames {
        CountingFrames::new(FrameList::of_source(snap, ScanDirection::Backward))
    }

    #[test]
    fn finds_the_most_recent_matching_row() {
        let snap = snapshot();
        for (v, expected) in [("a", RowId::new(2, 1)), ("c", RowId::new(2, 0)), ("b", RowId::new(2, 3))] {
            let mut c = LatestByValueCursor::new(&snap, newest_first(&snap), 1, key(&snap, v), NeverCancel).unwrap();
            assert!(c.has_next().unwrap());
            assert_eq!(c.record().row_id(), expected);
            assert_eq!(c.record().get_sym_a(1).unwrap(), Some(v));
            assert!(!c.has_next().unwrap());
        }
    }

    #[test]
    fn search_crosses_into_older_partitions() {
        let snap = snapshot();
        // 只扫描分区 0 和 1，最新的在前
        let frames = FrameList::new(vec![DataFrame::new(1, 0, 4), DataFrame::new(0, 0, 4)]);
        let mut c = LatestByValueCursor::new(&snap, frames, 1, key(&snap, "a"), NeverCancel).unwrap();
        assert_eq!(c.next().unwrap().unwrap(), RowId::new(0, 2));
        assert_eq!(c.rows_scanned(), 6);
        assert_eq!(c.state(), SearchState::Found(RowId::new(0, 2)));
    }

    #[test]
    fn reports_not_found() {
        let snap = snapshot();
        let mut c = LatestByValueCursor::new(&snap, newest_first(&snap), 1, key(&snap, "d"), NeverCancel).unwrap();
        assert!(!c.has_next().unwrap());
        assert_eq!(c.state(), SearchState::Exhausted);
        assert_eq!(c.rows_scanned(), 12);
        c.to_top();
        assert!(!c.has_next().unwrap());
        assert_eq!(c.size(), None);
    }

    #[test]
    fn to_top_replays_without_rescanning() {
        let snap = snapshot();
        let mut c = LatestByValueCursor::new(&snap, newest_first(&snap), 1, key(&snap, "a"), NeverCancel).unwrap();
        assert!(c.has_next().unwrap());
        let first = c.record().row_id();
        assert!(!c.has_next().unwrap());

        for _ in 0..3 {
            c.to_top();
            assert!(c.has_next().unwrap());
            assert_eq!(c.record().row_id(), first);
            assert!(!c.has_next().unwrap());
        }
        assert_eq!(c.frames().full_scans, 1);
    }

    #[test]
    fn to_top_and_size_before_advancing_do_not_search() {
        let snap = snapshot();
        let mut c = LatestByValueCursor::new(&snap, newest_first(&snap), 1, key(&snap, "b"), NeverCancel).unwrap();
        c.to_top();
        assert_eq!(c.size(), None);
        assert_eq!(c.state(), SearchState::Uninitialized);
        assert_eq!(c.frames().full_scans, 0);

        assert!(c.has_next().unwrap());
        assert_eq!(c.record().row_id(), RowId::new(2, 3));
        assert_eq!(c.frames().full_scans, 1);
    }

    #[test]
    fn cancellation_is_polled_per_row_and_aborts() {
        let snap = snapshot();
        let signal = TripAfter { checks: Cell::new(0), limit: 5 };
        let mut c = LatestByValueCursor::new(&snap, newest_first(&snap), 1, key(&snap, "d"), &signal).unwrap();
        let err = c.has_next().unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(signal.checks.get(), 6);
        assert_eq!(c.rows_scanned(), 5);
        assert_eq!(c.state(), SearchState::Failed);

        let flag = CancelFlag::new();
        flag.cancel();
        let mut c = LatestByValueCursor::new(&snap, newest_first(&snap), 1, key(&snap, "a"), flag.clone()).unwrap();
        assert!(c.next().unwrap().is_err());
        flag.reset();
        // 失败后不再自动重试
        assert!(c.next().is_none());
        c.reset();
        assert_eq!(c.next().unwrap().unwrap(), RowId::new(2, 1));
    }

    #[test]
    fn cancelled_cursor_reports_once_then_ends() {
        let snap = snapshot();
        let flag = CancelFlag::new();
        flag.cancel();
        let c = LatestByValueCursor::new(&snap, newest_first(&snap), 1, key(&snap, "b"), flag).unwrap();
        let results: Vec<_> = c.take(100).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].as_ref().unwrap_err().is_cancelled());

        let flag = CancelFlag::new();
        flag.cancel();
        let mut c = LatestByValueCursor::new(&snap, newest_first(&snap), 1, key(&snap, "b"), &flag).unwrap();
        assert!(c.has_next().is_err());
        c.to_top();
        assert!(!c.has_next().unwrap());
        assert_eq!(c.frames().full_scans, 1);
    }

    #[test]
    fn of_rebinds_to_another_frame_source() {
        let snap = snapshot();
        let other = snapshot();
        let mut c = LatestByValueCursor::new(&snap, newest_first(&snap), 1, key(&snap, "a"), NeverCancel).unwrap();
        assert_eq!(c.next().unwrap().unwrap(), RowId::new(2, 1));
        assert!(c.next().is_none());

        // 只看分区 0
        c.of(&snap, CountingFrames::new(FrameList::new(vec![DataFrame::new(0, 0, 4)]))).unwrap();
        assert_eq!(c.state(), SearchState::Uninitialized);
        assert_eq!(c.rows_scanned(), 0);
        assert_eq!(c.next().unwrap().unwrap(), RowId::new(0, 2));
        assert_eq!(c.rows_scanned(), 2);
        assert_eq!(c.frames().full_scans, 1);

        // 另一个快照，同一字典
        c.of(&other, newest_first(&other)).unwrap();
        assert_eq!(c.next().unwrap().unwrap(), RowId::new(2, 1));
        assert!(std::ptr::eq(c.record().source(), &other));

        let mut plain = TableSnapshotBuilder::new(vec![ColumnMeta::new(0, "ts", ColumnType::Timestamp)]);
        plain.add_partition(&[0], vec![vec![Value::Timestamp(1)]]).unwrap();
        let plain = plain.build();
        let mut c = LatestByValueCursor::new(&snap, newest_first(&snap), 1, 0, NeverCancel).unwrap();
        assert!(matches!(c.of(&plain, newest_first(&plain)).unwrap_err(), ReadError::ColumnOutOfBounds { .. }));
    }

    #[test]
    fn construction_and_plan() {
        let snap = snapshot();
        let err = LatestByValueCursor::new(&snap, newest_first(&snap), 0, 0, NeverCancel).err().unwrap();
        assert!(matches!(err, ReadError::TypeMismatch { column: 0, .. }));

        let c = LatestByValueCursor::new(&snap, newest_first(&snap), 1, 2, NeverCancel).unwrap();
        assert_eq!(c.plan(), "Row backward scan\n  symbolFilter: sym=2");

        let mut missing = LatestByValueCursor::for_value(&snap, newest_first(&snap), 1, "zzz", NeverCancel).unwrap();
        assert!(!missing.has_next().unwrap());
        missing.reset();
        assert_eq!(missing.state(), SearchState::Exhausted);
        assert!(!missing.has_next().unwrap());
        assert_eq!(missing.frames().full_scans, 0);

        let mut found = LatestByValueCursor::for_value(&snap, newest_first(&snap), 1, "c", NeverCancel).unwrap();
        assert_eq!(found.next().unwrap().unwrap(), RowId::new(2, 0));
    }
}
