//! 行游标协议
//!
//! - **DataFrameRowCursor** ：在单个 data frame `[row_lo, row_hi)` 内正向或反向逐行产出 RowId
//! - **TableRowCursor** ：串联 frame source 给出的所有 frame
//! - **LatestByValueCursor** ：找出某符号列等于给定 key 的最新一行（见 `latest_by`）

mod latest_by;

pub use latest_by::{LatestByValueCursor, SearchState};

use std::fmt;
use crate::common::{PartitionIndex, RowId, RowNumber};
use crate::snapshot::ColumnSource;

// ── DataFrame ─────────────────────────────────────────────────────────────────

/// 单个分区内连续的行区间 `[row_lo, row_hi)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFrame {
    pub partition_index: PartitionIndex,
    pub row_lo:          RowNumber,
    pub row_hi:          RowNumber,
}

impl DataFrame {
    pub fn new(partition_index: PartitionIndex, row_lo: RowNumber, row_hi: RowNumber) -> Self {
        Self { partition_index, row_lo, row_hi }
    }

    pub fn row_count(&self) -> u64 { (self.row_hi - self.row_lo).max(0) as u64 }

    pub fn is_empty(&self) -> bool { self.row_hi <= self.row_lo }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanDirection {
    #[default]
    Forward,
    Backward,
}

// ── Frame source ──────────────────────────────────────────────────────────────

/// 按既定顺序产出 data frame；latest-by 扫描要求最新的 frame 在前
pub trait DataFrameSource {
    fn next_frame(&mut self) -> Option<DataFrame>;
    fn to_top(&mut self);
}

/// 预先列好的 frame 序列
#[derive(Debug, Clone, Default)]
pub struct FrameList {
    frames: Vec<DataFrame>,
    pos:    usize,
}

impl FrameList {
    pub fn new(frames: Vec<DataFrame>) -> Self { Self { frames, pos: 0 } }

    /// 每个非空分区一个整分区 frame；`Backward` 时最新分区在前
    pub fn of_source<S: ColumnSource + ?Sized>(source: &S, direction: ScanDirection) -> Self {
        let mut frames: Vec<DataFrame> = (0..source.partition_count() as PartitionIndex)
            .map(|p| DataFrame::new(p, 0, source.partition_row_count(p)))
            .filter(|f| !f.is_empty())
            .collect();
        if direction == ScanDirection::Backward {
            frames.reverse();
        }
        Self::new(frames)
    }

    pub fn frames(&self) -> &[DataFrame] { &self.frames }
}

impl DataFrameSource for FrameList {
    fn next_frame(&mut self) -> Option<DataFrame> {
        let f = self.frames.get(self.pos).copied();
        if f.is_some() {
            self.pos += 1;
        }
        f
    }

    fn to_top(&mut self) { self.pos = 0; }
}

// ── RowCursor ─────────────────────────────────────────────────────────────────

pub trait RowCursor: Iterator<Item = RowId> {
    fn has_next(&self) -> bool;
    /// 回到起点，重新产出同一 frame 的行
    fn to_top(&mut self);
    /// 行数未知时为 `None`
    fn size(&self) -> Option<u64>;
}

#[derive(Debug, Clone)]
pub struct DataFrameRowCursor {
    frame:     DataFrame,
    direction: ScanDirection,
    current:   RowNumber,
}

impl DataFrameRowCursor {
    pub fn new(frame: DataFrame, direction: ScanDirection) -> Self {
        let mut c = Self { frame, direction, current: 0 };
        c.to_top();
        c
    }

    /// 复用游标打开另一个 frame
    pub fn of(&mut self, frame: DataFrame) {
        self.frame = frame;
        self.to_top();
    }

    pub fn frame(&self) -> DataFrame { self.frame }
}

impl RowCursor for DataFrameRowCursor {
    fn has_next(&self) -> bool {
        match self.direction {
            ScanDirection::Forward  => self.current < self.frame.row_hi,
            ScanDirection::Backward => self.current >= self.frame.row_lo,
        }
    }

    fn to_top(&mut self) {
        self.current = match self.direction {
            ScanDirection::Forward  => self.frame.row_lo,
            ScanDirection::Backward => self.frame.row_hi - 1,
        };
    }

    fn size(&self) -> Option<u64> { Some(self.frame.row_count()) }
}

impl Iterator for DataFrameRowCursor {
    type Item = RowId;

    fn next(&mut self) -> Option<RowId> {
        if !self.has_next() {
            return None;
        }
        let row = self.current;
        match self.direction {
            ScanDirection::Forward  => self.current += 1,
            ScanDirection::Backward => self.current -= 1,
        }
        Some(RowId::new(self.frame.partition_index, row))
    }
}

/// 按扫描方向为 frame 创建行游标
#[derive(Debug, Clone, Copy, Default)]
pub struct DataFrameRowCursorFactory {
    direction: ScanDirection,
}

impl DataFrameRowCursorFactory {
    pub fn new(direction: ScanDirection) -> Self { Self { direction } }

    pub fn direction(&self) -> ScanDirection { self.direction }

    pub fn cursor(&self, frame: DataFrame) -> DataFrameRowCursor {
        DataFrameRowCursor::new(frame, self.direction)
    }

    /// 每行都是表中的真实行
    pub fn is_entity(&self) -> bool { true }

    pub fn plan(&self) -> &'static str {
        match self.direction {
            ScanDirection::Forward  => "Row forward scan",
            ScanDirection::Backward => "Row backward scan",
        }
    }
}

impl fmt::Display for DataFrameRowCursorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.plan()) }
}

// ── TableRowCursor ────────────────────────────────────────────────────────────

/// 依次打开 frame source 中的每个 frame 并逐行产出
pub struct TableRowCursor<F: DataFrameSource> {
    frames:  F,
    factory: DataFrameRowCursorFactory,
    current: Option<DataFrameRowCursor>,
}

impl<F: DataFrameSource> TableRowCursor<F> {
    pub fn new(frames: F, factory: DataFrameRowCursorFactory) -> Self {
        Self { frames, factory, current: None }
    }

    pub fn to_top(&mut self) {
        self.frames.to_top();
        self.current = None;
    }
}

impl<F: DataFrameSource> Iterator for TableRowCursor<F> {
    type Item = RowId;

    fn next(&mut self) -> Option<RowId> {
        loop {
            if let Some(id) = self.current.as_mut().and_then(|c| c.next()) {
                return Some(id);
            }
            let frame = self.frames.next_frame()?;
            self.current = Some(self.factory.cursor(frame));
        }
    }
}
