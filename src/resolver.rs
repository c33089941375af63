//! 列地址解析：(column base, 列序号, 行号) → 物理 region + 字节偏移
//!
//! ```text
//! regions: │ p0.c0 data │ p0.c0 index │ p0.c1 data │ p0.c1 index │ ... │ p1.c0 data │ ...
//!           ▲ column_base(p0)                                          ▲ column_base(p1)
//! ```
//!
//! 每列固定占两个槽位：定长列与符号列只使用第一个，变长列第一个是 data region、
//! 第二个是每行 8 字节偏移的 index region。行号小于 column top 的行解析为
//! `Resolved::Absent`，调用方转交 `NullMemory`，真实 region 永远不会收到负偏移。

use crate::common::{ColumnIndex, ColumnKind, ColumnType, RegionIndex, RowNumber};

/// 每列在扁平 region 列表中占用的槽位数
pub const SLOTS_PER_COLUMN: usize = 2;

/// 变长列 index region 中每行偏移的宽度
pub const VAR_INDEX_WIDTH: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Present { region: RegionIndex, offset: u64 },
    /// 该行早于列的 column top
    Absent,
}

impl Resolved {
    pub fn is_absent(&self) -> bool { matches!(self, Self::Absent) }
}

#[inline]
pub fn primary_column_index(column_base: usize, column: ColumnIndex) -> RegionIndex {
    column_base + SLOTS_PER_COLUMN * column
}

#[inline]
pub fn secondary_column_index(column_base: usize, column: ColumnIndex) -> RegionIndex {
    primary_column_index(column_base, column) + 1
}

/// 分区在 region 列表中的起点
#[inline]
pub fn column_base_of(partition: usize, column_count: usize) -> usize {
    partition * column_count * SLOTS_PER_COLUMN
}

#[inline]
pub fn adjusted_row(row: RowNumber, column_top: i64) -> i64 { row - column_top }

/// 按列的存储形态解析读取位置
///
/// 定长 / 符号列返回主 region 与 `adj * width`；变长列返回 index region 与
/// `adj * 8`，data region 即 `primary_column_index`。
#[inline]
pub fn resolve(
    column_base: usize,
    column: ColumnIndex,
    column_type: ColumnType,
    row: RowNumber,
    column_top: i64,
) -> Resolved {
    let adj = adjusted_row(row, column_top);
    if adj < 0 {
        return Resolved::Absent;
    }
    let adj = adj as u64;
    match column_type.kind() {
        ColumnKind::Fixed(w) => Resolved::Present {
            region: primary_column_index(column_base, column),
            offset: adj * w as u64,
        },
        ColumnKind::Dictionary => Resolved::Present {
            region: primary_column_index(column_base, column),
            offset: adj * 4,
        },
        ColumnKind::VarLength => Resolved::Present {
            region: secondary_column_index(column_base, column),
            offset: adj * VAR_INDEX_WIDTH,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_below_column_top_are_absent() {
        assert_eq!(resolve(0, 1, ColumnType::Long, 50, 100), Resolved::Absent);
        assert_eq!(
            resolve(0, 1, ColumnType::Long, 150, 100),
            Resolved::Present { region: 2, offset: 50 * 8 },
        );
        assert_eq!(
            resolve(0, 0, ColumnType::Int, 100, 100),
            Resolved::Present { region: 0, offset: 0 },
        );
    }

    #[test]
    fn var_length_columns_resolve_to_index_region() {
        let base = column_base_of(1, 3);
        assert_eq!(base, 6);
        assert_eq!(
            resolve(base, 2, ColumnType::String, 7, 0),
            Resolved::Present { region: 11, offset: 56 },
        );
        assert_eq!(primary_column_index(base, 2), 10);
    }

    #[test]
    fn strides_follow_column_width() {
        let at = |t, row| match resolve(0, 0, t, row, 0) {
            Resolved::Present { offset, .. } => offset,
            Resolved::Absent => unreachable!(),
        };
        assert_eq!(at(ColumnType::Byte, 3), 3);
        assert_eq!(at(ColumnType::Symbol, 3), 12);
        assert_eq!(at(ColumnType::Uuid, 3), 48);
        assert_eq!(at(ColumnType::Long256, 3), 96);
        assert_eq!(at(ColumnType::Varchar, 3), 24);
    }
}
