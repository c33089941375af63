//! # olap-column-reader
//!
//! 分区列存时序表的读路径：把 (partition, row, column) 坐标解析为列 region 内的
//! 字节偏移，按列编码解码出值，并通过游标协议交给查询引擎。
//!
//! ## 整体架构
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │   LatestByValueCursor        TableRowCursor / DataFrameRow…  │
//! │        │  (frame source + cancellation)     │                │
//! │        └──────────────┬─────────────────────┘                │
//! │                       ▼                                      │
//! │                 TableRecord  (partition, row) + 投影          │
//! │                       │  每次取值                             │
//! │                       ▼                                      │
//! │                  resolver::resolve                           │
//! │         ┌─────────────┼──────────────────┐                   │
//! │     Absent        Present(region, off)   │                   │
//! │         ▼             ▼                  ▼                   │
//! │    NullMemory    ColumnMemory       SymbolTable              │
//! │                  (Vec / mmap)       (key → &str)             │
//! │                       │                                      │
//! │                  varlen + utf8   (STRING / BINARY / VARCHAR) │
//! │                                                              │
//! │   TableSnapshot：列元数据 + column top + 扁平 region 列表      │
//! └──────────────────────────────────────────────────────────────┘
//! ```

// ── 基础 ──────────────────────────────────────────────────────────────────────
pub mod common;
pub mod config;
pub mod field_type;

// ── 内存与编码 ────────────────────────────────────────────────────────────────
pub mod memory;
pub mod utf8;
pub mod varlen;
pub mod symbol;

// ── 快照与寻址 ────────────────────────────────────────────────────────────────
pub mod resolver;
pub mod column_writer;
pub mod snapshot;

// ── 读取与游标 ────────────────────────────────────────────────────────────────
pub mod record;
pub mod cancel;
pub mod cursor;

pub use common::{ColumnType, ErrorKind, ReadError, Result, RowId};
pub use config::ReaderConfig;
pub use record::{ColumnRef, TableRecord};
pub use snapshot::{ColumnSource, TableSnapshot, TableSnapshotBuilder};
