//! 读路径配置

/// 读快照与游标共享的配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// 映射列文件时预先触发缺页（`MAP_POPULATE`）
    pub populate_mappings: bool,
    /// 将非 ASCII 文本解码到 UTF-16 sink 时是否校验
    pub validate_text:     bool,
    /// latest-by 扫描访问行数超过该值时输出 debug 日志
    pub scan_log_rows:     u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            populate_mappings: false,
            validate_text:     true,
            scan_log_rows:     1_000_000,
        }
    }
}

impl ReaderConfig {
    pub fn with_populate_mappings(mut self, populate: bool) -> Self {
        self.populate_mappings = populate; self
    }
    pub fn with_validate_text(mut self, validate: bool) -> Self {
        self.validate_text = validate; self
    }
    pub fn with_scan_log_rows(mut self, rows: u64) -> Self {
        self.scan_log_rows = rows; self
    }
}
