// ==========================================
// 表格数据导入系统 - 日志初始化
// ==========================================
// 工具: tracing + tracing-subscriber
// 输出: stderr（stdout 留给导入报告与模板表头）
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 日志格式环境变量
pub const LOG_FORMAT_ENV: &str = "ROWSHIFT_LOG_FORMAT";

/// 默认过滤级别
const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 人读格式
    Pretty,
    /// 每行一条 JSON（便于批量导入任务采集）
    Json,
}

impl LogFormat {
    /// 读取 ROWSHIFT_LOG_FORMAT，未设置或无法识别时为 Pretty
    pub fn from_env() -> Self {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 过滤器（默认: info），例如 RUST_LOG=rowshift::importer=debug
/// - ROWSHIFT_LOG_FORMAT: `json` 输出结构化日志
///
/// # 示例
/// ```no_run
/// use rowshift::logging;
/// logging::init();
/// ```
pub fn init() {
    init_with(LogFormat::from_env());
}

pub fn init_with(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true);

    // 重复初始化（例如嵌入调用）时忽略
    let _ = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };
}

/// 测试用日志（debug 级别，输出交给测试框架捕获）
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("rowshift=debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_is_idempotent() {
        init_test();
        init_test();
        tracing::debug!("日志已初始化");
    }
}
