//! 错误类型

use thiserror::Error;

/// 业务处理函数使用的错误类型，中间件原样透传
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("解析配置失败: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("配置无效: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// 日志输出端错误
///
/// 只在 sink 内部产生，由 [`AccessLogger`](crate::logger::AccessLogger) 吞掉，
/// 永远不会影响请求本身。
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("写入日志失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("日志输出锁已被污染")]
    Poisoned,

    #[error("日志通道已关闭")]
    Closed,
}
