//! 中间件配置
//!
//! 配置由宿主在启动时构造一次，之后只读。可以直接使用 [`Default`]，
//! 也可以从 JSON 加载，未给出的字段取默认值。
//!
//! ```rust
//! use media_audit_filter::{LogMode, MediaAuditConfig};
//!
//! let config = MediaAuditConfig::from_json_str(r#"{"mode": "debug", "extensions": ["mp4"]}"#).unwrap();
//! assert_eq!(config.mode, LogMode::Debug);
//! assert_eq!(config.list_endpoint, "/api/fs/list");
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::extensions::{IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};

pub const DEFAULT_LIST_ENDPOINT: &str = "/api/fs/list";
pub const DEFAULT_GET_ENDPOINT: &str = "/api/fs/get";
pub const DEFAULT_DEBUG_BODY_LIMIT: usize = 1000;

/// 默认忽略的静态资源路径前缀
pub const DEFAULT_IGNORED_PREFIXES: &[&str] =
    &["/assets/", "/images/", "/favicon.ico", "/robots.txt", "/ping"];

/// 文本过滤器额外识别的 API 路径（列表/详情接口之外）
pub const DEFAULT_API_PATHS: &[&str] = &[
    "/api/me",
    "/api/public",
    "/api/auth",
    "/api/admin",
    "/api/fs/other",
    "/api/fs/dirs",
];

/// 日志模式，启动时选定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogMode {
    #[default]
    Standard,
    /// 额外输出请求体和截断后的响应体
    Debug,
}

/// 记录格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    /// `[GIN] 时间 | 状态码 | 延迟 | IP | 方法 路径 | 附加信息`
    #[default]
    Gin,
    /// `时间：… 访问IP：… 访问路径：… 用户：…`
    Audit,
}

/// 目录列表命中多个媒体文件时的记录方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListLogging {
    /// 一条记录列出全部文件
    #[default]
    Aggregated,
    /// 每个文件一条记录
    PerHit,
}

/// 列表命中的展示路径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitPathStyle {
    /// 只用文件名
    #[default]
    Name,
    /// `path + "/" + name`
    Joined,
}

/// 媒体访问审计配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaAuditConfig {
    /// 媒体扩展名，带不带点号均可
    pub extensions: Vec<String>,
    /// 忽略的静态资源路径前缀
    pub ignored_prefixes: Vec<String>,
    /// 目录列表接口
    pub list_endpoint: String,
    /// 单个对象详情接口
    pub get_endpoint: String,
    /// 文本过滤器额外识别的 API 路径
    pub api_paths: Vec<String>,
    pub mode: LogMode,
    pub record_format: RecordFormat,
    pub list_logging: ListLogging,
    pub hit_path_style: HitPathStyle,
    /// 是否同时把记录直接输出到标准输出
    pub console_echo: bool,
    /// Debug 模式下响应体的最大输出字节数
    pub debug_body_limit: usize,
}

impl Default for MediaAuditConfig {
    fn default() -> Self {
        Self {
            extensions: IMAGE_EXTENSIONS
                .iter()
                .chain(VIDEO_EXTENSIONS)
                .map(|ext| ext.to_string())
                .collect(),
            ignored_prefixes: to_strings(DEFAULT_IGNORED_PREFIXES),
            list_endpoint: DEFAULT_LIST_ENDPOINT.to_string(),
            get_endpoint: DEFAULT_GET_ENDPOINT.to_string(),
            api_paths: to_strings(DEFAULT_API_PATHS),
            mode: LogMode::Standard,
            record_format: RecordFormat::Gin,
            list_logging: ListLogging::Aggregated,
            hit_path_style: HitPathStyle::Name,
            console_echo: false,
            debug_body_limit: DEFAULT_DEBUG_BODY_LIMIT,
        }
    }
}

impl MediaAuditConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 字符串加载并校验
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// 从 JSON 文件加载并校验
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// 校验配置，收集所有问题一次性返回
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for (field, endpoint) in [
            ("list_endpoint", &self.list_endpoint),
            ("get_endpoint", &self.get_endpoint),
        ] {
            if !endpoint.starts_with('/') {
                errors.push(format!("{} 必须以 '/' 开头: {:?}", field, endpoint));
            }
        }

        if self.list_endpoint == self.get_endpoint {
            errors.push(format!(
                "list_endpoint 与 get_endpoint 不能相同: {:?}",
                self.list_endpoint
            ));
        }

        if self.ignored_prefixes.iter().any(|prefix| prefix.is_empty()) {
            errors.push("ignored_prefixes 不能包含空字符串".to_string());
        }

        if self.api_paths.iter().any(|path| !path.starts_with('/')) {
            errors.push("api_paths 中的路径必须以 '/' 开头".to_string());
        }

        if self.debug_body_limit == 0 {
            errors.push("debug_body_limit 必须大于 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = MediaAuditConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.extensions.len(), 25);
        assert_eq!(config.debug_body_limit, 1000);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = MediaAuditConfig::from_json_str(
            r#"{"record_format": "audit", "list_logging": "per_hit", "hit_path_style": "joined"}"#,
        )
        .unwrap();
        assert_eq!(config.record_format, RecordFormat::Audit);
        assert_eq!(config.list_logging, ListLogging::PerHit);
        assert_eq!(config.hit_path_style, HitPathStyle::Joined);
        assert_eq!(config.get_endpoint, DEFAULT_GET_ENDPOINT);
        assert_eq!(config.mode, LogMode::Standard);
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let config = MediaAuditConfig {
            list_endpoint: "api/list".to_string(),
            get_endpoint: "api/list".to_string(),
            ignored_prefixes: vec![String::new()],
            debug_body_limit: 0,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = MediaAuditConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = MediaAuditConfig::from_json_str(r#"{"debug_body_limit": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"console_echo": true, "extensions": ["mp4", "png"]}}"#).unwrap();

        let config = MediaAuditConfig::load_from_file(file.path()).unwrap();
        assert!(config.console_echo);
        assert_eq!(config.extensions, vec!["mp4".to_string(), "png".to_string()]);

        let missing = MediaAuditConfig::load_from_file("/nonexistent/media-audit.json");
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
