//! Media Audit Filter - 只记录图片/视频访问的 HTTP 访问日志中间件
//!
//! 文件服务的访问日志里绝大多数是无关的 API 调用。这个库只留下和媒体文件有关的请求，
//! 给运维一份干净的媒体访问审计记录。
//!
//! # 核心特性
//!
//! - **请求分类**：按路径把请求分为忽略、直接访问媒体、目录列表、对象详情和其他五类
//! - **无损捕获**：只对列表/详情接口复制请求体和响应体，客户端看到的字节完全不变
//! - **尽力解析**：响应 JSON 无法解析时只是没有命中，绝不影响请求
//! - **不缓冲大文件**：直接访问媒体文件的响应按原样流式返回
//! - **两种接入方式**：结构化中间件和文本日志过滤器共用同一套分类规则
//!
//! # 使用示例
//!
//! ```rust,no_run
//! use media_audit_filter::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     // 1. 启动时构造一次
//!     let audit = MediaAudit::new(&MediaAuditConfig::default()).unwrap();
//!
//!     // 2. 包装业务处理函数
//!     let req = hyper::Request::new(hyper::Body::empty());
//!     let response = with_media_audit(req, my_handler, &audit).await;
//! }
//!
//! async fn my_handler(
//!     req: hyper::Request<hyper::Body>,
//! ) -> Result<hyper::Response<hyper::Body>, BoxError> {
//!     Ok(hyper::Response::new(hyper::Body::from("Hello")))
//! }
//! ```

pub mod capture;
pub mod classify;
pub mod config;
pub mod error;
pub mod extensions;
pub mod identity;
pub mod inspect;
pub mod latency;
pub mod logger;
pub mod middleware;
pub mod sink;
pub mod text_filter;
pub mod types;

// 重新导出主要类型
pub use capture::{capture_request_body, CaptureBody, CaptureObserver};
pub use classify::{Category, RequestClassifier};
pub use config::{HitPathStyle, ListLogging, LogMode, MediaAuditConfig, RecordFormat};
pub use error::{BoxError, ConfigError, SinkError};
pub use extensions::ExtensionRegistry;
pub use identity::{IdentityResolver, Principal, PrincipalIdentity, RemoteAddr};
pub use inspect::{FileEntry, GetEnvelope, Hit, Inspection, ListEnvelope, ResponseInspector};
pub use logger::AccessLogger;
pub use middleware::{to_hyper_body, with_media_audit, MediaAudit, MediaAuditBuilder, MediaBody};
pub use sink::{ChannelSink, ConsoleEcho, MemorySink, RecordSink, TracingSink};
pub use text_filter::{render_gin_line, TextLineFilter};
pub use types::{AccessLogRecord, CapturedExchange, RequestMeta};
