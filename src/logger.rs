//! 访问日志：把直接访问事件或解析出的命中渲染成一行并输出
//!
//! 记录行格式：
//!
//! ```text
//! [GIN] 2024/05/01 - 12:00:00 | 200 |      1.234ms |       127.0.0.1 | GET     /d/a.mp4 | 直接访问媒体文件
//! 时间：2024-05-01 12:00:00 访问IP：127.0.0.1 访问路径：/d/a.mp4 用户：alice
//! ```

use std::sync::Arc;
use std::time::Duration;

use hyper::StatusCode;

use crate::config::{ListLogging, LogMode, MediaAuditConfig, RecordFormat};
use crate::inspect::{join_path, Inspection};
use crate::latency::LatencyExt;
use crate::sink::{ConsoleEcho, RecordSink, TracingSink};
use crate::types::{AccessLogRecord, CapturedExchange, RequestMeta};
use crate::classify::Category;

/// 直接访问媒体文件的附加信息
pub const DIRECT_ACCESS_SUFFIX: &str = "直接访问媒体文件";

/// 访问日志记录器
pub struct AccessLogger {
    mode: LogMode,
    format: RecordFormat,
    list_logging: ListLogging,
    debug_body_limit: usize,
    sinks: Vec<Arc<dyn RecordSink>>,
}

impl AccessLogger {
    /// 按配置创建：总是输出到 `tracing`，`console_echo` 打开时再输出到标准输出
    pub fn new(config: &MediaAuditConfig) -> Self {
        let mut sinks: Vec<Arc<dyn RecordSink>> = vec![Arc::new(TracingSink)];
        if config.console_echo {
            sinks.push(Arc::new(ConsoleEcho::stdout()));
        }
        Self::with_sinks(config, sinks)
    }

    /// 使用指定的输出端
    pub fn with_sinks(config: &MediaAuditConfig, sinks: Vec<Arc<dyn RecordSink>>) -> Self {
        Self {
            mode: config.mode,
            format: config.record_format,
            list_logging: config.list_logging,
            debug_body_limit: config.debug_body_limit,
            sinks,
        }
    }

    pub fn add_sink(&mut self, sink: Arc<dyn RecordSink>) {
        self.sinks.push(sink);
    }

    pub fn mode(&self) -> LogMode {
        self.mode
    }

    pub fn is_debug(&self) -> bool {
        self.mode == LogMode::Debug
    }

    /// 记录一次直接访问媒体文件，返回输出的记录数
    pub fn log_direct(&self, meta: &RequestMeta, status: StatusCode, latency: Duration) -> usize {
        let mut record = AccessLogRecord::now(meta, status, latency);
        record.extra = DIRECT_ACCESS_SUFFIX.to_string();
        self.emit(&record);
        1
    }

    /// 记录列表/详情接口的命中，没有命中时什么都不输出
    pub fn log_inspection(
        &self,
        exchange: &CapturedExchange,
        latency: Duration,
        inspection: &Inspection,
    ) -> usize {
        if inspection.is_empty() {
            return 0;
        }

        let records = self.records_for(exchange, latency, inspection);
        for record in &records {
            self.emit(record);
        }
        records.len()
    }

    fn records_for(
        &self,
        exchange: &CapturedExchange,
        latency: Duration,
        inspection: &Inspection,
    ) -> Vec<AccessLogRecord> {
        let base = AccessLogRecord::now(&exchange.meta, exchange.status, latency);

        // 审计格式只有一个路径字段，每个命中单独一条
        if self.format == RecordFormat::Audit {
            return inspection
                .hits
                .iter()
                .map(|hit| {
                    let path = match exchange.category {
                        Category::ListQuery => join_path(&hit.path, &hit.name),
                        _ => hit.display_path.clone(),
                    };
                    AccessLogRecord {
                        path,
                        ..base.clone()
                    }
                })
                .collect();
        }

        match exchange.category {
            Category::ListQuery => match self.list_logging {
                ListLogging::Aggregated => vec![AccessLogRecord {
                    extra: list_suffix(&inspection.queried_path, &inspection.display_paths()),
                    ..base
                }],
                ListLogging::PerHit => inspection
                    .hits
                    .iter()
                    .map(|hit| AccessLogRecord {
                        extra: list_suffix(&inspection.queried_path, &[hit.display_path.as_str()]),
                        ..base.clone()
                    })
                    .collect(),
            },
            _ => inspection
                .hits
                .iter()
                .map(|hit| AccessLogRecord {
                    extra: format!("访问媒体文件: {} | 路径: {}", hit.name, hit.display_path),
                    ..base.clone()
                })
                .collect(),
        }
    }

    /// 渲染并输出到所有输出端
    ///
    /// 单个输出端失败不影响其他输出端，错误直接丢弃。
    pub fn emit(&self, record: &AccessLogRecord) {
        let line = render(record, self.format);
        for sink in &self.sinks {
            let _ = sink.emit(record, &line);
        }
    }

    /// Debug 模式：请求开始
    pub fn debug_request(&self, method: &str, path_and_query: &str, body: &[u8]) {
        if !self.is_debug() {
            return;
        }
        tracing::debug!("[请求] {} {}", method, path_and_query);
        if !body.is_empty() {
            tracing::debug!("[请求体] {}", String::from_utf8_lossy(body));
        }
    }

    /// Debug 模式：响应结束
    ///
    /// 媒体访问输出状态码、延迟和响应体摘要；其他请求只输出一行摘要。
    pub fn debug_response(
        &self,
        media: bool,
        meta: &RequestMeta,
        status: StatusCode,
        latency: Duration,
        body: Option<&[u8]>,
    ) {
        if !self.is_debug() {
            return;
        }
        let latency = latency.display_latency();
        if media {
            tracing::debug!("[响应] 状态码: {}, 延迟: {}", status.as_u16(), latency);
        } else {
            tracing::debug!(
                "[响应] {} {} | 状态码: {}, 延迟: {}",
                meta.method,
                meta.path_and_query,
                status.as_u16(),
                latency
            );
        }
        if let Some(body) = body.filter(|body| !body.is_empty()) {
            tracing::debug!("[响应体] {}", excerpt(body, self.debug_body_limit));
        }
    }
}

/// 按格式渲染一条记录
pub fn render(record: &AccessLogRecord, format: RecordFormat) -> String {
    match format {
        RecordFormat::Gin => render_gin(record),
        RecordFormat::Audit => render_audit(record),
    }
}

fn render_gin(record: &AccessLogRecord) -> String {
    let status = record
        .status
        .map(|status| status.to_string())
        .unwrap_or_else(|| "-".to_string());
    let latency = record
        .latency
        .map(|latency| latency.display_latency())
        .unwrap_or_else(|| "-".to_string());

    format!(
        "[GIN] {} | {:>3} | {:>13} | {:>15} | {:<7} {} | {}",
        record.timestamp.format("%Y/%m/%d - %H:%M:%S"),
        status,
        latency,
        record.client_ip,
        record.method,
        record.path,
        record.extra
    )
}

fn render_audit(record: &AccessLogRecord) -> String {
    format!(
        "时间：{} 访问IP：{} 访问路径：{} 用户：{}",
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.client_ip,
        record.path,
        record.username
    )
}

fn list_suffix(dir: &str, names: &[&str]) -> String {
    format!("目录: {} | 媒体文件: [{}]", dir, names.join(" "))
}

/// 截取响应体摘要，超过 `limit` 字节时截断并注明总长度
pub fn excerpt(body: &[u8], limit: usize) -> String {
    if body.len() <= limit {
        return String::from_utf8_lossy(body).into_owned();
    }
    format!(
        "{}...(已截断, 共 {} 字节)",
        String::from_utf8_lossy(&body[..limit]),
        body.len()
    )
}
