//! 公共类型定义

use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Local};
use hyper::StatusCode;

use crate::classify::Category;

/// 请求元数据，在调用业务处理函数之前提取
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    /// 请求路径（不含查询串）
    pub path: String,
    /// 请求路径加查询串
    pub path_and_query: String,
    pub method: String,
    pub client_ip: String,
    pub username: String,
}

/// 一次被捕获的请求/响应交换
///
/// 只在单个请求内存在，响应流结束并输出记录后即丢弃。
#[derive(Debug, Clone)]
pub struct CapturedExchange {
    pub category: Category,
    pub meta: RequestMeta,
    pub status: StatusCode,
    pub request_body: Bytes,
    pub response_body: Bytes,
    pub started: Instant,
}

impl CapturedExchange {
    pub fn latency(&self) -> Duration {
        self.started.elapsed()
    }
}

/// 一条访问记录，每次输出时构造
#[derive(Debug, Clone)]
pub struct AccessLogRecord {
    pub timestamp: DateTime<Local>,
    pub client_ip: String,
    pub method: String,
    pub path: String,
    pub username: String,
    pub status: Option<u16>,
    pub latency: Option<Duration>,
    /// 与类别相关的附加信息
    pub extra: String,
}

impl AccessLogRecord {
    /// 以当前时间构造
    pub fn now(meta: &RequestMeta, status: StatusCode, latency: Duration) -> Self {
        Self {
            timestamp: Local::now(),
            client_ip: meta.client_ip.clone(),
            method: meta.method.clone(),
            path: meta.path.clone(),
            username: meta.username.clone(),
            status: Some(status.as_u16()),
            latency: Some(latency),
            extra: String::new(),
        }
    }
}
