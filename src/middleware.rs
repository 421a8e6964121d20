//! 媒体访问审计中间件实现

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Instant;

use bytes::Bytes;
use http_body::{Body as HttpBody, SizeHint};
use hyper::{Body, HeaderMap, Method, Request, Response};

use crate::capture::{capture_request_body, CaptureBody, CaptureObserver};
use crate::classify::{Category, RequestClassifier};
use crate::config::MediaAuditConfig;
use crate::error::{BoxError, ConfigError};
use crate::identity::{client_ip, IdentityResolver, PrincipalIdentity};
use crate::inspect::ResponseInspector;
use crate::logger::AccessLogger;
use crate::sink::RecordSink;
use crate::text_filter::TextLineFilter;
use crate::types::{CapturedExchange, RequestMeta};

/// 中间件返回的响应体
///
/// 不需要捕获的请求直接使用原始 Body，列表/详情接口使用 [`CaptureBody`]。
pub enum MediaBody {
    Plain(Body),
    Captured(CaptureBody),
}

impl MediaBody {
    pub fn is_captured(&self) -> bool {
        matches!(self, MediaBody::Captured(_))
    }
}

impl HttpBody for MediaBody {
    type Data = Bytes;
    type Error = hyper::Error;

    fn poll_data(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
    ) -> Poll<Option<Result<Self::Data, Self::Error>>> {
        match self.get_mut() {
            MediaBody::Plain(body) => Pin::new(body).poll_data(cx),
            MediaBody::Captured(body) => Pin::new(body).poll_data(cx),
        }
    }

    fn poll_trailers(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
    ) -> Poll<Result<Option<HeaderMap>, Self::Error>> {
        match self.get_mut() {
            MediaBody::Plain(body) => Pin::new(body).poll_trailers(cx),
            MediaBody::Captured(body) => Pin::new(body).poll_trailers(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            MediaBody::Plain(body) => body.is_end_stream(),
            MediaBody::Captured(body) => body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            MediaBody::Plain(body) => body.size_hint(),
            MediaBody::Captured(body) => body.size_hint(),
        }
    }
}

/// 将 [`MediaBody`] 转换为标准的 hyper Body
///
/// 捕获的响应体通过流适配，trailers 不会保留。
pub fn to_hyper_body(body: MediaBody) -> Body {
    match body {
        MediaBody::Plain(body) => body,
        MediaBody::Captured(body) => Body::wrap_stream(CaptureStream { inner: Some(body) }),
    }
}

/// 把 [`CaptureBody`] 适配为 Stream
struct CaptureStream {
    inner: Option<CaptureBody>,
}

impl futures::Stream for CaptureStream {
    type Item = Result<Bytes, hyper::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match Pin::new(inner).poll_data(cx) {
            Poll::Ready(None) => {
                self.inner = None;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

struct MediaAuditInner {
    classifier: Arc<RequestClassifier>,
    inspector: ResponseInspector,
    logger: AccessLogger,
    identity: Arc<dyn IdentityResolver>,
}

impl CaptureObserver for MediaAuditInner {
    fn on_complete(&self, exchange: CapturedExchange) {
        let latency = exchange.latency();
        let inspection = self.inspector.inspect(
            exchange.category,
            &exchange.request_body,
            &exchange.response_body,
        );
        let logged = self.logger.log_inspection(&exchange, latency, &inspection);
        self.logger.debug_response(
            logged > 0,
            &exchange.meta,
            exchange.status,
            latency,
            Some(&exchange.response_body),
        );
    }
}

/// 媒体访问审计中间件
///
/// 由配置显式构造，构造后只读，可以在多个连接间克隆共享。
#[derive(Clone)]
pub struct MediaAudit {
    inner: Arc<MediaAuditInner>,
}

impl MediaAudit {
    /// 使用默认输出端（`tracing`，按配置决定是否回显到标准输出）和默认身份解析
    pub fn new(config: &MediaAuditConfig) -> Result<Self, ConfigError> {
        Self::builder(config.clone()).build()
    }

    pub fn builder(config: MediaAuditConfig) -> MediaAuditBuilder {
        MediaAuditBuilder {
            config,
            sinks: None,
            identity: None,
        }
    }

    /// 结构化中间件和文本过滤器共用的分类器
    pub fn classifier(&self) -> Arc<RequestClassifier> {
        self.inner.classifier.clone()
    }

    /// 基于同一分类器创建文本过滤器
    pub fn text_filter<W: std::io::Write>(&self, writer: W) -> TextLineFilter<W> {
        TextLineFilter::new(writer, self.classifier())
    }

    /// 包装一次请求处理
    ///
    /// 业务处理函数和响应体的错误原样返回，日志相关的问题不会影响响应。
    /// 读取需要捕获的请求体失败时直接返回该错误，不再调用处理函数。
    pub async fn handle<F, Fut>(
        &self,
        req: Request<Body>,
        handler: F,
    ) -> Result<Response<MediaBody>, BoxError>
    where
        F: FnOnce(Request<Body>) -> Fut,
        Fut: Future<Output = Result<Response<Body>, BoxError>>,
    {
        let inner = &self.inner;
        let category = inner.classifier.classify_request(&req);
        let debug = inner.logger.is_debug();

        // 标准模式下非媒体请求完全透传
        if !debug && matches!(category, Category::Ignored | Category::Other) {
            let response = handler(req).await?;
            return Ok(response.map(MediaBody::Plain));
        }

        let meta = self.request_meta(&req);
        let started = Instant::now();

        // 直接访问媒体文件时从不缓冲
        let capture_request = category.needs_capture()
            || (debug && category != Category::DirectMedia && req.method() != Method::GET);
        let (req, request_body) = if capture_request {
            capture_request_body(req).await?
        } else {
            (req, Bytes::new())
        };
        inner
            .logger
            .debug_request(&meta.method, &meta.path_and_query, &request_body);

        let response = handler(req).await?;
        let (parts, body) = response.into_parts();

        let capture_response = category.needs_capture() || (debug && category != Category::DirectMedia);
        if !capture_response {
            let latency = started.elapsed();
            let direct = category == Category::DirectMedia;
            if direct {
                inner.logger.log_direct(&meta, parts.status, latency);
            }
            inner
                .logger
                .debug_response(direct, &meta, parts.status, latency, None);
            return Ok(Response::from_parts(parts, MediaBody::Plain(body)));
        }

        let exchange = CapturedExchange {
            category,
            meta,
            status: parts.status,
            request_body,
            response_body: Bytes::new(),
            started,
        };
        let observer: Arc<dyn CaptureObserver> = self.inner.clone();
        let body = CaptureBody::new(body, exchange, observer);
        Ok(Response::from_parts(parts, MediaBody::Captured(body)))
    }

    fn request_meta(&self, req: &Request<Body>) -> RequestMeta {
        let path = req.uri().path().to_string();
        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| path.clone());
        RequestMeta {
            path,
            path_and_query,
            method: req.method().to_string(),
            client_ip: client_ip(req.headers(), req.extensions()),
            username: self.inner.identity.username(req.headers(), req.extensions()),
        }
    }
}

/// [`MediaAudit`] 构造器
pub struct MediaAuditBuilder {
    config: MediaAuditConfig,
    sinks: Option<Vec<Arc<dyn RecordSink>>>,
    identity: Option<Arc<dyn IdentityResolver>>,
}

impl MediaAuditBuilder {
    /// 添加输出端；一旦调用，默认输出端不再自动添加
    pub fn sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sinks.get_or_insert_with(Vec::new).push(sink);
        self
    }

    /// 替换身份解析
    pub fn identity(mut self, identity: Arc<dyn IdentityResolver>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn build(self) -> Result<MediaAudit, ConfigError> {
        self.config.validate().map_err(ConfigError::Invalid)?;

        let classifier = Arc::new(RequestClassifier::from_config(&self.config));
        let inspector =
            ResponseInspector::new(classifier.registry().clone(), self.config.hit_path_style);
        let logger = match self.sinks {
            Some(sinks) => AccessLogger::with_sinks(&self.config, sinks),
            None => AccessLogger::new(&self.config),
        };
        let identity = self
            .identity
            .unwrap_or_else(|| Arc::new(PrincipalIdentity));

        tracing::debug!(
            extensions = classifier.registry().len(),
            mode = ?self.config.mode,
            "media audit middleware initialized"
        );

        Ok(MediaAudit {
            inner: Arc::new(MediaAuditInner {
                classifier,
                inspector,
                logger,
                identity,
            }),
        })
    }
}

/// 媒体访问审计中间件
///
/// # 参数
/// - `req`: HTTP 请求
/// - `handler`: 业务处理函数
/// - `audit`: 启动时构造好的中间件
pub async fn with_media_audit<F, Fut>(
    req: Request<Body>,
    handler: F,
    audit: &MediaAudit,
) -> Result<Response<MediaBody>, BoxError>
where
    F: FnOnce(Request<Body>) -> Fut,
    Fut: Future<Output = Result<Response<Body>, BoxError>>,
{
    audit.handle(req, handler).await
}
