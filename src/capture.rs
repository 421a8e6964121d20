//! 请求体/响应体捕获
//!
//! [`CaptureBody`] 包装响应体：每个数据块原样、按顺序交给调用方，同时复制一份到缓冲区。
//! 响应流正常结束时把缓冲区连同交换信息交给 [`CaptureObserver`]，只交一次；
//! 流出错或在结束前被丢弃（客户端断开）时，缓冲区直接丢弃，不做解析。

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use http_body::{Body as HttpBody, SizeHint};
use hyper::{Body, HeaderMap, Request};

use crate::types::CapturedExchange;

/// 响应流结束时的回调
pub trait CaptureObserver: Send + Sync {
    fn on_complete(&self, exchange: CapturedExchange);
}

/// 复制数据块的响应体包装
pub struct CaptureBody {
    inner: Body,
    buffer: BytesMut,
    pending: Option<CapturedExchange>,
    observer: Arc<dyn CaptureObserver>,
}

impl CaptureBody {
    pub fn new(inner: Body, exchange: CapturedExchange, observer: Arc<dyn CaptureObserver>) -> Self {
        let mut body = Self {
            inner,
            buffer: BytesMut::new(),
            pending: Some(exchange),
            observer,
        };
        // 已经结束的响应体不会再被 poll
        if body.inner.is_end_stream() {
            body.complete();
        }
        body
    }

    /// 目前已捕获的字节
    pub fn captured(&self) -> &[u8] {
        &self.buffer
    }

    /// 是否已经交给观察者
    pub fn is_completed(&self) -> bool {
        self.pending.is_none()
    }

    fn complete(&mut self) {
        if let Some(mut exchange) = self.pending.take() {
            exchange.response_body = std::mem::take(&mut self.buffer).freeze();
            self.observer.on_complete(exchange);
        }
    }

    fn discard(&mut self) {
        if self.pending.take().is_some() {
            tracing::trace!("response stream failed, discarding captured body");
        }
        self.buffer.clear();
    }
}

impl HttpBody for CaptureBody {
    type Data = Bytes;
    type Error = hyper::Error;

    fn poll_data(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Self::Data, Self::Error>>> {
        let this = self.get_mut();
        let result = Pin::new(&mut this.inner).poll_data(cx);

        match &result {
            Poll::Ready(Some(Ok(chunk))) => {
                if this.pending.is_some() {
                    this.buffer.extend_from_slice(chunk);
                }
                // 已知长度的响应体在最后一块之后可能不会再被 poll
                if this.inner.is_end_stream() {
                    this.complete();
                }
            }
            Poll::Ready(Some(Err(_))) => this.discard(),
            Poll::Ready(None) => this.complete(),
            Poll::Pending => {}
        }

        result
    }

    fn poll_trailers(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<HeaderMap>, Self::Error>> {
        Pin::new(&mut self.get_mut().inner).poll_trailers(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CaptureBody {
    fn drop(&mut self) {
        if self.pending.is_some() {
            tracing::trace!(
                captured = self.buffer.len(),
                "response body dropped before completion, discarding capture"
            );
        }
    }
}

/// 读取完整请求体，并用一份相同的副本替换原请求体
///
/// 后续处理函数看到的是未被消费、逐字节相同的请求体。读取失败时原样返回错误。
///
/// ```rust
/// # use media_audit_filter::capture_request_body;
/// # use hyper::{Body, Request};
/// # tokio_test::block_on(async {
/// let req = Request::new(Body::from(r#"{"path":"/movies"}"#));
/// let (req, copy) = capture_request_body(req).await.unwrap();
///
/// let forwarded = hyper::body::to_bytes(req.into_body()).await.unwrap();
/// assert_eq!(forwarded, copy);
/// # });
/// ```
pub async fn capture_request_body(
    req: Request<Body>,
) -> Result<(Request<Body>, Bytes), hyper::Error> {
    let (parts, body) = req.into_parts();
    let bytes = hyper::body::to_bytes(body).await?;
    let req = Request::from_parts(parts, Body::from(bytes.clone()));
    Ok((req, bytes))
}
