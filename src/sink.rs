//! 访问记录输出端

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::SinkError;
use crate::types::AccessLogRecord;

/// 访问记录输出端 trait
///
/// 每条记录已经渲染成一行文本，`line` 不含换行符。返回错误只会被调用方丢弃，
/// 实现不需要也不应该重试。
pub trait RecordSink: Send + Sync {
    fn emit(&self, record: &AccessLogRecord, line: &str) -> Result<(), SinkError>;
}

/// 通过 `tracing` 输出结构化事件
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl RecordSink for TracingSink {
    fn emit(&self, record: &AccessLogRecord, line: &str) -> Result<(), SinkError> {
        tracing::info!(
            target: "media_audit",
            client_ip = %record.client_ip,
            method = %record.method,
            path = %record.path,
            user = %record.username,
            status = record.status,
            latency_us = record.latency.map(|l| l.as_micros() as u64),
            "{}",
            line
        );
        Ok(())
    }
}

/// 直接把记录行写到输出流（默认标准输出）
pub struct ConsoleEcho<W: Write + Send = io::Stdout> {
    out: Mutex<W>,
}

impl ConsoleEcho<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleEcho<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// 取回内部输出流
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> RecordSink for ConsoleEcho<W> {
    fn emit(&self, _record: &AccessLogRecord, line: &str) -> Result<(), SinkError> {
        let mut out = self.out.lock().map_err(|_| SinkError::Poisoned)?;
        out.write_all(line.as_bytes())?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

/// 在内存中保存记录行，便于宿主测试
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for MemorySink {
    fn emit(&self, _record: &AccessLogRecord, line: &str) -> Result<(), SinkError> {
        self.lines
            .lock()
            .map_err(|_| SinkError::Poisoned)?
            .push(line.to_string());
        Ok(())
    }
}

/// 通过后台任务转发记录的输出端
///
/// 发送是非阻塞的，真正的输出在后台任务中完成。必须在 tokio 运行时中创建。
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<(AccessLogRecord, String)>,
}

impl ChannelSink {
    /// 创建并启动后台任务
    pub fn spawn(delegate: Arc<dyn RecordSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<(AccessLogRecord, String)>();

        tokio::spawn(async move {
            while let Some((record, line)) = rx.recv().await {
                if let Err(err) = delegate.emit(&record, &line) {
                    tracing::debug!(error = %err, "delegate sink rejected access record");
                }
            }
            tracing::debug!("media audit channel sink terminated");
        });

        Self { sender: tx }
    }
}

impl RecordSink for ChannelSink {
    fn emit(&self, record: &AccessLogRecord, line: &str) -> Result<(), SinkError> {
        self.sender
            .send((record.clone(), line.to_string()))
            .map_err(|_| SinkError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn record() -> AccessLogRecord {
        AccessLogRecord {
            timestamp: Local::now(),
            client_ip: "127.0.0.1".to_string(),
            method: "GET".to_string(),
            path: "/d/a.mp4".to_string(),
            username: "unknown".to_string(),
            status: Some(200),
            latency: None,
            extra: String::new(),
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_console_echo_writes_line() {
        let echo = ConsoleEcho::new(Vec::new());
        echo.emit(&record(), "line one").unwrap();
        echo.emit(&record(), "line two").unwrap();
        let out = String::from_utf8(echo.into_inner()).unwrap();
        assert_eq!(out, "line one\nline two\n");
    }

    #[test]
    fn test_console_echo_reports_io_error() {
        let echo = ConsoleEcho::new(BrokenWriter);
        let err = echo.emit(&record(), "lost").unwrap_err();
        assert!(matches!(err, SinkError::Io(_)));
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        sink.emit(&record(), "a").unwrap();
        assert_eq!(sink.lines(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let memory = Arc::new(MemorySink::new());
        let sink = ChannelSink::spawn(memory.clone());
        sink.emit(&record(), "queued").unwrap();

        for _ in 0..50 {
            if !memory.is_empty() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        }
        assert_eq!(memory.lines(), vec!["queued".to_string()]);
    }
}
