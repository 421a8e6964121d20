//! 文本日志过滤器
//!
//! 宿主只能提供已经渲染好的访问日志文本流时使用。它只能整行放行或丢弃，
//! 不能拆出多个命中，也拿不到用户身份，能力弱于结构化中间件。
//! 所有规则都来自同一个 [`RequestClassifier`]：扩展名来自注册表，API 路径来自接口配置。

use std::io::{self, Write};
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::classify::{strip_query, RequestClassifier};
use crate::config::RecordFormat;
use crate::logger::render;
use crate::types::AccessLogRecord;

/// 访问日志行的标记
pub const GIN_MARKER: &str = "[GIN]";

/// 访问日志行中方法列之后的请求路径，路径可能带引号
const REQUEST_COLUMN: &str = r#"\|\s*[A-Z]+\s+"?(/[^\s"]*)"#;

/// 由分类器编译出的匹配规则
#[derive(Debug)]
pub struct LinePatterns {
    request: Option<Regex>,
    api: Vec<Regex>,
    media: Option<Regex>,
}

impl LinePatterns {
    fn compile(classifier: &RequestClassifier) -> Self {
        let api = classifier
            .api_paths()
            .into_iter()
            .filter_map(|path| {
                Regex::new(&format!(r#"\s"?{}(?:[?\s"]|$)"#, regex::escape(path))).ok()
            })
            .collect();

        let names = classifier.registry().names();
        let media = if names.is_empty() {
            None
        } else {
            let alternation = names
                .iter()
                .map(|name| regex::escape(name))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&format!(r"\.(?:{})(?:[^a-z0-9]|$)", alternation)).ok()
        };

        Self {
            request: Regex::new(REQUEST_COLUMN).ok(),
            api,
            media,
        }
    }

    /// 取出方法列后面的请求路径（含查询串）
    pub fn request_path<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.request
            .as_ref()?
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    pub fn is_api_line(&self, line: &str) -> bool {
        self.api.iter().any(|re| re.is_match(line))
    }

    /// 行中是否出现媒体扩展名，大小写不敏感
    pub fn mentions_media(&self, line: &str) -> bool {
        match &self.media {
            Some(re) => re.is_match(&line.to_lowercase()),
            None => false,
        }
    }
}

/// 过滤访问日志行的写入器
pub struct TextLineFilter<W: Write> {
    writer: W,
    classifier: Arc<RequestClassifier>,
    patterns: OnceLock<LinePatterns>,
    #[cfg(test)]
    builds: std::sync::atomic::AtomicUsize,
}

impl<W: Write> TextLineFilter<W> {
    pub fn new(writer: W, classifier: Arc<RequestClassifier>) -> Self {
        Self {
            writer,
            classifier,
            patterns: OnceLock::new(),
            #[cfg(test)]
            builds: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// 匹配规则，首次使用时编译且只编译一次
    pub fn patterns(&self) -> &LinePatterns {
        self.patterns.get_or_init(|| {
            #[cfg(test)]
            self.builds
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            LinePatterns::compile(&self.classifier)
        })
    }

    /// 判断一行是否应该写出
    pub fn should_forward(&self, line: &str) -> bool {
        if !line.contains(GIN_MARKER) {
            return true;
        }

        let patterns = self.patterns();
        let Some(path) = patterns.request_path(line) else {
            // 认不出路径列时只按 API 路径判断
            return !patterns.is_api_line(line) || patterns.mentions_media(line);
        };

        let path = strip_query(path);
        if self.classifier.is_ignored(path) {
            return false;
        }
        if self.classifier.is_api_path(path) {
            return patterns.mentions_media(line);
        }
        true
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Write for TextLineFilter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let forward = {
            let line = String::from_utf8_lossy(buf);
            self.should_forward(&line)
        };
        if forward {
            self.writer.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// 渲染供文本过滤器使用的访问日志行
pub fn render_gin_line(record: &AccessLogRecord) -> String {
    render(record, RecordFormat::Gin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaAuditConfig;
    use crate::extensions::ExtensionRegistry;
    use std::sync::atomic::Ordering;
    use std::sync::Barrier;

    const LIST_MEDIA: &str =
        "[GIN] 2024/05/01 - 12:00:00 | 200 |    1.2ms |  127.0.0.1 | POST    /api/fs/list?path=/movies/a.MP4\n";
    const LIST_PLAIN: &str =
        "[GIN] 2024/05/01 - 12:00:00 | 200 |    1.2ms |  127.0.0.1 | POST    /api/fs/list\n";
    const ME: &str = "[GIN] 2024/05/01 - 12:00:00 | 200 |    1.2ms |  127.0.0.1 | GET     /api/me\n";
    const ASSET: &str =
        "[GIN] 2024/05/01 - 12:00:00 | 200 |    1.2ms |  127.0.0.1 | GET     /assets/index.js\n";
    const PAGE: &str = "[GIN] 2024/05/01 - 12:00:00 | 200 |    1.2ms |  127.0.0.1 | GET     /movies\n";
    const PLAIN: &str = "server started on :5244\n";

    fn filter() -> TextLineFilter<Vec<u8>> {
        TextLineFilter::new(Vec::new(), Arc::new(RequestClassifier::default()))
    }

    fn output(filter: TextLineFilter<Vec<u8>>) -> String {
        String::from_utf8(filter.into_inner()).unwrap()
    }

    #[test]
    fn test_api_lines_need_media() {
        let mut f = filter();
        f.write_all(LIST_MEDIA.as_bytes()).unwrap();
        f.write_all(LIST_PLAIN.as_bytes()).unwrap();
        f.write_all(ME.as_bytes()).unwrap();
        assert_eq!(output(f), LIST_MEDIA);
    }

    #[test]
    fn test_static_assets_suppressed_other_lines_pass() {
        let mut f = filter();
        f.write_all(ASSET.as_bytes()).unwrap();
        f.write_all(PAGE.as_bytes()).unwrap();
        f.write_all(PLAIN.as_bytes()).unwrap();
        assert_eq!(output(f), format!("{}{}", PAGE, PLAIN));
    }

    #[test]
    fn test_suppressed_write_reports_full_length() {
        let mut f = filter();
        assert_eq!(f.write(LIST_PLAIN.as_bytes()).unwrap(), LIST_PLAIN.len());
        assert!(f.get_ref().is_empty());
    }

    #[test]
    fn test_extension_boundaries() {
        let f = filter();
        let patterns = f.patterns();
        assert!(patterns.mentions_media("GET /d/a.mkv"));
        assert!(patterns.mentions_media("path=a.RMVB&x=1"));
        assert!(!patterns.mentions_media("GET /d/a.mp4x"));
        assert!(!patterns.mentions_media("GET /d/a.tsconfig"));
    }

    #[test]
    fn test_decisions_agree_with_classifier() {
        let classifier = RequestClassifier::default();
        let f = filter();
        let cases = [
            ("/d/pingpong.mp4", true),
            ("/d/images/cover.jpg", true),
            ("/api/fs/listing", true),
            ("/api/fs/list?path=/images/a.txt", false),
            ("/images/bg.png", false),
            ("/ping", false),
        ];
        for (path, forwarded) in cases {
            let line = format!(
                "[GIN] 2024/05/01 - 12:00:00 | 200 |    1.2ms |  127.0.0.1 | GET     {}\n",
                path
            );
            assert_eq!(f.should_forward(&line), forwarded, "{} ({:?})", path, classifier.classify(path));
        }
    }

    #[test]
    fn test_quoted_request_column() {
        let f = filter();
        assert_eq!(f.patterns().request_path(r#"[GIN] | 200 | POST    "/api/fs/get""#), Some("/api/fs/get"));
        assert!(!f.should_forward("[GIN] 2024/05/01 - 12:00:00 | 200 | 1ms | 127.0.0.1 | POST    \"/api/fs/get\"\n"));
        assert!(f.should_forward("[GIN] 2024/05/01 - 12:00:00 | 200 | 1ms | 127.0.0.1 | POST    \"/api/fs/get\" | b.mkv\n"));
    }

    #[test]
    fn test_api_pattern_is_anchored_without_request_column() {
        let f = filter();
        let patterns = f.patterns();
        assert!(patterns.is_api_line("[GIN] /api/fs/list?x=1"));
        assert!(patterns.is_api_line("[GIN] \"/api/fs/get\""));
        assert!(!patterns.is_api_line("[GIN] /api/fs/listing"));
        assert!(f.should_forward("[GIN] /api/fs/listing"));
        assert!(!f.should_forward("[GIN] /api/fs/list"));
    }

    #[test]
    fn test_rules_follow_classifier() {
        let config = MediaAuditConfig {
            extensions: vec!["flac".to_string()],
            list_endpoint: "/api/v2/ls".to_string(),
            api_paths: Vec::new(),
            ..Default::default()
        };
        let f = TextLineFilter::new(Vec::new(), Arc::new(RequestClassifier::from_config(&config)));
        assert!(!f.should_forward("[GIN] | POST    /api/v2/ls | x.mp4"));
        assert!(f.should_forward("[GIN] | POST    /api/v2/ls | x.flac"));
        assert!(f.should_forward("[GIN] | GET     /api/me"));
    }

    #[test]
    fn test_empty_registry_never_mentions_media() {
        let classifier = RequestClassifier::new(
            Arc::new(ExtensionRegistry::new(Vec::<String>::new())),
            Vec::new(),
            "/api/fs/list",
            "/api/fs/get",
        );
        let f = TextLineFilter::new(Vec::new(), Arc::new(classifier));
        assert!(!f.should_forward(LIST_MEDIA));
    }

    #[test]
    fn test_writer_errors_propagate() {
        struct Closed;
        impl Write for Closed {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut f = TextLineFilter::new(Closed, Arc::new(RequestClassifier::default()));
        let err = f.write(PAGE.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(f.write(ASSET.as_bytes()).unwrap(), ASSET.len());
    }

    #[test]
    fn test_patterns_initialized_once_under_contention() {
        let f = TextLineFilter::new(io::sink(), Arc::new(RequestClassifier::default()));
        let threads = 16;
        let barrier = Barrier::new(threads);

        let addresses: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        f.patterns() as *const LinePatterns as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(addresses.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(f.builds.load(Ordering::SeqCst), 1);
    }
}
