//! 请求分类

use std::sync::Arc;

use hyper::Request;

use crate::config::MediaAuditConfig;
use crate::extensions::ExtensionRegistry;

/// 请求类别，每个请求只计算一次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// 静态资源等，完全不处理
    Ignored,
    /// 直接访问媒体文件
    DirectMedia,
    /// 目录列表接口
    ListQuery,
    /// 单个对象详情接口
    GetQuery,
    /// 其他请求
    Other,
}

impl Category {
    /// 是否需要捕获请求体和响应体
    pub fn needs_capture(self) -> bool {
        matches!(self, Category::ListQuery | Category::GetQuery)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Ignored => "ignored",
            Category::DirectMedia => "direct_media",
            Category::ListQuery => "list_query",
            Category::GetQuery => "get_query",
            Category::Other => "other",
        }
    }
}

/// 请求分类器
///
/// 结构化中间件和文本过滤器共用同一个分类器，扩展名和接口路径只在这里定义一次。
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    registry: Arc<ExtensionRegistry>,
    ignored_prefixes: Vec<String>,
    list_endpoint: String,
    get_endpoint: String,
    api_paths: Vec<String>,
}

impl RequestClassifier {
    pub fn new(
        registry: Arc<ExtensionRegistry>,
        ignored_prefixes: Vec<String>,
        list_endpoint: impl Into<String>,
        get_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            ignored_prefixes,
            list_endpoint: list_endpoint.into(),
            get_endpoint: get_endpoint.into(),
            api_paths: Vec::new(),
        }
    }

    /// 按配置构造，扩展名表也在这里一次性建好
    pub fn from_config(config: &MediaAuditConfig) -> Self {
        let registry = Arc::new(ExtensionRegistry::new(&config.extensions));
        Self::new(
            registry,
            config.ignored_prefixes.clone(),
            config.list_endpoint.as_str(),
            config.get_endpoint.as_str(),
        )
        .with_api_paths(config.api_paths.clone())
    }

    /// 设置文本过滤器额外识别的 API 路径
    pub fn with_api_paths(mut self, api_paths: Vec<String>) -> Self {
        self.api_paths = api_paths;
        self
    }

    /// 对路径（可带查询串）分类，优先级：忽略 > 媒体文件 > 列表 > 详情 > 其他
    pub fn classify(&self, path_and_query: &str) -> Category {
        let path = strip_query(path_and_query);

        if self.is_ignored(path) {
            return Category::Ignored;
        }
        if self.registry.is_media(path) {
            return Category::DirectMedia;
        }
        if path == self.list_endpoint {
            return Category::ListQuery;
        }
        if path == self.get_endpoint {
            return Category::GetQuery;
        }
        Category::Other
    }

    /// 对 hyper 请求分类，只看 URI 路径
    pub fn classify_request<B>(&self, req: &Request<B>) -> Category {
        self.classify(req.uri().path())
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignored_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// 是否为需要看响应内容才能判断的 API 路径，查询串不参与比较
    pub fn is_api_path(&self, path_and_query: &str) -> bool {
        let path = strip_query(path_and_query);
        self.api_paths().contains(&path)
    }

    pub fn registry(&self) -> &Arc<ExtensionRegistry> {
        &self.registry
    }

    pub fn ignored_prefixes(&self) -> &[String] {
        &self.ignored_prefixes
    }

    pub fn list_endpoint(&self) -> &str {
        &self.list_endpoint
    }

    pub fn get_endpoint(&self) -> &str {
        &self.get_endpoint
    }

    /// 列表、详情接口加上额外 API 路径
    pub fn api_paths(&self) -> Vec<&str> {
        let mut paths = vec![self.list_endpoint.as_str(), self.get_endpoint.as_str()];
        for path in &self.api_paths {
            if !paths.contains(&path.as_str()) {
                paths.push(path);
            }
        }
        paths
    }
}

impl Default for RequestClassifier {
    fn default() -> Self {
        Self::from_config(&MediaAuditConfig::default())
    }
}

pub(crate) fn strip_query(path_and_query: &str) -> &str {
    match path_and_query.find('?') {
        Some(idx) => &path_and_query[..idx],
        None => path_and_query,
    }
}
