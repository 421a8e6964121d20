//! 响应解析：从列表/详情接口的 JSON 响应中找出媒体文件
//!
//! 解析是尽力而为的。JSON 无法解析、结构不匹配或 `code != 200` 时只是没有命中，
//! 不会产生任何对外可见的错误。

use std::sync::Arc;

use serde::{Deserialize, Deserializer};

use crate::classify::Category;
use crate::config::HitPathStyle;
use crate::extensions::ExtensionRegistry;

/// 允许提取命中的响应码
pub const SUCCESS_CODE: i64 = 200;

/// 文件条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryKind {
    #[default]
    File,
    Dir,
}

/// 响应中的文件条目
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct FileEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub path: String,
    #[serde(default, rename = "is_dir", deserialize_with = "kind_from_is_dir")]
    pub kind: EntryKind,
}

/// 目录列表响应
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListEnvelope {
    pub code: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: Vec<FileEntry>,
}

/// 单个对象详情响应
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GetEnvelope {
    pub code: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: FileEntry,
}

/// 列表/详情请求体，只关心查询的路径
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct QueryRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub path: String,
}

/// 一个确认为媒体文件的条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub name: String,
    pub path: String,
    /// 日志中展示的路径
    pub display_path: String,
}

/// 一次响应的解析结果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Inspection {
    /// 请求体中查询的目录或路径，没有则为空
    pub queried_path: String,
    /// 命中，保持响应中的原始顺序
    pub hits: Vec<Hit>,
}

impl Inspection {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.hits.iter().map(|hit| hit.name.as_str()).collect()
    }

    /// 按 [`HitPathStyle`] 展示的路径
    pub fn display_paths(&self) -> Vec<&str> {
        self.hits.iter().map(|hit| hit.display_path.as_str()).collect()
    }
}

/// 响应解析器
#[derive(Debug, Clone)]
pub struct ResponseInspector {
    registry: Arc<ExtensionRegistry>,
    path_style: HitPathStyle,
}

impl ResponseInspector {
    pub fn new(registry: Arc<ExtensionRegistry>, path_style: HitPathStyle) -> Self {
        Self {
            registry,
            path_style,
        }
    }

    /// 按类别解析捕获的请求体和响应体
    pub fn inspect(&self, category: Category, request: &[u8], response: &[u8]) -> Inspection {
        let hits = match category {
            Category::ListQuery => self.list_hits(response),
            Category::GetQuery => self.get_hits(response),
            _ => return Inspection::default(),
        };
        Inspection {
            queried_path: queried_path(request),
            hits,
        }
    }

    /// 解析目录列表响应，收集全部媒体文件
    pub fn list_hits(&self, response: &[u8]) -> Vec<Hit> {
        let envelope: ListEnvelope = match decode(response) {
            Some(envelope) => envelope,
            None => return Vec::new(),
        };
        if envelope.code != SUCCESS_CODE {
            return Vec::new();
        }

        envelope
            .content
            .into_iter()
            .filter(|entry| entry.kind == EntryKind::File && self.registry.is_media(&entry.name))
            .map(|entry| {
                let display_path = match self.path_style {
                    HitPathStyle::Name => entry.name.clone(),
                    HitPathStyle::Joined => join_path(&entry.path, &entry.name),
                };
                Hit {
                    name: entry.name,
                    path: entry.path,
                    display_path,
                }
            })
            .collect()
    }

    /// 解析详情响应，最多一个命中
    pub fn get_hits(&self, response: &[u8]) -> Vec<Hit> {
        let envelope: GetEnvelope = match decode(response) {
            Some(envelope) => envelope,
            None => return Vec::new(),
        };
        if envelope.code != SUCCESS_CODE
            || envelope.data.kind != EntryKind::File
            || !self.registry.is_media(&envelope.data.name)
        {
            return Vec::new();
        }

        let data = envelope.data;
        let display_path = if data.path.is_empty() {
            data.name.clone()
        } else {
            data.path.clone()
        };
        vec![Hit {
            name: data.name,
            path: data.path,
            display_path,
        }]
    }
}

fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Option<T> {
    if bytes.is_empty() {
        return None;
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::trace!(error = %err, len = bytes.len(), "response payload not decodable, no hits");
            None
        }
    }
}

fn queried_path(request: &[u8]) -> String {
    decode::<QueryRequest>(request)
        .map(|req| req.path)
        .unwrap_or_default()
}

pub(crate) fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        return name.to_string();
    }
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn kind_from_is_dir<'de, D>(deserializer: D) -> Result<EntryKind, D::Error>
where
    D: Deserializer<'de>,
{
    let is_dir = Option::<bool>::deserialize(deserializer)?.unwrap_or(false);
    Ok(if is_dir { EntryKind::Dir } else { EntryKind::File })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inspector(style: HitPathStyle) -> ResponseInspector {
        ResponseInspector::new(Arc::new(ExtensionRegistry::default()), style)
    }

    #[test]
    fn test_list_single_media_hit() {
        let body = br#"{"code":200,"content":[{"name":"a.mp4","path":"/x"},{"name":"a.txt","path":"/x"}]}"#;
        let hits = inspector(HitPathStyle::Name).list_hits(body);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "a.mp4");
        assert_eq!(hits[0].display_path, "a.mp4");
    }

    #[test]
    fn test_list_collects_all_hits_in_order() {
        let body = br#"{"code":200,"content":[
            {"name":"z.PNG","path":"/p/"},
            {"name":"notes.md","path":"/p"},
            {"name":"clip.mkv","path":"/p"},
            {"name":"album.jpg","path":"/p","is_dir":true}
        ]}"#;
        let hits = inspector(HitPathStyle::Joined).list_hits(body);
        let shown: Vec<&str> = hits.iter().map(|h| h.display_path.as_str()).collect();
        assert_eq!(shown, vec!["/p/z.PNG", "/p/clip.mkv"]);
    }

    #[test]
    fn test_get_hit_uses_path() {
        let body = br#"{"code":200,"data":{"name":"b.mkv","path":"/y/b.mkv"}}"#;
        let hits = inspector(HitPathStyle::Name).get_hits(body);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].display_path, "/y/b.mkv");
    }

    #[test]
    fn test_get_hit_falls_back_to_name() {
        let body = br#"{"code":200,"data":{"name":"b.mkv","path":""}}"#;
        let hits = inspector(HitPathStyle::Name).get_hits(body);
        assert_eq!(hits[0].display_path, "b.mkv");

        let body = br#"{"code":200,"data":{"name":"readme.txt","path":"/y/readme.txt"}}"#;
        assert!(inspector(HitPathStyle::Name).get_hits(body).is_empty());
    }

    #[test]
    fn test_get_directory_is_not_a_hit() {
        let body = br#"{"code":200,"data":{"name":"album.jpg","path":"/photos/album.jpg","is_dir":true}}"#;
        assert!(inspector(HitPathStyle::Name).get_hits(body).is_empty());

        let body = br#"{"code":200,"data":{"name":"album.jpg","path":"/photos/album.jpg","is_dir":false}}"#;
        assert_eq!(inspector(HitPathStyle::Name).get_hits(body).len(), 1);
    }

    #[test]
    fn test_non_200_yields_nothing() {
        let inspector = inspector(HitPathStyle::Name);
        let list = br#"{"code":500,"content":[{"name":"a.mp4","path":"/x"}]}"#;
        let get = br#"{"code":403,"data":{"name":"b.mkv","path":"/y/b.mkv"}}"#;
        assert!(inspector.list_hits(list).is_empty());
        assert!(inspector.get_hits(get).is_empty());
    }

    #[test]
    fn test_malformed_payloads_yield_nothing() {
        let inspector = inspector(HitPathStyle::Name);
        let cases: [&[u8]; 6] = [
            b"",
            b"<html>502</html>",
            br#"{"code":200,"content":[{"name":"a.mp4""#,
            br#"{"code":"200","content":[]}"#,
            br#"[1,2,3]"#,
            &[0xff, 0xfe, 0x00],
        ];
        for body in cases {
            assert!(inspector.list_hits(body).is_empty());
            assert!(inspector.get_hits(body).is_empty());
        }
    }

    #[test]
    fn test_null_content_is_empty() {
        let body = br#"{"code":200,"content":null}"#;
        assert!(inspector(HitPathStyle::Name).list_hits(body).is_empty());
    }

    #[test]
    fn test_inspect_by_category() {
        let inspector = inspector(HitPathStyle::Name);
        let request = br#"{"path":"/movies","password":""}"#;
        let response = br#"{"code":200,"content":[{"name":"a.mp4","path":"/movies"}]}"#;

        let inspection = inspector.inspect(Category::ListQuery, request, response);
        assert_eq!(inspection.queried_path, "/movies");
        assert_eq!(inspection.names(), vec!["a.mp4"]);

        let other = inspector.inspect(Category::Other, request, response);
        assert!(other.is_empty());
        assert!(other.queried_path.is_empty());

        let garbage_request = inspector.inspect(Category::ListQuery, b"path=/movies", response);
        assert_eq!(garbage_request.queried_path, "");
        assert_eq!(garbage_request.hits.len(), 1);
    }
}
