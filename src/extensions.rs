//! 媒体文件扩展名注册表

use std::collections::BTreeSet;

/// 内置的图片扩展名
pub const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".svg", ".tiff", ".ico", ".heic",
];

/// 内置的视频扩展名
pub const VIDEO_EXTENSIONS: &[&str] = &[
    ".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm", ".m4v", ".mpg", ".mpeg", ".3gp",
    ".rm", ".rmvb", ".ts", ".m3u8",
];

/// 媒体扩展名集合
///
/// 构造后只读，内部统一存储为小写、带点号的形式（如 `.mp4`）。
/// 空集合是合法的，此时任何名字都不会被判定为媒体文件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionRegistry {
    extensions: BTreeSet<String>,
}

impl ExtensionRegistry {
    /// 从任意形式的扩展名构造（`MP4`、`.mp4`、` .Mp4 ` 都视为 `.mp4`）
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .filter_map(|ext| normalize(ext.as_ref()))
            .collect();
        Self { extensions }
    }

    /// 判断文件名（或路径）是否为媒体文件
    ///
    /// 只看最后一个路径段中最后一个 `.` 之后的部分，大小写不敏感。
    pub fn is_media(&self, name: &str) -> bool {
        match extension_of(name) {
            Some(ext) => self.extensions.contains(&ext),
            None => false,
        }
    }

    /// 判断某个扩展名是否已注册
    pub fn contains(&self, extension: &str) -> bool {
        normalize(extension).map_or(false, |ext| self.extensions.contains(&ext))
    }

    /// 不带点号的扩展名列表（有序），用于拼接正则分支
    pub fn names(&self) -> Vec<&str> {
        self.extensions.iter().map(|ext| &ext[1..]).collect()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new(IMAGE_EXTENSIONS.iter().chain(VIDEO_EXTENSIONS))
    }
}

fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!(".{}", trimmed.to_lowercase()))
}

/// 取最后一个路径段的扩展名（带点号、小写）
fn extension_of(name: &str) -> Option<String> {
    let segment = name.rsplit('/').next().unwrap_or(name);
    let dot = segment.rfind('.')?;
    let ext = &segment[dot..];
    if ext.len() <= 1 {
        return None;
    }
    Some(ext.to_lowercase())
}
