//! 桶键
//!
//! 每个桶对应磁盘上的一个文件：文档桶按文档文件名（大小写
//! 不敏感）命名，全局桶使用固定键。文件名经过消毒，任何
//! 不安全字符都映射为下划线，避免路径穿越。

use std::fmt;

use zsync_core::identity::normalize_path;

use crate::error::StoreError;

/// 桶文件扩展名
pub const BUCKET_EXT: &str = "sel";

/// 文档桶文件名前缀
pub const DOC_PREFIX: &str = "doc_";

/// 全局桶文件名（不含扩展名）
pub const GLOBAL_STEM: &str = "global";

/// 选择集桶的键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BucketKey {
    /// 进程级全局桶
    Global,

    /// 单文档桶，键为文档文件名
    Document(String),
}

impl BucketKey {
    /// 由文档文件名构造文档桶键
    pub fn for_document(file_name: &str) -> Result<Self, StoreError> {
        let normalized = normalize_path(file_name);
        let name = normalized
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        if name.is_empty() {
            return Err(StoreError::InvalidBucket(file_name.to_string()));
        }
        Ok(BucketKey::Document(name))
    }

    /// 桶对应的磁盘文件名
    pub fn file_name(&self) -> String {
        match self {
            BucketKey::Global => format!("{GLOBAL_STEM}.{BUCKET_EXT}"),
            BucketKey::Document(name) => {
                format!("{DOC_PREFIX}{}.{BUCKET_EXT}", sanitize(name))
            }
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::Global => f.write_str("global"),
            BucketKey::Document(name) => write!(f, "document:{name}"),
        }
    }
}

/// 文件名消毒：保留字母数字、点、连字符，其余转下划线
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
