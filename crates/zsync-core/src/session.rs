//! 会话条目
//!
//! 描述一个可达的对等进程：会话ID、监听地址与其打开的文档。
//! 条目由发现机制产生，在每次网络作用域命令前刷新，不做长期缓存。

use serde::{Deserialize, Serialize};

use crate::identity::normalize_path;

/// 一个可达的对等进程
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    /// 会话ID，对等进程启动时生成一次
    pub session_id: String,

    /// 监听地址 host:port
    pub address: String,

    /// 该进程当前打开的文档文件名
    #[serde(default)]
    pub documents: Vec<String>,
}

impl SessionEntry {
    pub fn new(session_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            address: address.into(),
            documents: Vec::new(),
        }
    }

    pub fn with_documents<I, S>(mut self, documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.documents = documents.into_iter().map(Into::into).collect();
        self
    }

    /// 该进程是否打开了指定文件名的文档（大小写不敏感）
    pub fn has_document(&self, file_name: &str) -> bool {
        let wanted = normalize_path(file_name);
        self.documents.iter().any(|d| normalize_path(d) == wanted)
    }
}
