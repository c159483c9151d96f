//! 宿主文档契约
//!
//! 同步层消费的宿主能力：打开文档枚举、按句柄取对象、
//! 文档互斥锁、当前拾取集、激活请求。这些调用都假定
//! 同步且可靠，失败按单实体/单文档错误处理。

use zsync_core::identity::{normalize_path, EntityIdentity};

use crate::error::HostError;

/// 一个打开的文档
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    /// 文档绝对路径（未保存文档为临时内存名）
    pub path: String,
}

impl DocumentInfo {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn normalized_path(&self) -> String {
        normalize_path(&self.path)
    }

    /// 文档文件名（归一化小写）
    pub fn file_name(&self) -> String {
        let normalized = self.normalized_path();
        normalized
            .rsplit('/')
            .next()
            .unwrap_or(normalized.as_str())
            .to_string()
    }
}

/// 活动对象引用
///
/// 仅在当前事务范围内有效，不得缓存；跨事务必须重新解析。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveEntity {
    pub document_path: String,
    pub handle: u64,
}

/// 文档互斥锁，释放即解锁
///
/// 锁的粒度是单文档、单次事务；持锁期间绝不发起网络调用。
#[derive(Debug)]
pub struct DocumentLock {
    document: String,
}

impl DocumentLock {
    pub fn new(document: impl Into<String>) -> Self {
        let document = document.into();
        tracing::debug!("Locked document {}", document);
        Self { document }
    }

    pub fn document(&self) -> &str {
        &self.document
    }
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        tracing::debug!("Released document {}", self.document);
    }
}

/// 宿主文档能力契约
pub trait DocumentHost: Send + Sync {
    /// 当前打开的所有文档
    fn open_documents(&self) -> Vec<DocumentInfo>;

    /// 活动文档
    fn active_document(&self) -> Option<DocumentInfo>;

    /// 在指定文档的当前数据库代中按句柄取对象
    ///
    /// 句柄未绑定或已被删除返回 `None`。
    fn entity_by_handle(&self, document_path: &str, handle: u64) -> Option<LiveEntity>;

    /// 锁定文档以便变更
    fn lock_document(&self, document_path: &str) -> Result<DocumentLock, HostError>;

    /// 当前视图的拾取集
    fn current_pick_set(&self) -> Vec<EntityIdentity>;

    /// 请求激活另一个文档；完成时宿主通过激活总线通知
    fn request_activation(&self, document_path: &str);
}
