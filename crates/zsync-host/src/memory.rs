//! 内存宿主
//!
//! `DocumentHost` 的内存实现，供单元测试与独立运行的同步代理
//! 使用。文档、句柄表、拾取集都放在一把互斥锁后面，激活请求
//! 立即完成并通过激活总线发出一次性通知。

use std::collections::HashMap;
use std::sync::Mutex;

use zsync_core::identity::{normalize_path, EntityIdentity};

use crate::activation::ActivationBus;
use crate::document::{DocumentHost, DocumentInfo, DocumentLock, LiveEntity};
use crate::error::HostError;

#[derive(Debug, Default)]
struct MemoryDocument {
    /// 原始路径（保留大小写用于显示）
    path: String,
    /// 句柄 -> 是否已删除
    entities: HashMap<u64, bool>,
}

#[derive(Debug, Default)]
struct Inner {
    /// 归一化路径 -> 文档
    documents: HashMap<String, MemoryDocument>,
    active: Option<String>,
    pick_set: Vec<EntityIdentity>,
}

/// 内存宿主
#[derive(Debug, Default)]
pub struct MemoryHost {
    inner: Mutex<Inner>,
    activation: ActivationBus,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// 打开一个文档；首个打开的文档自动成为活动文档
    pub fn open_document(&self, path: &str) {
        let key = normalize_path(path);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.documents.entry(key.clone()).or_insert_with(|| MemoryDocument {
            path: path.to_string(),
            entities: HashMap::new(),
        });
        if inner.active.is_none() {
            inner.active = Some(key);
        }
    }

    pub fn close_document(&self, path: &str) {
        let key = normalize_path(path);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.documents.remove(&key);
        if inner.active.as_deref() == Some(key.as_str()) {
            let fallback = inner.documents.keys().next().cloned();
            inner.active = fallback;
        }
    }

    pub fn add_entity(&self, path: &str, handle: u64) {
        let key = normalize_path(path);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(doc) = inner.documents.get_mut(&key) {
            doc.entities.insert(handle, false);
        }
    }

    /// 标记实体为已删除；句柄保留（宿主不复用句柄）
    pub fn erase_entity(&self, path: &str, handle: u64) {
        let key = normalize_path(path);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(doc) = inner.documents.get_mut(&key) {
            if let Some(erased) = doc.entities.get_mut(&handle) {
                *erased = true;
            }
        }
    }

    pub fn set_pick_set(&self, identities: Vec<EntityIdentity>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.pick_set = identities;
    }

    /// 激活总线，宿主适配层与等待方共用
    pub fn activation(&self) -> &ActivationBus {
        &self.activation
    }
}

impl DocumentHost for MemoryHost {
    fn open_documents(&self) -> Vec<DocumentInfo> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut docs: Vec<DocumentInfo> = inner
            .documents
            .values()
            .map(|d| DocumentInfo::new(d.path.clone()))
            .collect();
        docs.sort_by(|a, b| a.normalized_path().cmp(&b.normalized_path()));
        docs
    }

    fn active_document(&self) -> Option<DocumentInfo> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let key = inner.active.as_ref()?;
        inner
            .documents
            .get(key)
            .map(|d| DocumentInfo::new(d.path.clone()))
    }

    fn entity_by_handle(&self, document_path: &str, handle: u64) -> Option<LiveEntity> {
        let key = normalize_path(document_path);
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let doc = inner.documents.get(&key)?;
        match doc.entities.get(&handle) {
            Some(false) => Some(LiveEntity {
                document_path: doc.path.clone(),
                handle,
            }),
            // 已删除或未绑定
            _ => None,
        }
    }

    fn lock_document(&self, document_path: &str) -> Result<DocumentLock, HostError> {
        let key = normalize_path(document_path);
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if !inner.documents.contains_key(&key) {
            return Err(HostError::DocumentNotOpen(document_path.to_string()));
        }
        Ok(DocumentLock::new(document_path))
    }

    fn current_pick_set(&self) -> Vec<EntityIdentity> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.pick_set.clone()
    }

    fn request_activation(&self, document_path: &str) {
        let key = normalize_path(document_path);
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if !inner.documents.contains_key(&key) {
                tracing::warn!("Activation requested for closed document {}", document_path);
                return;
            }
            inner.active = Some(key);
        }
        // 内存宿主的激活立即完成
        self.activation.notify(document_path);
    }
}
