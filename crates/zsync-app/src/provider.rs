//! 查询端点的数据来源
//!
//! 对等进程问"你选了什么"时，本进程回答打开文档对应桶的并集。
//! 读取走存储层的容错路径，桶损坏或缺失都不会让查询失败。

use std::sync::Arc;

use zsync_core::identity::EntityIdentity;
use zsync_core::selection::SelectionSet;
use zsync_host::document::DocumentHost;
use zsync_net::server::SelectionProvider;
use zsync_store::bucket::BucketKey;
use zsync_store::store::SelectionStore;

/// 存储支撑的选择提供者
pub struct StoreSelectionProvider {
    store: SelectionStore,
    host: Arc<dyn DocumentHost>,
}

impl StoreSelectionProvider {
    pub fn new(store: SelectionStore, host: Arc<dyn DocumentHost>) -> Self {
        Self { store, host }
    }
}

impl SelectionProvider for StoreSelectionProvider {
    fn current_selection(&self) -> Vec<EntityIdentity> {
        let mut merged = SelectionSet::new();
        for document in self.host.open_documents() {
            match BucketKey::for_document(&document.file_name()) {
                Ok(key) => {
                    merged.merge(self.store.load(&key));
                }
                Err(e) => tracing::debug!("Skipping document without bucket: {}", e),
            }
        }
        merged.into_vec()
    }

    fn open_documents(&self) -> Vec<String> {
        self.host
            .open_documents()
            .iter()
            .map(|d| d.file_name())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zsync_host::memory::MemoryHost;

    #[test]
    fn test_only_open_documents_contribute() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectionStore::open(dir.path()).unwrap();
        let host = Arc::new(MemoryHost::new());
        host.open_document("c:/a.dwg");

        store
            .save(
                &BucketKey::for_document("a.dwg").unwrap(),
                &[EntityIdentity::new("c:/a.dwg", "1")],
            )
            .unwrap();
        store
            .save(
                &BucketKey::for_document("closed.dwg").unwrap(),
                &[EntityIdentity::new("c:/closed.dwg", "9")],
            )
            .unwrap();

        let provider = StoreSelectionProvider::new(store, host);
        let selection = provider.current_selection();
        assert_eq!(selection.len(), 1);
        assert_eq!(selection[0].handle, "1");
        assert_eq!(provider.open_documents(), vec!["a.dwg".to_string()]);
    }
}
