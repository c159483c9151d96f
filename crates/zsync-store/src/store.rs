//! 选择集存储
//!
//! 每个桶一个文件，存放在用户数据目录下（可指定根目录）。
//! 保存采用临时文件 + 重命名的原子覆盖，空列表照常写入，
//! 语义是"选择已清空"而不是"没有记录"。

use std::fs;
use std::path::{Path, PathBuf};

use zsync_core::identity::EntityIdentity;
use zsync_core::selection::SelectionSet;

use crate::bucket::{BucketKey, BUCKET_EXT, DOC_PREFIX};
use crate::error::StoreError;
use crate::format::{decode_record, encode_record};

/// 文件头部的格式标记
const FORMAT_TAG: &str = "# zsync selection v1";

/// 选择集存储
#[derive(Debug, Clone)]
pub struct SelectionStore {
    root: PathBuf,
}

impl SelectionStore {
    /// 打开指定根目录下的存储，目录不存在时创建
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// 默认根目录：用户数据目录下的 zsync/selections
    pub fn open_default() -> Result<Self, StoreError> {
        let base = dirs::data_dir()
            .ok_or_else(|| StoreError::RootUnavailable("no user data directory".to_string()))?;
        Self::open(base.join("zsync").join("selections"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 原子覆盖桶内容；空列表清空该桶
    ///
    /// 写入前按标识键去重，保持首见顺序。IO 失败上报调用方。
    pub fn save(&self, key: &BucketKey, items: &[EntityIdentity]) -> Result<(), StoreError> {
        let deduped: SelectionSet = items.iter().cloned().collect();

        let mut content = String::new();
        content.push_str(FORMAT_TAG);
        content.push('\n');
        content.push_str(&format!("# saved {}\n", chrono::Utc::now().to_rfc3339()));
        for identity in deduped.iter() {
            content.push_str(&encode_record(identity));
            content.push('\n');
        }

        let target = self.bucket_path(key);
        let temp = target.with_extension(format!("{BUCKET_EXT}.tmp"));
        fs::write(&temp, content)?;
        fs::rename(&temp, &target)?;

        tracing::info!(
            "Saved {} identities to bucket {} ({})",
            deduped.len(),
            key,
            target.display()
        );
        Ok(())
    }

    /// 读取桶内容；文件缺失、不可读或损坏一律不报错
    ///
    /// 损坏的行单独跳过并计数，其余行正常返回。
    pub fn load(&self, key: &BucketKey) -> Vec<EntityIdentity> {
        self.load_file(&self.bucket_path(key))
    }

    /// 并集读取所有文档桶，按文件名排序遍历，首见去重
    pub fn load_all_document_buckets(&self) -> Vec<EntityIdentity> {
        let mut paths: Vec<PathBuf> = match fs::read_dir(&self.root) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| is_document_bucket(p))
                .collect(),
            Err(e) => {
                tracing::debug!("Cannot list store root {}: {}", self.root.display(), e);
                return Vec::new();
            }
        };
        paths.sort();

        let mut merged = SelectionSet::new();
        for path in paths {
            merged.merge(self.load_file(&path));
        }
        merged.into_vec()
    }

    fn bucket_path(&self, key: &BucketKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    fn load_file(&self, path: &Path) -> Vec<EntityIdentity> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("Bucket {} not readable, treating as empty: {}", path.display(), e);
                return Vec::new();
            }
        };

        let mut items = SelectionSet::new();
        let mut corrupt = 0usize;
        for line in content.lines() {
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            match decode_record(line) {
                Some(identity) => {
                    items.insert(identity);
                }
                None => corrupt += 1,
            }
        }

        if corrupt > 0 {
            tracing::warn!(
                "Skipped {} corrupt lines in bucket {}",
                corrupt,
                path.display()
            );
        }
        items.into_vec()
    }
}

fn is_document_bucket(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.starts_with(DOC_PREFIX) && name.ends_with(&format!(".{BUCKET_EXT}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(path: &str, handle: &str) -> EntityIdentity {
        EntityIdentity::new(path, handle)
    }

    fn temp_store() -> (tempfile::TempDir, SelectionStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SelectionStore::open(dir.path()).expect("open store");
        (dir, store)
    }

    #[test]
    fn test_save_load_roundtrip() {
        let (_dir, store) = temp_store();
        let key = BucketKey::for_document("plant.dwg").unwrap();
        let items = vec![
            id(r"C:\proj, rev2\plant.dwg", "1f"),
            id(r"C:\proj, rev2\plant.dwg", "2a"),
        ];

        store.save(&key, &items).unwrap();
        let loaded = store.load(&key);
        assert_eq!(loaded, items);
        // 路径含逗号也要往返
        assert_eq!(loaded[0].document_path, r"C:\proj, rev2\plant.dwg");
    }

    #[test]
    fn test_save_dedups_preserving_first_seen_order() {
        let (_dir, store) = temp_store();
        let key = BucketKey::Global;
        let items = vec![
            id("c:/a.dwg", "1"),
            id("c:/b.dwg", "9"),
            id("C:/A.DWG", "1").with_session("peer-1"), // 仅 session 不同的重复
        ];

        store.save(&key, &items).unwrap();
        let loaded = store.load(&key);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].handle, "1");
        assert_eq!(loaded[1].handle, "9");
    }

    #[test]
    fn test_empty_save_clears_bucket() {
        let (dir, store) = temp_store();
        let key = BucketKey::for_document("plant.dwg").unwrap();
        store.save(&key, &[id("c:/plant.dwg", "1")]).unwrap();
        store.save(&key, &[]).unwrap();
        assert!(store.load(&key).is_empty());

        // 重新打开（模拟进程重启）仍为空
        let reopened = SelectionStore::open(dir.path()).unwrap();
        assert!(reopened.load(&key).is_empty());
    }

    #[test]
    fn test_load_missing_bucket_is_empty() {
        let (_dir, store) = temp_store();
        assert!(store.load(&BucketKey::Global).is_empty());
        assert!(store.load_all_document_buckets().is_empty());
    }

    #[test]
    fn test_corrupt_lines_skipped_individually() {
        let (dir, store) = temp_store();
        let key = BucketKey::for_document("plant.dwg").unwrap();
        let path = dir.path().join(key.file_name());
        fs::write(
            &path,
            "# zsync selection v1\nc:/plant.dwg,1f\ngarbage-without-delimiter\nc:/plant.dwg,2a\n",
        )
        .unwrap();

        let loaded = store.load(&key);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].handle, "2a");
    }

    #[test]
    fn test_load_all_document_buckets_unions_in_sorted_order() {
        let (_dir, store) = temp_store();
        let key_b = BucketKey::for_document("b.dwg").unwrap();
        let key_a = BucketKey::for_document("a.dwg").unwrap();
        store
            .save(&key_b, &[id("c:/b.dwg", "1"), id("c:/shared.dwg", "5")])
            .unwrap();
        store
            .save(&key_a, &[id("c:/a.dwg", "1"), id("c:/shared.dwg", "5")])
            .unwrap();
        // 全局桶不参与文档桶并集
        store.save(&BucketKey::Global, &[id("c:/g.dwg", "7")]).unwrap();

        let all = store.load_all_document_buckets();
        assert_eq!(all.len(), 3);
        // a.dwg 的桶排序在前
        assert_eq!(all[0].document_path, "c:/a.dwg");
        assert_eq!(all[1].document_path, "c:/shared.dwg");
        assert_eq!(all[2].document_path, "c:/b.dwg");
    }

    #[test]
    fn test_unwritable_root_surfaces_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectionStore::open(dir.path()).unwrap();
        drop(dir); // 根目录被删除，保存必须报错
        let result = store.save(&BucketKey::Global, &[id("c:/a.dwg", "1")]);
        assert!(result.is_err());
    }
}
