//! 基于共享文件的发现实现
//!
//! 协作进程往同一个 JSON 注册文件里登记自己的会话条目，
//! 退出时注销。文件放在共享目录（同机或网络盘）即可工作；
//! 写入是临时文件 + 重命名的原子覆盖，并发登记为尽力而为，
//! 陈旧条目由活性探测过滤，不依赖文件内容的强一致。

use std::fs;
use std::path::{Path, PathBuf};

use zsync_core::session::SessionEntry;

use crate::error::NetError;
use crate::registry::Discovery;

/// 共享注册文件发现
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    path: PathBuf,
}

impl FileDiscovery {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 登记（或更新）一个会话条目
    pub fn announce(&self, entry: SessionEntry) -> Result<(), NetError> {
        let mut entries = self.read_entries();
        entries.retain(|e| e.session_id != entry.session_id);
        entries.push(entry);
        self.write_entries(&entries)
    }

    /// 注销一个会话
    pub fn withdraw(&self, session_id: &str) -> Result<(), NetError> {
        let mut entries = self.read_entries();
        entries.retain(|e| e.session_id != session_id);
        self.write_entries(&entries)
    }

    fn read_entries(&self) -> Vec<SessionEntry> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            // 文件不存在就是空注册表
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    "Registry file {} malformed, starting empty: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    fn write_entries(&self, entries: &[SessionEntry]) -> Result<(), NetError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(entries)?;
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, content)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

impl Discovery for FileDiscovery {
    fn snapshot(&self) -> Result<Vec<SessionEntry>, NetError> {
        Ok(self.read_entries())
    }
}
