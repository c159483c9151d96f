//! 实体标识
//!
//! 一个被选中实体的持久名字：所属文档的绝对路径 + 宿主分配的
//! 十六进制句柄。句柄在同一文档的生命周期内不会被宿主复用，
//! 但标识存在不保证实体仍然存在（可能已被删除）。

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// 路径归一化：反斜杠转正斜杠，整体小写
///
/// 宿主平台的文档路径大小写不敏感，持久化与网络交换的路径
/// 必须按归一化形式比较，否则同一文档会被当成两个。
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}

/// 去重键：归一化路径 + 小写句柄
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    path: String,
    handle: String,
}

/// 实体的持久标识
///
/// `session_id` 仅在标识由网络对等进程上报时设置，用于区分
/// 不同进程中打开的同名文档；它参与显示但不参与相等性。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityIdentity {
    /// 所属文档的绝对路径（未保存的文档使用其临时内存名）
    pub document_path: String,

    /// 实体句柄，十六进制字符串
    pub handle: String,

    /// 上报该标识的对等会话，仅网络作用域设置
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl EntityIdentity {
    pub fn new(document_path: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            document_path: document_path.into(),
            handle: handle.into(),
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// 去重键
    pub fn key(&self) -> IdentityKey {
        IdentityKey {
            path: normalize_path(&self.document_path),
            handle: self.handle.trim().to_lowercase(),
        }
    }

    /// 解析句柄为数值；非法十六进制返回 `None`
    pub fn handle_value(&self) -> Option<u64> {
        let h = self.handle.trim();
        if h.is_empty() {
            return None;
        }
        u64::from_str_radix(h, 16).ok()
    }

    /// 归一化后的文档路径
    pub fn normalized_path(&self) -> String {
        normalize_path(&self.document_path)
    }

    /// 文档文件名（归一化，小写），作为文档桶的键
    pub fn file_name(&self) -> String {
        let normalized = self.normalized_path();
        normalized
            .rsplit('/')
            .next()
            .unwrap_or(normalized.as_str())
            .to_string()
    }
}

impl PartialEq for EntityIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for EntityIdentity {}

impl Hash for EntityIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for EntityIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.session_id {
            Some(session) => {
                write!(f, "{}#{} @{}", self.document_path, self.handle, session)
            }
            None => write!(f, "{}#{}", self.document_path, self.handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_case_and_separator() {
        let a = EntityIdentity::new(r"C:\Drawings\Plant.dwg", "2F4A");
        let b = EntityIdentity::new("c:/drawings/plant.dwg", "2f4a");
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_session_id_not_part_of_key() {
        let local = EntityIdentity::new("c:/a.dwg", "1a");
        let remote = EntityIdentity::new("c:/a.dwg", "1a").with_session("peer-7");
        assert_eq!(local, remote);
    }

    #[test]
    fn test_handle_value_parses_hex() {
        let id = EntityIdentity::new("c:/a.dwg", "2F4A");
        assert_eq!(id.handle_value(), Some(0x2F4A));

        let bad = EntityIdentity::new("c:/a.dwg", "not-hex");
        assert_eq!(bad.handle_value(), None);

        let empty = EntityIdentity::new("c:/a.dwg", "  ");
        assert_eq!(empty.handle_value(), None);
    }

    #[test]
    fn test_file_name() {
        let id = EntityIdentity::new(r"C:\Drawings\Sub\Plant.DWG", "1");
        assert_eq!(id.file_name(), "plant.dwg");
    }

    #[test]
    fn test_serde_skips_missing_session() {
        let id = EntityIdentity::new("c:/a.dwg", "1a");
        let json = serde_json::to_string(&id).unwrap();
        assert!(!json.contains("session_id"));

        let back: EntityIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert_eq!(back.session_id, None);
    }
}
