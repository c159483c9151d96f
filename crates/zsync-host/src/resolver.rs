//! 实体解析
//!
//! 把持久标识解析回活动对象引用。标识可能过期：文档没开、
//! 句柄损坏、实体已删除都是常态，解析结果是明确的三态，
//! 绝不向外抛异常。"文档没开"与"句柄无效"必须可区分，
//! 前者调用方通常静默跳过，后者值得警告。

use zsync_core::identity::EntityIdentity;

use crate::document::{DocumentHost, DocumentInfo, LiveEntity};

/// 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// 得到活动引用，仅本事务内有效
    Resolved(LiveEntity),

    /// 所属文档当前未打开
    DocumentNotOpen,

    /// 句柄非法、未绑定或实体已删除
    NotResolvable,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// 实体解析器
///
/// 不缓存对象引用，只做逐条解析；标识的缓存由存储层负责。
pub struct EntityResolver<'a> {
    host: &'a dyn DocumentHost,
}

impl<'a> EntityResolver<'a> {
    pub fn new(host: &'a dyn DocumentHost) -> Self {
        Self { host }
    }

    /// 解析一条标识
    ///
    /// 步骤：句柄按十六进制解析 → 匹配打开文档 → 宿主句柄表
    /// 查询（未绑定或已删除视为不可解析）。
    pub fn resolve(&self, identity: &EntityIdentity) -> Resolution {
        let Some(handle) = identity.handle_value() else {
            return Resolution::NotResolvable;
        };

        let Some(document) = self.find_open_document(identity) else {
            return Resolution::DocumentNotOpen;
        };

        match self.host.entity_by_handle(&document.path, handle) {
            Some(entity) => Resolution::Resolved(entity),
            None => Resolution::NotResolvable,
        }
    }

    /// 在指定文档内解析（文档已确认打开时的快捷路径）
    pub fn resolve_in(&self, document: &DocumentInfo, identity: &EntityIdentity) -> Resolution {
        let Some(handle) = identity.handle_value() else {
            return Resolution::NotResolvable;
        };
        match self.host.entity_by_handle(&document.path, handle) {
            Some(entity) => Resolution::Resolved(entity),
            None => Resolution::NotResolvable,
        }
    }

    fn find_open_document(&self, identity: &EntityIdentity) -> Option<DocumentInfo> {
        let wanted = identity.normalized_path();
        self.host
            .open_documents()
            .into_iter()
            .find(|d| d.normalized_path() == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryHost;

    fn host_with_plant() -> MemoryHost {
        let host = MemoryHost::new();
        host.open_document(r"C:\Drawings\Plant.dwg");
        host.add_entity(r"C:\Drawings\Plant.dwg", 0x1F);
        host.add_entity(r"C:\Drawings\Plant.dwg", 0x2A);
        host
    }

    #[test]
    fn test_resolve_live_entity() {
        let host = host_with_plant();
        let resolver = EntityResolver::new(&host);

        // 大小写与分隔符不同仍能匹配到打开文档
        let id = EntityIdentity::new("c:/drawings/plant.dwg", "1f");
        match resolver.resolve(&id) {
            Resolution::Resolved(entity) => assert_eq!(entity.handle, 0x1F),
            other => panic!("expected resolved, got {other:?}"),
        }
    }

    #[test]
    fn test_document_not_open_is_distinct() {
        let host = host_with_plant();
        let resolver = EntityResolver::new(&host);

        let id = EntityIdentity::new("c:/drawings/other.dwg", "1f");
        assert_eq!(resolver.resolve(&id), Resolution::DocumentNotOpen);
    }

    #[test]
    fn test_bad_handle_not_resolvable_without_panic() {
        let host = host_with_plant();
        let resolver = EntityResolver::new(&host);

        let id = EntityIdentity::new(r"C:\Drawings\Plant.dwg", "zz-not-hex");
        assert_eq!(resolver.resolve(&id), Resolution::NotResolvable);
    }

    #[test]
    fn test_erased_entity_not_resolvable() {
        let host = host_with_plant();
        host.erase_entity(r"C:\Drawings\Plant.dwg", 0x2A);
        let resolver = EntityResolver::new(&host);

        let id = EntityIdentity::new(r"C:\Drawings\Plant.dwg", "2a");
        assert_eq!(resolver.resolve(&id), Resolution::NotResolvable);
    }

    #[test]
    fn test_unbound_handle_not_resolvable() {
        let host = host_with_plant();
        let resolver = EntityResolver::new(&host);

        let id = EntityIdentity::new(r"C:\Drawings\Plant.dwg", "ffff");
        assert_eq!(resolver.resolve(&id), Resolution::NotResolvable);
    }
}
