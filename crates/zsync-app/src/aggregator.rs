//! 作用域聚合器
//!
//! 四级作用域策略的唯一实现：
//! - 视图：宿主当前拾取集，从不持久化
//! - 文档：活动文档的持久化桶，防御性按属主路径再过滤
//! - 会话：磁盘上所有文档桶；未打开的文档按"跳过"计数上报
//! - 网络：刷新会话注册表，并发查询对等进程并合并
//!
//! 合并规则：按标识键去重的并集，首见顺序为
//! （本地桶遍历顺序，然后对等响应按发现顺序）。
//! 对等查询有单对等超时与整体操作超时双重约束，
//! 部分对等失败只会减少结果，不会中止操作。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};

use zsync_core::identity::EntityIdentity;
use zsync_core::scope::Scope;
use zsync_core::selection::SelectionSet;
use zsync_host::document::{DocumentHost, DocumentInfo, LiveEntity};
use zsync_host::resolver::{EntityResolver, Resolution};
use zsync_net::client::PeerClient;
use zsync_net::protocol::AuthToken;
use zsync_net::registry::{shared_auth_token, SessionRegistry};
use zsync_store::bucket::BucketKey;
use zsync_store::store::SelectionStore;

use crate::error::AggregateError;

/// 解析选项
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// 逐条记录被丢弃的过期标识（默认只计数）
    pub verbose: bool,

    /// 单个对等请求的超时
    pub peer_timeout: Duration,

    /// 整个网络作用域操作的上限，与对等数量无关
    pub operation_timeout: Duration,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            peer_timeout: Duration::from_secs(3),
            operation_timeout: Duration::from_secs(10),
        }
    }
}

/// 解析出的一个活动实体
#[derive(Debug, Clone)]
pub struct ResolvedEntity {
    pub identity: EntityIdentity,
    pub entity: LiveEntity,
}

/// 单个对等的查询状态
#[derive(Debug, Clone)]
pub struct PeerStatus {
    pub session_id: String,
    /// 该对等返回的标识条数
    pub entities: usize,
    pub reachable: bool,
}

/// 一次作用域解析的结果
#[derive(Debug, Default)]
pub struct ScopeOutcome {
    /// 本进程内解析成功的实体
    pub resolved: Vec<ResolvedEntity>,

    /// 仅远端打开的文档里的标识，本地无法解析为活动引用
    pub remote: Vec<EntityIdentity>,

    /// 文件名 -> 因文档未打开而跳过的标识数
    pub skipped_documents: BTreeMap<String, usize>,

    /// 被丢弃的过期/损坏标识数
    pub dropped: usize,

    /// 网络作用域的逐对等状态
    pub peers: Vec<PeerStatus>,
}

/// 作用域聚合器
///
/// 显式构造：存储、宿主与注册表都从外部传入，
/// 每次网络作用域调用刷新对等列表，不缓存环境状态。
pub struct ScopeAggregator {
    store: SelectionStore,
    host: Arc<dyn DocumentHost>,
    registry: SessionRegistry,
    /// 覆盖环境令牌，测试注入用
    token_override: Option<AuthToken>,
    /// 对等 URL 方案，回环测试用明文 HTTP
    scheme: String,
}

impl ScopeAggregator {
    pub fn new(store: SelectionStore, host: Arc<dyn DocumentHost>, registry: SessionRegistry) -> Self {
        Self {
            store,
            host,
            registry,
            token_override: None,
            scheme: "https".to_string(),
        }
    }

    pub fn with_auth_token(mut self, token: AuthToken) -> Self {
        self.token_override = Some(token);
        self
    }

    /// 仅供回环测试
    pub fn with_plain_http(mut self) -> Self {
        self.scheme = "http".to_string();
        self
    }

    /// 消费命令的唯一调用面：在作用域 S 上解析实体
    pub async fn resolve_scope(
        &self,
        scope: Scope,
        options: &ResolveOptions,
    ) -> Result<ScopeOutcome, AggregateError> {
        match scope {
            Scope::View => self.resolve_view(options),
            Scope::Document => self.resolve_document(options),
            Scope::Session => self.resolve_session(options),
            Scope::Network => self.resolve_network(options).await,
        }
    }

    /// 生产命令的唯一调用面：把实体持久化到作用域 S
    ///
    /// 返回实际写入的标识数。视图作用域从不持久化，返回 0。
    /// 保存是全有或全无：用户取消的拾取根本不会走到这里，
    /// 已有桶不会被部分覆盖。
    pub fn persist_scope(
        &self,
        scope: Scope,
        entities: &[EntityIdentity],
    ) -> Result<usize, AggregateError> {
        match scope {
            Scope::View => {
                tracing::debug!("View-scope selections are transient, nothing persisted");
                Ok(0)
            }
            Scope::Document => self.persist_document(entities),
            // 网络作用域的持久化只落本地桶：协议只有查询端点，
            // 对等进程各自持有并上报自己的快照
            Scope::Session | Scope::Network => self.persist_per_document(entities),
        }
    }

    // ── 视图作用域 ─────────────────────────────────────

    fn resolve_view(&self, options: &ResolveOptions) -> Result<ScopeOutcome, AggregateError> {
        let mut outcome = ScopeOutcome::default();
        let resolver = EntityResolver::new(self.host.as_ref());

        for identity in self.host.current_pick_set() {
            match resolver.resolve(&identity) {
                Resolution::Resolved(entity) => {
                    outcome.resolved.push(ResolvedEntity { identity, entity });
                }
                Resolution::DocumentNotOpen => {
                    *outcome
                        .skipped_documents
                        .entry(identity.file_name())
                        .or_insert(0) += 1;
                }
                Resolution::NotResolvable => {
                    outcome.dropped += 1;
                    if options.verbose {
                        tracing::debug!("Dropped stale pick {}", identity);
                    }
                }
            }
        }
        Ok(outcome)
    }

    // ── 文档作用域 ─────────────────────────────────────

    fn resolve_document(&self, options: &ResolveOptions) -> Result<ScopeOutcome, AggregateError> {
        let active = self
            .host
            .active_document()
            .ok_or(AggregateError::NoActiveDocument)?;
        let key = BucketKey::for_document(&active.file_name())?;
        let items = self.store.load(&key);

        let mut outcome = ScopeOutcome::default();
        let active_path = active.normalized_path();

        // 防御性再过滤：桶里理论上可能混入别的文档的条目
        // （历史缺陷或手工编辑），属主不符的直接丢弃
        let mut owned = Vec::new();
        for identity in items {
            if identity.normalized_path() == active_path {
                owned.push(identity);
            } else {
                outcome.dropped += 1;
                if options.verbose {
                    tracing::debug!("Dropped foreign entry {} in bucket {}", identity, key);
                }
            }
        }

        self.resolve_in_document(&active, owned, &mut outcome, options.verbose);
        Ok(outcome)
    }

    // ── 会话作用域 ─────────────────────────────────────

    fn resolve_session(&self, options: &ResolveOptions) -> Result<ScopeOutcome, AggregateError> {
        let items = self.store.load_all_document_buckets();
        let mut outcome = ScopeOutcome::default();
        self.resolve_partitioned(items, &mut outcome, options.verbose);
        Ok(outcome)
    }

    // ── 网络作用域 ─────────────────────────────────────

    async fn resolve_network(&self, options: &ResolveOptions) -> Result<ScopeOutcome, AggregateError> {
        // 配置性失败必须在接触任何对等之前发生，
        // 绝不在无鉴权状态下部分运行
        let token = self
            .token_override
            .clone()
            .or_else(shared_auth_token)
            .ok_or(AggregateError::MissingAuthToken)?;

        let client = PeerClient::new(token, options.peer_timeout)?.with_scheme(self.scheme.clone());
        let peers = self.registry.active_peers(&client).await;

        // 本地桶先入并集，随后按发现顺序并入对等响应
        let mut merged: SelectionSet = self.store.load_all_document_buckets().into_iter().collect();

        let mut responses = self.query_peers(&client, &peers, options).await;

        let mut outcome = ScopeOutcome::default();
        for peer in &peers {
            match responses.remove(&peer.session_id) {
                Some(items) => {
                    outcome.peers.push(PeerStatus {
                        session_id: peer.session_id.clone(),
                        entities: items.len(),
                        reachable: true,
                    });
                    merged.merge(items);
                }
                None => {
                    outcome.peers.push(PeerStatus {
                        session_id: peer.session_id.clone(),
                        entities: 0,
                        reachable: false,
                    });
                }
            }
        }

        // 本地打开的文档立即解析；仅远端持有的保留为纯标识
        let open: HashMap<String, DocumentInfo> = self
            .host
            .open_documents()
            .into_iter()
            .map(|d| (d.normalized_path(), d))
            .collect();

        let mut local_groups: Vec<(DocumentInfo, Vec<EntityIdentity>)> = Vec::new();
        let mut group_index: HashMap<String, usize> = HashMap::new();
        for identity in merged {
            let path = identity.normalized_path();
            match open.get(&path) {
                Some(document) => {
                    let index = *group_index.entry(path).or_insert_with(|| {
                        local_groups.push((document.clone(), Vec::new()));
                        local_groups.len() - 1
                    });
                    local_groups[index].1.push(identity);
                }
                None => outcome.remote.push(identity),
            }
        }

        for (document, identities) in local_groups {
            self.resolve_in_document(&document, identities, &mut outcome, options.verbose);
        }
        Ok(outcome)
    }

    /// 并发查询所有对等，双重超时约束，容忍部分完成
    async fn query_peers(
        &self,
        client: &PeerClient,
        peers: &[zsync_core::session::SessionEntry],
        options: &ResolveOptions,
    ) -> HashMap<String, Vec<EntityIdentity>> {
        let deadline = tokio::time::Instant::now() + options.operation_timeout;
        let mut pending: FuturesUnordered<_> = peers
            .iter()
            .map(|peer| async move {
                let result =
                    tokio::time::timeout(options.peer_timeout, client.query_selection(peer)).await;
                (peer.session_id.clone(), result)
            })
            .collect();

        let mut responses = HashMap::new();
        loop {
            match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some((session, Ok(Ok(items))))) => {
                    responses.insert(session, items);
                }
                Ok(Some((session, Ok(Err(e))))) => {
                    tracing::warn!("Peer {} returned no entities: {}", session, e);
                }
                Ok(Some((session, Err(_)))) => {
                    tracing::warn!("Peer {} timed out", session);
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        "Network scope operation timeout, continuing with {} of {} peers",
                        responses.len(),
                        peers.len()
                    );
                    break;
                }
            }
        }
        responses
    }

    // ── 公共解析与持久化 ───────────────────────────────

    /// 按属主文档分组解析；未打开的文档计入跳过而不是静默丢弃
    fn resolve_partitioned(
        &self,
        items: Vec<EntityIdentity>,
        outcome: &mut ScopeOutcome,
        verbose: bool,
    ) {
        let open: HashMap<String, DocumentInfo> = self
            .host
            .open_documents()
            .into_iter()
            .map(|d| (d.normalized_path(), d))
            .collect();

        let mut groups: Vec<(DocumentInfo, Vec<EntityIdentity>)> = Vec::new();
        let mut group_index: HashMap<String, usize> = HashMap::new();
        for identity in items {
            let path = identity.normalized_path();
            match open.get(&path) {
                Some(document) => {
                    let index = *group_index.entry(path).or_insert_with(|| {
                        groups.push((document.clone(), Vec::new()));
                        groups.len() - 1
                    });
                    groups[index].1.push(identity);
                }
                None => {
                    // 用户可能正想打开这个文档，必须让他看到跳过数
                    *outcome
                        .skipped_documents
                        .entry(identity.file_name())
                        .or_insert(0) += 1;
                }
            }
        }

        for (document, identities) in groups {
            self.resolve_in_document(&document, identities, outcome, verbose);
        }
    }

    /// 持锁逐条解析一个文档内的标识；锁失败按整文档跳过
    ///
    /// 锁只覆盖本文档的解析循环，绝不跨网络调用持有。
    fn resolve_in_document(
        &self,
        document: &DocumentInfo,
        identities: Vec<EntityIdentity>,
        outcome: &mut ScopeOutcome,
        verbose: bool,
    ) {
        let _lock = match self.host.lock_document(&document.path) {
            Ok(lock) => lock,
            Err(e) => {
                tracing::warn!("Cannot lock {}: {}", document.path, e);
                *outcome
                    .skipped_documents
                    .entry(document.file_name())
                    .or_insert(0) += identities.len();
                return;
            }
        };

        let resolver = EntityResolver::new(self.host.as_ref());
        for identity in identities {
            match resolver.resolve_in(document, &identity) {
                Resolution::Resolved(entity) => {
                    outcome.resolved.push(ResolvedEntity { identity, entity });
                }
                _ => {
                    outcome.dropped += 1;
                    if verbose {
                        tracing::debug!("Dropped stale identity {}", identity);
                    }
                }
            }
        }
    }

    fn persist_document(&self, entities: &[EntityIdentity]) -> Result<usize, AggregateError> {
        let active = self
            .host
            .active_document()
            .ok_or(AggregateError::NoActiveDocument)?;
        let active_path = active.normalized_path();

        let owned: Vec<EntityIdentity> = entities
            .iter()
            .filter(|e| e.normalized_path() == active_path)
            .cloned()
            .collect();
        let foreign = entities.len() - owned.len();
        if foreign > 0 {
            tracing::warn!(
                "Ignoring {} entities not owned by active document {}",
                foreign,
                active.path
            );
        }

        let key = BucketKey::for_document(&active.file_name())?;
        self.store.save(&key, &owned)?;
        Ok(owned.len())
    }

    /// 按属主文档分桶保存（会话与网络作用域的本地持久化）
    fn persist_per_document(&self, entities: &[EntityIdentity]) -> Result<usize, AggregateError> {
        let mut buckets: BTreeMap<String, Vec<EntityIdentity>> = BTreeMap::new();
        let mut skipped = 0usize;
        for entity in entities {
            let name = entity.file_name();
            if name.is_empty() {
                skipped += 1;
                continue;
            }
            buckets.entry(name).or_default().push(entity.clone());
        }
        if skipped > 0 {
            tracing::warn!("Ignoring {} entities without a document file name", skipped);
        }

        let mut written = 0usize;
        for (name, items) in buckets {
            let key = BucketKey::for_document(&name)?;
            self.store.save(&key, &items)?;
            written += items.len();
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zsync_host::memory::MemoryHost;
    use zsync_net::discovery::FileDiscovery;

    fn id(path: &str, handle: &str) -> EntityIdentity {
        EntityIdentity::new(path, handle)
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        host: Arc<MemoryHost>,
        aggregator: ScopeAggregator,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SelectionStore::open(dir.path().join("selections")).expect("store");
        let host = Arc::new(MemoryHost::new());
        let registry = SessionRegistry::new(Arc::new(FileDiscovery::new(
            dir.path().join("registry.json"),
        )));
        let aggregator = ScopeAggregator::new(store, host.clone(), registry);
        Fixture {
            _dir: dir,
            host,
            aggregator,
        }
    }

    #[tokio::test]
    async fn test_view_scope_resolves_pick_set() {
        let f = fixture();
        f.host.open_document("c:/plant.dwg");
        f.host.add_entity("c:/plant.dwg", 0x1);
        f.host.add_entity("c:/plant.dwg", 0x2);
        f.host.set_pick_set(vec![
            id("c:/plant.dwg", "1"),
            id("c:/plant.dwg", "2"),
            id("c:/plant.dwg", "dead"), // 未绑定
        ]);

        let outcome = f
            .aggregator
            .resolve_scope(Scope::View, &ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.resolved.len(), 2);
        assert_eq!(outcome.dropped, 1);
    }

    #[tokio::test]
    async fn test_document_scope_refilters_foreign_entries() {
        let f = fixture();
        f.host.open_document("c:/plant.dwg");
        f.host.add_entity("c:/plant.dwg", 0x1F);

        // 桶里混入了别的文档的条目
        f.aggregator
            .persist_scope(
                Scope::Session,
                &[id("c:/plant.dwg", "1f"), id("c:/plant.dwg", "99")],
            )
            .unwrap();
        let key = BucketKey::for_document("plant.dwg").unwrap();
        let mut tampered = f.aggregator.store.load(&key);
        tampered.push(id("c:/other.dwg", "5"));
        f.aggregator.store.save(&key, &tampered).unwrap();

        let outcome = f
            .aggregator
            .resolve_scope(Scope::Document, &ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.resolved.len(), 1);
        assert_eq!(outcome.resolved[0].entity.handle, 0x1F);
        // 外来条目 + 过期句柄 99
        assert_eq!(outcome.dropped, 2);
    }

    #[tokio::test]
    async fn test_document_scope_requires_active_document() {
        let f = fixture();
        let result = f
            .aggregator
            .resolve_scope(Scope::Document, &ResolveOptions::default())
            .await;
        assert!(matches!(result, Err(AggregateError::NoActiveDocument)));
    }

    #[tokio::test]
    async fn test_session_scope_reports_closed_documents_as_skipped() {
        let f = fixture();
        // 文档 A 有存储的选择 {h1, h2}，但 A 没有打开
        f.aggregator
            .persist_scope(
                Scope::Session,
                &[id("c:/a.dwg", "1"), id("c:/a.dwg", "2")],
            )
            .unwrap();

        let outcome = f
            .aggregator
            .resolve_scope(Scope::Session, &ResolveOptions::default())
            .await
            .unwrap();
        assert!(outcome.resolved.is_empty());
        assert_eq!(outcome.skipped_documents.get("a.dwg"), Some(&2));
        assert_eq!(outcome.dropped, 0);
    }

    #[tokio::test]
    async fn test_session_scope_resolves_open_documents() {
        let f = fixture();
        f.host.open_document("c:/a.dwg");
        f.host.add_entity("c:/a.dwg", 0x1);
        f.aggregator
            .persist_scope(
                Scope::Session,
                &[id("c:/a.dwg", "1"), id("c:/b.dwg", "7")],
            )
            .unwrap();

        let outcome = f
            .aggregator
            .resolve_scope(Scope::Session, &ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.resolved.len(), 1);
        assert_eq!(outcome.skipped_documents.get("b.dwg"), Some(&1));
    }

    #[tokio::test]
    async fn test_persist_view_is_transient() {
        let f = fixture();
        f.host.open_document("c:/plant.dwg");
        let written = f
            .aggregator
            .persist_scope(Scope::View, &[id("c:/plant.dwg", "1")])
            .unwrap();
        assert_eq!(written, 0);
        assert!(f
            .aggregator
            .store
            .load(&BucketKey::for_document("plant.dwg").unwrap())
            .is_empty());
    }

    #[tokio::test]
    async fn test_persist_document_filters_to_active() {
        let f = fixture();
        f.host.open_document("c:/plant.dwg");
        let written = f
            .aggregator
            .persist_scope(
                Scope::Document,
                &[id("c:/plant.dwg", "1"), id("c:/other.dwg", "2")],
            )
            .unwrap();
        assert_eq!(written, 1);

        let stored = f
            .aggregator
            .store
            .load(&BucketKey::for_document("plant.dwg").unwrap());
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].handle, "1");
    }

    #[tokio::test]
    async fn test_persist_empty_clears_document_bucket() {
        let f = fixture();
        f.host.open_document("c:/plant.dwg");
        f.aggregator
            .persist_scope(Scope::Document, &[id("c:/plant.dwg", "1")])
            .unwrap();
        f.aggregator.persist_scope(Scope::Document, &[]).unwrap();
        assert!(f
            .aggregator
            .store
            .load(&BucketKey::for_document("plant.dwg").unwrap())
            .is_empty());
    }

    #[tokio::test]
    async fn test_network_scope_refuses_without_token() {
        let f = fixture();
        let result = f
            .aggregator
            .resolve_scope(Scope::Network, &ResolveOptions::default())
            .await;
        assert!(matches!(result, Err(AggregateError::MissingAuthToken)));
    }
}
