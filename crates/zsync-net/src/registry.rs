//! 会话注册表
//!
//! 本进程的会话身份与当前可达对等列表。对等列表每次网络
//! 作用域命令前重新发现并探测活性，不做长期缓存——对等进程
//! 随时在打开/关闭文档甚至退出，陈旧列表比空列表更有害。

use std::fs;
use std::sync::{Arc, OnceLock};

use futures::future::join_all;

use zsync_core::session::SessionEntry;

use crate::client::PeerClient;
use crate::error::NetError;
use crate::protocol::AuthToken;

/// 令牌环境变量
pub const TOKEN_ENV: &str = "ZSYNC_TOKEN";

/// 令牌文件路径环境变量
pub const TOKEN_FILE_ENV: &str = "ZSYNC_TOKEN_FILE";

/// 本进程会话ID，进程生命周期内生成一次
///
/// 进程号 + 随机 UUID 的组合，不同时间启动的两个进程不会碰撞。
pub fn local_session_id() -> &'static str {
    static ID: OnceLock<String> = OnceLock::new();
    ID.get_or_init(|| format!("{}-{}", std::process::id(), uuid::Uuid::new_v4().simple()))
}

/// 读取带外分发的共享令牌
///
/// 优先取 `ZSYNC_TOKEN`，其次读 `ZSYNC_TOKEN_FILE` 指向的文件。
/// 都没有则返回 `None`，网络作用域必须就此拒绝运行，
/// 绝不在无鉴权状态下查询对等进程。
pub fn shared_auth_token() -> Option<AuthToken> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        let token = token.trim();
        if !token.is_empty() {
            return Some(AuthToken::new(token));
        }
    }
    if let Ok(path) = std::env::var(TOKEN_FILE_ENV) {
        match fs::read_to_string(&path) {
            Ok(content) => {
                let token = content.trim();
                if !token.is_empty() {
                    return Some(AuthToken::new(token));
                }
            }
            Err(e) => tracing::warn!("Cannot read token file {}: {}", path, e),
        }
    }
    None
}

/// 发现机制契约
///
/// 传输方式是外部协作者（共享注册文件、局域网广播等），
/// 这里只要求产出当前的会话条目列表。
pub trait Discovery: Send + Sync {
    fn snapshot(&self) -> Result<Vec<SessionEntry>, NetError>;
}

/// 会话注册表
///
/// 显式构造、按调用刷新，不持有环境全局状态，聚合器可独立测试。
pub struct SessionRegistry {
    discovery: Arc<dyn Discovery>,
}

impl SessionRegistry {
    pub fn new(discovery: Arc<dyn Discovery>) -> Self {
        Self { discovery }
    }

    /// 当前可达的对等列表
    ///
    /// 发现快照排除本会话后并发探测活性；不可达的对等被剔除
    /// 而不是报错。文档列表以探测响应为准刷新。
    pub async fn active_peers(&self, client: &PeerClient) -> Vec<SessionEntry> {
        let candidates = match self.discovery.snapshot() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Peer discovery failed: {}", e);
                return Vec::new();
            }
        };

        let own_id = local_session_id();
        let probes = candidates
            .into_iter()
            .filter(|entry| entry.session_id != own_id)
            .map(|entry| async move {
                let health = client.ping(&entry).await;
                (entry, health)
            });

        let mut peers = Vec::new();
        for (mut entry, health) in join_all(probes).await {
            match health {
                Some(info) => {
                    entry.documents = info.documents;
                    // 探测回报的会话ID优先于注册条目
                    if !info.session_id.is_empty() {
                        entry.session_id = info.session_id;
                    }
                    peers.push(entry);
                }
                None => {
                    tracing::debug!("Dropping unreachable peer {}", entry.session_id);
                }
            }
        }

        tracing::info!("Discovered {} reachable peers", peers.len());
        peers
    }
}
