//! ZSYNC 同步代理入口
//!
//! 每个协作进程跑一个代理：启动 HTTPS 监听向对等提供本进程的
//! 选择快照，在共享注册文件里登记自己的会话，退出时注销。
//! 演示宿主用 ZSYNC_OPEN_DOCS 列出的文档构造。

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use zsync_app::{AgentConfig, StoreSelectionProvider};
use zsync_core::session::SessionEntry;
use zsync_host::document::DocumentHost;
use zsync_host::memory::MemoryHost;
use zsync_net::registry::{local_session_id, shared_auth_token};
use zsync_net::server::{build_router, serve, tls_config, ServerState};
use zsync_net::FileDiscovery;
use zsync_store::store::SelectionStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,zsync_net=debug".into()),
        )
        .init();

    let config = AgentConfig::from_env()?;

    // 无令牌就不监听：查询端点绝不在无鉴权状态下提供数据
    let Some(token) = shared_auth_token() else {
        bail!("no shared auth token; set ZSYNC_TOKEN or ZSYNC_TOKEN_FILE");
    };

    let store = SelectionStore::open(config.selections_dir())
        .context("cannot open selection store")?;
    info!("Selection store at {}", store.root().display());

    let host = Arc::new(MemoryHost::new());
    for doc in &config.open_docs {
        host.open_document(doc);
    }
    let documents: Vec<String> = host
        .open_documents()
        .iter()
        .map(|d| d.file_name())
        .collect();

    let session_id = local_session_id().to_string();
    let state = ServerState {
        provider: Arc::new(StoreSelectionProvider::new(store, host)),
        token,
        session_id: session_id.clone(),
    };
    let router = build_router(state);

    let tls = tls_config(&config.tls_cert, &config.tls_key)
        .await
        .context("cannot load TLS certificate/key")?;

    // 在共享注册文件里登记本会话
    let discovery = FileDiscovery::new(&config.registry_file);
    discovery
        .announce(
            SessionEntry::new(session_id.clone(), config.advertise_addr.clone())
                .with_documents(documents),
        )
        .context("cannot announce session")?;
    info!(
        "Session {} announced in {}",
        session_id,
        config.registry_file.display()
    );

    let server = tokio::spawn(serve(config.bind_addr, tls, router));

    tokio::signal::ctrl_c().await.context("signal handler")?;
    info!("Shutting down, withdrawing session {}", session_id);
    if let Err(e) = discovery.withdraw(&session_id) {
        tracing::warn!("Cannot withdraw session: {}", e);
    }
    server.abort();
    Ok(())
}
