//! 代理配置
//!
//! 全部来自环境变量：
//!   ZSYNC_BIND_ADDR      — 监听地址（默认 0.0.0.0:4700）
//!   ZSYNC_ADVERTISE_ADDR — 向对等公告的地址（默认同监听地址）
//!   ZSYNC_DATA_DIR       — 选择集存储根目录（默认用户数据目录）
//!   ZSYNC_REGISTRY_FILE  — 共享发现注册文件（默认存储根旁）
//!   ZSYNC_TLS_CERT       — PEM 证书路径（必填）
//!   ZSYNC_TLS_KEY        — PEM 私钥路径（必填）
//!   ZSYNC_OPEN_DOCS      — 逗号分隔的打开文档路径（演示宿主用）
//!
//! 共享令牌见 zsync-net：ZSYNC_TOKEN / ZSYNC_TOKEN_FILE。

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// 同步代理配置
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub bind_addr: SocketAddr,
    pub advertise_addr: String,
    pub data_dir: PathBuf,
    pub registry_file: PathBuf,
    pub tls_cert: PathBuf,
    pub tls_key: PathBuf,
    pub open_docs: Vec<String>,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr: SocketAddr = std::env::var("ZSYNC_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:4700".to_string())
            .parse()
            .context("ZSYNC_BIND_ADDR is not a valid socket address")?;

        let advertise_addr =
            std::env::var("ZSYNC_ADVERTISE_ADDR").unwrap_or_else(|_| bind_addr.to_string());

        let data_dir = match std::env::var("ZSYNC_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::data_dir()
                .context("no user data directory; set ZSYNC_DATA_DIR")?
                .join("zsync"),
        };

        let registry_file = std::env::var("ZSYNC_REGISTRY_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("registry.json"));

        let tls_cert = PathBuf::from(
            std::env::var("ZSYNC_TLS_CERT").context("ZSYNC_TLS_CERT must be set")?,
        );
        let tls_key =
            PathBuf::from(std::env::var("ZSYNC_TLS_KEY").context("ZSYNC_TLS_KEY must be set")?);

        let open_docs = std::env::var("ZSYNC_OPEN_DOCS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            bind_addr,
            advertise_addr,
            data_dir,
            registry_file,
            tls_cert,
            tls_key,
            open_docs,
        })
    }

    /// 选择集桶目录
    pub fn selections_dir(&self) -> PathBuf {
        self.data_dir.join("selections")
    }
}
