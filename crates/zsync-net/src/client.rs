//! 对等查询客户端
//!
//! 向单个对等进程查询其当前选择。每个请求都有独立超时；
//! 对端不可达、超时、响应畸形都折算成"该对等返回零个实体"，
//! 由调用方记录并跳过，绝不中止整体网络作用域操作。

use std::time::Duration;

use zsync_core::identity::EntityIdentity;
use zsync_core::session::SessionEntry;

use crate::error::NetError;
use crate::protocol::{AuthToken, HealthInfo, ResponseEnvelope, HEALTH_PATH, QUERY_PATH, TOKEN_HEADER};

/// 对等客户端
pub struct PeerClient {
    http: reqwest::Client,
    token: AuthToken,
    scheme: String,
}

impl PeerClient {
    /// 构建客户端，`timeout` 作用于每次对等请求
    ///
    /// 信任边界收窄（有意为之，见部署文档）：对等进程部署在
    /// 受信局域网内，监听证书是自签名的，这里放宽证书校验。
    /// 鉴权依赖共享令牌而不是证书链。
    pub fn new(token: AuthToken, timeout: Duration) -> Result<Self, NetError> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            token,
            scheme: "https".to_string(),
        })
    }

    /// 覆盖 URL 方案，仅供回环测试使用明文 HTTP
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// 查询对等进程自己的当前选择
    ///
    /// 返回的标识统一盖上对端的会话ID，便于聚合后区分
    /// 同名文档属于哪个进程。
    pub async fn query_selection(
        &self,
        peer: &SessionEntry,
    ) -> Result<Vec<EntityIdentity>, NetError> {
        let url = format!("{}://{}{}", self.scheme, peer.address, QUERY_PATH);
        let response = self
            .http
            .post(&url)
            .header(TOKEN_HEADER, self.token.expose())
            .json(&serde_json::json!({}))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NetError::PeerFailure {
                session: peer.session_id.clone(),
                reason: format!("status {}", response.status()),
            });
        }

        let envelope: ResponseEnvelope = response.json().await?;
        if !envelope.success {
            return Err(NetError::PeerFailure {
                session: peer.session_id.clone(),
                reason: envelope.error.unwrap_or_else(|| "unspecified".to_string()),
            });
        }

        let mut items: Vec<EntityIdentity> = envelope.decode_output()?;
        for item in &mut items {
            if item.session_id.is_none() {
                item.session_id = Some(peer.session_id.clone());
            }
        }
        Ok(items)
    }

    /// 活性探测；不可达返回 `None`（对等消失是稳态，不是错误）
    pub async fn ping(&self, peer: &SessionEntry) -> Option<HealthInfo> {
        let url = format!("{}://{}{}", self.scheme, peer.address, HEALTH_PATH);
        let envelope: ResponseEnvelope = match self.http.get(&url).send().await {
            Ok(response) => match response.json().await {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::debug!("Peer {} health response malformed: {}", peer.session_id, e);
                    return None;
                }
            },
            Err(e) => {
                tracing::debug!("Peer {} unreachable: {}", peer.session_id, e);
                return None;
            }
        };

        match envelope.decode_output::<HealthInfo>() {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::debug!("Peer {} health payload malformed: {}", peer.session_id, e);
                None
            }
        }
    }
}
