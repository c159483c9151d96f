//! 线上协议类型
//!
//! 响应信封与共享令牌。信封的 `output` 字段是字符串，内容本身
//! 是 JSON 编码的标识数组；对端信封畸形时按"该对等返回零个
//! 实体"处理，解码错误不会越过客户端边界传播。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::NetError;

/// 令牌请求头
pub const TOKEN_HEADER: &str = "x-zsync-token";

/// 选择查询端点
pub const QUERY_PATH: &str = "/selection/query";

/// 活性探测端点（无鉴权）
pub const HEALTH_PATH: &str = "/health";

/// 响应信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// 成功且携带 JSON 编码的负载
    pub fn with_output<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            success: true,
            output: Some(serde_json::to_string(value)?),
            error: None,
        })
    }

    /// 失败信封
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(message.into()),
        }
    }

    /// 解码负载；失败信封或缺失负载返回错误
    pub fn decode_output<T: DeserializeOwned>(&self) -> Result<T, NetError> {
        if !self.success {
            return Err(NetError::PeerFailure {
                session: "unknown".to_string(),
                reason: self.error.clone().unwrap_or_else(|| "unspecified".to_string()),
            });
        }
        let output = self.output.as_deref().unwrap_or("[]");
        Ok(serde_json::from_str(output)?)
    }
}

/// 活性探测负载，同时用于刷新发现条目的文档列表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthInfo {
    pub session_id: String,
    pub documents: Vec<String>,
}

/// 共享令牌
///
/// 带外分发给所有协作进程的不透明密钥。比较走 SHA-256 摘要，
/// 令牌缺失与错误在响应形状和耗时上不可区分，避免探测。
#[derive(Clone)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// 发送方取出令牌放入请求头
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// 校验对方出示的令牌
    pub fn matches(&self, presented: &str) -> bool {
        let expected = Sha256::digest(self.0.as_bytes());
        let actual = Sha256::digest(presented.as_bytes());
        expected == actual
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 日志里绝不泄漏令牌内容
        f.write_str("AuthToken(***)")
    }
}
