//! 网络同步错误定义

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Peer {session} returned no data: {reason}")]
    PeerFailure { session: String, reason: String },
}
