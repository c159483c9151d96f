//! 聚合器错误定义
//!
//! 只有配置错误与存储写入错误会到达命令层；
//! 实体级与文档级失败都折算进 `ScopeOutcome` 的计数。

use thiserror::Error;

use zsync_host::error::HostError;
use zsync_net::error::NetError;
use zsync_store::error::StoreError;

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("No active document")]
    NoActiveDocument,

    #[error("Network scope refused: no shared auth token distributed to this process")]
    MissingAuthToken,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Network error: {0}")]
    Net(#[from] NetError),
}
