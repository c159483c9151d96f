//! ZSYNC 网络同步协议
//!
//! 两个进程之间交换选择快照的最小认证协议：
//! - HTTPS 请求/响应，单一查询端点，请求头携带共享令牌
//! - 响应信封 `{ success, output, error }`，`output` 内嵌标识数组
//! - 会话注册表：发现 + 活性探测，得到当前可达对等列表
//!
//! 网络作用域是尽力而为的扇出查询，不是强一致存储：
//! 单个对等不可达只意味着它贡献零个实体，绝不中止整体操作。

pub mod client;
pub mod discovery;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;

pub use client::PeerClient;
pub use discovery::FileDiscovery;
pub use error::NetError;
pub use protocol::{AuthToken, HealthInfo, ResponseEnvelope};
pub use registry::{local_session_id, shared_auth_token, Discovery, SessionRegistry};
pub use server::{build_router, SelectionProvider, ServerState};
