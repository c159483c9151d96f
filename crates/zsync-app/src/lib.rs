//! ZSYNC 作用域聚合器
//!
//! 消费命令的唯一调用面是 [`ScopeAggregator::resolve_scope`]，
//! 生产命令的唯一调用面是 [`ScopeAggregator::persist_scope`]。
//! 聚合器把"命令想在作用域 S 上取/存实体"翻译成对存储、
//! 宿主与网络层的具体调用，并把实体级/文档级失败折算成
//! 计数汇总，绝不向命令层抛出。

pub mod aggregator;
pub mod config;
pub mod error;
pub mod provider;

pub use aggregator::{
    PeerStatus, ResolveOptions, ResolvedEntity, ScopeAggregator, ScopeOutcome,
};
pub use config::AgentConfig;
pub use error::AggregateError;
pub use provider::StoreSelectionProvider;
