//! ZSYNC 核心标识模型
//!
//! 定义跨作用域选择同步的基础数据类型：
//! - `EntityIdentity`: 实体的持久标识（文档路径 + 句柄）
//! - `SelectionSet`: 有序去重的标识集合
//! - `Scope`: 四级作用域（视图 / 文档 / 会话 / 网络）
//! - `SessionEntry`: 可达对等进程的会话条目
//!
//! # 设计约定
//!
//! 标识的相等性只看 `(document_path, handle)`，路径按小写、
//! 正斜杠归一化比较；`session_id` 仅参与显示，不参与去重，
//! 这样本地与网络上报的同一实体会自然合并。
//!
//! # 示例
//!
//! ```rust
//! use zsync_core::prelude::*;
//!
//! let a = EntityIdentity::new(r"C:\Drawings\Plant.dwg", "2F4A");
//! let b = EntityIdentity::new("c:/drawings/plant.dwg", "2f4a").with_session("peer-1");
//!
//! // 同一实体，session_id 不影响相等性
//! assert_eq!(a, b);
//! ```

pub mod identity;
pub mod scope;
pub mod selection;
pub mod session;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::identity::{normalize_path, EntityIdentity, IdentityKey};
    pub use crate::scope::Scope;
    pub use crate::selection::SelectionSet;
    pub use crate::session::SessionEntry;
}
