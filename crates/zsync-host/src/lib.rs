//! ZSYNC 宿主接口
//!
//! 宿主 CAD 程序是外部协作者，这里只定义同步层依赖的最小契约：
//! - `DocumentHost`: 打开文档枚举、句柄到对象的解析、文档锁、
//!   当前拾取集与文档激活请求
//! - `EntityResolver`: 把持久标识解析回活动对象引用，容忍过期
//! - `ActivationBus`: 文档激活完成的一次性信号
//! - `MemoryHost`: 内存实现，供测试与演示代理使用
//!
//! 宿主对文档数据库的修改是单线程的：解析必须在当前事务范围内
//! 完成，返回的活动引用不得跨事务持有，调用方每个事务重新解析。

pub mod activation;
pub mod document;
pub mod error;
pub mod memory;
pub mod resolver;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::activation::ActivationBus;
    pub use crate::document::{DocumentHost, DocumentInfo, DocumentLock, LiveEntity};
    pub use crate::error::HostError;
    pub use crate::memory::MemoryHost;
    pub use crate::resolver::{EntityResolver, Resolution};
}
