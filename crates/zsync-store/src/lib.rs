//! ZSYNC 选择集持久化
//!
//! 把命名的选择集按桶写入本地磁盘：
//! - 每个文档一个桶，另有一个进程级全局桶
//! - 行式文本格式，可人工 diff，损坏的行单独跳过
//! - 保存是原子覆盖（临时文件 + 重命名）
//!
//! 读取永不报错：桶文件缺失或不可读一律视为空集，
//! 消费命令只会看到"请先选择"，不会因此崩溃。
//! 写入失败则必须上报调用方，静默丢失保存比报错更糟。

pub mod bucket;
pub mod error;
pub mod format;
pub mod store;

pub use bucket::BucketKey;
pub use error::StoreError;
pub use store::SelectionStore;
