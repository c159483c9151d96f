//! 存储错误定义

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid bucket key: {0}")]
    InvalidBucket(String),

    #[error("Store root unavailable: {0}")]
    RootUnavailable(String),
}
