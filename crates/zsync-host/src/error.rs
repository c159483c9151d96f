//! 宿主操作错误定义

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Document not open: {0}")]
    DocumentNotOpen(String),

    #[error("Activation of {0} timed out")]
    ActivationTimeout(String),
}
