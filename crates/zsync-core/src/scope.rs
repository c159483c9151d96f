//! 作用域
//!
//! 一次命令考虑的文档/进程范围。作用域是平面枚举，
//! 每次命令调用选定一个并保持不变，没有状态迁移。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 选择操作的作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// 当前视图的拾取集，从不持久化
    View,

    /// 活动文档的持久化桶
    Document,

    /// 本进程所有文档桶
    Session,

    /// 所有可达对等进程
    Network,
}

impl Scope {
    pub const ALL: [Scope; 4] = [Scope::View, Scope::Document, Scope::Session, Scope::Network];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::View => "view",
            Scope::Document => "document",
            Scope::Session => "session",
            Scope::Network => "network",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "view" => Ok(Scope::View),
            "document" | "doc" => Ok(Scope::Document),
            "session" | "application" | "app" => Ok(Scope::Session),
            "network" | "net" => Ok(Scope::Network),
            other => Err(format!("unknown scope: {other}")),
        }
    }
}
