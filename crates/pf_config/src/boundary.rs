// crates/pf_config/src/boundary.rs

//! 边界模式
//!
//! 每个轴的每一侧各有一个边界模式，决定幽灵单元的掩码取值：
//!
//! | 模式 | active | accessible |
//! |------|--------|------------|
//! | Open | 0 | 1 |
//! | Closed | 0 | 0 |
//! | Periodic | 周期复制 | 周期复制 |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// 单侧边界模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryMode {
    /// 开放边界（压力 Dirichlet 条件）
    #[default]
    Open,
    /// 固壁
    Closed,
    /// 周期边界
    Periodic,
}

impl BoundaryMode {
    /// 模式名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Periodic => "periodic",
        }
    }

    /// 是否周期
    #[inline]
    pub fn is_periodic(&self) -> bool {
        matches!(self, Self::Periodic)
    }
}

impl fmt::Display for BoundaryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BoundaryMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" | "solid" | "slippery" | "sticky" => Ok(Self::Closed),
            "periodic" => Ok(Self::Periodic),
            _ => Err(ConfigError::UnsupportedBoundary(s.to_string())),
        }
    }
}
