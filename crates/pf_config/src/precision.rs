// crates/pf_config/src/precision.rs

//! 运行时精度选择
//!
//! 配置层不含泛型参数，`Precision` 决定构建 f32 还是 f64 求解器实例。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// 运行时精度枚举
///
/// ```rust
/// use pf_config::Precision;
///
/// let p: Precision = "f32".parse().unwrap();
/// assert_eq!(p.size_bytes(), 4);
/// assert!(p.accuracy_floor() > Precision::F64.accuracy_floor());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// 单精度 (f32)，批量较大时内存减半
    F32,
    /// 双精度 (f64)，默认
    #[default]
    F64,
}

impl Precision {
    /// 精度名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    /// 每个标量占用的字节数
    pub fn size_bytes(&self) -> usize {
        match self {
            Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// 是否为单精度
    #[inline]
    pub fn is_f32(&self) -> bool {
        matches!(self, Self::F32)
    }

    /// 机器精度
    pub fn epsilon(&self) -> f64 {
        match self {
            Self::F32 => f32::EPSILON as f64,
            Self::F64 => f64::EPSILON,
        }
    }

    /// CG 容差的实际下限
    ///
    /// 低于此值时残差受舍入误差主导，迭代通常会跑满上限。
    pub fn accuracy_floor(&self) -> f64 {
        self.epsilon() * 64.0
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Precision {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "f32" | "single" | "float32" => Ok(Self::F32),
            "f64" | "double" | "float64" => Ok(Self::F64),
            _ => Err(ConfigError::invalid("precision", s, "期望 'f32' 或 'f64'")),
        }
    }
}
