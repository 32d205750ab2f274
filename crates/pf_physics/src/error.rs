// crates/pf_physics/src/error.rs

//! 压力求解错误类型
//!
//! 分三类：构建期配置错误（[`PressureError::Config`]、
//! [`PressureError::UnsupportedDevice`]），调用期形状/契约错误，
//! 以及直接分解的奇异矩阵。CG 未收敛不是错误。

use pf_config::ConfigError;
use pf_runtime::{DeviceKind, RuntimeError};

use crate::numerics::linear_algebra::FactorizationError;

/// 压力求解错误
#[derive(Debug, thiserror::Error)]
pub enum PressureError {
    /// 数组形状不符
    #[error("'{name}' 形状不符: 期望 {expected:?}, 实际 {actual:?}")]
    ShapeMismatch {
        /// 数组名称
        name: &'static str,
        /// 期望形状
        expected: Vec<usize>,
        /// 实际形状
        actual: Vec<usize>,
    },

    /// 网格维度无效（空或含零）
    #[error("网格维度无效: {dimensions:?} ({reason})")]
    InvalidDimensions {
        /// 维度
        dimensions: Vec<usize>,
        /// 原因
        reason: &'static str,
    },

    /// 障碍物越界或为空
    #[error("障碍物 {lower:?}..{upper:?} 必须非空且位于计算域 {dimensions:?} 内")]
    InvalidObstacle {
        /// 下角
        lower: Vec<usize>,
        /// 上角
        upper: Vec<usize>,
        /// 计算域维度
        dimensions: Vec<usize>,
    },

    /// 掩码取值非法
    #[error("掩码 '{name}' 第 {index} 个值 {value} 非法: {reason}")]
    MaskValue {
        /// 掩码名称
        name: &'static str,
        /// 扁平索引
        index: usize,
        /// 取值
        value: f64,
        /// 原因
        reason: &'static str,
    },

    /// 直接分解遇到零主元
    #[error("压力矩阵奇异（第 {row} 行主元为零）")]
    SingularMatrix {
        /// 行号
        row: usize,
    },

    /// 后端设备不受求解器支持
    #[error("求解器 '{solver}' 不支持设备 {device}")]
    UnsupportedDevice {
        /// 求解器名称
        solver: &'static str,
        /// 设备
        device: DeviceKind,
    },

    /// 求解器不接受连续掩码
    #[error("求解器 '{solver}' 只接受 0/1 掩码")]
    ContinuousMasksUnsupported {
        /// 求解器名称
        solver: &'static str,
    },

    /// 配置错误
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 运行时错误
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl From<FactorizationError> for PressureError {
    fn from(err: FactorizationError) -> Self {
        match err {
            FactorizationError::ZeroPivot { row, .. } => Self::SingularMatrix { row },
            FactorizationError::NotSquare { rows, cols } => Self::ShapeMismatch {
                name: "operator",
                expected: vec![rows, rows],
                actual: vec![rows, cols],
            },
        }
    }
}

/// 压力求解结果类型
pub type PressureResult<T> = Result<T, PressureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factorization_error_maps_to_singular() {
        let err: PressureError = FactorizationError::ZeroPivot { row: 3, pivot: 0.0 }.into();
        assert!(matches!(err, PressureError::SingularMatrix { row: 3 }));
    }

    #[test]
    fn test_display_mentions_name() {
        let err = PressureError::ShapeMismatch {
            name: "divergence",
            expected: vec![1, 4, 4, 1],
            actual: vec![1, 4, 3, 1],
        };
        assert!(err.to_string().contains("divergence"));

        let err = PressureError::UnsupportedDevice { solver: "Sparse direct solver", device: DeviceKind::Gpu };
        assert!(err.to_string().contains("GPU"));
    }
}
