// crates/pf_config/src/lib.rs

//! PressureFlow Config Layer (Layer 4)
//!
//! 配置层，提供精度选择、压力求解器配置和运行时多态接口。
//! 本层完全无泛型，使用 `Precision` 枚举进行运行时精度分发。
//!
//! # 模块概览
//!
//! - [`precision`]: Precision 枚举（F32/F64）
//! - [`boundary`]: BoundaryMode 单侧边界模式
//! - [`pressure_config`]: PressureSolverConfig 及 CG 参数（全 f64）
//! - [`dyn_solver`]: DynPressureSolver 运行时多态接口
//! - [`error`]: 配置错误类型

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod boundary;
pub mod dyn_solver;
pub mod error;
pub mod precision;
pub mod pressure_config;

/// 层级标识
pub const LAYER: u8 = 4;

pub use boundary::BoundaryMode;
pub use dyn_solver::{DynPressureSolver, GridInfo, SolveReport, SolverError};
pub use error::ConfigError;
pub use precision::Precision;
pub use pressure_config::{
    AxisBoundary, BoundarySpec, CgConfig, ConfigLiteral, DomainConfig, GradientAccuracy,
    GradientIterations, ObstacleConfig, OperatorKind, PressureSolverConfig, SolverSettings,
};
