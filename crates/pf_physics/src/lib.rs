// crates/pf_physics/src/lib.rs

//! PressureFlow Physics Layer (Layer 3)
//!
//! 结构化 N 维网格上的压力投影求解。
//!
//! # 模块概览
//!
//! - [`field`]: `(batch, *spatial, channels)` 稠密场
//! - [`domain`]: 掩码、周期标记与流体计算域
//! - [`numerics`]: 稀疏矩阵、LU 分解与批量共轭梯度
//! - [`pressure`]: 拉普拉斯算子、求解器接口、直接/CG 求解器与自定义梯度
//! - [`builder`]: 配置到求解器的桥梁
//! - [`error`]: 错误类型
//!
//! # 使用
//!
//! ```ignore
//! use pf_physics::prelude::*;
//!
//! let domain = FluidDomain::<f64>::uniform(vec![64, 64], BoundaryMode::Open)?;
//! let solver = SparseCg::new(CpuBackend::<f64>::new(), CgConfig::new(1e-6))?;
//! let (pressure, iterations) = solver.solve(&divergence, &domain, None)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod domain;
pub mod error;
pub mod field;
pub mod numerics;
pub mod pressure;

/// 层级标识
pub const LAYER: u8 = 3;

pub use builder::{DynSolverAdapter, PressureSolverBuilder};
pub use domain::{FluidDomain, GhostFill, Mask, MaskMode, Periodicity, Side};
pub use error::{PressureError, PressureResult};
pub use field::{Field, FieldShape};
pub use pressure::{
    domain_pressure_matrix, max_residual, sparse_pressure_matrix, with_custom_gradient, Adjoint,
    DifferentiableSolve, FnAdjoint, ForwardPass, LaplaceStencil, PressureSolver,
    SolverCapabilities, SparseCg, SparseDirect,
};

/// Prelude 模块
pub mod prelude {
    //! 常用类型预导入
    pub use crate::{
        Field, FieldShape, FluidDomain, Mask, MaskMode, PressureError, PressureSolver,
        PressureSolverBuilder, SparseCg, SparseDirect,
    };
    pub use pf_config::{BoundaryMode, CgConfig, OperatorKind, Precision};
    pub use pf_runtime::{Backend, CpuBackend, DeviceKind, RuntimeScalar};
}
