// crates/pf_runtime/src/lib.rs

//! PressureFlow Runtime Layer (Layer 2)
//!
//! 运行时抽象层，提供标量类型与计算后端。
//!
//! # 模块概览
//!
//! - [`scalar`]: RuntimeScalar trait（密封，仅 f32/f64 可实现）
//! - [`backend`]: Backend trait 和 CpuBackend 实现
//! - [`error`]: 运行时错误类型
//!
//! # 层级架构
//!
//! ```text
//! Layer 5: pf_cli      ─> 命令行
//! Layer 4: pf_config   ─> Precision, PressureSolverConfig, DynPressureSolver
//! Layer 3: pf_physics  ─> SparseDirect<B>, SparseCg<B>
//! Layer 2: pf_runtime  ─> Backend, RuntimeScalar (本层)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod scalar;

/// 层级标识
pub const LAYER: u8 = 2;

pub use backend::{Backend, CpuBackend, DeviceKind};
pub use error::{RuntimeError, RuntimeResult};
pub use scalar::RuntimeScalar;

/// Prelude 模块
pub mod prelude {
    //! 常用类型预导入
    pub use crate::{Backend, CpuBackend, DeviceKind, RuntimeError, RuntimeScalar};
}
