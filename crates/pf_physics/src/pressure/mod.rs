// crates/pf_physics/src/pressure/mod.rs

//! 压力投影求解
//!
//! - [`laplace`]: 带掩码的拉普拉斯算子（稀疏矩阵与无矩阵模板）
//! - [`api`]: 求解器接口与能力描述
//! - [`gradient`]: 自定义梯度
//! - [`sparse_direct`]: 稀疏 LU 直接求解
//! - [`sparse_cg`]: 共轭梯度求解

pub mod api;
pub mod gradient;
pub mod laplace;
pub mod sparse_cg;
pub mod sparse_direct;

pub use api::{validate_call, PressureSolver, SolverCapabilities};
pub use gradient::{with_custom_gradient, Adjoint, DifferentiableSolve, FnAdjoint, ForwardPass};
pub use laplace::{domain_pressure_matrix, max_residual, sparse_pressure_matrix, LaplaceStencil};
pub use sparse_cg::SparseCg;
pub use sparse_direct::SparseDirect;
