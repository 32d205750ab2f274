// crates/pf_physics/src/numerics/linear_algebra/mod.rs

//! 稀疏线性代数模块
//!
//! 压力求解所需的稀疏矩阵、直接分解与批量迭代求解器。
//!
//! - [`csr`]: 组装格式与行映射构建器
//! - [`csc`]: 交付格式
//! - [`operator`]: 矩阵与无矩阵模板共用的线性算子 trait
//! - [`lu`]: 稀疏 LU 直接分解
//! - [`ordering`]: 逆 Cuthill-McKee 重排
//! - [`solver`]: 批量共轭梯度与轨迹反向传播
//! - [`vector_ops`]: 泛型 BLAS-1 小工具

pub mod csc;
pub mod csr;
pub mod lu;
pub mod operator;
pub mod ordering;
pub mod solver;
pub mod vector_ops;

pub use csc::CscMatrix;
pub use csr::{CsrBuilder, CsrMatrix, RowView};
pub use lu::{FactorizationError, LuOptions, LuOrdering, SparseLu};
pub use operator::LinearOperator;
pub use ordering::{bandwidth, reverse_cuthill_mckee, Permutation};
pub use solver::{BatchedConjugateGradient, CgOutcome, CgStatus, CgStep, CgTrajectory};
