// crates/pf_physics/src/builder/mod.rs

//! 求解器构建模块
//!
//! ```text
//! PressureSolverConfig ──> PressureSolverBuilder
//!                               │ (精度分发)
//!                  ┌────────────┴────────────┐
//!                  │ Precision::F32          │──> SparseCg<CpuBackend<f32>> / SparseDirect<..>
//!                  │ Precision::F64          │──> SparseCg<CpuBackend<f64>> / SparseDirect<..>
//!                  └────────────┬────────────┘
//!                               ▼
//!                    Box<dyn DynPressureSolver>
//! ```

pub mod dyn_adapter;
pub mod solver_builder;

pub use dyn_adapter::DynSolverAdapter;
pub use solver_builder::PressureSolverBuilder;
