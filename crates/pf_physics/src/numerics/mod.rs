// crates/pf_physics/src/numerics/mod.rs

//! 数值计算基础

pub mod linear_algebra;
