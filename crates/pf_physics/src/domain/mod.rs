// crates/pf_physics/src/domain/mod.rs

//! 计算域
//!
//! - [`mask`]: N 维掩码与幽灵层扩展
//! - [`periodicity`]: 逐轴逐侧周期标记
//! - [`fluid_domain`]: 分辨率、边界模式与流体/可达掩码

pub mod fluid_domain;
pub mod mask;
pub mod periodicity;

pub use fluid_domain::FluidDomain;
pub use mask::{GhostFill, Mask, MaskMode};
pub use periodicity::{Periodicity, Side};
