// apps/pf_cli/src/commands/mod.rs

//! 子命令

pub mod info;
pub mod solve;
pub mod validate;

use anyhow::{Context, Result};
use pf_config::PressureSolverConfig;
use std::path::Path;

/// 加载配置文件；未指定时使用默认配置
pub fn load_config(path: Option<&Path>) -> Result<PressureSolverConfig> {
    match path {
        Some(path) => PressureSolverConfig::from_file(path)
            .with_context(|| format!("无法加载配置文件 {}", path.display())),
        None => Ok(PressureSolverConfig::default()),
    }
}
