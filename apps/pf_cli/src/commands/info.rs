// apps/pf_cli/src/commands/info.rs

//! 信息显示命令
//!
//! 显示系统信息、默认配置，或给定配置构建出的求解器与网格。

use anyhow::{Context, Result};
use clap::Args;
use pf_config::{PressureSolverConfig, SolverSettings};
use pf_physics::PressureSolverBuilder;
use std::path::PathBuf;
use tracing::info;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 显示系统信息
    #[arg(long)]
    pub system: bool,

    /// 显示默认配置
    #[arg(long)]
    pub defaults: bool,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== PressureFlow 信息 ===");

    if args.system {
        print_system_info();
    }

    if args.defaults {
        print_default_config()?;
    }

    if let Some(path) = &args.config {
        let config = PressureSolverConfig::from_file(path)
            .with_context(|| format!("无法加载配置文件 {}", path.display()))?;
        print_solver_info(config)?;
    }

    if args.config.is_none() && !args.system && !args.defaults {
        print_system_info();
        println!();
        print_default_config()?;
    }

    Ok(())
}

fn print_system_info() {
    println!("=== 系统信息 ===");
    println!("PressureFlow CLI 版本: {}", env!("CARGO_PKG_VERSION"));
    println!("物理层级: Layer {}", pf_physics::LAYER);
    println!("目标平台: {}", std::env::consts::ARCH);
    println!("操作系统: {}", std::env::consts::OS);

    println!("\n可用精度:");
    println!("  - f32 (单精度): ✓");
    println!("  - f64 (双精度): ✓");

    println!("\n可用求解器:");
    println!("  - direct: 稀疏 LU 直接求解 (仅 CPU)");
    println!("  - conjugate_gradient: 批量共轭梯度 (sparse / matrix_free 算子)");
}

fn print_default_config() -> Result<()> {
    println!("=== 默认配置 ===");
    let config = PressureSolverConfig::default();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn print_solver_info(config: PressureSolverConfig) -> Result<()> {
    println!("=== 求解器 ===");
    println!("种类: {}", config.solver.kind_name());
    println!("精度: {} (容差下限 {:e})", config.precision, config.precision.accuracy_floor());
    if let SolverSettings::ConjugateGradient(cg) = &config.solver {
        println!("容差: {:e}", cg.accuracy);
        println!("反向容差: {:e}", cg.resolved_gradient_accuracy());
        match cg.max_iterations {
            Some(n) => println!("迭代上限: {}", n),
            None => println!("迭代上限: 无"),
        }
        println!("反向迭代: {:?}", cg.max_gradient_iterations);
        println!("展开求导: {}", cg.autodiff);
        println!("算子: {:?}", cg.operator);
    }

    let solver = PressureSolverBuilder::new(config)
        .build()
        .context("构建求解器失败")?;
    let grid = solver.grid_info();
    println!("\n=== 网格 ===");
    println!("分辨率: {:?}", grid.resolution);
    println!("单元数: {}", grid.n_cells);
    println!("流体单元: {}", grid.n_active);
    for (axis, [lo, hi]) in grid.boundaries.iter().enumerate() {
        println!("轴 {}: 下侧 {}, 上侧 {}", axis, lo, hi);
    }
    println!("接受初值: {}", solver.supports_guess());
    Ok(())
}
