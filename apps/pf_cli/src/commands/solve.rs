// apps/pf_cli/src/commands/solve.rs

//! 求解命令
//!
//! 按配置构建求解器，对生成的散度场求解压力，可选执行一次反向传播。
//! 本模块属于 Layer 5，只接触 `Box<dyn DynPressureSolver>`。

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use pf_config::Precision;
use pf_physics::PressureSolverBuilder;
use std::path::PathBuf;
use tracing::{info, warn};

use super::load_config;

/// 散度场样式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Pattern {
    /// 各轴正弦叠加，每个批次相位不同
    Wave,
    /// 首单元源、末单元汇（总和为零）
    Dipole,
    /// 全零
    Zero,
}

impl Pattern {
    /// 生成 `(batch, *resolution)` 行优先散度
    fn generate(self, resolution: &[usize], batch: usize) -> Vec<f64> {
        let cells: usize = resolution.iter().product();
        let mut data = vec![0.0; batch * cells];
        if cells == 0 {
            return data;
        }
        for (b, row) in data.chunks_mut(cells).enumerate() {
            match self {
                Pattern::Wave => {
                    for (flat, v) in row.iter_mut().enumerate() {
                        let mut rest = flat;
                        let mut phase = 0.37 * b as f64;
                        for (axis, &n) in resolution.iter().enumerate().rev() {
                            let i = rest % n;
                            rest /= n;
                            phase += (i as f64 + 0.5) * (axis + 1) as f64 / n as f64;
                        }
                        *v = (std::f64::consts::TAU * phase).sin();
                    }
                }
                Pattern::Dipole => {
                    row[0] += 1.0;
                    row[cells - 1] -= 1.0;
                }
                Pattern::Zero => {}
            }
        }
        data
    }
}

/// 求解参数
#[derive(Args)]
pub struct SolveArgs {
    /// 配置文件路径（缺省时使用默认配置）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 批次数
    #[arg(short, long, default_value = "1")]
    pub batch: usize,

    /// 散度场样式
    #[arg(short, long, value_enum, default_value = "wave")]
    pub pattern: Pattern,

    /// 使用 f32 精度（覆盖配置）
    #[arg(long)]
    pub f32: bool,

    /// 对全 1 压力梯度执行一次反向传播
    #[arg(long)]
    pub gradient: bool,

    /// 将结果写入 JSON 文件
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// 执行求解命令
pub fn execute(args: SolveArgs) -> Result<()> {
    info!("=== PressureFlow 压力求解 ===");

    let mut config = load_config(args.config.as_deref())?;
    if args.f32 {
        config.precision = Precision::F32;
    }
    if args.batch == 0 {
        warn!("批次数为 0，不执行求解");
        return Ok(());
    }

    let divergence = args.pattern.generate(&config.domain.resolution, args.batch);

    let solver = PressureSolverBuilder::new(config)
        .build()
        .context("构建求解器失败")?;
    let grid = solver.grid_info();
    info!("求解器: {}, 精度: {}", solver.name(), solver.precision());
    info!(
        "网格: {:?}, {} 单元, {} 个流体单元, 边界 {:?}",
        grid.resolution, grid.n_cells, grid.n_active, grid.boundaries
    );

    let (report, gradient) = if args.gradient {
        let grad_pressure = vec![1.0; divergence.len()];
        let (report, gradient) = solver
            .solve_with_gradient(&divergence, args.batch, &grad_pressure)
            .context("求解失败")?;
        (report, Some(gradient))
    } else {
        let report = solver.solve(&divergence, args.batch, None).context("求解失败")?;
        (report, None)
    };

    let p_max = report.pressure.iter().cloned().fold(f64::MIN, f64::max);
    let p_min = report.pressure.iter().cloned().fold(f64::MAX, f64::min);

    info!("=== 求解完成 ===");
    match report.iterations {
        Some(n) => info!("迭代次数: {}", n),
        None => info!("迭代次数: 不适用（直接求解）"),
    }
    info!("最大残差: {:.3e}", report.max_residual);
    info!("压力范围: [{:.6}, {:.6}]", p_min, p_max);
    info!("耗时: {:.3} ms", report.elapsed_ms);
    if let Some(gradient) = &gradient {
        let g_max = gradient.iter().map(|g| g.abs()).fold(0.0_f64, f64::max);
        info!("散度梯度: max|g| = {:.6e}", g_max);
    }

    if let Some(path) = &args.output {
        let value = serde_json::json!({
            "solver": solver.name(),
            "precision": solver.precision().name(),
            "resolution": grid.resolution,
            "batch": args.batch,
            "iterations": report.iterations,
            "max_residual": report.max_residual,
            "elapsed_ms": report.elapsed_ms,
            "pressure": report.pressure,
            "gradient": gradient,
        });
        let content = serde_json::to_string_pretty(&value)?;
        std::fs::write(path, content)
            .with_context(|| format!("无法写入 {}", path.display()))?;
        info!("结果已写入 {}", path.display());
    }

    Ok(())
}
