// apps/pf_cli/src/commands/validate.rs

//! 配置验证命令
//!
//! 解析并验证压力求解器配置文件，另外报告不会导致构建失败、
//! 但多半不是用户本意的组合（警告）。

use anyhow::{bail, Context, Result};
use clap::Args;
use pf_config::{BoundaryMode, PressureSolverConfig, SolverSettings};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// 直接求解建议的最大单元数
const DIRECT_CELL_LIMIT: usize = 250_000;

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 配置文件路径（可多个）
    #[arg(short, long, num_args = 1..)]
    pub config: Vec<PathBuf>,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

/// 验证结果
#[derive(Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn is_ok_strict(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("=== PressureFlow 配置验证 ===");

    if args.config.is_empty() {
        println!("用法: pf_cli validate --config <配置文件> [<配置文件> ...] [--strict]");
        return Ok(());
    }

    let mut result = ValidationResult::default();
    for path in &args.config {
        validate_config(path, &mut result)?;
    }

    print_validation_result(&result, args.strict)
}

fn validate_config(path: &Path, result: &mut ValidationResult) -> Result<()> {
    println!("\n检查配置文件: {}", path.display());

    if !path.exists() {
        result.add_error(format!("配置文件不存在: {}", path.display()));
        return Ok(());
    }

    let content = std::fs::read_to_string(path).context("无法读取配置文件")?;
    let config = match PressureSolverConfig::from_json_str(&content) {
        Ok(config) => config,
        Err(e) => {
            result.add_error(format!("{}: {}", path.display(), e));
            return Ok(());
        }
    };

    check_combinations(&config, result);
    println!("  ✓ 配置有效");
    Ok(())
}

/// 合法但可疑的组合
fn check_combinations(config: &PressureSolverConfig, result: &mut ValidationResult) {
    let modes = match config.domain.boundary_modes() {
        Ok(modes) => modes,
        Err(e) => {
            result.add_error(e.to_string());
            return;
        }
    };
    let has_open = modes.iter().flatten().any(|&m| m == BoundaryMode::Open);
    if !has_open {
        result.add_warning("计算域没有开放边界（纯 Neumann），散度须为零均值，压力只确定到一个常数");
    }

    match &config.solver {
        SolverSettings::Direct => {
            let cells = config.domain.cell_count();
            if cells > DIRECT_CELL_LIMIT {
                result.add_warning(format!(
                    "直接求解 {} 个单元，LU 填充可能占用大量内存（建议 ≤ {}）",
                    cells, DIRECT_CELL_LIMIT
                ));
            }
        }
        SolverSettings::ConjugateGradient(cg) => {
            if cg.max_iterations.is_none() {
                result.add_warning("max_iterations = null，不收敛时 CG 不会停止");
            }
            let floor = config.precision.accuracy_floor();
            if cg.accuracy < floor || cg.resolved_gradient_accuracy() < floor {
                result.add_warning(format!(
                    "容差低于 {} 精度下限 {:e}，迭代可能跑满上限",
                    config.precision, floor
                ));
            }
        }
    }
}

fn print_validation_result(result: &ValidationResult, strict: bool) -> Result<()> {
    println!("\n=== 验证结果 ===");

    if !result.errors.is_empty() {
        println!("\n错误 ({}):", result.errors.len());
        for err in &result.errors {
            error!("  ✗ {}", err);
            println!("  ✗ {}", err);
        }
    }

    if !result.warnings.is_empty() {
        println!("\n警告 ({}):", result.warnings.len());
        for warning in &result.warnings {
            warn!("  ⚠ {}", warning);
            println!("  ⚠ {}", warning);
        }
    }

    let success = if strict { result.is_ok_strict() } else { result.is_ok() };
    if success {
        println!("\n✓ 验证通过");
        Ok(())
    } else {
        println!("\n✗ 验证失败");
        bail!(
            "验证失败：发现 {} 个错误，{} 个警告",
            result.errors.len(),
            result.warnings.len()
        )
    }
}
