// apps/pf_cli/src/main.rs

//! PressureFlow 命令行界面
//!
//! # 架构层级
//!
//! 本模块属于 **Layer 5: Application**：
//! - 零泛型语法：仅使用 `PressureSolverConfig` 和 `Box<dyn DynPressureSolver>`
//! - 通过 `Precision` 枚举选择精度

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// PressureFlow 压力投影求解器命令行工具
#[derive(Parser)]
#[command(name = "pf_cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "PressureFlow pressure projection solver", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 求解压力泊松方程
    Solve(commands::solve::SolveArgs),
    /// 显示信息
    Info(commands::info::InfoArgs),
    /// 验证配置
    Validate(commands::validate::ValidateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // 库层走 log 门面，try_init 会一并安装 LogTracer
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Commands::Solve(args) => commands::solve::execute(args),
        Commands::Info(args) => commands::info::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
    }
}
