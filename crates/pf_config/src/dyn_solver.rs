// crates/pf_config/src/dyn_solver.rs

//! DynPressureSolver - 运行时多态压力求解器接口
//!
//! 不含泛型的求解器接口。输入输出统一为 f64 切片，实现方在内部转换到
//! 构建时选定的精度。应用层只依赖本 trait。

use crate::precision::Precision;

/// 计算域信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridInfo {
    /// 各轴单元数
    pub resolution: Vec<usize>,
    /// 单元总数
    pub n_cells: usize,
    /// 含流体的单元数
    pub n_active: usize,
    /// 各轴 `[lower, upper]` 边界模式名称
    pub boundaries: Vec<[&'static str; 2]>,
}

/// 单次求解报告
#[derive(Debug, Clone, Default)]
pub struct SolveReport {
    /// 压力场，布局 `(batch, *resolution)` 行优先
    pub pressure: Vec<f64>,
    /// 迭代次数（直接求解为 `None`）
    pub iterations: Option<usize>,
    /// 残差 `max |A·p - b|`
    pub max_residual: f64,
    /// 求解耗时 [ms]
    pub elapsed_ms: f64,
}

/// 求解器错误
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    /// 输入长度错误
    #[error("输入 '{name}' 长度错误: 期望 {expected}, 实际 {actual}")]
    ShapeMismatch {
        /// 输入名称
        name: &'static str,
        /// 期望长度
        expected: usize,
        /// 实际长度
        actual: usize,
    },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 数值错误（奇异矩阵等）
    #[error("数值错误: {0}")]
    Numerical(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 运行时压力求解器接口（无泛型）
///
/// ```ignore
/// fn project(solver: &dyn DynPressureSolver, div: &[f64]) -> Result<Vec<f64>, SolverError> {
///     Ok(solver.solve(div, 1, None)?.pressure)
/// }
/// ```
pub trait DynPressureSolver: Send + Sync {
    /// 求解器名称
    fn name(&self) -> &str;

    /// 计算精度
    fn precision(&self) -> Precision;

    /// 计算域信息
    fn grid_info(&self) -> GridInfo;

    /// 是否接受初始猜测
    fn supports_guess(&self) -> bool;

    /// 求解 `A p = div`
    ///
    /// `divergence` 长度必须为 `batch * n_cells`；`guess` 同长度或 `None`。
    fn solve(
        &self,
        divergence: &[f64],
        batch: usize,
        guess: Option<&[f64]>,
    ) -> Result<SolveReport, SolverError>;

    /// 求解并对给定的压力梯度执行一次反向传播
    ///
    /// 返回求解报告与关于散度的梯度。
    fn solve_with_gradient(
        &self,
        divergence: &[f64],
        batch: usize,
        grad_pressure: &[f64],
    ) -> Result<(SolveReport, Vec<f64>), SolverError>;
}
