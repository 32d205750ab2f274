// crates/pf_physics/src/builder/dyn_adapter.rs

//! 泛型求解器到 [`DynPressureSolver`] 的适配
//!
//! 输入输出在 f64 与构建时精度之间转换，附带计时与残差。

use std::time::Instant;

use pf_config::{DynPressureSolver, GridInfo, Precision, SolveReport, SolverError};
use pf_runtime::RuntimeScalar;

use crate::domain::FluidDomain;
use crate::error::PressureError;
use crate::field::{Field, FieldShape};
use crate::pressure::api::PressureSolver;
use crate::pressure::laplace::{max_residual, LaplaceStencil};

impl From<PressureError> for SolverError {
    fn from(err: PressureError) -> Self {
        match err {
            PressureError::SingularMatrix { .. } | PressureError::Runtime(_) => {
                SolverError::Numerical(err.to_string())
            }
            PressureError::ShapeMismatch { .. } => SolverError::Internal(err.to_string()),
            _ => SolverError::Config(err.to_string()),
        }
    }
}

/// 绑定计算域的泛型求解器
pub struct DynSolverAdapter<S: RuntimeScalar> {
    solver: Box<dyn PressureSolver<S>>,
    domain: FluidDomain<S>,
    precision: Precision,
}

impl<S: RuntimeScalar> DynSolverAdapter<S> {
    /// 创建适配器
    pub fn new(solver: Box<dyn PressureSolver<S>>, domain: FluidDomain<S>, precision: Precision) -> Self {
        Self { solver, domain, precision }
    }

    /// 计算域
    pub fn domain(&self) -> &FluidDomain<S> {
        &self.domain
    }

    fn to_field(&self, name: &'static str, values: &[f64], batch: usize) -> Result<Field<S>, SolverError> {
        let shape = FieldShape::scalar(batch, self.domain.resolution());
        if values.len() != shape.len() {
            return Err(SolverError::ShapeMismatch {
                name,
                expected: shape.len(),
                actual: values.len(),
            });
        }
        let data = values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                S::from_config(v).ok_or_else(|| {
                    SolverError::Numerical(format!(
                        "输入 '{}' 第 {} 个值 {} 无法以 {} 表示",
                        name,
                        i,
                        v,
                        self.precision.name()
                    ))
                })
            })
            .collect::<Result<Vec<S>, _>>()?;
        Ok(Field::from_vec(shape, data)?)
    }

    fn report(
        &self,
        pressure: &Field<S>,
        divergence: &Field<S>,
        iterations: Option<usize>,
        start: Instant,
    ) -> Result<SolveReport, SolverError> {
        let stencil = LaplaceStencil::from_domain(&self.domain)?;
        let residual = max_residual(&stencil, pressure.data(), divergence.data())?;
        Ok(SolveReport {
            pressure: pressure.data().iter().map(|v| v.to_config()).collect(),
            iterations,
            max_residual: residual.to_config(),
            elapsed_ms: start.elapsed().as_secs_f64() * 1e3,
        })
    }
}

impl<S: RuntimeScalar> DynPressureSolver for DynSolverAdapter<S> {
    fn name(&self) -> &str {
        self.solver.name()
    }

    fn precision(&self) -> Precision {
        self.precision
    }

    fn grid_info(&self) -> GridInfo {
        GridInfo {
            resolution: self.domain.resolution().to_vec(),
            n_cells: self.domain.cell_count(),
            n_active: self.domain.active_count(),
            boundaries: self
                .domain
                .boundaries()
                .iter()
                .map(|[lo, hi]| [lo.name(), hi.name()])
                .collect(),
        }
    }

    fn supports_guess(&self) -> bool {
        self.solver.capabilities().supports_guess
    }

    fn solve(&self, divergence: &[f64], batch: usize, guess: Option<&[f64]>) -> Result<SolveReport, SolverError> {
        let start = Instant::now();
        let div = self.to_field("divergence", divergence, batch)?;
        let guess = guess.map(|g| self.to_field("guess", g, batch)).transpose()?;

        let (pressure, iterations) = self.solver.solve(&div, &self.domain, guess.as_ref())?;
        self.report(&pressure, &div, iterations, start)
    }

    fn solve_with_gradient(
        &self,
        divergence: &[f64],
        batch: usize,
        grad_pressure: &[f64],
    ) -> Result<(SolveReport, Vec<f64>), SolverError> {
        let start = Instant::now();
        let div = self.to_field("divergence", divergence, batch)?;
        let grad = self.to_field("grad_pressure", grad_pressure, batch)?;

        let solve = self.solver.solve_differentiable(&div, &self.domain, None)?;
        let grad_div = solve.backward(&grad)?;
        let report = self.report(solve.pressure(), &div, solve.iterations(), start)?;
        Ok((report, grad_div.data().iter().map(|v| v.to_config()).collect()))
    }
}
