// crates/pf_physics/src/builder/solver_builder.rs

//! 压力求解器构建器
//!
//! 无泛型配置 → 泛型求解器。精度在此分发一次，之后全部走泛型路径。

use pf_config::{DynPressureSolver, Precision, PressureSolverConfig, SolverSettings};
use pf_runtime::{Backend, CpuBackend};

use super::dyn_adapter::DynSolverAdapter;
use crate::domain::FluidDomain;
use crate::error::PressureResult;
use crate::pressure::{PressureSolver, SparseCg, SparseDirect};

/// 压力求解器构建器
///
/// ```ignore
/// let config = PressureSolverConfig::from_file("pressure.json")?;
/// let solver = PressureSolverBuilder::new(config).build()?;
/// let report = solver.solve(&divergence, 1, None)?;
/// ```
#[derive(Debug, Clone)]
pub struct PressureSolverBuilder {
    config: PressureSolverConfig,
}

impl PressureSolverBuilder {
    /// 创建构建器
    pub fn new(config: PressureSolverConfig) -> Self {
        Self { config }
    }

    /// 配置
    pub fn config(&self) -> &PressureSolverConfig {
        &self.config
    }

    /// 按求解器设置在给定后端上创建泛型求解器
    pub fn solver_for<B: Backend>(
        settings: &SolverSettings,
        backend: B,
    ) -> PressureResult<Box<dyn PressureSolver<B::Scalar>>> {
        let solver: Box<dyn PressureSolver<B::Scalar>> = match settings {
            SolverSettings::Direct => Box::new(SparseDirect::new(backend)?),
            SolverSettings::ConjugateGradient(cg) => Box::new(SparseCg::new(backend, cg.clone())?),
        };
        Ok(solver)
    }

    /// 构建无泛型求解器（含计算域）
    pub fn build(self) -> PressureResult<Box<dyn DynPressureSolver>> {
        self.config.validate()?;
        log::info!(
            "构建压力求解器: {} / {} / 分辨率 {:?}",
            self.config.solver.kind_name(),
            self.config.precision,
            self.config.domain.resolution
        );
        match self.config.precision {
            Precision::F32 => self.build_with(CpuBackend::<f32>::new()),
            Precision::F64 => self.build_with(CpuBackend::<f64>::new()),
        }
    }

    fn build_with<B: Backend>(self, backend: B) -> PressureResult<Box<dyn DynPressureSolver>> {
        let domain = FluidDomain::<B::Scalar>::from_config(&self.config.domain)?;
        let solver = Self::solver_for(&self.config.solver, backend)?;
        Ok(Box::new(DynSolverAdapter::new(solver, domain, self.config.precision)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_config::{BoundaryMode, CgConfig, DomainConfig};

    fn config(precision: Precision, solver: SolverSettings) -> PressureSolverConfig {
        PressureSolverConfig {
            precision,
            solver,
            domain: DomainConfig::new(vec![4, 4], BoundaryMode::Open),
        }
    }

    #[test]
    fn test_build_dispatches_precision() {
        let solver = PressureSolverBuilder::new(config(Precision::F32, SolverSettings::Direct))
            .build()
            .unwrap();
        assert_eq!(solver.precision(), Precision::F32);
        assert_eq!(solver.name(), "Sparse direct solver");
        assert_eq!(solver.grid_info().n_cells, 16);

        let solver = PressureSolverBuilder::new(config(
            Precision::F64,
            SolverSettings::ConjugateGradient(CgConfig::new(1e-8)),
        ))
        .build()
        .unwrap();
        assert_eq!(solver.precision(), Precision::F64);
        assert!(solver.supports_guess());
    }

    #[test]
    fn test_dyn_solve_report() {
        let solver = PressureSolverBuilder::new(config(
            Precision::F64,
            SolverSettings::ConjugateGradient(CgConfig::new(1e-8)),
        ))
        .build()
        .unwrap();
        let div: Vec<f64> = (0..32).map(|i| (i as f64 * 0.37).sin()).collect();
        let report = solver.solve(&div, 2, None).unwrap();
        assert_eq!(report.pressure.len(), 32);
        assert!(report.max_residual < 1e-7);
        assert!(report.iterations.is_some());

        assert!(matches!(
            solver.solve(&div[..31], 2, None),
            Err(pf_config::SolverError::ShapeMismatch { expected: 32, actual: 31, .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut cfg = config(Precision::F32, SolverSettings::ConjugateGradient(CgConfig::new(1e-9)));
        assert!(PressureSolverBuilder::new(cfg.clone()).build().is_err());
        cfg.domain.resolution = vec![4, 0];
        cfg.precision = Precision::F64;
        assert!(PressureSolverBuilder::new(cfg).build().is_err());
    }
}
