// crates/pf_physics/src/pressure/sparse_cg.rs

//! 共轭梯度压力求解器
//!
//! 整批同步的无预条件 CG，算子为稀疏矩阵或无矩阵模板。
//!
//! 反向两种方式：
//! - `autodiff = false`：以梯度为右端项重新求解同一系统，容差与迭代上限
//!   取梯度设置；`mirror` 上限取本次正向的迭代次数
//! - `autodiff = true`：正向记录轨迹，反向逐步展开

use std::sync::Arc;

use pf_config::{CgConfig, OperatorKind};
use pf_runtime::{Backend, DeviceKind, RuntimeError, RuntimeScalar};

use crate::domain::FluidDomain;
use crate::error::PressureResult;
use crate::field::Field;
use crate::numerics::linear_algebra::{BatchedConjugateGradient, CgOutcome, LinearOperator};
use crate::pressure::api::{validate_call, PressureSolver, SolverCapabilities};
use crate::pressure::gradient::{with_custom_gradient, Adjoint, DifferentiableSolve, FnAdjoint, ForwardPass};
use crate::pressure::laplace::{domain_pressure_matrix, LaplaceStencil};

const CAPABILITIES: SolverCapabilities = SolverCapabilities {
    supported_devices: &[DeviceKind::Cpu, DeviceKind::Gpu],
    supports_guess: true,
    supports_loop_counter: true,
    supports_continuous_masks: true,
};

type SharedOperator<S> = Arc<dyn LinearOperator<S>>;

/// 共轭梯度压力求解器
#[derive(Debug, Clone)]
pub struct SparseCg<B: Backend> {
    backend: B,
    config: CgConfig,
    accuracy: B::Scalar,
    gradient_accuracy: B::Scalar,
}

impl<B: Backend> SparseCg<B> {
    /// 显示名称
    pub const NAME: &'static str = "Sparse Conjugate Gradient";

    /// 创建求解器
    ///
    /// 配置在此处完整校验：容差必须为正的有限值，
    /// `autodiff` 不能与固定或 `mirror` 梯度迭代上限同时使用。
    pub fn new(backend: B, config: CgConfig) -> PressureResult<Self> {
        config.validate()?;
        CAPABILITIES.check_device(Self::NAME, backend.device())?;

        let convert = |field: &str, value: f64| {
            <B::Scalar as RuntimeScalar>::from_config(value)
                .filter(|v| *v > <B::Scalar as RuntimeScalar>::ZERO)
                .ok_or_else(|| RuntimeError::conversion(field, value))
        };
        let accuracy = convert("accuracy", config.accuracy)?;
        let gradient_accuracy = convert("gradient_accuracy", config.resolved_gradient_accuracy())?;

        Ok(Self { backend, config, accuracy, gradient_accuracy })
    }

    /// 配置
    pub fn config(&self) -> &CgConfig {
        &self.config
    }

    /// 后端
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn operator(&self, domain: &FluidDomain<B::Scalar>) -> PressureResult<SharedOperator<B::Scalar>> {
        let op: SharedOperator<B::Scalar> = match self.config.operator {
            OperatorKind::Sparse => Arc::new(domain_pressure_matrix(domain)?),
            OperatorKind::MatrixFree => Arc::new(LaplaceStencil::from_domain(domain)?),
        };
        Ok(op)
    }

    fn forward(
        &self,
        divergence: &Field<B::Scalar>,
        domain: &FluidDomain<B::Scalar>,
        guess: Option<&Field<B::Scalar>>,
        record: bool,
    ) -> PressureResult<(SharedOperator<B::Scalar>, CgOutcome<B::Scalar>)> {
        validate_call(Self::NAME, &CAPABILITIES, divergence, domain, guess)?;
        let op = self.operator(domain)?;
        let cg = BatchedConjugateGradient::new(self.backend.clone(), self.accuracy, self.config.max_iterations);
        let guess = guess.map(Field::data);
        let outcome = if record {
            cg.solve_recorded(op.as_ref(), divergence.data(), guess)?
        } else {
            cg.solve(op.as_ref(), divergence.data(), guess)?
        };
        log::debug!(
            "{}: batch = {}, {} 次迭代, max|r| = {:.3e}",
            Self::NAME,
            divergence.shape().batch,
            outcome.iterations,
            outcome.max_residual.to_config()
        );
        Ok((op, outcome))
    }

    /// 重新求解形式的伴随
    fn resolve_adjoint(&self, op: SharedOperator<B::Scalar>, forward_iterations: usize) -> Box<dyn Adjoint<B::Scalar>> {
        let cap = self.config.gradient_iteration_cap(forward_iterations);
        let cg = BatchedConjugateGradient::new(self.backend.clone(), self.gradient_accuracy, cap);
        Box::new(FnAdjoint(move |grad: &Field<B::Scalar>| {
            let outcome = cg.solve(op.as_ref(), grad.data(), None)?;
            log::debug!("{} 反向: {} 次迭代", Self::NAME, outcome.iterations);
            Field::from_vec(grad.shape().clone(), outcome.solution)
        }))
    }
}

impl<B: Backend> PressureSolver<B::Scalar> for SparseCg<B> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn capabilities(&self) -> &SolverCapabilities {
        &CAPABILITIES
    }

    fn solve(
        &self,
        divergence: &Field<B::Scalar>,
        domain: &FluidDomain<B::Scalar>,
        guess: Option<&Field<B::Scalar>>,
    ) -> PressureResult<(Field<B::Scalar>, Option<usize>)> {
        let (_, outcome) = self.forward(divergence, domain, guess, false)?;
        let pressure = Field::from_vec(divergence.shape().clone(), outcome.solution)?;
        Ok((pressure, Some(outcome.iterations)))
    }

    fn solve_differentiable(
        &self,
        divergence: &Field<B::Scalar>,
        domain: &FluidDomain<B::Scalar>,
        guess: Option<&Field<B::Scalar>>,
    ) -> PressureResult<DifferentiableSolve<B::Scalar>> {
        let record = self.config.autodiff;
        with_custom_gradient(
            || {
                let (op, outcome) = self.forward(divergence, domain, guess, record)?;
                let pressure = Field::from_vec(divergence.shape().clone(), outcome.solution)?;
                Ok(ForwardPass {
                    pressure,
                    iterations: Some(outcome.iterations),
                    saved: (op, outcome.trajectory),
                })
            },
            |iterations, (op, trajectory)| -> Box<dyn Adjoint<B::Scalar>> {
                match trajectory {
                    Some(trajectory) => Box::new(FnAdjoint(move |grad: &Field<B::Scalar>| {
                        let grad_b = trajectory.backpropagate(op.as_ref(), grad.data())?;
                        Field::from_vec(grad.shape().clone(), grad_b)
                    })),
                    None => self.resolve_adjoint(op, iterations.unwrap_or(0)),
                }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PressureError;
    use crate::field::FieldShape;
    use crate::pressure::laplace::max_residual;
    use pf_config::{BoundaryMode, GradientIterations};
    use pf_runtime::CpuBackend;

    fn cg(config: CgConfig) -> SparseCg<CpuBackend<f64>> {
        SparseCg::new(CpuBackend::new(), config).unwrap()
    }

    fn smooth_divergence(batch: usize, res: &[usize]) -> Field<f64> {
        Field::from_fn(batch, res, |b, idx| {
            ((idx[0] as f64 + 0.5) * 0.9 + b as f64).sin() * (idx[1] as f64 * 0.4).cos()
        })
    }

    #[test]
    fn test_converges_below_accuracy() {
        let domain = FluidDomain::uniform(vec![8, 8], BoundaryMode::Open).unwrap();
        let div = smooth_divergence(2, &[8, 8]);
        let solver = cg(CgConfig::new(1e-6));
        let (p, iterations) = solver.solve(&div, &domain, None).unwrap();
        assert!(iterations.unwrap() > 0);

        let a = domain_pressure_matrix(&domain).unwrap();
        assert!(max_residual(&a, p.data(), div.data()).unwrap() < 1e-6);
    }

    #[test]
    fn test_matrix_free_agrees_with_sparse() {
        let domain = FluidDomain::uniform(vec![5, 4], BoundaryMode::Open)
            .unwrap()
            .with_obstacle(&[2, 1], &[3, 3])
            .unwrap();
        let div = smooth_divergence(1, &[5, 4]);
        let config = CgConfig::new(1e-10);
        let (ps, _) = cg(config.clone()).solve(&div, &domain, None).unwrap();
        let (pm, _) = cg(config.with_operator(OperatorKind::MatrixFree))
            .solve(&div, &domain, None)
            .unwrap();
        assert!(ps.max_abs_diff(&pm) < 1e-8);
    }

    #[test]
    fn test_exact_guess_needs_no_iterations() {
        let domain = FluidDomain::uniform(vec![4, 4], BoundaryMode::Open).unwrap();
        let div = Field::zeros(FieldShape::scalar(1, &[4, 4]));
        let guess = Field::zeros(FieldShape::scalar(1, &[4, 4]));
        let (_, iterations) = cg(CgConfig::default()).solve(&div, &domain, Some(&guess)).unwrap();
        assert_eq!(iterations, Some(0));
    }

    #[test]
    fn test_iteration_cap_is_not_an_error() {
        let domain = FluidDomain::uniform(vec![8, 8], BoundaryMode::Open).unwrap();
        let div = smooth_divergence(1, &[8, 8]);
        let solver = cg(CgConfig::new(1e-12).with_max_iterations(Some(2)));
        let (_, iterations) = solver.solve(&div, &domain, None).unwrap();
        assert_eq!(iterations, Some(2));
    }

    #[test]
    fn test_construction_errors() {
        let backend = CpuBackend::<f64>::new();
        assert!(matches!(
            SparseCg::new(backend, CgConfig::new(0.0)),
            Err(PressureError::Config(_))
        ));
        let conflicting = CgConfig::default()
            .with_autodiff(true)
            .with_max_gradient_iterations(GradientIterations::Mirror);
        assert!(SparseCg::new(backend, conflicting).is_err());

        // f32 下溢为 0 的容差
        assert!(matches!(
            SparseCg::new(CpuBackend::<f32>::new(), CgConfig::new(1e-60)),
            Err(PressureError::Runtime(_))
        ));
    }

    #[test]
    fn test_autodiff_gradient_matches_finite_difference() {
        let domain = FluidDomain::uniform(vec![3, 3], BoundaryMode::Open)
            .unwrap()
            .with_obstacle(&[0, 2], &[1, 3])
            .unwrap();
        let div = smooth_divergence(1, &[3, 3]);
        let grad = Field::from_fn(1, &[3, 3], |_, idx| (idx[0] * 3 + idx[1]) as f64 * 0.1 - 0.4);
        // 截断的 CG 是散度的非线性函数
        let solver = cg(CgConfig::new(1e-14).with_max_iterations(Some(3)).with_autodiff(true));

        let analytic = solver.solve_differentiable(&div, &domain, None).unwrap();
        assert_eq!(analytic.iterations(), Some(3));
        let analytic = analytic.backward(&grad).unwrap();

        let loss = |d: &Field<f64>| -> f64 {
            let (p, _) = solver.solve(d, &domain, None).unwrap();
            p.data().iter().zip(grad.data()).map(|(a, b)| a * b).sum()
        };
        let h = 1e-6;
        for j in 0..9 {
            let mut plus = div.clone();
            let mut minus = div.clone();
            plus.data_mut()[j] += h;
            minus.data_mut()[j] -= h;
            let fd = (loss(&plus) - loss(&minus)) / (2.0 * h);
            assert!(
                (fd - analytic.data()[j]).abs() < 1e-5,
                "分量 {}: 有限差分 {} vs 反向 {}",
                j,
                fd,
                analytic.data()[j]
            );
        }
    }
}
