// crates/pf_physics/src/pressure/sparse_direct.rs

//! 稀疏直接求解器
//!
//! 每次调用组装一次压力矩阵、做一次稀疏 LU 分解，然后逐批次回代。
//! 不使用初值，不报告迭代次数。全封闭域等纯 Neumann 连通块的矩阵奇异，
//! 分解时每块固定一个未知量，相容散度得到的压力只确定到一个常数。

use std::sync::Arc;

use pf_runtime::{Backend, DeviceKind};

use crate::domain::FluidDomain;
use crate::error::PressureResult;
use crate::field::Field;
use crate::numerics::linear_algebra::SparseLu;
use crate::pressure::api::{validate_call, PressureSolver, SolverCapabilities};
use crate::pressure::gradient::{with_custom_gradient, Adjoint, DifferentiableSolve, FnAdjoint, ForwardPass};
use crate::pressure::laplace::domain_pressure_matrix;

const CAPABILITIES: SolverCapabilities = SolverCapabilities {
    supported_devices: &[DeviceKind::Cpu],
    supports_guess: false,
    supports_loop_counter: false,
    supports_continuous_masks: true,
};

/// 稀疏直接求解器
#[derive(Debug, Clone)]
pub struct SparseDirect<B: Backend> {
    backend: B,
}

impl<B: Backend> SparseDirect<B> {
    /// 显示名称
    pub const NAME: &'static str = "Sparse direct solver";

    /// 创建求解器；后端设备必须为 CPU
    pub fn new(backend: B) -> PressureResult<Self> {
        CAPABILITIES.check_device(Self::NAME, backend.device())?;
        Ok(Self { backend })
    }

    /// 后端
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn factorize(&self, domain: &FluidDomain<B::Scalar>) -> PressureResult<SparseLu<B::Scalar>> {
        let matrix = domain_pressure_matrix(domain)?;
        let lu = SparseLu::factorize(&matrix.to_csr())?;
        log::debug!(
            "{}: N = {}, nnz(A) = {}, nnz(LU) = {}",
            Self::NAME,
            lu.size(),
            matrix.nnz(),
            lu.factor_nnz()
        );
        let pinned = lu.pinned_rows();
        if !pinned.is_empty() {
            log::debug!("{}: 奇异连通块固定 {} 个未知量 {:?}", Self::NAME, pinned.len(), pinned);
        }
        Ok(lu)
    }

    fn forward(
        &self,
        divergence: &Field<B::Scalar>,
        domain: &FluidDomain<B::Scalar>,
    ) -> PressureResult<(Field<B::Scalar>, SparseLu<B::Scalar>)> {
        validate_call(Self::NAME, &CAPABILITIES, divergence, domain, None)?;
        let lu = self.factorize(domain)?;
        let pressure = solve_rows(&self.backend, &lu, divergence)?;
        Ok((pressure, lu))
    }
}

/// 对每个批次回代
fn solve_rows<B: Backend>(
    backend: &B,
    lu: &SparseLu<B::Scalar>,
    rhs: &Field<B::Scalar>,
) -> PressureResult<Field<B::Scalar>> {
    let n = lu.size();
    let mut out = backend.alloc(rhs.data().len());
    for (b, x) in out.chunks_mut(n).enumerate() {
        lu.solve(rhs.row(b), x);
    }
    Field::from_vec(rhs.shape().clone(), out)
}

impl<B: Backend> PressureSolver<B::Scalar> for SparseDirect<B> {
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
        _guess: Option<&Field<B::Scalar>>,
    ) -> PressureResult<(Field<B::Scalar>, Option<usize>)> {
        let (pressure, _) = self.forward(divergence, domain)?;
        Ok((pressure, None))
    }

    fn solve_differentiable(
        &self,
        divergence: &Field<B::Scalar>,
        domain: &FluidDomain<B::Scalar>,
        _guess: Option<&Field<B::Scalar>>,
    ) -> PressureResult<DifferentiableSolve<B::Scalar>> {
        with_custom_gradient(
            || {
                let (pressure, lu) = self.forward(divergence, domain)?;
                Ok(ForwardPass { pressure, iterations: None, saved: Arc::new(lu) })
            },
            |_, lu| -> Box<dyn Adjoint<B::Scalar>> {
                // 压力矩阵对称，反向复用同一分解
                let backend = self.backend.clone();
                Box::new(FnAdjoint(move |grad: &Field<B::Scalar>| solve_rows(&backend, &lu, grad)))
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldShape;
    use pf_config::BoundaryMode;
    use pf_runtime::CpuBackend;

    fn solver() -> SparseDirect<CpuBackend<f64>> {
        SparseDirect::new(CpuBackend::new()).unwrap()
    }

    #[test]
    fn test_solves_each_batch_row() {
        let domain = FluidDomain::uniform(vec![3, 3], BoundaryMode::Open).unwrap();
        let div = Field::from_fn(2, &[3, 3], |b, idx| (b as f64 + 1.0) * (idx[0] as f64 - idx[1] as f64));
        let (p, iterations) = solver().solve(&div, &domain, None).unwrap();
        assert_eq!(iterations, None);
        assert_eq!(p.shape(), div.shape());

        let a = domain_pressure_matrix(&domain).unwrap();
        let r = crate::pressure::laplace::max_residual(&a, p.data(), div.data()).unwrap();
        assert!(r < 1e-10);
    }

    #[test]
    fn test_closed_domain_gives_particular_solution() {
        let domain = FluidDomain::uniform(vec![4, 4], BoundaryMode::Closed).unwrap();
        let mut div = Field::from_fn(1, &[4, 4], |_, idx| (idx[0] * 4 + idx[1]) as f64 * 0.1);
        let mean = div.data().iter().sum::<f64>() / 16.0;
        div.data_mut().iter_mut().for_each(|v| *v -= mean);

        let (p, _) = solver().solve(&div, &domain, None).unwrap();
        assert!(p.data().iter().all(|v| v.is_finite()));
        let a = domain_pressure_matrix(&domain).unwrap();
        let r = crate::pressure::laplace::max_residual(&a, p.data(), div.data()).unwrap();
        assert!(r < 1e-10, "residual {}", r);
    }

    #[test]
    fn test_closed_domain_gradient_ignores_pinned_cell() {
        let domain = FluidDomain::uniform(vec![3, 3], BoundaryMode::Closed).unwrap();
        let div = Field::zeros(FieldShape::scalar(1, &[3, 3]));
        let solve = solver().solve_differentiable(&div, &domain, None).unwrap();
        let grad = Field::from_fn(1, &[3, 3], |_, idx| if idx == [1, 1] { 1.0 } else { 0.0 });
        let g = solve.backward(&grad).unwrap();
        assert!(g.data().iter().all(|v| v.is_finite()));
        // 固定的未知量对右端项不敏感
        let lu = SparseLu::factorize(&domain_pressure_matrix(&domain).unwrap().to_csr()).unwrap();
        for row in lu.pinned_rows() {
            assert_eq!(g.data()[row], 0.0);
        }
    }

    #[test]
    fn test_capabilities() {
        let s = solver();
        assert_eq!(s.name(), "Sparse direct solver");
        assert!(!s.capabilities().supports_guess);
        assert!(!s.capabilities().supports_loop_counter);
        assert!(s.capabilities().supports_continuous_masks);
        assert!(!s.capabilities().supports_device(DeviceKind::Gpu));
    }
}
