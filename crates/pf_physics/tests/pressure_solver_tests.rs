// crates/pf_physics/tests/pressure_solver_tests.rs

//! 压力求解器集成测试
//!
//! 覆盖：
//! - 两种求解器的形状保持与残差
//! - 算子对称性、对角线上界与周期折回
//! - 直接求解与 CG 的一致性（含全封闭域，差一个常数）
//! - 逐侧周期
//! - 初值、设备与能力门控
//! - 反向传播（重新求解 / 按调用绑定的镜像上限）

use pf_config::{BoundaryMode, CgConfig, GradientIterations, OperatorKind};
use pf_physics::numerics::linear_algebra::LinearOperator;
use pf_physics::prelude::*;
use pf_physics::{domain_pressure_matrix, max_residual, FieldShape, LaplaceStencil};

use BoundaryMode::{Closed, Open, Periodic};

// =============================================================================
// 辅助
// =============================================================================

fn direct() -> SparseDirect<CpuBackend<f64>> {
    SparseDirect::new(CpuBackend::new()).unwrap()
}

fn cg(config: CgConfig) -> SparseCg<CpuBackend<f64>> {
    SparseCg::new(CpuBackend::new(), config).unwrap()
}

fn wavy(batch: usize, res: &[usize]) -> Field<f64> {
    Field::from_fn(batch, res, |b, idx| {
        let phase: f64 = idx.iter().enumerate().map(|(k, &i)| (k + 1) as f64 * i as f64).sum();
        (0.7 * phase + b as f64).sin()
    })
}

/// 报告为 GPU 的 CPU 后端，用于设备门控
#[derive(Debug, Clone, Copy, Default)]
struct AcceleratorBackend(CpuBackend<f64>);

impl Backend for AcceleratorBackend {
    type Scalar = f64;

    fn name(&self) -> &'static str {
        "Accelerator(emulated)"
    }

    fn device(&self) -> DeviceKind {
        DeviceKind::Gpu
    }

    fn axpy(&self, alpha: f64, x: &[f64], y: &mut [f64]) {
        self.0.axpy(alpha, x, y)
    }

    fn dot(&self, x: &[f64], y: &[f64]) -> f64 {
        self.0.dot(x, y)
    }

    fn copy(&self, src: &[f64], dst: &mut [f64]) {
        self.0.copy(src, dst)
    }

    fn scale(&self, alpha: f64, x: &mut [f64]) {
        self.0.scale(alpha, x)
    }

    fn reduce_max(&self, x: &[f64]) -> f64 {
        self.0.reduce_max(x)
    }

    fn reduce_min(&self, x: &[f64]) -> f64 {
        self.0.reduce_min(x)
    }

    fn reduce_sum(&self, x: &[f64]) -> f64 {
        self.0.reduce_sum(x)
    }

    fn norm_inf(&self, x: &[f64]) -> f64 {
        self.0.norm_inf(x)
    }

    fn batched_dot(&self, x: &[f64], y: &[f64], row_len: usize, out: &mut [f64]) {
        self.0.batched_dot(x, y, row_len, out)
    }

    fn batched_axpy(&self, alphas: &[f64], x: &[f64], y: &mut [f64], row_len: usize) {
        self.0.batched_axpy(alphas, x, y, row_len)
    }

    fn batched_xpay(&self, x: &[f64], betas: &[f64], y: &mut [f64], row_len: usize) {
        self.0.batched_xpay(x, betas, y, row_len)
    }
}

// =============================================================================
// 形状与残差
// =============================================================================

/// 两种求解器输出与散度同形
#[test]
fn test_output_shape_matches_divergence() {
    let domain = FluidDomain::uniform(vec![5, 4], Open).unwrap();
    let div = wavy(3, &[5, 4]);

    let (p, iterations) = direct().solve(&div, &domain, None).unwrap();
    assert_eq!(p.shape(), div.shape());
    assert_eq!(iterations, None);

    let (p, iterations) = cg(CgConfig::new(1e-6)).solve(&div, &domain, None).unwrap();
    assert_eq!(p.shape(), div.shape());
    assert!(iterations.is_some());
}

/// 未触及上限时 CG 残差低于容差
#[test]
fn test_cg_residual_below_accuracy() {
    let domain = FluidDomain::uniform(vec![8, 8], Open).unwrap();
    let div = wavy(2, &[8, 8]);
    let solver = cg(CgConfig::new(1e-7).with_max_iterations(Some(500)));
    let (p, iterations) = solver.solve(&div, &domain, None).unwrap();
    assert!(iterations.unwrap() < 500);

    let a = domain_pressure_matrix(&domain).unwrap();
    assert!(max_residual(&a, p.data(), div.data()).unwrap() <= 1e-7);
}

// =============================================================================
// 算子性质
// =============================================================================

/// 带障碍物和混合周期的算子对称且对角线 ≤ -1
#[test]
fn test_operator_symmetric_with_obstacle() {
    let domain = FluidDomain::<f64>::new(vec![5, 6], vec![[Open, Closed], [Periodic, Periodic]])
        .unwrap()
        .with_obstacle(&[1, 2], &[3, 4])
        .unwrap();
    let a = domain_pressure_matrix(&domain).unwrap();
    assert!(a.to_csr().is_symmetric(1e-12));
    assert!(a.diagonal().iter().all(|&d| d <= -1.0));
}

/// 1×6 周期轴：每行恰有两个折回邻居，常数散度得到常数压力
#[test]
fn test_periodic_wrap_neighbors() {
    let res = vec![1, 6];
    let domain = FluidDomain::<f64>::new(res.clone(), vec![[Open, Open], [Periodic, Periodic]]).unwrap();
    let a = domain_pressure_matrix(&domain).unwrap();
    for row in 0..6 {
        assert_eq!(a.off_diagonal_count(row), 2, "row {}", row);
    }
    assert!(a.to_csr().is_symmetric(0.0));

    let zero = Field::zeros(FieldShape::scalar(1, &res));
    let (p, _) = direct().solve(&zero, &domain, None).unwrap();
    assert!(p.data().iter().all(|&v| v == p.data()[0]));

    // -4p + 2p = 1
    let ones = Field::from_fn(1, &res, |_, _| 1.0);
    let (p, _) = direct().solve(&ones, &domain, None).unwrap();
    assert!(p.data().iter().all(|&v| (v + 0.5).abs() < 1e-12));

    let (p, _) = cg(CgConfig::new(1e-10)).solve(&ones, &domain, None).unwrap();
    assert!(p.data().iter().all(|&v| (v + 0.5).abs() < 1e-9));
}

// =============================================================================
// 求解器一致性
// =============================================================================

/// 直接求解与 CG 在 1e-4 内一致
#[test]
fn test_direct_matches_cg() {
    let domain = FluidDomain::uniform(vec![4, 4], Open).unwrap();
    let div = wavy(2, &[4, 4]);
    let (exact, _) = direct().solve(&div, &domain, None).unwrap();
    for operator in [OperatorKind::Sparse, OperatorKind::MatrixFree] {
        let solver = cg(CgConfig::new(1e-8).with_max_iterations(Some(5000)).with_operator(operator));
        let (approx, _) = solver.solve(&div, &domain, None).unwrap();
        assert!(exact.max_abs_diff(&approx) < 1e-4, "{:?}", operator);
    }
}

/// CG 结果对初值不敏感
#[test]
fn test_cg_guess_insensitive() {
    let domain = FluidDomain::uniform(vec![6, 6], Open).unwrap().with_obstacle(&[2, 2], &[3, 4]).unwrap();
    let div = wavy(1, &[6, 6]);
    let solver = cg(CgConfig::new(1e-10));

    let (cold, cold_iterations) = solver.solve(&div, &domain, None).unwrap();
    let zero = Field::zeros(div.shape().clone());
    let (p, iterations) = solver.solve(&div, &domain, Some(&zero)).unwrap();
    assert_eq!(iterations, cold_iterations);
    assert!(cold.max_abs_diff(&p) < 1e-12);

    let guess = Field::from_fn(1, &[6, 6], |_, idx| 3.0 - idx[1] as f64);
    let (warm, _) = solver.solve(&div, &domain, Some(&guess)).unwrap();
    assert!(cold.max_abs_diff(&warm) < 1e-7);
}

/// 直接求解静默忽略初值（即使形状不符）
#[test]
fn test_direct_ignores_guess() {
    let domain = FluidDomain::uniform(vec![4, 3], Open).unwrap();
    let div = wavy(1, &[4, 3]);
    let (plain, _) = direct().solve(&div, &domain, None).unwrap();

    let guess = Field::from_fn(1, &[4, 3], |_, _| 42.0);
    let (with_guess, _) = direct().solve(&div, &domain, Some(&guess)).unwrap();
    assert_eq!(plain.data(), with_guess.data());

    let misshapen = Field::zeros(FieldShape::scalar(2, &[7]));
    assert!(direct().solve(&div, &domain, Some(&misshapen)).is_ok());
}

/// 每个批次减去均值
fn demean(field: &mut Field<f64>) {
    let cells = field.shape().cells();
    for row in field.data_mut().chunks_mut(cells) {
        let mean = row.iter().sum::<f64>() / cells as f64;
        row.iter_mut().for_each(|v| *v -= mean);
    }
}

/// 全封闭域：零均值散度下直接求解给出特解，与 CG 只差一个常数
#[test]
fn test_closed_domain_direct_matches_cg_up_to_constant() {
    let res = [8, 8];
    let domain = FluidDomain::uniform(res.to_vec(), Closed).unwrap();
    let mut div = wavy(2, &res);
    demean(&mut div);

    let (mut exact, _) = direct().solve(&div, &domain, None).unwrap();
    let a = domain_pressure_matrix(&domain).unwrap();
    assert!(max_residual(&a, exact.data(), div.data()).unwrap() < 1e-9);

    let solver = cg(CgConfig::new(1e-10).with_max_iterations(Some(5000)));
    let (mut approx, _) = solver.solve(&div, &domain, None).unwrap();
    demean(&mut exact);
    demean(&mut approx);
    assert!(exact.max_abs_diff(&approx) < 1e-6);
}

/// 一侧周期：轴下侧折回、上侧开放，只有首行写入折回耦合
#[test]
fn test_periodicity_is_per_side() {
    let domain = FluidDomain::<f64>::new(vec![4], vec![[Periodic, Open]]).unwrap();
    let a = domain_pressure_matrix(&domain).unwrap();
    assert_eq!(a.get(0, 3), 1.0);
    assert_eq!(a.get(3, 0), 0.0);
    assert_eq!(a.off_diagonal_count(0), 2);
    assert_eq!(a.off_diagonal_count(3), 1);
    assert!(!a.to_csr().is_symmetric(0.0));

    let stencil = LaplaceStencil::from_domain(&domain).unwrap();
    let x = [1.0, 2.0, 3.0, 4.0];
    let (mut ym, mut ys) = ([0.0; 4], [0.0; 4]);
    a.mul_vec(&x, &mut ym);
    stencil.apply(&x, &mut ys);
    assert_eq!(ym, ys);
}

/// 散度空间形状错误
#[test]
fn test_divergence_shape_rejected() {
    let domain = FluidDomain::uniform(vec![4, 4], Open).unwrap();
    let div = wavy(1, &[4, 5]);
    assert!(matches!(
        cg(CgConfig::new(1e-6)).solve(&div, &domain, None),
        Err(PressureError::ShapeMismatch { .. })
    ));
    assert!(matches!(
        direct().solve(&div, &domain, None),
        Err(PressureError::ShapeMismatch { .. })
    ));
}

// =============================================================================
// 设备门控
// =============================================================================

/// 直接求解仅支持 CPU；CG 接受 GPU 后端
#[test]
fn test_device_gating() {
    let err = SparseDirect::new(AcceleratorBackend::default()).unwrap_err();
    assert!(matches!(
        err,
        PressureError::UnsupportedDevice { device: DeviceKind::Gpu, .. }
    ));

    let solver = SparseCg::new(AcceleratorBackend::default(), CgConfig::new(1e-8)).unwrap();
    assert!(solver.capabilities().supports_device(DeviceKind::Gpu));

    let domain = FluidDomain::uniform(vec![4, 4], Open).unwrap();
    let div = wavy(1, &[4, 4]);
    let (on_gpu, _) = solver.solve(&div, &domain, None).unwrap();
    let (on_cpu, _) = cg(CgConfig::new(1e-8)).solve(&div, &domain, None).unwrap();
    assert!(on_gpu.max_abs_diff(&on_cpu) < 1e-12);
}

// =============================================================================
// 反向传播
// =============================================================================

/// CG 重新求解的梯度与直接求解的梯度一致
#[test]
fn test_resolve_gradient_matches_direct() {
    let domain = FluidDomain::uniform(vec![5, 5], Open).unwrap().with_obstacle(&[1, 1], &[2, 3]).unwrap();
    let div = wavy(2, &[5, 5]);
    let grad = Field::from_fn(2, &[5, 5], |b, idx| (idx[0] + 2 * idx[1] + b) as f64 * 0.1);

    let exact = direct().solve_differentiable(&div, &domain, None).unwrap();
    let solver = cg(CgConfig::new(1e-10).with_max_iterations(None));
    let approx = solver.solve_differentiable(&div, &domain, None).unwrap();
    assert!(exact.pressure().max_abs_diff(approx.pressure()) < 1e-7);

    let g_exact = exact.backward(&grad).unwrap();
    let g_approx = approx.backward(&grad).unwrap();
    assert_eq!(g_exact.shape(), grad.shape());
    assert!(g_exact.max_abs_diff(&g_approx) < 1e-7);
}

/// 镜像上限按调用绑定：零散度调用的伴随被限制为 0 次迭代
#[test]
fn test_mirror_cap_bound_per_call() {
    let domain = FluidDomain::uniform(vec![6, 6], Open).unwrap();
    let solver = cg(
        CgConfig::new(1e-10).with_max_gradient_iterations(GradientIterations::Mirror),
    );

    let zero = Field::zeros(FieldShape::scalar(1, &[6, 6]));
    let first = solver.solve_differentiable(&zero, &domain, None).unwrap();
    assert_eq!(first.iterations(), Some(0));

    let div = wavy(1, &[6, 6]);
    let second = solver.solve_differentiable(&div, &domain, None).unwrap();
    assert!(second.iterations().unwrap() > 0);

    let grad = Field::from_fn(1, &[6, 6], |_, _| 1.0);
    let g_first = first.backward(&grad).unwrap();
    assert!(g_first.data().iter().all(|&v| v == 0.0));

    let g_second = second.backward(&grad).unwrap();
    assert!(g_second.data().iter().any(|&v| v != 0.0));
}

/// 反向梯度形状必须与压力一致
#[test]
fn test_backward_rejects_wrong_shape() {
    let domain = FluidDomain::uniform(vec![3, 3], Open).unwrap();
    let div = wavy(1, &[3, 3]);
    let solve = direct().solve_differentiable(&div, &domain, None).unwrap();
    let grad = Field::zeros(FieldShape::scalar(2, &[3, 3]));
    assert!(matches!(solve.backward(&grad), Err(PressureError::ShapeMismatch { .. })));
}
