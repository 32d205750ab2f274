// crates/pf_physics/src/numerics/linear_algebra/solver.rs

//! 批量共轭梯度求解器
//!
//! 对 `(batch, N)` 右端项同步迭代（无预条件 CG）：所有行共享一个迭代计数，
//! 收敛判据为整批残差的无穷范数 `max |r| < accuracy`。已收敛的行继续参与
//! 迭代直到整批满足容差或达到上限。
//!
//! 未收敛不是错误：返回最后一次迭代值与迭代次数，由调用方自行判断。
//!
//! 可选记录完整迭代轨迹 [`CgTrajectory`]，用于逐步反向传播
//! （[`CgTrajectory::backpropagate`]），内存随迭代次数线性增长。

use num_traits::Float;
use pf_runtime::error::check_len;
use pf_runtime::{Backend, RuntimeResult, RuntimeScalar};

use super::operator::LinearOperator;
use super::vector_ops::dot;

/// 求解状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgStatus {
    /// 残差低于容差
    Converged,
    /// 达到迭代上限
    MaxIterationsReached,
}

/// 单步迭代记录（批量布局）
#[derive(Debug, Clone)]
pub struct CgStep<S: RuntimeScalar> {
    /// 搜索方向 p_k
    pub p: Vec<S>,
    /// q_k = A p_k
    pub q: Vec<S>,
    /// 每行 α_k
    pub alpha: Vec<S>,
    /// 每行 β_k
    pub beta: Vec<S>,
    /// 每行 r_k·r_k
    pub rr: Vec<S>,
    /// 每行 r_{k+1}·r_{k+1}
    pub rr_next: Vec<S>,
    /// 每行 p_k·q_k
    pub pq: Vec<S>,
    /// α 是否走了零除回退
    pub alpha_guarded: Vec<bool>,
    /// β 是否走了零除回退
    pub beta_guarded: Vec<bool>,
}

/// 完整迭代轨迹
///
/// `residuals[k]` 为第 k 步开始时的残差，最后一项为最终残差，
/// 因此 `residuals.len() == steps.len() + 1`。
#[derive(Debug, Clone)]
pub struct CgTrajectory<S: RuntimeScalar> {
    /// 行数
    pub batch: usize,
    /// 行长度 N
    pub row_len: usize,
    /// 各步记录
    pub steps: Vec<CgStep<S>>,
    /// 各步残差
    pub residuals: Vec<Vec<S>>,
}

/// 求解结果
#[derive(Debug, Clone)]
pub struct CgOutcome<S: RuntimeScalar> {
    /// 解向量（批量布局）
    pub solution: Vec<S>,
    /// 实际迭代次数
    pub iterations: usize,
    /// 最终残差无穷范数
    pub max_residual: S,
    /// 求解状态
    pub status: CgStatus,
    /// 迭代轨迹（仅在记录模式下）
    pub trajectory: Option<CgTrajectory<S>>,
}

impl<S: RuntimeScalar> CgOutcome<S> {
    /// 是否收敛
    pub fn is_converged(&self) -> bool {
        self.status == CgStatus::Converged
    }
}

/// 批量共轭梯度求解器
#[derive(Debug, Clone)]
pub struct BatchedConjugateGradient<B: Backend> {
    backend: B,
    accuracy: B::Scalar,
    max_iterations: Option<usize>,
}

impl<B: Backend> BatchedConjugateGradient<B> {
    /// 创建求解器
    ///
    /// `max_iterations = None` 时只以容差终止。
    pub fn new(backend: B, accuracy: B::Scalar, max_iterations: Option<usize>) -> Self {
        Self { backend, accuracy, max_iterations }
    }

    /// 收敛容差
    pub fn accuracy(&self) -> B::Scalar {
        self.accuracy
    }

    /// 迭代上限
    pub fn max_iterations(&self) -> Option<usize> {
        self.max_iterations
    }

    /// 求解 A x = b（逐行）
    pub fn solve(
        &self,
        op: &dyn LinearOperator<B::Scalar>,
        rhs: &[B::Scalar],
        guess: Option<&[B::Scalar]>,
    ) -> RuntimeResult<CgOutcome<B::Scalar>> {
        self.run(op, rhs, guess, false)
    }

    /// 求解并记录迭代轨迹
    pub fn solve_recorded(
        &self,
        op: &dyn LinearOperator<B::Scalar>,
        rhs: &[B::Scalar],
        guess: Option<&[B::Scalar]>,
    ) -> RuntimeResult<CgOutcome<B::Scalar>> {
        self.run(op, rhs, guess, true)
    }

    fn run(
        &self,
        op: &dyn LinearOperator<B::Scalar>,
        rhs: &[B::Scalar],
        guess: Option<&[B::Scalar]>,
        record: bool,
    ) -> RuntimeResult<CgOutcome<B::Scalar>> {
        let zero = <B::Scalar as RuntimeScalar>::ZERO;
        let tiny = <B::Scalar as RuntimeScalar>::MIN_POSITIVE;
        let be = &self.backend;
        let n = op.size();
        let total = rhs.len();
        let batch = if n == 0 { 0 } else { total / n };
        check_len("rhs", batch * n, total)?;

        // x = guess 或 0；r = b - A*x
        let mut x = be.alloc(total);
        let mut r = be.alloc(total);
        be.copy(rhs, &mut r);
        if let Some(g) = guess {
            check_len("guess", total, g.len())?;
            be.copy(g, &mut x);
            let mut ax = be.alloc(total);
            op.apply_batched(&x, &mut ax);
            be.axpy(-<B::Scalar as RuntimeScalar>::ONE, &ax, &mut r);
        }

        // p = r
        let mut p = r.clone();
        let mut q = be.alloc(total);

        let mut rr = be.alloc(batch);
        let mut rr_next = be.alloc(batch);
        let mut pq = be.alloc(batch);
        let mut alpha = be.alloc(batch);
        let mut beta = be.alloc(batch);

        let mut steps = Vec::new();
        let mut residuals = Vec::new();

        let mut iterations = 0usize;
        let mut max_residual = be.norm_inf(&r);

        while max_residual >= self.accuracy
            && self.max_iterations.map_or(true, |cap| iterations < cap)
        {
            if record {
                residuals.push(r.clone());
            }

            // q = A*p
            op.apply_batched(&p, &mut q);

            // alpha = r'r / p'Ap
            be.batched_dot(&r, &r, n, &mut rr);
            be.batched_dot(&p, &q, n, &mut pq);
            for b in 0..batch {
                alpha[b] = rr[b].safe_div(pq[b], zero);
            }

            // x = x + alpha * p
            be.batched_axpy(&alpha, &p, &mut x, n);

            // r = r - alpha * Ap
            let neg_alpha: Vec<B::Scalar> = alpha.iter().map(|&a| -a).collect();
            be.batched_axpy(&neg_alpha, &q, &mut r, n);

            // beta = r'r_new / r'r_old
            be.batched_dot(&r, &r, n, &mut rr_next);
            for b in 0..batch {
                beta[b] = rr_next[b].safe_div(rr[b], zero);
            }

            if record {
                steps.push(CgStep {
                    p: p.clone(),
                    q: q.clone(),
                    alpha: alpha.clone(),
                    beta: beta.clone(),
                    rr: rr.clone(),
                    rr_next: rr_next.clone(),
                    pq: pq.clone(),
                    alpha_guarded: pq.iter().map(|&v| Float::abs(v) < tiny).collect(),
                    beta_guarded: rr.iter().map(|&v| Float::abs(v) < tiny).collect(),
                });
            }

            // p = r + beta * p
            be.batched_xpay(&r, &beta, &mut p, n);

            iterations += 1;
            max_residual = be.norm_inf(&r);
            log::trace!("CG iter {}: max|r| = {:.6e}", iterations, max_residual.to_config());
        }

        let status = if max_residual < self.accuracy {
            CgStatus::Converged
        } else {
            log::debug!(
                "CG 未收敛: {} 次迭代后 max|r| = {:.3e} (容差 {:.3e})",
                iterations,
                max_residual.to_config(),
                self.accuracy.to_config()
            );
            CgStatus::MaxIterationsReached
        };

        let trajectory = record.then(|| {
            residuals.push(r.clone());
            CgTrajectory { batch, row_len: n, steps, residuals }
        });

        Ok(CgOutcome { solution: x, iterations, max_residual, status, trajectory })
    }
}

impl<S: RuntimeScalar> CgTrajectory<S> {
    /// 迭代步数
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// 是否未迭代
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// 沿轨迹逆序反向传播
    ///
    /// 给定损失对解 x 的梯度，返回对右端项 b 的梯度。每步按正向的逆序
    /// 处理 p 更新、β、r 更新、x 更新、α、p·q 与 q = A p 七个运算；
    /// 走了零除回退的 α/β 视为常数。
    pub fn backpropagate(&self, op: &dyn LinearOperator<S>, grad_x: &[S]) -> RuntimeResult<Vec<S>> {
        let n = self.row_len;
        let total = self.batch * n;
        check_len("grad_x", total, grad_x.len())?;

        let mut r_bar_next = vec![S::ZERO; total];
        let mut p_bar_next = vec![S::ZERO; total];
        let mut q_bar = vec![S::ZERO; total];
        let mut at_q_bar = vec![S::ZERO; total];

        for (k, step) in self.steps.iter().enumerate().rev() {
            let r_k = &self.residuals[k];
            let r_next = &self.residuals[k + 1];
            let mut r_bar = vec![S::ZERO; total];
            let mut p_bar = vec![S::ZERO; total];

            for b in 0..self.batch {
                let rows = b * n..(b + 1) * n;
                let (p, q) = (&step.p[rows.clone()], &step.q[rows.clone()]);
                let (rk, rn) = (&r_k[rows.clone()], &r_next[rows.clone()]);
                let gx = &grad_x[rows.clone()];
                let (alpha, beta) = (step.alpha[b], step.beta[b]);
                let (rr, rr_next, pq) = (step.rr[b], step.rr_next[b], step.pq[b]);

                // p_{k+1} = r_{k+1} + β p_k
                let beta_bar = dot(&p_bar_next[rows.clone()], p);
                for i in rows.clone() {
                    r_bar_next[i] += p_bar_next[i];
                    p_bar[i] = beta * p_bar_next[i];
                }

                // β = rr_next / rr
                let (mut rr_bar, rr_next_bar) = if step.beta_guarded[b] {
                    (S::ZERO, S::ZERO)
                } else {
                    (-beta_bar * rr_next / (rr * rr), beta_bar / rr)
                };

                // rr_next = r_{k+1}·r_{k+1}
                for (j, i) in rows.clone().enumerate() {
                    r_bar_next[i] += S::TWO * rr_next_bar * rn[j];
                }

                // r_{k+1} = r_k - α q_k
                let mut alpha_bar = -dot(&r_bar_next[rows.clone()], q);
                for i in rows.clone() {
                    r_bar[i] += r_bar_next[i];
                    q_bar[i] = -alpha * r_bar_next[i];
                }

                // x_{k+1} = x_k + α p_k
                alpha_bar += dot(gx, p);
                for (j, i) in rows.clone().enumerate() {
                    p_bar[i] += alpha * gx[j];
                }

                // α = rr / pq
                let pq_bar = if step.alpha_guarded[b] {
                    S::ZERO
                } else {
                    rr_bar += alpha_bar / pq;
                    -alpha_bar * rr / (pq * pq)
                };

                // pq = p_k·q_k
                for (j, i) in rows.clone().enumerate() {
                    p_bar[i] += pq_bar * q[j];
                    q_bar[i] += pq_bar * p[j];
                }

                // rr = r_k·r_k
                for (j, i) in rows.enumerate() {
                    r_bar[i] += S::TWO * rr_bar * rk[j];
                }
            }

            // q_k = A p_k
            op.apply_transpose_batched(&q_bar, &mut at_q_bar);
            for (pb, &v) in p_bar.iter_mut().zip(at_q_bar.iter()) {
                *pb += v;
            }

            r_bar_next = r_bar;
            p_bar_next = p_bar;
        }

        // p_0 = r_0，r_0 = b - A x_0
        for (rb, &pb) in r_bar_next.iter_mut().zip(p_bar_next.iter()) {
            *rb += pb;
        }
        Ok(r_bar_next)
    }
}
