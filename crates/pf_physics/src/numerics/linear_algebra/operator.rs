// crates/pf_physics/src/numerics/linear_algebra/operator.rs

//! 线性算子抽象
//!
//! CG 只需要 `y = A x`，反向展开还需要 `y = Aᵀ x`。稀疏矩阵与
//! 无矩阵模板都实现此 trait，求解器对两者一视同仁。

use pf_runtime::RuntimeScalar;

use super::csc::CscMatrix;
use super::csr::CsrMatrix;

/// 方阵线性算子
pub trait LinearOperator<S: RuntimeScalar>: Send + Sync {
    /// 维数 N（算子为 N×N）
    fn size(&self) -> usize;

    /// y = A x
    fn apply(&self, x: &[S], y: &mut [S]);

    /// y = Aᵀ x
    fn apply_transpose(&self, x: &[S], y: &mut [S]);

    /// 对 `(batch, N)` 缓冲区逐行执行 `apply`
    fn apply_batched(&self, x: &[S], y: &mut [S]) {
        let n = self.size();
        debug_assert_eq!(x.len(), y.len());
        if n == 0 {
            return;
        }
        for (xr, yr) in x.chunks(n).zip(y.chunks_mut(n)) {
            self.apply(xr, yr);
        }
    }

    /// 对 `(batch, N)` 缓冲区逐行执行 `apply_transpose`
    fn apply_transpose_batched(&self, x: &[S], y: &mut [S]) {
        let n = self.size();
        debug_assert_eq!(x.len(), y.len());
        if n == 0 {
            return;
        }
        for (xr, yr) in x.chunks(n).zip(y.chunks_mut(n)) {
            self.apply_transpose(xr, yr);
        }
    }
}

impl<S: RuntimeScalar> LinearOperator<S> for CsrMatrix<S> {
    fn size(&self) -> usize {
        self.n_rows()
    }

    fn apply(&self, x: &[S], y: &mut [S]) {
        self.mul_vec(x, y);
    }

    fn apply_transpose(&self, x: &[S], y: &mut [S]) {
        self.mul_vec_transpose(x, y);
    }
}

impl<S: RuntimeScalar> LinearOperator<S> for CscMatrix<S> {
    fn size(&self) -> usize {
        self.n_rows()
    }

    fn apply(&self, x: &[S], y: &mut [S]) {
        self.mul_vec(x, y);
    }

    fn apply_transpose(&self, x: &[S], y: &mut [S]) {
        self.mul_vec_transpose(x, y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::linear_algebra::CsrBuilder;

    #[test]
    fn test_batched_apply_rows_independent() {
        let mut b = CsrBuilder::<f64>::new_square(2);
        b.set(0, 0, 2.0);
        b.set(0, 1, 1.0);
        b.set(1, 1, -1.0);
        let csr = b.build();
        let csc = CscMatrix::from_csr(&csr);

        let x = [1.0, 1.0, 0.0, 2.0];
        let mut y = [0.0; 4];
        LinearOperator::apply_batched(&csr, &x, &mut y);
        assert_eq!(y, [3.0, -1.0, 2.0, -2.0]);

        LinearOperator::apply_transpose_batched(&csc, &x, &mut y);
        assert_eq!(y, [2.0, 0.0, 0.0, -2.0]);
    }
}
