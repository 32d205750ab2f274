// crates/pf_physics/src/numerics/linear_algebra/lu.rs

//! 稀疏 LU 分解（直接求解）
//!
//! 先做对称重排（默认逆 Cuthill-McKee），再逐行 IKJ 高斯消元，允许填充，
//! 不选主元。压力矩阵按行严格或弱对角占优，无主元消元稳定。重排把填充
//! 限制在带内，工作量约为 `O(N·b²)`（`b` 为重排后带宽，二维网格上约为
//! 短边长度）；大网格宜改用共轭梯度。
//!
//! 零主元出现在纯 Neumann 连通块（如全封闭域）的最后一行。默认把该未知量
//! 固定为 0（行列替换为单位向量），对相容右端项得到一个特解；
//! `pin_singular = false` 时报告为 [`FactorizationError`]。
//!
//! L 为单位下三角，与 U 的严格上三角分别以 CSR 形式存储，U 的对角单独存放。

use pf_runtime::RuntimeScalar;

use super::csr::CsrMatrix;
use super::ordering::{reverse_cuthill_mckee, Permutation};

/// 分解失败
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FactorizationError {
    /// 消元过程中遇到零主元
    #[error("第 {row} 行主元为零 (|pivot| = {pivot:e})，矩阵奇异")]
    ZeroPivot {
        /// 行号
        row: usize,
        /// 主元绝对值
        pivot: f64,
    },
    /// 非方阵
    #[error("矩阵必须为方阵: {rows}×{cols}")]
    NotSquare {
        /// 行数
        rows: usize,
        /// 列数
        cols: usize,
    },
}

/// 三角因子的一侧（CSR 形式）
#[derive(Debug, Clone, Default)]
struct TriangularPart<S> {
    ptr: Vec<usize>,
    idx: Vec<usize>,
    val: Vec<S>,
}

impl<S: RuntimeScalar> TriangularPart<S> {
    fn with_rows(n: usize) -> Self {
        let mut ptr = Vec::with_capacity(n + 1);
        ptr.push(0);
        Self { ptr, idx: Vec::new(), val: Vec::new() }
    }

    fn push_row(&mut self, entries: impl Iterator<Item = (usize, S)>) {
        for (col, v) in entries {
            self.idx.push(col);
            self.val.push(v);
        }
        self.ptr.push(self.idx.len());
    }

    #[inline]
    fn row(&self, i: usize) -> impl Iterator<Item = (usize, S)> + '_ {
        let (start, end) = (self.ptr[i], self.ptr[i + 1]);
        self.idx[start..end]
            .iter()
            .copied()
            .zip(self.val[start..end].iter().copied())
    }

    fn nnz(&self) -> usize {
        self.val.len()
    }
}

/// 消元顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LuOrdering {
    /// 原始编号
    Natural,
    /// 逆 Cuthill-McKee 重排
    #[default]
    ReverseCuthillMcKee,
}

/// 分解选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LuOptions {
    /// 消元顺序
    pub ordering: LuOrdering,
    /// 零主元时固定该未知量（解为 0）而不是报错
    pub pin_singular: bool,
}

impl Default for LuOptions {
    fn default() -> Self {
        Self {
            ordering: LuOrdering::default(),
            pin_singular: true,
        }
    }
}

/// 稀疏 LU 因子（对重排后的矩阵）
#[derive(Debug, Clone)]
pub struct SparseLu<S: RuntimeScalar> {
    n: usize,
    permutation: Permutation,
    lower: TriangularPart<S>,
    upper: TriangularPart<S>,
    diag: Vec<S>,
    /// 被固定的行（重排后编号）
    pinned: Vec<usize>,
}

impl<S: RuntimeScalar> SparseLu<S> {
    /// 以默认选项分解：RCM 重排，零主元固定
    pub fn factorize(matrix: &CsrMatrix<S>) -> Result<Self, FactorizationError> {
        Self::factorize_with(matrix, LuOptions::default())
    }

    /// 分解 P A Pᵀ = L U
    pub fn factorize_with(matrix: &CsrMatrix<S>, options: LuOptions) -> Result<Self, FactorizationError> {
        if matrix.n_rows() != matrix.n_cols() {
            return Err(FactorizationError::NotSquare {
                rows: matrix.n_rows(),
                cols: matrix.n_cols(),
            });
        }
        let n = matrix.n_rows();

        let permutation = match options.ordering {
            LuOrdering::Natural => Permutation::identity(n),
            LuOrdering::ReverseCuthillMcKee => reverse_cuthill_mckee(matrix),
        };
        let permuted;
        let a = if permutation.is_identity() {
            matrix
        } else {
            permuted = permutation.permute_symmetric(matrix);
            &permuted
        };

        // 相对主元阈值，随维数放宽以容纳消元舍入
        let scale = a.infinity_norm().max(S::ONE);
        let pivot_tol = scale * S::EPSILON * S::from_usize(n.max(64)).unwrap_or(S::ONE);

        let mut lower = TriangularPart::with_rows(n);
        let mut upper = TriangularPart::with_rows(n);
        let mut diag = Vec::with_capacity(n);
        let mut pinned = Vec::new();
        let mut is_pinned = vec![false; n];

        // 稠密累加行，只清理 [lo, hi] 带内
        let mut work = vec![S::ZERO; n];
        let mut occupied = vec![false; n];

        for i in 0..n {
            let (mut lo, mut hi) = (i, i);
            for (j, v) in a.row(i).iter() {
                if is_pinned[j] {
                    continue;
                }
                work[j] = v;
                occupied[j] = true;
                lo = lo.min(j);
                hi = hi.max(j);
            }

            // 按列升序消去 k < i；填充只会产生 k 之后的列
            for k in lo..i {
                if !occupied[k] || is_pinned[k] || work[k] == S::ZERO {
                    continue;
                }
                let factor = work[k] / diag[k];
                work[k] = factor;
                for (j, u_kj) in upper.row(k) {
                    if is_pinned[j] {
                        continue;
                    }
                    if !occupied[j] {
                        occupied[j] = true;
                        work[j] = S::ZERO;
                        hi = hi.max(j);
                    }
                    work[j] -= factor * u_kj;
                }
            }

            let pivot = if occupied[i] { work[i] } else { S::ZERO };
            if pivot.abs() > pivot_tol {
                let keep = |j: usize| occupied[j] && !is_pinned[j] && work[j] != S::ZERO;
                lower.push_row((lo..i).filter(|&j| keep(j)).map(|j| (j, work[j])));
                upper.push_row((i + 1..=hi).filter(|&j| keep(j)).map(|j| (j, work[j])));
                diag.push(pivot);
            } else if options.pin_singular {
                lower.push_row(std::iter::empty());
                upper.push_row(std::iter::empty());
                diag.push(S::ONE);
                is_pinned[i] = true;
                pinned.push(i);
            } else {
                return Err(FactorizationError::ZeroPivot {
                    row: permutation.order()[i],
                    pivot: pivot.abs().to_config(),
                });
            }

            for j in lo..=hi {
                work[j] = S::ZERO;
                occupied[j] = false;
            }
        }

        log::trace!(
            "SparseLu: n = {}, nnz(A) = {}, nnz(L+U) = {}, 固定 {} 行",
            n,
            a.nnz(),
            lower.nnz() + upper.nnz() + n,
            pinned.len()
        );

        Ok(Self { n, permutation, lower, upper, diag, pinned })
    }

    /// 维数
    #[inline]
    pub fn size(&self) -> usize {
        self.n
    }

    /// 因子非零元总数（含 U 对角）
    pub fn factor_nnz(&self) -> usize {
        self.lower.nnz() + self.upper.nnz() + self.n
    }

    /// 消元使用的置换
    #[inline]
    pub fn permutation(&self) -> &Permutation {
        &self.permutation
    }

    /// 被固定为 0 的未知量（原始编号，升序）
    pub fn pinned_rows(&self) -> Vec<usize> {
        let mut rows: Vec<usize> = self.pinned.iter().map(|&i| self.permutation.order()[i]).collect();
        rows.sort_unstable();
        rows
    }

    /// 求解 A x = b
    ///
    /// 有固定行时，该行方程被替换为 `x_i = 0`；对相容的奇异对称系统
    /// 这给出一个特解。
    ///
    /// # Panics
    /// - `b.len()` 或 `x.len()` 不等于维数
    pub fn solve(&self, b: &[S], x: &mut [S]) {
        assert_eq!(b.len(), self.n, "b 长度必须等于矩阵维数");
        assert_eq!(x.len(), self.n, "x 长度必须等于矩阵维数");

        let mut y = vec![S::ZERO; self.n];
        self.permutation.gather(b, &mut y);
        for &i in &self.pinned {
            y[i] = S::ZERO;
        }

        // 前向替换: L z = P b
        for i in 0..self.n {
            let mut sum = y[i];
            for (k, l_ik) in self.lower.row(i) {
                sum -= l_ik * y[k];
            }
            y[i] = sum;
        }

        // 后向替换: U (P x) = z
        for i in (0..self.n).rev() {
            let mut sum = y[i];
            for (j, u_ij) in self.upper.row(i) {
                sum -= u_ij * y[j];
            }
            y[i] = sum / self.diag[i];
        }

        self.permutation.scatter(&y, x);
    }
}
