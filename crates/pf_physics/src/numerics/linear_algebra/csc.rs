// crates/pf_physics/src/numerics/linear_algebra/csc.rs

//! 压缩稀疏列（CSC）矩阵格式
//!
//! 压力矩阵的交付格式。`col_ptr`/`row_idx`/`values` 与 CSR 对偶，
//! 列内行索引升序。

use pf_runtime::RuntimeScalar;

use super::csr::{CsrBuilder, CsrMatrix};

/// CSC 格式稀疏矩阵
#[derive(Debug, Clone, PartialEq)]
pub struct CscMatrix<S: RuntimeScalar> {
    n_rows: usize,
    n_cols: usize,
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,
    values: Vec<S>,
}

impl<S: RuntimeScalar> CscMatrix<S> {
    /// 由 CSR 矩阵转换（计数排序，O(nnz)）
    pub fn from_csr(csr: &CsrMatrix<S>) -> Self {
        let n_rows = csr.n_rows();
        let n_cols = csr.n_cols();
        let nnz = csr.nnz();

        let mut col_ptr = vec![0usize; n_cols + 1];
        for &col in csr.col_idx() {
            col_ptr[col + 1] += 1;
        }
        for c in 0..n_cols {
            col_ptr[c + 1] += col_ptr[c];
        }

        let mut cursor = col_ptr.clone();
        let mut row_idx = vec![0usize; nnz];
        let mut values = vec![S::ZERO; nnz];
        // 按行顺序扫描，列内行索引自然升序
        for row in 0..n_rows {
            for (col, v) in csr.row(row).iter() {
                let dst = cursor[col];
                row_idx[dst] = row;
                values[dst] = v;
                cursor[col] += 1;
            }
        }

        Self { n_rows, n_cols, col_ptr, row_idx, values }
    }

    /// 转回 CSR
    pub fn to_csr(&self) -> CsrMatrix<S> {
        let mut builder = CsrBuilder::new(self.n_rows, self.n_cols);
        for col in 0..self.n_cols {
            for idx in self.col_ptr[col]..self.col_ptr[col + 1] {
                builder.set(self.row_idx[idx], col, self.values[idx]);
            }
        }
        builder.build()
    }

    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// 列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// 非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// 列指针
    #[inline]
    pub fn col_ptr(&self) -> &[usize] {
        &self.col_ptr
    }

    /// 行索引
    #[inline]
    pub fn row_idx(&self) -> &[usize] {
        &self.row_idx
    }

    /// 非零元值
    #[inline]
    pub fn values(&self) -> &[S] {
        &self.values
    }

    /// 获取 (row, col) 位置的值（不存在返回 0）
    pub fn get(&self, row: usize, col: usize) -> S {
        let start = self.col_ptr[col];
        let end = self.col_ptr[col + 1];
        match self.row_idx[start..end].binary_search(&row) {
            Ok(local) => self.values[start + local],
            Err(_) => S::ZERO,
        }
    }

    /// 对角线元素
    pub fn diagonal(&self) -> Vec<S> {
        (0..self.n_rows.min(self.n_cols))
            .map(|i| self.get(i, i))
            .collect()
    }

    /// 第 row 行非零元个数（不含对角线）
    pub fn off_diagonal_count(&self, row: usize) -> usize {
        (0..self.n_cols)
            .filter(|&col| col != row)
            .filter(|&col| {
                let start = self.col_ptr[col];
                let end = self.col_ptr[col + 1];
                self.row_idx[start..end].binary_search(&row).is_ok()
            })
            .count()
    }

    /// 矩阵-向量乘法 y = A * x
    ///
    /// # Panics
    /// - `x.len() != self.n_cols()`
    /// - `y.len() != self.n_rows()`
    pub fn mul_vec(&self, x: &[S], y: &mut [S]) {
        assert_eq!(x.len(), self.n_cols, "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows, "y 长度必须等于矩阵行数");

        y.fill(S::ZERO);
        for (col, &xc) in x.iter().enumerate() {
            if xc == S::ZERO {
                continue;
            }
            for idx in self.col_ptr[col]..self.col_ptr[col + 1] {
                y[self.row_idx[idx]] += self.values[idx] * xc;
            }
        }
    }

    /// 转置矩阵-向量乘法 y = Aᵀ * x（按列点积）
    ///
    /// # Panics
    /// - `x.len() != self.n_rows()`
    /// - `y.len() != self.n_cols()`
    pub fn mul_vec_transpose(&self, x: &[S], y: &mut [S]) {
        assert_eq!(x.len(), self.n_rows, "x 长度必须等于矩阵行数");
        assert_eq!(y.len(), self.n_cols, "y 长度必须等于矩阵列数");

        for (col, out) in y.iter_mut().enumerate() {
            let mut sum = S::ZERO;
            for idx in self.col_ptr[col]..self.col_ptr[col + 1] {
                sum += self.values[idx] * x[self.row_idx[idx]];
            }
            *out = sum;
        }
    }
}

impl<S: RuntimeScalar> From<&CsrMatrix<S>> for CscMatrix<S> {
    fn from(csr: &CsrMatrix<S>) -> Self {
        Self::from_csr(csr)
    }
}
