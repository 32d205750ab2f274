// crates/pf_physics/src/numerics/linear_algebra/csr.rs

//! 压缩稀疏行（CSR）矩阵格式
//!
//! 压力矩阵的组装格式。行映射构建器 [`CsrBuilder`] 支持覆盖写入与累加两种
//! 语义，组装完成后转换为紧凑 CSR，再按需转为 CSC（见 [`super::csc`]）。
//!
//! # 格式说明
//!
//! - `row_ptr`: 行指针，长度 n_rows + 1
//! - `col_idx`: 列索引，行内升序
//! - `values`: 非零元值
//!
//! # 特性开关
//!
//! - `parallel`: 矩阵-向量乘法按行并行
//!
//! ```
//! use pf_physics::numerics::linear_algebra::CsrBuilder;
//!
//! let mut builder = CsrBuilder::<f64>::new_square(2);
//! builder.set(0, 0, -2.0);
//! builder.set(0, 1, 1.0);
//! builder.set(0, 1, 0.5); // 覆盖
//! builder.set(1, 1, -1.0);
//! let a = builder.build();
//!
//! let mut y = vec![0.0; 2];
//! a.mul_vec(&[1.0, 2.0], &mut y);
//! assert_eq!(y, vec![-1.0, -2.0]);
//! ```

use pf_runtime::RuntimeScalar;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use std::collections::BTreeMap;

// =============================================================================
// CSR 矩阵主体
// =============================================================================

/// CSR 格式稀疏矩阵
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix<S: RuntimeScalar> {
    n_rows: usize,
    n_cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<S>,
}

impl<S: RuntimeScalar> CsrMatrix<S> {
    /// 从原始 CSR 数据创建矩阵
    ///
    /// 调用方保证 `row_ptr` 长度为 `n_rows + 1`、末元素等于 `col_idx.len()`，
    /// 且每行列索引严格升序。
    pub fn from_raw(
        n_rows: usize,
        n_cols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<S>,
    ) -> Self {
        debug_assert_eq!(row_ptr.len(), n_rows + 1, "row_ptr 长度必须为 n_rows + 1");
        debug_assert_eq!(col_idx.len(), values.len(), "col_idx 和 values 长度必须相等");
        debug_assert_eq!(row_ptr[n_rows], col_idx.len(), "row_ptr 末尾必须等于 nnz");

        Self { n_rows, n_cols, row_ptr, col_idx, values }
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

    /// 行指针
    #[inline]
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    /// 列索引
    #[inline]
    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    /// 非零元值
    #[inline]
    pub fn values(&self) -> &[S] {
        &self.values
    }

    /// 第 row 行的非零元数量
    #[inline]
    pub fn row_nnz(&self, row: usize) -> usize {
        self.row_ptr[row + 1] - self.row_ptr[row]
    }

    fn find_index(&self, row: usize, col: usize) -> Option<usize> {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        self.col_idx[start..end]
            .binary_search(&col)
            .ok()
            .map(|local| start + local)
    }

    /// 获取 (row, col) 位置的值（不存在返回 0）
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> S {
        self.find_index(row, col).map_or(S::ZERO, |idx| self.values[idx])
    }

    /// 第 row 行的非零元视图
    #[inline]
    pub fn row(&self, row: usize) -> RowView<'_, S> {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        RowView {
            col_idx: &self.col_idx[start..end],
            values: &self.values[start..end],
        }
    }

    /// 对角元素值（第 row 行）
    #[inline]
    pub fn diagonal_value(&self, row: usize) -> Option<S> {
        self.find_index(row, row).map(|idx| self.values[idx])
    }

    /// 提取对角线元素向量
    pub fn extract_diagonal(&self) -> Vec<S> {
        (0..self.n_rows)
            .map(|i| self.diagonal_value(i).unwrap_or(S::ZERO))
            .collect()
    }

    #[inline]
    fn row_dot(&self, row: usize, x: &[S]) -> S {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        let mut sum = S::ZERO;
        for idx in start..end {
            sum += self.values[idx] * x[self.col_idx[idx]];
        }
        sum
    }

    /// 矩阵-向量乘法 y = A * x
    ///
    /// # Panics
    /// - `x.len() != self.n_cols()`
    /// - `y.len() != self.n_rows()`
    pub fn mul_vec(&self, x: &[S], y: &mut [S]) {
        assert_eq!(x.len(), self.n_cols, "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows, "y 长度必须等于矩阵行数");

        #[cfg(feature = "parallel")]
        y.par_iter_mut()
            .enumerate()
            .for_each(|(row, out)| *out = self.row_dot(row, x));

        #[cfg(not(feature = "parallel"))]
        for (row, out) in y.iter_mut().enumerate() {
            *out = self.row_dot(row, x);
        }
    }

    /// 转置矩阵-向量乘法 y = Aᵀ * x
    ///
    /// # Panics
    /// - `x.len() != self.n_rows()`
    /// - `y.len() != self.n_cols()`
    pub fn mul_vec_transpose(&self, x: &[S], y: &mut [S]) {
        assert_eq!(x.len(), self.n_rows, "x 长度必须等于矩阵行数");
        assert_eq!(y.len(), self.n_cols, "y 长度必须等于矩阵列数");

        y.fill(S::ZERO);
        for (row, &xi) in x.iter().enumerate() {
            for (col, v) in self.row(row).iter() {
                y[col] += v * xi;
            }
        }
    }

    /// 检查矩阵是否对称（在容差范围内）
    ///
    /// 只比较上三角的非零元与其镜像；镜像缺失按 0 计。
    pub fn is_symmetric(&self, tol: S) -> bool {
        if self.n_rows != self.n_cols {
            return false;
        }
        for i in 0..self.n_rows {
            for (j, a_ij) in self.row(i).iter() {
                if j > i && (a_ij - self.get(j, i)).abs() > tol {
                    return false;
                }
            }
        }
        // 下三角中无镜像的元素
        for i in 0..self.n_rows {
            for (j, a_ij) in self.row(i).iter() {
                if j < i && self.find_index(j, i).is_none() && a_ij.abs() > tol {
                    return false;
                }
            }
        }
        true
    }

    /// 无穷范数（最大行绝对值和）
    pub fn infinity_norm(&self) -> S {
        (0..self.n_rows)
            .map(|row| self.row(row).values().iter().map(|v| v.abs()).sum::<S>())
            .fold(S::ZERO, |m, v| m.max(v))
    }

    /// 转换为稠密行优先矩阵（仅用于小规模检查）
    pub fn to_dense(&self) -> Vec<Vec<S>> {
        let mut dense = vec![vec![S::ZERO; self.n_cols]; self.n_rows];
        for (row, dense_row) in dense.iter_mut().enumerate() {
            for (col, v) in self.row(row).iter() {
                dense_row[col] = v;
            }
        }
        dense
    }
}

// =============================================================================
// 行视图辅助类型
// =============================================================================

/// 行视图：某一行非零元的只读访问
pub struct RowView<'a, S: RuntimeScalar> {
    col_idx: &'a [usize],
    values: &'a [S],
}

impl<'a, S: RuntimeScalar> RowView<'a, S> {
    /// 列索引切片
    #[inline]
    pub fn col_indices(&self) -> &'a [usize] {
        self.col_idx
    }

    /// 值切片
    #[inline]
    pub fn values(&self) -> &'a [S] {
        self.values
    }

    /// 迭代 (列索引, 值) 对
    pub fn iter(&self) -> impl Iterator<Item = (usize, S)> + 'a {
        self.col_idx.iter().copied().zip(self.values.iter().copied())
    }
}

// =============================================================================
// 构建器
// =============================================================================

/// CSR 矩阵构建器
///
/// 每行以 BTreeMap 暂存，`set` 覆盖、`add` 累加，`build` 时转为紧凑 CSR。
#[derive(Debug, Clone)]
pub struct CsrBuilder<S: RuntimeScalar> {
    n_rows: usize,
    n_cols: usize,
    rows: Vec<BTreeMap<usize, S>>,
}

impl<S: RuntimeScalar> CsrBuilder<S> {
    /// 创建方阵构建器
    #[inline]
    pub fn new_square(n: usize) -> Self {
        Self::new(n, n)
    }

    /// 创建构建器
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            rows: vec![BTreeMap::new(); n_rows],
        }
    }

    /// 设置 (row, col) 的值（覆盖）
    ///
    /// # Panics
    /// - `row >= n_rows` 或 `col >= n_cols`
    pub fn set(&mut self, row: usize, col: usize, value: S) {
        assert!(row < self.n_rows, "行索引越界");
        assert!(col < self.n_cols, "列索引越界");
        self.rows[row].insert(col, value);
    }

    /// 累加到 (row, col)
    ///
    /// # Panics
    /// - `row >= n_rows` 或 `col >= n_cols`
    pub fn add(&mut self, row: usize, col: usize, value: S) {
        assert!(row < self.n_rows, "行索引越界");
        assert!(col < self.n_cols, "列索引越界");
        *self.rows[row].entry(col).or_insert(S::ZERO) += value;
    }

    /// 当前 (row, col) 的值（不存在返回 0）
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> S {
        self.rows[row].get(&col).copied().unwrap_or(S::ZERO)
    }

    /// 当前非零元总数
    #[inline]
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    /// 构建 CSR 矩阵（消耗构建器）
    pub fn build(self) -> CsrMatrix<S> {
        let nnz = self.nnz();
        let mut row_ptr = Vec::with_capacity(self.n_rows + 1);
        let mut col_idx = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);

        row_ptr.push(0);
        for row_map in self.rows {
            for (col, val) in row_map {
                col_idx.push(col);
                values.push(val);
            }
            row_ptr.push(col_idx.len());
        }

        CsrMatrix {
            n_rows: self.n_rows,
            n_cols: self.n_cols,
            row_ptr,
            col_idx,
            values,
        }
    }
}

// =============================================================================
// 测试套件（泛型覆盖 f32/f64）
// =============================================================================
