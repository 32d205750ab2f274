// crates/pf_runtime/src/backend.rs

//! Backend - 计算后端抽象
//!
//! 求解器通过显式传入的后端完成全部向量运算，不存在全局"当前后端"。
//! 批量运算以行（batch row）为单位：长度为 `batch * row_len` 的连续缓冲区
//! 被视为 `batch` 个长度为 `row_len` 的向量。

use std::fmt;
use std::marker::PhantomData;

use num_traits::Float;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::scalar::RuntimeScalar;

/// 计算设备类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// 主机 CPU
    Cpu,
    /// 加速器
    Gpu,
}

impl DeviceKind {
    /// 设备名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Gpu => "GPU",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 计算后端 Trait
///
/// 抽象不同计算设备的 BLAS-1 操作、规约和批量行运算。
/// 所有切片参数的长度由调用方保证一致，实现在调试构建中断言。
pub trait Backend: Clone + Send + Sync + 'static {
    /// 标量类型
    type Scalar: RuntimeScalar;

    /// 后端名称
    fn name(&self) -> &'static str;

    /// 设备类别
    fn device(&self) -> DeviceKind;

    /// 分配零初始化缓冲区
    fn alloc(&self, len: usize) -> Vec<Self::Scalar> {
        vec![Self::Scalar::ZERO; len]
    }

    /// 从配置 f64 转换到标量类型
    #[inline]
    fn scalar_from_f64(&self, v: f64) -> Self::Scalar {
        Self::Scalar::from_config(v).unwrap_or(Self::Scalar::ZERO)
    }

    // =========================================================================
    // BLAS Level 1 操作
    // =========================================================================

    /// y = alpha * x + y (AXPY)
    fn axpy(&self, alpha: Self::Scalar, x: &[Self::Scalar], y: &mut [Self::Scalar]);

    /// 点积: sum(x[i] * y[i])
    fn dot(&self, x: &[Self::Scalar], y: &[Self::Scalar]) -> Self::Scalar;

    /// 复制: dst = src
    fn copy(&self, src: &[Self::Scalar], dst: &mut [Self::Scalar]);

    /// 缩放: x = alpha * x
    fn scale(&self, alpha: Self::Scalar, x: &mut [Self::Scalar]);

    // =========================================================================
    // 规约操作
    // =========================================================================

    /// 最大值（空切片返回 MIN）
    fn reduce_max(&self, x: &[Self::Scalar]) -> Self::Scalar;

    /// 最小值（空切片返回 MAX）
    fn reduce_min(&self, x: &[Self::Scalar]) -> Self::Scalar;

    /// 求和
    fn reduce_sum(&self, x: &[Self::Scalar]) -> Self::Scalar;

    /// 2-范数
    fn norm2(&self, x: &[Self::Scalar]) -> Self::Scalar {
        Float::sqrt(self.dot(x, x))
    }

    /// 无穷范数 max|x_i|
    fn norm_inf(&self, x: &[Self::Scalar]) -> Self::Scalar;

    // =========================================================================
    // 批量行运算
    // =========================================================================

    /// out[b] = x_b · y_b
    fn batched_dot(
        &self,
        x: &[Self::Scalar],
        y: &[Self::Scalar],
        row_len: usize,
        out: &mut [Self::Scalar],
    );

    /// y_b += alphas[b] * x_b
    fn batched_axpy(
        &self,
        alphas: &[Self::Scalar],
        x: &[Self::Scalar],
        y: &mut [Self::Scalar],
        row_len: usize,
    );

    /// y_b = x_b + betas[b] * y_b
    fn batched_xpay(
        &self,
        x: &[Self::Scalar],
        betas: &[Self::Scalar],
        y: &mut [Self::Scalar],
        row_len: usize,
    );
}

// =============================================================================
// CPU 后端
// =============================================================================

/// CPU 后端（零大小类型）
///
/// 启用 `parallel` feature 时批量行运算按行并行。
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend<S: RuntimeScalar> {
    _marker: PhantomData<S>,
}

impl<S: RuntimeScalar> CpuBackend<S> {
    /// 创建 CPU 后端
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

#[inline]
fn dot_serial<S: RuntimeScalar>(x: &[S], y: &[S]) -> S {
    x.iter().zip(y.iter()).fold(S::ZERO, |acc, (&a, &b)| acc + a * b)
}

impl<S: RuntimeScalar> Backend for CpuBackend<S> {
    type Scalar = S;

    fn name(&self) -> &'static str {
        if std::mem::size_of::<S>() == 4 {
            "CPU-f32"
        } else {
            "CPU-f64"
        }
    }

    fn device(&self) -> DeviceKind {
        DeviceKind::Cpu
    }

    fn axpy(&self, alpha: S, x: &[S], y: &mut [S]) {
        debug_assert_eq!(x.len(), y.len());
        for (yi, &xi) in y.iter_mut().zip(x.iter()) {
            *yi += alpha * xi;
        }
    }

    fn dot(&self, x: &[S], y: &[S]) -> S {
        debug_assert_eq!(x.len(), y.len());
        dot_serial(x, y)
    }

    fn copy(&self, src: &[S], dst: &mut [S]) {
        dst.copy_from_slice(src);
    }

    fn scale(&self, alpha: S, x: &mut [S]) {
        for xi in x.iter_mut() {
            *xi *= alpha;
        }
    }

    fn reduce_max(&self, x: &[S]) -> S {
        x.iter().fold(S::MIN, |m, &v| m.max(v))
    }

    fn reduce_min(&self, x: &[S]) -> S {
        x.iter().fold(S::MAX, |m, &v| m.min(v))
    }

    fn reduce_sum(&self, x: &[S]) -> S {
        x.iter().copied().sum()
    }

    fn norm_inf(&self, x: &[S]) -> S {
        x.iter().fold(S::ZERO, |m, &v| m.max(v.abs()))
    }

    #[cfg(not(feature = "parallel"))]
    fn batched_dot(&self, x: &[S], y: &[S], row_len: usize, out: &mut [S]) {
        debug_assert_eq!(x.len(), out.len() * row_len);
        for ((o, xr), yr) in out
            .iter_mut()
            .zip(x.chunks(row_len))
            .zip(y.chunks(row_len))
        {
            *o = dot_serial(xr, yr);
        }
    }

    #[cfg(feature = "parallel")]
    fn batched_dot(&self, x: &[S], y: &[S], row_len: usize, out: &mut [S]) {
        debug_assert_eq!(x.len(), out.len() * row_len);
        out.par_iter_mut()
            .zip(x.par_chunks(row_len))
            .zip(y.par_chunks(row_len))
            .for_each(|((o, xr), yr)| *o = dot_serial(xr, yr));
    }

    #[cfg(not(feature = "parallel"))]
    fn batched_axpy(&self, alphas: &[S], x: &[S], y: &mut [S], row_len: usize) {
        debug_assert_eq!(y.len(), alphas.len() * row_len);
        for ((&a, xr), yr) in alphas
            .iter()
            .zip(x.chunks(row_len))
            .zip(y.chunks_mut(row_len))
        {
            self.axpy(a, xr, yr);
        }
    }

    #[cfg(feature = "parallel")]
    fn batched_axpy(&self, alphas: &[S], x: &[S], y: &mut [S], row_len: usize) {
        debug_assert_eq!(y.len(), alphas.len() * row_len);
        alphas
            .par_iter()
            .zip(x.par_chunks(row_len))
            .zip(y.par_chunks_mut(row_len))
            .for_each(|((&a, xr), yr)| {
                for (yi, &xi) in yr.iter_mut().zip(xr.iter()) {
                    *yi += a * xi;
                }
            });
    }

    #[cfg(not(feature = "parallel"))]
    fn batched_xpay(&self, x: &[S], betas: &[S], y: &mut [S], row_len: usize) {
        debug_assert_eq!(y.len(), betas.len() * row_len);
        for ((&beta, xr), yr) in betas
            .iter()
            .zip(x.chunks(row_len))
            .zip(y.chunks_mut(row_len))
        {
            for (yi, &xi) in yr.iter_mut().zip(xr.iter()) {
                *yi = xi + beta * *yi;
            }
        }
    }

    #[cfg(feature = "parallel")]
    fn batched_xpay(&self, x: &[S], betas: &[S], y: &mut [S], row_len: usize) {
        debug_assert_eq!(y.len(), betas.len() * row_len);
        betas
            .par_iter()
            .zip(x.par_chunks(row_len))
            .zip(y.par_chunks_mut(row_len))
            .for_each(|((&beta, xr), yr)| {
                for (yi, &xi) in yr.iter_mut().zip(xr.iter()) {
                    *yi = xi + beta * *yi;
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_backend_blas() {
        let backend = CpuBackend::<f64>::new();
        let x = vec![1.0, 2.0, 3.0];
        let mut y = vec![1.0, 1.0, 1.0];

        backend.axpy(2.0, &x, &mut y);
        assert_eq!(y, vec![3.0, 5.0, 7.0]);
        assert_eq!(backend.dot(&x, &x), 14.0);

        backend.scale(0.5, &mut y);
        assert_eq!(y, vec![1.5, 2.5, 3.5]);
    }

    #[test]
    fn test_cpu_backend_reductions() {
        let backend = CpuBackend::<f32>::new();
        let x = vec![-4.0f32, 1.0, 3.0];
        assert_eq!(backend.reduce_max(&x), 3.0);
        assert_eq!(backend.reduce_min(&x), -4.0);
        assert_eq!(backend.reduce_sum(&x), 0.0);
        assert_eq!(backend.norm_inf(&x), 4.0);
        assert_eq!(backend.norm_inf(&[]), 0.0);
        assert_eq!(backend.name(), "CPU-f32");
        assert_eq!(backend.device(), DeviceKind::Cpu);
    }

    #[test]
    fn test_norm2() {
        assert_eq!(CpuBackend::<f64>::new().norm2(&[3.0, -4.0]), 5.0);
        assert_eq!(CpuBackend::<f32>::new().norm2(&[0.0, 2.0]), 2.0);
        assert_eq!(CpuBackend::<f64>::new().norm2(&[]), 0.0);
    }

    #[test]
    fn test_batched_ops() {
        let backend = CpuBackend::<f64>::new();
        // 两行，每行长度 2
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let mut y = vec![1.0, 1.0, 1.0, 1.0];

        let mut dots = vec![0.0; 2];
        backend.batched_dot(&x, &y, 2, &mut dots);
        assert_eq!(dots, vec![3.0, 7.0]);

        backend.batched_axpy(&[1.0, -1.0], &x, &mut y, 2);
        assert_eq!(y, vec![2.0, 3.0, -2.0, -3.0]);

        backend.batched_xpay(&x, &[0.0, 2.0], &mut y, 2);
        assert_eq!(y, vec![1.0, 2.0, -1.0, -2.0]);
    }

    #[test]
    fn test_scalar_from_f64() {
        let backend = CpuBackend::<f32>::new();
        assert_eq!(backend.scalar_from_f64(0.5), 0.5f32);
        assert_eq!(backend.scalar_from_f64(f64::INFINITY), 0.0f32);
    }
}
