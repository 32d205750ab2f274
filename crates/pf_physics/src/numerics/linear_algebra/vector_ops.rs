// crates/pf_physics/src/numerics/linear_algebra/vector_ops.rs

//! 向量运算（BLAS Level 1 风格，泛型标量）
//!
//! 不经后端的小工具函数，供伴随计算、残差检查和测试使用。
//! 求解器主循环中的向量运算走 [`pf_runtime::Backend`]。

use pf_runtime::RuntimeScalar;

/// 点积 x·y
#[inline]
pub fn dot<S: RuntimeScalar>(x: &[S], y: &[S]) -> S {
    debug_assert_eq!(x.len(), y.len());
    x.iter().zip(y.iter()).fold(S::ZERO, |acc, (&xi, &yi)| acc + xi * yi)
}

/// 无穷范数 ||x||∞
#[inline]
pub fn norm_inf<S: RuntimeScalar>(x: &[S]) -> S {
    x.iter().fold(S::ZERO, |m, &v| m.max(v.abs()))
}

/// AXPY: y = α*x + y
#[inline]
pub fn axpy<S: RuntimeScalar>(alpha: S, x: &[S], y: &mut [S]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}

/// z = x - y
#[inline]
pub fn sub<S: RuntimeScalar>(x: &[S], y: &[S], z: &mut [S]) {
    debug_assert_eq!(x.len(), y.len());
    debug_assert_eq!(x.len(), z.len());
    for ((zi, &xi), &yi) in z.iter_mut().zip(x.iter()).zip(y.iter()) {
        *zi = xi - yi;
    }
}

/// max|x_i - y_i|
#[inline]
pub fn max_abs_diff<S: RuntimeScalar>(x: &[S], y: &[S]) -> S {
    debug_assert_eq!(x.len(), y.len());
    x.iter()
        .zip(y.iter())
        .fold(S::ZERO, |m, (&a, &b)| m.max((a - b).abs()))
}

/// 算术平均（空切片返回 0）
#[inline]
pub fn mean<S: RuntimeScalar>(x: &[S]) -> S {
    match S::from_usize(x.len()) {
        Some(n) if !x.is_empty() => x.iter().copied().sum::<S>() / n,
        _ => S::ZERO,
    }
}
