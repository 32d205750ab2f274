// crates/pf_runtime/src/scalar.rs

//! RuntimeScalar - 密封的标量类型抽象
//!
//! 压力求解器在 f32 与 f64 之间切换的唯一入口。配置层一律使用 f64，
//! 进入计算层时经 [`RuntimeScalar::from_config`] 转换。
//!
//! ```rust
//! use pf_runtime::RuntimeScalar;
//!
//! fn residual<S: RuntimeScalar>(ax: S, b: S) -> S {
//!     (ax - b).abs()
//! }
//! assert_eq!(residual(3.0f32, 1.0), 2.0);
//! ```

use std::fmt::{Debug, Display};
use std::iter::Sum;

use bytemuck::Pod;
use num_traits::{Float, FromPrimitive, NumAssign};

mod private {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// 运行时标量类型（密封，仅 f32/f64 可实现）
///
/// 计算层组件以 `<S: RuntimeScalar>` 作为泛型边界；配置层和应用层
/// 不出现泛型参数，通过精度枚举分派。
pub trait RuntimeScalar:
    private::Sealed
    + Pod
    + Float
    + FromPrimitive
    + NumAssign
    + Debug
    + Display
    + Send
    + Sync
    + Sum
    + Default
    + 'static
{
    /// 零值
    const ZERO: Self;
    /// 一
    const ONE: Self;
    /// 二
    const TWO: Self;
    /// 二分之一
    const HALF: Self;
    /// 机器精度
    const EPSILON: Self;
    /// 最小正值
    const MIN_POSITIVE: Self;
    /// 最大值
    const MAX: Self;
    /// 最小值
    const MIN: Self;

    /// 从配置层的 f64 转换
    ///
    /// 超出目标类型范围（f32 溢出为 Inf）或非有限值时返回 `None`。
    #[inline]
    fn from_config(v: f64) -> Option<Self> {
        Self::from_f64(v).filter(|s| s.is_finite())
    }

    /// 转回 f64（用于日志与报告）
    #[inline]
    fn to_config(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }

    /// 安全除法
    ///
    /// 当除数绝对值小于 MIN_POSITIVE 时返回 fallback
    #[inline]
    fn safe_div(self, rhs: Self, fallback: Self) -> Self {
        if rhs.abs() < Self::MIN_POSITIVE {
            fallback
        } else {
            self / rhs
        }
    }

    /// 近似相等判断
    #[inline]
    fn approx_eq(self, other: Self, epsilon: Self) -> bool {
        (self - other).abs() < epsilon
    }

    /// 批量验证切片中所有值是否有限
    fn validate_slice(data: &[Self]) -> Result<(), (usize, Self)> {
        for (i, &v) in data.iter().enumerate() {
            if !v.is_finite() {
                return Err((i, v));
            }
        }
        Ok(())
    }
}

// =============================================================================
// f32 实现
// =============================================================================

impl RuntimeScalar for f32 {
    const ZERO: f32 = 0.0;
    const ONE: f32 = 1.0;
    const TWO: f32 = 2.0;
    const HALF: f32 = 0.5;
    const EPSILON: f32 = f32::EPSILON;
    const MIN_POSITIVE: f32 = f32::MIN_POSITIVE;
    const MAX: f32 = f32::MAX;
    const MIN: f32 = f32::MIN;
}

// =============================================================================
// f64 实现
// =============================================================================

impl RuntimeScalar for f64 {
    const ZERO: f64 = 0.0;
    const ONE: f64 = 1.0;
    const TWO: f64 = 2.0;
    const HALF: f64 = 0.5;
    const EPSILON: f64 = f64::EPSILON;
    const MIN_POSITIVE: f64 = f64::MIN_POSITIVE;
    const MAX: f64 = f64::MAX;
    const MIN: f64 = f64::MIN;
}
