// crates/pf_physics/src/pressure/gradient.rs

//! 自定义梯度
//!
//! 可微求解返回 [`DifferentiableSolve`]：压力、迭代次数和一个伴随对象。
//! 伴随对象把损失对压力的梯度映射为对散度的梯度，
//! 由 [`with_custom_gradient`] 在每次正向调用时单独构造，
//! 正向调用保存的数据（迭代次数、分解、轨迹）按值绑定到该次调用。

use pf_runtime::RuntimeScalar;

use crate::error::PressureResult;
use crate::field::Field;

/// 反向映射：∂L/∂pressure → ∂L/∂divergence
pub trait Adjoint<S: RuntimeScalar>: Send + Sync {
    /// 执行反向计算
    fn backward(&self, grad_pressure: &Field<S>) -> PressureResult<Field<S>>;
}

/// 闭包伴随
pub struct FnAdjoint<F>(pub F);

impl<S, F> Adjoint<S> for FnAdjoint<F>
where
    S: RuntimeScalar,
    F: Fn(&Field<S>) -> PressureResult<Field<S>> + Send + Sync,
{
    fn backward(&self, grad_pressure: &Field<S>) -> PressureResult<Field<S>> {
        (self.0)(grad_pressure)
    }
}

/// 正向计算结果与保存给反向的数据
#[derive(Debug)]
pub struct ForwardPass<S: RuntimeScalar, T> {
    /// 压力
    pub pressure: Field<S>,
    /// 迭代次数（直接法为 `None`）
    pub iterations: Option<usize>,
    /// 反向需要的数据
    pub saved: T,
}

/// 可微求解结果
pub struct DifferentiableSolve<S: RuntimeScalar> {
    pressure: Field<S>,
    iterations: Option<usize>,
    adjoint: Box<dyn Adjoint<S>>,
}

impl<S: RuntimeScalar> DifferentiableSolve<S> {
    /// 压力
    #[inline]
    pub fn pressure(&self) -> &Field<S> {
        &self.pressure
    }

    /// 迭代次数
    #[inline]
    pub fn iterations(&self) -> Option<usize> {
        self.iterations
    }

    /// 伴随对象
    pub fn adjoint(&self) -> &dyn Adjoint<S> {
        self.adjoint.as_ref()
    }

    /// 反向传播；`grad_pressure` 必须与压力同形
    pub fn backward(&self, grad_pressure: &Field<S>) -> PressureResult<Field<S>> {
        grad_pressure.expect_shape("grad_pressure", self.pressure.shape())?;
        self.adjoint.backward(grad_pressure)
    }

    /// 拆分为压力、迭代次数与伴随
    pub fn into_parts(self) -> (Field<S>, Option<usize>, Box<dyn Adjoint<S>>) {
        (self.pressure, self.iterations, self.adjoint)
    }
}

impl<S: RuntimeScalar> std::fmt::Debug for DifferentiableSolve<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DifferentiableSolve")
            .field("shape", self.pressure.shape())
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

/// 以自定义反向运行正向计算
///
/// `make_backward` 接收本次正向的迭代次数与保存数据，返回该次调用专属的伴随。
pub fn with_custom_gradient<S, T, F, G>(forward: F, make_backward: G) -> PressureResult<DifferentiableSolve<S>>
where
    S: RuntimeScalar,
    F: FnOnce() -> PressureResult<ForwardPass<S, T>>,
    G: FnOnce(Option<usize>, T) -> Box<dyn Adjoint<S>>,
{
    let ForwardPass { pressure, iterations, saved } = forward()?;
    let adjoint = make_backward(iterations, saved);
    Ok(DifferentiableSolve { pressure, iterations, adjoint })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldShape;

    #[test]
    fn test_backward_receives_forward_iterations() {
        let shape = FieldShape::scalar(1, &[3]);
        let solve = with_custom_gradient(
            || {
                Ok(ForwardPass {
                    pressure: Field::<f64>::zeros(shape.clone()),
                    iterations: Some(7),
                    saved: 2.0,
                })
            },
            |iterations, scale: f64| -> Box<dyn Adjoint<f64>> {
                let k = iterations.unwrap_or(0) as f64 * scale;
                Box::new(FnAdjoint(move |g: &Field<f64>| {
                    let data = g.data().iter().map(|v| v * k).collect();
                    Field::from_vec(g.shape().clone(), data)
                }))
            },
        )
        .unwrap();

        assert_eq!(solve.iterations(), Some(7));
        let grad = Field::from_vec(shape, vec![1.0, 0.5, -1.0]).unwrap();
        assert_eq!(solve.backward(&grad).unwrap().data(), &[14.0, 7.0, -14.0]);
    }

    #[test]
    fn test_backward_checks_shape() {
        let solve = with_custom_gradient(
            || {
                Ok(ForwardPass {
                    pressure: Field::<f32>::zeros(FieldShape::scalar(1, &[2])),
                    iterations: None,
                    saved: (),
                })
            },
            |_, ()| -> Box<dyn Adjoint<f32>> { Box::new(FnAdjoint(|g: &Field<f32>| Ok(g.clone()))) },
        )
        .unwrap();
        assert!(solve.backward(&Field::zeros(FieldShape::scalar(2, &[2]))).is_err());
    }
}
