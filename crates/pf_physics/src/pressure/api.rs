// crates/pf_physics/src/pressure/api.rs

//! 压力求解器接口
//!
//! 调用契约：`(divergence, domain, guess?) -> (pressure, iterations?)`。
//! 散度形状为 `(batch, *resolution, 1)`，输出压力与散度同形。
//! 选择求解器是调用方的事，能力描述只回答查询。

use pf_runtime::{DeviceKind, RuntimeScalar};

use crate::domain::FluidDomain;
use crate::error::{PressureError, PressureResult};
use crate::field::{Field, FieldShape};
use crate::pressure::gradient::DifferentiableSolve;

/// 求解器能力描述（每个实例固定）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverCapabilities {
    /// 支持的设备
    pub supported_devices: &'static [DeviceKind],
    /// 是否使用初值
    pub supports_guess: bool,
    /// 是否报告迭代次数
    pub supports_loop_counter: bool,
    /// 是否接受连续掩码
    pub supports_continuous_masks: bool,
}

impl SolverCapabilities {
    /// 是否支持设备
    #[inline]
    pub fn supports_device(&self, device: DeviceKind) -> bool {
        self.supported_devices.contains(&device)
    }

    /// 构造期设备检查
    pub fn check_device(&self, solver: &'static str, device: DeviceKind) -> PressureResult<()> {
        if self.supports_device(device) {
            Ok(())
        } else {
            Err(PressureError::UnsupportedDevice { solver, device })
        }
    }
}

/// 压力求解器
pub trait PressureSolver<S: RuntimeScalar>: Send + Sync {
    /// 显示名称
    fn name(&self) -> &'static str;

    /// 能力描述
    fn capabilities(&self) -> &SolverCapabilities;

    /// 求解 ∇²p = divergence
    ///
    /// 返回压力（与散度同形）和迭代次数（不支持计数的求解器返回 `None`）。
    fn solve(
        &self,
        divergence: &Field<S>,
        domain: &FluidDomain<S>,
        guess: Option<&Field<S>>,
    ) -> PressureResult<(Field<S>, Option<usize>)>;

    /// 可微求解：额外返回该次调用的伴随
    fn solve_differentiable(
        &self,
        divergence: &Field<S>,
        domain: &FluidDomain<S>,
        guess: Option<&Field<S>>,
    ) -> PressureResult<DifferentiableSolve<S>>;
}

/// 调用期检查：散度为单通道且空间维度与计算域一致；
/// 求解器使用初值时初值必须与散度同形。
pub fn validate_call<S: RuntimeScalar>(
    solver: &'static str,
    capabilities: &SolverCapabilities,
    divergence: &Field<S>,
    domain: &FluidDomain<S>,
    guess: Option<&Field<S>>,
) -> PressureResult<()> {
    let expected = FieldShape::scalar(divergence.shape().batch, domain.resolution());
    divergence.expect_shape("divergence", &expected)?;
    if capabilities.supports_guess {
        if let Some(guess) = guess {
            guess.expect_shape("pressure_guess", &expected)?;
        }
    }
    if !capabilities.supports_continuous_masks && domain.has_continuous_masks() {
        return Err(PressureError::ContinuousMasksUnsupported { solver });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_config::BoundaryMode;

    const CPU_ONLY: SolverCapabilities = SolverCapabilities {
        supported_devices: &[DeviceKind::Cpu],
        supports_guess: true,
        supports_loop_counter: false,
        supports_continuous_masks: false,
    };

    #[test]
    fn test_device_queries() {
        assert!(CPU_ONLY.supports_device(DeviceKind::Cpu));
        assert!(!CPU_ONLY.supports_device(DeviceKind::Gpu));
        assert!(matches!(
            CPU_ONLY.check_device("test", DeviceKind::Gpu),
            Err(PressureError::UnsupportedDevice { device: DeviceKind::Gpu, .. })
        ));
    }

    #[test]
    fn test_validate_call_shapes() {
        let domain = FluidDomain::<f64>::uniform(vec![3, 4], BoundaryMode::Open).unwrap();
        let div = Field::zeros(FieldShape::scalar(2, &[3, 4]));
        assert!(validate_call("test", &CPU_ONLY, &div, &domain, None).is_ok());

        let multi = Field::zeros(FieldShape::new(2, vec![3, 4], 2));
        assert!(validate_call("test", &CPU_ONLY, &multi, &domain, None).is_err());

        let wrong = Field::zeros(FieldShape::scalar(2, &[4, 3]));
        assert!(validate_call("test", &CPU_ONLY, &wrong, &domain, None).is_err());

        let guess = Field::zeros(FieldShape::scalar(1, &[3, 4]));
        assert!(matches!(
            validate_call("test", &CPU_ONLY, &div, &domain, Some(&guess)),
            Err(PressureError::ShapeMismatch { name: "pressure_guess", .. })
        ));
    }
}
