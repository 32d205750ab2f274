// crates/pf_physics/src/domain/fluid_domain.rs

//! 流体计算域
//!
//! 分辨率、逐轴逐侧边界模式，以及内部单元上的两张掩码：
//! `active`（单元含流体）与 `accessible`（单元不是固体障碍物）。
//! 求解器通过 [`FluidDomain::active_tensor`] / [`FluidDomain::accessible_tensor`]
//! 读取带幽灵层的掩码，从不修改计算域。

use ndarray::{AxisDescription, Slice};
use pf_config::{BoundaryMode, DomainConfig};
use pf_runtime::RuntimeScalar;

use super::mask::{GhostFill, Mask};
use super::periodicity::Periodicity;
use crate::error::{PressureError, PressureResult};

/// 流体计算域
#[derive(Debug, Clone, PartialEq)]
pub struct FluidDomain<S: RuntimeScalar> {
    resolution: Vec<usize>,
    boundaries: Vec<[BoundaryMode; 2]>,
    active: Mask<S>,
    accessible: Mask<S>,
}

/// 检查网格维度
pub(crate) fn check_dimensions(dimensions: &[usize]) -> PressureResult<()> {
    if dimensions.is_empty() {
        return Err(PressureError::InvalidDimensions {
            dimensions: Vec::new(),
            reason: "至少需要一个空间轴",
        });
    }
    if dimensions.contains(&0) {
        return Err(PressureError::InvalidDimensions {
            dimensions: dimensions.to_vec(),
            reason: "各轴单元数必须为正",
        });
    }
    Ok(())
}

impl<S: RuntimeScalar> FluidDomain<S> {
    /// 创建全流体计算域
    pub fn new(resolution: Vec<usize>, boundaries: Vec<[BoundaryMode; 2]>) -> PressureResult<Self> {
        check_dimensions(&resolution)?;
        if boundaries.len() != resolution.len() {
            return Err(PressureError::ShapeMismatch {
                name: "boundaries",
                expected: vec![resolution.len()],
                actual: vec![boundaries.len()],
            });
        }
        let active = Mask::filled(&resolution, S::ONE);
        let accessible = Mask::filled(&resolution, S::ONE);
        Ok(Self { resolution, boundaries, active, accessible })
    }

    /// 所有边界使用同一模式
    pub fn uniform(resolution: Vec<usize>, mode: BoundaryMode) -> PressureResult<Self> {
        let rank = resolution.len();
        Self::new(resolution, vec![[mode; 2]; rank])
    }

    /// 由配置创建（含障碍物）
    pub fn from_config(config: &DomainConfig) -> PressureResult<Self> {
        config.validate()?;
        let mut domain = Self::new(config.resolution.clone(), config.boundary_modes()?)?;
        for obstacle in &config.obstacles {
            domain = domain.with_obstacle(&obstacle.lower, &obstacle.upper)?;
        }
        log::debug!(
            "FluidDomain: 分辨率 {:?}, {} 个障碍物, {} 个活动单元",
            domain.resolution,
            config.obstacles.len(),
            domain.active_count()
        );
        Ok(domain)
    }

    fn check_mask(&self, name: &'static str, mask: &Mask<S>) -> PressureResult<()> {
        if mask.dims() != self.resolution.as_slice() {
            return Err(PressureError::ShapeMismatch {
                name,
                expected: self.resolution.clone(),
                actual: mask.dims().to_vec(),
            });
        }
        Ok(())
    }

    /// 替换流体掩码
    pub fn with_active(mut self, mask: Mask<S>) -> PressureResult<Self> {
        self.check_mask("active", &mask)?;
        self.active = mask;
        Ok(self)
    }

    /// 替换可达掩码
    pub fn with_accessible(mut self, mask: Mask<S>) -> PressureResult<Self> {
        self.check_mask("accessible", &mask)?;
        self.accessible = mask;
        Ok(self)
    }

    /// 在半开区间 `[lower, upper)` 内放置固体障碍物
    pub fn with_obstacle(mut self, lower: &[usize], upper: &[usize]) -> PressureResult<Self> {
        let rank = self.rank();
        let inside = lower.len() == rank
            && upper.len() == rank
            && lower
                .iter()
                .zip(upper)
                .zip(&self.resolution)
                .all(|((&lo, &hi), &n)| lo < hi && hi <= n);
        if !inside {
            return Err(PressureError::InvalidObstacle {
                lower: lower.to_vec(),
                upper: upper.to_vec(),
                dimensions: self.resolution.clone(),
            });
        }

        let region = |ax: AxisDescription| {
            let i = ax.axis.index();
            Slice::from(lower[i]..upper[i])
        };
        self.active.array_mut().slice_each_axis_mut(region).fill(S::ZERO);
        self.accessible.array_mut().slice_each_axis_mut(region).fill(S::ZERO);
        Ok(self)
    }

    /// 分辨率
    #[inline]
    pub fn resolution(&self) -> &[usize] {
        &self.resolution
    }

    /// 空间维数
    #[inline]
    pub fn rank(&self) -> usize {
        self.resolution.len()
    }

    /// 单元总数
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.active.len()
    }

    /// 非零流体单元数
    pub fn active_count(&self) -> usize {
        self.active.count_nonzero()
    }

    /// 边界模式
    #[inline]
    pub fn boundaries(&self) -> &[[BoundaryMode; 2]] {
        &self.boundaries
    }

    /// 由边界模式推导的周期标记
    pub fn periodicity(&self) -> Periodicity {
        Periodicity::from_modes(&self.boundaries)
    }

    /// 内部流体掩码
    #[inline]
    pub fn active(&self) -> &Mask<S> {
        &self.active
    }

    /// 内部可达掩码
    #[inline]
    pub fn accessible(&self) -> &Mask<S> {
        &self.accessible
    }

    /// 是否含有非 0/1 的掩码值
    pub fn has_continuous_masks(&self) -> bool {
        !(self.active.is_binary() && self.accessible.is_binary())
    }

    fn fills(&self, open: S, closed: S) -> Vec<[GhostFill<S>; 2]> {
        let fill = |mode: BoundaryMode| match mode {
            BoundaryMode::Open => GhostFill::Constant(open),
            BoundaryMode::Closed => GhostFill::Constant(closed),
            BoundaryMode::Periodic => GhostFill::Wrap,
        };
        self.boundaries
            .iter()
            .map(|&[lo, hi]| [fill(lo), fill(hi)])
            .collect()
    }

    /// 带 `extend` 层幽灵单元的流体掩码
    ///
    /// 开放与封闭边界外侧均无流体，周期边界复制对侧。
    pub fn active_tensor(&self, extend: usize) -> Mask<S> {
        self.active.extend(extend, &self.fills(S::ZERO, S::ZERO))
    }

    /// 带 `extend` 层幽灵单元的可达掩码
    ///
    /// 开放边界外侧可达，封闭边界外侧为固体，周期边界复制对侧。
    pub fn accessible_tensor(&self, extend: usize) -> Mask<S> {
        self.accessible.extend(extend, &self.fills(S::ONE, S::ZERO))
    }
}
