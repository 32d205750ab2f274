// crates/pf_physics/src/domain/mask.rs

//! 单元掩码
//!
//! N 维 `ArrayD`，取值为 0/1（二值模式）或 `[0, 1]` 内的任意有限值
//! （连续模式）。校验模式作为参数显式传入。

use ndarray::{ArrayD, Axis, IxDyn, Slice};
use pf_runtime::RuntimeScalar;
use serde::{Deserialize, Serialize};

use crate::error::{PressureError, PressureResult};

/// 掩码校验模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskMode {
    /// 只允许 0 或 1
    #[default]
    Binary,
    /// 允许 `[0, 1]` 内的任意值
    Continuous,
}

/// 幽灵单元填充方式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GhostFill<S> {
    /// 常数
    Constant(S),
    /// 周期复制对侧内部单元
    Wrap,
}

/// N 维掩码
#[derive(Debug, Clone, PartialEq)]
pub struct Mask<S: RuntimeScalar> {
    values: ArrayD<S>,
}

impl<S: RuntimeScalar> Mask<S> {
    /// 常数掩码
    pub fn filled(dims: &[usize], value: S) -> Self {
        Self { values: ArrayD::from_elem(IxDyn(dims), value) }
    }

    /// 由扁平值创建并按 `mode` 校验
    pub fn from_values(dims: &[usize], values: Vec<S>, mode: MaskMode) -> PressureResult<Self> {
        let len = values.len();
        let values = ArrayD::from_shape_vec(IxDyn(dims), values).map_err(|_| PressureError::ShapeMismatch {
            name: "mask",
            expected: dims.to_vec(),
            actual: vec![len],
        })?;
        Self::from_array(values, mode)
    }

    /// 由数组创建并按 `mode` 校验
    pub fn from_array(values: ArrayD<S>, mode: MaskMode) -> PressureResult<Self> {
        let mask = Self { values };
        mask.validate("mask", mode)?;
        Ok(mask)
    }

    /// 校验取值
    pub fn validate(&self, name: &'static str, mode: MaskMode) -> PressureResult<()> {
        for (index, &v) in self.values.iter().enumerate() {
            let reason = match mode {
                _ if !v.is_finite() => Some("必须为有限值"),
                MaskMode::Binary if v != S::ZERO && v != S::ONE => Some("二值模式下只允许 0 或 1"),
                MaskMode::Continuous if v < S::ZERO || v > S::ONE => Some("必须位于 [0, 1]"),
                _ => None,
            };
            if let Some(reason) = reason {
                return Err(PressureError::MaskValue {
                    name,
                    index,
                    value: v.to_config(),
                    reason,
                });
            }
        }
        Ok(())
    }

    /// 维度
    #[inline]
    pub fn dims(&self) -> &[usize] {
        self.values.shape()
    }

    /// 底层数组
    #[inline]
    pub fn array(&self) -> &ArrayD<S> {
        &self.values
    }

    /// 可变底层数组
    #[inline]
    pub(crate) fn array_mut(&mut self) -> &mut ArrayD<S> {
        &mut self.values
    }

    /// 元素数
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 按多维索引取值
    pub fn get(&self, idx: &[usize]) -> S {
        self.values[idx]
    }

    /// 按多维索引赋值
    pub fn set(&mut self, idx: &[usize], value: S) {
        self.values[idx] = value;
    }

    /// 是否全部为 0/1
    pub fn is_binary(&self) -> bool {
        self.values.iter().all(|&v| v == S::ZERO || v == S::ONE)
    }

    /// 非零元素数
    pub fn count_nonzero(&self) -> usize {
        self.values.iter().filter(|&&v| v != S::ZERO).count()
    }

    /// 每个轴两侧各加 `ghost` 层幽灵单元
    ///
    /// `fills[axis] = [lower, upper]`。角点单元按轴序取第一个常数填充，
    /// 周期轴先折回再继续判断。
    ///
    /// # Panics
    /// `fills.len()` 不等于维数时
    pub fn extend(&self, ghost: usize, fills: &[[GhostFill<S>; 2]]) -> Self {
        let dims = self.dims();
        assert_eq!(fills.len(), dims.len(), "fills 长度必须等于掩码维数");

        let ext_dims: Vec<usize> = dims.iter().map(|&n| n + 2 * ghost).collect();
        let mut ext = ArrayD::from_elem(IxDyn(&ext_dims), S::ZERO);
        ext.slice_each_axis_mut(|ax| Slice::from(ghost..ax.len - ghost))
            .assign(&self.values);

        // 从最后一轴往前逐轴填充整片幽灵层：前面的轴后写，覆盖角点
        for axis in (0..dims.len()).rev() {
            let n = dims[axis];
            for k in 0..ghost {
                let lower_src = (k as isize - ghost as isize).rem_euclid(n as isize) as usize + ghost;
                let upper_src = (n + k) % n + ghost;
                for (dst, src, fill) in [(k, lower_src, fills[axis][0]), (ghost + n + k, upper_src, fills[axis][1])] {
                    match fill {
                        GhostFill::Constant(v) => ext.index_axis_mut(Axis(axis), dst).fill(v),
                        GhostFill::Wrap => {
                            let slab = ext.index_axis(Axis(axis), src).to_owned();
                            ext.index_axis_mut(Axis(axis), dst).assign(&slab);
                        }
                    }
                }
            }
        }

        Self { values: ext }
    }
}
