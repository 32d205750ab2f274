// crates/pf_physics/src/domain/periodicity.rs

//! 逐轴逐侧周期标记

use pf_config::BoundaryMode;
use serde::{Deserialize, Serialize};

/// 轴的一侧
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// 下侧（索引减小方向）
    Lower,
    /// 上侧（索引增大方向）
    Upper,
}

impl Side {
    #[inline]
    fn slot(self) -> usize {
        match self {
            Side::Lower => 0,
            Side::Upper => 1,
        }
    }
}

/// 周期标记 `flags[axis] = [lower, upper]`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Periodicity {
    flags: Vec<[bool; 2]>,
}

impl Periodicity {
    /// 全部非周期
    pub fn none(rank: usize) -> Self {
        Self { flags: vec![[false; 2]; rank] }
    }

    /// 全部周期
    pub fn all(rank: usize) -> Self {
        Self { flags: vec![[true; 2]; rank] }
    }

    /// 由显式标记创建
    pub fn from_flags(flags: Vec<[bool; 2]>) -> Self {
        Self { flags }
    }

    /// 由边界模式推导
    pub fn from_modes(modes: &[[BoundaryMode; 2]]) -> Self {
        Self {
            flags: modes
                .iter()
                .map(|[lo, hi]| [lo.is_periodic(), hi.is_periodic()])
                .collect(),
        }
    }

    /// 设置某轴某侧
    pub fn with(mut self, axis: usize, side: Side, periodic: bool) -> Self {
        self.flags[axis][side.slot()] = periodic;
        self
    }

    /// 维数
    #[inline]
    pub fn rank(&self) -> usize {
        self.flags.len()
    }

    /// 查询某轴某侧是否周期；越界轴视为非周期
    #[inline]
    pub fn is_periodic(&self, axis: usize, side: Side) -> bool {
        self.flags.get(axis).is_some_and(|f| f[side.slot()])
    }

    /// 是否有任何周期侧
    pub fn any(&self) -> bool {
        self.flags.iter().flatten().any(|&f| f)
    }
}
