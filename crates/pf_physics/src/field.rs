// crates/pf_physics/src/field.rs

//! 稠密批量场
//!
//! 压力与散度的存储形式：形状 `(batch, *spatial, channels)`，行优先，
//! 最后一个空间轴变化最快。压力求解器只接受 `channels == 1`。

use ndarray::{ArrayD, ArrayViewD, Axis, Dimension, IxDyn, Zip};
use pf_runtime::RuntimeScalar;
use serde::{Deserialize, Serialize};

use crate::error::{PressureError, PressureResult};

/// 场形状
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldShape {
    /// 批量大小
    pub batch: usize,
    /// 空间维度
    pub spatial: Vec<usize>,
    /// 通道数
    pub channels: usize,
}

impl FieldShape {
    /// 创建形状
    pub fn new(batch: usize, spatial: Vec<usize>, channels: usize) -> Self {
        Self { batch, spatial, channels }
    }

    /// 单通道标量场形状
    pub fn scalar(batch: usize, spatial: &[usize]) -> Self {
        Self::new(batch, spatial.to_vec(), 1)
    }

    /// 每个批次的空间单元数
    #[inline]
    pub fn cells(&self) -> usize {
        self.spatial.iter().product()
    }

    /// 每个批次的元素数
    #[inline]
    pub fn row_len(&self) -> usize {
        self.cells() * self.channels
    }

    /// 元素总数
    #[inline]
    pub fn len(&self) -> usize {
        self.batch * self.row_len()
    }

    /// 是否无元素
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 完整维度 `[batch, *spatial, channels]`
    pub fn dims(&self) -> Vec<usize> {
        let mut dims = Vec::with_capacity(self.spatial.len() + 2);
        dims.push(self.batch);
        dims.extend_from_slice(&self.spatial);
        dims.push(self.channels);
        dims
    }
}

/// 稠密批量场
///
/// 数据为 `[batch, *spatial, channels]` 维的 `ArrayD`。所有构造路径都产生
/// 标准（行优先、连续）布局，扁平切片视图依赖这一点。
#[derive(Debug, Clone, PartialEq)]
pub struct Field<S: RuntimeScalar> {
    shape: FieldShape,
    data: ArrayD<S>,
}

impl<S: RuntimeScalar> Field<S> {
    /// 全零场
    pub fn zeros(shape: FieldShape) -> Self {
        let data = ArrayD::from_elem(IxDyn(&shape.dims()), S::ZERO);
        Self { shape, data }
    }

    /// 由扁平数据创建
    pub fn from_vec(shape: FieldShape, data: Vec<S>) -> PressureResult<Self> {
        if data.len() != shape.len() {
            return Err(PressureError::ShapeMismatch {
                name: "field data",
                expected: vec![shape.len()],
                actual: vec![data.len()],
            });
        }
        let dims = shape.dims();
        let data = ArrayD::from_shape_vec(IxDyn(&dims), data).map_err(|_| PressureError::ShapeMismatch {
            name: "field data",
            expected: dims.clone(),
            actual: vec![shape.len()],
        })?;
        Ok(Self { shape, data })
    }

    /// 由数组创建，数组维度必须为 `[batch, *spatial, channels]`
    pub fn from_array(data: ArrayD<S>) -> PressureResult<Self> {
        let dims = data.shape();
        if dims.len() < 3 {
            return Err(PressureError::ShapeMismatch {
                name: "field array",
                expected: vec![0, 0, 1],
                actual: dims.to_vec(),
            });
        }
        let shape = FieldShape::new(dims[0], dims[1..dims.len() - 1].to_vec(), dims[dims.len() - 1]);
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        Ok(Self { shape, data })
    }

    /// 按 `(batch, 空间索引)` 逐点生成单通道场
    pub fn from_fn(batch: usize, spatial: &[usize], mut f: impl FnMut(usize, &[usize]) -> S) -> Self {
        let shape = FieldShape::scalar(batch, spatial);
        let rank = spatial.len();
        let data = ArrayD::from_shape_fn(IxDyn(&shape.dims()), |idx: IxDyn| {
            f(idx[0], &idx.slice()[1..=rank])
        });
        Self { shape, data }
    }

    /// 形状
    #[inline]
    pub fn shape(&self) -> &FieldShape {
        &self.shape
    }

    /// N 维只读视图
    #[inline]
    pub fn view(&self) -> ArrayViewD<'_, S> {
        self.data.view()
    }

    /// 第 b 个批次的 `[*spatial, channels]` 视图
    #[inline]
    pub fn batch_view(&self, b: usize) -> ArrayViewD<'_, S> {
        self.data.index_axis(Axis(0), b)
    }

    /// 扁平数据
    #[inline]
    pub fn data(&self) -> &[S] {
        debug_assert!(self.data.is_standard_layout());
        self.data.as_slice().unwrap_or_default()
    }

    /// 可变扁平数据
    #[inline]
    pub fn data_mut(&mut self) -> &mut [S] {
        debug_assert!(self.data.is_standard_layout());
        self.data.as_slice_mut().unwrap_or_default()
    }

    /// 取出扁平数据
    pub fn into_vec(self) -> Vec<S> {
        self.data.into_raw_vec()
    }

    /// 第 b 个批次
    #[inline]
    pub fn row(&self, b: usize) -> &[S] {
        let len = self.shape.row_len();
        &self.data()[b * len..(b + 1) * len]
    }

    /// 两场最大逐点差
    ///
    /// # Panics
    /// 形状不同时
    pub fn max_abs_diff(&self, other: &Self) -> S {
        assert_eq!(self.shape, other.shape, "场形状必须一致");
        Zip::from(&self.data)
            .and(&other.data)
            .fold(S::ZERO, |m, &a, &b| m.max((a - b).abs()))
    }

    /// 检查形状等于 `expected`
    pub fn expect_shape(&self, name: &'static str, expected: &FieldShape) -> PressureResult<()> {
        if &self.shape == expected {
            Ok(())
        } else {
            Err(PressureError::ShapeMismatch {
                name,
                expected: expected.dims(),
                actual: self.shape.dims(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fn_layout() {
        let f = Field::<f64>::from_fn(2, &[2, 3], |b, idx| (b * 100 + idx[0] * 10 + idx[1]) as f64);
        assert_eq!(f.shape().dims(), vec![2, 2, 3, 1]);
        assert_eq!(f.row(1)[4], 111.0);
        assert_eq!(f.data()[5], 12.0);
        assert_eq!(f.view()[[1, 0, 2, 0]], 102.0);
        assert_eq!(f.batch_view(1).shape(), &[2, 3, 1]);
    }

    #[test]
    fn test_from_array_normalizes_layout() {
        // 转置后的视图不是标准布局
        let a = ArrayD::from_shape_vec(IxDyn(&[1, 2, 3]), (0..6).map(f64::from).collect()).unwrap();
        let t = a.permuted_axes(IxDyn(&[2, 1, 0]));
        let f = Field::from_array(t).unwrap();
        assert_eq!(f.shape(), &FieldShape::new(3, vec![2], 1));
        assert_eq!(f.data(), &[0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
        assert_eq!(f.clone().into_vec(), f.data().to_vec());

        let flat = ArrayD::<f64>::zeros(IxDyn(&[4, 1]));
        assert!(Field::from_array(flat).is_err());
    }

    #[test]
    fn test_max_abs_diff() {
        let a = Field::<f64>::from_fn(1, &[2, 2], |_, idx| idx[0] as f64);
        let mut b = a.clone();
        b.data_mut()[3] -= 0.25;
        assert_eq!(a.max_abs_diff(&b), 0.25);
    }

    #[test]
    fn test_from_vec_length_checked() {
        let shape = FieldShape::scalar(1, &[2, 2]);
        assert!(Field::<f32>::from_vec(shape.clone(), vec![0.0; 4]).is_ok());
        assert!(matches!(
            Field::<f32>::from_vec(shape, vec![0.0; 3]),
            Err(PressureError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_expect_shape() {
        let f = Field::<f64>::zeros(FieldShape::new(1, vec![4], 2));
        let err = f.expect_shape("divergence", &FieldShape::scalar(1, &[4])).unwrap_err();
        assert!(err.to_string().contains("divergence"));
    }
}
