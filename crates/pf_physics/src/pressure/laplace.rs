// crates/pf_physics/src/pressure/laplace.rs

//! 带掩码的拉普拉斯算子
//!
//! 对每个轴 `dim` 与每个单元 `c`：
//!
//! ```text
//! A[c, c+dim] = active[c+dim] * active[c]
//! A[c, c-dim] = active[c-dim] * active[c]
//! diag[c]    -= fluid[c+dim] + fluid[c-dim]
//! ```
//!
//! 越界邻居在对应侧周期时取模折回，否则丢弃。写入为覆盖语义，零值不存储，
//! 最后 `A[c, c] = min(diag[c], -1)` 覆盖任何自引用。
//!
//! 掩码均为带一层幽灵单元的扩展掩码（每轴比网格多 2）。中心、上侧、下侧
//! 三组系数取自扩展数组上逐轴平移一格的同形窗口。
//! [`sparse_pressure_matrix`] 组装稀疏矩阵，[`LaplaceStencil`] 以无矩阵方式
//! 施加同一算子。

use ndarray::{ArrayD, ArrayViewD, Axis, AxisDescription, IxDyn, Slice, Zip};
use pf_runtime::error::check_len;
use pf_runtime::RuntimeScalar;

use crate::domain::{FluidDomain, Mask, Periodicity, Side};
use crate::domain::fluid_domain::check_dimensions;
use crate::error::{PressureError, PressureResult};
use crate::numerics::linear_algebra::{CscMatrix, CsrBuilder, LinearOperator};

// =============================================================================
// 网格几何
// =============================================================================

/// 单轴上的一对原始写入（上侧先于下侧）
#[derive(Debug, Clone, Copy)]
struct AxisEntries<S> {
    upper: Option<(usize, S)>,
    lower: Option<(usize, S)>,
}

/// 单轴模板：每个单元的上下邻居列号与耦合系数，按行优先扁平存放
#[derive(Debug, Clone)]
struct AxisStencil<S> {
    upper_col: Vec<Option<usize>>,
    lower_col: Vec<Option<usize>>,
    upper: Vec<S>,
    lower: Vec<S>,
}

/// 扩展数组上与内部同形的窗口
///
/// 除 `axis` 外各轴取 `1..n+1`；`axis` 轴取 `shift..shift+n`
/// （0 为下侧邻居，1 为中心，2 为上侧邻居）。
fn window<A>(ext: &ArrayD<A>, axis: usize, shift: usize) -> ArrayViewD<'_, A> {
    ext.slice_each_axis(|ax: AxisDescription| {
        let n = ax.len - 2;
        let start = if ax.axis.index() == axis { shift } else { 1 };
        Slice::from(start..start + n)
    })
}

/// 带幽灵层的单元编号：内部为行优先扁平编号，周期侧幽灵复制对侧编号，
/// 其余幽灵为 `None`
fn neighbor_ids(dimensions: &[usize], periodicity: &Periodicity) -> PressureResult<ArrayD<Option<usize>>> {
    let n: usize = dimensions.iter().product();
    let cells = ArrayD::from_shape_vec(IxDyn(dimensions), (0..n).map(Some).collect()).map_err(|_| {
        PressureError::ShapeMismatch {
            name: "cell index",
            expected: dimensions.to_vec(),
            actual: vec![n],
        }
    })?;
    let ext_dims: Vec<usize> = dimensions.iter().map(|&d| d + 2).collect();
    let mut ids = ArrayD::from_elem(IxDyn(&ext_dims), None);
    ids.slice_each_axis_mut(|ax| Slice::from(1..ax.len - 1)).assign(&cells);

    for (axis, &len) in dimensions.iter().enumerate() {
        if periodicity.is_periodic(axis, Side::Lower) {
            let slab = ids.index_axis(Axis(axis), len).to_owned();
            ids.index_axis_mut(Axis(axis), 0).assign(&slab);
        }
        if periodicity.is_periodic(axis, Side::Upper) {
            let slab = ids.index_axis(Axis(axis), 1).to_owned();
            ids.index_axis_mut(Axis(axis), len + 1).assign(&slab);
        }
    }
    Ok(ids)
}

/// 由扩展掩码预先算好的逐轴模板与未截断对角
#[derive(Debug, Clone)]
struct StencilGeometry<S: RuntimeScalar> {
    axes: Vec<AxisStencil<S>>,
    raw_diagonal: Vec<S>,
}

impl<S: RuntimeScalar> StencilGeometry<S> {
    fn new(
        dimensions: &[usize],
        extended_active: &Mask<S>,
        extended_fluid: &Mask<S>,
        periodicity: &Periodicity,
    ) -> PressureResult<Self> {
        check_dimensions(dimensions)?;
        let ext_dims: Vec<usize> = dimensions.iter().map(|&n| n + 2).collect();
        for (name, mask) in [("extended_active", extended_active), ("extended_fluid", extended_fluid)] {
            if mask.dims() != ext_dims.as_slice() {
                return Err(PressureError::ShapeMismatch {
                    name,
                    expected: ext_dims.clone(),
                    actual: mask.dims().to_vec(),
                });
            }
        }
        if periodicity.rank() != dimensions.len() {
            return Err(PressureError::ShapeMismatch {
                name: "periodicity",
                expected: vec![dimensions.len()],
                actual: vec![periodicity.rank()],
            });
        }

        let active = extended_active.array();
        let fluid = extended_fluid.array();
        let ids = neighbor_ids(dimensions, periodicity)?;
        let center = window(active, 0, 1);
        let mut diagonal = ArrayD::from_elem(IxDyn(dimensions), S::ZERO);

        let axes = (0..dimensions.len())
            .map(|axis| {
                Zip::from(&mut diagonal)
                    .and(&window(fluid, axis, 2))
                    .and(&window(fluid, axis, 0))
                    .for_each(|d, &up, &lo| *d -= up + lo);
                let coupling = |shift| {
                    Zip::from(&window(active, axis, shift))
                        .and(&center)
                        .map_collect(|&nb, &c| nb * c)
                };
                AxisStencil {
                    upper_col: window(&ids, axis, 2).iter().copied().collect(),
                    lower_col: window(&ids, axis, 0).iter().copied().collect(),
                    upper: coupling(2).iter().copied().collect(),
                    lower: coupling(0).iter().copied().collect(),
                }
            })
            .collect();

        Ok(Self {
            axes,
            raw_diagonal: diagonal.iter().copied().collect(),
        })
    }

    #[inline]
    fn size(&self) -> usize {
        self.raw_diagonal.len()
    }

    /// 遍历单元 `cell` 各轴的原始写入，返回未截断的对角累加值
    fn visit_row(&self, cell: usize, mut visit: impl FnMut(AxisEntries<S>)) -> S {
        for axis in &self.axes {
            visit(AxisEntries {
                upper: axis.upper_col[cell].map(|c| (c, axis.upper[cell])),
                lower: axis.lower_col[cell].map(|c| (c, axis.lower[cell])),
            });
        }
        self.raw_diagonal[cell]
    }
}

#[inline]
fn clamp_diagonal<S: RuntimeScalar>(diag: S) -> S {
    diag.min(-S::ONE)
}

// =============================================================================
// 稀疏矩阵组装
// =============================================================================

/// 组装带掩码的压力拉普拉斯矩阵（CSC）
///
/// # 参数
/// - `dimensions`: 网格单元数，非空且各轴为正
/// - `extended_active`: 流体掩码，每轴 `dimensions[i] + 2`
/// - `extended_fluid`: 可达掩码，每轴 `dimensions[i] + 2`
/// - `periodicity`: 逐轴逐侧周期标记，维数等于 `dimensions.len()`
pub fn sparse_pressure_matrix<S: RuntimeScalar>(
    dimensions: &[usize],
    extended_active: &Mask<S>,
    extended_fluid: &Mask<S>,
    periodicity: &Periodicity,
) -> PressureResult<CscMatrix<S>> {
    let geometry = StencilGeometry::new(dimensions, extended_active, extended_fluid, periodicity)?;
    let n = geometry.size();
    let mut builder = CsrBuilder::new_square(n);

    for cell in 0..n {
        let diag = geometry.visit_row(cell, |entries| {
            for (col, value) in [entries.upper, entries.lower].into_iter().flatten() {
                if value != S::ZERO {
                    builder.set(cell, col, value);
                }
            }
        });
        builder.set(cell, cell, clamp_diagonal(diag));
    }

    let matrix = CscMatrix::from_csr(&builder.build());
    log::debug!(
        "压力矩阵: 维度 {:?}, N = {}, nnz = {}",
        dimensions,
        n,
        matrix.nnz()
    );
    Ok(matrix)
}

/// 由计算域组装压力矩阵
pub fn domain_pressure_matrix<S: RuntimeScalar>(domain: &FluidDomain<S>) -> PressureResult<CscMatrix<S>> {
    sparse_pressure_matrix(
        domain.resolution(),
        &domain.active_tensor(1),
        &domain.accessible_tensor(1),
        &domain.periodicity(),
    )
}

// =============================================================================
// 无矩阵模板
// =============================================================================

/// 无矩阵拉普拉斯算子
///
/// 与 [`sparse_pressure_matrix`] 的结果逐元素相同；对角预先算好，
/// 非对角项在每次施加时由掩码现场计算。
#[derive(Debug, Clone)]
pub struct LaplaceStencil<S: RuntimeScalar> {
    geometry: StencilGeometry<S>,
    diagonal: Vec<S>,
}

impl<S: RuntimeScalar> LaplaceStencil<S> {
    /// 创建模板，参数与 [`sparse_pressure_matrix`] 相同
    pub fn new(
        dimensions: &[usize],
        extended_active: &Mask<S>,
        extended_fluid: &Mask<S>,
        periodicity: &Periodicity,
    ) -> PressureResult<Self> {
        let geometry = StencilGeometry::new(dimensions, extended_active, extended_fluid, periodicity)?;
        let diagonal = (0..geometry.size())
            .map(|cell| clamp_diagonal(geometry.visit_row(cell, |_| {})))
            .collect();
        Ok(Self { geometry, diagonal })
    }

    /// 由计算域创建
    pub fn from_domain(domain: &FluidDomain<S>) -> PressureResult<Self> {
        Self::new(
            domain.resolution(),
            &domain.active_tensor(1),
            &domain.accessible_tensor(1),
            &domain.periodicity(),
        )
    }

    /// 对角元
    pub fn diagonal(&self) -> &[S] {
        &self.diagonal
    }

    /// 对单元 `cell` 的每个最终非对角元调用 `f(col, value)`
    ///
    /// 同一轴上下两侧折回到同一列时以后写入的非零值为准，自引用交给对角。
    fn for_each_off_diagonal(&self, cell: usize, mut f: impl FnMut(usize, S)) {
        self.geometry.visit_row(cell, |entries| {
            let upper = entries.upper.filter(|&(c, v)| c != cell && v != S::ZERO);
            let lower = entries.lower.filter(|&(c, v)| c != cell && v != S::ZERO);
            match (upper, lower) {
                (Some((cu, _)), Some((cl, vl))) if cu == cl => f(cl, vl),
                _ => {
                    if let Some((c, v)) = upper {
                        f(c, v);
                    }
                    if let Some((c, v)) = lower {
                        f(c, v);
                    }
                }
            }
        });
    }
}

impl<S: RuntimeScalar> LinearOperator<S> for LaplaceStencil<S> {
    fn size(&self) -> usize {
        self.diagonal.len()
    }

    fn apply(&self, x: &[S], y: &mut [S]) {
        assert_eq!(x.len(), self.size(), "x 长度必须等于算子维数");
        assert_eq!(y.len(), self.size(), "y 长度必须等于算子维数");
        for cell in 0..self.size() {
            let mut sum = self.diagonal[cell] * x[cell];
            self.for_each_off_diagonal(cell, |col, v| sum += v * x[col]);
            y[cell] = sum;
        }
    }

    fn apply_transpose(&self, x: &[S], y: &mut [S]) {
        assert_eq!(x.len(), self.size(), "x 长度必须等于算子维数");
        assert_eq!(y.len(), self.size(), "y 长度必须等于算子维数");
        for (cell, &d) in self.diagonal.iter().enumerate() {
            y[cell] = d * x[cell];
        }
        for cell in 0..self.size() {
            let xc = x[cell];
            self.for_each_off_diagonal(cell, |col, v| y[col] += v * xc);
        }
    }
}

// =============================================================================
// 残差
// =============================================================================

/// 整批最大残差 `max |A p - b|`
///
/// `pressure` 与 `divergence` 为 `(batch, N)` 扁平布局。
pub fn max_residual<S: RuntimeScalar>(
    op: &dyn LinearOperator<S>,
    pressure: &[S],
    divergence: &[S],
) -> PressureResult<S> {
    check_len("pressure", divergence.len(), pressure.len())?;
    let n = op.size();
    if n == 0 || divergence.len() % n != 0 {
        return Err(PressureError::ShapeMismatch {
            name: "divergence",
            expected: vec![n],
            actual: vec![divergence.len()],
        });
    }
    let mut ap = vec![S::ZERO; pressure.len()];
    op.apply_batched(pressure, &mut ap);
    Ok(ap
        .iter()
        .zip(divergence)
        .fold(S::ZERO, |m, (&a, &b)| m.max((a - b).abs())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MaskMode;
    use pf_config::BoundaryMode;

    fn open_domain(res: &[usize]) -> FluidDomain<f64> {
        FluidDomain::uniform(res.to_vec(), BoundaryMode::Open).unwrap()
    }

    #[test]
    fn test_open_2x2_matrix() {
        let a = domain_pressure_matrix(&open_domain(&[2, 2])).unwrap();
        let dense = a.to_csr().to_dense();
        // 开放边界：每个单元四个可达邻居
        for i in 0..4 {
            assert_eq!(dense[i][i], -4.0);
        }
        assert_eq!(dense[0][1], 1.0);
        assert_eq!(dense[0][2], 1.0);
        assert_eq!(dense[0][3], 0.0);
    }

    #[test]
    fn test_closed_1d_diagonal_and_clamp() {
        let domain = FluidDomain::<f64>::uniform(vec![3], BoundaryMode::Closed).unwrap();
        let a = domain_pressure_matrix(&domain).unwrap();
        assert_eq!(a.get(0, 0), -1.0);
        assert_eq!(a.get(1, 1), -2.0);
        assert_eq!(a.get(2, 2), -1.0);

        // 单个封闭单元：对角 0 截断为 -1
        let single = FluidDomain::<f64>::uniform(vec![1], BoundaryMode::Closed).unwrap();
        let a = domain_pressure_matrix(&single).unwrap();
        assert_eq!(a.nnz(), 1);
        assert_eq!(a.get(0, 0), -1.0);
    }

    #[test]
    fn test_periodic_wrap_and_self_reference() {
        let domain = FluidDomain::<f64>::uniform(vec![1, 4], BoundaryMode::Periodic).unwrap();
        let a = domain_pressure_matrix(&domain).unwrap();
        // 轴 1 折回
        assert_eq!(a.get(0, 3), 1.0);
        assert_eq!(a.get(3, 0), 1.0);
        // 长度 1 的轴只产生自引用，被对角覆盖
        assert_eq!(a.get(0, 0), -4.0);
        assert_eq!(a.off_diagonal_count(0), 2);
    }

    #[test]
    fn test_inactive_cells_have_no_coupling() {
        let active = Mask::from_values(&[3], vec![1.0, 0.0, 1.0], MaskMode::Binary).unwrap();
        let domain = FluidDomain::uniform(vec![3], BoundaryMode::Open)
            .unwrap()
            .with_active(active)
            .unwrap();
        let a = domain_pressure_matrix(&domain).unwrap();
        assert_eq!(a.get(0, 1), 0.0);
        assert_eq!(a.get(1, 2), 0.0);
        assert_eq!(a.nnz(), 3);
    }

    #[test]
    fn test_shape_errors() {
        let good = Mask::filled(&[4, 4], 1.0f64);
        let bad = Mask::filled(&[4, 3], 1.0f64);
        let p = Periodicity::none(2);
        assert!(matches!(
            sparse_pressure_matrix(&[2, 2], &bad, &good, &p),
            Err(PressureError::ShapeMismatch { name: "extended_active", .. })
        ));
        assert!(matches!(
            sparse_pressure_matrix(&[2, 2], &good, &good, &Periodicity::none(3)),
            Err(PressureError::ShapeMismatch { name: "periodicity", .. })
        ));
        assert!(matches!(
            sparse_pressure_matrix::<f64>(&[], &good, &good, &p),
            Err(PressureError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_stencil_matches_matrix() {
        let domain = FluidDomain::<f64>::new(
            vec![3, 2],
            vec![
                [BoundaryMode::Periodic, BoundaryMode::Periodic],
                [BoundaryMode::Closed, BoundaryMode::Periodic],
            ],
        )
        .unwrap()
        .with_obstacle(&[1, 0], &[2, 1])
        .unwrap();

        let matrix = domain_pressure_matrix(&domain).unwrap();
        let stencil = LaplaceStencil::from_domain(&domain).unwrap();
        let x: Vec<f64> = (0..6).map(|i| (i as f64 * 1.3).cos()).collect();
        let (mut ym, mut ys) = (vec![0.0; 6], vec![0.0; 6]);

        matrix.apply(&x, &mut ym);
        stencil.apply(&x, &mut ys);
        assert!(ym.iter().zip(&ys).all(|(a, b)| (a - b).abs() < 1e-12));

        matrix.apply_transpose(&x, &mut ym);
        stencil.apply_transpose(&x, &mut ys);
        assert!(ym.iter().zip(&ys).all(|(a, b)| (a - b).abs() < 1e-12));
    }

    #[test]
    fn test_windows_and_neighbor_ids() {
        let ext = ArrayD::from_shape_vec(IxDyn(&[3, 4]), (0..12).collect::<Vec<i32>>()).unwrap();
        // 内部 1×2：中心为 (1,1)(1,2)
        assert_eq!(window(&ext, 0, 1).iter().copied().collect::<Vec<_>>(), vec![5, 6]);
        assert_eq!(window(&ext, 0, 0).iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(window(&ext, 1, 2).iter().copied().collect::<Vec<_>>(), vec![6, 7]);

        // 只有下侧周期：左幽灵折回到末单元，右幽灵为空
        let p = Periodicity::from_flags(vec![[true, false]]);
        let ids = neighbor_ids(&[3], &p).unwrap();
        assert_eq!(ids.iter().copied().collect::<Vec<_>>(), vec![Some(2), Some(0), Some(1), Some(2), None]);
    }

    #[test]
    fn test_max_residual() {
        let a = domain_pressure_matrix(&open_domain(&[2])).unwrap();
        // A = [[-2, 1], [1, -2]]
        let r = max_residual(&a, &[1.0, 0.0, 0.0, 0.0], &[-2.0, 1.5, 0.0, 0.0]).unwrap();
        assert!((r - 0.5).abs() < 1e-12);
        assert!(max_residual(&a, &[1.0], &[1.0, 0.0]).is_err());
    }
}
