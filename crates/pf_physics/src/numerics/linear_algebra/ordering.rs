// crates/pf_physics/src/numerics/linear_algebra/ordering.rs

//! 稀疏矩阵重排序
//!
//! 逆 Cuthill-McKee（RCM）：在对称化的非零结构图上，从伪外围顶点出发做
//! 按度数升序的广度优先遍历，最后整体反转。每个连通分量单独编号。
//! 重排后矩阵的带宽与轮廓变小，LU 填充被限制在带内。

use std::collections::VecDeque;

use pf_runtime::RuntimeScalar;

use super::csr::CsrMatrix;

/// 置换：`order[new] = old`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    order: Vec<usize>,
    inverse: Vec<usize>,
}

impl Permutation {
    /// 恒等置换
    pub fn identity(n: usize) -> Self {
        Self { order: (0..n).collect(), inverse: (0..n).collect() }
    }

    /// 由 `order[new] = old` 创建
    ///
    /// # Panics
    /// `order` 不是 `0..n` 的排列时
    pub fn from_order(order: Vec<usize>) -> Self {
        let n = order.len();
        let mut inverse = vec![usize::MAX; n];
        for (new, &old) in order.iter().enumerate() {
            assert!(old < n && inverse[old] == usize::MAX, "order 必须是 0..n 的排列");
            inverse[old] = new;
        }
        Self { order, inverse }
    }

    /// 维数
    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// 新编号序列（`order[new] = old`）
    #[inline]
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// 旧编号 → 新编号
    #[inline]
    pub fn new_index(&self, old: usize) -> usize {
        self.inverse[old]
    }

    /// 是否为恒等置换
    pub fn is_identity(&self) -> bool {
        self.order.iter().enumerate().all(|(i, &o)| i == o)
    }

    /// `out[new] = x[old]`
    pub fn gather<T: Copy>(&self, x: &[T], out: &mut [T]) {
        debug_assert_eq!(x.len(), self.len());
        for (o, &old) in out.iter_mut().zip(&self.order) {
            *o = x[old];
        }
    }

    /// `out[old] = x[new]`
    pub fn scatter<T: Copy>(&self, x: &[T], out: &mut [T]) {
        debug_assert_eq!(x.len(), self.len());
        for (&v, &old) in x.iter().zip(&self.order) {
            out[old] = v;
        }
    }

    /// 对称重排 `P A Pᵀ`
    ///
    /// # Panics
    /// 非方阵或维数不等于置换长度时
    pub fn permute_symmetric<S: RuntimeScalar>(&self, a: &CsrMatrix<S>) -> CsrMatrix<S> {
        assert_eq!(a.n_rows(), a.n_cols(), "只能对方阵做对称重排");
        assert_eq!(a.n_rows(), self.len(), "置换维数必须等于矩阵维数");

        let mut row_ptr = Vec::with_capacity(self.len() + 1);
        let mut col_idx = Vec::with_capacity(a.nnz());
        let mut values = Vec::with_capacity(a.nnz());
        let mut entries: Vec<(usize, S)> = Vec::new();

        row_ptr.push(0);
        for &old in &self.order {
            entries.clear();
            entries.extend(a.row(old).iter().map(|(c, v)| (self.inverse[c], v)));
            entries.sort_unstable_by_key(|&(c, _)| c);
            for &(c, v) in &entries {
                col_idx.push(c);
                values.push(v);
            }
            row_ptr.push(col_idx.len());
        }

        CsrMatrix::from_raw(self.len(), self.len(), row_ptr, col_idx, values)
    }
}

/// 矩阵带宽 `max |i - j|`（只看存储的非零元）
pub fn bandwidth<S: RuntimeScalar>(a: &CsrMatrix<S>) -> usize {
    (0..a.n_rows())
        .flat_map(|i| a.row(i).col_indices().iter().map(move |&j| i.abs_diff(j)))
        .max()
        .unwrap_or(0)
}

/// 对称化邻接表（不含自环，邻居按编号升序）
fn adjacency<S: RuntimeScalar>(a: &CsrMatrix<S>) -> Vec<Vec<usize>> {
    let n = a.n_rows();
    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        for (j, v) in a.row(i).iter() {
            if i != j && j < n && v != S::ZERO {
                neighbors[i].push(j);
                neighbors[j].push(i);
            }
        }
    }
    for list in &mut neighbors {
        list.sort_unstable();
        list.dedup();
    }
    neighbors
}

/// 从 `start` 出发在未编号顶点上做一次广度优先遍历，返回最后一层中度数最小的顶点
fn peripheral_vertex(neighbors: &[Vec<usize>], numbered: &[bool], start: usize, level: &mut [usize]) -> usize {
    let mut queue = VecDeque::from([start]);
    let mut seen = vec![start];
    level[start] = 0;
    let mut last = start;

    while let Some(v) = queue.pop_front() {
        let better = level[v] > level[last]
            || (level[v] == level[last] && neighbors[v].len() < neighbors[last].len());
        if better {
            last = v;
        }
        for &w in &neighbors[v] {
            if !numbered[w] && level[w] == usize::MAX {
                level[w] = level[v] + 1;
                seen.push(w);
                queue.push_back(w);
            }
        }
    }

    for v in seen {
        level[v] = usize::MAX;
    }
    last
}

/// 逆 Cuthill-McKee 排序
///
/// 只使用非零结构；非对称结构先对称化。
pub fn reverse_cuthill_mckee<S: RuntimeScalar>(a: &CsrMatrix<S>) -> Permutation {
    let n = a.n_rows();
    let neighbors = adjacency(a);
    let degree = |v: usize| neighbors[v].len();

    let mut seeds: Vec<usize> = (0..n).collect();
    seeds.sort_by_key(|&v| degree(v));

    let mut numbered = vec![false; n];
    let mut level = vec![usize::MAX; n];
    let mut order = Vec::with_capacity(n);
    let mut queue = VecDeque::new();
    let mut next: Vec<usize> = Vec::new();

    for seed in seeds {
        if numbered[seed] {
            continue;
        }
        let start = peripheral_vertex(&neighbors, &numbered, seed, &mut level);

        numbered[start] = true;
        queue.push_back(start);
        while let Some(v) = queue.pop_front() {
            order.push(v);
            next.clear();
            next.extend(neighbors[v].iter().copied().filter(|&w| !numbered[w]));
            next.sort_by_key(|&w| degree(w));
            for &w in &next {
                numbered[w] = true;
                queue.push_back(w);
            }
        }
    }

    order.reverse();
    Permutation::from_order(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::linear_algebra::CsrBuilder;

    /// 周期一维环：自然编号下首尾相连，带宽 n-1
    fn ring(n: usize) -> CsrMatrix<f64> {
        let mut b = CsrBuilder::new_square(n);
        for i in 0..n {
            b.set(i, i, -2.0);
            b.set(i, (i + 1) % n, 1.0);
            b.set(i, (i + n - 1) % n, 1.0);
        }
        b.build()
    }

    #[test]
    fn test_permutation_roundtrip() {
        let p = Permutation::from_order(vec![2, 0, 1]);
        assert_eq!(p.new_index(2), 0);
        let x = [10.0, 20.0, 30.0];
        let mut y = [0.0; 3];
        p.gather(&x, &mut y);
        assert_eq!(y, [30.0, 10.0, 20.0]);
        let mut z = [0.0; 3];
        p.scatter(&y, &mut z);
        assert_eq!(z, x);
        assert!(Permutation::identity(4).is_identity());
    }

    #[test]
    #[should_panic]
    fn test_invalid_order_panics() {
        Permutation::from_order(vec![0, 0, 1]);
    }

    #[test]
    fn test_rcm_reduces_ring_bandwidth() {
        let a = ring(12);
        assert_eq!(bandwidth(&a), 11);
        let p = reverse_cuthill_mckee(&a);
        assert_eq!(p.len(), 12);
        let pa = p.permute_symmetric(&a);
        assert!(bandwidth(&pa) <= 2);
        assert!(pa.is_symmetric(0.0));
        assert_eq!(pa.nnz(), a.nnz());
    }

    #[test]
    fn test_permuted_product_matches() {
        let a = ring(7);
        let p = reverse_cuthill_mckee(&a);
        let pa = p.permute_symmetric(&a);
        let x: Vec<f64> = (0..7).map(|i| (i as f64).sin()).collect();

        let mut ax = vec![0.0; 7];
        a.mul_vec(&x, &mut ax);

        let mut px = vec![0.0; 7];
        p.gather(&x, &mut px);
        let mut pax = vec![0.0; 7];
        pa.mul_vec(&px, &mut pax);
        let mut back = vec![0.0; 7];
        p.scatter(&pax, &mut back);

        assert!(ax.iter().zip(&back).all(|(u, v)| (u - v).abs() < 1e-14));
    }

    #[test]
    fn test_disconnected_components_all_numbered() {
        // 0-1 相连，2 孤立，3-4 相连
        let mut b = CsrBuilder::new_square(5);
        for i in 0..5 {
            b.set(i, i, -1.0);
        }
        b.set(0, 1, 1.0);
        b.set(1, 0, 1.0);
        b.set(3, 4, 1.0);
        b.set(4, 3, 1.0);
        let p = reverse_cuthill_mckee(&b.build());
        let mut seen = p.order().to_vec();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }
}
