//! Edge-aware restriction and prolongation between grid levels.
//!
//! Transfers preserve the staggered-grid semantics: edge values map to edge
//! values. Restriction is a weight-normalized full weighting: a width-
//! weighted average along the edge direction over the merged fine cells, and
//! 1–½ transverse node weights clamped at the boundary. Prolongation
//! interpolates bilinearly across the two transverse axes and piecewise-
//! constantly along the edge direction, adding the result into the fine
//! field. Both operators reproduce constant fields exactly (partition of
//! unity), which `tests/transfer_properties.rs` checks on every level.

use rayon::prelude::*;

use num_complex::Complex64;
use num_traits::Zero;

use crate::field::Field;
use crate::mesh::{Axis, TensorGrid};

/// Weighted index stencil: `(source index, weight)` pairs.
type Stencil = Vec<(usize, f64)>;

/// Precomputed transfer operators for one fine/coarse level pair.
#[derive(Debug, Clone)]
pub struct GridTransfer {
    fine_shape: [usize; 3],
    coarse_shape: [usize; 3],
    /// Restriction: coarse cell -> width-weighted fine cells (per axis).
    cell_restrict: [Vec<Stencil>; 3],
    /// Restriction: coarse node -> weighted fine nodes (per axis).
    node_restrict: [Vec<Stencil>; 3],
    /// Prolongation: fine cell -> containing coarse cell (per axis).
    cell_prolong: [Vec<Stencil>; 3],
    /// Prolongation: fine node -> linear coarse-node weights (per axis).
    node_prolong: [Vec<Stencil>; 3],
}

impl GridTransfer {
    /// Build the operators for a level pair produced by
    /// [`TensorGrid::coarsen`].
    pub fn new(fine: &TensorGrid, coarse: &TensorGrid) -> Self {
        let fs = fine.shape();
        let cs = coarse.shape();
        let coarsened = [fs[0] != cs[0], fs[1] != cs[1], fs[2] != cs[2]];

        let cell_restrict = std::array::from_fn(|d| {
            let axis = Axis::ALL[d];
            let widths = fine.widths(axis);
            (0..cs[d])
                .map(|ic| {
                    let (start, len) = TensorGrid::fine_cells_of(fs[d], coarsened[d], ic);
                    let total: f64 = widths[start..start + len].iter().sum();
                    (start..start + len)
                        .map(|i| (i, widths[i] / total))
                        .collect()
                })
                .collect()
        });

        let node_restrict = std::array::from_fn(|d| {
            let n_fine = fs[d];
            (0..=cs[d])
                .map(|jc| {
                    if !coarsened[d] {
                        return vec![(jc, 1.0)];
                    }
                    let m = TensorGrid::fine_node_of(n_fine, coarsened[d], jc);
                    let mut st: Stencil = Vec::with_capacity(3);
                    if m > 0 {
                        st.push((m - 1, 0.5));
                    }
                    st.push((m, 1.0));
                    if m < n_fine {
                        st.push((m + 1, 0.5));
                    }
                    let total: f64 = st.iter().map(|&(_, w)| w).sum();
                    st.iter_mut().for_each(|e| e.1 /= total);
                    st
                })
                .collect()
        });

        let cell_prolong = std::array::from_fn(|d| {
            let mut map = vec![0usize; fs[d]];
            for ic in 0..cs[d] {
                let (start, len) = TensorGrid::fine_cells_of(fs[d], coarsened[d], ic);
                for i in start..start + len {
                    map[i] = ic;
                }
            }
            map.into_iter().map(|ic| vec![(ic, 1.0)]).collect()
        });

        let node_prolong = std::array::from_fn(|d| {
            let axis = Axis::ALL[d];
            let fine_nodes = fine.nodes(axis);
            let coarse_nodes = coarse.nodes(axis);
            fine_nodes
                .iter()
                .map(|&p| {
                    let (j, lam) = bracket(coarse_nodes, p);
                    let mut st: Stencil = Vec::with_capacity(2);
                    if lam < 1.0 {
                        st.push((j, 1.0 - lam));
                    }
                    if lam > 0.0 {
                        st.push((j + 1, lam));
                    }
                    st
                })
                .collect()
        });

        Self {
            fine_shape: fs,
            coarse_shape: cs,
            cell_restrict,
            node_restrict,
            cell_prolong,
            node_prolong,
        }
    }

    pub fn fine_shape(&self) -> [usize; 3] {
        self.fine_shape
    }

    pub fn coarse_shape(&self) -> [usize; 3] {
        self.coarse_shape
    }

    /// Map a fine residual onto the coarse grid (overwrites `coarse`).
    pub fn restrict(&self, fine: &Field, coarse: &mut Field) {
        for &comp in &Axis::ALL {
            let cshape = coarse.shape(comp);
            let slab = cshape[1] * cshape[2];
            let stencils: [&[Stencil]; 3] = std::array::from_fn(|d| {
                if Axis::ALL[d] == comp {
                    self.cell_restrict[d].as_slice()
                } else {
                    self.node_restrict[d].as_slice()
                }
            });
            coarse
                .component_mut(comp)
                .par_chunks_mut(slab)
                .enumerate()
                .for_each(|(ic, out)| {
                    for jc in 0..cshape[1] {
                        for kc in 0..cshape[2] {
                            let mut acc = Complex64::zero();
                            for &(fi, wi) in &stencils[0][ic] {
                                for &(fj, wj) in &stencils[1][jc] {
                                    for &(fk, wk) in &stencils[2][kc] {
                                        acc += wi * wj * wk * fine.get(comp, fi, fj, fk);
                                    }
                                }
                            }
                            out[jc * cshape[2] + kc] = acc;
                        }
                    }
                });
        }
    }

    /// Interpolate a coarse correction and add it into the fine field.
    pub fn prolong_add(&self, coarse: &Field, fine: &mut Field) {
        for &comp in &Axis::ALL {
            let fshape = fine.shape(comp);
            let slab = fshape[1] * fshape[2];
            let stencils: [&[Stencil]; 3] = std::array::from_fn(|d| {
                if Axis::ALL[d] == comp {
                    self.cell_prolong[d].as_slice()
                } else {
                    self.node_prolong[d].as_slice()
                }
            });
            fine.component_mut(comp)
                .par_chunks_mut(slab)
                .enumerate()
                .for_each(|(i, out)| {
                    for j in 0..fshape[1] {
                        for k in 0..fshape[2] {
                            let mut acc = Complex64::zero();
                            for &(ci, wi) in &stencils[0][i] {
                                for &(cj, wj) in &stencils[1][j] {
                                    for &(ck, wk) in &stencils[2][k] {
                                        acc += wi * wj * wk * coarse.get(comp, ci, cj, ck);
                                    }
                                }
                            }
                            out[j * fshape[2] + k] += acc;
                        }
                    }
                });
        }
    }
}

/// Bracketing interval and weight in a sorted node vector (clamped).
fn bracket(nodes: &[f64], p: f64) -> (usize, f64) {
    let n = nodes.len();
    let mut i = nodes.partition_point(|&c| c <= p);
    i = i.clamp(1, n - 1);
    let lam = ((p - nodes[i - 1]) / (nodes[i] - nodes[i - 1])).clamp(0.0, 1.0);
    (i - 1, lam)
}
