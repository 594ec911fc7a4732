//! Matrix-free curl-curl diffusion operator.
//!
//! Finite-integration discretization of `A(ω) E = ∇×∇×E - iωμ₀σE` on the
//! staggered grid: electric-field edges are the primary unknowns, the curl of
//! E lives on faces, and the second curl maps faces back onto edges through
//! the dual (node-centred) widths. The anisotropic mass term projects each
//! principal-axis conductivity onto edges by volume-weighted averaging of the
//! four surrounding cells.
//!
//! Tangential boundary edges carry the PEC Dirichlet condition: the operator
//! acts as the identity there, so the assembled system stays non-singular and
//! the diagonal never vanishes, including in the ω = 0 magnetostatic limit
//! where the interior curl-curl diagonal is strictly positive.

use num_complex::Complex64;
use rayon::prelude::*;

use crate::MU_0;
use crate::core::traits::LinearOperator;
use crate::error::EmError;
use crate::field::Field;
use crate::mesh::{Axis, TensorGrid};
use crate::model::Model;

/// Matrix-free application of the discretized diffusion operator.
#[derive(Debug, Clone)]
pub struct CurlCurlOperator {
    grid: TensorGrid,
    omega: f64,
    /// Mass scaling `s = -iωμ₀`; the operator is `∇×∇× + sσ`.
    s: Complex64,
    /// Edge-averaged conductivity per component (zero on boundary edges).
    sigma_edge: [Vec<f64>; 3],
}

impl CurlCurlOperator {
    /// Precompute edge conductivities for a grid/model pair at angular
    /// frequency `omega` [rad/s].
    pub fn new(grid: &TensorGrid, model: &Model, omega: f64) -> Result<Self, EmError> {
        if model.shape() != grid.shape() {
            return Err(EmError::ShapeMismatch {
                got: model.shape(),
                expected: grid.shape(),
            });
        }
        let sigma_edge = std::array::from_fn(|d| average_edge_sigma(grid, model, Axis::ALL[d]));
        Ok(Self {
            grid: grid.clone(),
            omega,
            s: Complex64::new(0.0, -omega * MU_0),
            sigma_edge,
        })
    }

    pub fn grid(&self) -> &TensorGrid {
        &self.grid
    }

    pub fn omega(&self) -> f64 {
        self.omega
    }

    /// Mass scaling `-iωμ₀` applied to the conductivity term (and, with
    /// opposite sign conventions folded in, to the source current).
    pub fn mass_scale(&self) -> Complex64 {
        self.s
    }

    #[inline]
    fn h(&self, axis: Axis) -> &[f64] {
        self.grid.widths(axis)
    }

    // Face curls of e. Argument names follow the staggering: `ic/jc/kc` are
    // cell indices, `inn/jn/kn` node indices.

    /// z-face curl at (cell ic, cell jc, node kn).
    #[inline]
    fn cz(&self, e: &Field, ic: usize, jc: usize, kn: usize) -> Complex64 {
        (e.get(Axis::Y, ic + 1, jc, kn) - e.get(Axis::Y, ic, jc, kn)) / self.h(Axis::X)[ic]
            - (e.get(Axis::X, ic, jc + 1, kn) - e.get(Axis::X, ic, jc, kn)) / self.h(Axis::Y)[jc]
    }

    /// y-face curl at (cell ic, node jn, cell kc).
    #[inline]
    fn cy(&self, e: &Field, ic: usize, jn: usize, kc: usize) -> Complex64 {
        (e.get(Axis::X, ic, jn, kc + 1) - e.get(Axis::X, ic, jn, kc)) / self.h(Axis::Z)[kc]
            - (e.get(Axis::Z, ic + 1, jn, kc) - e.get(Axis::Z, ic, jn, kc)) / self.h(Axis::X)[ic]
    }

    /// x-face curl at (node inn, cell jc, cell kc).
    #[inline]
    fn cx(&self, e: &Field, inn: usize, jc: usize, kc: usize) -> Complex64 {
        (e.get(Axis::Z, inn, jc + 1, kc) - e.get(Axis::Z, inn, jc, kc)) / self.h(Axis::Y)[jc]
            - (e.get(Axis::Y, inn, jc, kc + 1) - e.get(Axis::Y, inn, jc, kc)) / self.h(Axis::Z)[kc]
    }

    /// Operator action on the interior x-edge (cell i, node j, node k).
    #[inline]
    pub(crate) fn apply_x_at(&self, e: &Field, i: usize, j: usize, k: usize) -> Complex64 {
        let dy = self.grid.dual_width(Axis::Y, j);
        let dz = self.grid.dual_width(Axis::Z, k);
        let curl = (self.cz(e, i, j, k) - self.cz(e, i, j - 1, k)) / dy
            - (self.cy(e, i, j, k) - self.cy(e, i, j, k - 1)) / dz;
        let idx = self.grid.edge_index(Axis::X, i, j, k);
        curl + self.s * self.sigma_edge[0][idx] * e.get(Axis::X, i, j, k)
    }

    /// Operator action on the interior y-edge (node i, cell j, node k).
    #[inline]
    pub(crate) fn apply_y_at(&self, e: &Field, i: usize, j: usize, k: usize) -> Complex64 {
        let dz = self.grid.dual_width(Axis::Z, k);
        let dx = self.grid.dual_width(Axis::X, i);
        let curl = (self.cx(e, i, j, k) - self.cx(e, i, j, k - 1)) / dz
            - (self.cz(e, i, j, k) - self.cz(e, i - 1, j, k)) / dx;
        let idx = self.grid.edge_index(Axis::Y, i, j, k);
        curl + self.s * self.sigma_edge[1][idx] * e.get(Axis::Y, i, j, k)
    }

    /// Operator action on the interior z-edge (node i, node j, cell k).
    #[inline]
    pub(crate) fn apply_z_at(&self, e: &Field, i: usize, j: usize, k: usize) -> Complex64 {
        let dx = self.grid.dual_width(Axis::X, i);
        let dy = self.grid.dual_width(Axis::Y, j);
        let curl = (self.cy(e, i, j, k) - self.cy(e, i - 1, j, k)) / dx
            - (self.cx(e, i, j, k) - self.cx(e, i, j - 1, k)) / dy;
        let idx = self.grid.edge_index(Axis::Z, i, j, k);
        curl + self.s * self.sigma_edge[2][idx] * e.get(Axis::Z, i, j, k)
    }

    #[inline]
    pub(crate) fn apply_at(&self, comp: Axis, e: &Field, i: usize, j: usize, k: usize) -> Complex64 {
        match comp {
            Axis::X => self.apply_x_at(e, i, j, k),
            Axis::Y => self.apply_y_at(e, i, j, k),
            Axis::Z => self.apply_z_at(e, i, j, k),
        }
    }

    /// Diagonal entry for an interior edge of component `comp`.
    #[inline]
    pub(crate) fn diag_at(&self, comp: Axis, i: usize, j: usize, k: usize) -> Complex64 {
        let idx = [i, j, k];
        let [t0, t1] = comp.others();
        let mut d = 0.0;
        for t in [t0, t1] {
            let m = idx[t.index()];
            let h = self.h(t);
            let dual = self.grid.dual_width(t, m);
            d += (1.0 / h[m - 1] + 1.0 / h[m]) / dual;
        }
        let flat = self.grid.edge_index(comp, i, j, k);
        Complex64::new(d, 0.0) + self.s * self.sigma_edge[comp.index()][flat]
    }

    /// Tridiagonal couplings of component `comp` along direction `dir` at
    /// position `m` on the line: `(lower, upper)` multiply the `m-1` and
    /// `m+1` neighbours of the same component.
    #[inline]
    pub(crate) fn line_coupling(&self, dir: Axis, m: usize) -> (f64, f64) {
        let h = self.h(dir);
        let dual = self.grid.dual_width(dir, m);
        (-1.0 / (h[m - 1] * dual), -1.0 / (h[m] * dual))
    }

    /// y = A x. Boundary edges pass through unchanged (identity rows).
    pub fn apply(&self, x: &Field, y: &mut Field) {
        for &comp in &Axis::ALL {
            let s = self.grid.edge_shape(comp);
            let slab = s[1] * s[2];
            let interior = interior_ranges(comp, s);
            y.component_mut(comp)
                .par_chunks_mut(slab)
                .enumerate()
                .for_each(|(i, out)| {
                    for j in 0..s[1] {
                        for k in 0..s[2] {
                            let flat = j * s[2] + k;
                            out[flat] = if in_interior(&interior, i, j, k) {
                                self.apply_at(comp, x, i, j, k)
                            } else {
                                x.get(comp, i, j, k)
                            };
                        }
                    }
                });
        }
    }

    /// out = rhs - A x, fused.
    pub fn residual(&self, rhs: &Field, x: &Field, out: &mut Field) {
        for &comp in &Axis::ALL {
            let s = self.grid.edge_shape(comp);
            let slab = s[1] * s[2];
            let interior = interior_ranges(comp, s);
            out.component_mut(comp)
                .par_chunks_mut(slab)
                .enumerate()
                .for_each(|(i, out)| {
                    for j in 0..s[1] {
                        for k in 0..s[2] {
                            let flat = j * s[2] + k;
                            let ax = if in_interior(&interior, i, j, k) {
                                self.apply_at(comp, x, i, j, k)
                            } else {
                                x.get(comp, i, j, k)
                            };
                            out[flat] = rhs.get(comp, i, j, k) - ax;
                        }
                    }
                });
        }
    }

    /// Field-shaped operator diagonal; identity on boundary edges.
    pub fn diagonal(&self) -> Field {
        let mut diag = Field::zeros(&self.grid);
        for &comp in &Axis::ALL {
            let s = self.grid.edge_shape(comp);
            let slab = s[1] * s[2];
            let interior = interior_ranges(comp, s);
            diag.component_mut(comp)
                .par_chunks_mut(slab)
                .enumerate()
                .for_each(|(i, out)| {
                    for j in 0..s[1] {
                        for k in 0..s[2] {
                            let flat = j * s[2] + k;
                            out[flat] = if in_interior(&interior, i, j, k) {
                                self.diag_at(comp, i, j, k)
                            } else {
                                Complex64::new(1.0, 0.0)
                            };
                        }
                    }
                });
        }
        diag
    }
}

impl LinearOperator for CurlCurlOperator {
    fn apply(&self, x: &Field, y: &mut Field) {
        CurlCurlOperator::apply(self, x, y);
    }

    fn diagonal(&self) -> Field {
        CurlCurlOperator::diagonal(self)
    }

    fn residual_into(&self, rhs: &Field, x: &Field, out: &mut Field) {
        CurlCurlOperator::residual(self, rhs, x, out);
    }
}

/// Interior index ranges `[lo, hi)` per coordinate for a component: full
/// range along the component's own axis, node interiors transversely.
#[inline]
pub(crate) fn interior_ranges(comp: Axis, shape: [usize; 3]) -> [(usize, usize); 3] {
    let mut r = [(0, 0); 3];
    for d in 0..3 {
        r[d] = if Axis::ALL[d] == comp {
            (0, shape[d])
        } else {
            (1, shape[d] - 1)
        };
    }
    r
}

#[inline]
fn in_interior(r: &[(usize, usize); 3], i: usize, j: usize, k: usize) -> bool {
    let idx = [i, j, k];
    (0..3).all(|d| idx[d] >= r[d].0 && idx[d] < r[d].1)
}

/// Volume-weighted conductivity average over the four cells sharing each
/// interior edge; boundary edges are left at zero (they are Dirichlet-fixed).
fn average_edge_sigma(grid: &TensorGrid, model: &Model, comp: Axis) -> Vec<f64> {
    let s = grid.edge_shape(comp);
    let mut out = vec![0.0; s.iter().product()];
    let r = interior_ranges(comp, s);
    for i in r[0].0..r[0].1 {
        for j in r[1].0..r[1].1 {
            for k in r[2].0..r[2].1 {
                // Cell block adjacent to the edge: the edge's own axis pins
                // one cell, each transverse node is shared by two cells.
                let idx = [i, j, k];
                let mut lo = [0usize; 3];
                let mut len = [1usize; 3];
                for d in 0..3 {
                    if Axis::ALL[d] == comp {
                        lo[d] = idx[d];
                    } else {
                        lo[d] = idx[d] - 1;
                        len[d] = 2;
                    }
                }
                let mut num = 0.0;
                let mut den = 0.0;
                for ci in lo[0]..lo[0] + len[0] {
                    for cj in lo[1]..lo[1] + len[1] {
                        for ck in lo[2]..lo[2] + len[2] {
                            let v = grid.cell_volume(ci, cj, ck);
                            num += v * model.sigma_at(comp, ci, cj, ck);
                            den += v;
                        }
                    }
                }
                out[grid.edge_index(comp, i, j, k)] = num / den;
            }
        }
    }
    out
}
