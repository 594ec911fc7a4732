//! Complex edge fields on a staggered grid.
//!
//! A [`Field`] holds one complex array per edge orientation, shaped per the
//! grid's edge tuples. It represents the electric field or a source current
//! density. Norms and dot products reduce over fixed-size chunks in parallel
//! and accumulate the partial sums in order, so repeated evaluations are
//! bit-for-bit reproducible.

use num_complex::Complex64;
use num_traits::Zero;
use rayon::prelude::*;

use crate::error::EmError;
use crate::mesh::{Axis, TensorGrid};

const REDUCE_CHUNK: usize = 4096;

/// Three complex edge-component arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    shapes: [[usize; 3]; 3],
    comps: [Vec<Complex64>; 3],
}

impl Field {
    /// Zero field with the grid's edge shapes.
    pub fn zeros(grid: &TensorGrid) -> Self {
        let shapes = [
            grid.edge_shape(Axis::X),
            grid.edge_shape(Axis::Y),
            grid.edge_shape(Axis::Z),
        ];
        let comps = std::array::from_fn(|d| vec![Complex64::zero(); shapes[d].iter().product()]);
        Self { shapes, comps }
    }

    /// Constant field (every edge of every component set to `value`).
    pub fn constant(grid: &TensorGrid, value: Complex64) -> Self {
        let mut f = Self::zeros(grid);
        f.fill(value);
        f
    }

    /// Unit source on the interior edge of orientation `comp` closest to
    /// `point`. The minimal in-crate stand-in for external source synthesis.
    pub fn unit_edge_source(grid: &TensorGrid, comp: Axis, point: [f64; 3]) -> Self {
        let mut f = Self::zeros(grid);
        let coords: [Vec<f64>; 3] = std::array::from_fn(|d| {
            let axis = Axis::ALL[d];
            if axis == comp {
                grid.centers(axis)
            } else {
                grid.nodes(axis).to_vec()
            }
        });
        let shape = grid.edge_shape(comp);
        let mut idx = [0usize; 3];
        for d in 0..3 {
            // Transverse coordinates stay off the boundary nodes.
            let (lo, hi) = if Axis::ALL[d] == comp {
                (0, shape[d] - 1)
            } else {
                (1, shape[d] - 2)
            };
            let mut best = lo;
            let mut dist = f64::INFINITY;
            for c in lo..=hi.max(lo) {
                let dd = (coords[d][c] - point[d]).abs();
                if dd < dist {
                    dist = dd;
                    best = c;
                }
            }
            idx[d] = best;
        }
        let flat = grid.edge_index(comp, idx[0], idx[1], idx[2]);
        f.comps[comp.index()][flat] = Complex64::new(1.0, 0.0);
        f
    }

    /// Check this field's edge shapes against a grid.
    pub fn check_shape(&self, grid: &TensorGrid) -> Result<(), EmError> {
        for &c in &Axis::ALL {
            if self.shapes[c.index()] != grid.edge_shape(c) {
                return Err(EmError::FieldShape);
            }
        }
        Ok(())
    }

    #[inline]
    pub fn shape(&self, comp: Axis) -> [usize; 3] {
        self.shapes[comp.index()]
    }

    #[inline]
    pub fn component(&self, comp: Axis) -> &[Complex64] {
        &self.comps[comp.index()]
    }

    #[inline]
    pub fn component_mut(&mut self, comp: Axis) -> &mut [Complex64] {
        &mut self.comps[comp.index()]
    }

    #[inline]
    pub fn index(&self, comp: Axis, i: usize, j: usize, k: usize) -> usize {
        let s = self.shapes[comp.index()];
        (i * s[1] + j) * s[2] + k
    }

    #[inline]
    pub fn get(&self, comp: Axis, i: usize, j: usize, k: usize) -> Complex64 {
        self.comps[comp.index()][self.index(comp, i, j, k)]
    }

    #[inline]
    pub fn set(&mut self, comp: Axis, i: usize, j: usize, k: usize, v: Complex64) {
        let idx = self.index(comp, i, j, k);
        self.comps[comp.index()][idx] = v;
    }

    pub fn fill(&mut self, value: Complex64) {
        for c in &mut self.comps {
            c.fill(value);
        }
    }

    pub fn set_zero(&mut self) {
        self.fill(Complex64::zero());
    }

    /// Force tangential boundary edges to zero (PEC condition).
    pub fn zero_boundary(&mut self) {
        for &comp in &Axis::ALL {
            let s = self.shapes[comp.index()];
            let data = &mut self.comps[comp.index()];
            let [t0, t1] = comp.others();
            for i in 0..s[0] {
                for j in 0..s[1] {
                    for k in 0..s[2] {
                        let idx = [i, j, k];
                        let on_boundary = [t0, t1].iter().any(|t| {
                            let d = t.index();
                            idx[d] == 0 || idx[d] == s[d] - 1
                        });
                        if on_boundary {
                            data[(i * s[1] + j) * s[2] + k] = Complex64::zero();
                        }
                    }
                }
            }
        }
    }

    pub fn copy_from(&mut self, other: &Field) {
        for d in 0..3 {
            self.comps[d].copy_from_slice(&other.comps[d]);
        }
    }

    /// self += alpha * other
    pub fn axpy(&mut self, alpha: Complex64, other: &Field) {
        for d in 0..3 {
            for (s, &o) in self.comps[d].iter_mut().zip(&other.comps[d]) {
                *s += alpha * o;
            }
        }
    }

    pub fn scale(&mut self, alpha: Complex64) {
        for d in 0..3 {
            for v in &mut self.comps[d] {
                *v *= alpha;
            }
        }
    }

    /// self = a - b, component-wise.
    pub fn assign_diff(&mut self, a: &Field, b: &Field) {
        for d in 0..3 {
            for ((s, &x), &y) in self.comps[d].iter_mut().zip(&a.comps[d]).zip(&b.comps[d]) {
                *s = x - y;
            }
        }
    }

    /// Conjugated inner product `⟨self, other⟩ = Σ conj(self)·other`.
    pub fn dot(&self, other: &Field) -> Complex64 {
        let mut acc = Complex64::zero();
        for d in 0..3 {
            let partials: Vec<Complex64> = self.comps[d]
                .par_chunks(REDUCE_CHUNK)
                .zip(other.comps[d].par_chunks(REDUCE_CHUNK))
                .map(|(a, b)| {
                    a.iter()
                        .zip(b)
                        .map(|(x, y)| x.conj() * y)
                        .sum::<Complex64>()
                })
                .collect();
            acc += partials.iter().sum::<Complex64>();
        }
        acc
    }

    /// Euclidean norm over all components.
    pub fn norm(&self) -> f64 {
        let mut acc = 0.0;
        for d in 0..3 {
            let partials: Vec<f64> = self.comps[d]
                .par_chunks(REDUCE_CHUNK)
                .map(|a| a.iter().map(|x| x.norm_sqr()).sum::<f64>())
                .collect();
            acc += partials.iter().sum::<f64>();
        }
        acc.sqrt()
    }

    /// Whether every entry is finite.
    pub fn is_finite(&self) -> bool {
        self.comps
            .iter()
            .all(|c| c.iter().all(|v| v.re.is_finite() && v.im.is_finite()))
    }

    /// Trilinear receiver interpolation of all three components at `point`,
    /// honouring the staggered edge positions (cell centres along the
    /// component's own axis, nodes transversely). Points outside the grid are
    /// clamped to it.
    pub fn interpolate(&self, grid: &TensorGrid, point: [f64; 3]) -> [Complex64; 3] {
        let mut out = [Complex64::zero(); 3];
        for &comp in &Axis::ALL {
            let coords: [Vec<f64>; 3] = std::array::from_fn(|d| {
                let axis = Axis::ALL[d];
                if axis == comp {
                    grid.centers(axis)
                } else {
                    grid.nodes(axis).to_vec()
                }
            });
            let mut base = [0usize; 3];
            let mut w = [0.0f64; 3];
            for d in 0..3 {
                let (b, lam) = bracket(&coords[d], point[d]);
                base[d] = b;
                w[d] = lam;
            }
            let mut v = Complex64::zero();
            for di in 0..2 {
                for dj in 0..2 {
                    for dk in 0..2 {
                        let wt = pick(w[0], di) * pick(w[1], dj) * pick(w[2], dk);
                        if wt == 0.0 {
                            continue;
                        }
                        v += wt
                            * self.get(comp, base[0] + di, base[1] + dj, base[2] + dk);
                    }
                }
            }
            out[comp.index()] = v;
        }
        out
    }
}

#[inline]
fn pick(lambda: f64, side: usize) -> f64 {
    if side == 0 { 1.0 - lambda } else { lambda }
}

/// Bracketing interval and interpolation weight within a sorted coordinate
/// vector; clamps outside points onto the end intervals.
fn bracket(coords: &[f64], p: f64) -> (usize, f64) {
    let n = coords.len();
    if n == 1 {
        return (0, 0.0);
    }
    let mut i = coords.partition_point(|&c| c <= p);
    i = i.clamp(1, n - 1);
    let lo = coords[i - 1];
    let hi = coords[i];
    let lam = ((p - lo) / (hi - lo)).clamp(0.0, 1.0);
    (i - 1, lam)
}
