//! Staggered tensor-product meshes.
//!
//! A [`TensorGrid`] is an immutable description of a 3D tensor mesh: one
//! sequence of strictly positive cell widths per axis plus an origin. Electric
//! field unknowns live on cell edges, so the grid also knows the edge-array
//! shape of each field component and how to flatten edge indices.
//!
//! Coarsening merges adjacent cell pairs along each axis; a trailing odd cell
//! is left unmerged, and axes with fewer than four cells stop coarsening.

use crate::error::EmError;

/// Coordinate axis of the mesh. Also identifies a field component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn label(self) -> char {
        match self {
            Axis::X => 'x',
            Axis::Y => 'y',
            Axis::Z => 'z',
        }
    }

    /// The other two axes, in cyclic order (x -> y,z; y -> z,x; z -> x,y).
    #[inline]
    pub fn others(self) -> [Axis; 2] {
        match self {
            Axis::X => [Axis::Y, Axis::Z],
            Axis::Y => [Axis::Z, Axis::X],
            Axis::Z => [Axis::X, Axis::Y],
        }
    }
}

/// Immutable 3D staggered tensor mesh.
#[derive(Debug, Clone)]
pub struct TensorGrid {
    widths: [Vec<f64>; 3],
    origin: [f64; 3],
    nodes: [Vec<f64>; 3],
}

impl TensorGrid {
    /// Build a grid from per-axis cell widths and an origin coordinate.
    ///
    /// Fails fast on an empty axis or a non-positive width.
    pub fn new(hx: Vec<f64>, hy: Vec<f64>, hz: Vec<f64>, origin: [f64; 3]) -> Result<Self, EmError> {
        let widths = [hx, hy, hz];
        for (axis, h) in Axis::ALL.iter().zip(widths.iter()) {
            if h.is_empty() {
                return Err(EmError::EmptyAxis { axis: axis.label() });
            }
            for (index, &w) in h.iter().enumerate() {
                if !(w > 0.0) || !w.is_finite() {
                    return Err(EmError::NonPositiveWidth {
                        axis: axis.label(),
                        index,
                        width: w,
                    });
                }
            }
        }
        let nodes = std::array::from_fn(|d| {
            let mut n = Vec::with_capacity(widths[d].len() + 1);
            let mut pos = origin[d];
            n.push(pos);
            for &w in &widths[d] {
                pos += w;
                n.push(pos);
            }
            n
        });
        Ok(Self { widths, origin, nodes })
    }

    /// Uniform grid helper: `n` cells of width `h` per axis.
    pub fn uniform(n: [usize; 3], h: [f64; 3], origin: [f64; 3]) -> Result<Self, EmError> {
        Self::new(
            vec![h[0]; n[0]],
            vec![h[1]; n[1]],
            vec![h[2]; n[2]],
            origin,
        )
    }

    #[inline]
    pub fn n_cells(&self, axis: Axis) -> usize {
        self.widths[axis.index()].len()
    }

    /// Per-axis cell counts `[nx, ny, nz]`.
    pub fn shape(&self) -> [usize; 3] {
        [
            self.widths[0].len(),
            self.widths[1].len(),
            self.widths[2].len(),
        ]
    }

    pub fn n_cells_total(&self) -> usize {
        self.shape().iter().product()
    }

    #[inline]
    pub fn widths(&self, axis: Axis) -> &[f64] {
        &self.widths[axis.index()]
    }

    /// Node coordinates along `axis` (length `n_cells + 1`).
    #[inline]
    pub fn nodes(&self, axis: Axis) -> &[f64] {
        &self.nodes[axis.index()]
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// Cell-center coordinates along `axis`.
    pub fn centers(&self, axis: Axis) -> Vec<f64> {
        let n = self.nodes(axis);
        let h = self.widths(axis);
        (0..h.len()).map(|i| n[i] + 0.5 * h[i]).collect()
    }

    /// Dual (node-centred) width at node `i` along `axis`: half-cells at the
    /// two boundary nodes, the mean of the neighbouring cells inside.
    #[inline]
    pub fn dual_width(&self, axis: Axis, i: usize) -> f64 {
        let h = self.widths(axis);
        let n = h.len();
        if i == 0 {
            0.5 * h[0]
        } else if i == n {
            0.5 * h[n - 1]
        } else {
            0.5 * (h[i - 1] + h[i])
        }
    }

    #[inline]
    pub fn cell_volume(&self, i: usize, j: usize, k: usize) -> f64 {
        self.widths[0][i] * self.widths[1][j] * self.widths[2][k]
    }

    /// Flat cell index, x-major: `(i * ny + j) * nz + k`.
    #[inline]
    pub fn cell_index(&self, i: usize, j: usize, k: usize) -> usize {
        let [_, ny, nz] = self.shape();
        (i * ny + j) * nz + k
    }

    /// Edge-array shape for the given field component: the component's own
    /// axis counts cells, the two transverse axes count nodes.
    #[inline]
    pub fn edge_shape(&self, comp: Axis) -> [usize; 3] {
        let [nx, ny, nz] = self.shape();
        match comp {
            Axis::X => [nx, ny + 1, nz + 1],
            Axis::Y => [nx + 1, ny, nz + 1],
            Axis::Z => [nx + 1, ny + 1, nz],
        }
    }

    #[inline]
    pub fn n_edges(&self, comp: Axis) -> usize {
        self.edge_shape(comp).iter().product()
    }

    pub fn n_edges_total(&self) -> usize {
        Axis::ALL.iter().map(|&c| self.n_edges(c)).sum()
    }

    /// Flat edge index within the component array, x-major.
    #[inline]
    pub fn edge_index(&self, comp: Axis, i: usize, j: usize, k: usize) -> usize {
        let s = self.edge_shape(comp);
        (i * s[1] + j) * s[2] + k
    }

    /// Whether an edge of component `comp` at `(i, j, k)` lies on the outer
    /// boundary, i.e. a transverse coordinate sits on the first or last node.
    /// Tangential boundary edges carry the PEC Dirichlet condition.
    #[inline]
    pub fn is_boundary_edge(&self, comp: Axis, i: usize, j: usize, k: usize) -> bool {
        let s = self.edge_shape(comp);
        let idx = [i, j, k];
        for t in comp.others() {
            let d = t.index();
            if idx[d] == 0 || idx[d] == s[d] - 1 {
                return true;
            }
        }
        false
    }

    /// Whether `axis` can be coarsened (pairs of cells merged).
    pub fn coarsenable(&self, axis: Axis) -> bool {
        self.n_cells(axis) >= 4
    }

    /// Derive the next-coarser grid by merging adjacent cell pairs along
    /// every coarsenable axis. A trailing odd cell is left unmerged. Returns
    /// `None` when no axis can be coarsened further.
    pub fn coarsen(&self) -> Option<TensorGrid> {
        if !Axis::ALL.iter().any(|&a| self.coarsenable(a)) {
            return None;
        }
        let merged: [Vec<f64>; 3] = std::array::from_fn(|d| {
            let axis = Axis::ALL[d];
            let h = self.widths(axis);
            if !self.coarsenable(axis) {
                return h.to_vec();
            }
            let mut out = Vec::with_capacity(h.len() / 2 + 1);
            let mut i = 0;
            while i + 1 < h.len() {
                out.push(h[i] + h[i + 1]);
                i += 2;
            }
            if i < h.len() {
                out.push(h[i]);
            }
            out
        });
        let [cx, cy, cz] = merged;
        // Widths were validated on the fine grid; sums stay positive.
        Some(TensorGrid::new(cx, cy, cz, self.origin).unwrap())
    }

    /// Range of fine cells merged into coarse cell `ic` along `axis`, given
    /// whether the axis was coarsened in this level transition.
    #[inline]
    pub fn fine_cells_of(fine_n: usize, coarsened: bool, ic: usize) -> (usize, usize) {
        if !coarsened {
            return (ic, 1);
        }
        let start = 2 * ic;
        let len = if start + 1 < fine_n { 2 } else { 1 };
        (start, len)
    }

    /// Fine node coinciding with coarse node `ic` along a coarsened axis.
    #[inline]
    pub fn fine_node_of(fine_n: usize, coarsened: bool, ic: usize) -> usize {
        if coarsened { (2 * ic).min(fine_n) } else { ic }
    }
}
