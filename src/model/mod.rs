//! Cell-centred anisotropic property models.
//!
//! A [`Model`] stores up to three independent principal-axis conductivities
//! per cell. Raw input values may be given as conductivities, resistivities,
//! or natural-log resistivities; the [`Mapping`] mode fixes the translation
//! into the conductivity used by the operator. Values are converted and
//! validated once at construction, so the solver never revisits the mapping.

use crate::error::EmError;
use crate::mesh::{Axis, TensorGrid};

/// How raw stored values translate to physical conductivity [S/m].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mapping {
    /// Values are conductivities.
    #[default]
    Conductivity,
    /// Values are resistivities; conductivity is their reciprocal.
    Resistivity,
    /// Values are ln(resistivity); conductivity is `exp(-value)`.
    LnResistivity,
}

impl Mapping {
    #[inline]
    pub fn to_conductivity(self, value: f64) -> f64 {
        match self {
            Mapping::Conductivity => value,
            Mapping::Resistivity => 1.0 / value,
            Mapping::LnResistivity => (-value).exp(),
        }
    }

    #[inline]
    pub fn from_conductivity(self, sigma: f64) -> f64 {
        match self {
            Mapping::Conductivity => sigma,
            Mapping::Resistivity => 1.0 / sigma,
            Mapping::LnResistivity => -sigma.ln(),
        }
    }
}

/// Tri-axial conductivity model on the cells of a [`TensorGrid`].
///
/// Immutable during a solve. Conductivities are stored per principal axis in
/// the grid's x-major cell order.
#[derive(Debug, Clone)]
pub struct Model {
    shape: [usize; 3],
    sigma: [Vec<f64>; 3],
    mapping: Mapping,
}

impl Model {
    /// Build from three per-axis raw value arrays in grid cell order.
    pub fn new(
        grid: &TensorGrid,
        values: [Vec<f64>; 3],
        mapping: Mapping,
    ) -> Result<Self, EmError> {
        let expected = grid.shape();
        let n = grid.n_cells_total();
        for (axis, v) in Axis::ALL.iter().zip(values.iter()) {
            if v.len() != n {
                return Err(EmError::ModelLength {
                    axis: axis.label(),
                    got: v.len(),
                    expected: n,
                });
            }
            for (index, &raw) in v.iter().enumerate() {
                let sigma = mapping.to_conductivity(raw);
                if !(sigma > 0.0) || !sigma.is_finite() {
                    return Err(EmError::NonPositiveConductivity {
                        axis: axis.label(),
                        index,
                        value: raw,
                    });
                }
            }
        }
        let sigma = values.map(|v| v.iter().map(|&r| mapping.to_conductivity(r)).collect());
        Ok(Self {
            shape: expected,
            sigma,
            mapping,
        })
    }

    /// Isotropic model from a single raw value array.
    pub fn isotropic(grid: &TensorGrid, values: Vec<f64>, mapping: Mapping) -> Result<Self, EmError> {
        let v = [values.clone(), values.clone(), values];
        Self::new(grid, v, mapping)
    }

    /// Homogeneous isotropic model.
    pub fn homogeneous(grid: &TensorGrid, value: f64, mapping: Mapping) -> Result<Self, EmError> {
        Self::isotropic(grid, vec![value; grid.n_cells_total()], mapping)
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn mapping(&self) -> Mapping {
        self.mapping
    }

    /// Conductivity array for one principal axis, in grid cell order.
    #[inline]
    pub fn sigma(&self, axis: Axis) -> &[f64] {
        &self.sigma[axis.index()]
    }

    #[inline]
    pub fn sigma_at(&self, axis: Axis, i: usize, j: usize, k: usize) -> f64 {
        let [_, ny, nz] = self.shape;
        self.sigma[axis.index()][(i * ny + j) * nz + k]
    }

    /// Derive the model for a coarsened grid by volume-weighted averaging of
    /// conductivity over each merged cell block.
    pub fn coarsen(&self, fine: &TensorGrid, coarse: &TensorGrid) -> Model {
        let fs = fine.shape();
        let cs = coarse.shape();
        let coarsened = [fs[0] != cs[0], fs[1] != cs[1], fs[2] != cs[2]];
        let n_coarse = coarse.n_cells_total();

        let sigma: [Vec<f64>; 3] = std::array::from_fn(|d| {
            let axis = Axis::ALL[d];
            let mut out = Vec::with_capacity(n_coarse);
            for ic in 0..cs[0] {
                let (i0, il) = TensorGrid::fine_cells_of(fs[0], coarsened[0], ic);
                for jc in 0..cs[1] {
                    let (j0, jl) = TensorGrid::fine_cells_of(fs[1], coarsened[1], jc);
                    for kc in 0..cs[2] {
                        let (k0, kl) = TensorGrid::fine_cells_of(fs[2], coarsened[2], kc);
                        let mut num = 0.0;
                        let mut den = 0.0;
                        for i in i0..i0 + il {
                            for j in j0..j0 + jl {
                                for k in k0..k0 + kl {
                                    let v = fine.cell_volume(i, j, k);
                                    num += v * self.sigma_at(axis, i, j, k);
                                    den += v;
                                }
                            }
                        }
                        out.push(num / den);
                    }
                }
            }
            out
        });

        Model {
            shape: cs,
            sigma,
            mapping: self.mapping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid222() -> TensorGrid {
        TensorGrid::uniform([2, 2, 2], [1.0; 3], [0.0; 3]).unwrap()
    }

    #[test]
    fn mapping_roundtrips() {
        for m in [Mapping::Conductivity, Mapping::Resistivity, Mapping::LnResistivity] {
            let sigma = 0.37;
            assert_relative_eq!(m.to_conductivity(m.from_conductivity(sigma)), sigma, max_relative = 1e-14);
        }
    }

    #[test]
    fn resistivity_input_inverts() {
        let g = grid222();
        let m = Model::homogeneous(&g, 100.0, Mapping::Resistivity).unwrap();
        assert_relative_eq!(m.sigma(Axis::X)[0], 0.01);
    }

    #[test]
    fn ln_resistivity_input() {
        let g = grid222();
        let m = Model::homogeneous(&g, 0.0, Mapping::LnResistivity).unwrap();
        assert_relative_eq!(m.sigma(Axis::Z)[7], 1.0);
    }

    #[test]
    fn rejects_zero_resistivity_and_wrong_length() {
        let g = grid222();
        assert!(matches!(
            Model::homogeneous(&g, 0.0, Mapping::Resistivity),
            Err(EmError::NonPositiveConductivity { .. })
        ));
        assert!(matches!(
            Model::isotropic(&g, vec![1.0; 7], Mapping::Conductivity),
            Err(EmError::ModelLength {
                axis: 'x',
                got: 7,
                expected: 8,
            })
        ));
    }

    #[test]
    fn coarsen_volume_weights() {
        // 4 cells of widths 1,1,2,2 in x; conductivities 1,3,10,20.
        let g = TensorGrid::new(vec![1.0, 1.0, 2.0, 2.0], vec![1.0], vec![1.0], [0.0; 3]).unwrap();
        let m = Model::isotropic(&g, vec![1.0, 3.0, 10.0, 20.0], Mapping::Conductivity).unwrap();
        let gc = g.coarsen().unwrap();
        let mc = m.coarsen(&g, &gc);
        assert_eq!(mc.shape(), [2, 1, 1]);
        assert_relative_eq!(mc.sigma(Axis::X)[0], 2.0); // (1*1 + 1*3) / 2
        assert_relative_eq!(mc.sigma(Axis::X)[1], 15.0); // (2*10 + 2*20) / 4
    }
}
