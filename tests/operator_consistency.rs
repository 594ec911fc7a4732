//! Structural checks of the discretized curl-curl operator against its
//! continuum counterpart.

use num_complex::Complex64;
use num_traits::Zero;

use emgrid::{Axis, CurlCurlOperator, Field, Mapping, Model, TensorGrid};

fn dual_volume(grid: &TensorGrid, comp: Axis, i: usize, j: usize, k: usize) -> f64 {
    let idx = [i, j, k];
    let mut v = grid.widths(comp)[idx[comp.index()]];
    let [t0, t1] = comp.others();
    for t in [t0, t1] {
        v *= grid.dual_width(t, idx[t.index()]);
    }
    v
}

/// All edges of a grid in component-major order.
fn edges(grid: &TensorGrid) -> Vec<(Axis, usize, usize, usize)> {
    let mut out = Vec::new();
    for &comp in &Axis::ALL {
        let s = grid.edge_shape(comp);
        for i in 0..s[0] {
            for j in 0..s[1] {
                for k in 0..s[2] {
                    out.push((comp, i, j, k));
                }
            }
        }
    }
    out
}

/// The operator weighted by the edges' dual volumes must be symmetric; that
/// is the discrete analogue of the self-adjointness of `∇×∇× + sσ`.
#[test]
fn dual_volume_weighting_symmetrizes_the_matrix() {
    let g = TensorGrid::new(
        vec![1.0, 2.0, 1.5, 0.5],
        vec![2.0, 1.0, 3.0],
        vec![0.5, 1.0, 2.0, 1.0, 1.5],
        [0.0; 3],
    )
    .unwrap();
    let n = g.n_cells_total();
    let sigma = [vec![1.0; n], vec![2.5; n], vec![0.3; n]];
    let m = Model::new(&g, sigma, Mapping::Conductivity).unwrap();
    let op = CurlCurlOperator::new(&g, &m, 75.0).unwrap();

    let all = edges(&g);
    let interior: Vec<usize> = (0..all.len())
        .filter(|&e| {
            let (c, i, j, k) = all[e];
            !g.is_boundary_edge(c, i, j, k)
        })
        .collect();

    // Probe the full matrix column by column.
    let mut cols: Vec<Field> = Vec::with_capacity(all.len());
    for &(c, i, j, k) in &all {
        let mut probe = Field::zeros(&g);
        probe.set(c, i, j, k, Complex64::new(1.0, 0.0));
        let mut col = Field::zeros(&g);
        op.apply(&probe, &mut col);
        cols.push(col);
    }

    for (a, &ea) in interior.iter().enumerate() {
        let (ca, ia, ja, ka) = all[ea];
        let va = dual_volume(&g, ca, ia, ja, ka);
        for &eb in &interior[a + 1..] {
            let (cb, ib, jb, kb) = all[eb];
            let vb = dual_volume(&g, cb, ib, jb, kb);
            let a_ab = cols[eb].get(ca, ia, ja, ka);
            let a_ba = cols[ea].get(cb, ib, jb, kb);
            let lhs = va * a_ab;
            let rhs = vb * a_ba;
            assert!(
                (lhs - rhs).norm() <= 1e-12 * (lhs.norm() + rhs.norm()).max(1e-12),
                "asymmetry between {ca:?}({ia},{ja},{ka}) and {cb:?}({ib},{jb},{kb}): {lhs} vs {rhs}"
            );
        }
    }
}

/// On a uniform grid the staggered differences are exact for quadratics:
/// Ex = y² + z² has `(∇×∇×E)_x = -4` identically.
#[test]
fn quadratic_field_is_differenced_exactly() {
    let g = TensorGrid::uniform([6, 6, 6], [1.0; 3], [0.0; 3]).unwrap();
    let m = Model::homogeneous(&g, 3.0, Mapping::Conductivity).unwrap();
    // Zero frequency turns the mass term off; only the curl-curl part acts.
    let op = CurlCurlOperator::new(&g, &m, 0.0).unwrap();

    let mut e = Field::zeros(&g);
    let s = e.shape(Axis::X);
    let ny = g.nodes(Axis::Y);
    let nz = g.nodes(Axis::Z);
    for i in 0..s[0] {
        for j in 0..s[1] {
            for k in 0..s[2] {
                let v = ny[j] * ny[j] + nz[k] * nz[k];
                e.set(Axis::X, i, j, k, Complex64::new(v, 0.0));
            }
        }
    }

    let mut y = Field::zeros(&g);
    op.apply(&e, &mut y);
    for i in 0..s[0] {
        for j in 1..s[1] - 1 {
            for k in 1..s[2] - 1 {
                let v = y.get(Axis::X, i, j, k);
                assert!(
                    (v.re + 4.0).abs() < 1e-11 && v.im.abs() < 1e-14,
                    "edge ({i},{j},{k}): {v}"
                );
            }
        }
    }
    // The y and z components never held data and stay zero in the interior.
    let sy = y.shape(Axis::Y);
    for i in 1..sy[0] - 1 {
        for j in 0..sy[1] {
            for k in 1..sy[2] - 1 {
                assert!(y.get(Axis::Y, i, j, k).is_zero() || y.get(Axis::Y, i, j, k).norm() < 1e-11);
            }
        }
    }
}

/// Identity rows on the tangential boundary leave any boundary data alone
/// and decouple it from the interior stencil.
#[test]
fn boundary_edges_pass_through() {
    let g = TensorGrid::uniform([5, 4, 6], [2.0; 3], [-5.0; 3]).unwrap();
    let m = Model::homogeneous(&g, 0.7, Mapping::Resistivity).unwrap();
    let op = CurlCurlOperator::new(&g, &m, 33.0).unwrap();

    let mut e = Field::zeros(&g);
    let s = e.shape(Axis::Z);
    for i in 0..s[0] {
        for k in 0..s[2] {
            e.set(Axis::Z, i, 0, k, Complex64::new(i as f64, k as f64));
        }
    }
    let mut y = Field::zeros(&g);
    op.apply(&e, &mut y);
    for i in 0..s[0] {
        for k in 0..s[2] {
            assert_eq!(y.get(Axis::Z, i, 0, k), e.get(Axis::Z, i, 0, k));
        }
    }
}
