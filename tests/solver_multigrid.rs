//! End-to-end standalone multigrid solves.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use emgrid::{
    Axis, CycleType, Field, Hierarchy, Mapping, Model, SolveStatus, SolverOptions, TensorGrid,
    solve,
};

fn homogeneous(n: usize, sigma: f64) -> (TensorGrid, Model) {
    let g = TensorGrid::uniform([n; 3], [1000.0 / n as f64; 3], [0.0; 3]).unwrap();
    let m = Model::homogeneous(&g, sigma, Mapping::Conductivity).unwrap();
    (g, m)
}

#[test]
fn homogeneous_halfspace_converges() {
    let (g, m) = homogeneous(16, 0.01);
    let opts = SolverOptions::default().with_tol(1e-6).with_max_iters(40);
    let hier = Hierarchy::build(&g, &m, 100.0, &opts).unwrap();
    let src = Field::unit_edge_source(&g, Axis::X, [500.0; 3]);

    let sol = solve(&hier, &src, &opts).unwrap();
    assert_eq!(sol.record.status, SolveStatus::Converged, "{:?}", sol.record.history.last());
    assert!(sol.record.final_rel_residual() <= 1e-6);
    assert!(sol.field.is_finite());
    assert!(sol.field.norm() > 0.0);

    // After the first couple of cycles the contraction should be steady.
    let hist = &sol.record.history;
    for w in hist.windows(2).skip(2) {
        assert!(
            w[1].abs_residual < w[0].abs_residual,
            "residual stalled: {} -> {}",
            w[0].abs_residual,
            w[1].abs_residual
        );
    }
}

#[test]
fn repeated_solves_are_bitwise_identical() {
    let (g, m) = homogeneous(12, 0.1);
    let opts = SolverOptions::default().with_tol(1e-8).with_max_iters(40);
    let hier = Hierarchy::build(&g, &m, 10.0, &opts).unwrap();
    let src = Field::unit_edge_source(&g, Axis::Z, [500.0; 3]);

    let a = solve(&hier, &src, &opts).unwrap();
    let b = solve(&hier, &src, &opts).unwrap();
    assert_eq!(a.field, b.field);
    assert_eq!(a.record.history.len(), b.record.history.len());
    for (ra, rb) in a.record.history.iter().zip(&b.record.history) {
        assert_eq!(ra.abs_residual, rb.abs_residual);
    }
}

#[test]
fn triaxial_anisotropy_converges() {
    let g = TensorGrid::uniform([12, 12, 12], [80.0; 3], [0.0; 3]).unwrap();
    let n = g.n_cells_total();
    let m = Model::new(
        &g,
        [vec![0.1; n], vec![0.01; n], vec![1.0; n]],
        Mapping::Conductivity,
    )
    .unwrap();
    let opts = SolverOptions::default().with_tol(1e-6).with_max_iters(60);
    let hier = Hierarchy::build(&g, &m, 50.0, &opts).unwrap();
    let src = Field::unit_edge_source(&g, Axis::Y, [480.0; 3]);

    let sol = solve(&hier, &src, &opts).unwrap();
    assert_eq!(sol.record.status, SolveStatus::Converged, "{:?}", sol.record.history.last());
}

#[test]
fn w_cycle_converges_in_no_more_cycles_than_v() {
    let (g, m) = homogeneous(16, 0.05);
    let opts_v = SolverOptions::default().with_tol(1e-6).with_max_iters(60);
    let opts_w = opts_v.clone().with_cycle(CycleType::W);
    let hier = Hierarchy::build(&g, &m, 30.0, &opts_v).unwrap();
    let src = Field::unit_edge_source(&g, Axis::X, [500.0; 3]);

    let v = solve(&hier, &src, &opts_v).unwrap();
    let w = solve(&hier, &src, &opts_w).unwrap();
    assert_eq!(v.record.status, SolveStatus::Converged);
    assert_eq!(w.record.status, SolveStatus::Converged);
    assert!(w.record.iterations() <= v.record.iterations());
}

#[test]
fn exhausted_budget_reports_max_iterations_with_best_field() {
    let (g, m) = homogeneous(12, 0.05);
    // Unreachable tolerance, two cycles allowed.
    let opts = SolverOptions::default().with_tol(1e-14).with_max_iters(2);
    let hier = Hierarchy::build(&g, &m, 50.0, &opts).unwrap();
    let src = Field::unit_edge_source(&g, Axis::X, [500.0; 3]);

    let sol = solve(&hier, &src, &opts).unwrap();
    assert_eq!(sol.record.status, SolveStatus::MaxIterations);
    assert!(sol.field.is_finite());
    // Initial residual plus one record per cycle.
    assert_eq!(sol.record.history.len(), 3);
    let hist = &sol.record.history;
    assert!(hist[2].abs_residual < hist[0].abs_residual);
    assert!(sol.record.final_rel_residual() > 1e-14);
}

#[test]
fn preset_cancel_flag_returns_cancelled() {
    let (g, m) = homogeneous(8, 0.01);
    let flag = Arc::new(AtomicBool::new(false));
    flag.store(true, Ordering::Relaxed);
    let opts = SolverOptions::default().with_cancel_flag(flag);
    let hier = Hierarchy::build(&g, &m, 10.0, &opts).unwrap();
    let src = Field::unit_edge_source(&g, Axis::X, [500.0; 3]);

    let sol = solve(&hier, &src, &opts).unwrap();
    assert_eq!(sol.record.status, SolveStatus::Cancelled);
    // One residual evaluation, no cycles.
    assert_eq!(sol.record.history.len(), 1);
}

#[test]
fn zero_source_yields_exactly_zero_field() {
    let (g, m) = homogeneous(8, 1.0);
    let opts = SolverOptions::default();
    let hier = Hierarchy::build(&g, &m, 1.0, &opts).unwrap();
    let sol = solve(&hier, &Field::zeros(&g), &opts).unwrap();
    assert_eq!(sol.record.status, SolveStatus::Converged);
    assert_eq!(sol.field.norm(), 0.0);
}

#[test]
fn receiver_interpolation_tracks_the_field() {
    let (g, m) = homogeneous(12, 0.02);
    let opts = SolverOptions::default().with_tol(1e-7).with_max_iters(40);
    let hier = Hierarchy::build(&g, &m, 50.0, &opts).unwrap();
    let src = Field::unit_edge_source(&g, Axis::X, [500.0; 3]);
    let sol = solve(&hier, &src, &opts).unwrap();
    assert_eq!(sol.record.status, SolveStatus::Converged);

    let near = sol.field.interpolate(&g, [500.0, 500.0, 500.0]);
    let far = sol.field.interpolate(&g, [120.0, 120.0, 120.0]);
    // The diffusive field decays away from the source.
    assert!(near[0].norm() > far[0].norm());
}
