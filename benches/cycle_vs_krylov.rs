use criterion::{Criterion, black_box, criterion_group, criterion_main};

use emgrid::{
    Axis, Field, Hierarchy, Mapping, Model, SolverOptions, TensorGrid, solve,
};

fn setup(n: usize) -> (TensorGrid, Model, Field) {
    let g = TensorGrid::uniform([n; 3], [1000.0 / n as f64; 3], [0.0; 3]).unwrap();
    let m = Model::homogeneous(&g, 0.01, Mapping::Conductivity).unwrap();
    let src = Field::unit_edge_source(&g, Axis::X, [500.0; 3]);
    (g, m, src)
}

fn bench_cycle_vs_krylov(c: &mut Criterion) {
    let (g, m, src) = setup(16);
    let opts_mg = SolverOptions::default().with_tol(1e-6).with_max_iters(60);
    let opts_ks = opts_mg.clone().with_krylov(true);
    let hier = Hierarchy::build(&g, &m, 100.0, &opts_mg).unwrap();

    c.bench_function("standalone v-cycles 16^3", |ben| {
        ben.iter(|| {
            let sol = solve(black_box(&hier), black_box(&src), &opts_mg).unwrap();
            black_box(sol.record.iterations())
        })
    });

    c.bench_function("mg-bicgstab 16^3", |ben| {
        ben.iter(|| {
            let sol = solve(black_box(&hier), black_box(&src), &opts_ks).unwrap();
            black_box(sol.record.iterations())
        })
    });
}

criterion_group!(benches, bench_cycle_vs_krylov);
criterion_main!(benches);
