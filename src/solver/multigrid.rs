//! Geometric multigrid cycling.
//!
//! [`MgCycle`] walks the hierarchy recursively: pre-smooth, restrict the
//! residual, recurse (once for a V-cycle, twice for a W-cycle), prolongate
//! the correction, post-smooth. The coarsest level is either relaxed hard or
//! solved directly through a dense LU of the probed coarse operator.
//! [`solve_cycles`] wraps the cycle in a stationary iteration with residual
//! history, divergence detection, and cooperative cancellation.

use std::sync::atomic::Ordering;

use faer::linalg::solvers::{PartialPivLu, SolveCore};
use faer::{Conj, Mat, MatMut};
use num_complex::Complex64;

use crate::config::{CoarseSolve, CycleType, SolverOptions};
use crate::field::Field;
use crate::mesh::Axis;
use crate::operator::CurlCurlOperator;
use crate::smoother::LineSmoother;
use crate::solver::hierarchy::Hierarchy;
use crate::utils::{Convergence, ConvergenceRecord, DivergenceGuard, SolveStatus};

/// Dense factorization of the coarsest-level operator, probed column by
/// column from the matrix-free form. The complex system is solved through
/// its real 2n×2n splitting `[[Re, -Im], [Im, Re]]`, factored with partial
/// pivoting.
pub struct CoarseDirect {
    lu: PartialPivLu<f64>,
    n: usize,
}

impl CoarseDirect {
    pub fn new(op: &CurlCurlOperator) -> Self {
        let grid = op.grid();
        let n = grid.n_edges_total();
        let mut a = Mat::<f64>::zeros(2 * n, 2 * n);
        let mut probe = Field::zeros(grid);
        let mut col = Field::zeros(grid);
        let mut jcol = 0;
        for &comp in &Axis::ALL {
            for flat in 0..grid.n_edges(comp) {
                probe.component_mut(comp)[flat] = Complex64::new(1.0, 0.0);
                op.apply(&probe, &mut col);
                probe.component_mut(comp)[flat] = Complex64::new(0.0, 0.0);

                let mut row = 0;
                for &rc in &Axis::ALL {
                    for &v in col.component(rc) {
                        a[(row, jcol)] = v.re;
                        a[(row + n, jcol)] = v.im;
                        a[(row, jcol + n)] = -v.im;
                        a[(row + n, jcol + n)] = v.re;
                        row += 1;
                    }
                }
                jcol += 1;
            }
        }
        Self {
            lu: PartialPivLu::new(a.as_ref()),
            n,
        }
    }

    /// x = A⁻¹ rhs through the cached factorization.
    pub fn solve(&self, rhs: &Field, x: &mut Field) {
        let n = self.n;
        let mut v = vec![0.0f64; 2 * n];
        let mut row = 0;
        for &comp in &Axis::ALL {
            for &b in rhs.component(comp) {
                v[row] = b.re;
                v[row + n] = b.im;
                row += 1;
            }
        }
        let v_mat = MatMut::from_column_major_slice_mut(&mut v, 2 * n, 1);
        self.lu.solve_in_place_with_conj(Conj::No, v_mat);
        let mut row = 0;
        for &comp in &Axis::ALL {
            for o in x.component_mut(comp) {
                *o = Complex64::new(v[row], v[row + n]);
                row += 1;
            }
        }
    }
}

enum CoarseStrategy {
    Relax(usize),
    Direct(CoarseDirect),
}

/// One configured multigrid cycle over a hierarchy.
pub struct MgCycle<'a> {
    hier: &'a Hierarchy,
    smoother: LineSmoother,
    cycle: CycleType,
    nu_pre: usize,
    nu_post: usize,
    coarse: CoarseStrategy,
    /// Cost of one smoothing sweep per level, in finest-sweep units.
    level_work: Vec<f64>,
}

impl<'a> MgCycle<'a> {
    pub fn new(hier: &'a Hierarchy, opts: &SolverOptions) -> Self {
        let coarse = match opts.coarse_solve {
            CoarseSolve::Relax { sweeps } => CoarseStrategy::Relax(sweeps),
            CoarseSolve::Direct => CoarseStrategy::Direct(CoarseDirect::new(&hier.coarsest().op)),
        };
        let fine_edges = hier.finest().grid.n_edges_total() as f64;
        let level_work = hier
            .levels()
            .iter()
            .map(|l| l.grid.n_edges_total() as f64 / fine_edges)
            .collect();
        Self {
            hier,
            smoother: LineSmoother::new(opts.directions),
            cycle: opts.cycle,
            nu_pre: opts.nu_pre,
            nu_post: opts.nu_post,
            coarse,
            level_work,
        }
    }

    /// Apply one cycle, improving `e` towards `A e = rhs` on the finest
    /// level. Returns the work spent, in finest-sweep units.
    pub fn cycle(&self, e: &mut Field, rhs: &Field) -> f64 {
        let mut work = 0.0;
        self.descend(0, e, rhs, &mut work);
        work
    }

    fn descend(&self, l: usize, e: &mut Field, rhs: &Field, work: &mut f64) {
        let levels = self.hier.levels();
        let lvl = &levels[l];

        if l + 1 == levels.len() {
            match &self.coarse {
                CoarseStrategy::Relax(sweeps) => {
                    self.smoother.smooth(&lvl.op, e, rhs, *sweeps);
                    *work += *sweeps as f64 * self.level_work[l];
                }
                CoarseStrategy::Direct(lu) => {
                    lu.solve(rhs, e);
                    *work += self.level_work[l];
                }
            }
            return;
        }

        self.smoother.smooth(&lvl.op, e, rhs, self.nu_pre);
        *work += self.nu_pre as f64 * self.level_work[l];

        let mut res = Field::zeros(&lvl.grid);
        lvl.op.residual(rhs, e, &mut res);

        let transfer = lvl.to_coarse.as_ref().unwrap();
        let next = &levels[l + 1];
        let mut coarse_rhs = Field::zeros(&next.grid);
        transfer.restrict(&res, &mut coarse_rhs);
        // Keep the Dirichlet rows of the coarse correction homogeneous.
        coarse_rhs.zero_boundary();

        let mut coarse_e = Field::zeros(&next.grid);
        // A second W-visit of a directly solved coarsest level would repeat
        // an identical solve; with relaxation it still makes progress.
        let direct_bottom = matches!(self.coarse, CoarseStrategy::Direct(_));
        let visits = match self.cycle {
            CycleType::V => 1,
            CycleType::W if l + 2 == levels.len() && direct_bottom => 1,
            CycleType::W => 2,
        };
        for _ in 0..visits {
            self.descend(l + 1, &mut coarse_e, &coarse_rhs, work);
        }

        transfer.prolong_add(&coarse_e, e);

        self.smoother.smooth(&lvl.op, e, rhs, self.nu_post);
        *work += self.nu_post as f64 * self.level_work[l];
    }
}

/// Stationary multigrid iteration on the finest level. `x` carries the
/// initial guess in and the best available field out.
pub fn solve_cycles(
    hier: &Hierarchy,
    rhs: &Field,
    x: &mut Field,
    opts: &SolverOptions,
) -> ConvergenceRecord {
    let op = &hier.finest().op;
    let conv = Convergence {
        tol: opts.tol,
        max_iters: opts.max_iters,
    };
    let rhs_norm = rhs.norm();
    let mut record = ConvergenceRecord::new(rhs_norm);
    if rhs_norm == 0.0 {
        x.set_zero();
        record.push(0, 0.0, 0.0);
        record.status = SolveStatus::Converged;
        return record;
    }

    let cycler = MgCycle::new(hier, opts);
    let mut res = Field::zeros(&hier.finest().grid);
    op.residual(rhs, x, &mut res);
    let mut res_norm = res.norm();
    let mut work = 0.0;
    record.push(0, res_norm, work);
    if conv.reached(res_norm, rhs_norm) {
        record.status = SolveStatus::Converged;
        return record;
    }

    let mut best = x.clone();
    let mut best_norm = res_norm;
    let mut guard = DivergenceGuard::new(opts.divergence_factor, opts.divergence_patience);

    for it in 1..=conv.max_iters {
        if let Some(flag) = &opts.cancel {
            if flag.load(Ordering::Relaxed) {
                record.status = SolveStatus::Cancelled;
                break;
            }
        }

        work += cycler.cycle(x, rhs);
        op.residual(rhs, x, &mut res);
        res_norm = res.norm();
        record.push(it, res_norm, work);

        if guard.diverged(res_norm, best_norm) || !x.is_finite() {
            record.status = SolveStatus::Diverged;
            x.copy_from(&best);
            break;
        }
        if res_norm <= best_norm {
            best.copy_from(x);
            best_norm = res_norm;
        }
        if conv.reached(res_norm, rhs_norm) {
            record.status = SolveStatus::Converged;
            break;
        }
    }

    // Non-converged exits hand back the best field seen.
    if record.status != SolveStatus::Converged && !(res_norm <= best_norm) {
        x.copy_from(&best);
    }
    record
}
