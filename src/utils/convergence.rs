//! Convergence tracking & tolerance checks for the iteration loops.

/// Stopping criteria.
#[derive(Debug, Clone, Copy)]
pub struct Convergence {
    pub tol: f64,
    pub max_iters: usize,
}

impl Convergence {
    /// Whether `res_norm` relative to `res0_norm` satisfies the tolerance.
    #[inline]
    pub fn reached(&self, res_norm: f64, res0_norm: f64) -> bool {
        if res0_norm == 0.0 {
            return res_norm == 0.0;
        }
        res_norm / res0_norm <= self.tol
    }
}

/// Residual-growth watchdog shared by the iteration loops. Flags divergence
/// when the residual exceeds `factor` times the best norm seen for
/// `patience` consecutive observations, or immediately on a non-finite
/// norm.
#[derive(Debug, Clone)]
pub struct DivergenceGuard {
    factor: f64,
    patience: usize,
    streak: usize,
}

impl DivergenceGuard {
    pub fn new(factor: f64, patience: usize) -> Self {
        Self {
            factor,
            patience,
            streak: 0,
        }
    }

    /// Observe one residual norm against the best seen so far; returns
    /// whether the iteration should stop as diverged.
    pub fn diverged(&mut self, res_norm: f64, best_norm: f64) -> bool {
        if !res_norm.is_finite() {
            return true;
        }
        if res_norm > self.factor * best_norm {
            self.streak += 1;
            self.streak >= self.patience
        } else {
            self.streak = 0;
            false
        }
    }
}

/// Terminal state of a solve. Only `Converged` means the tolerance was met;
/// the other states still come with the best field found, so the caller can
/// accept a partial result, retune, or escalate to the Krylov wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Converged,
    /// Iteration budget exhausted before reaching tolerance.
    MaxIterations,
    /// Residual grew past the safety factor or turned non-finite; the field
    /// returned is the last stable one.
    Diverged,
    /// The caller's cancellation flag was set.
    Cancelled,
}

/// One iteration's worth of diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct IterationRecord {
    pub iteration: usize,
    pub abs_residual: f64,
    pub rel_residual: f64,
    /// Cumulative work in finest-grid-equivalent smoothing sweeps.
    pub work: f64,
}

/// Per-solve residual history and terminal status.
#[derive(Debug, Clone)]
pub struct ConvergenceRecord {
    pub history: Vec<IterationRecord>,
    pub status: SolveStatus,
    /// Norm of the right-hand side the relative residuals refer to.
    pub rhs_norm: f64,
}

impl ConvergenceRecord {
    pub fn new(rhs_norm: f64) -> Self {
        Self {
            history: Vec::new(),
            status: SolveStatus::MaxIterations,
            rhs_norm,
        }
    }

    pub fn push(&mut self, iteration: usize, abs_residual: f64, work: f64) {
        let rel = if self.rhs_norm == 0.0 {
            abs_residual
        } else {
            abs_residual / self.rhs_norm
        };
        self.history.push(IterationRecord {
            iteration,
            abs_residual,
            rel_residual: rel,
            work,
        });
    }

    pub fn iterations(&self) -> usize {
        self.history.last().map_or(0, |r| r.iteration)
    }

    pub fn final_rel_residual(&self) -> f64 {
        self.history.last().map_or(0.0, |r| r.rel_residual)
    }

    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}
