//! Solver configuration.
//!
//! [`SolverOptions`] is the whole configuration surface the core consumes:
//! tolerance, iteration budget, cycle shape, smoothing counts, coarsest-level
//! strategy, and whether the multigrid cycle runs standalone or as a
//! BiCGSTAB preconditioner. Everything else (meshing, source synthesis,
//! receivers) lives with external collaborators.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::error::EmError;
use crate::smoother::LineDirections;

/// Multigrid cycle shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleType {
    /// Visit each coarser level once per recursion.
    #[default]
    V,
    /// Visit the immediate coarser level twice; costlier, more robust on
    /// anisotropic or high-contrast models.
    W,
}

/// How the coarsest level is solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoarseSolve {
    /// Heavily-iterated smoother sweeps.
    Relax { sweeps: usize },
    /// Dense LU of the probed coarse matrix (faer, real 2n×2n splitting).
    Direct,
}

impl Default for CoarseSolve {
    fn default() -> Self {
        CoarseSolve::Direct
    }
}

/// Configuration for a multigrid / Krylov solve.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Relative residual threshold.
    pub tol: f64,
    /// Maximum cycles (standalone) or Krylov iterations.
    pub max_iters: usize,
    pub cycle: CycleType,
    /// Pre-smoothing sweeps per level visit.
    pub nu_pre: usize,
    /// Post-smoothing sweeps per level visit.
    pub nu_post: usize,
    /// Directions the line smoother relaxes along.
    pub directions: LineDirections,
    pub coarse_solve: CoarseSolve,
    /// Wrap the cycle in a BiCGSTAB iteration.
    pub use_krylov: bool,
    /// Cap on the number of grid levels.
    pub max_levels: usize,
    /// Stop coarsening once a grid has at most this many cells.
    pub min_coarse_cells: usize,
    /// Declare divergence when the residual exceeds
    /// `divergence_factor * best` for `divergence_patience` iterations.
    pub divergence_factor: f64,
    pub divergence_patience: usize,
    /// Checked once per iteration; a set flag returns the best-so-far field
    /// with a `Cancelled` status.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            tol: 1e-6,
            max_iters: 50,
            cycle: CycleType::V,
            nu_pre: 2,
            nu_post: 2,
            directions: LineDirections::ALL,
            coarse_solve: CoarseSolve::Direct,
            use_krylov: false,
            max_levels: 12,
            min_coarse_cells: 16,
            divergence_factor: 10.0,
            divergence_patience: 3,
            cancel: None,
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> Result<(), EmError> {
        if !(self.tol > 0.0) {
            return Err(EmError::InvalidOption("tol must be positive"));
        }
        if self.max_iters == 0 {
            return Err(EmError::InvalidOption("max_iters must be at least 1"));
        }
        if self.max_levels == 0 {
            return Err(EmError::InvalidOption("max_levels must be at least 1"));
        }
        if self.directions.is_empty() {
            return Err(EmError::InvalidOption("at least one line direction required"));
        }
        if self.divergence_factor <= 1.0 {
            return Err(EmError::InvalidOption("divergence_factor must exceed 1"));
        }
        Ok(())
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_max_iters(mut self, n: usize) -> Self {
        self.max_iters = n;
        self
    }

    pub fn with_cycle(mut self, cycle: CycleType) -> Self {
        self.cycle = cycle;
        self
    }

    pub fn with_smoothing(mut self, nu_pre: usize, nu_post: usize) -> Self {
        self.nu_pre = nu_pre;
        self.nu_post = nu_post;
        self
    }

    pub fn with_krylov(mut self, on: bool) -> Self {
        self.use_krylov = on;
        self
    }

    pub fn with_coarse_solve(mut self, cs: CoarseSolve) -> Self {
        self.coarse_solve = cs;
        self
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_validate() {
        assert!(SolverOptions::default().validate().is_ok());
    }

    #[test]
    fn bad_options_are_rejected() {
        assert!(SolverOptions::default().with_tol(0.0).validate().is_err());
        assert!(SolverOptions::default().with_max_iters(0).validate().is_err());
        let mut o = SolverOptions::default();
        o.directions = LineDirections::empty();
        assert!(o.validate().is_err());
    }
}
