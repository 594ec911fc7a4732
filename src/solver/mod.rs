//! Solve drivers.
//!
//! [`solve`] is the front door: given a prebuilt [`Hierarchy`] and a source
//! current density, it forms the scaled right-hand side, runs either the
//! standalone multigrid iteration or the multigrid-preconditioned BiCGSTAB,
//! and returns the field together with its convergence record.

pub mod bicgstab;
pub mod hierarchy;
pub mod multigrid;

pub use bicgstab::bicgstab;
pub use hierarchy::{Hierarchy, Level};
pub use multigrid::{CoarseDirect, MgCycle, solve_cycles};

use crate::config::SolverOptions;
use crate::error::EmError;
use crate::field::Field;
use crate::utils::ConvergenceRecord;

/// Field plus the diagnostics of the iteration that produced it.
#[derive(Debug, Clone)]
pub struct Solution {
    pub field: Field,
    pub record: ConvergenceRecord,
}

/// Solve for the electric field excited by the source current density
/// `source`, starting from a zero field.
pub fn solve(
    hier: &Hierarchy,
    source: &Field,
    opts: &SolverOptions,
) -> Result<Solution, EmError> {
    let guess = Field::zeros(&hier.finest().grid);
    solve_with_guess(hier, source, guess, opts)
}

/// Like [`solve`], but warm-started from `guess` (useful across nearby
/// frequencies or model perturbations).
pub fn solve_with_guess(
    hier: &Hierarchy,
    source: &Field,
    mut guess: Field,
    opts: &SolverOptions,
) -> Result<Solution, EmError> {
    opts.validate()?;
    let grid = &hier.finest().grid;
    source.check_shape(grid)?;
    guess.check_shape(grid)?;

    // Right-hand side -iωμ₀ Jₛ; at ω = 0 the magnetostatic source enters
    // unscaled. Tangential boundary entries are fixed at zero either way.
    let mut rhs = source.clone();
    let s = hier.finest().op.mass_scale();
    if s.norm() > 0.0 {
        rhs.scale(s);
    }
    rhs.zero_boundary();
    guess.zero_boundary();

    let record = if opts.use_krylov {
        let cycler = MgCycle::new(hier, opts);
        let op = &hier.finest().op;
        bicgstab(
            op,
            |r: &Field, z: &mut Field| {
                z.set_zero();
                cycler.cycle(z, r)
            },
            &rhs,
            &mut guess,
            opts,
        )
    } else {
        solve_cycles(hier, &rhs, &mut guess, opts)
    };

    Ok(Solution {
        field: guess,
        record,
    })
}
