pub mod convergence;

pub use convergence::{
    Convergence, ConvergenceRecord, DivergenceGuard, IterationRecord, SolveStatus,
};
