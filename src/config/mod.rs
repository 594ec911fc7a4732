pub mod options;

pub use options::{CoarseSolve, CycleType, SolverOptions};
