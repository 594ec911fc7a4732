use thiserror::Error;

// Unified error type for emgrid.
//
// Only structural (construction-time) problems are errors. Convergence
// outcomes (budget exhausted, detected divergence, cancellation) are
// reported through the `SolveStatus` on the convergence record instead,
// so the caller always gets the best field found.

#[derive(Error, Debug)]
pub enum EmError {
    #[error("grid axis {axis} has no cells")]
    EmptyAxis { axis: char },
    #[error("grid axis {axis}, cell {index}: non-positive width {width}")]
    NonPositiveWidth {
        axis: char,
        index: usize,
        width: f64,
    },
    #[error("model shape {got:?} does not match grid cell counts {expected:?}")]
    ShapeMismatch {
        got: [usize; 3],
        expected: [usize; 3],
    },
    #[error("model axis {axis}: {got} values for {expected} grid cells")]
    ModelLength {
        axis: char,
        got: usize,
        expected: usize,
    },
    #[error("axis {axis}, cell {index}: value {value} maps to non-positive conductivity")]
    NonPositiveConductivity {
        axis: char,
        index: usize,
        value: f64,
    },
    #[error("field edge shapes do not match the grid")]
    FieldShape,
    #[error("negative frequency {0} Hz")]
    NegativeFrequency(f64),
    #[error("invalid solver option: {0}")]
    InvalidOption(&'static str),
}
