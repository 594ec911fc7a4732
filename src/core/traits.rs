//! Core operator traits for emgrid.

use crate::field::Field;

/// Capability set of an operator usable by the Krylov iteration: apply the
/// operator and expose its diagonal. The multigrid cycle needs the full
/// geometric [`CurlCurlOperator`](crate::operator::CurlCurlOperator), but
/// anything satisfying this trait can sit inside the BiCGSTAB loop, e.g. a
/// small explicit-matrix reference implementation in tests.
pub trait LinearOperator {
    /// Compute y = A · x.
    fn apply(&self, x: &Field, y: &mut Field);

    /// Field-shaped main diagonal of A.
    fn diagonal(&self) -> Field;

    /// out = rhs - A·x. Default goes through [`apply`](Self::apply).
    fn residual_into(&self, rhs: &Field, x: &Field, out: &mut Field) {
        let mut ax = rhs.clone();
        self.apply(x, &mut ax);
        out.assign_diff(rhs, &ax);
    }
}
