//! emgrid: geometric multigrid for frequency-domain EM diffusion
//!
//! This crate provides a matrix-free geometric multigrid solver for the
//! electromagnetic diffusion equation `∇×∇×E - iωμ₀σE = -iωμ₀Jₛ` discretized
//! on a 3D staggered (Yee) tensor-product grid, with tri-axial electrical
//! anisotropy. The multigrid cycle can be used standalone or as a
//! preconditioner inside a BiCGSTAB iteration for high-contrast models.

pub mod config;
pub mod core;
pub mod error;
pub mod field;
pub mod mesh;
pub mod model;
pub mod operator;
pub mod smoother;
pub mod solver;
pub mod transfer;
pub mod utils;

// Re-exports for convenience
pub use config::*;
pub use core::*;
pub use error::*;
pub use field::*;
pub use mesh::*;
pub use model::*;
pub use operator::*;
pub use smoother::*;
pub use solver::*;
pub use transfer::*;
pub use utils::*;

/// Magnetic permeability of free space [H/m].
pub const MU_0: f64 = 4.0e-7 * std::f64::consts::PI;
