use nalgebra::RealField;

pub use nalgebra;

/// Real scalar type used by the EQP crates.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// Finite-difference helpers for verifying derivatives
pub mod calculus;
/// Nonnegative least squares by the active-set method
pub mod nnls;
