//! Hyperreduction of nonlinear finite element operators by the Empirical Quadrature Procedure (EQP).
//!
//! A reduced-order model evaluates residuals of the form $\Phi^T F(\Phi x)$, where $\Phi$ is an
//! $N \times R$ reduced basis. Evaluating $F$ requires a pass over every quadrature point of the mesh,
//! which defeats the purpose of the reduction. EQP replaces the full quadrature by a sparse set of
//! nonnegatively weighted points, trained on full-order snapshots by nonnegative least squares.
//!
//! The main entry point is [`operator::HyperReducedOperator`], which combines
//!
//! - the sample model ([`sample`]) and the basis holder ([`basis`]),
//! - the direct sample-driven evaluator ([`direct`]),
//! - the precomputed tensor evaluator for polynomial integrands ([`precompute`]),
//! - the trainer ([`eqp`]).
//!
//! The mesh, the degree-of-freedom map and the integrands are provided by the caller through the
//! traits in [`assembly::local`].

pub mod assembly;
pub mod basis;
pub mod direct;
pub mod eqp;
pub mod error;
pub mod io;
pub mod jacobian;
pub mod operator;
pub mod partition;
pub mod precompute;
pub mod sample;

pub mod optimize {
    pub use eqp_optimize::*;
}

pub use eqp_optimize::Real;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
