//! Shared test support: a structured quadrilateral mesh, a discontinuous bilinear space and a set of
//! reference integrands with hand-written Jacobians and multilinear forms.
pub mod fixtures;
pub mod integrators;
pub mod mesh;
pub mod quadrature;

pub use nalgebra;

#[macro_export]
macro_rules! assert_panics {
    ($e:expr) => {{
        use std::panic::catch_unwind;
        use std::stringify;
        let expr_string = stringify!($e);
        let result = catch_unwind(|| $e);
        if result.is_ok() {
            panic!("assert_panics!({}) failed.", expr_string);
        }
    }};
}
