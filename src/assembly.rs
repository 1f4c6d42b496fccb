//! Collaborator interfaces and full-order assembly.
//!
//! [`local`] defines the traits through which the caller's degree-of-freedom map and integrands
//! are consumed. [`global`] assembles the unreduced operator over complete candidate pools,
//! which every reduced path must reproduce.

pub mod buffers;
pub mod global;
pub mod local;
