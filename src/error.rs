use crate::eqp::TrainingFailure;
use crate::operator::IntegratorId;
use crate::precompute::PrecomputeCapability;
use crate::sample::{IntegratorCategory, InvalidSampleReason};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Errors reported by [`HyperReducedOperator`](crate::operator::HyperReducedOperator).
///
/// All of these abort the current call. They signal misconfiguration or unmet mathematical
/// preconditions and carry the integrator and category involved, where applicable.
#[derive(Debug)]
pub enum HyperReductionError {
    /// No basis has been set.
    MissingBasis,
    /// No integrator has been registered.
    MissingIntegrators,
    UnknownIntegrator(IntegratorId),
    /// Precompute mode is enabled, but the integrator has no tensors for its current samples.
    MissingPrecompute {
        integrator: IntegratorId,
        category: IntegratorCategory,
    },
    TrainingNonconvergence {
        integrator: IntegratorId,
        category: IntegratorCategory,
        cause: TrainingFailure,
    },
    UnsupportedPrecompute {
        integrator: IntegratorId,
        category: IntegratorCategory,
        capability: PrecomputeCapability,
    },
    DimensionMismatch {
        quantity: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A persisted sample set belongs to an integrator of a different category.
    CategoryMismatch {
        integrator: IntegratorId,
        expected: IntegratorCategory,
        actual: IntegratorCategory,
    },
    InvalidSample {
        integrator: IntegratorId,
        category: IntegratorCategory,
        /// Position of the offending sample in its sample set.
        position: usize,
        reason: InvalidSampleReason,
    },
    /// An integrand reported a failure.
    Integrand {
        integrator: IntegratorId,
        category: IntegratorCategory,
        source: eyre::Report,
    },
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl Display for HyperReductionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use HyperReductionError::*;
        match self {
            MissingBasis => write!(f, "No reduced basis has been set."),
            MissingIntegrators => write!(f, "No integrators have been registered."),
            UnknownIntegrator(id) => write!(f, "Unknown integrator {}.", id),
            MissingPrecompute { integrator, category } => write!(
                f,
                "Precompute mode is enabled, but {} integrator {} has no precomputed coefficients for its samples.",
                category, integrator
            ),
            TrainingNonconvergence {
                integrator,
                category,
                cause,
            } => write!(
                f,
                "Training of {} integrator {} did not converge: {}",
                category, integrator, cause
            ),
            UnsupportedPrecompute {
                integrator,
                category,
                capability,
            } => write!(
                f,
                "Cannot precompute {} integrator {} (capability: {}).",
                category, integrator, capability
            ),
            DimensionMismatch {
                quantity,
                expected,
                actual,
            } => write!(f, "Dimension mismatch for {}: expected {}, got {}.", quantity, expected, actual),
            CategoryMismatch {
                integrator,
                expected,
                actual,
            } => write!(
                f,
                "Integrator {} has category {}, but the sample set is for category {}.",
                integrator, expected, actual
            ),
            InvalidSample {
                integrator,
                category,
                position,
                reason,
            } => write!(
                f,
                "Invalid sample at position {} for {} integrator {}: {}.",
                position, category, integrator, reason
            ),
            Integrand {
                integrator,
                category,
                source,
            } => write!(f, "Integrand of {} integrator {} failed: {}", category, integrator, source),
            Io(err) => write!(f, "I/O error: {}", err),
            Serialization(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl Error for HyperReductionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HyperReductionError::TrainingNonconvergence { cause, .. } => Some(cause),
            HyperReductionError::Integrand { source, .. } => Some(&**source),
            HyperReductionError::Io(err) => Some(err),
            HyperReductionError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for HyperReductionError {
    fn from(err: std::io::Error) -> Self {
        HyperReductionError::Io(err)
    }
}

impl From<serde_json::Error> for HyperReductionError {
    fn from(err: serde_json::Error) -> Self {
        HyperReductionError::Serialization(err)
    }
}
