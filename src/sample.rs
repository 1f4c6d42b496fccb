//! Quadrature samples and sample sets.
use crate::assembly::local::{DofMap, QuadratureIntegrator};
use crate::Real;
use nalgebra::Scalar;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;

/// The kind of mesh entity an integrator is evaluated on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IntegratorCategory {
    /// Element interiors.
    Domain,
    /// Faces shared by two elements.
    InteriorFace,
    /// Faces on the boundary of the domain.
    BoundaryFace,
}

impl Display for IntegratorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegratorCategory::Domain => write!(f, "domain"),
            IntegratorCategory::InteriorFace => write!(f, "interior face"),
            IntegratorCategory::BoundaryFace => write!(f, "boundary face"),
        }
    }
}

/// A single weighted quadrature point.
///
/// The location is an element index for [`IntegratorCategory::Domain`], and an index into the
/// interior or boundary face numbering of the [`DofMap`] for the face categories.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample<T> {
    pub location: usize,
    pub quadrature_point: usize,
    pub weight: T,
}

impl<T> Sample<T> {
    pub fn new(location: usize, quadrature_point: usize, weight: T) -> Self {
        Self {
            location,
            quadrature_point,
            weight,
        }
    }
}

/// Reasons for rejecting a sample.
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidSampleReason {
    LocationOutOfRange { location: usize, num_locations: usize },
    QuadraturePointOutOfRange { quadrature_point: usize, num_points: usize },
    UnmarkedBoundaryFace { face: usize, attribute: usize },
    /// Weights must be finite and nonnegative.
    InvalidWeight { weight: f64 },
}

impl Display for InvalidSampleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidSampleReason::LocationOutOfRange { location, num_locations } => {
                write!(f, "location {} is out of range (number of locations: {})", location, num_locations)
            }
            InvalidSampleReason::QuadraturePointOutOfRange {
                quadrature_point,
                num_points,
            } => write!(
                f,
                "quadrature point {} is out of range (number of points: {})",
                quadrature_point, num_points
            ),
            InvalidSampleReason::UnmarkedBoundaryFace { face, attribute } => write!(
                f,
                "boundary face {} has attribute {}, which is not in the integrator's marker",
                face, attribute
            ),
            InvalidSampleReason::InvalidWeight { weight } => {
                write!(f, "weight {} is negative or not finite", weight)
            }
        }
    }
}

/// An ordered collection of samples belonging to one integrator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleSet<T> {
    samples: Vec<Sample<T>>,
}

impl<T> SampleSet<T> {
    pub fn new() -> Self {
        Self { samples: Vec::new() }
    }

    pub fn from_samples(samples: Vec<Sample<T>>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample<T>] {
        &self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample<T>> {
        self.samples.iter()
    }

    pub fn into_samples(self) -> Vec<Sample<T>> {
        self.samples
    }
}

impl<T: Real> SampleSet<T> {
    /// Every quadrature point of every given location, weighted by the reference rule.
    ///
    /// Direct evaluation with this sample set reproduces the unreduced projected integral.
    pub fn full_pool<I>(integrator: &I, locations: &[usize]) -> Self
    where
        I: ?Sized + QuadratureIntegrator<T>,
    {
        let samples = locations
            .iter()
            .flat_map(|&location| {
                integrator
                    .quadrature_weights(location)
                    .iter()
                    .enumerate()
                    .map(move |(q, &w)| Sample::new(location, q, w))
            })
            .collect();
        Self { samples }
    }

    pub fn total_weight(&self) -> T {
        self.samples
            .iter()
            .fold(T::zero(), |acc, sample| acc + sample.weight)
    }

    /// Checks every sample against the location numbering of `space` and the quadrature rule of
    /// `integrator`.
    ///
    /// On failure, returns the position of the first offending sample together with the reason.
    pub fn validate<S, I>(
        &self,
        space: &S,
        integrator: &I,
        category: IntegratorCategory,
        boundary_marker: Option<&[usize]>,
    ) -> Result<(), (usize, InvalidSampleReason)>
    where
        S: ?Sized + DofMap<T>,
        I: ?Sized + QuadratureIntegrator<T>,
    {
        let num_locations = space.num_locations(category);
        for (position, sample) in self.samples.iter().enumerate() {
            let reason = validate_sample(space, integrator, category, boundary_marker, num_locations, sample);
            if let Some(reason) = reason {
                return Err((position, reason));
            }
        }
        Ok(())
    }
}

fn validate_sample<T, S, I>(
    space: &S,
    integrator: &I,
    category: IntegratorCategory,
    boundary_marker: Option<&[usize]>,
    num_locations: usize,
    sample: &Sample<T>,
) -> Option<InvalidSampleReason>
where
    T: Real,
    S: ?Sized + DofMap<T>,
    I: ?Sized + QuadratureIntegrator<T>,
{
    if sample.location >= num_locations {
        return Some(InvalidSampleReason::LocationOutOfRange {
            location: sample.location,
            num_locations,
        });
    }

    if let (IntegratorCategory::BoundaryFace, Some(marker)) = (category, boundary_marker) {
        let attribute = space.boundary_attribute(sample.location);
        if !marker.contains(&attribute) {
            return Some(InvalidSampleReason::UnmarkedBoundaryFace {
                face: sample.location,
                attribute,
            });
        }
    }

    let num_points = integrator.quadrature_weights(sample.location).len();
    if sample.quadrature_point >= num_points {
        return Some(InvalidSampleReason::QuadraturePointOutOfRange {
            quadrature_point: sample.quadrature_point,
            num_points,
        });
    }

    if !sample.weight.is_finite() || sample.weight < T::zero() {
        return Some(InvalidSampleReason::InvalidWeight {
            weight: nalgebra::try_convert(sample.weight).unwrap_or(f64::NAN),
        });
    }

    None
}

/// Lists the candidate locations of a category.
///
/// For boundary faces, a marker restricts the candidates to faces whose attribute it contains.
pub fn candidate_locations<T, S>(space: &S, category: IntegratorCategory, boundary_marker: Option<&[usize]>) -> Vec<usize>
where
    T: Scalar,
    S: ?Sized + DofMap<T>,
{
    let num_locations = space.num_locations(category);
    match (category, boundary_marker) {
        (IntegratorCategory::BoundaryFace, Some(marker)) => (0..num_locations)
            .filter(|&face| marker.contains(&space.boundary_attribute(face)))
            .collect(),
        _ => (0..num_locations).collect(),
    }
}
