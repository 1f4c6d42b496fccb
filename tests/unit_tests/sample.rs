use eqp::sample::{candidate_locations, IntegratorCategory, InvalidSampleReason, Sample, SampleSet};
use util::integrators::{BoundaryFluxIntegrator, ConvectionIntegrator};
use util::mesh::{DiscontinuousQ1Space, StructuredQuadMesh, BOTTOM, LEFT, RIGHT, TOP};
use util::quadrature::GaussRule;

fn mesh() -> StructuredQuadMesh {
    StructuredQuadMesh::unit_square(2)
}

fn convection() -> ConvectionIntegrator {
    ConvectionIntegrator::new(mesh(), GaussRule::new(2), 1.0, [1.0, 0.0])
}

#[test]
fn full_pool_contains_every_point_with_reference_weight() {
    let integrator = convection();
    let pool = SampleSet::full_pool(&integrator, &[0, 1, 2, 3]);
    assert_eq!(pool.len(), 16);
    let sample = pool.samples()[5];
    assert_eq!((sample.location, sample.quadrature_point), (1, 1));
    assert!((sample.weight - 1.0).abs() < 1e-14);
    // Reference weights of the 2 x 2 Gauss rule sum to the area of the reference square
    assert!((pool.total_weight() - 16.0).abs() < 1e-12);
}

#[test]
fn full_pool_of_no_locations_is_empty() {
    let pool = SampleSet::full_pool(&convection(), &[]);
    assert!(pool.is_empty());
    assert_eq!(pool.total_weight(), 0.0);
}

#[test]
fn candidate_locations_respect_boundary_marker() {
    let space = DiscontinuousQ1Space::new(mesh());
    let all = candidate_locations::<f64, _>(&space, IntegratorCategory::BoundaryFace, None);
    assert_eq!(all, (0..8).collect::<Vec<_>>());

    let right = candidate_locations::<f64, _>(&space, IntegratorCategory::BoundaryFace, Some(&[RIGHT][..]));
    assert_eq!(right, vec![2, 3]);

    let bottom_left = candidate_locations::<f64, _>(&space, IntegratorCategory::BoundaryFace, Some(&[LEFT, BOTTOM][..]));
    assert_eq!(bottom_left, vec![0, 1, 6, 7]);

    // Markers only apply to boundary faces
    let elements = candidate_locations::<f64, _>(&space, IntegratorCategory::Domain, Some(&[TOP][..]));
    assert_eq!(elements, vec![0, 1, 2, 3]);
}

#[test]
fn validate_accepts_full_pool() {
    let space = DiscontinuousQ1Space::new(mesh());
    let integrator = convection();
    let pool = SampleSet::full_pool(&integrator, &[0, 1, 2, 3]);
    assert_eq!(pool.validate(&space, &integrator, IntegratorCategory::Domain, None), Ok(()));
}

#[test]
fn validate_reports_first_offending_sample() {
    let space = DiscontinuousQ1Space::new(mesh());
    let integrator = convection();
    let validate = |samples: Vec<Sample<f64>>| {
        SampleSet::from_samples(samples).validate(&space, &integrator, IntegratorCategory::Domain, None)
    };

    assert_eq!(
        validate(vec![Sample::new(0, 0, 1.0), Sample::new(4, 0, 1.0)]),
        Err((
            1,
            InvalidSampleReason::LocationOutOfRange {
                location: 4,
                num_locations: 4
            }
        ))
    );
    assert_eq!(
        validate(vec![Sample::new(3, 4, 1.0), Sample::new(9, 0, 1.0)]),
        Err((
            0,
            InvalidSampleReason::QuadraturePointOutOfRange {
                quadrature_point: 4,
                num_points: 4
            }
        ))
    );
    assert_eq!(
        validate(vec![Sample::new(2, 3, -0.5)]),
        Err((0, InvalidSampleReason::InvalidWeight { weight: -0.5 }))
    );
    assert!(matches!(
        validate(vec![Sample::new(2, 3, f64::NAN)]),
        Err((0, InvalidSampleReason::InvalidWeight { .. }))
    ));
    assert!(matches!(
        validate(vec![Sample::new(2, 3, f64::INFINITY)]),
        Err((0, InvalidSampleReason::InvalidWeight { .. }))
    ));
    // Zero weights are allowed
    assert_eq!(validate(vec![Sample::new(2, 3, 0.0)]), Ok(()));
}

#[test]
fn validate_rejects_unmarked_boundary_faces() {
    let space = DiscontinuousQ1Space::new(mesh());
    let integrator = BoundaryFluxIntegrator::new(mesh(), GaussRule::new(2), 1.0, [1.0, 0.0]);
    let samples = SampleSet::from_samples(vec![Sample::new(2, 0, 0.5), Sample::new(0, 1, 0.5)]);

    let marker = [RIGHT];
    assert_eq!(
        samples.validate(&space, &integrator, IntegratorCategory::BoundaryFace, Some(&marker[..])),
        Err((
            1,
            InvalidSampleReason::UnmarkedBoundaryFace {
                face: 0,
                attribute: BOTTOM
            }
        ))
    );
    assert_eq!(
        samples.validate(&space, &integrator, IntegratorCategory::BoundaryFace, None),
        Ok(())
    );
}

#[test]
fn sample_set_serializes_as_list() {
    let samples = SampleSet::from_samples(vec![Sample::new(3, 1, 0.25)]);
    let json = serde_json::to_string(&samples).unwrap();
    assert_eq!(json, r#"[{"location":3,"quadrature_point":1,"weight":0.25}]"#);

    let deserialized: SampleSet<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, samples);
}

#[test]
fn category_display() {
    assert_eq!(IntegratorCategory::Domain.to_string(), "domain");
    assert_eq!(IntegratorCategory::InteriorFace.to_string(), "interior face");
    assert_eq!(IntegratorCategory::BoundaryFace.to_string(), "boundary face");
}
