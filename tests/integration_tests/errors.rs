use eqp::error::HyperReductionError;
use eqp::operator::HyperReducedOperator;
use eqp::precompute::PrecomputeCapability;
use eqp::sample::{IntegratorCategory, Sample, SampleSet};
use nalgebra::{DMatrix, DVector};
use std::error::Error;
use util::fixtures::{deterministic_rng, orthonormal_basis, TestProblem};
use util::integrators::ExponentialReactionIntegrator;
use util::mesh::StructuredQuadMesh;
use util::quadrature::GaussRule;

#[test]
fn evaluation_requires_basis_and_integrators() {
    let problem = TestProblem::new(2);
    let x = DVector::zeros(2);

    let operator = problem.operator();
    assert!(matches!(operator.mult(&x), Err(HyperReductionError::MissingBasis)));
    assert!(matches!(operator.gradient(&x), Err(HyperReductionError::MissingBasis)));

    let mut empty = HyperReducedOperator::<f64, _>::new(problem.space);
    empty
        .set_basis(orthonormal_basis(&mut deterministic_rng(), problem.num_dofs(), 2))
        .unwrap();
    assert_eq!(empty.num_integrators(), 0);
    assert!(matches!(empty.mult(&x), Err(HyperReductionError::MissingIntegrators)));
    assert!(matches!(
        empty.precompute_coefficients(),
        Err(HyperReductionError::MissingIntegrators)
    ));
}

#[test]
fn dimensions_are_checked() {
    let problem = TestProblem::new(2);
    let mut operator = problem.operator();

    let err = operator.set_basis(DMatrix::zeros(problem.num_dofs() + 1, 2)).unwrap_err();
    assert!(matches!(
        err,
        HyperReductionError::DimensionMismatch {
            quantity: "basis rows",
            expected: 16,
            actual: 17
        }
    ));
    assert!(operator.basis().is_none());

    operator
        .set_basis(orthonormal_basis(&mut deterministic_rng(), problem.num_dofs(), 2))
        .unwrap();
    assert!(matches!(
        operator.mult(&DVector::zeros(3)),
        Err(HyperReductionError::DimensionMismatch {
            quantity: "reduced state",
            ..
        })
    ));
    let mut y = DVector::zeros(5);
    assert!(matches!(
        operator.mult_into(&DVector::zeros(2), &mut y),
        Err(HyperReductionError::DimensionMismatch {
            quantity: "reduced output",
            ..
        })
    ));
    assert!(matches!(
        operator.train(&DMatrix::zeros(3, 2), &Default::default()),
        Err(HyperReductionError::DimensionMismatch {
            quantity: "snapshot rows",
            ..
        })
    ));
}

#[test]
fn training_requires_basis() {
    let problem = TestProblem::new(2);
    let (mut operator, ids) = problem.operator_with_ids();
    let snapshots = DMatrix::zeros(problem.num_dofs(), 1);
    assert!(matches!(
        operator.train(&snapshots, &Default::default()),
        Err(HyperReductionError::MissingBasis)
    ));
    assert!(matches!(
        operator.setup_training_system(ids[0], &snapshots),
        Err(HyperReductionError::MissingBasis)
    ));
}

#[test]
fn unknown_integrator_is_rejected() {
    let problem = TestProblem::new(2);
    let mut operator = problem.operator();
    let mut larger = problem.operator();
    let foreign = larger.add_domain_integrator(problem.convection.clone());
    assert!(matches!(
        operator.samples(foreign),
        Err(HyperReductionError::UnknownIntegrator(id)) if id == foreign
    ));
    assert!(matches!(
        operator.update_sampling(foreign, SampleSet::new()),
        Err(HyperReductionError::UnknownIntegrator(_))
    ));
    assert!(operator.category(foreign).is_err());
}

#[test]
fn invalid_samples_are_rejected() {
    let problem = TestProblem::new(2);
    let (mut operator, [convection, _, _, outflow]) = problem.operator_with_ids();

    let err = operator
        .update_sampling(convection, SampleSet::from_samples(vec![Sample::new(0, 0, -1.0)]))
        .unwrap_err();
    assert!(matches!(err, HyperReductionError::InvalidSample { position: 0, .. }));

    // Face 0 is on the bottom boundary, which is not part of the outflow marker
    let err = operator
        .update_sampling(outflow, SampleSet::from_samples(vec![Sample::new(0, 0, 1.0)]))
        .unwrap_err();
    assert!(matches!(
        err,
        HyperReductionError::InvalidSample {
            category: IntegratorCategory::BoundaryFace,
            ..
        }
    ));
    assert!(err.to_string().contains("boundary face"));

    // The previous samples are kept
    assert_eq!(
        operator.samples(convection).unwrap().len(),
        operator.candidate_pool_size(convection).unwrap()
    );

    // A valid replacement is installed
    let samples = SampleSet::from_samples(vec![Sample::new(3, 8, 2.0)]);
    operator.update_sampling(convection, samples.clone()).unwrap();
    assert_eq!(operator.samples(convection).unwrap(), &samples);
}

#[test]
fn precompute_mode_requires_capable_integrators() {
    let problem = TestProblem::new(2);
    let mut operator = problem.operator();
    let mesh = StructuredQuadMesh::unit_square(2);
    let exponential = operator.add_domain_integrator(ExponentialReactionIntegrator::new(mesh, GaussRule::new(2), 1.0));

    let err = operator.set_precompute_mode(true).unwrap_err();
    match err {
        HyperReductionError::UnsupportedPrecompute {
            integrator,
            category,
            capability,
        } => {
            assert_eq!(integrator, exponential);
            assert_eq!(category, IntegratorCategory::Domain);
            assert_eq!(capability, PrecomputeCapability::unsupported());
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!operator.precompute_mode());
}

#[test]
fn precompute_mode_without_coefficients_is_an_error() {
    let problem = TestProblem::new(2);
    let mut operator = problem.operator();
    operator
        .set_basis(orthonormal_basis(&mut deterministic_rng(), problem.num_dofs(), 2))
        .unwrap();
    operator.set_precompute_mode(true).unwrap();

    let x = DVector::zeros(2);
    assert!(matches!(
        operator.mult(&x),
        Err(HyperReductionError::MissingPrecompute { .. })
    ));
    assert!(matches!(
        operator.gradient(&x),
        Err(HyperReductionError::MissingPrecompute { .. })
    ));

    operator.precompute_coefficients().unwrap();
    assert!(operator.mult(&x).is_ok());
}

#[test]
fn precompute_requires_basis() {
    let problem = TestProblem::new(2);
    let mut operator = problem.operator();
    operator.set_precompute_mode(true).unwrap();
    assert!(matches!(
        operator.precompute_coefficients(),
        Err(HyperReductionError::MissingBasis)
    ));
}

#[test]
fn training_failure_carries_cause() {
    let problem = TestProblem::new(2);
    let mut rng = deterministic_rng();
    let phi = orthonormal_basis(&mut rng, problem.num_dofs(), 2);
    let snapshots = &phi * DMatrix::from_element(2, 1, 1.0);
    let (mut operator, ids) = problem.operator_with_ids();
    operator.set_basis(phi).unwrap();

    let settings = eqp::eqp::EqpSettings {
        tolerance: 1e-8,
        max_iterations: Some(0),
        weight_cutoff: 0.0,
    };
    let err = operator.train_integrator(ids[1], &snapshots, &settings).unwrap_err();
    assert!(matches!(
        err,
        HyperReductionError::TrainingNonconvergence {
            category: IntegratorCategory::Domain,
            ..
        }
    ));
    assert!(err.source().is_some());
    // Samples are left as they were
    assert_eq!(
        operator.samples(ids[1]).unwrap().len(),
        operator.candidate_pool_size(ids[1]).unwrap()
    );
}

#[test]
fn integrator_added_in_precompute_mode_must_be_capable() {
    let problem = TestProblem::new(2);
    let mut operator = problem.operator();
    operator
        .set_basis(orthonormal_basis(&mut deterministic_rng(), problem.num_dofs(), 2))
        .unwrap();
    operator.set_precompute_mode(true).unwrap();
    operator.precompute_coefficients().unwrap();

    let mesh = StructuredQuadMesh::unit_square(2);
    let exponential = operator.add_domain_integrator(ExponentialReactionIntegrator::new(mesh, GaussRule::new(2), 1.0));

    let x = DVector::zeros(2);
    for err in [operator.mult(&x).unwrap_err(), operator.gradient(&x).unwrap_err()] {
        assert!(matches!(
            err,
            HyperReductionError::UnsupportedPrecompute { integrator, .. } if integrator == exponential
        ));
    }
    assert!(matches!(
        operator.precompute_coefficients(),
        Err(HyperReductionError::UnsupportedPrecompute { .. })
    ));

    operator.set_precompute_mode(false).unwrap();
    assert!(operator.mult(&x).is_ok());
}
