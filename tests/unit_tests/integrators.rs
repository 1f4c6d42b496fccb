//! Consistency checks of the reference integrands used throughout the tests.
use eqp::assembly::local::QuadratureIntegrator;
use eqp::optimize::calculus::approximate_jacobian_fd;
use eqp::sample::IntegratorCategory;
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};
use util::fixtures::{deterministic_rng, random_vector, VELOCITY};
use util::integrators::*;
use util::mesh::StructuredQuadMesh;
use util::quadrature::GaussRule;

fn mesh() -> StructuredQuadMesh {
    StructuredQuadMesh::new(3, 2, 1.5, 1.0)
}

fn reference_integrators() -> Vec<(Box<dyn QuadratureIntegrator<f64>>, IntegratorCategory)> {
    let rule = GaussRule::new(3);
    vec![
        (
            Box::new(ConvectionIntegrator::new(mesh(), rule.clone(), 0.7, VELOCITY)),
            IntegratorCategory::Domain,
        ),
        (
            Box::new(DiffusionIntegrator::new(mesh(), rule.clone(), 0.3)),
            IntegratorCategory::Domain,
        ),
        (
            Box::new(CubicReactionIntegrator::new(mesh(), rule.clone(), 2.0)),
            IntegratorCategory::Domain,
        ),
        (
            Box::new(SourceIntegrator::new(mesh(), rule.clone(), -1.5)),
            IntegratorCategory::Domain,
        ),
        (
            Box::new(ExponentialReactionIntegrator::new(mesh(), rule.clone(), 0.5)),
            IntegratorCategory::Domain,
        ),
        (
            Box::new(CentralFluxIntegrator::new(mesh(), rule.clone(), 1.2, VELOCITY)),
            IntegratorCategory::InteriorFace,
        ),
        (
            Box::new(BoundaryFluxIntegrator::new(mesh(), rule, 0.9, VELOCITY)),
            IntegratorCategory::BoundaryFace,
        ),
    ]
}

fn local_size(category: IntegratorCategory) -> usize {
    match category {
        IntegratorCategory::InteriorFace => 8,
        _ => 4,
    }
}

#[test]
fn reference_weights_match_rule() {
    for (integrator, category) in reference_integrators() {
        let weights = integrator.quadrature_weights(1);
        let expected_len = match category {
            IntegratorCategory::Domain => 9,
            _ => 3,
        };
        assert_eq!(weights.len(), expected_len);
        let total: f64 = weights.iter().sum();
        let expected_total = match category {
            IntegratorCategory::Domain => 4.0,
            _ => 2.0,
        };
        assert!((total - expected_total).abs() < 1e-13);
    }
}

#[test]
fn gradients_agree_with_finite_differences() {
    let mut rng = deterministic_rng();
    for (integrator, category) in reference_integrators() {
        let n = local_size(category);
        for location in [0, 2] {
            for q in [0, 2] {
                let mut u = random_vector(&mut rng, n);
                let weight = 0.8;

                let mut gradient = DMatrix::zeros(n, n);
                integrator
                    .assemble_quadrature_gradient(location, q, weight, DVectorView::from(&u), (&mut gradient).into())
                    .unwrap();

                let f = |u: DVectorView<f64>, mut output: DVectorViewMut<f64>| {
                    output.fill(0.0);
                    integrator
                        .assemble_quadrature_vector(location, q, weight, u, output)
                        .unwrap();
                };
                let fd = approximate_jacobian_fd(n, f, &mut u, 1e-6);
                assert_matrix_eq!(gradient, fd, comp = abs, tol = 1e-7);
            }
        }
    }
}

#[test]
fn multilinear_diagonal_reproduces_integrand() {
    let mut rng = deterministic_rng();
    for (integrator, category) in reference_integrators() {
        let capability = integrator.precompute_capability();
        if !capability.is_available() {
            continue;
        }
        let n = local_size(category);
        let u = random_vector(&mut rng, n);
        let weight = 1.3;

        let mut expected = DVector::zeros(n);
        integrator
            .assemble_quadrature_vector(1, 1, weight, DVectorView::from(&u), (&mut expected).into())
            .unwrap();

        let arguments = vec![DVectorView::from(&u); capability.polynomial_degree];
        let mut diagonal = DVector::zeros(n);
        integrator
            .assemble_quadrature_multilinear(1, 1, weight, &arguments, (&mut diagonal).into())
            .unwrap();

        assert_matrix_eq!(diagonal, expected, comp = abs, tol = 1e-13);
    }
}

#[test]
fn exponential_reaction_has_no_multilinear_form() {
    let integrator = ExponentialReactionIntegrator::new(mesh(), GaussRule::new(2), 1.0);
    assert!(!integrator.precompute_capability().is_available());
    let u = DVector::zeros(4);
    let mut output = DVector::zeros(4);
    let result = integrator.assemble_quadrature_multilinear(0, 0, 1.0, &[DVectorView::from(&u)], (&mut output).into());
    assert!(result.is_err());
}

#[test]
fn multilinear_form_rejects_wrong_number_of_arguments() {
    let integrator = ConvectionIntegrator::new(mesh(), GaussRule::new(2), 1.0, VELOCITY);
    let u = DVector::zeros(4);
    let mut output = DVector::zeros(4);
    let result = integrator.assemble_quadrature_multilinear(0, 0, 1.0, &[DVectorView::from(&u)], (&mut output).into());
    assert!(result.is_err());
}
