use eqp::basis::ReducedBasis;
use eqp::jacobian::Jacobian;
use eqp::optimize::calculus::check_directional_derivative;
use matrixcompare::assert_matrix_eq;
use nalgebra::{DVector, DVectorView};
use util::fixtures::{deterministic_rng, orthonormal_basis, random_vector, TestProblem};

const REDUCED_DIMENSION: usize = 4;

fn problems() -> [TestProblem; 2] {
    [TestProblem::new(3), TestProblem::new(3).with_flipped_orientations()]
}

#[test]
fn full_sampling_reproduces_projected_residual() {
    let mut rng = deterministic_rng();
    for problem in problems() {
        let phi = orthonormal_basis(&mut rng, problem.num_dofs(), REDUCED_DIMENSION);
        let basis = ReducedBasis::from(phi.clone());
        let mut operator = problem.operator();
        operator.set_basis(phi).unwrap();

        for _ in 0..3 {
            let x = random_vector(&mut rng, REDUCED_DIMENSION);
            let y = operator.mult(&x).unwrap();
            let expected = basis.project(&problem.full_residual(&basis.expand(&x)).unwrap());
            assert_matrix_eq!(y, expected, comp = abs, tol = 1e-12);
        }
    }
}

#[test]
fn full_sampling_reproduces_projected_jacobian() {
    let mut rng = deterministic_rng();
    for problem in problems() {
        let phi = orthonormal_basis(&mut rng, problem.num_dofs(), REDUCED_DIMENSION);
        let basis = ReducedBasis::from(phi.clone());
        let mut operator = problem.operator();
        operator.set_basis(phi).unwrap();

        let x = random_vector(&mut rng, REDUCED_DIMENSION);
        let gradient = operator.gradient(&x).unwrap();
        assert_eq!((gradient.nrows(), gradient.ncols()), (REDUCED_DIMENSION, REDUCED_DIMENSION));
        assert!(gradient.as_dense().is_some());

        let full = Jacobian::Sparse(problem.full_jacobian(&basis.expand(&x)).unwrap());
        assert_matrix_eq!(gradient.into_dense(), full.project_onto(&basis), comp = abs, tol = 1e-12);
    }
}

#[test]
fn precomputed_evaluation_agrees_with_direct_evaluation() {
    let mut rng = deterministic_rng();
    for problem in problems() {
        let phi = orthonormal_basis(&mut rng, problem.num_dofs(), REDUCED_DIMENSION);
        let mut operator = problem.operator();
        operator.set_basis(phi).unwrap();

        let x = random_vector(&mut rng, REDUCED_DIMENSION);
        let y_direct = operator.mult(&x).unwrap();
        let j_direct = operator.gradient(&x).unwrap().into_dense();

        operator.set_precompute_mode(true).unwrap();
        operator.precompute_coefficients().unwrap();
        assert!(operator.precompute_mode());
        let y_tensor = operator.mult(&x).unwrap();
        let j_tensor = operator.gradient(&x).unwrap().into_dense();

        assert_matrix_eq!(y_tensor, y_direct, comp = abs, tol = 1e-12);
        assert_matrix_eq!(j_tensor, j_direct, comp = abs, tol = 1e-12);

        operator.set_precompute_mode(false).unwrap();
        assert_matrix_eq!(operator.mult(&x).unwrap(), y_direct, comp = abs, tol = 0.0);
    }
}

#[test]
fn mult_into_overwrites_output() {
    let mut rng = deterministic_rng();
    let problem = TestProblem::new(2);
    let mut operator = problem.operator();
    operator
        .set_basis(orthonormal_basis(&mut rng, problem.num_dofs(), 2))
        .unwrap();

    let x = random_vector(&mut rng, 2);
    let mut y = DVector::from_element(2, 100.0);
    operator.mult_into(&x, &mut y).unwrap();
    assert_matrix_eq!(y, operator.mult(&x).unwrap(), comp = abs, tol = 0.0);
}

/// Verifies the reduced Jacobian against finite differences of $\frac{1}{2} \norm{y(x)}^2$.
fn check_gradient_by_finite_differences(precompute: bool) {
    let mut rng = deterministic_rng();
    let problem = TestProblem::new(3);
    let mut operator = problem.operator();
    operator
        .set_basis(orthonormal_basis(&mut rng, problem.num_dofs(), REDUCED_DIMENSION))
        .unwrap();
    if precompute {
        operator.set_precompute_mode(true).unwrap();
        operator.precompute_coefficients().unwrap();
    }

    let x = random_vector(&mut rng, REDUCED_DIMENSION);
    let y = operator.mult(&x).unwrap();
    let g = operator.gradient(&x).unwrap().transpose_mul(&y);
    let g_norm = g.norm();
    let direction = &g / g_norm;

    let objective = |x: DVectorView<f64>| 0.5 * operator.mult(x).unwrap().norm_squared();
    let check = check_directional_derivative(
        objective,
        DVectorView::from(&x),
        DVectorView::from(&direction),
        g_norm,
        10.0f64.powf(-0.25),
        60,
    );

    let min_error = check.min_error().unwrap();
    assert!(min_error < 1e-7, "finite difference error {:e} is too large", min_error);
}

#[test]
fn gradient_agrees_with_finite_differences() {
    check_gradient_by_finite_differences(false);
}

#[test]
fn precomputed_gradient_agrees_with_finite_differences() {
    check_gradient_by_finite_differences(true);
}
