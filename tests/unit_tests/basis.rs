use eqp::basis::ReducedBasis;
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};

fn example_basis() -> ReducedBasis<f64> {
    #[rustfmt::skip]
    let matrix = DMatrix::from_row_slice(4, 2, &[
        1.0, 0.0,
        2.0, 1.0,
        0.0, 3.0,
        -1.0, 2.0,
    ]);
    ReducedBasis::from(matrix)
}

#[test]
fn basis_dimensions() {
    let basis = example_basis();
    assert_eq!(basis.num_dofs(), 4);
    assert_eq!(basis.dimension(), 2);
}

#[test]
fn expand_and_project() {
    let basis = example_basis();
    let x = DVector::from_column_slice(&[2.0, -1.0]);
    let u = basis.expand(&x);
    assert_matrix_eq!(u, DVector::from_column_slice(&[2.0, 3.0, -3.0, -4.0]));

    let v = DVector::from_column_slice(&[1.0, 1.0, 1.0, 1.0]);
    let projected = basis.project(&v);
    assert_matrix_eq!(projected, DVector::from_column_slice(&[2.0, 6.0]));
}

#[test]
fn local_basis_applies_orientations() {
    let basis = example_basis();
    let mut local = DMatrix::zeros(3, 2);
    basis.populate_local_basis(&[3, 0, 2], &[1.0, -1.0, 1.0], (&mut local).into());

    #[rustfmt::skip]
    let expected = DMatrix::from_row_slice(3, 2, &[
        -1.0, 2.0,
        -1.0, -0.0,
        0.0, 3.0,
    ]);
    assert_matrix_eq!(local, expected);
}

#[test]
fn local_basis_reproduces_gathered_state() {
    let basis = example_basis();
    let x = DVector::from_column_slice(&[0.5, 1.5]);
    let u = basis.expand(&x);

    let dofs = [1, 3];
    let orientations = [-1.0, 1.0];
    let mut local = DMatrix::zeros(2, 2);
    basis.populate_local_basis(&dofs, &orientations, (&mut local).into());

    let local_state = &local * &x;
    let expected = DVector::from_column_slice(&[-u[1], u[3]]);
    assert_matrix_eq!(local_state, expected, comp = abs, tol = 1e-14);
}

#[test]
#[should_panic]
fn expand_rejects_wrong_dimension() {
    let basis = example_basis();
    basis.expand(&DVector::zeros(3));
}
