use crate::Real;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView, Scalar};

/// A dense reduced basis $\Phi \in \mathbb{R}^{N \times R}$.
///
/// The columns are used as given. They are assumed to be linearly independent and reasonably
/// scaled, but no orthonormalization is performed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedBasis<T: Scalar> {
    matrix: DMatrix<T>,
}

impl<T: Scalar> From<DMatrix<T>> for ReducedBasis<T> {
    fn from(matrix: DMatrix<T>) -> Self {
        Self { matrix }
    }
}

impl<T: Real> ReducedBasis<T> {
    /// The full-order dimension $N$.
    pub fn num_dofs(&self) -> usize {
        self.matrix.nrows()
    }

    /// The reduced dimension $R$.
    pub fn dimension(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn matrix(&self) -> &DMatrix<T> {
        &self.matrix
    }

    /// Computes the full-order state $\Phi x$.
    pub fn expand<'a>(&self, x: impl Into<DVectorView<'a, T>>) -> DVector<T> {
        let x = x.into();
        assert_eq!(x.len(), self.dimension(), "Reduced state must have basis dimension.");
        &self.matrix * x
    }

    /// Computes $\Phi^T v$.
    pub fn project<'a>(&self, v: impl Into<DVectorView<'a, T>>) -> DVector<T> {
        let v = v.into();
        assert_eq!(v.len(), self.num_dofs(), "Full-order vector must have basis row count.");
        self.matrix.tr_mul(&v)
    }

    /// Restricts the basis to the degrees of freedom of a single location.
    ///
    /// Writes `output[(a, i)] = orientations[a] * Phi[(dofs[a], i)]`, so that the local state
    /// is `output * x` and a local vector `q` projects as `output^T q`.
    ///
    /// # Panics
    ///
    /// Panics if `output` is not `dofs.len() x R` or if `orientations` and `dofs` differ in length.
    pub fn populate_local_basis(&self, dofs: &[usize], orientations: &[T], mut output: DMatrixViewMut<T>) {
        assert_eq!(dofs.len(), orientations.len());
        assert_eq!(output.nrows(), dofs.len(), "Local basis must have one row per local dof.");
        assert_eq!(output.ncols(), self.dimension(), "Local basis must have basis dimension columns.");

        for (a, (&dof, &sign)) in dofs.iter().zip(orientations).enumerate() {
            let mut row = output.row_mut(a);
            row.copy_from(&self.matrix.row(dof));
            row *= sign;
        }
    }
}
