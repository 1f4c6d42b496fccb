use crate::basis::ReducedBasis;
use crate::Real;
use nalgebra::{DMatrix, DVector, DVectorView, Scalar};
use nalgebra_sparse::convert::serial::convert_csr_dense;
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::CsrMatrix;

/// A Jacobian matrix with its storage chosen at construction.
///
/// Reduced operators produce dense $R \times R$ matrices, while full-order reference assembly
/// produces sparse $N \times N$ matrices.
#[derive(Debug, Clone, PartialEq)]
pub enum Jacobian<T: Scalar> {
    Dense(DMatrix<T>),
    Sparse(CsrMatrix<T>),
}

impl<T: Real> Jacobian<T> {
    pub fn nrows(&self) -> usize {
        match self {
            Jacobian::Dense(matrix) => matrix.nrows(),
            Jacobian::Sparse(matrix) => matrix.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            Jacobian::Dense(matrix) => matrix.ncols(),
            Jacobian::Sparse(matrix) => matrix.ncols(),
        }
    }

    pub fn as_dense(&self) -> Option<&DMatrix<T>> {
        match self {
            Jacobian::Dense(matrix) => Some(matrix),
            Jacobian::Sparse(_) => None,
        }
    }

    pub fn into_dense(self) -> DMatrix<T> {
        match self {
            Jacobian::Dense(matrix) => matrix,
            Jacobian::Sparse(matrix) => convert_csr_dense(&matrix),
        }
    }

    pub fn to_dense(&self) -> DMatrix<T> {
        self.clone().into_dense()
    }

    /// Computes $J v$.
    pub fn mul<'a>(&self, v: impl Into<DVectorView<'a, T>>) -> DVector<T> {
        let v = v.into();
        assert_eq!(v.len(), self.ncols());
        match self {
            Jacobian::Dense(matrix) => matrix * v,
            Jacobian::Sparse(matrix) => {
                let mut result = DVector::zeros(matrix.nrows());
                spmm_csr_dense(T::zero(), &mut result, T::one(), Op::NoOp(matrix), Op::NoOp(&v));
                result
            }
        }
    }

    /// Computes $J^T v$.
    pub fn transpose_mul<'a>(&self, v: impl Into<DVectorView<'a, T>>) -> DVector<T> {
        let v = v.into();
        assert_eq!(v.len(), self.nrows());
        match self {
            Jacobian::Dense(matrix) => matrix.tr_mul(&v),
            Jacobian::Sparse(matrix) => {
                let mut result = DVector::zeros(matrix.ncols());
                spmm_csr_dense(T::zero(), &mut result, T::one(), Op::Transpose(matrix), Op::NoOp(&v));
                result
            }
        }
    }

    /// Computes the Galerkin projection $\Phi^T J \Phi$ of a full-order Jacobian.
    pub fn project_onto(&self, basis: &ReducedBasis<T>) -> DMatrix<T> {
        let phi = basis.matrix();
        assert_eq!(self.ncols(), phi.nrows());
        let j_phi = match self {
            Jacobian::Dense(matrix) => matrix * phi,
            Jacobian::Sparse(matrix) => {
                let mut j_phi = DMatrix::zeros(matrix.nrows(), phi.ncols());
                spmm_csr_dense(T::zero(), &mut j_phi, T::one(), Op::NoOp(matrix), Op::NoOp(phi));
                j_phi
            }
        };
        phi.tr_mul(&j_phi)
    }
}
