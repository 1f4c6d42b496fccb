use crate::assembly::local::DofMap;
use crate::basis::ReducedBasis;
use crate::sample::IntegratorCategory;
use crate::Real;
use nalgebra::{DMatrix, DMatrixView, DMatrixViewMut, DVector, Scalar};

/// Reusable storage for per-location data.
///
/// Evaluators visit one sample at a time, and the local dof indices, local basis and local
/// vectors and matrices are resized in place so that the sample loop does not allocate.
#[derive(Debug, Clone)]
pub struct LocalBuffers<T: Scalar> {
    pub(crate) dofs: Vec<usize>,
    pub(crate) orientations: Vec<T>,
    pub(crate) local_basis: DMatrix<T>,
    pub(crate) local_state: DVector<T>,
    pub(crate) local_vector: DVector<T>,
    pub(crate) local_matrix: DMatrix<T>,
    /// Product of the local matrix with the local basis.
    pub(crate) local_product: DMatrix<T>,
}

impl<T: Real> Default for LocalBuffers<T> {
    fn default() -> Self {
        Self {
            dofs: Vec::new(),
            orientations: Vec::new(),
            local_basis: DMatrix::zeros(0, 0),
            local_state: DVector::zeros(0),
            local_vector: DVector::zeros(0),
            local_matrix: DMatrix::zeros(0, 0),
            local_product: DMatrix::zeros(0, 0),
        }
    }
}

impl<T: Real> LocalBuffers<T> {
    /// Populates dofs and orientations of a location and resizes the local vectors accordingly.
    pub fn populate_location<S>(&mut self, space: &S, category: IntegratorCategory, location: usize)
    where
        S: ?Sized + DofMap<T>,
    {
        let n = space.location_dof_count(category, location);
        self.dofs.resize(n, usize::MAX);
        self.orientations.resize(n, T::one());
        space.populate_location_dofs(category, location, &mut self.dofs, &mut self.orientations);
        self.local_state.resize_vertically_mut(n, T::zero());
        self.local_vector.resize_vertically_mut(n, T::zero());
    }

    /// Like [`populate_location`](Self::populate_location), and additionally restricts the basis
    /// to the location.
    pub fn populate_location_with_basis<S>(
        &mut self,
        space: &S,
        category: IntegratorCategory,
        location: usize,
        basis: &ReducedBasis<T>,
    ) where
        S: ?Sized + DofMap<T>,
    {
        self.populate_location(space, category, location);
        let n = self.dofs.len();
        self.local_basis.resize_mut(n, basis.dimension(), T::zero());
        basis.populate_local_basis(&self.dofs, &self.orientations, DMatrixViewMut::from(&mut self.local_basis));
    }

    pub fn dofs(&self) -> &[usize] {
        &self.dofs
    }

    pub fn orientations(&self) -> &[T] {
        &self.orientations
    }

    pub fn local_basis(&self) -> DMatrixView<T> {
        DMatrixView::from(&self.local_basis)
    }

    pub(crate) fn zero_local_matrix(&mut self) {
        let n = self.dofs.len();
        self.local_matrix.resize_mut(n, n, T::zero());
        self.local_matrix.fill(T::zero());
    }
}
