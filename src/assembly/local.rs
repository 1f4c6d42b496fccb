use crate::precompute::PrecomputeCapability;
use crate::sample::IntegratorCategory;
use eyre::eyre;
use nalgebra::{DMatrixViewMut, DVectorView, DVectorViewMut, Scalar};

/// Maps mesh locations to global degrees of freedom.
///
/// Locations are numbered per category: elements for [`IntegratorCategory::Domain`], interior
/// faces and boundary faces each in their own numbering. A face location includes the degrees of
/// freedom of every element adjacent to it.
pub trait DofMap<T: Scalar> {
    fn num_dofs(&self) -> usize;

    fn num_locations(&self, category: IntegratorCategory) -> usize;

    fn location_dof_count(&self, category: IntegratorCategory, location: usize) -> usize;

    /// Populates the global dof indices of a location together with the orientation of each
    /// local dof.
    ///
    /// A local state is extracted as `u_local[a] = orientations[a] * u[dofs[a]]` and a local
    /// vector is deposited as `y[dofs[a]] += orientations[a] * q[a]`.
    fn populate_location_dofs(
        &self,
        category: IntegratorCategory,
        location: usize,
        dofs: &mut [usize],
        orientations: &mut [T],
    );

    /// The attribute of a boundary face, used to restrict boundary integrators by marker.
    fn boundary_attribute(&self, face: usize) -> usize;
}

/// A local integrand evaluated one quadrature point at a time.
///
/// Every contribution must be linear in `weight`. Outputs are zeroed by the caller and
/// implementations add their contribution.
pub trait QuadratureIntegrator<T: Scalar> {
    /// Reference weights of the quadrature rule on the given location.
    fn quadrature_weights(&self, location: usize) -> &[T];

    fn assemble_quadrature_vector(
        &self,
        location: usize,
        quadrature_point: usize,
        weight: T,
        local_state: DVectorView<T>,
        output: DVectorViewMut<T>,
    ) -> eyre::Result<()>;

    /// The derivative of [`assemble_quadrature_vector`](Self::assemble_quadrature_vector) with
    /// respect to the local state.
    fn assemble_quadrature_gradient(
        &self,
        location: usize,
        quadrature_point: usize,
        weight: T,
        local_state: DVectorView<T>,
        output: DMatrixViewMut<T>,
    ) -> eyre::Result<()>;

    fn precompute_capability(&self) -> PrecomputeCapability {
        PrecomputeCapability::unsupported()
    }

    /// Evaluates a multilinear form $m$ of degree $d$ whose diagonal $m(u, \dots, u)$
    /// equals the quadrature point contribution.
    ///
    /// Only called for integrators whose [`precompute_capability`](Self::precompute_capability)
    /// reports support, with exactly `polynomial_degree` arguments.
    fn assemble_quadrature_multilinear(
        &self,
        _location: usize,
        _quadrature_point: usize,
        _weight: T,
        _arguments: &[DVectorView<T>],
        _output: DVectorViewMut<T>,
    ) -> eyre::Result<()> {
        Err(eyre!("integrator does not provide a multilinear form"))
    }
}
