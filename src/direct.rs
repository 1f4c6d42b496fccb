//! Sample-driven evaluation of reduced residuals and Jacobians.
//!
//! For every sample, the reduced state is expanded through the local restriction of the basis,
//! the integrand is evaluated at the sampled quadrature point with the sample weight, and the
//! result is projected back. The cost is proportional to the number of samples, independent of
//! the mesh size.
use crate::assembly::buffers::LocalBuffers;
use crate::assembly::local::{DofMap, QuadratureIntegrator};
use crate::basis::ReducedBasis;
use crate::sample::{IntegratorCategory, SampleSet};
use crate::Real;
use nalgebra::{DMatrixViewMut, DVectorView, DVectorViewMut};

/// Adds $\sum_p w_p \Phi_p^T q_p(\Phi_p x)$ to `y`.
///
/// # Panics
///
/// Panics if `x` or `y` do not have the basis dimension.
pub fn add_sampled_residual<'a, 'b, T, S, I>(
    y: impl Into<DVectorViewMut<'b, T>>,
    x: impl Into<DVectorView<'a, T>>,
    space: &S,
    integrator: &I,
    category: IntegratorCategory,
    samples: &SampleSet<T>,
    basis: &ReducedBasis<T>,
    buffers: &mut LocalBuffers<T>,
) -> eyre::Result<()>
where
    T: Real,
    S: ?Sized + DofMap<T>,
    I: ?Sized + QuadratureIntegrator<T>,
{
    let mut y = y.into();
    let x = x.into();
    assert_eq!(x.len(), basis.dimension(), "Reduced state must have basis dimension.");
    assert_eq!(y.len(), basis.dimension(), "Reduced output must have basis dimension.");

    for sample in samples.iter() {
        buffers.populate_location_with_basis(space, category, sample.location, basis);
        let LocalBuffers {
            local_basis,
            local_state,
            local_vector,
            ..
        } = &mut *buffers;

        local_state.gemv(T::one(), &*local_basis, &x, T::zero());
        local_vector.fill(T::zero());
        integrator.assemble_quadrature_vector(
            sample.location,
            sample.quadrature_point,
            sample.weight,
            DVectorView::from(&*local_state),
            DVectorViewMut::from(&mut *local_vector),
        )?;
        y.gemv_tr(T::one(), &*local_basis, &*local_vector, T::one());
    }
    Ok(())
}

/// Adds $\sum_p w_p \Phi_p^T A_p(\Phi_p x) \Phi_p$ to `jacobian`, where $A_p$ is the local Jacobian of
/// the integrand at sample $p$.
///
/// # Panics
///
/// Panics if `x` does not have the basis dimension or `jacobian` is not square of that size.
pub fn add_sampled_gradient<'a, 'b, T, S, I>(
    jacobian: impl Into<DMatrixViewMut<'b, T>>,
    x: impl Into<DVectorView<'a, T>>,
    space: &S,
    integrator: &I,
    category: IntegratorCategory,
    samples: &SampleSet<T>,
    basis: &ReducedBasis<T>,
    buffers: &mut LocalBuffers<T>,
) -> eyre::Result<()>
where
    T: Real,
    S: ?Sized + DofMap<T>,
    I: ?Sized + QuadratureIntegrator<T>,
{
    let mut jacobian = jacobian.into();
    let x = x.into();
    let r = basis.dimension();
    assert_eq!(x.len(), r, "Reduced state must have basis dimension.");
    assert_eq!(jacobian.shape(), (r, r), "Reduced Jacobian must be R x R.");

    for sample in samples.iter() {
        buffers.populate_location_with_basis(space, category, sample.location, basis);
        buffers.zero_local_matrix();
        let LocalBuffers {
            local_basis,
            local_state,
            local_matrix,
            local_product,
            ..
        } = &mut *buffers;

        local_state.gemv(T::one(), &*local_basis, &x, T::zero());
        integrator.assemble_quadrature_gradient(
            sample.location,
            sample.quadrature_point,
            sample.weight,
            DVectorView::from(&*local_state),
            DMatrixViewMut::from(&mut *local_matrix),
        )?;

        local_product.resize_mut(local_basis.nrows(), r, T::zero());
        local_product.gemm(T::one(), &*local_matrix, &*local_basis, T::zero());
        jacobian.gemm_tr(T::one(), &*local_basis, &*local_product, T::one());
    }
    Ok(())
}
