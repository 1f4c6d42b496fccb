//! Precomputed reduced tensors for integrands with polynomial nonlinearity.
//!
//! If the quadrature point contribution of an integrator is a polynomial of degree $d$ in the state,
//! it is the diagonal of a $d$-linear form $m$. Restricting every argument to the reduced basis gives,
//! per sample, a tensor
//! $$ T_{k, i_1 \dots i_d} = (\Phi_{\text{loc}}^T m(\phi_{i_1}, \dots, \phi_{i_d}))_k, $$
//! evaluated once with unit weight. The reduced residual and Jacobian then follow by contraction
//! with the reduced state alone:
//! $$ y_k \mathrel{+}= w \sum_{i_1 \dots i_d} T_{k, i_1 \dots i_d} x_{i_1} \cdots x_{i_d}, \qquad
//!    J_{kl} \mathrel{+}= w \sum_{m=1}^d \sum_{i : i_m = l} T_{k, i_1 \dots i_d} \prod_{n \neq m} x_{i_n}. $$
//! No mesh data is accessed at runtime.
use crate::assembly::buffers::LocalBuffers;
use crate::assembly::local::{DofMap, QuadratureIntegrator};
use crate::basis::ReducedBasis;
use crate::sample::{IntegratorCategory, Sample, SampleSet};
use crate::Real;
use eyre::eyre;
use itertools::izip;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView, DVectorViewMut, Scalar};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;

/// The highest polynomial degree for which tensors are precomputed.
///
/// A tensor has $R^{d+1}$ entries per sample.
pub const MAX_PRECOMPUTE_DEGREE: usize = 3;

/// Describes whether an integrator can be evaluated by tensor contraction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrecomputeCapability {
    pub supports_precompute: bool,
    pub polynomial_degree: usize,
}

impl PrecomputeCapability {
    pub const fn unsupported() -> Self {
        Self {
            supports_precompute: false,
            polynomial_degree: 0,
        }
    }

    /// An integrand that is a polynomial of the given degree in the state.
    pub const fn polynomial(degree: usize) -> Self {
        Self {
            supports_precompute: true,
            polynomial_degree: degree,
        }
    }

    /// Whether tensors can actually be built for this capability.
    pub fn is_available(&self) -> bool {
        self.supports_precompute && self.polynomial_degree <= MAX_PRECOMPUTE_DEGREE
    }
}

impl Display for PrecomputeCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.supports_precompute {
            write!(f, "polynomial of degree {}", self.polynomial_degree)
        } else {
            write!(f, "no precompute support")
        }
    }
}

/// The reduced tensor of a single sample, stored as an $R \times R^d$ matrix.
///
/// Column `i_1 + R i_2 + ... + R^(d-1) i_d` holds the projected multilinear form evaluated on basis
/// columns `i_1, ..., i_d`.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecomputedTensor<T: Scalar> {
    degree: usize,
    coefficients: DMatrix<T>,
}

impl<T: Real> PrecomputedTensor<T> {
    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn reduced_dimension(&self) -> usize {
        self.coefficients.nrows()
    }

    pub fn coefficients(&self) -> &DMatrix<T> {
        &self.coefficients
    }
}

/// Advances a multi-index in $\{0, \dots, R - 1\}^d$ to the next flat index, with the first
/// index running fastest.
fn advance_multi_index(index: &mut [usize], dim: usize) {
    for digit in index.iter_mut() {
        *digit += 1;
        if *digit < dim {
            return;
        }
        *digit = 0;
    }
}

fn num_multi_indices(degree: usize, dim: usize) -> usize {
    dim.pow(degree as u32)
}

fn product_of_entries<T: Real>(x: &DVectorView<T>, index: &[usize], skip: Option<usize>) -> T {
    index
        .iter()
        .enumerate()
        .filter(|(m, _)| Some(*m) != skip)
        .fold(T::one(), |acc, (_, &i)| acc * x[i])
}

/// Builds the reduced tensor of a single sample.
///
/// The multilinear form is evaluated with unit weight; the sample weight is applied during
/// contraction. Returns an error if the integrator is not capable of precompute or if its
/// multilinear form fails.
pub fn precompute_sample_tensor<T, S, I>(
    space: &S,
    integrator: &I,
    category: IntegratorCategory,
    sample: &Sample<T>,
    basis: &ReducedBasis<T>,
    buffers: &mut LocalBuffers<T>,
) -> eyre::Result<PrecomputedTensor<T>>
where
    T: Real,
    S: ?Sized + DofMap<T>,
    I: ?Sized + QuadratureIntegrator<T>,
{
    let capability = integrator.precompute_capability();
    if !capability.is_available() {
        return Err(eyre!("cannot precompute integrator with capability: {}", capability));
    }
    let degree = capability.polynomial_degree;
    let r = basis.dimension();

    buffers.populate_location_with_basis(space, category, sample.location, basis);
    let mut coefficients = DMatrix::zeros(r, num_multi_indices(degree, r));

    let LocalBuffers {
        local_basis,
        local_vector,
        ..
    } = buffers;
    let local_basis = &*local_basis;
    let mut index = vec![0; degree];
    let mut arguments = Vec::with_capacity(degree);
    for flat in 0..coefficients.ncols() {
        arguments.clear();
        arguments.extend(index.iter().map(|&i| local_basis.column(i)));
        local_vector.fill(T::zero());
        integrator.assemble_quadrature_multilinear(
            sample.location,
            sample.quadrature_point,
            T::one(),
            &arguments,
            DVectorViewMut::from(&mut *local_vector),
        )?;
        coefficients
            .column_mut(flat)
            .gemv_tr(T::one(), local_basis, &*local_vector, T::zero());
        advance_multi_index(&mut index, r);
    }

    Ok(PrecomputedTensor { degree, coefficients })
}

/// Builds the tensors of every sample in a sample set.
pub fn precompute_tensors<T, S, I>(
    space: &S,
    integrator: &I,
    category: IntegratorCategory,
    samples: &SampleSet<T>,
    basis: &ReducedBasis<T>,
    buffers: &mut LocalBuffers<T>,
) -> eyre::Result<Vec<PrecomputedTensor<T>>>
where
    T: Real,
    S: ?Sized + DofMap<T>,
    I: ?Sized + QuadratureIntegrator<T>,
{
    samples
        .iter()
        .map(|sample| precompute_sample_tensor(space, integrator, category, sample, basis, buffers))
        .collect()
}

/// Adds $\sum_p w_p T_p(x, \dots, x)$ to `y`.
///
/// # Panics
///
/// Panics if the number of tensors differs from the number of samples, or if dimensions mismatch.
pub fn add_precomputed_residual<'a, 'b, T: Real>(
    y: impl Into<DVectorViewMut<'b, T>>,
    x: impl Into<DVectorView<'a, T>>,
    samples: &SampleSet<T>,
    tensors: &[PrecomputedTensor<T>],
) {
    let mut y = y.into();
    let x = x.into();
    assert_eq!(samples.len(), tensors.len(), "Every sample needs a tensor.");

    let mut products = DVector::zeros(0);
    for (sample, tensor) in izip!(samples.iter(), tensors) {
        let r = tensor.reduced_dimension();
        assert_eq!(r, x.len());
        assert_eq!(r, y.len());

        products.resize_vertically_mut(tensor.coefficients.ncols(), T::zero());
        let mut index = vec![0; tensor.degree];
        for flat in 0..products.len() {
            products[flat] = product_of_entries(&x, &index, None);
            advance_multi_index(&mut index, r);
        }
        y.gemv(sample.weight, &tensor.coefficients, &products, T::one());
    }
}

/// Adds the Jacobian of [`add_precomputed_residual`] to `jacobian`.
///
/// # Panics
///
/// Panics if the number of tensors differs from the number of samples, or if dimensions mismatch.
pub fn add_precomputed_gradient<'a, 'b, T: Real>(
    jacobian: impl Into<DMatrixViewMut<'b, T>>,
    x: impl Into<DVectorView<'a, T>>,
    samples: &SampleSet<T>,
    tensors: &[PrecomputedTensor<T>],
) {
    let mut jacobian = jacobian.into();
    let x = x.into();
    assert_eq!(samples.len(), tensors.len(), "Every sample needs a tensor.");

    for (sample, tensor) in izip!(samples.iter(), tensors) {
        let r = tensor.reduced_dimension();
        assert_eq!(r, x.len());
        assert_eq!((r, r), jacobian.shape());

        // Differentiate the product with respect to each argument slot in turn
        let mut index = vec![0; tensor.degree];
        for flat in 0..tensor.coefficients.ncols() {
            for (m, &l) in index.iter().enumerate() {
                let coefficient = sample.weight * product_of_entries(&x, &index, Some(m));
                jacobian
                    .column_mut(l)
                    .axpy(coefficient, &tensor.coefficients.column(flat), T::one());
            }
            advance_multi_index(&mut index, r);
        }
    }
}
