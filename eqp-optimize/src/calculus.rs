use crate::Real;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView, DVectorViewMut};
use numeric_literals::replace_float_literals;

/// Approximates the Jacobian of the function $f: \mathbb{R}^n \rightarrow \mathbb{R}^m$
/// with central finite differences.
///
/// The Jacobian matrix is the $m \times n$ matrix whose entries are given by
/// $$ J_{ij} := \pd{f_i}{x_j}.$$
///
/// The parameter `h` determines the step size of the finite difference approximation.
/// The vector `x` is mutable in order to hold intermediate points, but upon returning,
/// its content remains unchanged.
pub fn approximate_jacobian_fd<'a, T>(
    m: usize,
    f: impl FnMut(DVectorView<T>, DVectorViewMut<T>),
    x: impl Into<DVectorViewMut<'a, T>>,
    h: T,
) -> DMatrix<T>
where
    T: Real,
{
    let x = x.into();
    let n = x.len();
    let mut jacobian = DMatrix::zeros(m, n);
    approximate_jacobian_fd_into_(DMatrixViewMut::from(&mut jacobian), f, x, h);
    jacobian
}

#[replace_float_literals(T::from_f64(literal).unwrap())]
fn approximate_jacobian_fd_into_<T>(
    mut j: DMatrixViewMut<T>,
    mut f: impl FnMut(DVectorView<T>, DVectorViewMut<T>),
    mut x: DVectorViewMut<T>,
    h: T,
) where
    T: Real,
{
    let m = j.nrows();
    let n = x.len();
    assert_eq!(n, j.ncols());

    let mut f_plus = DVector::zeros(m);
    let mut f_minus = DVector::zeros(m);

    for i in 0..n {
        // df_dxi ~ (f(x + h e_i) - f(x - h e_i)) / (2 h)
        let xi = x[i];
        x[i] = xi + h;
        f(DVectorView::from(&x), DVectorViewMut::from(&mut f_plus));
        x[i] = xi - h;
        f(DVectorView::from(&x), DVectorViewMut::from(&mut f_minus));
        x[i] = xi;

        let mut df_dxi = j.column_mut(i);
        df_dxi.copy_from(&f_plus);
        df_dxi -= &f_minus;
        df_dxi /= 2.0 * h;
    }
}

/// Outcome of a finite-difference verification of a directional derivative.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalDerivativeCheck<T> {
    /// Step amplitudes that were tried, in decreasing order.
    pub amplitudes: Vec<T>,
    /// Relative error of the finite-difference estimate for each amplitude.
    pub errors: Vec<T>,
}

impl<T: Real> DirectionalDerivativeCheck<T> {
    /// The smallest relative error observed before round-off started to dominate.
    pub fn min_error(&self) -> Option<T> {
        self.errors.iter().copied().reduce(|a, b| a.min(b))
    }
}

/// Verifies the derivative of $J: \mathbb{R}^n \rightarrow \mathbb{R}$ along `direction`.
///
/// Central differences $(J(x + \alpha d) - J(x - \alpha d)) / (2 \alpha)$ are compared against
/// `derivative` for amplitudes $\alpha_k = r^k$, $k = 0, 1, \dots$, where $r$ is `amplitude_ratio`. The sequence
/// stops after `max_steps` amplitudes or as soon as the error stops decreasing, which is the point
/// where floating-point noise takes over from truncation error.
///
/// # Panics
///
/// Panics if `x` and `direction` have different lengths or if `derivative` is zero.
pub fn check_directional_derivative<T>(
    mut objective: impl FnMut(DVectorView<T>) -> T,
    x: DVectorView<T>,
    direction: DVectorView<T>,
    derivative: T,
    amplitude_ratio: T,
    max_steps: usize,
) -> DirectionalDerivativeCheck<T>
where
    T: Real,
{
    assert_eq!(x.len(), direction.len(), "Point and direction must have the same dimension.");
    assert!(derivative != T::zero(), "Expected derivative must be non-zero.");

    let mut x_step = x.clone_owned();
    let mut amplitudes = Vec::new();
    let mut errors: Vec<T> = Vec::new();

    let mut amplitude = T::one();
    for _ in 0..max_steps {
        x_step.copy_from(&x);
        x_step.axpy(amplitude, &direction, T::one());
        let j_plus = objective(DVectorView::from(&x_step));
        x_step.copy_from(&x);
        x_step.axpy(-amplitude, &direction, T::one());
        let j_minus = objective(DVectorView::from(&x_step));
        let estimate = (j_plus - j_minus) / (amplitude + amplitude);
        let error = (estimate - derivative).abs() / derivative.abs();

        let increased = errors.last().map(|&previous| error >= previous).unwrap_or(false);
        amplitudes.push(amplitude);
        errors.push(error);
        if increased {
            break;
        }
        amplitude *= amplitude_ratio;
    }

    DirectionalDerivativeCheck { amplitudes, errors }
}
