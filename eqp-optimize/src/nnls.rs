use crate::Real;
use log::debug;
use nalgebra::{try_convert, DMatrix, DVector};
use numeric_literals::replace_float_literals;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

#[derive(Debug, Clone)]
pub struct NnlsResult<T: Real> {
    pub solution: DVector<T>,
    /// Number of outer (active set) iterations performed.
    pub iterations: usize,
    /// The achieved relative residual `||A x - b|| / ||b||`.
    pub relative_residual: T,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NnlsSettings<T> {
    /// Relative tolerance on the residual, i.e. we stop once `||A x - b|| <= tolerance * ||b||`.
    pub tolerance: T,
    /// Maximum number of outer iterations. If `None`, three times the number of unknowns is used.
    pub max_iterations: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NnlsError {
    /// The procedure failed because the maximum number of iterations was reached.
    MaximumIterationsReached { iterations: usize, relative_residual: f64 },
    /// No remaining unknown can decrease the residual, but the tolerance has not been reached.
    ///
    /// This happens when the nonnegative optimum itself does not satisfy the requested tolerance.
    Stagnated { iterations: usize, relative_residual: f64 },
    /// The unconstrained least-squares subproblem on the passive set could not be solved.
    LeastSquaresFailure(String),
}

impl Display for NnlsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NnlsError::MaximumIterationsReached {
                iterations,
                relative_residual,
            } => write!(
                f,
                "Failed to converge within maximum number of iterations ({}). Relative residual: {:e}.",
                iterations, relative_residual
            ),
            NnlsError::Stagnated {
                iterations,
                relative_residual,
            } => write!(
                f,
                "Stagnated after {} iterations with relative residual {:e} above the requested tolerance.",
                iterations, relative_residual
            ),
            NnlsError::LeastSquaresFailure(msg) => {
                write!(f, "Failed to solve least-squares subproblem. Error: {}", msg)
            }
        }
    }
}

impl Error for NnlsError {}

fn as_f64<T: Real>(value: T) -> f64 {
    try_convert(value).unwrap_or(f64::NAN)
}

/// Solves the nonnegative least-squares problem
/// ```text
///   min || A x - b ||   subject to   x >= 0
/// ```
/// with the active-set method of Lawson and Hanson, stopping as soon as the relative residual
/// drops below the tolerance.
///
/// Unknowns enter the passive set one at a time in order of decreasing dual value, so that the
/// returned solution is sparse: at most `rank(A)` entries are nonzero.
///
/// See Lawson & Hanson (1995), Solving Least Squares Problems, Chapter 23.
///
/// # Panics
///
/// Panics if the number of rows in `a` does not match the length of `b`.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn nnls<T: Real>(a: &DMatrix<T>, b: &DVector<T>, settings: &NnlsSettings<T>) -> Result<NnlsResult<T>, NnlsError> {
    assert_eq!(a.nrows(), b.len(), "Number of rows in A must match length of b.");
    let n = a.ncols();
    let max_iterations = settings.max_iterations.unwrap_or(3 * n);

    let mut x = DVector::zeros(n);
    let b_norm = b.norm();
    if b_norm == T::zero() {
        return Ok(NnlsResult {
            solution: x,
            iterations: 0,
            relative_residual: T::zero(),
        });
    }

    let target = settings.tolerance * b_norm;
    let mut passive = vec![false; n];
    let mut residual = b.clone();
    let mut iterations = 0;

    loop {
        let residual_norm = residual.norm();
        let relative_residual = residual_norm / b_norm;
        debug!(
            "NNLS iteration {}: relative residual {:e}, passive set size {}",
            iterations,
            as_f64(relative_residual),
            passive.iter().filter(|&&p| p).count()
        );
        if residual_norm <= target {
            return Ok(NnlsResult {
                solution: x,
                iterations,
                relative_residual,
            });
        }
        if iterations >= max_iterations {
            return Err(NnlsError::MaximumIterationsReached {
                iterations,
                relative_residual: as_f64(relative_residual),
            });
        }

        // The dual vector is the negative gradient of (1/2) ||A x - b||^2
        let dual = a.tr_mul(&residual);
        let dual_threshold = 10.0 * T::default_epsilon() * dual.amax();
        let mut candidates: Vec<usize> = (0..n)
            .filter(|&j| !passive[j] && dual[j] > dual_threshold)
            .collect();
        candidates.sort_unstable_by(|&i, &j| dual[j].partial_cmp(&dual[i]).unwrap_or(std::cmp::Ordering::Equal));

        // Numerically, the least-squares solution for a freshly added unknown may fail to be
        // positive even though its dual value is. In that case we move on to the next candidate
        // instead of cycling on the same unknown.
        let mut entered = None;
        for &j in &candidates {
            passive[j] = true;
            let z = solve_passive_least_squares(a, b, &passive)?;
            if z[j] > T::zero() {
                entered = Some(z);
                break;
            }
            passive[j] = false;
        }
        let Some(mut z) = entered else {
            return Err(NnlsError::Stagnated {
                iterations,
                relative_residual: as_f64(relative_residual),
            });
        };
        iterations += 1;

        // Inner loop: step back towards the feasible region until the passive solution is positive
        loop {
            if passive
                .iter()
                .enumerate()
                .all(|(i, &p)| !p || z[i] > T::zero())
            {
                x.copy_from(&z);
                break;
            }

            let mut alpha = T::one();
            for i in 0..n {
                if passive[i] && z[i] <= T::zero() {
                    let denominator = x[i] - z[i];
                    if denominator > T::zero() {
                        alpha = alpha.min(x[i] / denominator);
                    }
                }
            }

            let x_max = x.amax();
            for i in 0..n {
                if passive[i] {
                    let xi = x[i];
                    x[i] = xi + alpha * (z[i] - xi);
                    if x[i] <= 10.0 * T::default_epsilon() * x_max {
                        x[i] = T::zero();
                        passive[i] = false;
                    }
                }
            }

            if passive.iter().all(|&p| !p) {
                break;
            }
            z = solve_passive_least_squares(a, b, &passive)?;
        }

        residual.copy_from(b);
        residual.gemv(-T::one(), a, &x, T::one());
    }
}

/// Solves the unconstrained least-squares problem restricted to the passive columns of `a`.
///
/// Returns a vector of the full length with zeros in all non-passive entries.
fn solve_passive_least_squares<T: Real>(
    a: &DMatrix<T>,
    b: &DVector<T>,
    passive: &[bool],
) -> Result<DVector<T>, NnlsError> {
    let indices: Vec<usize> = passive
        .iter()
        .enumerate()
        .filter_map(|(i, &p)| p.then_some(i))
        .collect();
    let a_passive = a.select_columns(indices.iter());
    let svd = a_passive.svd(true, true);
    let eps = T::default_epsilon() * T::from_usize(a.nrows().max(indices.len())).unwrap() * svd.singular_values.amax();
    let z_passive = svd
        .solve(b, eps)
        .map_err(|msg| NnlsError::LeastSquaresFailure(msg.to_string()))?;

    let mut z = DVector::zeros(a.ncols());
    for (k, &i) in indices.iter().enumerate() {
        z[i] = z_passive[k];
    }
    Ok(z)
}
