//! Training of sparse sample sets by the Empirical Quadrature Procedure.
//!
//! For snapshots $u_1, \dots, u_S$ and candidate quadrature points $p = 1, \dots, P$, the training
//! system has entries
//! $$ G_{i + sR, p} = (\Phi_p^T q_p(u_s))_i, \qquad b_{i + sR} = (\Phi^T F(u_s))_i, $$
//! where $q_p$ is the unit-weight contribution of point $p$. The reference weights $w^{\text{ref}}$
//! satisfy $G w^{\text{ref}} = b$, and training looks for a sparse $w \geq 0$ with
//! $\norm{G w - b} \leq \epsilon \norm{b}$.
use crate::assembly::buffers::LocalBuffers;
use crate::assembly::global::gather_global_to_local;
use crate::assembly::local::{DofMap, QuadratureIntegrator};
use crate::basis::ReducedBasis;
use crate::sample::{IntegratorCategory, Sample, SampleSet};
use crate::Real;
use eqp_optimize::nnls::{nnls, NnlsError, NnlsSettings};
use log::{info, warn};
use nalgebra::{try_convert, DMatrix, DVector, DVectorView, DVectorViewMut};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// The linear system $G w = b$ of a single integrator.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSystem<T: Real> {
    /// $(R S) \times P$ matrix, rows ordered with the basis index running fastest.
    pub matrix: DMatrix<T>,
    pub rhs: DVector<T>,
    /// Location, quadrature point and reference weight of every column.
    pub candidates: Vec<Sample<T>>,
}

impl<T: Real> TrainingSystem<T> {
    pub fn num_candidates(&self) -> usize {
        self.candidates.len()
    }

    pub fn reference_weights(&self) -> DVector<T> {
        DVector::from_iterator(self.candidates.len(), self.candidates.iter().map(|c| c.weight))
    }

    /// Computes $\norm{G w - b}$.
    pub fn residual_norm(&self, weights: &DVector<T>) -> T {
        let mut residual = self.rhs.clone();
        residual.gemv(T::one(), &self.matrix, weights, -T::one());
        residual.norm()
    }

    /// Computes $\norm{G w - b} / \norm{b}$, or the absolute residual if $b = 0$.
    pub fn relative_residual(&self, weights: &DVector<T>) -> T {
        let rhs_norm = self.rhs.norm();
        let residual_norm = self.residual_norm(weights);
        if rhs_norm == T::zero() {
            residual_norm
        } else {
            residual_norm / rhs_norm
        }
    }
}

/// Settings for [`train_eqp`].
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqpSettings<T> {
    /// Relative tolerance $\epsilon$ on the training residual.
    pub tolerance: T,
    /// Maximum number of active-set iterations. If `None`, three times the number of candidates.
    pub max_iterations: Option<usize>,
    /// Candidates whose weight does not exceed the cutoff are discarded.
    pub weight_cutoff: T,
}

impl<T: Real> Default for EqpSettings<T> {
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: None,
            weight_cutoff: 0.0,
        }
    }
}

/// Summary of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqpReport<T> {
    /// Size of the candidate pool.
    pub candidates: usize,
    /// Number of retained samples.
    pub samples: usize,
    pub iterations: usize,
    /// Relative residual of the retained samples.
    pub relative_residual: T,
}

/// Reasons for failing to train a sample set.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingFailure {
    /// The nonnegative least-squares solver did not reach the tolerance.
    Nnls(NnlsError),
    /// Discarding weights below the cutoff raised the residual above the tolerance.
    CutoffResidual { relative_residual: f64, tolerance: f64 },
}

impl Display for TrainingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingFailure::Nnls(err) => write!(f, "nonnegative least squares failed: {}", err),
            TrainingFailure::CutoffResidual {
                relative_residual,
                tolerance,
            } => write!(
                f,
                "relative residual {:e} after weight cutoff exceeds tolerance {:e}",
                relative_residual, tolerance
            ),
        }
    }
}

impl Error for TrainingFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainingFailure::Nnls(err) => Some(err),
            TrainingFailure::CutoffResidual { .. } => None,
        }
    }
}

fn as_f64<T: Real>(value: T) -> f64 {
    try_convert(value).unwrap_or(f64::NAN)
}

/// Assembles the training system of one integrator.
///
/// `snapshots` holds one full-order state per column. The right-hand side is accumulated from
/// integrand evaluations with reference weights, independently of the unit-weight columns of $G$,
/// so that $G w^{\text{ref}} = b$ is a genuine consistency check.
///
/// # Panics
///
/// Panics if `snapshots` does not have `basis.num_dofs()` rows.
pub fn assemble_training_system<T, S, I>(
    space: &S,
    integrator: &I,
    category: IntegratorCategory,
    locations: &[usize],
    basis: &ReducedBasis<T>,
    snapshots: &DMatrix<T>,
) -> eyre::Result<TrainingSystem<T>>
where
    T: Real,
    S: ?Sized + DofMap<T>,
    I: ?Sized + QuadratureIntegrator<T>,
{
    assert_eq!(
        snapshots.nrows(),
        basis.num_dofs(),
        "Snapshots must have one row per degree of freedom."
    );
    let r = basis.dimension();
    let num_snapshots = snapshots.ncols();

    let candidates = SampleSet::full_pool(integrator, locations).into_samples();
    let mut matrix = DMatrix::zeros(r * num_snapshots, candidates.len());
    let mut rhs = DVector::zeros(r * num_snapshots);
    let mut buffers = LocalBuffers::default();

    let mut column = 0;
    for &location in locations {
        buffers.populate_location_with_basis(space, category, location, basis);
        let LocalBuffers {
            dofs,
            orientations,
            local_basis,
            local_state,
            local_vector,
            ..
        } = &mut buffers;

        for (q, &reference_weight) in integrator.quadrature_weights(location).iter().enumerate() {
            for (s, snapshot) in snapshots.column_iter().enumerate() {
                gather_global_to_local(snapshot, &mut *local_state, dofs, orientations);
                let row_offset = s * r;

                local_vector.fill(T::zero());
                integrator.assemble_quadrature_vector(
                    location,
                    q,
                    T::one(),
                    DVectorView::from(&*local_state),
                    DVectorViewMut::from(&mut *local_vector),
                )?;
                matrix
                    .column_mut(column)
                    .rows_mut(row_offset, r)
                    .gemv_tr(T::one(), &*local_basis, &*local_vector, T::zero());

                local_vector.fill(T::zero());
                integrator.assemble_quadrature_vector(
                    location,
                    q,
                    reference_weight,
                    DVectorView::from(&*local_state),
                    DVectorViewMut::from(&mut *local_vector),
                )?;
                rhs.rows_mut(row_offset, r)
                    .gemv_tr(T::one(), &*local_basis, &*local_vector, T::one());
            }
            column += 1;
        }
    }
    debug_assert_eq!(column, candidates.len());

    Ok(TrainingSystem {
        matrix,
        rhs,
        candidates,
    })
}

/// Solves the training system for sparse nonnegative weights.
///
/// Candidates with weight above the cutoff become the trained sample set. The residual is
/// recomputed with only the retained samples and must still meet the tolerance.
pub fn train_eqp<T: Real>(
    system: &TrainingSystem<T>,
    settings: &EqpSettings<T>,
) -> Result<(SampleSet<T>, EqpReport<T>), TrainingFailure> {
    if system.rhs.norm() == T::zero() {
        warn!("Training right-hand side is zero; the trained sample set is empty.");
    }

    let nnls_settings = NnlsSettings {
        tolerance: settings.tolerance,
        max_iterations: settings.max_iterations,
    };
    let result = nnls(&system.matrix, &system.rhs, &nnls_settings).map_err(TrainingFailure::Nnls)?;

    let mut retained_weights = DVector::zeros(system.num_candidates());
    let mut samples = Vec::new();
    for (p, (candidate, &weight)) in system.candidates.iter().zip(result.solution.iter()).enumerate() {
        if weight > settings.weight_cutoff {
            retained_weights[p] = weight;
            samples.push(Sample::new(candidate.location, candidate.quadrature_point, weight));
        }
    }

    let relative_residual = system.relative_residual(&retained_weights);
    if relative_residual > settings.tolerance {
        return Err(TrainingFailure::CutoffResidual {
            relative_residual: as_f64(relative_residual),
            tolerance: as_f64(settings.tolerance),
        });
    }

    info!(
        "Trained EQP samples: {} of {} candidates, relative residual {:e} after {} iterations",
        samples.len(),
        system.num_candidates(),
        as_f64(relative_residual),
        result.iterations
    );

    let report = EqpReport {
        candidates: system.num_candidates(),
        samples: samples.len(),
        iterations: result.iterations,
        relative_residual,
    };
    Ok((SampleSet::from_samples(samples), report))
}
