use crate::assembly::buffers::LocalBuffers;
use crate::assembly::local::{DofMap, QuadratureIntegrator};
use crate::basis::ReducedBasis;
use crate::direct::{add_sampled_gradient, add_sampled_residual};
use crate::eqp::{assemble_training_system, train_eqp, EqpReport, EqpSettings, TrainingSystem};
use crate::error::HyperReductionError;
use crate::io::{IntegratorSamples, SampleArchive};
use crate::jacobian::Jacobian;
use crate::partition::{PartitionReducer, SinglePartition};
use crate::precompute::{
    add_precomputed_gradient, add_precomputed_residual, precompute_tensors, PrecomputeCapability, PrecomputedTensor,
};
use crate::sample::{candidate_locations, IntegratorCategory, SampleSet};
use crate::Real;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView, DVectorViewMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::fmt::Display;
use std::path::Path;

/// Identifies an integrator registered with a [`HyperReducedOperator`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntegratorId(usize);

impl IntegratorId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Display for IntegratorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct IntegratorRecord<T: Real> {
    integrator: Box<dyn QuadratureIntegrator<T>>,
    category: IntegratorCategory,
    boundary_marker: Option<Vec<usize>>,
    samples: SampleSet<T>,
    /// Tensors for the current samples, one per sample.
    tensors: Option<Vec<PrecomputedTensor<T>>>,
}

impl<T: Real> IntegratorRecord<T> {
    fn candidate_locations<S: ?Sized + DofMap<T>>(&self, space: &S) -> Vec<usize> {
        candidate_locations(space, self.category, self.boundary_marker.as_deref())
    }

    fn full_pool<S: ?Sized + DofMap<T>>(&self, space: &S) -> SampleSet<T> {
        SampleSet::full_pool(&*self.integrator, &self.candidate_locations(space))
    }

    fn require_capability(&self, id: IntegratorId) -> Result<PrecomputeCapability, HyperReductionError> {
        let capability = self.integrator.precompute_capability();
        if capability.is_available() {
            Ok(capability)
        } else {
            Err(HyperReductionError::UnsupportedPrecompute {
                integrator: id,
                category: self.category,
                capability,
            })
        }
    }

    fn tensors(&self, id: IntegratorId) -> Result<&[PrecomputedTensor<T>], HyperReductionError> {
        self.require_capability(id)?;
        match &self.tensors {
            Some(tensors) if tensors.len() == self.samples.len() => Ok(tensors),
            _ => Err(HyperReductionError::MissingPrecompute {
                integrator: id,
                category: self.category,
            }),
        }
    }
}

/// A reduced nonlinear operator $x \mapsto \Phi^T F(\Phi x)$ evaluated on sparse sample sets.
///
/// Integrators are registered per category and each owns a sample set, initially the full
/// candidate pool with reference weights. Samples are replaced by training or loading. In direct
/// mode, the integrands are evaluated at the sampled points. In precompute mode, the residual and
/// Jacobian are obtained by contraction of precomputed reduced tensors.
///
/// The reduced residual and Jacobian are summed across partitions with the configured
/// [`PartitionReducer`].
pub struct HyperReducedOperator<T: Real, S> {
    space: S,
    basis: Option<ReducedBasis<T>>,
    integrators: Vec<IntegratorRecord<T>>,
    precompute_mode: bool,
    reducer: Box<dyn PartitionReducer<T>>,
    // Buffers prevent allocation in the sample loops of repeated evaluations
    workspace: RefCell<LocalBuffers<T>>,
}

impl<T, S> HyperReducedOperator<T, S>
where
    T: Real,
    S: DofMap<T>,
{
    pub fn new(space: S) -> Self {
        Self {
            space,
            basis: None,
            integrators: Vec::new(),
            precompute_mode: false,
            reducer: Box::new(SinglePartition),
            workspace: RefCell::new(LocalBuffers::default()),
        }
    }

    pub fn with_partition_reducer(self, reducer: impl PartitionReducer<T> + 'static) -> Self {
        Self {
            reducer: Box::new(reducer),
            ..self
        }
    }

    pub fn space(&self) -> &S {
        &self.space
    }

    pub fn basis(&self) -> Option<&ReducedBasis<T>> {
        self.basis.as_ref()
    }

    pub fn num_integrators(&self) -> usize {
        self.integrators.len()
    }

    pub fn precompute_mode(&self) -> bool {
        self.precompute_mode
    }

    pub fn add_domain_integrator(&mut self, integrator: impl QuadratureIntegrator<T> + 'static) -> IntegratorId {
        self.add_integrator(Box::new(integrator), IntegratorCategory::Domain, None)
    }

    pub fn add_interior_face_integrator(&mut self, integrator: impl QuadratureIntegrator<T> + 'static) -> IntegratorId {
        self.add_integrator(Box::new(integrator), IntegratorCategory::InteriorFace, None)
    }

    /// Registers a boundary face integrator restricted to faces whose attribute is in `marker`.
    pub fn add_boundary_face_integrator(
        &mut self,
        integrator: impl QuadratureIntegrator<T> + 'static,
        marker: impl Into<Vec<usize>>,
    ) -> IntegratorId {
        self.add_integrator(
            Box::new(integrator),
            IntegratorCategory::BoundaryFace,
            Some(marker.into()),
        )
    }

    fn add_integrator(
        &mut self,
        integrator: Box<dyn QuadratureIntegrator<T>>,
        category: IntegratorCategory,
        boundary_marker: Option<Vec<usize>>,
    ) -> IntegratorId {
        let id = IntegratorId(self.integrators.len());
        let mut record = IntegratorRecord {
            integrator,
            category,
            boundary_marker,
            samples: SampleSet::new(),
            tensors: None,
        };
        record.samples = record.full_pool(&self.space);
        self.integrators.push(record);
        id
    }

    fn record(&self, id: IntegratorId) -> Result<&IntegratorRecord<T>, HyperReductionError> {
        self.integrators
            .get(id.0)
            .ok_or(HyperReductionError::UnknownIntegrator(id))
    }

    pub fn category(&self, id: IntegratorId) -> Result<IntegratorCategory, HyperReductionError> {
        Ok(self.record(id)?.category)
    }

    pub fn samples(&self, id: IntegratorId) -> Result<&SampleSet<T>, HyperReductionError> {
        Ok(&self.record(id)?.samples)
    }

    /// Number of candidate quadrature points available to an integrator.
    pub fn candidate_pool_size(&self, id: IntegratorId) -> Result<usize, HyperReductionError> {
        Ok(self.record(id)?.full_pool(&self.space).len())
    }

    /// Sets the reduced basis.
    ///
    /// Samples and tensors depend on the basis, so every sample set is reset to the full
    /// candidate pool and all precomputed tensors are discarded.
    pub fn set_basis(&mut self, basis: impl Into<ReducedBasis<T>>) -> Result<(), HyperReductionError> {
        let basis = basis.into();
        if basis.num_dofs() != self.space.num_dofs() {
            return Err(HyperReductionError::DimensionMismatch {
                quantity: "basis rows",
                expected: self.space.num_dofs(),
                actual: basis.num_dofs(),
            });
        }

        if self.basis.is_some() {
            warn!("Replacing the reduced basis resets all sample sets to the full candidate pool.");
        }
        for record in &mut self.integrators {
            record.samples = record.full_pool(&self.space);
            record.tensors = None;
        }
        self.basis = Some(basis);
        Ok(())
    }

    fn validate_samples(
        &self,
        id: IntegratorId,
        record: &IntegratorRecord<T>,
        samples: &SampleSet<T>,
    ) -> Result<(), HyperReductionError> {
        samples
            .validate(
                &self.space,
                &*record.integrator,
                record.category,
                record.boundary_marker.as_deref(),
            )
            .map_err(|(position, reason)| HyperReductionError::InvalidSample {
                integrator: id,
                category: record.category,
                position,
                reason,
            })
    }

    /// Replaces the sample set of an integrator after validating it.
    ///
    /// In precompute mode, tensors for the new samples are built right away if a basis is set.
    pub fn update_sampling(&mut self, id: IntegratorId, samples: SampleSet<T>) -> Result<(), HyperReductionError> {
        let record = self.record(id)?;
        self.validate_samples(id, record, &samples)?;
        self.replace_samples(id, samples)
    }

    /// Installs the full candidate pool with reference weights.
    pub fn use_full_sampling(&mut self, id: IntegratorId) -> Result<(), HyperReductionError> {
        let samples = self.record(id)?.full_pool(&self.space);
        self.replace_samples(id, samples)
    }

    fn replace_samples(&mut self, id: IntegratorId, samples: SampleSet<T>) -> Result<(), HyperReductionError> {
        let tensors = self.tensors_for_mode(id, &samples)?;
        self.install_samples(id, samples, tensors);
        Ok(())
    }

    fn install_samples(&mut self, id: IntegratorId, samples: SampleSet<T>, tensors: Option<Vec<PrecomputedTensor<T>>>) {
        let record = &mut self.integrators[id.0];
        record.samples = samples;
        record.tensors = tensors;
    }

    /// Switches between direct evaluation and evaluation by precomputed tensors.
    ///
    /// Enabling precompute mode fails if any integrator is not capable of it. Tensors are not
    /// built here; see [`precompute_coefficients`](Self::precompute_coefficients).
    pub fn set_precompute_mode(&mut self, enabled: bool) -> Result<(), HyperReductionError> {
        if enabled {
            for (index, record) in self.integrators.iter().enumerate() {
                record.require_capability(IntegratorId(index))?;
            }
        }
        self.precompute_mode = enabled;
        Ok(())
    }

    /// Builds the reduced tensors of every integrator for its current samples.
    ///
    /// Tensors are installed only if they could be built for all integrators.
    pub fn precompute_coefficients(&mut self) -> Result<(), HyperReductionError> {
        self.require_basis()?;
        self.require_integrators()?;
        let tensors = (0..self.integrators.len())
            .map(|index| {
                let id = IntegratorId(index);
                self.compute_tensors(id, &self.integrators[index].samples)
            })
            .collect::<Result<Vec<_>, _>>()?;
        for (record, tensors) in self.integrators.iter_mut().zip(tensors) {
            record.tensors = Some(tensors);
        }
        Ok(())
    }

    fn compute_tensors(
        &self,
        id: IntegratorId,
        samples: &SampleSet<T>,
    ) -> Result<Vec<PrecomputedTensor<T>>, HyperReductionError> {
        let basis = self.require_basis()?;
        let record = self.record(id)?;
        let capability = record.require_capability(id)?;

        let buffers = &mut *self.workspace.borrow_mut();
        let tensors = precompute_tensors(&self.space, &*record.integrator, record.category, samples, basis, buffers)
            .map_err(|source| HyperReductionError::Integrand {
                integrator: id,
                category: record.category,
                source,
            })?;
        debug!(
            "Precomputed {} tensors of degree {} for {} integrator {}",
            tensors.len(),
            capability.polynomial_degree,
            record.category,
            id
        );
        Ok(tensors)
    }

    /// Tensors for `samples` if evaluation currently requires them.
    fn tensors_for_mode(
        &self,
        id: IntegratorId,
        samples: &SampleSet<T>,
    ) -> Result<Option<Vec<PrecomputedTensor<T>>>, HyperReductionError> {
        if self.precompute_mode && self.basis.is_some() {
            self.compute_tensors(id, samples).map(Some)
        } else {
            Ok(None)
        }
    }

    fn require_basis(&self) -> Result<&ReducedBasis<T>, HyperReductionError> {
        self.basis.as_ref().ok_or(HyperReductionError::MissingBasis)
    }

    fn require_integrators(&self) -> Result<(), HyperReductionError> {
        if self.integrators.is_empty() {
            Err(HyperReductionError::MissingIntegrators)
        } else {
            Ok(())
        }
    }

    fn require_reduced_dimension(&self, x: &DVectorView<T>) -> Result<&ReducedBasis<T>, HyperReductionError> {
        let basis = self.require_basis()?;
        self.require_integrators()?;
        if x.len() != basis.dimension() {
            return Err(HyperReductionError::DimensionMismatch {
                quantity: "reduced state",
                expected: basis.dimension(),
                actual: x.len(),
            });
        }
        Ok(basis)
    }

    /// Computes the reduced residual $y = \sum_I \Phi^T F_I(\Phi x)$ over all integrators.
    pub fn mult<'a>(&self, x: impl Into<DVectorView<'a, T>>) -> Result<DVector<T>, HyperReductionError> {
        let x = x.into();
        let mut y = DVector::zeros(x.len());
        self.mult_into(x, &mut y)?;
        Ok(y)
    }

    /// Like [`mult`](Self::mult), overwriting `y`.
    pub fn mult_into<'a>(&self, x: impl Into<DVectorView<'a, T>>, y: &mut DVector<T>) -> Result<(), HyperReductionError> {
        let x = x.into();
        let basis = self.require_reduced_dimension(&x)?;
        if y.len() != basis.dimension() {
            return Err(HyperReductionError::DimensionMismatch {
                quantity: "reduced output",
                expected: basis.dimension(),
                actual: y.len(),
            });
        }

        y.fill(T::zero());
        let buffers = &mut *self.workspace.borrow_mut();
        for (index, record) in self.integrators.iter().enumerate() {
            let id = IntegratorId(index);
            if self.precompute_mode {
                let tensors = record.tensors(id)?;
                add_precomputed_residual(&mut *y, &x, &record.samples, tensors);
            } else {
                add_sampled_residual(
                    DVectorViewMut::from(&mut *y),
                    &x,
                    &self.space,
                    &*record.integrator,
                    record.category,
                    &record.samples,
                    basis,
                    buffers,
                )
                .map_err(|source| HyperReductionError::Integrand {
                    integrator: id,
                    category: record.category,
                    source,
                })?;
            }
        }

        self.reducer.sum_reduce(y.as_mut_slice());
        Ok(())
    }

    /// Computes the dense reduced Jacobian $\sum_I \Phi^T J_I(\Phi x) \Phi$ over all integrators.
    pub fn gradient<'a>(&self, x: impl Into<DVectorView<'a, T>>) -> Result<Jacobian<T>, HyperReductionError> {
        let x = x.into();
        let basis = self.require_reduced_dimension(&x)?;
        let r = basis.dimension();

        let mut jacobian = DMatrix::zeros(r, r);
        let buffers = &mut *self.workspace.borrow_mut();
        for (index, record) in self.integrators.iter().enumerate() {
            let id = IntegratorId(index);
            if self.precompute_mode {
                let tensors = record.tensors(id)?;
                add_precomputed_gradient(&mut jacobian, &x, &record.samples, tensors);
            } else {
                add_sampled_gradient(
                    DMatrixViewMut::from(&mut jacobian),
                    &x,
                    &self.space,
                    &*record.integrator,
                    record.category,
                    &record.samples,
                    basis,
                    buffers,
                )
                .map_err(|source| HyperReductionError::Integrand {
                    integrator: id,
                    category: record.category,
                    source,
                })?;
            }
        }

        self.reducer.sum_reduce(jacobian.as_mut_slice());
        Ok(Jacobian::Dense(jacobian))
    }

    fn require_snapshots(&self, snapshots: &DMatrix<T>) -> Result<&ReducedBasis<T>, HyperReductionError> {
        let basis = self.require_basis()?;
        if snapshots.nrows() != self.space.num_dofs() {
            return Err(HyperReductionError::DimensionMismatch {
                quantity: "snapshot rows",
                expected: self.space.num_dofs(),
                actual: snapshots.nrows(),
            });
        }
        Ok(basis)
    }

    /// Assembles the training system of one integrator for the given full-order snapshots
    /// (one per column).
    pub fn setup_training_system(
        &self,
        id: IntegratorId,
        snapshots: &DMatrix<T>,
    ) -> Result<TrainingSystem<T>, HyperReductionError> {
        let record = self.record(id)?;
        let basis = self.require_snapshots(snapshots)?;
        assemble_training_system(
            &self.space,
            &*record.integrator,
            record.category,
            &record.candidate_locations(&self.space),
            basis,
            snapshots,
        )
        .map_err(|source| HyperReductionError::Integrand {
            integrator: id,
            category: record.category,
            source,
        })
    }

    fn train_samples(
        &self,
        id: IntegratorId,
        snapshots: &DMatrix<T>,
        settings: &EqpSettings<T>,
    ) -> Result<(SampleSet<T>, EqpReport<T>), HyperReductionError> {
        let system = self.setup_training_system(id, snapshots)?;
        let category = self.integrators[id.0].category;
        let (samples, report) =
            train_eqp(&system, settings).map_err(|cause| HyperReductionError::TrainingNonconvergence {
                integrator: id,
                category,
                cause,
            })?;
        info!(
            "Trained {} integrator {}: {} of {} candidate points retained",
            category, id, report.samples, report.candidates
        );
        Ok((samples, report))
    }

    /// Trains the sample set of a single integrator and installs it.
    pub fn train_integrator(
        &mut self,
        id: IntegratorId,
        snapshots: &DMatrix<T>,
        settings: &EqpSettings<T>,
    ) -> Result<EqpReport<T>, HyperReductionError> {
        let (samples, report) = self.train_samples(id, snapshots, settings)?;
        self.replace_samples(id, samples)?;
        Ok(report)
    }

    /// Trains the sample sets of all integrators, in registration order.
    ///
    /// In precompute mode, tensors are rebuilt for the trained samples. If training or
    /// precompute fails for any integrator, no sample set is changed.
    pub fn train(
        &mut self,
        snapshots: &DMatrix<T>,
        settings: &EqpSettings<T>,
    ) -> Result<Vec<EqpReport<T>>, HyperReductionError> {
        self.require_integrators()?;
        self.require_snapshots(snapshots)?;
        let mut trained = Vec::with_capacity(self.integrators.len());
        for index in 0..self.integrators.len() {
            let id = IntegratorId(index);
            let (samples, report) = self.train_samples(id, snapshots, settings)?;
            let tensors = self.tensors_for_mode(id, &samples)?;
            trained.push((samples, tensors, report));
        }

        let mut reports = Vec::with_capacity(trained.len());
        for (index, (samples, tensors, report)) in trained.into_iter().enumerate() {
            self.install_samples(IntegratorId(index), samples, tensors);
            reports.push(report);
        }
        Ok(reports)
    }

    /// Collects the current sample sets of all integrators.
    pub fn sample_archive(&self) -> SampleArchive<T> {
        SampleArchive {
            integrators: self
                .integrators
                .iter()
                .map(|record| IntegratorSamples {
                    category: record.category,
                    samples: record.samples.clone(),
                })
                .collect(),
        }
    }

    /// Installs persisted sample sets.
    ///
    /// The archive must match the registered integrators in number and category, and every sample
    /// must be valid. Nothing is installed unless all checks pass.
    pub fn restore_sample_archive(&mut self, archive: SampleArchive<T>) -> Result<(), HyperReductionError> {
        if archive.integrators.len() != self.integrators.len() {
            return Err(HyperReductionError::DimensionMismatch {
                quantity: "integrators in sample archive",
                expected: self.integrators.len(),
                actual: archive.integrators.len(),
            });
        }
        for (index, (record, entry)) in self.integrators.iter().zip(&archive.integrators).enumerate() {
            let id = IntegratorId(index);
            if record.category != entry.category {
                return Err(HyperReductionError::CategoryMismatch {
                    integrator: id,
                    expected: record.category,
                    actual: entry.category,
                });
            }
            self.validate_samples(id, record, &entry.samples)?;
        }

        let tensors = archive
            .integrators
            .iter()
            .enumerate()
            .map(|(index, entry)| self.tensors_for_mode(IntegratorId(index), &entry.samples))
            .collect::<Result<Vec<_>, _>>()?;
        for (index, (entry, tensors)) in archive.integrators.into_iter().zip(tensors).enumerate() {
            self.install_samples(IntegratorId(index), entry.samples, tensors);
        }
        Ok(())
    }
}

impl<T, S> HyperReducedOperator<T, S>
where
    T: Real + Serialize + DeserializeOwned,
    S: DofMap<T>,
{
    /// Writes the sample sets of all integrators to a JSON file.
    pub fn save_samples(&self, path: impl AsRef<Path>) -> Result<(), HyperReductionError> {
        self.sample_archive().save_json(path)
    }

    /// Reads sample sets from a JSON file written by [`save_samples`](Self::save_samples).
    pub fn load_samples(&mut self, path: impl AsRef<Path>) -> Result<(), HyperReductionError> {
        let archive = SampleArchive::load_json(path)?;
        self.restore_sample_archive(archive)
    }
}
