use crate::integrators::{BoundaryFluxIntegrator, CentralFluxIntegrator, ConvectionIntegrator, DiffusionIntegrator};
use crate::mesh::{DiscontinuousQ1Space, StructuredQuadMesh, RIGHT, TOP};
use crate::quadrature::GaussRule;
use eqp::assembly::global::{assemble_full_vector, CsrAssembler};
use eqp::assembly::local::{DofMap, QuadratureIntegrator};
use eqp::nalgebra::{DMatrix, DVector};
use eqp::nalgebra_sparse::CsrMatrix;
use eqp::operator::{HyperReducedOperator, IntegratorId};
use eqp::sample::{candidate_locations, IntegratorCategory};
use proptest::prelude::Rng;
use proptest::test_runner::{RngAlgorithm, TestRng};

pub const VELOCITY: [f64; 2] = [1.0, 0.5];

/// A random number generator that produces the same sequence on every run.
pub fn deterministic_rng() -> TestRng {
    TestRng::deterministic_rng(RngAlgorithm::ChaCha)
}

pub fn random_vector(rng: &mut TestRng, n: usize) -> DVector<f64> {
    DVector::from_fn(n, |_, _| rng.gen_range(-1.0..1.0))
}

pub fn random_matrix(rng: &mut TestRng, nrows: usize, ncols: usize) -> DMatrix<f64> {
    DMatrix::from_fn(nrows, ncols, |_, _| rng.gen_range(-1.0..1.0))
}

/// An `n x r` matrix with orthonormal columns.
pub fn orthonormal_basis(rng: &mut TestRng, n: usize, r: usize) -> DMatrix<f64> {
    assert!(r <= n);
    random_matrix(rng, n, r).qr().q()
}

/// Snapshots in the span of `basis`, one per column.
pub fn snapshots_in_span(rng: &mut TestRng, basis: &DMatrix<f64>, num_snapshots: usize) -> DMatrix<f64> {
    basis * random_matrix(rng, basis.ncols(), num_snapshots)
}

/// A nonlinear convection-diffusion problem on the unit square with integrators of all categories.
///
/// The outflow integrator is restricted to the right and top boundaries.
#[derive(Debug, Clone)]
pub struct TestProblem {
    pub space: DiscontinuousQ1Space,
    pub convection: ConvectionIntegrator,
    pub diffusion: DiffusionIntegrator,
    pub flux: CentralFluxIntegrator,
    pub outflow: BoundaryFluxIntegrator,
    pub outflow_marker: Vec<usize>,
}

impl TestProblem {
    pub fn new(n: usize) -> Self {
        let mesh = StructuredQuadMesh::unit_square(n);
        let rule = GaussRule::new(3);
        Self {
            space: DiscontinuousQ1Space::new(mesh),
            convection: ConvectionIntegrator::new(mesh, rule.clone(), 1.0, VELOCITY),
            diffusion: DiffusionIntegrator::new(mesh, rule.clone(), 0.1),
            flux: CentralFluxIntegrator::new(mesh, rule.clone(), 1.0, VELOCITY),
            outflow: BoundaryFluxIntegrator::new(mesh, rule, 1.0, VELOCITY),
            outflow_marker: vec![RIGHT, TOP],
        }
    }

    pub fn with_flipped_orientations(self) -> Self {
        Self {
            space: self.space.with_flipped_orientations(),
            ..self
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.space.num_dofs()
    }

    /// An operator with all four integrators registered in the order
    /// convection, diffusion, flux, outflow.
    pub fn operator(&self) -> HyperReducedOperator<f64, DiscontinuousQ1Space> {
        self.operator_with_ids().0
    }

    /// Like [`operator`](Self::operator), also returning the ids in registration order.
    pub fn operator_with_ids(&self) -> (HyperReducedOperator<f64, DiscontinuousQ1Space>, [IntegratorId; 4]) {
        let mut operator = HyperReducedOperator::new(self.space);
        let ids = [
            operator.add_domain_integrator(self.convection.clone()),
            operator.add_domain_integrator(self.diffusion.clone()),
            operator.add_interior_face_integrator(self.flux.clone()),
            operator.add_boundary_face_integrator(self.outflow.clone(), self.outflow_marker.clone()),
        ];
        (operator, ids)
    }

    fn integrators(&self) -> [(&dyn QuadratureIntegrator<f64>, IntegratorCategory, Option<&[usize]>); 4] {
        [
            (&self.convection, IntegratorCategory::Domain, None),
            (&self.diffusion, IntegratorCategory::Domain, None),
            (&self.flux, IntegratorCategory::InteriorFace, None),
            (&self.outflow, IntegratorCategory::BoundaryFace, Some(self.outflow_marker.as_slice())),
        ]
    }

    /// The unreduced residual $F(u)$ with the reference quadrature.
    pub fn full_residual(&self, u: &DVector<f64>) -> eyre::Result<DVector<f64>> {
        let mut residual = DVector::zeros(self.num_dofs());
        for (integrator, category, marker) in self.integrators() {
            let locations = candidate_locations::<f64, _>(&self.space, category, marker);
            assemble_full_vector(&mut residual, &self.space, integrator, category, &locations, u)?;
        }
        Ok(residual)
    }

    /// The unreduced sparse Jacobian $\partial F / \partial u$ with the reference quadrature.
    pub fn full_jacobian(&self, u: &DVector<f64>) -> eyre::Result<CsrMatrix<f64>> {
        let assembler = CsrAssembler::default();
        let mut jacobian = CsrMatrix::zeros(self.num_dofs(), self.num_dofs());
        for (integrator, category, marker) in self.integrators() {
            let locations = candidate_locations::<f64, _>(&self.space, category, marker);
            let contribution = assembler.assemble_jacobian(&self.space, integrator, category, &locations, u)?;
            jacobian = &jacobian + &contribution;
        }
        Ok(jacobian)
    }
}
