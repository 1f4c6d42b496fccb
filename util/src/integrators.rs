//! Reference integrands on [`DiscontinuousQ1Space`](crate::mesh::DiscontinuousQ1Space).
//!
//! Every integrand multiplies the quadrature weight by the determinant of the element or face
//! map, so the weights reported by `quadrature_weights` are the reference rule weights.
use crate::mesh::{q1_gradients, q1_values, StructuredQuadMesh};
use crate::quadrature::GaussRule;
use eqp::assembly::local::QuadratureIntegrator;
use eqp::nalgebra::{DMatrixViewMut, DVectorView, DVectorViewMut};
use eqp::precompute::PrecomputeCapability;
use eyre::ensure;

fn dot(a: [f64; 2], b: [f64; 2]) -> f64 {
    a[0] * b[0] + a[1] * b[1]
}

fn interpolate(values: &[f64; 4], u: &DVectorView<f64>, offset: usize) -> f64 {
    (0..4).map(|b| values[b] * u[offset + b]).sum()
}

fn directional_derivative(gradients: &[[f64; 2]; 4], direction: [f64; 2], u: &DVectorView<f64>) -> f64 {
    (0..4).map(|b| dot(direction, gradients[b]) * u[b]).sum()
}

/// Quadrature data shared by the element integrands.
#[derive(Debug, Clone, PartialEq)]
struct ElementQuadrature {
    mesh: StructuredQuadMesh,
    rule: GaussRule,
    weights: Vec<f64>,
}

impl ElementQuadrature {
    fn new(mesh: StructuredQuadMesh, rule: GaussRule) -> Self {
        let weights = rule.tensor_weights();
        Self { mesh, rule, weights }
    }

    /// Basis values, physical gradients and the scaled weight of a quadrature point.
    fn evaluate(&self, quadrature_point: usize, weight: f64) -> ([f64; 4], [[f64; 2]; 4], f64) {
        let p = self.rule.tensor_point(quadrature_point);
        let [hx, hy] = self.mesh.element_size();
        let jacobian_det = 0.25 * hx * hy;
        (
            q1_values(p),
            q1_gradients(p, self.mesh.element_size()),
            weight * jacobian_det,
        )
    }
}

/// Quadrature data shared by the face integrands.
#[derive(Debug, Clone, PartialEq)]
struct FaceQuadrature {
    mesh: StructuredQuadMesh,
    rule: GaussRule,
}

/// The convective term $c \, \phi_a u (\beta \cdot \nabla u)$, quadratic in $u$.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvectionIntegrator {
    quadrature: ElementQuadrature,
    coefficient: f64,
    velocity: [f64; 2],
}

impl ConvectionIntegrator {
    pub fn new(mesh: StructuredQuadMesh, rule: GaussRule, coefficient: f64, velocity: [f64; 2]) -> Self {
        Self {
            quadrature: ElementQuadrature::new(mesh, rule),
            coefficient,
            velocity,
        }
    }
}

impl QuadratureIntegrator<f64> for ConvectionIntegrator {
    fn quadrature_weights(&self, _location: usize) -> &[f64] {
        &self.quadrature.weights
    }

    fn assemble_quadrature_vector(
        &self,
        _location: usize,
        quadrature_point: usize,
        weight: f64,
        u: DVectorView<f64>,
        mut output: DVectorViewMut<f64>,
    ) -> eyre::Result<()> {
        let (phi, grad, w) = self.quadrature.evaluate(quadrature_point, weight);
        let u_value = interpolate(&phi, &u, 0);
        let convection = directional_derivative(&grad, self.velocity, &u);
        for a in 0..4 {
            output[a] += w * self.coefficient * phi[a] * u_value * convection;
        }
        Ok(())
    }

    fn assemble_quadrature_gradient(
        &self,
        _location: usize,
        quadrature_point: usize,
        weight: f64,
        u: DVectorView<f64>,
        mut output: DMatrixViewMut<f64>,
    ) -> eyre::Result<()> {
        let (phi, grad, w) = self.quadrature.evaluate(quadrature_point, weight);
        let u_value = interpolate(&phi, &u, 0);
        let convection = directional_derivative(&grad, self.velocity, &u);
        for a in 0..4 {
            for b in 0..4 {
                let du = phi[b] * convection + u_value * dot(self.velocity, grad[b]);
                output[(a, b)] += w * self.coefficient * phi[a] * du;
            }
        }
        Ok(())
    }

    fn precompute_capability(&self) -> PrecomputeCapability {
        PrecomputeCapability::polynomial(2)
    }

    fn assemble_quadrature_multilinear(
        &self,
        _location: usize,
        quadrature_point: usize,
        weight: f64,
        arguments: &[DVectorView<f64>],
        mut output: DVectorViewMut<f64>,
    ) -> eyre::Result<()> {
        ensure!(arguments.len() == 2, "convection form takes two arguments");
        let (phi, grad, w) = self.quadrature.evaluate(quadrature_point, weight);
        let v_value = interpolate(&phi, &arguments[0], 0);
        let convection = directional_derivative(&grad, self.velocity, &arguments[1]);
        for a in 0..4 {
            output[a] += w * self.coefficient * phi[a] * v_value * convection;
        }
        Ok(())
    }
}

/// The diffusion term $\kappa \nabla \phi_a \cdot \nabla u$, linear in $u$.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffusionIntegrator {
    quadrature: ElementQuadrature,
    diffusivity: f64,
}

impl DiffusionIntegrator {
    pub fn new(mesh: StructuredQuadMesh, rule: GaussRule, diffusivity: f64) -> Self {
        Self {
            quadrature: ElementQuadrature::new(mesh, rule),
            diffusivity,
        }
    }

    fn add_form(&self, quadrature_point: usize, weight: f64, u: &DVectorView<f64>, output: &mut DVectorViewMut<f64>) {
        let (_, grad, w) = self.quadrature.evaluate(quadrature_point, weight);
        let grad_u = (0..4).fold([0.0, 0.0], |acc, b| {
            [acc[0] + grad[b][0] * u[b], acc[1] + grad[b][1] * u[b]]
        });
        for a in 0..4 {
            output[a] += w * self.diffusivity * dot(grad[a], grad_u);
        }
    }
}

impl QuadratureIntegrator<f64> for DiffusionIntegrator {
    fn quadrature_weights(&self, _location: usize) -> &[f64] {
        &self.quadrature.weights
    }

    fn assemble_quadrature_vector(
        &self,
        _location: usize,
        quadrature_point: usize,
        weight: f64,
        u: DVectorView<f64>,
        mut output: DVectorViewMut<f64>,
    ) -> eyre::Result<()> {
        self.add_form(quadrature_point, weight, &u, &mut output);
        Ok(())
    }

    fn assemble_quadrature_gradient(
        &self,
        _location: usize,
        quadrature_point: usize,
        weight: f64,
        _u: DVectorView<f64>,
        mut output: DMatrixViewMut<f64>,
    ) -> eyre::Result<()> {
        let (_, grad, w) = self.quadrature.evaluate(quadrature_point, weight);
        for a in 0..4 {
            for b in 0..4 {
                output[(a, b)] += w * self.diffusivity * dot(grad[a], grad[b]);
            }
        }
        Ok(())
    }

    fn precompute_capability(&self) -> PrecomputeCapability {
        PrecomputeCapability::polynomial(1)
    }

    fn assemble_quadrature_multilinear(
        &self,
        _location: usize,
        quadrature_point: usize,
        weight: f64,
        arguments: &[DVectorView<f64>],
        mut output: DVectorViewMut<f64>,
    ) -> eyre::Result<()> {
        ensure!(arguments.len() == 1, "diffusion form takes one argument");
        self.add_form(quadrature_point, weight, &arguments[0], &mut output);
        Ok(())
    }
}

/// The reaction term $c \, \phi_a u^3$, cubic in $u$.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicReactionIntegrator {
    quadrature: ElementQuadrature,
    coefficient: f64,
}

impl CubicReactionIntegrator {
    pub fn new(mesh: StructuredQuadMesh, rule: GaussRule, coefficient: f64) -> Self {
        Self {
            quadrature: ElementQuadrature::new(mesh, rule),
            coefficient,
        }
    }
}

impl QuadratureIntegrator<f64> for CubicReactionIntegrator {
    fn quadrature_weights(&self, _location: usize) -> &[f64] {
        &self.quadrature.weights
    }

    fn assemble_quadrature_vector(
        &self,
        _location: usize,
        quadrature_point: usize,
        weight: f64,
        u: DVectorView<f64>,
        mut output: DVectorViewMut<f64>,
    ) -> eyre::Result<()> {
        let (phi, _, w) = self.quadrature.evaluate(quadrature_point, weight);
        let u_value = interpolate(&phi, &u, 0);
        for a in 0..4 {
            output[a] += w * self.coefficient * phi[a] * u_value.powi(3);
        }
        Ok(())
    }

    fn assemble_quadrature_gradient(
        &self,
        _location: usize,
        quadrature_point: usize,
        weight: f64,
        u: DVectorView<f64>,
        mut output: DMatrixViewMut<f64>,
    ) -> eyre::Result<()> {
        let (phi, _, w) = self.quadrature.evaluate(quadrature_point, weight);
        let u_value = interpolate(&phi, &u, 0);
        for a in 0..4 {
            for b in 0..4 {
                output[(a, b)] += w * self.coefficient * phi[a] * 3.0 * u_value * u_value * phi[b];
            }
        }
        Ok(())
    }

    fn precompute_capability(&self) -> PrecomputeCapability {
        PrecomputeCapability::polynomial(3)
    }

    fn assemble_quadrature_multilinear(
        &self,
        _location: usize,
        quadrature_point: usize,
        weight: f64,
        arguments: &[DVectorView<f64>],
        mut output: DVectorViewMut<f64>,
    ) -> eyre::Result<()> {
        ensure!(arguments.len() == 3, "cubic reaction form takes three arguments");
        let (phi, _, w) = self.quadrature.evaluate(quadrature_point, weight);
        let product: f64 = arguments
            .iter()
            .map(|v| interpolate(&phi, v, 0))
            .product();
        for a in 0..4 {
            output[a] += w * self.coefficient * phi[a] * product;
        }
        Ok(())
    }
}

/// A constant source term $f \phi_a$, independent of $u$.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceIntegrator {
    quadrature: ElementQuadrature,
    source: f64,
}

impl SourceIntegrator {
    pub fn new(mesh: StructuredQuadMesh, rule: GaussRule, source: f64) -> Self {
        Self {
            quadrature: ElementQuadrature::new(mesh, rule),
            source,
        }
    }

    fn add_source(&self, quadrature_point: usize, weight: f64, output: &mut DVectorViewMut<f64>) {
        let (phi, _, w) = self.quadrature.evaluate(quadrature_point, weight);
        for a in 0..4 {
            output[a] += w * self.source * phi[a];
        }
    }
}

impl QuadratureIntegrator<f64> for SourceIntegrator {
    fn quadrature_weights(&self, _location: usize) -> &[f64] {
        &self.quadrature.weights
    }

    fn assemble_quadrature_vector(
        &self,
        _location: usize,
        quadrature_point: usize,
        weight: f64,
        _u: DVectorView<f64>,
        mut output: DVectorViewMut<f64>,
    ) -> eyre::Result<()> {
        self.add_source(quadrature_point, weight, &mut output);
        Ok(())
    }

    fn assemble_quadrature_gradient(
        &self,
        _location: usize,
        _quadrature_point: usize,
        _weight: f64,
        _u: DVectorView<f64>,
        _output: DMatrixViewMut<f64>,
    ) -> eyre::Result<()> {
        Ok(())
    }

    fn precompute_capability(&self) -> PrecomputeCapability {
        PrecomputeCapability::polynomial(0)
    }

    fn assemble_quadrature_multilinear(
        &self,
        _location: usize,
        quadrature_point: usize,
        weight: f64,
        arguments: &[DVectorView<f64>],
        mut output: DVectorViewMut<f64>,
    ) -> eyre::Result<()> {
        ensure!(arguments.is_empty(), "source form takes no arguments");
        self.add_source(quadrature_point, weight, &mut output);
        Ok(())
    }
}

/// The reaction term $c \, \phi_a e^u$, which is not polynomial and cannot be precomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialReactionIntegrator {
    quadrature: ElementQuadrature,
    coefficient: f64,
}

impl ExponentialReactionIntegrator {
    pub fn new(mesh: StructuredQuadMesh, rule: GaussRule, coefficient: f64) -> Self {
        Self {
            quadrature: ElementQuadrature::new(mesh, rule),
            coefficient,
        }
    }
}

impl QuadratureIntegrator<f64> for ExponentialReactionIntegrator {
    fn quadrature_weights(&self, _location: usize) -> &[f64] {
        &self.quadrature.weights
    }

    fn assemble_quadrature_vector(
        &self,
        _location: usize,
        quadrature_point: usize,
        weight: f64,
        u: DVectorView<f64>,
        mut output: DVectorViewMut<f64>,
    ) -> eyre::Result<()> {
        let (phi, _, w) = self.quadrature.evaluate(quadrature_point, weight);
        let exp_u = interpolate(&phi, &u, 0).exp();
        for a in 0..4 {
            output[a] += w * self.coefficient * phi[a] * exp_u;
        }
        Ok(())
    }

    fn assemble_quadrature_gradient(
        &self,
        _location: usize,
        quadrature_point: usize,
        weight: f64,
        u: DVectorView<f64>,
        mut output: DMatrixViewMut<f64>,
    ) -> eyre::Result<()> {
        let (phi, _, w) = self.quadrature.evaluate(quadrature_point, weight);
        let exp_u = interpolate(&phi, &u, 0).exp();
        for a in 0..4 {
            for b in 0..4 {
                output[(a, b)] += w * self.coefficient * phi[a] * exp_u * phi[b];
            }
        }
        Ok(())
    }
}

/// A central flux $c (\beta \cdot n) \{ u^2 / 2 \} [\![ \phi_a ]\!]$ on interior faces, quadratic in $u$.
///
/// The average is taken over the two traces and the jump of the test function is minus trace
/// minus plus trace.
#[derive(Debug, Clone, PartialEq)]
pub struct CentralFluxIntegrator {
    quadrature: FaceQuadrature,
    coefficient: f64,
    velocity: [f64; 2],
}

impl CentralFluxIntegrator {
    pub fn new(mesh: StructuredQuadMesh, rule: GaussRule, coefficient: f64, velocity: [f64; 2]) -> Self {
        Self {
            quadrature: FaceQuadrature { mesh, rule },
            coefficient,
            velocity,
        }
    }

    /// Traces of the basis on both sides, the flux scale $c (\beta \cdot n)$ and the scaled weight.
    fn evaluate(&self, face: usize, quadrature_point: usize, weight: f64) -> ([f64; 4], [f64; 4], f64, f64) {
        let face = self.quadrature.mesh.interior_face(face);
        let s = self.quadrature.rule.points()[quadrature_point];
        let (p_minus, p_plus) = face.reference_points(s);
        let scale = self.coefficient * dot(self.velocity, face.normal);
        (q1_values(p_minus), q1_values(p_plus), scale, weight * 0.5 * face.length)
    }

    fn add_flux(&self, phi_minus: &[f64; 4], phi_plus: &[f64; 4], flux: f64, output: &mut DVectorViewMut<f64>) {
        for a in 0..4 {
            output[a] += flux * phi_minus[a];
            output[4 + a] -= flux * phi_plus[a];
        }
    }
}

impl QuadratureIntegrator<f64> for CentralFluxIntegrator {
    fn quadrature_weights(&self, _location: usize) -> &[f64] {
        self.quadrature.rule.weights()
    }

    fn assemble_quadrature_vector(
        &self,
        location: usize,
        quadrature_point: usize,
        weight: f64,
        u: DVectorView<f64>,
        mut output: DVectorViewMut<f64>,
    ) -> eyre::Result<()> {
        let (phi_minus, phi_plus, scale, w) = self.evaluate(location, quadrature_point, weight);
        let u_minus = interpolate(&phi_minus, &u, 0);
        let u_plus = interpolate(&phi_plus, &u, 4);
        let flux = w * scale * 0.25 * (u_minus * u_minus + u_plus * u_plus);
        self.add_flux(&phi_minus, &phi_plus, flux, &mut output);
        Ok(())
    }

    fn assemble_quadrature_gradient(
        &self,
        location: usize,
        quadrature_point: usize,
        weight: f64,
        u: DVectorView<f64>,
        mut output: DMatrixViewMut<f64>,
    ) -> eyre::Result<()> {
        let (phi_minus, phi_plus, scale, w) = self.evaluate(location, quadrature_point, weight);
        let u_minus = interpolate(&phi_minus, &u, 0);
        let u_plus = interpolate(&phi_plus, &u, 4);
        for b in 0..4 {
            let dflux_minus = w * scale * 0.5 * u_minus * phi_minus[b];
            let dflux_plus = w * scale * 0.5 * u_plus * phi_plus[b];
            for a in 0..4 {
                output[(a, b)] += dflux_minus * phi_minus[a];
                output[(a, 4 + b)] += dflux_plus * phi_minus[a];
                output[(4 + a, b)] -= dflux_minus * phi_plus[a];
                output[(4 + a, 4 + b)] -= dflux_plus * phi_plus[a];
            }
        }
        Ok(())
    }

    fn precompute_capability(&self) -> PrecomputeCapability {
        PrecomputeCapability::polynomial(2)
    }

    fn assemble_quadrature_multilinear(
        &self,
        location: usize,
        quadrature_point: usize,
        weight: f64,
        arguments: &[DVectorView<f64>],
        mut output: DVectorViewMut<f64>,
    ) -> eyre::Result<()> {
        ensure!(arguments.len() == 2, "central flux form takes two arguments");
        let (phi_minus, phi_plus, scale, w) = self.evaluate(location, quadrature_point, weight);
        let (v, z) = (&arguments[0], &arguments[1]);
        let product_minus = interpolate(&phi_minus, v, 0) * interpolate(&phi_minus, z, 0);
        let product_plus = interpolate(&phi_plus, v, 4) * interpolate(&phi_plus, z, 4);
        let flux = w * scale * 0.25 * (product_minus + product_plus);
        self.add_flux(&phi_minus, &phi_plus, flux, &mut output);
        Ok(())
    }
}

/// An outflow flux $c (\beta \cdot n) \, u^2 / 2 \, \phi_a$ on boundary faces, quadratic in $u$.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryFluxIntegrator {
    quadrature: FaceQuadrature,
    coefficient: f64,
    velocity: [f64; 2],
}

impl BoundaryFluxIntegrator {
    pub fn new(mesh: StructuredQuadMesh, rule: GaussRule, coefficient: f64, velocity: [f64; 2]) -> Self {
        Self {
            quadrature: FaceQuadrature { mesh, rule },
            coefficient,
            velocity,
        }
    }

    fn evaluate(&self, face: usize, quadrature_point: usize, weight: f64) -> ([f64; 4], f64, f64) {
        let face = self.quadrature.mesh.boundary_face(face);
        let s = self.quadrature.rule.points()[quadrature_point];
        let scale = self.coefficient * dot(self.velocity, face.normal);
        (q1_values(face.reference_point(s)), scale, weight * 0.5 * face.length)
    }
}

impl QuadratureIntegrator<f64> for BoundaryFluxIntegrator {
    fn quadrature_weights(&self, _location: usize) -> &[f64] {
        self.quadrature.rule.weights()
    }

    fn assemble_quadrature_vector(
        &self,
        location: usize,
        quadrature_point: usize,
        weight: f64,
        u: DVectorView<f64>,
        mut output: DVectorViewMut<f64>,
    ) -> eyre::Result<()> {
        let (phi, scale, w) = self.evaluate(location, quadrature_point, weight);
        let u_value = interpolate(&phi, &u, 0);
        for a in 0..4 {
            output[a] += w * scale * 0.5 * u_value * u_value * phi[a];
        }
        Ok(())
    }

    fn assemble_quadrature_gradient(
        &self,
        location: usize,
        quadrature_point: usize,
        weight: f64,
        u: DVectorView<f64>,
        mut output: DMatrixViewMut<f64>,
    ) -> eyre::Result<()> {
        let (phi, scale, w) = self.evaluate(location, quadrature_point, weight);
        let u_value = interpolate(&phi, &u, 0);
        for a in 0..4 {
            for b in 0..4 {
                output[(a, b)] += w * scale * u_value * phi[b] * phi[a];
            }
        }
        Ok(())
    }

    fn precompute_capability(&self) -> PrecomputeCapability {
        PrecomputeCapability::polynomial(2)
    }

    fn assemble_quadrature_multilinear(
        &self,
        location: usize,
        quadrature_point: usize,
        weight: f64,
        arguments: &[DVectorView<f64>],
        mut output: DVectorViewMut<f64>,
    ) -> eyre::Result<()> {
        ensure!(arguments.len() == 2, "boundary flux form takes two arguments");
        let (phi, scale, w) = self.evaluate(location, quadrature_point, weight);
        let product = interpolate(&phi, &arguments[0], 0) * interpolate(&phi, &arguments[1], 0);
        for a in 0..4 {
            output[a] += w * scale * 0.5 * product * phi[a];
        }
        Ok(())
    }
}
