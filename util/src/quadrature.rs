use nalgebra::DMatrix;

/// A Gauss-Legendre rule on the reference interval $[-1, 1]$.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussRule {
    points: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussRule {
    /// Computes the `n`-point rule, exact for polynomials of degree $2n - 1$.
    ///
    /// The points are the eigenvalues of the Jacobi matrix of the Legendre recurrence and the
    /// weights follow from the first components of its eigenvectors (Golub-Welsch).
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "Gauss rule needs at least one point.");
        let mut jacobi = DMatrix::zeros(n, n);
        for k in 1..n {
            let k_f = k as f64;
            let beta = k_f / (4.0 * k_f * k_f - 1.0).sqrt();
            jacobi[(k - 1, k)] = beta;
            jacobi[(k, k - 1)] = beta;
        }

        let eigen = jacobi.symmetric_eigen();
        let mut pairs: Vec<(f64, f64)> = (0..n)
            .map(|i| {
                let v0 = eigen.eigenvectors[(0, i)];
                (eigen.eigenvalues[i], 2.0 * v0 * v0)
            })
            .collect();
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

        Self {
            points: pairs.iter().map(|p| p.0).collect(),
            weights: pairs.iter().map(|p| p.1).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Weights of the tensor product rule on $[-1, 1]^2$, point `i + n * j` at `(points[i], points[j])`.
    pub fn tensor_weights(&self) -> Vec<f64> {
        let n = self.len();
        (0..n * n)
            .map(|q| self.weights[q % n] * self.weights[q / n])
            .collect()
    }

    /// The reference coordinates of point `q` of the tensor product rule.
    pub fn tensor_point(&self, q: usize) -> [f64; 2] {
        let n = self.len();
        [self.points[q % n], self.points[q / n]]
    }
}
