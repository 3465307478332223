//! Reduction of polynomial matrix programs to semidefinite form.
//!
//! A polynomial matrix program asks for free variables y maximizing
//! b·y subject to matrix-polynomial positivity constraints
//! `M_j,0(x) + Σ_n y_n·M_j,n(x) ⪰ 0`. Sampling each constraint at
//! degree+1 points and attaching bilinear bases turns it into the
//! semidefinite form consumed by the iteration: the positivity of a
//! sampled polynomial is certified through congruences with the
//! sampled bases.

use rug::ops::NegAssign;
use rug::Assign;

use crate::error::{Error, Result};
use crate::linalg::Matrix;
use crate::problem::Sdp;
use crate::real::{self, real, zero, Real};

/// Single-variable polynomial as a coefficient vector `[c₀ … c_d]`.
/// Trailing zero coefficients are allowed and semantically ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    pub coeffs: Vec<Real>,
}

impl Polynomial {
    /// The zero polynomial.
    pub fn new() -> Self {
        Polynomial { coeffs: vec![zero()] }
    }

    pub fn from_coeffs(coeffs: Vec<Real>) -> Self {
        assert!(!coeffs.is_empty());
        Polynomial { coeffs }
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    /// Horner evaluation at `x`.
    pub fn eval(&self, x: &Real) -> Real {
        let deg = self.degree();
        let mut y = self.coeffs[deg].clone();
        for i in (0..deg).rev() {
            y *= x;
            y += &self.coeffs[i];
        }
        y
    }
}

impl Default for Polynomial {
    fn default() -> Self {
        Polynomial::new()
    }
}

/// A rows × cols matrix whose entries are equal-length vectors of
/// polynomials, stored column-major. Entry vectors have length
/// 1 + (number of free variables); component 0 is the constant part.
#[derive(Debug, Clone)]
pub struct PolynomialVectorMatrix {
    pub rows: usize,
    pub cols: usize,
    pub elements: Vec<Vec<Polynomial>>,
}

impl PolynomialVectorMatrix {
    pub fn elt(&self, r: usize, c: usize) -> &Vec<Polynomial> {
        &self.elements[r + c * self.rows]
    }

    /// Largest degree appearing in any entry.
    pub fn degree(&self) -> usize {
        let mut d = 0;
        for e in &self.elements {
            for p in e {
                d = d.max(p.degree());
            }
        }
        d
    }

    pub fn validate(&self) -> Result<()> {
        if self.rows != self.cols {
            return Err(Error::InvalidProblem(format!(
                "polynomial vector matrix is {}×{}, must be square",
                self.rows, self.cols
            )));
        }
        if self.elements.len() != self.rows * self.cols {
            return Err(Error::InvalidProblem(format!(
                "polynomial vector matrix has {} entries, expected {}",
                self.elements.len(),
                self.rows * self.cols
            )));
        }
        let len = self
            .elements
            .first()
            .map(|v| v.len())
            .ok_or_else(|| Error::InvalidProblem("empty polynomial vector matrix".into()))?;
        if len == 0 {
            return Err(Error::InvalidProblem("empty polynomial vectors".into()));
        }
        for v in &self.elements {
            if v.len() != len {
                return Err(Error::InvalidProblem(format!(
                    "polynomial vectors have mixed lengths {} and {}",
                    len,
                    v.len()
                )));
            }
        }
        Ok(())
    }
}

/// One sampled positivity constraint group, ready for assembly.
#[derive(Debug, Clone)]
pub struct DualConstraintGroup {
    pub dim: usize,
    pub degree: usize,

    /// Coupling to the free variables; rows = constraints of this
    /// group, cols = number of free variables.
    pub constraint_matrix: Matrix,

    /// Constant terms of the sampled constraints.
    pub constraint_constants: Vec<Real>,

    /// One or two sampled bilinear bases (plain and half-shifted).
    pub bilinear_bases: Vec<Matrix>,
}

/// The monomial basis 1, x, …, x^degree.
pub fn monomial_basis(degree: usize) -> Vec<Polynomial> {
    (0..=degree)
        .map(|n| {
            let mut coeffs = vec![zero(); n + 1];
            coeffs[n] = real::one();
            Polynomial::from_coeffs(coeffs)
        })
        .collect()
}

/// Evaluate basis polynomials 0..=max_degree at the sample points,
/// scaled by the square roots of the sample scalings:
/// result (n, k) = √scaling_k · q_n(x_k).
pub fn sample_bilinear_basis(
    max_degree: usize,
    num_samples: usize,
    basis: &[Polynomial],
    sample_points: &[Real],
    sample_scalings: &[Real],
) -> Matrix {
    assert!(basis.len() > max_degree);
    assert!(sample_points.len() >= num_samples);
    assert!(sample_scalings.len() >= num_samples);

    let mut result = Matrix::new(max_degree + 1, num_samples);
    for k in 0..num_samples {
        let scale = real(sample_scalings[k].sqrt_ref());
        for n in 0..=max_degree {
            let mut v = basis[n].eval(&sample_points[k]);
            v *= &scale;
            result[(n, k)] = v;
        }
    }
    result
}

/// Sample a polynomial vector matrix into a constraint group.
///
/// The group carries (degree+1)·dim·(dim+1)/2 scalar constraints; each
/// reads `scaling_k·v_0(x_k) + Σ_n y_n·scaling_k·v_n(x_k) ⪰ …` so the
/// constant parts land in `constraint_constants` and the free-variable
/// couplings, negated, in `constraint_matrix`.
pub fn sample_polynomial_vector_matrix(
    m: &PolynomialVectorMatrix,
    bilinear_basis: &[Polynomial],
    sample_points: &[Real],
    sample_scalings: &[Real],
) -> Result<DualConstraintGroup> {
    m.validate()?;

    let dim = m.cols;
    let degree = m.degree();
    let num_samples = degree + 1;
    if sample_points.len() < num_samples || sample_scalings.len() < num_samples {
        return Err(Error::InvalidProblem(format!(
            "degree {} needs {} sample points, got {} points and {} scalings",
            degree,
            num_samples,
            sample_points.len(),
            sample_scalings.len()
        )));
    }
    let vector_dim = m.elt(0, 0).len();
    if vector_dim < 1 {
        return Err(Error::InvalidProblem("empty polynomial vectors".into()));
    }
    let delta1 = degree / 2;
    if bilinear_basis.len() <= delta1 {
        return Err(Error::InvalidProblem(format!(
            "bilinear basis has {} polynomials, degree {} needs {}",
            bilinear_basis.len(),
            degree,
            delta1 + 1
        )));
    }

    let num_constraints = num_samples * dim * (dim + 1) / 2;
    let mut constraint_matrix = Matrix::new(num_constraints, vector_dim - 1);
    let mut constraint_constants = Vec::with_capacity(num_constraints);

    let mut p = 0;
    for s in 0..dim {
        for r in 0..=s {
            for k in 0..num_samples {
                let x = &sample_points[k];
                let scale = &sample_scalings[k];
                let v = m.elt(r, s);

                let mut constant = v[0].eval(x);
                constant *= scale;
                constraint_constants.push(constant);

                for n in 1..vector_dim {
                    let mut entry = v[n].eval(x);
                    entry *= scale;
                    entry.neg_assign();
                    constraint_matrix[(p, n - 1)] = entry;
                }
                p += 1;
            }
        }
    }
    assert_eq!(p, num_constraints);

    // Positivity on x ≥ 0 is certified by q(x)·q(x) terms together
    // with x·q(x)·q(x) terms, hence the plain basis and the
    // half-shifted one scaled by √x_k.
    let mut bases = Vec::new();
    bases.push(sample_bilinear_basis(
        delta1,
        num_samples,
        bilinear_basis,
        sample_points,
        sample_scalings,
    ));
    if degree >= 1 {
        let delta2 = (degree - 1) / 2;
        let mut shifted_scalings = Vec::with_capacity(num_samples);
        for k in 0..num_samples {
            let mut s = sample_points[k].clone();
            s *= &sample_scalings[k];
            shifted_scalings.push(s);
        }
        bases.push(sample_bilinear_basis(
            delta2,
            num_samples,
            bilinear_basis,
            sample_points,
            &shifted_scalings,
        ));
    }

    Ok(DualConstraintGroup {
        dim,
        degree,
        constraint_matrix,
        constraint_constants,
        bilinear_bases: bases,
    })
}

/// Collect constraint groups and a free-variable objective into an
/// assembled, validated problem.
pub fn sdp_from_dual_constraint_groups(
    dual_objective_b: Vec<Real>,
    objective_const: Real,
    groups: &[DualConstraintGroup],
) -> Result<Sdp> {
    let dual_dimension = dual_objective_b.len();

    let mut sdp = Sdp {
        bilinear_bases: Vec::new(),
        free_var_matrix: Matrix::new(0, 0),
        primal_objective_c: Vec::new(),
        dual_objective_b,
        objective_const,
        dimensions: Vec::new(),
        degrees: Vec::new(),
        blocks: Vec::new(),
        constraint_indices: Vec::new(),
    };

    for g in groups {
        sdp.dimensions.push(g.dim);
        sdp.degrees.push(g.degree);
        sdp.primal_objective_c
            .extend(g.constraint_constants.iter().cloned());
    }

    sdp.free_var_matrix = Matrix::new(sdp.primal_objective_c.len(), dual_dimension);

    let mut p = 0;
    for g in groups {
        let mut blocks = Vec::new();
        for basis in &g.bilinear_bases {
            if basis.cols != g.degree + 1 {
                return Err(Error::InvalidProblem(format!(
                    "bilinear basis sampled {} times, group of degree {} needs {}",
                    basis.cols,
                    g.degree,
                    g.degree + 1
                )));
            }
            blocks.push(sdp.bilinear_bases.len());
            sdp.bilinear_bases.push(basis.clone());
        }
        sdp.blocks.push(blocks);

        if g.constraint_matrix.cols != dual_dimension {
            return Err(Error::InvalidProblem(format!(
                "constraint matrix has {} free-variable columns, objective has {}",
                g.constraint_matrix.cols, dual_dimension
            )));
        }
        for k in 0..g.constraint_matrix.rows {
            for n in 0..dual_dimension {
                sdp.free_var_matrix[(p, n)].assign(&g.constraint_matrix[(k, n)]);
            }
            p += 1;
        }
    }
    assert_eq!(p, sdp.primal_objective_c.len());

    sdp.initialize_constraint_indices();
    sdp.validate()?;
    Ok(sdp)
}

/// Full reduction: sample every polynomial vector matrix and assemble.
/// Component 0 of `affine_objective` is the objective constant, the
/// rest are the free-variable coefficients b.
pub fn bootstrap_polynomial_sdp(
    affine_objective: &[Real],
    matrices: &[PolynomialVectorMatrix],
    bilinear_basis: &[Polynomial],
    sample_points: &[Real],
    sample_scalings: &[Real],
) -> Result<Sdp> {
    if affine_objective.is_empty() {
        return Err(Error::InvalidProblem("empty affine objective".into()));
    }
    let objective_const = affine_objective[0].clone();
    let dual_objective_b: Vec<Real> = affine_objective[1..].to_vec();

    let mut groups = Vec::with_capacity(matrices.len());
    for m in matrices {
        groups.push(sample_polynomial_vector_matrix(
            m,
            bilinear_basis,
            sample_points,
            sample_scalings,
        )?);
    }
    sdp_from_dual_constraint_groups(dual_objective_b, objective_const, &groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::real::one;

    fn poly(coeffs: &[f64]) -> Polynomial {
        Polynomial::from_coeffs(coeffs.iter().map(|&c| real(c)).collect())
    }

    #[test]
    fn test_polynomial_eval() {
        // 1 + 2x + 3x² at x = 2 is 17
        let p = poly(&[1.0, 2.0, 3.0]);
        assert_eq!(p.eval(&real(2)), 17);
        assert_eq!(p.degree(), 2);
        assert_eq!(Polynomial::new().eval(&real(5)), 0);
    }

    #[test]
    fn test_monomial_basis() {
        let basis = monomial_basis(3);
        assert_eq!(basis.len(), 4);
        let x = real(3);
        assert_eq!(basis[0].eval(&x), 1);
        assert_eq!(basis[1].eval(&x), 3);
        assert_eq!(basis[3].eval(&x), 27);
    }

    #[test]
    fn test_sample_bilinear_basis() {
        let basis = monomial_basis(2);
        let points = vec![real(1), real(4)];
        let scalings = vec![one(), real(4)];
        let m = sample_bilinear_basis(1, 2, &basis, &points, &scalings);
        assert_eq!(m.rows, 2);
        assert_eq!(m.cols, 2);
        // column k holds √scaling_k · x_k^n
        assert_eq!(m[(0, 0)], 1);
        assert_eq!(m[(1, 0)], 1);
        assert_eq!(m[(0, 1)], 2);
        assert_eq!(m[(1, 1)], 8);
    }

    #[test]
    fn test_sample_polynomial_vector_matrix() {
        // 1×1 matrix with vector (1 + x, x): constraint 1 + x + y·x ≥ 0.
        let m = PolynomialVectorMatrix {
            rows: 1,
            cols: 1,
            elements: vec![vec![poly(&[1.0, 1.0]), poly(&[0.0, 1.0])]],
        };
        let basis = monomial_basis(2);
        let points = vec![real(1), real(2)];
        let scalings = vec![one(), one()];

        let g = sample_polynomial_vector_matrix(&m, &basis, &points, &scalings).unwrap();
        assert_eq!(g.dim, 1);
        assert_eq!(g.degree, 1);
        assert_eq!(g.constraint_constants.len(), 2);
        assert_eq!(g.constraint_constants[0], 2);
        assert_eq!(g.constraint_constants[1], 3);
        // couplings are negated samples of the y components
        assert_eq!(g.constraint_matrix[(0, 0)], -1);
        assert_eq!(g.constraint_matrix[(1, 0)], -2);
        // degree 1: plain basis (δ₁ = 0) and half-shifted basis (δ₂ = 0)
        assert_eq!(g.bilinear_bases.len(), 2);
        assert_eq!(g.bilinear_bases[0].rows, 1);
        assert_eq!(g.bilinear_bases[0].cols, 2);
        // the shifted basis carries the √x_k factor
        let mut sqrt2 = real(2);
        sqrt2.sqrt_mut();
        let mut diff = g.bilinear_bases[1][(0, 1)].clone();
        diff -= &sqrt2;
        assert!(diff.abs() < real(1e-70));
    }

    #[test]
    fn test_bootstrap_assembly() {
        let m = PolynomialVectorMatrix {
            rows: 1,
            cols: 1,
            elements: vec![vec![poly(&[1.0]), poly(&[0.0, 1.0]), poly(&[1.0, 0.0, 1.0])]],
        };
        let basis = monomial_basis(2);
        let points = vec![real(1), real(2), real(3)];
        let scalings = vec![one(), one(), one()];
        let objective = vec![real(0), real(1), real(-1)];

        let sdp = bootstrap_polynomial_sdp(&objective, &[m], &basis, &points, &scalings).unwrap();
        assert_eq!(sdp.dual_dimension(), 2);
        assert_eq!(sdp.num_constraints(), 3);
        assert_eq!(sdp.dimensions, vec![1]);
        assert_eq!(sdp.degrees, vec![2]);
        assert_eq!(sdp.blocks, vec![vec![0, 1]]);
        // δ₁ = 1, δ₂ = 0 for degree 2
        assert_eq!(sdp.bilinear_bases[0].rows, 2);
        assert_eq!(sdp.bilinear_bases[1].rows, 1);
        sdp.validate().unwrap();
    }

    #[test]
    fn test_rejects_nonsquare() {
        let m = PolynomialVectorMatrix {
            rows: 1,
            cols: 2,
            elements: vec![vec![poly(&[1.0])], vec![poly(&[1.0])]],
        };
        let basis = monomial_basis(1);
        let points = vec![real(1)];
        let scalings = vec![one()];
        assert!(sample_polynomial_vector_matrix(&m, &basis, &points, &scalings).is_err());
    }
}
