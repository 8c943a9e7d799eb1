use capalloc_types::{CapAllocError, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Variable metadata for tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarMeta {
    /// Change in the balance of line item `i`
    Step(usize),
    /// Elastic slack softening constraint row `row`
    Elastic { row: usize },
    /// Plain decision variable with no further meaning to the model
    Free(usize),
}

/// QP model in standard form:
/// minimize 0.5 * x^T P x + q^T x
/// subject to l <= A x <= u
#[derive(Debug, Clone)]
pub struct QpModel {
    /// Hessian matrix P (must be PSD)
    pub p: DMatrix<f64>,
    /// Linear term q
    pub q: DVector<f64>,
    /// Constraint matrix A
    pub a: DMatrix<f64>,
    /// Lower bounds l (may be -inf)
    pub l: DVector<f64>,
    /// Upper bounds u (may be +inf)
    pub u: DVector<f64>,
    /// Variable metadata
    pub var_meta: Vec<VarMeta>,
}

impl QpModel {
    pub fn new(
        p: DMatrix<f64>,
        q: DVector<f64>,
        a: DMatrix<f64>,
        l: DVector<f64>,
        u: DVector<f64>,
        var_meta: Vec<VarMeta>,
    ) -> Self {
        QpModel { p, q, a, l, u, var_meta }
    }

    /// Assemble a model from sparse constraint rows
    pub fn from_rows(
        p: DMatrix<f64>,
        q: DVector<f64>,
        rows: &[QpConstraint],
        var_meta: Vec<VarMeta>,
    ) -> Result<Self> {
        let n = q.len();
        let mut a = DMatrix::zeros(rows.len(), n);
        for (r, row) in rows.iter().enumerate() {
            for (&j, &coeff) in &row.coeffs {
                if j >= n {
                    return Err(CapAllocError::Solver(format!(
                        "row {} references variable {} of {}",
                        r, j, n
                    )));
                }
                a[(r, j)] = coeff;
            }
        }
        let l = DVector::from_iterator(rows.len(), rows.iter().map(|r| r.lower));
        let u = DVector::from_iterator(rows.len(), rows.iter().map(|r| r.upper));

        let model = QpModel::new(p, q, a, l, u, var_meta);
        model.validate()?;
        Ok(model)
    }

    pub fn num_vars(&self) -> usize {
        self.q.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.l.len()
    }

    /// Whether row `i` pins its value (l == u)
    pub fn is_equality_row(&self, i: usize) -> bool {
        self.l[i].is_finite() && self.l[i] == self.u[i]
    }

    /// Objective 0.5 x'Px + q'x at `x`
    pub fn objective(&self, x: &[f64]) -> f64 {
        let x = DVector::from_column_slice(x);
        0.5 * x.dot(&(&self.p * &x)) + self.q.dot(&x)
    }

    /// Validate model dimensions and data
    pub fn validate(&self) -> Result<()> {
        let n = self.num_vars();
        let m = self.num_constraints();

        if self.p.nrows() != n || self.p.ncols() != n {
            return Err(CapAllocError::Solver(format!(
                "P must be {}x{}, got {}x{}",
                n,
                n,
                self.p.nrows(),
                self.p.ncols()
            )));
        }

        if self.a.nrows() != m || self.a.ncols() != n || self.u.len() != m {
            return Err(CapAllocError::Solver(format!(
                "A must be {}x{} with {} upper bounds, got {}x{} and {}",
                m,
                n,
                m,
                self.a.nrows(),
                self.a.ncols(),
                self.u.len()
            )));
        }

        if self.var_meta.len() != n {
            return Err(CapAllocError::Solver(format!(
                "var_meta length {} != num_vars {}",
                self.var_meta.len(),
                n
            )));
        }

        if self.p.iter().chain(self.q.iter()).chain(self.a.iter()).any(|v| !v.is_finite()) {
            return Err(CapAllocError::Solver("non-finite QP coefficient".to_string()));
        }

        for i in 0..m {
            if self.l[i].is_nan() || self.u[i].is_nan() || self.l[i] > self.u[i] {
                return Err(CapAllocError::Solver(format!(
                    "row {} has invalid bounds [{}, {}]",
                    i, self.l[i], self.u[i]
                )));
            }
        }

        Ok(())
    }
}

/// Constraint in QP (for builder pattern)
#[derive(Debug, Clone)]
pub struct QpConstraint {
    pub coeffs: BTreeMap<usize, f64>, // var_index -> coefficient
    pub lower: f64,
    pub upper: f64,
}

impl QpConstraint {
    /// sum(coeffs[i] * x[i]) = value
    pub fn eq(coeffs: BTreeMap<usize, f64>, value: f64) -> Self {
        QpConstraint {
            coeffs,
            lower: value,
            upper: value,
        }
    }

    /// lower <= sum(coeffs[i] * x[i]) <= upper
    pub fn ineq(coeffs: BTreeMap<usize, f64>, lower: f64, upper: f64) -> Self {
        QpConstraint { coeffs, lower, upper }
    }

    /// lower <= x[var] <= upper
    pub fn bound(var: usize, lower: f64, upper: f64) -> Self {
        QpConstraint::ineq(BTreeMap::from([(var, 1.0)]), lower, upper)
    }
}
