use capalloc_solver::{QpConstraint, QpModel, QpSolution, QpStatus, VarMeta};
use capalloc_types::{CapAllocError, Result};
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;

/// Coefficients of one SQP subproblem, linearized at the current iterate
#[derive(Debug)]
pub struct Linearization<'a> {
    pub balances: &'a [f64],
    /// Gradient of profitability
    pub spreads: &'a [f64],
    /// Constraint values, identity first
    pub values: &'a [f64],
    pub gradients: &'a [Vec<f64>],
    pub constraint_scales: &'a [f64],
    /// Lagrangian Hessian before the PSD projection
    pub curvature: &'a DMatrix<f64>,
    pub lower: &'a [f64],
    pub upper: &'a [f64],
    /// Trust radius per line item, in balance units
    pub radii: &'a [f64],
    /// Proximal weight per line item
    pub proximal: &'a [f64],
    /// Exact-penalty weight on the elastic slacks
    pub penalty: f64,
}

/// Solution of one subproblem in the terms of the outer loop
#[derive(Debug, Clone)]
pub struct SqpStep {
    pub direction: Vec<f64>,
    /// Elastic slack per constraint, in scaled units
    pub slacks: Vec<f64>,
    /// Multiplier per constraint in profit per unit of the constraint's own measure
    pub multipliers: Vec<f64>,
    /// `c·d - 0.5 dᵀHd`
    pub model_gain: f64,
    pub qp_status: QpStatus,
    pub qp_iterations: usize,
}

impl SqpStep {
    pub fn slack_sum(&self) -> f64 {
        self.slacks.iter().sum()
    }
}

/// Builder for SQP subproblems
///
/// Variables are `[d (n), s+ , s-, s_1 .. s_K]`:
/// ```text
/// min  -cᵀd + 0.5 dᵀHd + μ (s+ + s- + Σ s_k)
/// s.t. (e   + ∇eᵀd) / scale_0 + s+ - s- = 0
///      (g_k + ∇g_kᵀd) / scale_k + s_k   >= 0
///      max(l - x, -r) <= d <= min(u - x, r),  s >= 0
/// ```
pub struct SqpBuilder;

impl SqpBuilder {
    pub fn build(lin: &Linearization<'_>) -> Result<QpModel> {
        let n = lin.balances.len();
        let m = lin.values.len();
        if m == 0 || lin.gradients.len() != m || lin.constraint_scales.len() != m {
            return Err(CapAllocError::Solver(format!(
                "constraint data mismatch: {} values, {} gradients, {} scales",
                m,
                lin.gradients.len(),
                lin.constraint_scales.len()
            )));
        }
        let k = m - 1;
        let n_vars = n + 2 + k;
        let slack_plus = n;
        let slack_minus = n + 1;
        let ineq_slack = |idx: usize| n + 1 + idx;

        let mut p = DMatrix::zeros(n_vars, n_vars);
        let hess = Self::convexify(lin.curvature);
        for i in 0..n {
            for j in 0..n {
                p[(i, j)] = hess[(i, j)];
            }
            p[(i, i)] += lin.proximal[i];
        }

        let mut q = vec![lin.penalty; n_vars];
        for (qi, ci) in q.iter_mut().zip(lin.spreads.iter()) {
            *qi = -ci;
        }

        let mut rows = Vec::with_capacity(m + n + 2 + k);

        let mut identity = Self::scaled_row(&lin.gradients[0], lin.constraint_scales[0]);
        identity.insert(slack_plus, 1.0);
        identity.insert(slack_minus, -1.0);
        rows.push(QpConstraint::eq(identity, -lin.values[0] / lin.constraint_scales[0]));

        for idx in 1..m {
            let mut row = Self::scaled_row(&lin.gradients[idx], lin.constraint_scales[idx]);
            row.insert(ineq_slack(idx), 1.0);
            rows.push(QpConstraint::ineq(
                row,
                -lin.values[idx] / lin.constraint_scales[idx],
                f64::INFINITY,
            ));
        }

        for i in 0..n {
            let lo = (lin.lower[i] - lin.balances[i]).max(-lin.radii[i]).min(0.0);
            let hi = (lin.upper[i] - lin.balances[i]).min(lin.radii[i]).max(0.0);
            rows.push(QpConstraint::bound(i, lo, hi));
        }
        for s in n..n_vars {
            rows.push(QpConstraint::bound(s, 0.0, f64::INFINITY));
        }

        let mut var_meta: Vec<VarMeta> = (0..n).map(VarMeta::Step).collect();
        var_meta.push(VarMeta::Elastic { row: 0 });
        var_meta.push(VarMeta::Elastic { row: 0 });
        var_meta.extend((1..m).map(|row| VarMeta::Elastic { row }));

        QpModel::from_rows(p, DVector::from_vec(q), &rows, var_meta)
    }

    /// Map a QP solution back to a step, slacks and multipliers
    pub fn extract(lin: &Linearization<'_>, model: &QpModel, solution: &QpSolution) -> Result<SqpStep> {
        let n = lin.balances.len();
        let m = lin.values.len();
        if solution.x.len() != n + m + 1 || solution.y.len() < m {
            return Err(CapAllocError::Solver(format!(
                "solution has {} primals and {} duals, expected {} and at least {}",
                solution.x.len(),
                solution.y.len(),
                n + m + 1,
                m
            )));
        }

        let direction = solution.x[..n].to_vec();
        let mut slacks = Vec::with_capacity(m);
        slacks.push(solution.x[n].max(0.0) + solution.x[n + 1].max(0.0));
        slacks.extend(solution.x[n + 2..].iter().map(|s| s.max(0.0)));

        let multipliers = solution.y[..m]
            .iter()
            .zip(lin.constraint_scales.iter())
            .map(|(y, scale)| y / scale)
            .collect();

        let d = DVector::from_column_slice(&direction);
        let h = model.p.view((0, 0), (n, n));
        let model_gain = d.dot(&DVector::from_column_slice(lin.spreads)) - 0.5 * d.dot(&(h * &d));

        Ok(SqpStep {
            direction,
            slacks,
            multipliers,
            model_gain,
            qp_status: solution.status,
            qp_iterations: solution.iterations,
        })
    }

    /// Positive semi-definite part of a symmetric matrix
    pub fn convexify(hess: &DMatrix<f64>) -> DMatrix<f64> {
        if hess.iter().all(|v| *v == 0.0) {
            return hess.clone();
        }
        let sym = 0.5 * (hess + hess.transpose());
        let mut eig = sym.symmetric_eigen();
        for v in eig.eigenvalues.iter_mut() {
            *v = v.max(0.0);
        }
        let projected = eig.recompose();
        0.5 * (&projected + projected.transpose())
    }

    fn scaled_row(gradient: &[f64], scale: f64) -> BTreeMap<usize, f64> {
        gradient
            .iter()
            .enumerate()
            .filter(|(_, g)| **g != 0.0)
            .map(|(j, g)| (j, g / scale))
            .collect()
    }
}
