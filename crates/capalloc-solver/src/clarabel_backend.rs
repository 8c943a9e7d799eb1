use capalloc_types::Result;
use clarabel::algebra::CscMatrix;
use clarabel::solver::{DefaultSettings, DefaultSolver, IPSolver, SolverStatus, SupportedConeT};
use nalgebra::DMatrix;

use crate::{QpModel, QpSolution, QpStatus, SolverBackend};

const SPARSITY_THRESHOLD: f64 = 1e-14;

/// Clarabel interior-point QP solver (pure Rust)
#[derive(Debug, Clone)]
pub struct ClarabelSolver {
    verbose: bool,
    max_iter: u32,
    tol_gap_abs: f64,
    tol_gap_rel: f64,
    tol_feas: f64,
}

impl ClarabelSolver {
    pub fn new() -> Self {
        ClarabelSolver {
            verbose: false,
            max_iter: 200,
            tol_gap_abs: 1e-9,
            tol_gap_rel: 1e-9,
            tol_feas: 1e-9,
        }
    }

    /// Solver with custom iteration limit and tolerance
    pub fn with_params(max_iter: u32, tolerance: f64) -> Self {
        ClarabelSolver {
            verbose: false,
            max_iter,
            tol_gap_abs: tolerance,
            tol_gap_rel: tolerance,
            tol_feas: tolerance,
        }
    }

    fn settings(&self) -> DefaultSettings<f64> {
        let mut settings = DefaultSettings::default();
        settings.verbose = self.verbose;
        settings.max_iter = self.max_iter;
        settings.tol_gap_abs = self.tol_gap_abs;
        settings.tol_gap_rel = self.tol_gap_rel;
        settings.tol_feas = self.tol_feas;
        settings
    }
}

impl Default for ClarabelSolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Where each model row landed in the conic form
#[derive(Debug, Clone, Copy, Default)]
struct RowSlots {
    eq: Option<usize>,
    lower: Option<usize>,
    upper: Option<usize>,
}

impl SolverBackend for ClarabelSolver {
    fn solve_qp(&self, model: &QpModel) -> Result<QpSolution> {
        model.validate()?;

        let m = model.num_constraints();
        let n = model.num_vars();

        // Clarabel form: A x + s = b, s in K.
        //   l == u : a x + s = u, s in {0}
        //   lower  : -a x + s = -l, s >= 0
        //   upper  :  a x + s = u, s >= 0
        // Equality rows go first so the zero cone is one block.
        let mut ext_rows: Vec<(usize, f64)> = Vec::with_capacity(2 * m);
        let mut b = Vec::with_capacity(2 * m);
        let mut slots = vec![RowSlots::default(); m];

        for (i, slot) in slots.iter_mut().enumerate() {
            if model.is_equality_row(i) {
                slot.eq = Some(ext_rows.len());
                ext_rows.push((i, 1.0));
                b.push(model.u[i]);
            }
        }
        let num_eq = ext_rows.len();

        for (i, slot) in slots.iter_mut().enumerate() {
            if model.is_equality_row(i) {
                continue;
            }
            if model.l[i].is_finite() {
                slot.lower = Some(ext_rows.len());
                ext_rows.push((i, -1.0));
                b.push(-model.l[i]);
            }
            if model.u[i].is_finite() {
                slot.upper = Some(ext_rows.len());
                ext_rows.push((i, 1.0));
                b.push(model.u[i]);
            }
        }
        let num_ineq = ext_rows.len() - num_eq;

        let mut cones = Vec::with_capacity(2);
        if num_eq > 0 {
            cones.push(SupportedConeT::ZeroConeT(num_eq));
        }
        if num_ineq > 0 {
            cones.push(SupportedConeT::NonnegativeConeT(num_ineq));
        }

        let mut a_ext = DMatrix::zeros(ext_rows.len(), n);
        for (r, (i, sign)) in ext_rows.iter().enumerate() {
            for j in 0..n {
                a_ext[(r, j)] = sign * model.a[(*i, j)];
            }
        }

        let p_csc = to_clarabel_csc_upper(&model.p);
        let a_csc = to_clarabel_csc(&a_ext);

        let mut solver = DefaultSolver::new(
            &p_csc,
            model.q.as_slice(),
            &a_csc,
            &b,
            &cones,
            self.settings(),
        );
        solver.solve();

        let status = match solver.solution.status {
            SolverStatus::Solved => QpStatus::Optimal,
            SolverStatus::AlmostSolved => QpStatus::AlmostOptimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                QpStatus::PrimalInfeasible
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                QpStatus::DualInfeasible
            }
            SolverStatus::MaxIterations => QpStatus::MaxIterations,
            SolverStatus::NumericalError | SolverStatus::InsufficientProgress => {
                QpStatus::NumericalError
            }
            _ => QpStatus::Unsolved,
        };

        // Fold conic duals back to one signed multiplier per model row
        let z = &solver.solution.z;
        let dual = |slot: Option<usize>| slot.and_then(|r| z.get(r).copied()).unwrap_or(0.0);
        let y: Vec<f64> = slots
            .iter()
            .map(|s| dual(s.lower) - dual(s.upper) - dual(s.eq))
            .collect();

        let x = clamp_to_boxes(model, solver.solution.x.clone());

        Ok(QpSolution {
            x,
            y,
            objective: solver.solution.obj_val,
            status,
            iterations: solver.info.iterations as usize,
        })
    }
}

/// Clamp variables constrained by single-entry rows to their box,
/// absorbing interior-point round-off.
fn clamp_to_boxes(model: &QpModel, mut x: Vec<f64>) -> Vec<f64> {
    for i in 0..model.num_constraints() {
        let row = model.a.row(i);
        let mut nonzeros = row
            .iter()
            .enumerate()
            .filter(|(_, v)| v.abs() > SPARSITY_THRESHOLD);
        let (var, coeff) = match (nonzeros.next(), nonzeros.next()) {
            (Some((var, coeff)), None) => (var, *coeff),
            _ => continue,
        };

        let (lo, hi) = if coeff > 0.0 {
            (model.l[i] / coeff, model.u[i] / coeff)
        } else {
            (model.u[i] / coeff, model.l[i] / coeff)
        };
        if lo.is_finite() {
            x[var] = x[var].max(lo);
        }
        if hi.is_finite() {
            x[var] = x[var].min(hi);
        }
    }
    x
}

/// Convert DMatrix to Clarabel CSC format (upper triangle only for P)
fn to_clarabel_csc_upper(mat: &DMatrix<f64>) -> CscMatrix<f64> {
    let mut colptr = vec![0];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for col in 0..mat.ncols() {
        for row in 0..=col {
            let val = mat[(row, col)];
            if val.abs() > SPARSITY_THRESHOLD {
                rowval.push(row);
                nzval.push(val);
            }
        }
        colptr.push(nzval.len());
    }

    CscMatrix {
        m: mat.nrows(),
        n: mat.ncols(),
        colptr,
        rowval,
        nzval,
    }
}

/// Convert DMatrix to Clarabel CSC format (full matrix)
fn to_clarabel_csc(mat: &DMatrix<f64>) -> CscMatrix<f64> {
    let mut colptr = vec![0];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for col in 0..mat.ncols() {
        for row in 0..mat.nrows() {
            let val = mat[(row, col)];
            if val.abs() > SPARSITY_THRESHOLD {
                rowval.push(row);
                nzval.push(val);
            }
        }
        colptr.push(nzval.len());
    }

    CscMatrix {
        m: mat.nrows(),
        n: mat.ncols(),
        colptr,
        rowval,
        nzval,
    }
}
