use capalloc_capital::{CapitalConfig, CapitalRequirementEngine};
use capalloc_solver::{ClarabelSolver, QpStatus, SolverBackend};
use capalloc_types::{
    CandidateState, CapAllocError, ConstraintId, FailureContext, PortfolioModel, Result,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analyzer::ResultAnalyzer;
use crate::config::{OptimizerConfig, StartPolicy};
use crate::constraints::ConstraintSet;
use crate::input::OptimizationInput;
use crate::objective::ObjectiveEvaluator;
use crate::result::{Diagnostics, OptimizationResult, Termination};
use crate::sqp_builder::{Linearization, SqpBuilder, SqpStep};

const TRUST_BOUNDARY_FRACTION: f64 = 0.99;
const REJECTION_SHRINK: f64 = 0.25;
const PARTIAL_STEP_SHRINK: f64 = 0.5;
const PENALTY_PROGRESS: f64 = 0.9;

/// A candidate state with everything the loop needs to compare it
#[derive(Debug, Clone)]
struct Iterate {
    state: CandidateState,
    values: Vec<f64>,
    profit: f64,
    /// ℓ1 of scaled violations
    violation: f64,
    max_violation: f64,
}

impl Iterate {
    fn merit(&self, penalty: f64) -> f64 {
        -self.profit + penalty * self.violation
    }
}

/// Mutable bookkeeping of one run
#[derive(Debug)]
struct RunState {
    current: Iterate,
    best_feasible: Option<Iterate>,
    least_violation: Iterate,
    item_scales: Vec<f64>,
    trust_radius: f64,
    penalty: f64,
    penalty_cap: f64,
    multipliers: Vec<f64>,
    iterations: usize,
    qp_solves: usize,
    qp_iterations: usize,
    step_norm: f64,
    stationarity: f64,
    qp_status: Option<QpStatus>,
}

/// Trust-region SQP driver.
///
/// States: `Init` (evaluate and vet the baseline), `Evaluating` (one
/// subproblem, line search and trust update per iteration), then one of
/// `Converged`, `Infeasible`, `MaxIterExceeded` or `Cancelled`, and `Done`
/// once the result record is assembled.
pub struct SolverDriver {
    portfolio: PortfolioModel,
    objective: ObjectiveEvaluator,
    constraints: ConstraintSet,
    config: OptimizerConfig,
    backend: Arc<dyn SolverBackend>,
    cancel: Arc<AtomicBool>,
}

impl SolverDriver {
    /// Create a driver with the Clarabel backend
    pub fn new(portfolio: PortfolioModel, capital: CapitalConfig, config: OptimizerConfig) -> Result<Self> {
        config.validate()?;
        capital.validate()?;

        let backend = Arc::new(ClarabelSolver::with_params(
            config.solver.qp_max_iterations,
            config.solver.qp_tolerance,
        ));
        let objective = ObjectiveEvaluator::new(&portfolio);
        let engine = CapitalRequirementEngine::new(&portfolio, capital);
        let constraints = ConstraintSet::new(&portfolio, engine);

        Ok(SolverDriver {
            portfolio,
            objective,
            constraints,
            config,
            backend,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Validate raw input and create a driver
    pub fn from_input(input: &OptimizationInput, config: OptimizerConfig) -> Result<Self> {
        config.validate()?;
        let (portfolio, capital) = input.build(config.balance_tolerance)?;
        Self::new(portfolio, capital, config)
    }

    /// Replace the QP backend
    pub fn with_backend(mut self, backend: Arc<dyn SolverBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Share an external cancel flag
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Flag that stops the run between iterations when set
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn portfolio(&self) -> &PortfolioModel {
        &self.portfolio
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn objective(&self) -> &ObjectiveEvaluator {
        &self.objective
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Run the optimization.
    ///
    /// Infeasible, non-converged and cancelled runs come back as `Ok` with the
    /// matching status; use [`OptimizationResult::into_outcome`] to turn them
    /// into errors.
    pub fn run(&self) -> Result<OptimizationResult> {
        info!(
            items = self.portfolio.len(),
            constraints = self.constraints.len(),
            policy = ?self.config.start_policy,
            "starting capital allocation"
        );

        let mut run = self.initialize()?;
        let termination = loop {
            if let Some(termination) = self.iterate(&mut run)? {
                break termination;
            }
        };
        Ok(self.finish(run, termination))
    }

    fn initialize(&self) -> Result<RunState> {
        let params = &self.config.solver;
        let start = self.evaluate(self.portfolio.baseline())?;
        self.check_repairable(&start, &self.constraints.gradients(&start.state))?;

        if start.max_violation > params.feasibility_tolerance {
            let context = self.failure_context(&start);
            match self.config.start_policy {
                StartPolicy::RequireFeasible => {
                    warn!(violation = start.max_violation, "baseline is infeasible");
                    return Err(CapAllocError::InfeasibleStart(context));
                }
                StartPolicy::Restore => {
                    warn!(
                        violation = start.max_violation,
                        "baseline is infeasible, restoring feasibility"
                    );
                }
            }
        }

        let item_scales: Vec<f64> = self
            .portfolio
            .items()
            .map(|item| {
                let range = item.range();
                let range = if range.is_finite() { range } else { 0.0 };
                range.max(item.baseline_balance.abs()).max(1.0)
            })
            .collect();

        let penalty = match params.initial_penalty {
            Some(mu) => mu,
            None => {
                let weight: f64 = self
                    .objective
                    .gradient()
                    .iter()
                    .zip(item_scales.iter())
                    .map(|(c, s)| c.abs() * s)
                    .sum();
                if weight > 0.0 {
                    10.0 * weight
                } else {
                    1.0
                }
            }
        };

        let best_feasible = (start.max_violation <= params.feasibility_tolerance).then(|| start.clone());
        Ok(RunState {
            least_violation: start.clone(),
            best_feasible,
            current: start,
            item_scales,
            trust_radius: params.initial_trust_radius,
            penalty,
            penalty_cap: penalty * params.max_penalty_factor,
            multipliers: vec![0.0; self.constraints.len()],
            iterations: 0,
            qp_solves: 0,
            qp_iterations: 0,
            step_norm: 0.0,
            stationarity: 0.0,
            qp_status: None,
        })
    }

    /// One `Evaluating` pass. Returns the terminal state once reached.
    fn iterate(&self, run: &mut RunState) -> Result<Option<Termination>> {
        let params = &self.config.solver;

        if self.cancel.load(Ordering::Relaxed) {
            return Ok(Some(Termination::Cancelled));
        }
        if run.iterations >= params.max_iterations {
            return Ok(Some(Termination::MaxIterExceeded));
        }
        run.iterations += 1;

        let gradients = self.constraints.gradients(&run.current.state);
        self.check_repairable(&run.current, &gradients)?;

        let radii: Vec<f64> = run.item_scales.iter().map(|s| run.trust_radius * s).collect();
        let step = self.solve_subproblem(run, &gradients, &radii)?;
        run.qp_status = Some(step.qp_status);

        if !step.qp_status.is_usable() {
            warn!(iteration = run.iterations, status = ?step.qp_status, "subproblem failed");
            return Ok(self.shrink_trust(run, REJECTION_SHRINK));
        }
        run.multipliers = step.multipliers.clone();

        let step_norm = step
            .direction
            .iter()
            .zip(run.item_scales.iter())
            .map(|(d, s)| d.abs() / s)
            .fold(0.0, f64::max);
        let at_boundary = step
            .direction
            .iter()
            .zip(radii.iter())
            .any(|(d, r)| d.abs() >= TRUST_BOUNDARY_FRACTION * r);
        let slack_sum = step.slack_sum();
        let predicted = step.model_gain + run.penalty * (run.current.violation - slack_sum);
        let stationarity = predicted.max(0.0) / (1.0 + run.current.profit.abs());
        run.step_norm = step_norm;
        run.stationarity = stationarity;

        debug!(
            iteration = run.iterations,
            profitability = run.current.profit,
            violation = run.current.max_violation,
            stationarity,
            trust_radius = run.trust_radius,
            step_norm,
            penalty = run.penalty,
            "sqp iteration"
        );

        // A step cut short by the trust region says nothing about stationarity
        let feasible = run.current.max_violation <= params.feasibility_tolerance;
        if feasible
            && !at_boundary
            && (stationarity <= params.optimality_tolerance || step_norm <= params.step_tolerance)
        {
            return Ok(Some(Termination::Converged));
        }

        if !feasible && slack_sum > params.feasibility_tolerance && !at_boundary {
            let no_repair = run.current.violation - slack_sum
                <= params.optimality_tolerance * run.current.violation.max(1.0);
            if step_norm <= params.step_tolerance || no_repair {
                debug!(iteration = run.iterations, slack_sum, "elastic slacks stationary");
                return Ok(self.stalled_infeasible(run));
            }
        }

        match self.line_search(run, &step.direction, predicted)? {
            Some((alpha, trial)) => {
                self.accept(run, trial);
                if alpha >= 1.0 && at_boundary {
                    run.trust_radius = (run.trust_radius * 2.0).min(params.max_trust_radius);
                } else if alpha < 1.0 {
                    return Ok(self.shrink_trust(run, PARTIAL_STEP_SHRINK));
                }
                Ok(None)
            }
            None => Ok(self.shrink_trust(run, REJECTION_SHRINK)),
        }
    }

    /// Solve the elastic subproblem, raising the penalty while that buys feasibility
    fn solve_subproblem(&self, run: &mut RunState, gradients: &[Vec<f64>], radii: &[f64]) -> Result<SqpStep> {
        let params = &self.config.solver;
        let curvature = self.constraints.lagrangian_hessian(&run.multipliers);
        let spread_scale = self.objective.max_abs_spread();
        let proximal: Vec<f64> = radii
            .iter()
            .map(|r| if *r > 0.0 { params.proximal_weight * spread_scale / r } else { 0.0 })
            .collect();
        let lower = self.portfolio.lower_bounds();
        let upper = self.portfolio.upper_bounds();

        let solve = |penalty: f64, counts: &mut (usize, usize)| -> Result<SqpStep> {
            let lin = Linearization {
                balances: run.current.state.balances(),
                spreads: self.objective.gradient(),
                values: &run.current.values,
                gradients,
                constraint_scales: self.constraints.scales(),
                curvature: &curvature,
                lower: &lower,
                upper: &upper,
                radii,
                proximal: &proximal,
                penalty,
            };
            let model = SqpBuilder::build(&lin)?;
            let solution = self.backend.solve_qp(&model)?;
            let step = SqpBuilder::extract(&lin, &model, &solution)?;
            counts.0 += 1;
            counts.1 += step.qp_iterations;
            Ok(step)
        };

        let mut counts = (0, 0);
        let mut step = solve(run.penalty, &mut counts)?;
        let mut penalty = run.penalty;

        while step.qp_status.is_usable()
            && step.slack_sum() > params.feasibility_tolerance
            && penalty * params.penalty_growth <= run.penalty_cap
        {
            let raised = penalty * params.penalty_growth;
            let trial = solve(raised, &mut counts)?;
            if !trial.qp_status.is_usable() || trial.slack_sum() >= PENALTY_PROGRESS * step.slack_sum() {
                break;
            }
            warn!(from = penalty, to = raised, "raising penalty on constraint violation");
            penalty = raised;
            step = trial;
        }

        run.penalty = penalty;
        run.qp_solves += counts.0;
        run.qp_iterations += counts.1;
        Ok(step)
    }

    /// Backtracking search on the ℓ1 merit function
    fn line_search(&self, run: &RunState, direction: &[f64], predicted: f64) -> Result<Option<(f64, Iterate)>> {
        let params = &self.config.solver;
        let current_merit = run.current.merit(run.penalty);
        let mut alpha = 1.0;

        for _ in 0..params.line_search_max_steps {
            let balances: Vec<f64> = self
                .portfolio
                .items()
                .zip(run.current.state.balances().iter())
                .zip(direction.iter())
                .map(|((item, x), d)| (x + alpha * d).clamp(item.lower_bound, item.upper_bound))
                .collect();
            let trial = self.evaluate(CandidateState::new(balances))?;

            let sufficient = trial.merit(run.penalty)
                < current_merit - params.armijo_fraction * alpha * predicted.max(0.0);
            let feasible_gain = trial.max_violation <= params.feasibility_tolerance
                && trial.profit > run.current.profit;
            if sufficient || feasible_gain {
                return Ok(Some((alpha, trial)));
            }
            alpha *= 0.5;
        }
        Ok(None)
    }

    fn accept(&self, run: &mut RunState, trial: Iterate) {
        let tol = self.config.solver.feasibility_tolerance;
        if trial.max_violation <= tol {
            let better = run
                .best_feasible
                .as_ref()
                .map_or(true, |best| trial.profit > best.profit);
            if better {
                run.best_feasible = Some(trial.clone());
            }
        }
        if trial.violation < run.least_violation.violation {
            run.least_violation = trial.clone();
        }
        run.current = trial;
    }

    fn shrink_trust(&self, run: &mut RunState, factor: f64) -> Option<Termination> {
        let params = &self.config.solver;
        run.trust_radius *= factor;
        if run.trust_radius >= params.min_trust_radius {
            return None;
        }
        if run.current.max_violation <= params.feasibility_tolerance {
            Some(Termination::MaxIterExceeded)
        } else {
            self.stalled_infeasible(run)
        }
    }

    /// Stuck off the feasible set.
    ///
    /// `Infeasible` only when no feasible point was ever seen. Otherwise
    /// restart from the best feasible point under a heavier penalty, or stop
    /// as non-converged once the penalty is capped.
    fn stalled_infeasible(&self, run: &mut RunState) -> Option<Termination> {
        let params = &self.config.solver;
        let best = match &run.best_feasible {
            Some(best) => best.clone(),
            None => return Some(Termination::Infeasible),
        };

        let raised = run.penalty * params.penalty_growth;
        if raised > run.penalty_cap {
            warn!(penalty = run.penalty, "stalled off the feasible set with the penalty capped");
            return Some(Termination::MaxIterExceeded);
        }
        warn!(from = run.penalty, to = raised, "stalled off the feasible set, restarting from best feasible point");
        run.penalty = raised;
        run.current = best;
        run.trust_radius = params.initial_trust_radius;
        None
    }

    fn evaluate(&self, state: CandidateState) -> Result<Iterate> {
        let values = self.constraints.evaluate(&state);
        let profit = self.objective.profitability(&state);

        if !state.is_finite() || !profit.is_finite() {
            return Err(CapAllocError::Numerical {
                constraint: ConstraintId::BalanceSheetIdentity,
                detail: format!("non-finite balances or profitability {}", profit),
                context: FailureContext::new(state.balances().to_vec(), self.constraints.slacks(&values)),
            });
        }
        if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
            return Err(CapAllocError::Numerical {
                constraint: self.constraints.ids()[idx],
                detail: format!("constraint value {}", values[idx]),
                context: FailureContext::new(state.balances().to_vec(), self.constraints.slacks(&values)),
            });
        }

        let violation = self.constraints.violation(&values);
        let max_violation = self.constraints.max_violation(&values);
        Ok(Iterate {
            state,
            values,
            profit,
            violation,
            max_violation,
        })
    }

    /// Reject non-finite gradients and violated constraints with no repair direction
    fn check_repairable(&self, iterate: &Iterate, gradients: &[Vec<f64>]) -> Result<()> {
        let tol = self.config.solver.feasibility_tolerance;
        let violations = self.constraints.scaled_violations(&iterate.values);

        for (idx, row) in gradients.iter().enumerate() {
            let id = self.constraints.ids()[idx];
            if row.iter().any(|g| !g.is_finite()) {
                return Err(CapAllocError::Numerical {
                    constraint: id,
                    detail: "non-finite gradient".to_string(),
                    context: self.failure_context(iterate),
                });
            }
            if violations[idx] > tol && row.iter().all(|g| *g == 0.0) {
                return Err(CapAllocError::Numerical {
                    constraint: id,
                    detail: format!("violated by {:.6e} with zero gradient", violations[idx]),
                    context: self.failure_context(iterate),
                });
            }
        }
        Ok(())
    }

    fn failure_context(&self, iterate: &Iterate) -> FailureContext {
        FailureContext::new(
            iterate.state.balances().to_vec(),
            self.constraints.slacks(&iterate.values),
        )
    }

    /// `Done`: pick the reported iterate and assemble the result record
    fn finish(&self, run: RunState, termination: Termination) -> OptimizationResult {
        let RunState {
            current,
            best_feasible,
            least_violation,
            ..
        } = run;

        let chosen = match termination {
            Termination::Converged => match best_feasible {
                Some(best) if best.profit > current.profit => best,
                _ => current,
            },
            Termination::Infeasible => least_violation,
            Termination::MaxIterExceeded | Termination::Cancelled => best_feasible.unwrap_or(least_violation),
        };

        let status = termination.exit_status();
        let analyzer = ResultAnalyzer::new(&self.portfolio, &self.constraints, &self.config.analysis);
        let slacks = analyzer.constraint_slacks(&chosen.state, &run.multipliers);
        let binding_constraints = ResultAnalyzer::binding_constraints(&slacks);
        let marginal_products = analyzer.marginal_products(&chosen.state);
        let line_items = analyzer.line_items(&chosen.state);

        let baseline_profitability = self.objective.profitability(&self.portfolio.baseline());
        let uplift = chosen.profit - baseline_profitability;
        let uplift_pct = if baseline_profitability != 0.0 {
            100.0 * uplift / baseline_profitability.abs()
        } else {
            0.0
        };

        let diagnostics = Diagnostics {
            iterations: run.iterations,
            qp_solves: run.qp_solves,
            qp_iterations: run.qp_iterations,
            termination,
            final_violation: chosen.max_violation,
            final_stationarity: run.stationarity,
            final_step_norm: run.step_norm,
            trust_radius: run.trust_radius,
            penalty: run.penalty,
            qp_status: run
                .qp_status
                .map(|s| format!("{:?}", s))
                .unwrap_or_else(|| "NotRun".to_string()),
        };

        if status.is_success() {
            info!(
                status = %status,
                iterations = diagnostics.iterations,
                profitability = chosen.profit,
                uplift,
                "allocation finished"
            );
        } else {
            warn!(
                status = %status,
                iterations = diagnostics.iterations,
                violation = chosen.max_violation,
                "allocation stopped without a verified optimum"
            );
        }

        OptimizationResult {
            status,
            final_state: chosen.state,
            line_items,
            profitability: chosen.profit,
            baseline_profitability,
            uplift,
            uplift_pct,
            slacks,
            binding_constraints,
            marginal_products,
            diagnostics,
        }
    }
}
