// Comprehensive integration tests for the optimizer

#[cfg(test)]
mod tests {
    use crate::*;
    use capalloc_capital::{
        CapitalConfig, CapitalRequirementEngine, CapitalTierRequirement, GsibConfig, TierCapital,
    };
    use capalloc_types::{
        CandidateState, CapAllocError, CapitalTier, ConstraintId, ExitStatus, LineItem, PortfolioModel,
        RequirementBasis, RwaFramework,
    };
    use capalloc_solver::{ClarabelSolver, QpModel, QpSolution, SolverBackend};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Returns the opposite of every subproblem step
    struct ReversedSteps(ClarabelSolver);

    impl SolverBackend for ReversedSteps {
        fn solve_qp(&self, model: &QpModel) -> capalloc_types::Result<QpSolution> {
            let mut solution = self.0.solve_qp(model)?;
            solution.x.iter_mut().for_each(|v| *v = -*v);
            Ok(solution)
        }
    }

    /// Raises the cancel flag once the first subproblem is solved
    struct CancelAfterFirstSolve {
        inner: ClarabelSolver,
        flag: Arc<AtomicBool>,
    }

    impl SolverBackend for CancelAfterFirstSolve {
        fn solve_qp(&self, model: &QpModel) -> capalloc_types::Result<QpSolution> {
            let solution = self.inner.solve_qp(model)?;
            self.flag.store(true, Ordering::Relaxed);
            Ok(solution)
        }
    }

    fn leverage_cap(available: f64) -> CapitalTierRequirement {
        CapitalTierRequirement::leverage(CapitalTier::Tier1, 0.04, available)
    }

    /// Two-line balance sheet: one loan book funded by deposits
    fn toy_input(loan_bounds: (f64, f64), available: f64) -> OptimizationInput {
        OptimizationInput::new(
            vec![
                LineItem::asset("loans", 100.0, 100.0)
                    .with_risk_weights(1.0, 0.8)
                    .with_bounds(loan_bounds.0, loan_bounds.1),
                LineItem::liability("deposits", 100.0, -20.0).with_bounds(80.0, 120.0),
            ],
            vec![leverage_cap(available)],
            GsibConfig::none(),
        )
    }

    fn gsib_portfolio() -> PortfolioModel {
        PortfolioModel::from_items(vec![
            LineItem::asset("corporate", 120.0, 250.0)
                .with_risk_weights(1.0, 0.75)
                .with_gsib_coefficient(0.6),
            LineItem::asset("mortgages", 80.0, 150.0)
                .with_risk_weights(0.5, 0.35)
                .with_gsib_coefficient(0.25),
            LineItem::asset("treasuries", 50.0, 30.0)
                .with_risk_weights(0.0, 0.0)
                .with_leverage_weight(1.0)
                .with_gsib_coefficient(0.05),
            LineItem::liability("deposits", 200.0, 40.0),
            LineItem::liability("senior_debt", 50.0, -80.0),
        ])
        .unwrap()
    }

    fn gsib_constraints() -> ConstraintSet {
        let portfolio = gsib_portfolio();
        let capital = CapitalConfig::reference_bank(
            &TierCapital {
                cet1: 25.0,
                tier1: 28.0,
                total: 33.0,
                tlac: 60.0,
            },
            GsibConfig::new(0.01, 5e-5),
        )
        .unwrap();
        let engine = CapitalRequirementEngine::new(&portfolio, capital);
        ConstraintSet::new(&portfolio, engine)
    }

    fn central_gradient(set: &ConstraintSet, x: &[f64], idx: usize) -> Vec<f64> {
        (0..x.len())
            .map(|j| {
                let h = 1e-3 * x[j].abs().max(1.0);
                let mut up = x.to_vec();
                let mut down = x.to_vec();
                up[j] += h;
                down[j] -= h;
                let f_up = set.evaluate(&CandidateState::new(up))[idx];
                let f_down = set.evaluate(&CandidateState::new(down))[idx];
                (f_up - f_down) / (2.0 * h)
            })
            .collect()
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let set = gsib_constraints();
        let x = [131.0, 72.5, 60.0, 210.0, 53.5];
        let state = CandidateState::new(x.to_vec());
        let analytic = set.gradients(&state);

        for idx in 0..set.len() {
            let numeric = central_gradient(&set, &x, idx);
            for j in 0..x.len() {
                let err = (analytic[idx][j] - numeric[j]).abs();
                assert!(
                    err <= 1e-7 * (1.0 + numeric[j].abs()),
                    "constraint {} item {}: analytic {} numeric {}",
                    set.ids()[idx],
                    j,
                    analytic[idx][j],
                    numeric[j]
                );
            }
        }
    }

    #[test]
    fn test_hessians_match_finite_differences() {
        let set = gsib_constraints();
        let x: [f64; 5] = [90.0, 110.0, 40.0, 190.0, 50.0];
        let n = x.len();

        for idx in 0..set.len() {
            let hess = set.hessian(idx);
            for j in 0..n {
                let h = 1e-3 * x[j].abs().max(1.0);
                let mut up = x.to_vec();
                let mut down = x.to_vec();
                up[j] += h;
                down[j] -= h;
                let g_up = &set.gradients(&CandidateState::new(up))[idx];
                let g_down = &set.gradients(&CandidateState::new(down))[idx];
                for i in 0..n {
                    let numeric = (g_up[i] - g_down[i]) / (2.0 * h);
                    assert!(
                        (hess[(i, j)] - numeric).abs() <= 1e-9 * (1.0 + numeric.abs()),
                        "constraint {} entry ({}, {}): analytic {} numeric {}",
                        set.ids()[idx],
                        i,
                        j,
                        hess[(i, j)],
                        numeric
                    );
                }
            }
        }

        // Leverage requirements carry no surcharge and so no curvature
        let lev = set
            .ids()
            .iter()
            .position(|id| *id == ConstraintId::capital(RequirementBasis::Leverage, CapitalTier::Cet1))
            .unwrap();
        assert!(set.hessian(lev).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_lagrangian_hessian_weights_multipliers() {
        let set = gsib_constraints();
        let mut multipliers = vec![0.0; set.len()];
        multipliers[1] = 2.0;
        multipliers[3] = 0.5;
        let expected = -(2.0 * set.hessian(1) + 0.5 * set.hessian(3));
        let actual = set.lagrangian_hessian(&multipliers);
        assert!((actual - expected).amax() < 1e-15);
    }

    #[test]
    fn test_toy_balance_sheet_grows_to_bounds() {
        let result = optimize(&toy_input((80.0, 120.0), 10.0), &OptimizerConfig::default()).unwrap();

        assert_eq!(result.status, ExitStatus::Success);
        assert!((result.balance("loans").unwrap() - 120.0).abs() < 1e-6);
        assert!((result.balance("deposits").unwrap() - 120.0).abs() < 1e-6);
        assert!((result.profitability - 0.96).abs() < 1e-6);
        assert!((result.uplift - 0.16).abs() < 1e-6);
        assert!((result.uplift_pct - 20.0).abs() < 1e-4);
        assert!(result.marginal_products.is_empty());
        assert_eq!(result.diagnostics.termination, Termination::Converged);
        assert!(result.diagnostics.qp_iterations >= result.diagnostics.qp_solves);
    }

    #[test]
    fn test_capital_constraint_binds_with_shadow_price() {
        // Loans unbounded above; leverage caps them at 4.8 / 0.04 = 120
        let mut input = toy_input((0.0, f64::INFINITY), 4.8);
        input.line_items[1] = LineItem::liability("deposits", 100.0, -20.0);

        let result = optimize(&input, &OptimizerConfig::default()).unwrap();
        assert_eq!(result.status, ExitStatus::Success);
        assert!((result.balance("loans").unwrap() - 120.0).abs() < 1e-5);

        let lev = ConstraintId::capital(RequirementBasis::Leverage, CapitalTier::Tier1);
        assert!(result.binding_constraints.contains(&lev));
        let slack = result.slack(lev).unwrap();
        assert!(slack.slack.abs() < 1e-5);
        // (100bp - 20bp) of spread per 4% of capital
        assert!((slack.shadow_price - 0.2).abs() < 1e-4, "shadow price {}", slack.shadow_price);
        assert!(result.marginal_products.contains(&"loans".to_string()));
    }

    #[test]
    fn test_infeasible_baseline_fails_fast() {
        // Loans need 4.0 of capital at baseline, 2.4 is available
        let err = optimize(&toy_input((80.0, 120.0), 2.4), &OptimizerConfig::default()).unwrap_err();
        assert_eq!(ExitStatus::from(&err), ExitStatus::InfeasibleStart);
        let context = err.context().unwrap();
        assert_eq!(context.balances, vec![100.0, 100.0]);
        assert_eq!(context.worst_slack().map(|(id, _)| id.is_identity()), Some(false));
    }

    #[test]
    fn test_restore_policy_reports_infeasible() {
        let config = OptimizerConfig::default().with_start_policy(StartPolicy::Restore);
        let result = optimize(&toy_input((80.0, 120.0), 2.4), &config).unwrap();

        assert_eq!(result.status, ExitStatus::Infeasible);
        // Least-violation point: loans at their lower bound
        assert!((result.balance("loans").unwrap() - 80.0).abs() < 1e-5);
        assert!((result.balance("deposits").unwrap() - 80.0).abs() < 1e-5);
        let lev = result
            .slack(ConstraintId::capital(RequirementBasis::Leverage, CapitalTier::Tier1))
            .unwrap();
        assert!((lev.slack + 0.8).abs() < 1e-4);

        let err = result.into_outcome().unwrap_err();
        assert!(matches!(err, CapAllocError::InfeasibleProblem(_)));
        assert_eq!(ExitStatus::from(&err), ExitStatus::Infeasible);
    }

    #[test]
    fn test_iteration_budget_returns_best_feasible() {
        let mut config = OptimizerConfig::default();
        config.solver.max_iterations = 1;
        let result = optimize(&toy_input((80.0, 120.0), 10.0), &config).unwrap();

        assert_eq!(result.status, ExitStatus::NoConvergence);
        assert_eq!(result.diagnostics.termination, Termination::MaxIterExceeded);
        assert!((result.balance("loans").unwrap() - 120.0).abs() < 1e-6);
        assert!(matches!(
            result.into_outcome(),
            Err(CapAllocError::Convergence { iterations: 1, .. })
        ));
    }

    #[test]
    fn test_cancelled_before_first_iteration() {
        let driver = SolverDriver::from_input(&toy_input((80.0, 120.0), 10.0), OptimizerConfig::default()).unwrap();
        driver.cancel_handle().store(true, Ordering::Relaxed);

        let result = driver.run().unwrap();
        assert_eq!(result.status, ExitStatus::Cancelled);
        assert_eq!(result.final_state.balances(), &[100.0, 100.0]);
        assert_eq!(result.diagnostics.iterations, 0);
        assert!(matches!(result.into_outcome(), Err(CapAllocError::Cancelled { .. })));
    }

    #[test]
    fn test_cancelled_mid_run_returns_best_feasible() {
        let flag = Arc::new(AtomicBool::new(false));
        let driver = SolverDriver::from_input(&toy_input((80.0, 120.0), 10.0), OptimizerConfig::default())
            .unwrap()
            .with_cancel_flag(Arc::clone(&flag))
            .with_backend(Arc::new(CancelAfterFirstSolve {
                inner: ClarabelSolver::new(),
                flag: Arc::clone(&flag),
            }));

        let result = driver.run().unwrap();
        assert_eq!(result.status, ExitStatus::Cancelled);
        assert_eq!(result.diagnostics.iterations, 1);
        assert_eq!(result.diagnostics.qp_solves, 1);
        // The first step was accepted before the flag was seen
        assert!((result.balance("loans").unwrap() - 120.0).abs() < 1e-6);
        assert!((result.profitability - 0.96).abs() < 1e-6);
        assert!(matches!(
            result.into_outcome(),
            Err(CapAllocError::Cancelled { iterations: 1, .. })
        ));
    }

    /// Loans worth 100bp funded at zero cost; 4.4 of capital caps loans at 110
    fn low_penalty_input() -> OptimizationInput {
        OptimizationInput::new(
            vec![
                LineItem::asset("loans", 100.0, 100.0).with_bounds(80.0, 120.0),
                LineItem::liability("deposits", 100.0, 0.0).with_bounds(80.0, 120.0),
            ],
            vec![leverage_cap(4.4)],
            GsibConfig::none(),
        )
    }

    fn assert_feasible_outcome(result: &OptimizationResult) {
        for slack in &result.slacks {
            if slack.id.is_identity() {
                assert!(slack.slack.abs() <= 1e-6 * slack.scale, "{} = {}", slack.id, slack.slack);
            } else {
                assert!(slack.slack >= -1e-6 * slack.scale, "{} = {}", slack.id, slack.slack);
            }
        }
        assert!(result.profitability >= result.baseline_profitability - 1e-9);
    }

    #[test]
    fn test_capped_penalty_stall_is_not_infeasible() {
        let mut config = OptimizerConfig::default();
        config.solver.initial_penalty = Some(1e-6);
        config.solver.max_penalty_factor = 1.0;

        let result = optimize(&low_penalty_input(), &config).unwrap();
        assert_eq!(result.status, ExitStatus::NoConvergence);
        assert_eq!(result.diagnostics.termination, Termination::MaxIterExceeded);
        assert_feasible_outcome(&result);
        assert!((result.balance("loans").unwrap() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_low_penalty_restarts_from_feasible_point() {
        let mut config = OptimizerConfig::default();
        config.solver.initial_penalty = Some(1e-6);

        let result = optimize(&low_penalty_input(), &config).unwrap();
        assert_ne!(result.status, ExitStatus::Infeasible);
        assert!(matches!(result.status, ExitStatus::Success | ExitStatus::NoConvergence));
        assert_feasible_outcome(&result);
        assert!(result.balance("loans").unwrap() <= 110.0 + 1e-3);
    }

    #[test]
    fn test_trust_region_collapse_while_feasible() {
        // Wide bounds so every subproblem step is cut by the trust region
        let input = OptimizationInput::new(
            vec![
                LineItem::asset("loans", 100.0, 100.0).with_bounds(0.0, 1000.0),
                LineItem::liability("deposits", 100.0, -20.0).with_bounds(0.0, 1000.0),
            ],
            vec![leverage_cap(100.0)],
            GsibConfig::none(),
        );
        let mut config = OptimizerConfig::default();
        config.solver.min_trust_radius = 1e-4;

        let driver = SolverDriver::from_input(&input, config)
            .unwrap()
            .with_backend(Arc::new(ReversedSteps(ClarabelSolver::new())));
        let result = driver.run().unwrap();

        // Every step loses profit, so the radius shrinks until it collapses
        assert_eq!(result.status, ExitStatus::NoConvergence);
        assert_eq!(result.diagnostics.termination, Termination::MaxIterExceeded);
        assert!(result.diagnostics.trust_radius < 1e-4);
        assert!(result.diagnostics.iterations > 1);
        assert_eq!(result.final_state.balances(), &[100.0, 100.0]);
    }

    #[test]
    fn test_overflow_surfaces_numerical_error() {
        let input = OptimizationInput::new(
            vec![
                LineItem::asset("huge", 1e200, 10.0)
                    .with_risk_weights(1.0, 1.0)
                    .with_gsib_coefficient(1e200),
                LineItem::liability("funding", 1e200, 0.0),
            ],
            vec![CapitalTierRequirement::rwa(
                RwaFramework::Standardized,
                CapitalTier::Cet1,
                0.045,
                1.0,
            )],
            GsibConfig::new(0.01, 1e-3),
        );
        let err = optimize(&input, &OptimizerConfig::default()).unwrap_err();
        match &err {
            CapAllocError::Numerical { constraint, .. } => assert_eq!(
                *constraint,
                ConstraintId::capital(RequirementBasis::Rwa(RwaFramework::Standardized), CapitalTier::Cet1)
            ),
            other => panic!("expected numerical error, got {:?}", other),
        }
        assert_eq!(ExitStatus::from(&err), ExitStatus::NoConvergence);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = OptimizerConfig::default();
        config.solver.feasibility_tolerance = -1.0;
        let err = optimize(&toy_input((80.0, 120.0), 10.0), &config).unwrap_err();
        assert_eq!(ExitStatus::from(&err), ExitStatus::InvalidInput);
    }

    #[test]
    fn test_input_json_roundtrip() {
        let input = toy_input((80.0, f64::INFINITY), 10.0);
        let json = serde_json::to_string(&input).unwrap();
        assert!(json.contains("\"upper_bound\":null"));
        let back = OptimizationInput::from_json_str(&json).unwrap();
        assert_eq!(back, input);
        assert!(OptimizationInput::from_json_str("{\"line_items\": 3}").is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 16,
            .. ProptestConfig::default()
        })]

        #[test]
        fn proptest_feasible_start_never_loses_profit(
            corporate in 50.0f64..150.0,
            mortgages in 50.0f64..150.0,
            corporate_spread in 50.0f64..400.0,
            mortgage_spread in 50.0f64..300.0,
            headroom in 1.05f64..1.5,
            sensitivity in 0.0f64..1e-4,
        ) {
            let total = corporate + mortgages;
            let items = vec![
                LineItem::asset("corporate", corporate, corporate_spread)
                    .with_risk_weights(1.0, 0.8)
                    .with_gsib_coefficient(0.5)
                    .with_bounds(0.5 * corporate, 2.0 * corporate),
                LineItem::asset("mortgages", mortgages, mortgage_spread)
                    .with_risk_weights(0.5, 0.3)
                    .with_gsib_coefficient(0.2)
                    .with_bounds(0.5 * mortgages, 2.0 * mortgages),
                LineItem::liability("deposits", total, -25.0)
                    .with_bounds(0.5 * total, 2.0 * total),
            ];
            let portfolio = PortfolioModel::from_items(items.clone()).unwrap();
            let gsib = GsibConfig::new(0.01, sensitivity);
            let probe = CapitalRequirementEngine::new(
                &portfolio,
                CapitalConfig::new(vec![], gsib).unwrap(),
            );
            let baseline = portfolio.baseline();
            let rwa_req = CapitalTierRequirement::rwa(RwaFramework::Standardized, CapitalTier::Cet1, 0.045, 0.0);
            let needed_rwa = probe.required_capital(&rwa_req, &baseline);
            let needed_lev = 0.04 * probe.leverage_exposure(&baseline);

            let input = OptimizationInput::new(
                items,
                vec![
                    CapitalTierRequirement::rwa(RwaFramework::Standardized, CapitalTier::Cet1, 0.045, headroom * needed_rwa),
                    leverage_cap(headroom * needed_lev),
                ],
                gsib,
            );
            let result = optimize(&input, &OptimizerConfig::default()).unwrap();

            prop_assert_eq!(result.status, ExitStatus::Success);
            prop_assert!(result.profitability >= result.baseline_profitability - 1e-6);
            for slack in &result.slacks {
                if slack.id.is_identity() {
                    prop_assert!(slack.slack.abs() <= 1e-6 * slack.scale);
                } else {
                    prop_assert!(slack.slack >= -1e-6 * slack.scale);
                }
            }
            for (item, balance) in portfolio.items().zip(result.final_state.balances()) {
                prop_assert!(*balance >= item.lower_bound - 1e-9);
                prop_assert!(*balance <= item.upper_bound + 1e-9);
            }
        }
    }
}
