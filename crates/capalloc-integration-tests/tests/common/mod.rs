#![allow(dead_code)]

use capalloc_capital::{CapitalConfig, GsibConfig, TierCapital};
use capalloc_optimizer::{OptimizationInput, OptimizationResult};
use capalloc_types::LineItem;
use tracing_subscriber::EnvFilter;

/// Route solver logs through the test harness; set RUST_LOG to see them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Six-line balance sheet with every item bounded to ±50% of baseline
pub fn reference_items() -> Vec<LineItem> {
    let bounded = |item: LineItem| {
        let b = item.baseline_balance;
        item.with_bounds(0.5 * b, 1.5 * b)
    };
    vec![
        bounded(
            LineItem::asset("corporate_loans", 100.0, 220.0)
                .with_risk_weights(1.0, 0.8)
                .with_gsib_coefficient(0.4),
        ),
        bounded(
            LineItem::asset("mortgages", 150.0, 140.0)
                .with_risk_weights(0.5, 0.35)
                .with_gsib_coefficient(0.15),
        ),
        bounded(
            LineItem::asset("treasuries", 80.0, 25.0)
                .with_risk_weights(0.0, 0.0)
                .with_gsib_coefficient(0.05),
        ),
        bounded(
            LineItem::asset("consumer_credit", 70.0, 380.0)
                .with_risk_weights(1.0, 0.9)
                .with_gsib_coefficient(0.3),
        ),
        bounded(LineItem::liability("deposits", 300.0, -30.0).with_gsib_coefficient(0.1)),
        bounded(LineItem::liability("senior_debt", 100.0, -90.0).with_gsib_coefficient(0.2)),
    ]
}

pub fn reference_capital() -> TierCapital {
    TierCapital {
        cet1: 16.0,
        tier1: 20.0,
        total: 26.0,
        tlac: 52.0,
    }
}

pub fn reference_input(gsib: GsibConfig) -> OptimizationInput {
    let capital = CapitalConfig::reference_bank(&reference_capital(), gsib)
        .expect("reference capital config is valid");
    OptimizationInput::new(reference_items(), capital.requirements, capital.gsib)
}

/// Properties every returned state must satisfy when the run reports success
pub fn assert_feasible(result: &OptimizationResult, items: &[LineItem]) {
    for slack in &result.slacks {
        if slack.id.is_identity() {
            assert!(
                slack.slack.abs() <= 1e-6 * slack.scale,
                "identity off by {}",
                slack.slack
            );
        } else {
            assert!(
                slack.slack >= -1e-6 * slack.scale,
                "{} violated by {}",
                slack.id,
                slack.slack
            );
        }
    }
    for (item, balance) in items.iter().zip(result.final_state.balances()) {
        assert!(
            *balance >= item.lower_bound - 1e-9 && *balance <= item.upper_bound + 1e-9,
            "{} = {} outside [{}, {}]",
            item.id,
            balance,
            item.lower_bound,
            item.upper_bound
        );
    }
}
