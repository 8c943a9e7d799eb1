use std::{env, fs, path::PathBuf};

use capalloc_optimizer::{OptimizationInput, OptimizerConfig, RunAudit, SolverDriver};
use capalloc_types::ExitStatus;
use tracing_subscriber::EnvFilter;

/// Usage: allocate [INPUT_JSON] [CONFIG_JSON]
///
/// Defaults to the bundled regional bank balance sheet and the default
/// solver configuration. Set RUST_LOG=debug to follow each iteration.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = env::args().skip(1);
    let input_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/regional_bank.json"));
    let config = match args.next() {
        Some(path) => serde_json::from_str::<OptimizerConfig>(&fs::read_to_string(path)?)?,
        None => OptimizerConfig::default(),
    };

    println!("=== Capital Allocation Demo ===\n");
    println!("Input: {}", input_path.display());

    let input = OptimizationInput::from_json_str(&fs::read_to_string(&input_path)?)?;
    println!(
        "{} line items, {} capital requirements, GSIB surcharge {:.2}% + {:.1e} x score\n",
        input.line_items.len(),
        input.requirements.len(),
        input.gsib.base_surcharge * 100.0,
        input.gsib.sensitivity
    );

    let driver = SolverDriver::from_input(&input, config.clone())?;
    let result = driver.run()?;

    println!("Status: {:?}", result.status);
    println!("  Iterations: {}", result.diagnostics.iterations);
    println!("  QP solves: {}", result.diagnostics.qp_solves);
    println!("  Final violation: {:.3e}", result.diagnostics.final_violation);
    println!();

    println!("Profitability:");
    println!("  Baseline: {:.4}", result.baseline_profitability);
    println!("  Optimized: {:.4}", result.profitability);
    println!("  Uplift: {:.4} ({:.2}%)", result.uplift, result.uplift_pct);
    println!();

    println!("Balances:");
    for line in &result.line_items {
        let marker = if result.marginal_products.contains(&line.id) { "*" } else { " " };
        println!(
            " {} {:<18} {:>10.2} -> {:>10.2} ({:+.2})",
            marker, line.id, line.baseline_balance, line.final_balance, line.change
        );
    }
    println!("  (* marginal product)");
    println!();

    println!("Constraints:");
    for slack in &result.slacks {
        let flag = if slack.binding { "BINDING" } else { "" };
        match (slack.required_capital, slack.available_capital) {
            (Some(required), Some(available)) => println!(
                "  {:<24} required {:>8.3} of {:>8.3}  slack {:>8.3}  price {:>8.4} {}",
                slack.id.to_string(),
                required,
                available,
                slack.slack,
                slack.shadow_price,
                flag
            ),
            _ => println!("  {:<24} residual {:.3e} {}", slack.id.to_string(), slack.slack, flag),
        }
    }
    println!();

    let audit = RunAudit::new(&input, &config, &result)?;
    println!("Audit:");
    println!("  input  {}", audit.input_hash);
    println!("  config {}", audit.config_hash);
    println!("  result {}", audit.result_hash);

    if result.status != ExitStatus::Success {
        println!("\n✗ Run ended without an optimal allocation");
    } else {
        println!("\n✓ Demo complete!");
    }
    Ok(())
}
