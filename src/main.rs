use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use shop_ledger::{
    init_logger, static_insights, Cli, Command, Ledger, LedgerKind, ReconcileArgs, UploadResponse,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.log_level);

    match cli.command {
        Command::Reconcile(args) => run_reconcile(args),
    }
}

fn run_reconcile(args: ReconcileArgs) -> Result<()> {
    debug!("{:?}", args);

    // 1. Load both exports
    let orders = Ledger::from_path(LedgerKind::Orders, &args.orders)
        .with_context(|| format!("Failed to load orders file: {}", args.orders.display()))?;
    let costs = Ledger::from_path(LedgerKind::Costs, &args.costs)
        .with_context(|| format!("Failed to load costs file: {}", args.costs.display()))?;
    info!("Orders shape: {:?}, costs shape: {:?}", orders.shape(), costs.shape());

    // 2. Reconcile
    let report = args
        .options
        .reconciler()
        .reconcile(&orders, &costs)
        .context("Failed to reconcile ledgers")?;
    info!("{}", report.summary_line());

    // 3. Print the same JSON the upload endpoint returns
    let insights = static_insights(&report.summary);
    let response = UploadResponse::new(report, insights);
    let json = if args.compact {
        serde_json::to_string(&response)?
    } else {
        serde_json::to_string_pretty(&response)?
    };
    println!("{}", json);

    Ok(())
}
