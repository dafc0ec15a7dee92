//! Command-line and environment configuration for the two binaries.

use crate::money::MoneyPolicy;
use crate::reconciliation::{FeeMatching, Reconciler};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Hosted model used when a Hugging Face key is configured
pub const DEFAULT_MODEL_URL: &str =
    "https://api-inference.huggingface.co/models/facebook/blenderbot-400M-distill";

/// 16 MiB; uploads are whole CSV exports held in memory
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Reconciliation knobs shared by the server and the CLI.
#[derive(Debug, Args, Clone, Copy)]
pub struct ReconcileOptions {
    /// What to do with a money cell that is not a number: fail the request (strict) or count it
    /// as 0.00 (coerce-to-zero).
    #[arg(long, value_enum, env = "SHOP_LEDGER_MONEY_POLICY", default_value_t = MoneyPolicy::Strict)]
    pub money_policy: MoneyPolicy,

    /// How fee and tax rows are tied to their sale: the order number appears anywhere in Info
    /// (substring) or as a whole digit run (order-number).
    #[arg(long, value_enum, env = "SHOP_LEDGER_FEE_MATCHING", default_value_t = FeeMatching::Substring)]
    pub fee_matching: FeeMatching,
}

impl ReconcileOptions {
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::with_options(self.money_policy, self.fee_matching)
    }
}

/// shop-ledger-server: upload an orders export and a supplier costs export, get back revenue,
/// costs, margin and per-order tables.
#[derive(Debug, Parser, Clone)]
#[command(name = "shop-ledger-server", version)]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, env = "SHOP_LEDGER_BIND", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    /// Hugging Face API token. Without it, insights come from static templates.
    #[arg(long, env = "HUGGINGFACE_API_KEY", hide_env_values = true)]
    pub huggingface_api_key: Option<String>,

    /// Text-generation inference endpoint.
    #[arg(long, env = "SHOP_LEDGER_MODEL_URL", default_value = DEFAULT_MODEL_URL)]
    pub model_url: String,

    /// Largest accepted upload request, in bytes.
    #[arg(long, env = "SHOP_LEDGER_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Directory served under /static.
    #[arg(long, env = "SHOP_LEDGER_WEB_DIR", default_value = "web")]
    pub web_dir: PathBuf,

    #[clap(flatten)]
    pub reconcile: ReconcileOptions,

    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    pub log_level: LevelFilter,
}

impl ServerConfig {
    /// The API key, if one was given and is not blank
    pub fn api_key(&self) -> Option<&str> {
        self.huggingface_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// shop-ledger: reconcile ledger exports from the command line.
#[derive(Debug, Parser, Clone)]
#[command(name = "shop-ledger", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// The logging verbosity. Overridden by RUST_LOG.
    #[arg(long, global = true, default_value_t = LevelFilter::WARN)]
    pub log_level: LevelFilter,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Reconcile an orders CSV against a supplier costs CSV and print the result as JSON.
    ///
    /// The output has the same shape as the server's upload response; insights are always the
    /// static templates.
    Reconcile(ReconcileArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ReconcileArgs {
    /// Orders / payments export (comma-delimited).
    #[arg(long)]
    pub orders: PathBuf,

    /// Supplier costs export (comma-delimited, or pipe-delimited after a `sep=|` line).
    #[arg(long)]
    pub costs: PathBuf,

    /// Print JSON on a single line.
    #[arg(long)]
    pub compact: bool,

    #[clap(flatten)]
    pub options: ReconcileOptions,
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        // RUST_LOG exists; use it.
        Some(_) => EnvFilter::from_default_env(),
        // Otherwise the requested level, for this crate only.
        None => EnvFilter::new(format!("shop_ledger={},tower_http={}", level, level)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::try_parse_from(["shop-ledger-server"]).unwrap();

        assert_eq!(config.bind.port(), 5000);
        assert_eq!(config.model_url, DEFAULT_MODEL_URL);
        assert_eq!(config.reconcile.money_policy, MoneyPolicy::Strict);
        assert_eq!(config.reconcile.fee_matching, FeeMatching::Substring);
    }

    #[test]
    fn test_server_flags() {
        let config = ServerConfig::try_parse_from([
            "shop-ledger-server",
            "--bind",
            "127.0.0.1:8080",
            "--huggingface-api-key",
            "  ",
            "--money-policy",
            "coerce-to-zero",
            "--fee-matching",
            "order-number",
        ])
        .unwrap();

        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.api_key(), None);
        assert_eq!(config.reconcile.money_policy, MoneyPolicy::CoerceToZero);
        assert_eq!(config.reconcile.fee_matching, FeeMatching::OrderNumber);
    }

    #[test]
    fn test_cli_reconcile() {
        let cli = Cli::try_parse_from([
            "shop-ledger",
            "reconcile",
            "--orders",
            "orders.csv",
            "--costs",
            "costs.csv",
            "--compact",
        ])
        .unwrap();

        let Command::Reconcile(args) = cli.command;
        assert_eq!(args.orders, PathBuf::from("orders.csv"));
        assert!(args.compact);
        assert_eq!(args.options.money_policy, MoneyPolicy::Strict);
    }
}
