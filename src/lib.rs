// Shop Ledger - Core Library
// Reconciles a marketplace orders export against a supplier costs export.
// Used by the CLI, the upload server, and tests.

pub mod money;          // Money Normalizer
pub mod error;
pub mod ledger;         // CSV exports as header-addressed tables
pub mod columns;        // Column-naming convention detection
pub mod reconciliation; // Revenue / costs / margin + display records
pub mod insights;       // Insight templates and text-generation capability
pub mod response;
pub mod config;

#[cfg(feature = "server")]
pub mod huggingface;
#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use money::{
    RawCell, MoneyError, MoneyPolicy,
    normalize, parse_money, format_currency, format_percent,
};
pub use error::{LedgerError, Result};
pub use ledger::{Ledger, LedgerKind, Row};
pub use columns::{
    DetectionRule, RevenueSource, CostSource, REVENUE_RULES, COST_RULES,
};
pub use reconciliation::{
    Reconciler, ReconciliationReport, Summary, SummaryDisplay,
    OrderRecord, CostRecord, OrderNumber, FeeMatching,
};
pub use insights::{
    Insights, InsightError, TextGenerator, GenerationParams, OptimizationRequest,
    generate_insights, refresh_optimization, static_insights,
};
pub use response::{UploadResponse, ErrorResponse, OptimizationResponse, ApiResponse};
pub use config::{ServerConfig, Cli, Command, ReconcileArgs, ReconcileOptions, init_logger};

#[cfg(feature = "server")]
pub use huggingface::HuggingFaceClient;
#[cfg(feature = "server")]
pub use server::{AppState, build_router, process_upload};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
