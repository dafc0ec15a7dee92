// 📦 Response Shapes - JSON bodies shared by the server and the CLI

use crate::insights::Insights;
use crate::reconciliation::{CostRecord, OrderRecord, ReconciliationReport, SummaryDisplay};
use serde::{Deserialize, Serialize};

/// Body of a successful upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub summary: SummaryDisplay,
    pub ai_insights: Insights,
    pub orders_data: Vec<OrderRecord>,
    pub costs_data: Vec<CostRecord>,
}

impl UploadResponse {
    pub fn new(report: ReconciliationReport, ai_insights: Insights) -> Self {
        UploadResponse {
            success: true,
            summary: report.summary.display(),
            ai_insights,
            orders_data: report.orders,
            costs_data: report.costs,
        }
    }
}

/// `{"error": "..."}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        ErrorResponse { error: error.into() }
    }
}

/// Body of `/refresh-optimization`; always HTTP 200
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OptimizationResponse {
    pub fn tip(optimization: String) -> Self {
        OptimizationResponse {
            success: true,
            optimization: Some(optimization),
            error: None,
        }
    }

    pub fn failure() -> Self {
        OptimizationResponse {
            success: false,
            optimization: None,
            error: Some("Failed to generate new optimization tips".to_string()),
        }
    }
}

/// Envelope for the small `/api/*` endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}
