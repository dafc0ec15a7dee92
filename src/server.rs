// 🌐 Web Server - Upload and insight endpoints with Axum
// Every request is independent: parse, reconcile, respond, forget

use crate::error::LedgerError;
use crate::insights::{generate_insights, refresh_optimization, OptimizationRequest, TextGenerator};
use crate::ledger::Ledger;
use crate::reconciliation::{ReconciliationReport, Reconciler};
use crate::response::{ApiResponse, ErrorResponse, OptimizationResponse, UploadResponse};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const ORDERS_FIELD: &str = "ordersFile";
pub const COSTS_FIELD: &str = "costsFile";

/// Shared application state (immutable after startup)
#[derive(Clone)]
pub struct AppState {
    pub reconciler: Reconciler,
    pub generator: Option<Arc<dyn TextGenerator>>,
}

impl AppState {
    pub fn new(reconciler: Reconciler, generator: Option<Arc<dyn TextGenerator>>) -> Self {
        AppState {
            reconciler,
            generator,
        }
    }

    fn generator(&self) -> Option<&dyn TextGenerator> {
        self.generator.as_deref()
    }
}

/// One uploaded file field
struct UploadedFile {
    file_name: String,
    bytes: Bytes,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET / - Serve the upload page
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /upload - Reconcile an orders export against a costs export
async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    // Missing or non-multipart body: same JSON error as a form without files
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(e) => {
            warn!("Upload is not a multipart form: {}", e);
            return bad_request("No files uploaded");
        }
    };

    let span = info_span!("upload", request_id = %Uuid::new_v4());
    handle_upload(state, multipart).instrument(span).await
}

async fn handle_upload(state: AppState, mut multipart: Multipart) -> Response {
    let mut orders_file: Option<UploadedFile> = None;
    let mut costs_file: Option<UploadedFile> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Unreadable multipart body: {}", e);
                return bad_request(format!("Invalid upload: {}", e));
            }
        };

        // Plain form fields (no filename) are not files
        let (Some(name), Some(file_name)) = (
            field.name().map(str::to_string),
            field.file_name().map(str::to_string),
        ) else {
            continue;
        };

        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read upload field {}: {}", name, e);
                return bad_request(format!("Invalid upload: {}", e));
            }
        };

        let file = UploadedFile { file_name, bytes };
        match name.as_str() {
            ORDERS_FIELD => orders_file = Some(file),
            COSTS_FIELD => costs_file = Some(file),
            _ => {}
        }
    }

    let (Some(orders_file), Some(costs_file)) = (orders_file, costs_file) else {
        warn!("Missing files in request");
        return bad_request("No files uploaded");
    };

    if orders_file.file_name.is_empty() || costs_file.file_name.is_empty() {
        warn!("Empty filenames");
        return bad_request("No input files");
    }

    info!(
        "Orders file: {} ({} bytes), costs file: {} ({} bytes)",
        orders_file.file_name,
        orders_file.bytes.len(),
        costs_file.file_name,
        costs_file.bytes.len()
    );

    let report = match process_upload(&state.reconciler, &orders_file.bytes, &costs_file.bytes) {
        Ok(report) => report,
        Err(e) => {
            error!("Error in upload: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(format!("Error processing files: {}", e))),
            )
                .into_response();
        }
    };

    let insights = generate_insights(state.generator(), &report.summary).await;
    (StatusCode::OK, Json(UploadResponse::new(report, insights))).into_response()
}

/// Parse both ledgers and reconcile them
pub fn process_upload(
    reconciler: &Reconciler,
    orders_bytes: &[u8],
    costs_bytes: &[u8],
) -> Result<ReconciliationReport, LedgerError> {
    let orders = Ledger::orders_from_bytes(orders_bytes)?;
    let costs = Ledger::costs_from_bytes(costs_bytes)?;
    info!("Orders shape: {:?}, costs shape: {:?}", orders.shape(), costs.shape());

    let report = reconciler.reconcile(&orders, &costs)?;
    info!("{}", report.summary_line());
    Ok(report)
}

/// POST /refresh-optimization - One fresh optimization tip
async fn refresh_optimization_tip(State(state): State<AppState>, body: Bytes) -> Json<OptimizationResponse> {
    let request = match serde_json::from_slice::<Value>(&body)
        .map_err(|e| e.to_string())
        .and_then(|value| OptimizationRequest::from_json(&value))
    {
        Ok(request) => request,
        Err(e) => {
            warn!("Refresh optimization error: {}", e);
            return Json(OptimizationResponse::failure());
        }
    };

    let mut rng = StdRng::from_entropy();
    let tip = refresh_optimization(state.generator(), &request, &mut rng).await;
    Json(OptimizationResponse::tip(tip))
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
}

// ============================================================================
// Router
// ============================================================================

pub fn build_router(state: AppState, web_dir: &Path, max_upload_bytes: usize) -> Router {
    let api_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .route("/", get(serve_index))
        .route("/upload", post(upload))
        .route("/refresh-optimization", post(refresh_optimization_tip))
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new(web_dir))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::{GenerationParams, InsightError, STATIC_TIPS};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    const BOUNDARY: &str = "shopledgerboundary";

    const ORDERS_CSV: &str = "\
Date,Type,Title,Info,Fees & Taxes,Net
2024-03-03,Sale,Payment for Order #555,,--,$100.00
2024-03-03,Fee,Transaction fee,Order #555,-$5.00,-$5.00
";

    const COSTS_CSV: &str = "\
sep=|
Order Value|product_title
$30.00|Silver chain
$10.00|
";

    /// Counts calls so tests can tell whether processing happened
    struct CountingGenerator(Arc<AtomicUsize>);

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String, InsightError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(InsightError::Timeout)
        }
    }

    fn app(generator: Option<Arc<dyn TextGenerator>>) -> Router {
        let state = AppState::new(Reconciler::new(), generator);
        build_router(state, Path::new("web"), 1024 * 1024)
    }

    fn multipart_request(parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (name, file_name, content) in parts {
            body.push_str(&format!("--{}\r\n", BOUNDARY));
            match file_name {
                Some(f) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: text/csv\r\n\r\n",
                    name, f
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    name
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));

        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_upload_success() {
        let response = app(None)
            .oneshot(multipart_request(&[
                (ORDERS_FIELD, Some("orders.csv"), ORDERS_CSV),
                (COSTS_FIELD, Some("costs.csv"), COSTS_CSV),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;

        assert_eq!(body["success"], true);
        assert_eq!(body["summary"]["total_revenue"], "$100.00");
        assert_eq!(body["summary"]["total_costs"], "$40.00");
        assert_eq!(body["summary"]["net_profit"], "$60.00");
        assert_eq!(body["summary"]["profit_margin"], "60.0%");
        assert_eq!(body["summary"]["predicted_revenue"], "$300.00");
        assert_eq!(body["summary"]["revenue_period"], "1 orders");
        assert_eq!(body["summary"]["costs_period"], "2 purchases");

        assert_eq!(body["orders_data"][0]["order_id"], "Order #555");
        assert_eq!(body["orders_data"][0]["type"], "Sale");
        assert_eq!(body["orders_data"][0]["fees_taxes"], "$5.00");
        assert_eq!(body["costs_data"][1]["description"], "AliExpress Order");
        assert_eq!(body["costs_data"][1]["type"], "Product Cost");

        assert!(body["ai_insights"]["performance"]
            .as_str()
            .unwrap()
            .starts_with("Your business generated $100.00"));
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_rejected_before_processing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let generator: Arc<dyn TextGenerator> = Arc::new(CountingGenerator(calls.clone()));

        let response = app(Some(generator))
            .oneshot(multipart_request(&[(ORDERS_FIELD, Some("orders.csv"), ORDERS_CSV)]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "No files uploaded");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upload_plain_field_is_not_a_file() {
        let response = app(None)
            .oneshot(multipart_request(&[
                (ORDERS_FIELD, Some("orders.csv"), ORDERS_CSV),
                (COSTS_FIELD, None, COSTS_CSV),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_empty_filename() {
        let response = app(None)
            .oneshot(multipart_request(&[
                (ORDERS_FIELD, Some(""), ""),
                (COSTS_FIELD, Some("costs.csv"), COSTS_CSV),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = json_body(response).await["error"].as_str().unwrap().to_string();
        assert_eq!(error, "No input files");
    }

    #[tokio::test]
    async fn test_upload_without_multipart_body() {
        let requests = [
            Request::builder()
                .method("POST")
                .uri("/upload")
                .body(Body::empty())
                .unwrap(),
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("ordersFile=orders.csv"))
                .unwrap(),
        ];

        for request in requests {
            let response = app(None).oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(json_body(response).await["error"], "No files uploaded");
        }
    }

    #[tokio::test]
    async fn test_upload_malformed_money_is_server_error() {
        let orders = "Type,Net\nSale,N/A\n";
        let response = app(None)
            .oneshot(multipart_request(&[
                (ORDERS_FIELD, Some("orders.csv"), orders),
                (COSTS_FIELD, Some("costs.csv"), COSTS_CSV),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let error = json_body(response).await["error"].as_str().unwrap().to_string();
        assert!(error.starts_with("Error processing files: "));
        assert!(error.contains("N/A"));
    }

    #[tokio::test]
    async fn test_upload_generator_failure_still_succeeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let generator: Arc<dyn TextGenerator> = Arc::new(CountingGenerator(calls.clone()));

        let response = app(Some(generator))
            .oneshot(multipart_request(&[
                (ORDERS_FIELD, Some("orders.csv"), ORDERS_CSV),
                (COSTS_FIELD, Some("costs.csv"), COSTS_CSV),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let body = json_body(response).await;
        assert_eq!(
            body["ai_insights"]["performance"],
            "Revenue: $100.00, Costs: $40.00, Margin: 60.0%"
        );
    }

    #[tokio::test]
    async fn test_refresh_optimization() {
        let request = Request::builder()
            .method("POST")
            .uri("/refresh-optimization")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"revenue": 100, "costs": 40, "margin": 60, "sales_count": 1}"#))
            .unwrap();

        let response = app(None).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert!(STATIC_TIPS.contains(&body["optimization"].as_str().unwrap()));
    }

    #[tokio::test]
    async fn test_refresh_optimization_bad_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/refresh-optimization")
            .body(Body::from("not json"))
            .unwrap();

        let response = app(None).oneshot(request).await.unwrap();
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Failed to generate new optimization tips");
    }

    #[tokio::test]
    async fn test_health_and_index() {
        let response = app(None)
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(json_body(response).await["data"], "OK");

        let response = app(None)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
