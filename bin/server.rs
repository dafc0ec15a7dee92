// Shop Ledger - Web Server
// Upload + insight endpoints with Axum

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use shop_ledger::{build_router, init_logger, AppState, HuggingFaceClient, ServerConfig, TextGenerator};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();
    init_logger(config.log_level);

    println!("🌐 Shop Ledger - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Text generation is optional: no key, static insights
    let generator: Option<Arc<dyn TextGenerator>> = match config.api_key() {
        Some(key) => {
            let client = HuggingFaceClient::new(key.to_string(), config.model_url.clone())
                .context("Failed to build Hugging Face client")?;
            info!("AI insights enabled via {}", client.model_url());
            Some(Arc::new(client) as Arc<dyn TextGenerator>)
        }
        None => {
            info!("HUGGINGFACE_API_KEY not set, using static insights");
            None
        }
    };

    info!(
        "Money policy: {}, fee matching: {}",
        config.reconcile.money_policy, config.reconcile.fee_matching
    );

    let state = AppState::new(config.reconcile.reconciler(), generator);
    let app = build_router(state, &config.web_dir, config.max_upload_bytes);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    println!("\n🚀 Server running on http://{}", config.bind);
    println!("   UI:     http://{}/", config.bind);
    println!("   Upload: POST http://{}/upload", config.bind);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
