//! Headline Pipeline — Binary Entrypoint
//! Boots the Axum HTTP server, wiring config, the commentary generator, and
//! shared pipeline state.

use std::sync::Arc;

use headline_pipeline::{api, config::PipelineConfig, generate, metrics::Metrics, Pipeline};
use headline_pipeline::summary::HttpSummarizer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("headline_pipeline=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = PipelineConfig::load()?;
    let generator = generate::build_generator();
    let summarizer = Arc::new(HttpSummarizer::new());
    let pipeline = Arc::new(Pipeline::new(config, generator, summarizer));

    let metrics = Metrics::init();
    let app = api::router(pipeline).merge(metrics.router());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3002);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "headline pipeline listening");
    axum::serve(listener, app).await?;
    Ok(())
}
