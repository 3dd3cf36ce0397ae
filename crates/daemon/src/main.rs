#![forbid(unsafe_code)]

//! texforge daemon: serves the browser front-end and runs generation pipelines.

use std::{net::SocketAddr, sync::Arc};

use clap::Parser;
use texforge_core::Pipeline;
use texforge_gemini::{config, GeminiClient, GeminiConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod http;

/// Environment variable holding the generation service credential.
const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Parser, Debug)]
#[command(name = "texforge-daemon")]
struct Args {
    /// Listen address, e.g. 127.0.0.1:3000
    #[arg(long, default_value = "127.0.0.1:3000")]
    listen: SocketAddr,

    /// Generation service base URL.
    #[arg(long, default_value = config::DEFAULT_BASE_URL)]
    base_url: String,

    /// Image model identifier.
    #[arg(long, default_value = config::DEFAULT_MODEL)]
    model: String,

    /// Requested aspect ratio of generated images.
    #[arg(long, default_value = config::DEFAULT_ASPECT_RATIO)]
    aspect_ratio: String,

    /// Log level (env-filter syntax).
    #[arg(long, default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(args.log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
    if api_key.is_empty() {
        tracing::warn!(env = API_KEY_ENV, "no API key set, requests will be rejected by the service");
    }

    let client = GeminiClient::new(GeminiConfig {
        api_key,
        base_url: args.base_url,
        model: args.model,
        aspect_ratio: args.aspect_ratio,
    });
    tracing::info!(config = ?client.config(), "generation client ready");

    let pipeline = Arc::new(Pipeline::new(Arc::new(client)));
    let app = http::router(pipeline);

    tracing::info!(listen = %args.listen, "daemon starting");
    axum::serve(tokio::net::TcpListener::bind(args.listen).await?, app).await?;
    Ok(())
}
