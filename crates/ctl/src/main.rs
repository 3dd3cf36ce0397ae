use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use texforge_core::api::{SubmitRequest, SubmitResponse};
use texforge_core::export::{save_all, save_output};
use texforge_core::{ImageData, OutputKind, Pipeline, RunPhase, RunSnapshot};
use texforge_gemini::{config, GeminiClient, GeminiConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Parser, Debug)]
#[command(name = "texforgectl")]
struct Args {
    /// Log level (env-filter syntax).
    #[arg(long, default_value = "warn", global = true)]
    log: String,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run the whole pipeline locally and write every output.
    Generate {
        /// Texture description.
        #[arg(long)]
        prompt: String,
        /// Directory the images are written to.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Generation service endpoint.
        #[arg(long, default_value = config::DEFAULT_BASE_URL)]
        base_url: String,
        /// Image model name.
        #[arg(long, default_value = config::DEFAULT_MODEL)]
        model: String,
        /// Requested aspect ratio.
        #[arg(long, default_value = config::DEFAULT_ASPECT_RATIO)]
        aspect_ratio: String,
    },
    /// Start a run on a daemon and print its run id.
    Submit {
        /// Daemon base URL, e.g. `http://127.0.0.1:8080`.
        #[arg(long)]
        daemon: String,
        /// Texture description.
        #[arg(long)]
        prompt: String,
    },
    /// Print the daemon's current run with per-output status.
    Status {
        /// Daemon base URL.
        #[arg(long)]
        daemon: String,
    },
    /// Save one output of the daemon's current run.
    Download {
        /// Daemon base URL.
        #[arg(long)]
        daemon: String,
        /// Output to fetch: albedo, normal, height, metallic or ao.
        #[arg(long)]
        kind: OutputKind,
        /// Directory the image is written to.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Save every populated output of the daemon's current run.
    DownloadAll {
        /// Daemon base URL.
        #[arg(long)]
        daemon: String,
        /// Directory the images are written to.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

/// Printed after a run or download; image payloads are left out.
#[derive(Debug, Serialize)]
struct Summary {
    run_id: Option<String>,
    phase: RunPhase,
    written: Vec<PathBuf>,
    failures: BTreeMap<OutputKind, String>,
    error: Option<String>,
}

impl Summary {
    fn new(snap: &RunSnapshot, written: Vec<PathBuf>) -> Self {
        Self {
            run_id: snap.run_id.clone(),
            phase: snap.phase,
            written,
            failures: snap.failures.clone(),
            error: snap.error.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(args.log))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let client = reqwest::Client::new();

    match args.cmd {
        Cmd::Generate {
            prompt,
            out_dir,
            base_url,
            model,
            aspect_ratio,
        } => {
            let api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
            if api_key.is_empty() {
                tracing::warn!(env = API_KEY_ENV, "no API key set");
            }
            let gemini = GeminiClient::with_http(
                client,
                GeminiConfig {
                    api_key,
                    base_url,
                    model,
                    aspect_ratio,
                },
            );
            let pipeline = Pipeline::new(Arc::new(gemini));
            let snap = pipeline.run(&prompt).await?;
            let written = save_all(&out_dir, &snap.results)?;
            println!("{}", serde_json::to_string_pretty(&Summary::new(&snap, written))?);
            if let Some(err) = snap.error {
                bail!("run failed: {err}");
            }
        }
        Cmd::Submit { daemon, prompt } => {
            let url = format!("{}/v1/runs", daemon.trim_end_matches('/'));
            let resp: SubmitResponse = client
                .post(url)
                .json(&SubmitRequest { prompt })
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Cmd::Status { daemon } => {
            let snap = fetch_snapshot(&client, &daemon).await?;
            let statuses: BTreeMap<OutputKind, _> =
                OutputKind::ALL.into_iter().map(|k| (k, snap.status(k))).collect();
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "run_id": snap.run_id,
                "prompt": snap.prompt,
                "phase": snap.phase,
                "outputs": statuses,
                "populated": snap.populated(),
                "failures": snap.failures,
                "error": snap.error,
            }))?);
        }
        Cmd::Download {
            daemon,
            kind,
            out_dir,
        } => {
            let path = download_one(&client, &daemon, kind, &out_dir).await?;
            println!("{}", path.display());
        }
        Cmd::DownloadAll { daemon, out_dir } => {
            let snap = fetch_snapshot(&client, &daemon).await?;
            let kinds = snap.populated();
            if kinds.is_empty() {
                bail!("no outputs available");
            }
            tracing::info!(?kinds, "saving outputs");
            let written = save_all(&out_dir, &snap.results)?;
            println!("{}", serde_json::to_string_pretty(&Summary::new(&snap, written))?);
        }
    }

    Ok(())
}

async fn fetch_snapshot(client: &reqwest::Client, daemon: &str) -> anyhow::Result<RunSnapshot> {
    let url = format!("{}/v1/runs/current", daemon.trim_end_matches('/'));
    let snap = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
        .context("parse run snapshot")?;
    Ok(snap)
}

async fn download_one(
    client: &reqwest::Client,
    daemon: &str,
    kind: OutputKind,
    out_dir: &Path,
) -> anyhow::Result<PathBuf> {
    let url = format!("{}/v1/outputs/{}", daemon.trim_end_matches('/'), kind);
    let resp = client.get(url).send().await?.error_for_status()?;
    let mime = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = resp.bytes().await?;
    save_output(out_dir, kind, &ImageData::from_bytes(mime, &bytes))
}
