//! Template pipeline binary.
//!
//! Reads a generation request as JSON from the file named by the first
//! argument, or from stdin, and prints the render-ready template.

use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reelgen_models::ValidationConfig;
use reelgen_pipeline::{
    metrics, FirestorePlanStore, GeminiConfig, GeminiPlanner, PipelineConfig,
    TemplateOrchestrator,
};

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr; stdout carries the template.
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn read_request() -> anyhow::Result<ValidationConfig> {
    let raw = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read request file {}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read request from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("Request is not a valid generation request")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing();

    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        match addr.parse::<SocketAddr>() {
            Ok(addr) => {
                metrics::install_prometheus(addr).map_err(anyhow::Error::msg)?;
                info!(%addr, "Prometheus metrics exporter listening");
            }
            Err(e) => warn!(addr = %addr, error = %e, "Ignoring invalid METRICS_ADDR"),
        }
    }

    let request = read_request()?;

    let config = PipelineConfig::from_env();
    info!("Pipeline config: {:?}", config);

    let gemini = GeminiConfig::from_env()?.with_output_format(config.output_format.clone());
    let planner = Arc::new(GeminiPlanner::new(gemini)?);
    let store = Arc::new(FirestorePlanStore::from_env().await?);

    let orchestrator = TemplateOrchestrator::new(planner, store, config);
    let output = orchestrator.run(&request).await?;

    for warning in &output.warnings {
        warn!("{}", warning);
    }
    info!(
        watermarked = output.watermarked,
        repair_attempts = output.repair_attempts,
        "Template ready"
    );

    println!("{}", serde_json::to_string_pretty(&output.template.to_value())?);
    Ok(())
}
