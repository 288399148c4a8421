use std::path::PathBuf;

use anyhow::{Context, Result};

mod config;
mod request;
mod runner;

use request::AnalyticsRequest;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    // Logs go to stderr so stdout carries only the report
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    let path: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: analytics-runner <request.json>")?;

    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read request file {}", path.display()))?;
    let request: AnalyticsRequest = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse request file {}", path.display()))?;

    tracing::info!(
        "Loaded request: {} stocks, {} holdings, {} return series",
        request.stocks.len(),
        request.holdings.len(),
        request.returns.len()
    );

    let report = runner::run(request).await;
    if !report.failures.is_empty() {
        tracing::warn!("{} engine(s) rejected their input", report.failures.len());
    }

    let out = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
    println!("{out}");

    Ok(())
}
