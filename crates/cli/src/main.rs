mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use prometheus::{Encoder, Registry, TextEncoder};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};

use isbnfill_core::{
    load_config, load_config_from_env, validate_config, CancellationSignal, HttpLookupClient,
    LookupClient, Pipeline, SanitizedConfig,
};

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    cli::init_tracing(&cli);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Load configuration
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None => load_config_from_env().context("Failed to load config from environment")?,
    };
    cli.apply_overrides(&mut config);

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = SanitizedConfig::from(&config);
    let config_json = serde_json::to_string(&sanitized).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(config_hash = &config_hash[..16], "Effective configuration: {}", config_json);

    let client: Arc<dyn LookupClient> = Arc::new(
        HttpLookupClient::from_config(&config.lookup, config.pipeline.identifier_preference)
            .context("Failed to create lookup client")?,
    );
    info!("Using lookup service: {}", client.name());

    let pipeline = Pipeline::new(config.pipeline.clone(), client);

    // Stop admitting new rows on Ctrl-C; rows already in flight still finish
    let cancel = CancellationSignal::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing in-flight lookups");
                cancel.cancel();
            }
        });
    }

    let output = cli.output_path();
    info!("Enriching {:?} into {:?}", cli.input, output);

    let stats = pipeline
        .enrich_csv(&cli.input, &output, &cancel)
        .await
        .with_context(|| format!("Failed to enrich {:?}", cli.input))?;

    println!("{}", stats.summary());
    for (kind, count) in &stats.failures {
        println!("  {}: {}", kind, count);
    }
    if stats.cancelled {
        println!("Interrupted: only rows admitted before the interrupt were written");
    }
    println!("Output written to {}", output.display());

    if let Some(path) = &cli.metrics_out {
        write_metrics(path).with_context(|| format!("Failed to write metrics to {:?}", path))?;
        info!("Metrics written to {:?}", path);
    }

    Ok(())
}

/// Write all core metrics in Prometheus text format.
fn write_metrics(path: &Path) -> Result<()> {
    let registry = Registry::new();
    for metric in isbnfill_core::metrics::all_metrics() {
        registry.register(metric)?;
    }

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    std::fs::write(path, buffer)?;
    Ok(())
}
