mod cli;
mod config;
mod evaluator;
mod handlers;
mod intake;
mod interaction_log;
mod logging;
mod symptom;
#[cfg(test)]
mod test_utils;

use crate::cli::Args;
use crate::config::{load_file_config, resolve_config, FileConfig, DEV_MODEL_SERVICE_URL};
use crate::evaluator::build_evaluator;
use crate::handlers::{build_router, AppState};
use crate::interaction_log::build_interaction_log;
use crate::logging::init_tracing;
use anyhow::Context;
use clap::Parser;
use std::future::Future;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let file_config = match args.config.as_ref() {
        Some(path) => load_file_config(path)?,
        None => FileConfig::default(),
    };
    let config = resolve_config(&args, file_config).context("invalid relay configuration")?;
    let _log_guard = init_tracing(config.log_dir.as_deref())?;

    let evaluator = build_evaluator(&config)?;
    match config.model.as_ref() {
        Some(model) => info!(
            model_service_url = %model.base_url,
            timeout = %humantime::format_duration(model.timeout),
            "forwarding analyses to model service"
        ),
        None => info!(
            dev_default = DEV_MODEL_SERVICE_URL,
            "MODEL_SERVICE_URL not set; scoring with the local heuristic"
        ),
    }
    let interaction_log = build_interaction_log(config.persistence.as_ref())?;
    info!(
        listen_addr = %config.listen_addr,
        evaluator = evaluator.name(),
        persistence = config.persistence.is_some(),
        max_upload_bytes = config.max_upload_bytes,
        "relay starting"
    );

    let app = build_router(
        AppState::new(evaluator, interaction_log),
        config.max_upload_bytes,
    );
    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "relay listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;
    info!("relay shutting down");
    Ok(())
}

async fn wait_for_shutdown() {
    shutdown_on(tokio::signal::ctrl_c()).await;
}

/// Resolves once `signal` fires. A signal that cannot be installed never
/// resolves, so the server keeps running instead of stopping at startup.
async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => {
            warn!(error = %err, "failed to listen for ctrl-c; shutdown signal disabled");
            std::future::pending::<()>().await;
        }
    }
}
