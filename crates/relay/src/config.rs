use anyhow::Context;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Args;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_LOG_TABLE: &str = "health_logs";
pub(crate) const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Where the model service listens during local development.
pub(crate) const DEV_MODEL_SERVICE_URL: &str = "http://localhost:8000";

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FileConfig {
    pub(crate) listen_addr: Option<String>,
    pub(crate) log_dir: Option<PathBuf>,
    pub(crate) model: Option<ModelSection>,
    pub(crate) persistence: Option<PersistenceSection>,
    pub(crate) limits: Option<LimitsSection>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ModelSection {
    pub(crate) service_url: Option<String>,
    pub(crate) timeout: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PersistenceSection {
    pub(crate) url: Option<String>,
    pub(crate) anon_key: Option<String>,
    pub(crate) table: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LimitsSection {
    pub(crate) max_upload_bytes: Option<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct RelayConfig {
    pub(crate) listen_addr: SocketAddr,
    pub(crate) log_dir: Option<PathBuf>,
    pub(crate) model: Option<ModelServiceConfig>,
    pub(crate) persistence: Option<PersistenceConfig>,
    pub(crate) max_upload_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ModelServiceConfig {
    pub(crate) base_url: String,
    pub(crate) timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PersistenceConfig {
    pub(crate) url: String,
    pub(crate) api_key: String,
    pub(crate) table: String,
}

pub(crate) fn load_file_config(path: &Path) -> anyhow::Result<FileConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: FileConfig = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(config)
}

/// Merges CLI/environment values over the file config and validates the result.
pub(crate) fn resolve_config(args: &Args, file: FileConfig) -> anyhow::Result<RelayConfig> {
    let model_section = file.model.unwrap_or_default();
    let persistence_section = file.persistence.unwrap_or_default();
    let limits = file.limits.unwrap_or_default();

    let listen_raw = non_empty(args.listen_addr.clone())
        .or_else(|| non_empty(file.listen_addr))
        .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
    let listen_addr = listen_raw
        .parse()
        .with_context(|| format!("invalid listen_addr {listen_raw}"))?;

    let timeout = match args.model_timeout.clone().or(model_section.timeout) {
        Some(raw) => humantime::parse_duration(raw.trim())
            .with_context(|| format!("invalid model timeout {raw}"))?,
        None => DEFAULT_MODEL_TIMEOUT,
    };
    if timeout.is_zero() {
        anyhow::bail!("model timeout must be greater than zero");
    }

    let model = match non_empty(args.model_service_url.clone())
        .or_else(|| non_empty(model_section.service_url))
    {
        Some(url) => Some(ModelServiceConfig {
            base_url: normalize_base_url(&url).context("invalid model service url")?,
            timeout,
        }),
        None => None,
    };

    let persistence_url =
        non_empty(args.supabase_url.clone()).or_else(|| non_empty(persistence_section.url));
    let persistence_key =
        non_empty(args.supabase_key.clone()).or_else(|| non_empty(persistence_section.anon_key));
    let persistence = match (persistence_url, persistence_key) {
        (Some(url), Some(api_key)) => Some(PersistenceConfig {
            url: normalize_base_url(&url).context("invalid persistence url")?,
            api_key,
            table: non_empty(args.log_table.clone())
                .or_else(|| non_empty(persistence_section.table))
                .unwrap_or_else(|| DEFAULT_LOG_TABLE.to_string()),
        }),
        (None, None) => None,
        (Some(_), None) => anyhow::bail!("persistence url is set but the anon key is missing"),
        (None, Some(_)) => anyhow::bail!("persistence anon key is set but the url is missing"),
    };

    let max_upload_bytes = args
        .max_upload_bytes
        .or(limits.max_upload_bytes)
        .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
    if max_upload_bytes == 0 {
        anyhow::bail!("max_upload_bytes must be greater than zero");
    }

    Ok(RelayConfig {
        listen_addr,
        log_dir: args.log_dir.clone().or(file.log_dir),
        model,
        persistence,
        max_upload_bytes,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn normalize_base_url(raw: &str) -> anyhow::Result<String> {
    let parsed = reqwest::Url::parse(raw).with_context(|| format!("cannot parse url {raw}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("url {raw} must use http or https");
    }
    if parsed.host_str().is_none() {
        anyhow::bail!("url {raw} is missing a host");
    }
    Ok(raw.trim_end_matches('/').to_string())
}
