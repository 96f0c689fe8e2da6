use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(
    name = "mediq-relay",
    version,
    about = "MedIQ health metrics risk-scoring relay"
)]
pub(crate) struct Args {
    /// Optional TOML config; flags and environment override its values.
    #[arg(long, env = "MEDIQ_CONFIG")]
    pub(crate) config: Option<PathBuf>,
    #[arg(long, env = "MEDIQ_LISTEN_ADDR")]
    pub(crate) listen_addr: Option<String>,
    /// Base URL of the external model service. Unset selects the local heuristic.
    #[arg(long, env = "MODEL_SERVICE_URL")]
    pub(crate) model_service_url: Option<String>,
    /// Downstream request timeout, e.g. `30s` or `1500ms`.
    #[arg(long, env = "MODEL_TIMEOUT")]
    pub(crate) model_timeout: Option<String>,
    #[arg(long, env = "MEDIQ_MAX_UPLOAD_BYTES")]
    pub(crate) max_upload_bytes: Option<usize>,
    #[arg(long, env = "SUPABASE_URL")]
    pub(crate) supabase_url: Option<String>,
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    pub(crate) supabase_key: Option<String>,
    #[arg(long, env = "MEDIQ_LOG_TABLE")]
    pub(crate) log_table: Option<String>,
    /// Directory for daily-rolling JSON logs, in addition to stderr.
    #[arg(long, env = "MEDIQ_LOG_DIR")]
    pub(crate) log_dir: Option<PathBuf>,
}
