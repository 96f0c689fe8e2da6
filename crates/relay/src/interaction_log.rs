use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use health_protocol::InteractionRecord;

use crate::config::PersistenceConfig;

const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Best-effort sink for user interactions. Failures never reach the caller
/// of an endpoint; see [`spawn_record`].
#[async_trait]
pub(crate) trait InteractionLog: Send + Sync {
    async fn record(&self, record: &InteractionRecord) -> anyhow::Result<()>;
}

/// Inserts rows through the hosted store's REST interface.
pub(crate) struct RestInteractionLog {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl RestInteractionLog {
    pub(crate) fn new(config: &PersistenceConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(WRITE_TIMEOUT)
            .build()
            .context("failed to build persistence client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/rest/v1/{}", config.url.trim_end_matches('/'), config.table),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl InteractionLog for RestInteractionLog {
    async fn record(&self, record: &InteractionRecord) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=minimal")
            .json(&[record])
            .send()
            .await
            .with_context(|| format!("insert into {} failed", self.endpoint))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("insert into {} returned {status}: {}", self.endpoint, body.trim());
        }
        Ok(())
    }
}

/// Used when no persistence collaborator is configured.
pub(crate) struct DisabledInteractionLog;

#[async_trait]
impl InteractionLog for DisabledInteractionLog {
    async fn record(&self, record: &InteractionRecord) -> anyhow::Result<()> {
        tracing::debug!(
            event = "interaction.skipped",
            kind = ?record.kind,
            "persistence disabled"
        );
        Ok(())
    }
}

pub(crate) fn build_interaction_log(
    config: Option<&PersistenceConfig>,
) -> anyhow::Result<Arc<dyn InteractionLog>> {
    match config {
        Some(config) => Ok(Arc::new(RestInteractionLog::new(config)?)),
        None => Ok(Arc::new(DisabledInteractionLog)),
    }
}

/// Writes `record` on a detached task; errors are logged and dropped.
pub(crate) fn spawn_record(log: Arc<dyn InteractionLog>, record: InteractionRecord) {
    tokio::spawn(async move {
        if let Err(err) = log.record(&record).await {
            tracing::warn!(
                event = "interaction.write_failed",
                kind = ?record.kind,
                error = %format!("{err:#}"),
                "failed to write interaction record"
            );
        }
    });
}
