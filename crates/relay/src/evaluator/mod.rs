mod heuristic;
mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use health_protocol::HealthMetricsInput;
use serde_json::Value;

use crate::config::RelayConfig;

pub(crate) use heuristic::HeuristicEvaluator;
pub(crate) use remote::RemoteEvaluator;

/// A lab report forwarded as-is to the model service.
#[derive(Debug, Clone)]
pub(crate) struct ReportUpload {
    pub(crate) file_name: String,
    pub(crate) content_type: String,
    pub(crate) bytes: Bytes,
}

/// Scoring strategy behind `/api/analyze-health`.
///
/// Both methods return the JSON placed under `analysis` in the response.
/// `evaluate_metrics` sees the normalized metrics, not the raw request body:
/// unknown keys and `userId` are gone and every value is a float, so a
/// forwarding implementation sends `{"ldl": 130.0}` for `{"ldl": "130"}`.
#[async_trait]
pub(crate) trait Evaluator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn evaluate_metrics(&self, metrics: &HealthMetricsInput) -> anyhow::Result<Value>;

    async fn evaluate_report(&self, report: ReportUpload) -> anyhow::Result<Value>;
}

/// Picks the strategy once at startup: a configured model service wins.
pub(crate) fn build_evaluator(config: &RelayConfig) -> anyhow::Result<Arc<dyn Evaluator>> {
    match config.model.as_ref() {
        Some(model) => Ok(Arc::new(RemoteEvaluator::new(model)?)),
        None => Ok(Arc::new(HeuristicEvaluator)),
    }
}
