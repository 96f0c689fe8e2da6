use anyhow::Context;
use async_trait::async_trait;
use health_protocol::HealthMetricsInput;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use super::{Evaluator, ReportUpload};
use crate::config::ModelServiceConfig;

const PREDICT_PATH: &str = "predict";
const PREDICT_FROM_REPORT_PATH: &str = "predict-from-report";
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Forwards each request to the external model service and relays its JSON.
/// No retries and no fallback to the local heuristic.
pub(crate) struct RemoteEvaluator {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteEvaluator {
    pub(crate) fn new(config: &ModelServiceConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build model service client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl Evaluator for RemoteEvaluator {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn evaluate_metrics(&self, metrics: &HealthMetricsInput) -> anyhow::Result<Value> {
        let url = self.endpoint(PREDICT_PATH);
        let response = self
            .client
            .post(&url)
            .json(metrics)
            .send()
            .await
            .with_context(|| format!("model service request to {url} failed"))?;
        read_analysis(response, &url).await
    }

    async fn evaluate_report(&self, report: ReportUpload) -> anyhow::Result<Value> {
        let url = self.endpoint(PREDICT_FROM_REPORT_PATH);
        let len = report.bytes.len() as u64;
        let part = Part::stream_with_length(report.bytes, len)
            .file_name(report.file_name)
            .mime_str(&report.content_type)
            .with_context(|| format!("invalid report content type {}", report.content_type))?;
        let form = Form::new().part("file", part);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("model service request to {url} failed"))?;
        read_analysis(response, &url).await
    }
}

async fn read_analysis(response: reqwest::Response, url: &str) -> anyhow::Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!(
            "model service {url} returned {status}: {}",
            truncate(body.trim(), MAX_ERROR_BODY_CHARS)
        );
    }
    let body = response
        .bytes()
        .await
        .with_context(|| format!("failed to read model service response from {url}"))?;
    serde_json::from_slice(&body)
        .with_context(|| format!("model service {url} returned a non-JSON body"))
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
