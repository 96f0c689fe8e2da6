use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::FutureExt;
use health_protocol::envelope::{METRICS_ANALYZED_MESSAGE, REPORT_ANALYZED_MESSAGE};
use health_protocol::{
    AnalysisResponse, FailureResponse, InteractionKind, InteractionRecord, SymptomCheckRequest,
};
use serde_json::Value;
use uuid::Uuid;

use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::evaluator::Evaluator;
use crate::intake::{read_analyze_request, AnalyzeRequest, IntakeError};
use crate::interaction_log::{spawn_record, InteractionLog};
use crate::symptom::simulated_reply;

pub(crate) const ANALYSIS_FAILED_MESSAGE: &str = "Failed to run health model analysis";
pub(crate) const NO_SYMPTOMS_MESSAGE: &str = "No symptoms provided";

/// Room for multipart boundaries, part headers and form fields on top of the
/// file ceiling.
pub(crate) const MULTIPART_HEADROOM_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub(crate) struct AppState {
    evaluator: Arc<dyn Evaluator>,
    interaction_log: Arc<dyn InteractionLog>,
    max_upload_bytes: usize,
}

impl AppState {
    pub(crate) fn new(evaluator: Arc<dyn Evaluator>, interaction_log: Arc<dyn InteractionLog>) -> Self {
        Self {
            evaluator,
            interaction_log,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// `max_upload_bytes` caps the uploaded file; the request body as a whole may
/// exceed it by [`MULTIPART_HEADROOM_BYTES`].
pub(crate) fn build_router(mut state: AppState, max_upload_bytes: usize) -> Router {
    state.max_upload_bytes = max_upload_bytes;
    let body_limit = max_upload_bytes.saturating_add(MULTIPART_HEADROOM_BYTES);
    Router::new()
        .route("/health", get(health))
        .route("/api/analyze-health", post(analyze_health))
        .route("/api/symptom-check", post(symptom_check))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(log_http_request))
}

async fn health() -> &'static str {
    "ok"
}

async fn log_http_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started = Instant::now();
    let response = next.run(req).await;
    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        latency_ms = started.elapsed().as_millis() as u64,
        "http request"
    );
    response
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(FailureResponse::new(message))).into_response()
}

/// Runs `future`, turning a panic into an ordinary error so the caller still
/// gets the failure envelope.
async fn guarded<F, T>(future: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(anyhow::anyhow!("panicked: {}", panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

async fn analyze_health(State(state): State<AppState>, request: Request) -> Response {
    let request_id = Uuid::new_v4();
    let intake = match read_analyze_request(request, state.max_upload_bytes).await {
        Ok(intake) => intake,
        Err(err) => {
            tracing::warn!(
                event = "analysis.rejected",
                request_id = %request_id,
                error = %err,
                "invalid analysis request"
            );
            return failure(err.status(), err.to_string());
        }
    };

    let log_input = intake.user_id.as_ref().map(|_| intake.log_input());
    let AnalyzeRequest {
        metrics,
        user_id,
        report,
    } = intake;
    let evaluator = Arc::clone(&state.evaluator);

    let (result, message) = match report {
        Some(report) => {
            tracing::info!(
                event = "analysis.report",
                request_id = %request_id,
                evaluator = evaluator.name(),
                file_name = %report.file_name,
                content_type = %report.content_type,
                size_bytes = report.bytes.len(),
            );
            (
                guarded(evaluator.evaluate_report(report)).await,
                REPORT_ANALYZED_MESSAGE,
            )
        }
        None => {
            tracing::info!(
                event = "analysis.metrics",
                request_id = %request_id,
                evaluator = evaluator.name(),
                measured = metrics.measured_count(),
            );
            (
                guarded(evaluator.evaluate_metrics(&metrics)).await,
                METRICS_ANALYZED_MESSAGE,
            )
        }
    };

    match result {
        Ok(analysis) => {
            let record = user_id.zip(log_input).map(|(user_id, input)| {
                InteractionRecord::new(
                    user_id,
                    InteractionKind::HealthAnalysis,
                    input,
                    analysis.clone(),
                )
            });
            let response =
                (StatusCode::OK, Json(AnalysisResponse::ok(analysis, message))).into_response();
            if let Some(record) = record {
                spawn_record(Arc::clone(&state.interaction_log), record);
            }
            response
        }
        Err(err) => {
            tracing::error!(
                event = "analysis.failed",
                request_id = %request_id,
                evaluator = evaluator.name(),
                error = %format!("{err:#}"),
                "health analysis failed"
            );
            failure(StatusCode::INTERNAL_SERVER_ERROR, ANALYSIS_FAILED_MESSAGE)
        }
    }
}

async fn symptom_check(State(state): State<AppState>, body: Bytes) -> Response {
    let parsed = if body.iter().all(u8::is_ascii_whitespace) {
        Ok(SymptomCheckRequest::default())
    } else {
        serde_json::from_slice(&body)
    };
    let request = match parsed {
        Ok(request) => request,
        Err(err) => {
            let err = IntakeError::Malformed(err.to_string());
            tracing::warn!(event = "symptom_check.rejected", error = %err);
            return failure(err.status(), err.to_string());
        }
    };
    let symptoms = request
        .symptoms
        .as_deref()
        .map(str::trim)
        .filter(|symptoms| !symptoms.is_empty())
        .map(str::to_string);
    let Some(symptoms) = symptoms else {
        return failure(StatusCode::BAD_REQUEST, NO_SYMPTOMS_MESSAGE);
    };

    let reply = simulated_reply(&symptoms);
    let user_id = request
        .user_id
        .map(|user_id| user_id.trim().to_string())
        .filter(|user_id| !user_id.is_empty());
    if let Some(user_id) = user_id {
        spawn_record(
            Arc::clone(&state.interaction_log),
            InteractionRecord::new(
                user_id,
                InteractionKind::SymptomCheck,
                Value::String(symptoms),
                Value::String(reply.reply.clone()),
            ),
        );
    }
    (StatusCode::OK, Json(reply)).into_response()
}
