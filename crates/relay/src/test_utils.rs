use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use health_protocol::InteractionRecord;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::interaction_log::InteractionLog;

pub(crate) async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, router).await.expect("serve app") });
    addr
}

/// A base URL nothing is listening on.
pub(crate) async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

#[derive(Clone, Copy)]
pub(crate) enum FakeReply {
    Json,
    Status(StatusCode),
    PlainText,
}

#[derive(Clone, Debug)]
pub(crate) struct ReceivedReport {
    pub(crate) file_name: Option<String>,
    pub(crate) content_type: Option<String>,
    pub(crate) len: usize,
}

#[derive(Clone)]
struct FakeState {
    reply: FakeReply,
    delay: Duration,
    predict_hits: Arc<AtomicUsize>,
    report_hits: Arc<AtomicUsize>,
    last_predict_body: Arc<Mutex<Option<Value>>>,
    last_report: Arc<Mutex<Option<ReceivedReport>>>,
}

/// Stand-in for the external model service, counting hits per endpoint.
pub(crate) struct FakeModelService {
    addr: SocketAddr,
    state: FakeState,
}

impl FakeModelService {
    pub(crate) async fn start(reply: FakeReply) -> Self {
        Self::start_delayed(reply, Duration::ZERO).await
    }

    pub(crate) async fn start_delayed(reply: FakeReply, delay: Duration) -> Self {
        let state = FakeState {
            reply,
            delay,
            predict_hits: Arc::new(AtomicUsize::new(0)),
            report_hits: Arc::new(AtomicUsize::new(0)),
            last_predict_body: Arc::new(Mutex::new(None)),
            last_report: Arc::new(Mutex::new(None)),
        };
        let router = Router::new()
            .route("/predict", post(fake_predict))
            .route("/predict-from-report", post(fake_predict_from_report))
            .with_state(state.clone())
            .layer(DefaultBodyLimit::disable());
        let addr = serve(router).await;
        Self { addr, state }
    }

    pub(crate) fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn predict_hits(&self) -> usize {
        self.state.predict_hits.load(Ordering::SeqCst)
    }

    pub(crate) fn report_hits(&self) -> usize {
        self.state.report_hits.load(Ordering::SeqCst)
    }

    pub(crate) async fn last_predict_body(&self) -> Option<Value> {
        self.state.last_predict_body.lock().await.clone()
    }

    pub(crate) async fn last_report(&self) -> Option<ReceivedReport> {
        self.state.last_report.lock().await.clone()
    }
}

async fn fake_predict(State(state): State<FakeState>, Json(body): Json<Value>) -> Response {
    state.predict_hits.fetch_add(1, Ordering::SeqCst);
    *state.last_predict_body.lock().await = Some(body.clone());
    reply(
        &state,
        json!({
            "predicted_condition": "Healthy",
            "confidence": 0.91,
            "risk_category": "Low Risk",
            "received": body,
        }),
    )
    .await
}

async fn fake_predict_from_report(State(state): State<FakeState>, mut multipart: Multipart) -> Response {
    state.report_hits.fetch_add(1, Ordering::SeqCst);
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let len = field.bytes().await.map(|bytes| bytes.len()).unwrap_or(0);
        *state.last_report.lock().await = Some(ReceivedReport {
            file_name,
            content_type,
            len,
        });
    }
    reply(
        &state,
        json!({
            "predicted_condition": "Diabetes",
            "confidence": 0.9,
            "risk_category": "High Risk",
            "source": "report",
        }),
    )
    .await
}

async fn reply(state: &FakeState, body: Value) -> Response {
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    match state.reply {
        FakeReply::Json => Json(body).into_response(),
        FakeReply::Status(status) => (status, "model unavailable").into_response(),
        FakeReply::PlainText => "prediction complete".into_response(),
    }
}

#[derive(Default)]
pub(crate) struct RecordingLog {
    records: Mutex<Vec<InteractionRecord>>,
}

impl RecordingLog {
    pub(crate) async fn records(&self) -> Vec<InteractionRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl InteractionLog for RecordingLog {
    async fn record(&self, record: &InteractionRecord) -> anyhow::Result<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}

pub(crate) struct FailingLog;

#[async_trait]
impl InteractionLog for FailingLog {
    async fn record(&self, _record: &InteractionRecord) -> anyhow::Result<()> {
        anyhow::bail!("store unavailable")
    }
}

/// Polls until `count` records arrived; detached writes land asynchronously.
pub(crate) async fn wait_for_records(log: &RecordingLog, count: usize) -> Vec<InteractionRecord> {
    for _ in 0..100 {
        let records = log.records().await;
        if records.len() >= count {
            return records;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} interaction records");
}
