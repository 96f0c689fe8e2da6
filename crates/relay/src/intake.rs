use std::fmt;

use axum::extract::multipart::{Multipart, MultipartError};
use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use bytes::Bytes;
use health_protocol::HealthMetricsInput;
use serde_json::{Map, Value};

use crate::evaluator::ReportUpload;

const FILE_FIELD: &str = "file";
const DEFAULT_FILE_NAME: &str = "report";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// One `/api/analyze-health` request after decoding.
#[derive(Debug, Default)]
pub(crate) struct AnalyzeRequest {
    pub(crate) metrics: HealthMetricsInput,
    pub(crate) user_id: Option<String>,
    pub(crate) report: Option<ReportUpload>,
}

impl AnalyzeRequest {
    /// What gets stored as the interaction input: metrics plus, for uploads,
    /// the file's metadata (never its bytes).
    pub(crate) fn log_input(&self) -> Value {
        let metrics = serde_json::to_value(&self.metrics).unwrap_or(Value::Null);
        match self.report.as_ref() {
            Some(report) => serde_json::json!({
                "metrics": metrics,
                "report": {
                    "file_name": report.file_name,
                    "content_type": report.content_type,
                    "size_bytes": report.bytes.len(),
                },
            }),
            None => metrics,
        }
    }
}

#[derive(Debug)]
pub(crate) enum IntakeError {
    InvalidMetric(String),
    Malformed(String),
    TooLarge,
}

impl IntakeError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            Self::InvalidMetric(_) | Self::Malformed(_) => StatusCode::BAD_REQUEST,
            Self::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl fmt::Display for IntakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMetric(detail) => write!(f, "Invalid metric value: {detail}"),
            Self::Malformed(detail) => write!(f, "Malformed request: {detail}"),
            Self::TooLarge => f.write_str("Uploaded file is too large"),
        }
    }
}

impl std::error::Error for IntakeError {}

/// Decodes either a JSON body or a multipart form, chosen by content type.
///
/// `max_file_bytes` bounds the uploaded `file` part alone; the transport
/// limit on the whole body is set a little higher to leave room for framing.
pub(crate) async fn read_analyze_request(
    request: Request,
    max_file_bytes: usize,
) -> Result<AnalyzeRequest, IntakeError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_start().starts_with("multipart/form-data"))
        .unwrap_or(false);
    if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|rejection| IntakeError::Malformed(rejection.body_text()))?;
        from_multipart(multipart, max_file_bytes).await
    } else {
        let body = Bytes::from_request(request, &()).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                IntakeError::TooLarge
            } else {
                IntakeError::Malformed(rejection.body_text())
            }
        })?;
        from_json(&body)
    }
}

pub(crate) fn from_json(body: &[u8]) -> Result<AnalyzeRequest, IntakeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(AnalyzeRequest::default());
    }
    let value: Value =
        serde_json::from_slice(body).map_err(|err| IntakeError::Malformed(err.to_string()))?;
    let Value::Object(mut fields) = value else {
        return Err(IntakeError::Malformed(
            "expected a JSON object of metrics".to_string(),
        ));
    };
    let user_id = take_user_id(&mut fields)?;
    let metrics = serde_json::from_value(Value::Object(fields))
        .map_err(|err| IntakeError::InvalidMetric(err.to_string()))?;
    Ok(AnalyzeRequest {
        metrics,
        user_id,
        report: None,
    })
}

fn take_user_id(fields: &mut Map<String, Value>) -> Result<Option<String>, IntakeError> {
    let raw = match fields.remove("userId") {
        Some(value) => {
            fields.remove("user_id");
            value
        }
        None => fields.remove("user_id").unwrap_or(Value::Null),
    };
    match raw {
        Value::Null => Ok(None),
        Value::String(value) => Ok(non_blank(&value)),
        Value::Number(value) => Ok(Some(value.to_string())),
        _ => Err(IntakeError::Malformed(
            "userId must be a string".to_string(),
        )),
    }
}

pub(crate) async fn from_multipart(
    mut multipart: Multipart,
    max_file_bytes: usize,
) -> Result<AnalyzeRequest, IntakeError> {
    let mut request = AnalyzeRequest::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            FILE_FIELD => {
                let file_name = field
                    .file_name()
                    .and_then(non_blank)
                    .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
                let content_type = field
                    .content_type()
                    .and_then(non_blank)
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
                let bytes = field.bytes().await.map_err(multipart_error)?;
                if bytes.len() > max_file_bytes {
                    return Err(IntakeError::TooLarge);
                }
                if !bytes.is_empty() {
                    request.report = Some(ReportUpload {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            "userId" | "user_id" => {
                let text = field.text().await.map_err(multipart_error)?;
                request.user_id = non_blank(&text);
            }
            _ if HealthMetricsInput::is_metric(&name) => {
                let text = field.text().await.map_err(multipart_error)?;
                request
                    .metrics
                    .set_from_str(&name, &text)
                    .map_err(IntakeError::InvalidMetric)?;
            }
            _ => {
                tracing::debug!(event = "intake.field_ignored", field = %name);
            }
        }
    }
    Ok(request)
}

fn multipart_error(err: MultipartError) -> IntakeError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        IntakeError::TooLarge
    } else {
        IntakeError::Malformed(err.body_text())
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_body_yields_metrics_and_user() {
        let request = from_json(br#"{"blood_glucose": "105", "ldl": 170, "userId": "u-1"}"#)
            .expect("request");
        assert_eq!(request.metrics.blood_glucose, Some(105.0));
        assert_eq!(request.metrics.ldl, Some(170.0));
        assert_eq!(request.user_id.as_deref(), Some("u-1"));
        assert!(request.report.is_none());
    }

    #[test]
    fn snake_case_user_id_is_accepted() {
        let request = from_json(br#"{"user_id": "  u-2 "}"#).expect("request");
        assert_eq!(request.user_id.as_deref(), Some("u-2"));
        assert!(request.metrics.is_empty());
    }

    #[test]
    fn empty_body_means_no_metrics() {
        let request = from_json(b"  ").expect("request");
        assert!(request.metrics.is_empty());
        assert!(request.user_id.is_none());
    }

    #[test]
    fn wrong_metric_type_is_a_client_error() {
        let err = from_json(br#"{"systolic_bp": "very high"}"#).expect_err("invalid");
        assert!(matches!(err, IntakeError::InvalidMetric(_)));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn non_object_and_broken_json_are_malformed() {
        assert!(matches!(
            from_json(b"[130, 90]").expect_err("array"),
            IntakeError::Malformed(_)
        ));
        assert!(matches!(
            from_json(b"{\"ldl\": ").expect_err("truncated"),
            IntakeError::Malformed(_)
        ));
    }

    #[test]
    fn log_input_describes_report_without_bytes() {
        let request = AnalyzeRequest {
            metrics: HealthMetricsInput {
                hba1c: Some(6.0),
                ..Default::default()
            },
            user_id: None,
            report: Some(ReportUpload {
                file_name: "labs.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                bytes: Bytes::from_static(b"%PDF"),
            }),
        };
        let input = request.log_input();
        assert_eq!(input["metrics"]["hba1c"], 6.0);
        assert_eq!(input["report"]["file_name"], "labs.pdf");
        assert_eq!(input["report"]["size_bytes"], 4);
    }

    #[test]
    fn too_large_maps_to_413() {
        assert_eq!(IntakeError::TooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
