use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const METRICS_ANALYZED_MESSAGE: &str = "Health metrics successfully analyzed by MedIQ Model.";
pub const REPORT_ANALYZED_MESSAGE: &str = "Health report successfully analyzed by MedIQ Model.";

/// Success envelope. `analysis` is either a local `RiskAssessment` or the
/// model service's body, relayed unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResponse {
    pub success: bool,
    pub analysis: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AnalysisResponse {
    pub fn ok(analysis: Value, message: impl Into<String>) -> Self {
        Self {
            success: true,
            analysis,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureResponse {
    pub success: bool,
    pub error: String,
}

impl FailureResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}
