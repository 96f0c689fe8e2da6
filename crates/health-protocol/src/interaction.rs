use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    HealthAnalysis,
    SymptomCheck,
}

/// One row of the interaction log kept by the persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionRecord {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    pub input: Value,
    pub output: Value,
}

impl InteractionRecord {
    pub fn new(user_id: impl Into<String>, kind: InteractionKind, input: Value, output: Value) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            input,
            output,
        }
    }
}
