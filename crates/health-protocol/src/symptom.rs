use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SymptomCheckRequest {
    #[serde(default)]
    pub symptoms: Option<String>,
    #[serde(default, alias = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SymptomCheckResponse {
    pub success: bool,
    pub reply: String,
    pub recommendation: String,
    pub disclaimer: String,
}
