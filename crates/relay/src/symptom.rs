use health_protocol::SymptomCheckResponse;

pub(crate) const SUGGESTED_SPECIALIST: &str = "General Physician";
pub(crate) const DISCLAIMER: &str = "This is an AI-generated insight and not a medical diagnosis.";

// Simulated reply; there is no chatbot model behind this endpoint yet.
pub(crate) fn simulated_reply(symptoms: &str) -> SymptomCheckResponse {
    SymptomCheckResponse {
        success: true,
        reply: format!(
            "Based on your mention of \"{symptoms}\", it could be related to seasonal allergies or a common cold. However, please track if you develop a fever."
        ),
        recommendation: SUGGESTED_SPECIALIST.to_string(),
        disclaimer: DISCLAIMER.to_string(),
    }
}
