use serde::{Deserialize, Serialize};

pub mod envelope;
pub mod interaction;
pub mod metric;
pub mod symptom;

pub use envelope::{AnalysisResponse, FailureResponse};
pub use interaction::{InteractionKind, InteractionRecord};
pub use symptom::{SymptomCheckRequest, SymptomCheckResponse};

/// Lab and vital measurements submitted for one assessment.
///
/// Every field is optional; `None` means the value was not measured.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HealthMetricsInput {
    #[serde(default, with = "metric", skip_serializing_if = "Option::is_none")]
    pub blood_glucose: Option<f64>,
    #[serde(default, with = "metric", skip_serializing_if = "Option::is_none")]
    pub hba1c: Option<f64>,
    #[serde(default, with = "metric", skip_serializing_if = "Option::is_none")]
    pub systolic_bp: Option<f64>,
    #[serde(default, with = "metric", skip_serializing_if = "Option::is_none")]
    pub diastolic_bp: Option<f64>,
    #[serde(default, with = "metric", skip_serializing_if = "Option::is_none")]
    pub ldl: Option<f64>,
    #[serde(default, with = "metric", skip_serializing_if = "Option::is_none")]
    pub hdl: Option<f64>,
    #[serde(default, with = "metric", skip_serializing_if = "Option::is_none")]
    pub triglycerides: Option<f64>,
    #[serde(default, with = "metric", skip_serializing_if = "Option::is_none")]
    pub haemoglobin: Option<f64>,
    #[serde(default, with = "metric", skip_serializing_if = "Option::is_none")]
    pub mcv: Option<f64>,
}

impl HealthMetricsInput {
    pub const FIELDS: [&'static str; 9] = [
        "blood_glucose",
        "hba1c",
        "systolic_bp",
        "diastolic_bp",
        "ldl",
        "hdl",
        "triglycerides",
        "haemoglobin",
        "mcv",
    ];

    fn slot_mut(&mut self, name: &str) -> Option<&mut Option<f64>> {
        let slot = match name {
            "blood_glucose" => &mut self.blood_glucose,
            "hba1c" => &mut self.hba1c,
            "systolic_bp" => &mut self.systolic_bp,
            "diastolic_bp" => &mut self.diastolic_bp,
            "ldl" => &mut self.ldl,
            "hdl" => &mut self.hdl,
            "triglycerides" => &mut self.triglycerides,
            "haemoglobin" => &mut self.haemoglobin,
            "mcv" => &mut self.mcv,
            _ => return None,
        };
        Some(slot)
    }

    pub fn is_metric(name: &str) -> bool {
        Self::FIELDS.contains(&name)
    }

    /// Parses `raw` with the same coercion rules as the JSON body and stores
    /// it under `name`. Returns `Ok(false)` when `name` is not a metric.
    pub fn set_from_str(&mut self, name: &str, raw: &str) -> Result<bool, String> {
        let Some(slot) = self.slot_mut(name) else {
            return Ok(false);
        };
        *slot = metric::parse_metric(raw).map_err(|err| format!("{name}: {err}"))?;
        Ok(true)
    }

    pub fn is_empty(&self) -> bool {
        self.measured_count() == 0
    }

    pub fn measured_count(&self) -> usize {
        [
            self.blood_glucose,
            self.hba1c,
            self.systolic_bp,
            self.diastolic_bp,
            self.ldl,
            self.hdl,
            self.triglycerides,
            self.haemoglobin,
            self.mcv,
        ]
        .iter()
        .filter(|value| value.is_some())
        .count()
    }
}

/// Aggregate risk classification. Variants are ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    /// Raises the level to at least `level`. Never lowers it.
    pub fn escalate_to(&mut self, level: RiskLevel) {
        if level > *self {
            *self = level;
        }
    }

    /// Raises the level to `level` only while it is still `Low`.
    pub fn raise_from_low(&mut self, level: RiskLevel) {
        if *self == RiskLevel::Low {
            self.escalate_to(level);
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub insights: Vec<String>,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_accept_numbers_and_numeric_strings() {
        let input: HealthMetricsInput = serde_json::from_str(
            r#"{"blood_glucose": 130, "hba1c": "6.1", "ldl": " 99.5 ", "hdl": null, "mcv": ""}"#,
        )
        .expect("deserialize");
        assert_eq!(input.blood_glucose, Some(130.0));
        assert_eq!(input.hba1c, Some(6.1));
        assert_eq!(input.ldl, Some(99.5));
        assert_eq!(input.hdl, None);
        assert_eq!(input.mcv, None);
        assert_eq!(input.systolic_bp, None);
        assert_eq!(input.measured_count(), 3);
    }

    #[test]
    fn metrics_reject_non_numeric_values() {
        let err = serde_json::from_str::<HealthMetricsInput>(r#"{"ldl": "high"}"#)
            .expect_err("non-numeric string");
        assert!(err.to_string().contains("ldl") || err.to_string().contains("number"));
        assert!(serde_json::from_str::<HealthMetricsInput>(r#"{"ldl": true}"#).is_err());
        assert!(serde_json::from_str::<HealthMetricsInput>(r#"{"ldl": [1]}"#).is_err());
    }

    #[test]
    fn metrics_ignore_unknown_keys() {
        let input: HealthMetricsInput =
            serde_json::from_str(r#"{"ldl": 170, "notes": "fasting"}"#).expect("deserialize");
        assert_eq!(input.ldl, Some(170.0));
        assert_eq!(input.measured_count(), 1);
    }

    #[test]
    fn absent_metrics_are_not_serialized() {
        let input = HealthMetricsInput {
            ldl: Some(200.0),
            ..Default::default()
        };
        let value = serde_json::to_value(&input).expect("serialize");
        assert_eq!(value, serde_json::json!({ "ldl": 200.0 }));
    }

    #[test]
    fn set_from_str_reports_unknown_fields() {
        let mut input = HealthMetricsInput::default();
        assert!(input.set_from_str("systolic_bp", "142").expect("metric"));
        assert!(!input.set_from_str("userId", "abc").expect("not a metric"));
        assert!(input.set_from_str("diastolic_bp", "ninety").is_err());
        assert_eq!(input.systolic_bp, Some(142.0));
    }

    #[test]
    fn risk_level_only_moves_up() {
        let mut level = RiskLevel::Low;
        level.raise_from_low(RiskLevel::Moderate);
        assert_eq!(level, RiskLevel::Moderate);
        level.escalate_to(RiskLevel::High);
        level.escalate_to(RiskLevel::Moderate);
        level.raise_from_low(RiskLevel::Moderate);
        assert_eq!(level, RiskLevel::High);
    }

    #[test]
    fn assessment_uses_camel_case_keys() {
        let assessment = RiskAssessment {
            risk_level: RiskLevel::Moderate,
            insights: vec!["LDL cholesterol is elevated.".to_string()],
            timestamp: "2026-01-01T00:00:00.000Z".to_string(),
        };
        let value = serde_json::to_value(&assessment).expect("serialize");
        assert_eq!(value["riskLevel"], "Moderate");
        assert_eq!(value["insights"][0], "LDL cholesterol is elevated.");
        assert!(value.get("risk_level").is_none());
    }
}
