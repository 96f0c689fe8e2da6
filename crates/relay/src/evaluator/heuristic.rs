use std::time::SystemTime;

use anyhow::Context;
use async_trait::async_trait;
use health_protocol::{HealthMetricsInput, RiskAssessment, RiskLevel};
use serde_json::Value;

use super::{Evaluator, ReportUpload};

const DIABETES_INSIGHT: &str = "Blood glucose/HbA1c levels suggest potential diabetes risk. Consult a physician for a formal diagnosis.";
const PREDIABETES_INSIGHT: &str =
    "Blood glucose/HbA1c levels suggest prediabetes. Consider dietary adjustments.";
const HYPERTENSION_INSIGHT: &str =
    "Blood pressure is currently in the hypertensive range. Please monitor closely.";
const CHOLESTEROL_INSIGHT: &str =
    "LDL cholesterol is elevated, which can increase cardiovascular risk.";
const NORMAL_INSIGHT: &str =
    "All provided metrics appear to be within normal ranges. Keep up the good work!";

/// Fixed-threshold scoring without any external call.
pub(crate) struct HeuristicEvaluator;

#[async_trait]
impl Evaluator for HeuristicEvaluator {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn evaluate_metrics(&self, metrics: &HealthMetricsInput) -> anyhow::Result<Value> {
        let assessment = assess(metrics, SystemTime::now());
        serde_json::to_value(&assessment).context("failed to encode risk assessment")
    }

    async fn evaluate_report(&self, report: ReportUpload) -> anyhow::Result<Value> {
        anyhow::bail!(
            "report {} ({} bytes) needs a model service; none is configured",
            report.file_name,
            report.bytes.len()
        )
    }
}

/// Applies the rules in order. Each rule may only raise the level and adds
/// one insight when it fires; absent metrics never fire a rule.
pub(crate) fn assess(metrics: &HealthMetricsInput, at: SystemTime) -> RiskAssessment {
    let mut level = RiskLevel::Low;
    let mut insights = Vec::new();

    if above(metrics.blood_glucose, 125.0) || above(metrics.hba1c, 6.4) {
        level.escalate_to(RiskLevel::High);
        insights.push(DIABETES_INSIGHT.to_string());
    } else if at_least(metrics.blood_glucose, 100.0) || at_least(metrics.hba1c, 5.7) {
        level.raise_from_low(RiskLevel::Moderate);
        insights.push(PREDIABETES_INSIGHT.to_string());
    }

    if at_least(metrics.systolic_bp, 140.0) || at_least(metrics.diastolic_bp, 90.0) {
        level.escalate_to(RiskLevel::High);
        insights.push(HYPERTENSION_INSIGHT.to_string());
    }

    if above(metrics.ldl, 160.0) {
        level.raise_from_low(RiskLevel::Moderate);
        insights.push(CHOLESTEROL_INSIGHT.to_string());
    }

    if insights.is_empty() {
        insights.push(NORMAL_INSIGHT.to_string());
    }

    RiskAssessment {
        risk_level: level,
        insights,
        timestamp: humantime::format_rfc3339_millis(at).to_string(),
    }
}

fn above(value: Option<f64>, threshold: f64) -> bool {
    value.is_some_and(|value| value > threshold)
}

fn at_least(value: Option<f64>, threshold: f64) -> bool {
    value.is_some_and(|value| value >= threshold)
}
