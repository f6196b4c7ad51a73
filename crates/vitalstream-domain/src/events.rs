use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::envelope::{iso_millis, EventEnvelope};
use crate::measurement::{Measurement, Vitals};
use crate::registry::{Sex, ThresholdProfile};
use crate::severity::{AnomalySeverity, Severity};

/// Raw device telemetry as published by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTelemetry {
    #[serde(flatten)]
    pub envelope: EventEnvelope,
    pub device_id: String,
    pub measurements: Vec<Measurement>,
    /// Device-reported capture time, passed through verbatim; the normalizer
    /// is responsible for coercing it into a canonical instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Clamped,
    TimestampSubstituted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationMetadata {
    #[serde(with = "iso_millis")]
    pub normalized_at: DateTime<Utc>,
    pub rules_version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTelemetry {
    #[serde(flatten)]
    pub envelope: EventEnvelope,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    pub vitals: Vitals,
    pub validation_status: ValidationStatus,
    pub normalization_metadata: NormalizationMetadata,
}

/// Demographics attached by the enricher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub age: u32,
    pub sex: Sex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentMetadata {
    #[serde(with = "iso_millis")]
    pub enriched_at: DateTime<Utc>,
    /// Which registry lookups contributed: `device`, `patient`, `thresholds`,
    /// or the single entry `none` when the registry contributed nothing.
    pub enrichment_sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTelemetry {
    #[serde(flatten)]
    pub envelope: EventEnvelope,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    /// True when no patient could be resolved for the device. Orphans carry
    /// no profile or thresholds and never produce alerts.
    #[serde(default)]
    pub orphan: bool,
    pub vitals: Vitals,
    pub validation_status: ValidationStatus,
    #[serde(rename = "patientProfile", default, skip_serializing_if = "Option::is_none")]
    pub patient_profile: Option<PatientProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<ThresholdProfile>,
    pub enrichment_metadata: EnrichmentMetadata,
}

/// Anomaly score for a single vital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalScore {
    pub score: f64,
    pub severity: AnomalySeverity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyScores {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<VitalScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oxygen_saturation: Option<VitalScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<VitalScore>,
}

impl AnomalyScores {
    pub fn is_empty(&self) -> bool {
        self.heart_rate.is_none() && self.oxygen_saturation.is_none() && self.temperature.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallRiskScore {
    pub score: f64,
    pub severity: AnomalySeverity,
    pub aggregation_method: String,
}

impl OverallRiskScore {
    /// Neutral risk used when scoring was skipped or degraded.
    pub fn zero(aggregation_method: &str) -> Self {
        Self {
            score: 0.0,
            severity: AnomalySeverity::Normal,
            aggregation_method: aggregation_method.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringMetadata {
    #[serde(with = "iso_millis")]
    pub scored_at: DateTime<Utc>,
    pub scoring_engine: String,
    pub scoring_engine_version: String,
    /// Set when the scorer was unreachable and zero scores were substituted.
    #[serde(default)]
    pub anomaly_degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTelemetry {
    #[serde(flatten)]
    pub envelope: EventEnvelope,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub orphan: bool,
    pub vitals: Vitals,
    pub validation_status: ValidationStatus,
    #[serde(rename = "patientProfile", default, skip_serializing_if = "Option::is_none")]
    pub patient_profile: Option<PatientProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<ThresholdProfile>,
    pub anomaly_scores: AnomalyScores,
    pub overall_risk_score: OverallRiskScore,
    pub severity: Severity,
    #[serde(rename = "rulesTriggered", default)]
    pub rules_triggered: Vec<String>,
    pub scoring_metadata: ScoringMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    VitalSignAnomaly,
    MultiVitalAnomaly,
    CriticalCondition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertCondition {
    pub description: String,
    pub vital_sign: String,
    pub anomaly_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDetails {
    pub metrics: Vitals,
    #[serde(rename = "rulesTriggered")]
    pub rules_triggered: Vec<String>,
    #[serde(rename = "anomalyScore")]
    pub anomaly_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMetadata {
    pub raised_by: String,
    pub rule_version: String,
    pub acknowledged: bool,
    pub resolved: bool,
}

/// An alert raised for a lineage whose scored severity exceeded `ok`.
/// `alert_id` is distinct from the envelope's `event_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(flatten)]
    pub envelope: EventEnvelope,
    pub alert_id: String,
    pub patient_id: String,
    pub device_id: String,
    pub severity: Severity,
    pub alert_type: AlertType,
    pub condition: AlertCondition,
    pub details: AlertDetails,
    pub alert_metadata: AlertMetadata,
}
