use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DomainResult;
use crate::events::{
    Alert, AnomalyScores, EnrichedTelemetry, NormalizedTelemetry, OverallRiskScore, RawTelemetry,
    ScoredTelemetry,
};
use crate::measurement::Vitals;
use crate::registry::{Device, Patient, ThresholdProfile};

/// Publishes raw telemetry to the `telemetry_raw` topic, keyed by device.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RawTelemetryProducer: Send + Sync {
    async fn publish(&self, event: &RawTelemetry) -> DomainResult<()>;
}

/// Publishes normalized telemetry to the `telemetry_normalized` topic.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NormalizedTelemetryProducer: Send + Sync {
    async fn publish(&self, event: &NormalizedTelemetry) -> DomainResult<()>;
}

/// Publishes enriched telemetry to the `telemetry_enriched` topic.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EnrichedTelemetryProducer: Send + Sync {
    async fn publish(&self, event: &EnrichedTelemetry) -> DomainResult<()>;
}

/// Publishes scored telemetry to the `telemetry_scored` topic.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ScoredTelemetryProducer: Send + Sync {
    async fn publish(&self, event: &ScoredTelemetry) -> DomainResult<()>;
}

/// Publishes alerts to the `alerts` topic.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AlertProducer: Send + Sync {
    async fn publish(&self, alert: &Alert) -> DomainResult<()>;
}

/// Read-side registry lookups.
///
/// `Ok(None)` means the entity does not exist; `Err` means the registry could
/// not answer. Callers decide per stage whether an error degrades (gateway
/// fails open, enricher emits orphans) or propagates.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RegistryReader: Send + Sync {
    async fn get_device(&self, device_id: &str) -> DomainResult<Option<Device>>;

    async fn get_patient(&self, patient_id: &str) -> DomainResult<Option<Patient>>;

    /// Device-specific profiles shadow the patient default; the fallback is
    /// resolved by the implementation, so one call answers both cases.
    async fn get_threshold_profile(
        &self,
        patient_id: &str,
        device_id: Option<String>,
    ) -> DomainResult<Option<ThresholdProfile>>;
}

/// Scoring request carrying the enrichment context the scorer may use.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreVitalsRequest {
    pub patient_id: String,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub vitals: Vitals,
    pub thresholds: Option<ThresholdProfile>,
    /// Lineage id of the enriched event, used by the scorer's optional
    /// duplicate-submission suppression.
    pub source_event_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreVitalsOutcome {
    pub anomaly_scores: AnomalyScores,
    pub overall_risk_score: OverallRiskScore,
    pub scoring_engine: String,
    pub scoring_engine_version: String,
}

/// Anomaly scoring over per-patient rolling baselines.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait VitalsScorer: Send + Sync {
    async fn score_vitals(&self, request: ScoreVitalsRequest) -> DomainResult<ScoreVitalsOutcome>;
}
