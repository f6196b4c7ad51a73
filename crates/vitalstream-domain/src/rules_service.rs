use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::envelope::{new_alert_id, EventEnvelope, EventType};
use crate::error::DomainResult;
use crate::events::{
    Alert, AlertCondition, AlertDetails, AlertMetadata, AlertType, AnomalyScores, EnrichedTelemetry,
    OverallRiskScore, ScoredTelemetry, ScoringMetadata,
};
use crate::repository::{
    AlertProducer, ScoreVitalsOutcome, ScoreVitalsRequest, ScoredTelemetryProducer, VitalsScorer,
};
use crate::rules::{evaluate_rules, RuleConstants, RuleResult};
use crate::severity::Severity;

pub const RULE_VERSION: &str = "1.0.0";
const DEGRADED_ENGINE: &str = "rules-engine-fallback";

/// Fuses threshold rules with anomaly scores and emits scored telemetry plus,
/// for severities above `ok`, an alert.
///
/// Both publishes are attempted for a single input; any failure propagates so
/// the consumer naks the input and the broker redelivers it. Downstream
/// consumers dedupe on `source_event_id`.
pub struct RulesService {
    scorer: Arc<dyn VitalsScorer>,
    scored_producer: Arc<dyn ScoredTelemetryProducer>,
    alert_producer: Arc<dyn AlertProducer>,
    constants: RuleConstants,
}

impl RulesService {
    pub fn new(
        scorer: Arc<dyn VitalsScorer>,
        scored_producer: Arc<dyn ScoredTelemetryProducer>,
        alert_producer: Arc<dyn AlertProducer>,
        constants: RuleConstants,
    ) -> Self {
        Self {
            scorer,
            scored_producer,
            alert_producer,
            constants,
        }
    }

    pub async fn process(&self, input: EnrichedTelemetry) -> DomainResult<ScoredTelemetry> {
        let (outcome, degraded) = self.acquire_scores(&input).await;

        let triggered = match (&input.thresholds, input.orphan) {
            (Some(profile), false) => evaluate_rules(&input.vitals, profile, &self.constants),
            _ => Vec::new(),
        };

        let rule_severity = triggered
            .iter()
            .map(|r| r.severity)
            .max()
            .unwrap_or(Severity::Ok);
        let anomaly_severity = Severity::from(outcome.overall_risk_score.severity);
        let severity = rule_severity.max(anomaly_severity);

        debug!(
            event_id = %input.envelope.event_id,
            rules_triggered = triggered.len(),
            severity = severity.as_str(),
            "Evaluated rules"
        );

        let scored = ScoredTelemetry {
            envelope: EventEnvelope::derived(EventType::TelemetryScored, &input.envelope),
            device_id: input.device_id.clone(),
            patient_id: input.patient_id.clone(),
            orphan: input.orphan,
            vitals: input.vitals.clone(),
            validation_status: input.validation_status,
            patient_profile: input.patient_profile.clone(),
            thresholds: input.thresholds.clone(),
            anomaly_scores: outcome.anomaly_scores,
            overall_risk_score: outcome.overall_risk_score,
            severity,
            rules_triggered: triggered.iter().map(|r| r.rule_id.to_string()).collect(),
            scoring_metadata: ScoringMetadata {
                scored_at: Utc::now(),
                scoring_engine: outcome.scoring_engine,
                scoring_engine_version: outcome.scoring_engine_version,
                anomaly_degraded: degraded,
            },
        };

        self.scored_producer.publish(&scored).await?;

        info!(
            event_id = %scored.envelope.event_id,
            trace_id = %scored.envelope.trace_id,
            severity = severity.as_str(),
            "Produced scored telemetry"
        );

        if severity > Severity::Ok {
            if let Some(patient_id) = scored.patient_id.as_deref() {
                let alert = self.build_alert(&input, &scored, patient_id, &triggered);
                self.alert_producer.publish(&alert).await?;
                warn!(
                    alert_id = %alert.alert_id,
                    trace_id = %alert.envelope.trace_id,
                    severity = severity.as_str(),
                    patient_id = %patient_id,
                    "Raised alert"
                );
            }
        }

        Ok(scored)
    }

    async fn acquire_scores(&self, input: &EnrichedTelemetry) -> (ScoreVitalsOutcome, bool) {
        let patient_id = match (&input.patient_id, input.orphan, input.vitals.is_empty()) {
            (Some(patient_id), false, false) => patient_id.clone(),
            _ => {
                // Orphans and empty events are not scored.
                return (
                    ScoreVitalsOutcome {
                        anomaly_scores: AnomalyScores::default(),
                        overall_risk_score: OverallRiskScore::zero("skipped"),
                        scoring_engine: DEGRADED_ENGINE.to_string(),
                        scoring_engine_version: RULE_VERSION.to_string(),
                    },
                    false,
                );
            }
        };

        let request = ScoreVitalsRequest {
            patient_id,
            device_id: input.device_id.clone(),
            timestamp: input.envelope.timestamp,
            vitals: input.vitals.clone(),
            thresholds: input.thresholds.clone(),
            source_event_id: Some(input.envelope.event_id.clone()),
        };

        match self.scorer.score_vitals(request).await {
            Ok(outcome) => (outcome, false),
            Err(e) => {
                warn!(
                    event_id = %input.envelope.event_id,
                    error = %e,
                    "Anomaly scoring unavailable, proceeding with zero scores"
                );
                (
                    ScoreVitalsOutcome {
                        anomaly_scores: AnomalyScores::default(),
                        overall_risk_score: OverallRiskScore::zero("default"),
                        scoring_engine: DEGRADED_ENGINE.to_string(),
                        scoring_engine_version: RULE_VERSION.to_string(),
                    },
                    true,
                )
            }
        }
    }

    fn build_alert(
        &self,
        input: &EnrichedTelemetry,
        scored: &ScoredTelemetry,
        patient_id: &str,
        triggered: &[RuleResult],
    ) -> Alert {
        let alert_type = if triggered.len() > 1 {
            AlertType::MultiVitalAnomaly
        } else if triggered.iter().any(|r| r.rule_id.contains("combined")) {
            AlertType::CriticalCondition
        } else {
            AlertType::VitalSignAnomaly
        };

        let anomaly_score = scored.overall_risk_score.score;
        let condition = match triggered.first() {
            Some(first) => AlertCondition {
                description: triggered
                    .iter()
                    .map(|r| r.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
                vital_sign: if triggered.len() > 1 {
                    "multiple".to_string()
                } else {
                    first.metric.to_string()
                },
                anomaly_score,
            },
            None => AlertCondition {
                description: format!(
                    "Anomaly risk score {:.2} exceeds baseline expectations",
                    anomaly_score
                ),
                vital_sign: "multiple".to_string(),
                anomaly_score,
            },
        };

        Alert {
            envelope: EventEnvelope::derived(EventType::AlertRaised, &scored.envelope),
            alert_id: new_alert_id(),
            patient_id: patient_id.to_string(),
            device_id: input.device_id.clone(),
            severity: scored.severity,
            alert_type,
            condition,
            details: AlertDetails {
                metrics: input.vitals.clone(),
                rules_triggered: scored.rules_triggered.clone(),
                anomaly_score,
            },
            alert_metadata: AlertMetadata {
                raised_by: "rules-engine".to_string(),
                rule_version: RULE_VERSION.to_string(),
                acknowledged: false,
                resolved: false,
            },
        }
    }
}
