//! Full-pipeline flow tests: ingestion -> normalizer -> enricher -> rules,
//! chained through in-memory producers the way the workers chain topics.

use std::sync::Arc;

use vitalstream_domain::{
    ClampBounds, DomainError, EnricherService, IngestionService, MeasurementsInput, Measurement,
    NormalizerService, RuleConstants, RulesService, Severity, ValidationStatus, VitalUnit,
};

mod mocks {
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use vitalstream_domain::error::{DomainError, DomainResult};
    use vitalstream_domain::events::{
        Alert, AnomalyScores, EnrichedTelemetry, NormalizedTelemetry, OverallRiskScore,
        RawTelemetry, ScoredTelemetry, VitalScore,
    };
    use vitalstream_domain::registry::{Device, Patient, ThresholdProfile};
    use vitalstream_domain::repository::{
        AlertProducer, EnrichedTelemetryProducer, NormalizedTelemetryProducer,
        RawTelemetryProducer, RegistryReader, ScoreVitalsOutcome, ScoreVitalsRequest,
        ScoredTelemetryProducer, VitalsScorer,
    };
    use vitalstream_domain::severity::AnomalySeverity;

    /// Registry fixture with optional full-outage mode.
    pub struct InMemoryRegistry {
        pub devices: HashMap<String, Device>,
        pub patients: HashMap<String, Patient>,
        pub profiles: Vec<ThresholdProfile>,
        pub unavailable: bool,
    }

    impl InMemoryRegistry {
        pub fn empty() -> Self {
            Self {
                devices: HashMap::new(),
                patients: HashMap::new(),
                profiles: Vec::new(),
                unavailable: false,
            }
        }
    }

    #[async_trait]
    impl RegistryReader for InMemoryRegistry {
        async fn get_device(&self, device_id: &str) -> DomainResult<Option<Device>> {
            if self.unavailable {
                return Err(DomainError::RegistryUnavailable("outage".into()));
            }
            Ok(self.devices.get(device_id).cloned())
        }

        async fn get_patient(&self, patient_id: &str) -> DomainResult<Option<Patient>> {
            if self.unavailable {
                return Err(DomainError::RegistryUnavailable("outage".into()));
            }
            Ok(self.patients.get(patient_id).cloned())
        }

        async fn get_threshold_profile(
            &self,
            patient_id: &str,
            _device_id: Option<String>,
        ) -> DomainResult<Option<ThresholdProfile>> {
            if self.unavailable {
                return Err(DomainError::RegistryUnavailable("outage".into()));
            }
            Ok(self
                .profiles
                .iter()
                .find(|p| p.patient_id == patient_id)
                .cloned())
        }
    }

    /// Capturing producer, one per topic, standing in for the broker.
    pub struct Capture<T> {
        events: Arc<Mutex<Vec<T>>>,
    }

    impl<T: Clone> Capture<T> {
        pub fn new() -> Self {
            Self {
                events: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn published(&self) -> Vec<T> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: &T) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    macro_rules! capture_producer {
        ($trait_name:ident, $event:ty) => {
            #[async_trait]
            impl $trait_name for Capture<$event> {
                async fn publish(&self, event: &$event) -> DomainResult<()> {
                    self.push(event);
                    Ok(())
                }
            }
        };
    }

    capture_producer!(RawTelemetryProducer, RawTelemetry);
    capture_producer!(NormalizedTelemetryProducer, NormalizedTelemetry);
    capture_producer!(EnrichedTelemetryProducer, EnrichedTelemetry);
    capture_producer!(ScoredTelemetryProducer, ScoredTelemetry);
    capture_producer!(AlertProducer, Alert);

    /// Scorer returning a calm, insufficient-baseline style outcome.
    pub struct CalmScorer;

    #[async_trait]
    impl VitalsScorer for CalmScorer {
        async fn score_vitals(
            &self,
            request: ScoreVitalsRequest,
        ) -> DomainResult<ScoreVitalsOutcome> {
            let calm = VitalScore {
                score: 0.2,
                severity: AnomalySeverity::Normal,
                explanation: None,
            };
            Ok(ScoreVitalsOutcome {
                anomaly_scores: AnomalyScores {
                    heart_rate: request.vitals.heart_rate.as_ref().map(|_| calm.clone()),
                    oxygen_saturation: request
                        .vitals
                        .oxygen_saturation
                        .as_ref()
                        .map(|_| calm.clone()),
                    temperature: request.vitals.temperature.as_ref().map(|_| calm.clone()),
                },
                overall_risk_score: OverallRiskScore {
                    score: 0.2,
                    severity: AnomalySeverity::Normal,
                    aggregation_method: "z_score_based".to_string(),
                },
                scoring_engine: "z_score_baseline".to_string(),
                scoring_engine_version: "1.0.0".to_string(),
            })
        }
    }
}

use mocks::{CalmScorer, Capture, InMemoryRegistry};
use vitalstream_domain::events::{
    Alert, EnrichedTelemetry, NormalizedTelemetry, RawTelemetry, ScoredTelemetry,
};
use vitalstream_domain::registry::{
    BloodPressureRange, Device, DeviceStatus, Patient, Sex, ThresholdProfile, VitalRange,
};

struct Pipeline {
    ingestion: IngestionService,
    normalizer: NormalizerService,
    enricher: EnricherService,
    rules: RulesService,
    raw: Arc<Capture<RawTelemetry>>,
    normalized: Arc<Capture<NormalizedTelemetry>>,
    enriched: Arc<Capture<EnrichedTelemetry>>,
    scored: Arc<Capture<ScoredTelemetry>>,
    alerts: Arc<Capture<Alert>>,
}

fn seeded_registry() -> InMemoryRegistry {
    let mut registry = InMemoryRegistry::empty();
    registry.devices.insert(
        "D1".to_string(),
        Device {
            device_id: "D1".to_string(),
            device_type: "wearable_monitor".to_string(),
            patient_id: Some("P1".to_string()),
            status: DeviceStatus::Active,
            metadata: Default::default(),
        },
    );
    registry.patients.insert(
        "P1".to_string(),
        Patient {
            patient_id: "P1".to_string(),
            age: 45,
            sex: Sex::Male,
            medical_conditions: Vec::new(),
            medications: Vec::new(),
            allergies: Vec::new(),
        },
    );
    registry.profiles.push(ThresholdProfile {
        patient_id: "P1".to_string(),
        device_id: None,
        heart_rate: VitalRange::new(60.0, 100.0),
        blood_pressure: BloodPressureRange {
            systolic: VitalRange::new(90.0, 140.0),
            diastolic: VitalRange::new(60.0, 90.0),
        },
        temperature: VitalRange::new(36.0, 37.5),
        oxygen_saturation: VitalRange::new(95.0, 100.0),
        respiratory_rate: VitalRange::new(12.0, 20.0),
    });
    registry
}

fn pipeline(registry: InMemoryRegistry) -> Pipeline {
    let registry = Arc::new(registry);
    let raw: Arc<Capture<RawTelemetry>> = Arc::new(Capture::new());
    let normalized: Arc<Capture<NormalizedTelemetry>> = Arc::new(Capture::new());
    let enriched: Arc<Capture<EnrichedTelemetry>> = Arc::new(Capture::new());
    let scored: Arc<Capture<ScoredTelemetry>> = Arc::new(Capture::new());
    let alerts: Arc<Capture<Alert>> = Arc::new(Capture::new());

    Pipeline {
        ingestion: IngestionService::new(registry.clone(), raw.clone(), false),
        normalizer: NormalizerService::new(normalized.clone(), ClampBounds::default()),
        enricher: EnricherService::new(registry, enriched.clone()),
        rules: RulesService::new(
            Arc::new(CalmScorer),
            scored.clone(),
            alerts.clone(),
            RuleConstants::default(),
        ),
        raw,
        normalized,
        enriched,
        scored,
        alerts,
    }
}

fn submission(device_id: &str, hr: f64, spo2: f64, temp_f: f64) -> MeasurementsInput {
    MeasurementsInput {
        device_id: device_id.to_string(),
        device_type: None,
        timestamp: Some("2024-01-15T10:30:00.000Z".to_string()),
        measurements: vec![
            Measurement {
                metric: "hr".to_string(),
                value: hr,
                unit: "bpm".to_string(),
            },
            Measurement {
                metric: "spo2".to_string(),
                value: spo2,
                unit: "percent".to_string(),
            },
            Measurement {
                metric: "temp".to_string(),
                value: temp_f,
                unit: "fahrenheit".to_string(),
            },
        ],
        metadata: None,
    }
}

async fn run_lineage(pipeline: &Pipeline, input: MeasurementsInput) -> ScoredTelemetry {
    let raw = pipeline.ingestion.ingest(input).await.unwrap();
    let normalized = pipeline.normalizer.process(raw).await.unwrap();
    let enriched = pipeline.enricher.process(normalized).await.unwrap();
    pipeline.rules.process(enriched).await.unwrap()
}

#[tokio::test]
async fn happy_path_flows_clean_through_all_stages() {
    let p = pipeline(seeded_registry());
    let scored = run_lineage(&p, submission("D1", 72.0, 98.0, 98.6)).await;

    assert_eq!(scored.severity, Severity::Ok);
    assert!(scored.overall_risk_score.score <= 0.5);
    assert!(p.alerts.published().is_empty());

    let normalized = p.normalized.published().remove(0);
    assert_eq!(normalized.validation_status, ValidationStatus::Valid);
    let temp = normalized.vitals.temperature.as_ref().unwrap();
    assert_eq!(temp.unit, VitalUnit::Fahrenheit);
    assert_eq!(temp.value, 98.6);

    let enriched = p.enriched.published().remove(0);
    assert!(!enriched.orphan);
    assert_eq!(enriched.patient_profile.as_ref().unwrap().age, 45);
    assert!(enriched.thresholds.is_some());
}

#[tokio::test]
async fn trace_id_and_source_linkage_hold_across_the_lineage() {
    let p = pipeline(seeded_registry());
    run_lineage(&p, submission("D1", 130.0, 88.0, 98.6)).await;

    let raw = p.raw.published().remove(0);
    let normalized = p.normalized.published().remove(0);
    let enriched = p.enriched.published().remove(0);
    let scored = p.scored.published().remove(0);
    let alert = p.alerts.published().remove(0);

    // One trace id across the whole lineage.
    let trace = &raw.envelope.trace_id;
    for other in [
        &normalized.envelope.trace_id,
        &enriched.envelope.trace_id,
        &scored.envelope.trace_id,
        &alert.envelope.trace_id,
    ] {
        assert_eq!(other, trace);
    }

    // Each output points at the event that produced it.
    assert!(raw.envelope.source_event_id.is_none());
    assert_eq!(
        normalized.envelope.source_event_id.as_deref(),
        Some(raw.envelope.event_id.as_str())
    );
    assert_eq!(
        enriched.envelope.source_event_id.as_deref(),
        Some(normalized.envelope.event_id.as_str())
    );
    assert_eq!(
        scored.envelope.source_event_id.as_deref(),
        Some(enriched.envelope.event_id.as_str())
    );
    assert_eq!(
        alert.envelope.source_event_id.as_deref(),
        Some(scored.envelope.event_id.as_str())
    );
}

#[tokio::test]
async fn threshold_breach_raises_a_critical_alert() {
    let p = pipeline(seeded_registry());
    let scored = run_lineage(&p, submission("D1", 130.0, 88.0, 98.6)).await;

    assert_eq!(scored.severity, Severity::Critical);
    for rule in ["hr_max_exceeded", "spo2_min_below", "hr_high_spo2_low_combined"] {
        assert!(scored.rules_triggered.contains(&rule.to_string()), "missing {rule}");
    }

    let alerts = p.alerts.published();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Critical);
    assert_ne!(alerts[0].alert_id, alerts[0].envelope.event_id);
}

#[tokio::test]
async fn unknown_device_becomes_orphan_and_never_alerts() {
    let p = pipeline(seeded_registry());
    let scored = run_lineage(&p, submission("D_new", 130.0, 88.0, 98.6)).await;

    let enriched = p.enriched.published().remove(0);
    assert!(enriched.orphan);
    assert!(enriched.patient_profile.is_none());
    assert!(enriched.thresholds.is_none());

    // Orphans skip threshold rules and scoring entirely.
    assert_eq!(scored.severity, Severity::Ok);
    assert!(scored.rules_triggered.is_empty());
    assert!(p.alerts.published().is_empty());
}

#[tokio::test]
async fn registry_outage_degrades_to_orphans_without_stalling() {
    let mut registry = seeded_registry();
    registry.unavailable = true;

    let p = pipeline(registry);
    let scored = run_lineage(&p, submission("D1", 72.0, 98.0, 98.6)).await;

    let enriched = p.enriched.published().remove(0);
    assert!(enriched.orphan);
    assert_eq!(
        enriched.enrichment_metadata.enrichment_sources,
        vec!["none".to_string()]
    );
    assert_eq!(scored.severity, Severity::Ok);
    assert!(p.alerts.published().is_empty());
}

#[tokio::test]
async fn out_of_range_heart_rate_is_clamped() {
    let p = pipeline(seeded_registry());
    run_lineage(&p, submission("D1", 500.0, 98.0, 98.6)).await;

    let normalized = p.normalized.published().remove(0);
    assert_eq!(normalized.validation_status, ValidationStatus::Clamped);
    assert_eq!(normalized.vitals.heart_rate.as_ref().unwrap().value, 240.0);
}

#[tokio::test]
async fn duplicate_raw_delivery_produces_distinct_events_with_shared_source() {
    let p = pipeline(seeded_registry());

    let raw = p
        .ingestion
        .ingest(submission("D1", 72.0, 98.0, 98.6))
        .await
        .unwrap();

    // The broker redelivers the same raw event twice.
    p.normalizer.process(raw.clone()).await.unwrap();
    p.normalizer.process(raw.clone()).await.unwrap();

    let normalized = p.normalized.published();
    assert_eq!(normalized.len(), 2);
    assert_ne!(normalized[0].envelope.event_id, normalized[1].envelope.event_id);
    assert_eq!(
        normalized[0].envelope.source_event_id,
        normalized[1].envelope.source_event_id
    );
    assert_eq!(normalized[0].vitals, normalized[1].vitals);
}

#[tokio::test]
async fn gateway_rejects_what_the_pipeline_cannot_carry() {
    let p = pipeline(seeded_registry());

    let mut no_device = submission("", 72.0, 98.0, 98.6);
    no_device.device_id = String::new();
    assert!(matches!(
        p.ingestion.ingest(no_device).await,
        Err(DomainError::Validation(_))
    ));

    let mut no_measurements = submission("D1", 72.0, 98.0, 98.6);
    no_measurements.measurements.clear();
    assert!(matches!(
        p.ingestion.ingest(no_measurements).await,
        Err(DomainError::Validation(_))
    ));

    assert!(p.raw.published().is_empty());
}
