use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::envelope::{EventEnvelope, EventType};
use crate::error::DomainResult;
use crate::events::{EnrichedTelemetry, EnrichmentMetadata, NormalizedTelemetry, PatientProfile};
use crate::repository::{EnrichedTelemetryProducer, RegistryReader};

/// Attaches patient and threshold context to normalized telemetry.
///
/// Lookup failures never block the pipeline: a device that cannot be resolved
/// to a patient produces an orphan event, and missing profile/threshold
/// lookups simply leave those fields absent with the contributing sources
/// recorded in `enrichment_metadata`.
pub struct EnricherService {
    registry: Arc<dyn RegistryReader>,
    producer: Arc<dyn EnrichedTelemetryProducer>,
}

impl EnricherService {
    pub fn new(
        registry: Arc<dyn RegistryReader>,
        producer: Arc<dyn EnrichedTelemetryProducer>,
    ) -> Self {
        Self { registry, producer }
    }

    pub async fn process(&self, input: NormalizedTelemetry) -> DomainResult<EnrichedTelemetry> {
        let mut sources: Vec<String> = Vec::new();

        let patient_id = match self.registry.get_device(&input.device_id).await {
            Ok(Some(device)) => {
                sources.push("device".to_string());
                device.patient_id.or_else(|| input.patient_id.clone())
            }
            Ok(None) => {
                debug!(
                    device_id = %input.device_id,
                    event_id = %input.envelope.event_id,
                    "Device not registered"
                );
                input.patient_id.clone()
            }
            Err(e) => {
                warn!(
                    device_id = %input.device_id,
                    event_id = %input.envelope.event_id,
                    error = %e,
                    "Device lookup failed"
                );
                input.patient_id.clone()
            }
        };

        let (patient_profile, thresholds) = match patient_id.as_deref() {
            Some(patient) => {
                let profile = match self.registry.get_patient(patient).await {
                    Ok(Some(p)) => {
                        sources.push("patient".to_string());
                        Some(PatientProfile { age: p.age, sex: p.sex })
                    }
                    Ok(None) => None,
                    Err(e) => {
                        warn!(patient_id = %patient, error = %e, "Patient lookup failed");
                        None
                    }
                };

                let thresholds = match self
                    .registry
                    .get_threshold_profile(patient, Some(input.device_id.clone()))
                    .await
                {
                    Ok(Some(t)) => {
                        sources.push("thresholds".to_string());
                        Some(t)
                    }
                    Ok(None) => None,
                    Err(e) => {
                        warn!(patient_id = %patient, error = %e, "Threshold lookup failed");
                        None
                    }
                };

                (profile, thresholds)
            }
            None => (None, None),
        };

        let orphan = patient_id.is_none();
        if sources.is_empty() {
            sources.push("none".to_string());
        }

        let enriched = EnrichedTelemetry {
            envelope: EventEnvelope::derived(EventType::TelemetryEnriched, &input.envelope),
            device_id: input.device_id,
            patient_id,
            orphan,
            vitals: input.vitals,
            validation_status: input.validation_status,
            patient_profile,
            thresholds,
            enrichment_metadata: EnrichmentMetadata {
                enriched_at: Utc::now(),
                enrichment_sources: sources,
            },
        };

        self.producer.publish(&enriched).await?;

        info!(
            event_id = %enriched.envelope.event_id,
            trace_id = %enriched.envelope.trace_id,
            device_id = %enriched.device_id,
            orphan = enriched.orphan,
            "Produced enriched telemetry"
        );

        Ok(enriched)
    }
}
