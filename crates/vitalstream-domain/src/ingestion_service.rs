use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::envelope::{EventEnvelope, EventType};
use crate::error::{DomainError, DomainResult};
use crate::events::RawTelemetry;
use crate::measurement::Measurement;
use crate::repository::{RawTelemetryProducer, RegistryReader};
use crate::timestamp::parse_device_timestamp;

/// A measurement batch arriving at either gateway surface (HTTP or gRPC).
#[derive(Debug, Clone)]
pub struct MeasurementsInput {
    pub device_id: String,
    pub device_type: Option<String>,
    pub timestamp: Option<String>,
    pub measurements: Vec<Measurement>,
    pub metadata: Option<HashMap<String, String>>,
}

/// Gateway ingest: validate, optionally verify the device against the
/// registry, mint the envelope, and publish to the raw topic.
///
/// Registry unavailability fails open: ingest availability beats verification
/// strictness, and the enricher marks unresolvable devices as orphans anyway.
pub struct IngestionService {
    registry: Arc<dyn RegistryReader>,
    producer: Arc<dyn RawTelemetryProducer>,
    verify_devices: bool,
}

impl IngestionService {
    pub fn new(
        registry: Arc<dyn RegistryReader>,
        producer: Arc<dyn RawTelemetryProducer>,
        verify_devices: bool,
    ) -> Self {
        Self {
            registry,
            producer,
            verify_devices,
        }
    }

    pub async fn ingest(&self, input: MeasurementsInput) -> DomainResult<RawTelemetry> {
        self.validate(&input)?;

        if self.verify_devices {
            match self.registry.get_device(&input.device_id).await {
                Ok(Some(_)) => {
                    debug!(device_id = %input.device_id, "Device verified");
                }
                Ok(None) => {
                    return Err(DomainError::DeviceNotFound(input.device_id));
                }
                Err(e) => {
                    warn!(
                        device_id = %input.device_id,
                        error = %e,
                        "Registry unreachable during device verification, accepting event"
                    );
                }
            }
        }

        let measurements = input
            .measurements
            .into_iter()
            .map(|m| Measurement {
                metric: m.metric.trim().to_ascii_lowercase(),
                value: m.value,
                unit: m.unit,
            })
            .collect();

        let mut metadata = input.metadata.unwrap_or_default();
        if let Some(device_type) = input.device_type {
            metadata.insert("device_type".to_string(), device_type);
        }

        let event = RawTelemetry {
            envelope: EventEnvelope::ingest(EventType::TelemetryRaw),
            device_id: input.device_id,
            measurements,
            recorded_at: input.timestamp,
            metadata: if metadata.is_empty() { None } else { Some(metadata) },
        };

        self.producer.publish(&event).await?;

        info!(
            event_id = %event.envelope.event_id,
            trace_id = %event.envelope.trace_id,
            device_id = %event.device_id,
            "Accepted telemetry"
        );

        Ok(event)
    }

    fn validate(&self, input: &MeasurementsInput) -> DomainResult<()> {
        if input.device_id.trim().is_empty() {
            return Err(DomainError::Validation("device_id is required".to_string()));
        }
        if input.measurements.is_empty() {
            return Err(DomainError::Validation(
                "at least one measurement is required".to_string(),
            ));
        }
        if let Some(raw) = input.timestamp.as_deref() {
            if parse_device_timestamp(raw).is_none() {
                return Err(DomainError::Validation(format!(
                    "malformed timestamp: {raw}"
                )));
            }
        }
        Ok(())
    }
}
