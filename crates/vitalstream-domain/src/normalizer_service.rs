use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::envelope::{EventEnvelope, EventType};
use crate::error::DomainResult;
use crate::events::{NormalizationMetadata, NormalizedTelemetry, RawTelemetry, ValidationStatus};
use crate::measurement::{VitalMetric, VitalSample, VitalUnit, Vitals};
use crate::registry::VitalRange;
use crate::repository::NormalizedTelemetryProducer;
use crate::timestamp::parse_device_timestamp;

pub const NORMALIZATION_RULES_VERSION: &str = "1.0.0";

/// Physiological clamp windows. Temperature bounds are Celsius; the
/// Fahrenheit window is derived so a reading keeps its declared scale.
#[derive(Debug, Clone, Copy)]
pub struct ClampBounds {
    pub heart_rate: VitalRange,
    pub oxygen_saturation: VitalRange,
    pub temperature_celsius: VitalRange,
}

impl Default for ClampBounds {
    fn default() -> Self {
        Self {
            heart_rate: VitalRange::new(20.0, 240.0),
            oxygen_saturation: VitalRange::new(50.0, 100.0),
            temperature_celsius: VitalRange::new(30.0, 45.0),
        }
    }
}

impl ClampBounds {
    fn window(&self, metric: VitalMetric, unit: VitalUnit) -> VitalRange {
        match metric {
            VitalMetric::HeartRate => self.heart_rate,
            VitalMetric::OxygenSaturation => self.oxygen_saturation,
            VitalMetric::Temperature => match unit {
                VitalUnit::Fahrenheit => VitalRange::new(
                    celsius_to_fahrenheit(self.temperature_celsius.min),
                    celsius_to_fahrenheit(self.temperature_celsius.max),
                ),
                _ => self.temperature_celsius,
            },
        }
    }
}

fn celsius_to_fahrenheit(value: f64) -> f64 {
    value * 9.0 / 5.0 + 32.0
}

/// Raw → normalized telemetry: canonical metric names, declared units,
/// clamped values, coerced timestamps. A pure function of its input apart
/// from the freshly minted envelope, so duplicate deliveries produce events
/// that differ only in `event_id`.
pub struct NormalizerService {
    producer: Arc<dyn NormalizedTelemetryProducer>,
    bounds: ClampBounds,
}

impl NormalizerService {
    pub fn new(producer: Arc<dyn NormalizedTelemetryProducer>, bounds: ClampBounds) -> Self {
        Self { producer, bounds }
    }

    pub async fn process(&self, raw: RawTelemetry) -> DomainResult<NormalizedTelemetry> {
        let normalized = self.normalize(&raw);
        self.producer.publish(&normalized).await?;

        info!(
            event_id = %normalized.envelope.event_id,
            trace_id = %normalized.envelope.trace_id,
            source_event_id = %raw.envelope.event_id,
            device_id = %normalized.device_id,
            status = ?normalized.validation_status,
            "Produced normalized telemetry"
        );

        Ok(normalized)
    }

    pub fn normalize(&self, raw: &RawTelemetry) -> NormalizedTelemetry {
        let mut warnings = Vec::new();

        let (timestamp, substituted) = match raw.recorded_at.as_deref() {
            Some(recorded) => match parse_device_timestamp(recorded) {
                Some(ts) => (ts, false),
                None => {
                    warn!(
                        event_id = %raw.envelope.event_id,
                        device_id = %raw.device_id,
                        recorded_at = %recorded,
                        "Unparseable device timestamp, substituting current instant"
                    );
                    warnings.push(format!(
                        "timestamp {recorded:?} could not be parsed, substituted current instant"
                    ));
                    (Utc::now(), true)
                }
            },
            None => (raw.envelope.timestamp, false),
        };

        let mut vitals = Vitals::default();
        let mut clamped = false;

        for measurement in &raw.measurements {
            let Some(metric) = VitalMetric::from_alias(&measurement.metric) else {
                warn!(
                    event_id = %raw.envelope.event_id,
                    device_id = %raw.device_id,
                    metric = %measurement.metric,
                    "Dropping unknown metric"
                );
                warnings.push(format!("unknown metric {:?} dropped", measurement.metric));
                continue;
            };

            let unit = VitalUnit::resolve(metric, &measurement.unit);
            let window = self.bounds.window(metric, unit);

            let value = if window.contains(measurement.value) {
                measurement.value
            } else {
                let bounded = measurement.value.clamp(window.min, window.max);
                warn!(
                    event_id = %raw.envelope.event_id,
                    device_id = %raw.device_id,
                    metric = metric.as_str(),
                    raw_value = measurement.value,
                    clamped_value = bounded,
                    "Clamped out-of-range vital"
                );
                warnings.push(format!(
                    "{} clamped from {} to {}",
                    metric.as_str(),
                    measurement.value,
                    bounded
                ));
                clamped = true;
                bounded
            };

            vitals.insert(metric, VitalSample { value, unit, timestamp });
        }

        let validation_status = if clamped {
            ValidationStatus::Clamped
        } else if substituted {
            ValidationStatus::TimestampSubstituted
        } else {
            ValidationStatus::Valid
        };

        let patient_id = raw
            .metadata
            .as_ref()
            .and_then(|m| m.get("patient_id"))
            .cloned();

        NormalizedTelemetry {
            envelope: EventEnvelope::derived(EventType::TelemetryNormalized, &raw.envelope),
            device_id: raw.device_id.clone(),
            patient_id,
            vitals,
            validation_status,
            normalization_metadata: NormalizationMetadata {
                normalized_at: Utc::now(),
                rules_version: NORMALIZATION_RULES_VERSION.to_string(),
                warnings,
            },
        }
    }
}
