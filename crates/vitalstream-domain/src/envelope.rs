use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schema version stamped on every emitted event.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// The five event types the pipeline emits, one per topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "telemetry.raw")]
    TelemetryRaw,
    #[serde(rename = "telemetry.normalized")]
    TelemetryNormalized,
    #[serde(rename = "telemetry.enriched")]
    TelemetryEnriched,
    #[serde(rename = "telemetry.scored")]
    TelemetryScored,
    #[serde(rename = "alerts.raised")]
    AlertRaised,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TelemetryRaw => "telemetry.raw",
            EventType::TelemetryNormalized => "telemetry.normalized",
            EventType::TelemetryEnriched => "telemetry.enriched",
            EventType::TelemetryScored => "telemetry.scored",
            EventType::AlertRaised => "alerts.raised",
        }
    }
}

/// Metadata fields shared by every pipeline event.
///
/// `trace_id` is minted once at ingest and copied byte-for-byte onto every
/// derived event; `source_event_id` links an output to the exact input event
/// it was derived from (absent on ingest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: String,
    pub trace_id: String,
    pub event_type: EventType,
    pub version: String,
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_event_id: Option<String>,
}

impl EventEnvelope {
    /// Envelope for an event entering the pipeline: fresh event and trace ids,
    /// no source event.
    pub fn ingest(event_type: EventType) -> Self {
        Self {
            event_id: new_event_id(),
            trace_id: new_trace_id(),
            event_type,
            version: SCHEMA_VERSION.to_string(),
            timestamp: Utc::now(),
            source_event_id: None,
        }
    }

    /// Envelope derived from an upstream event: fresh event id, trace id
    /// copied unchanged, source pointing at the parent.
    pub fn derived(event_type: EventType, parent: &EventEnvelope) -> Self {
        Self {
            event_id: new_event_id(),
            trace_id: parent.trace_id.clone(),
            event_type,
            version: parent.version.clone(),
            timestamp: Utc::now(),
            source_event_id: Some(parent.event_id.clone()),
        }
    }
}

pub fn new_event_id() -> String {
    format!("evt_{}", Uuid::new_v4())
}

pub fn new_trace_id() -> String {
    format!("trace_{}", Uuid::new_v4())
}

pub fn new_alert_id() -> String {
    format!("alert_{}", Uuid::new_v4())
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-01-15T10:30:00.000Z`.
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
