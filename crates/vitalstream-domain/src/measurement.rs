use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::envelope::iso_millis;

/// A single reading as submitted by a device, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub metric: String,
    pub value: f64,
    #[serde(default)]
    pub unit: String,
}

/// Canonical vital-sign metrics the pipeline scores and alerts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VitalMetric {
    HeartRate,
    OxygenSaturation,
    Temperature,
}

impl VitalMetric {
    pub const ALL: [VitalMetric; 3] = [
        VitalMetric::HeartRate,
        VitalMetric::OxygenSaturation,
        VitalMetric::Temperature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VitalMetric::HeartRate => "heart_rate",
            VitalMetric::OxygenSaturation => "oxygen_saturation",
            VitalMetric::Temperature => "temperature",
        }
    }

    /// Maps a raw metric name (case-insensitive) through the alias table.
    /// Unknown names return `None` and are dropped by the normalizer.
    pub fn from_alias(raw: &str) -> Option<VitalMetric> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hr" | "heartrate" | "heart_rate" | "pulse" => Some(VitalMetric::HeartRate),
            "spo2" | "o2sat" | "o2" | "oxygen_saturation" => Some(VitalMetric::OxygenSaturation),
            "temp" | "body_temp" | "temperature" => Some(VitalMetric::Temperature),
            _ => None,
        }
    }
}

/// Units a normalized vital may carry. Temperature keeps whichever scale the
/// device declared; conversion happens only inside consumers that need a
/// single scale, never on the event itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VitalUnit {
    Bpm,
    Percent,
    Celsius,
    Fahrenheit,
}

impl VitalUnit {
    /// Resolves the declared unit string for a metric. Heart rate and SpO2
    /// have a single canonical unit; temperature honors the declared scale
    /// and defaults to Celsius when the device sent nothing usable.
    pub fn resolve(metric: VitalMetric, raw: &str) -> VitalUnit {
        match metric {
            VitalMetric::HeartRate => VitalUnit::Bpm,
            VitalMetric::OxygenSaturation => VitalUnit::Percent,
            VitalMetric::Temperature => {
                let lower = raw.trim().to_ascii_lowercase();
                if lower == "f" || lower.contains("fahrenheit") {
                    VitalUnit::Fahrenheit
                } else {
                    VitalUnit::Celsius
                }
            }
        }
    }
}

/// A normalized vital-sign sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalSample {
    pub value: f64,
    pub unit: VitalUnit,
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
}

impl VitalSample {
    /// The sample value on the Celsius scale. Identity for everything that is
    /// not a Fahrenheit temperature.
    pub fn value_in_celsius(&self) -> f64 {
        match self.unit {
            VitalUnit::Fahrenheit => (self.value - 32.0) * 5.0 / 9.0,
            _ => self.value,
        }
    }
}

/// The canonical vitals of a normalized event, keyed by metric name on the
/// wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<VitalSample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oxygen_saturation: Option<VitalSample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<VitalSample>,
}

impl Vitals {
    pub fn get(&self, metric: VitalMetric) -> Option<&VitalSample> {
        match metric {
            VitalMetric::HeartRate => self.heart_rate.as_ref(),
            VitalMetric::OxygenSaturation => self.oxygen_saturation.as_ref(),
            VitalMetric::Temperature => self.temperature.as_ref(),
        }
    }

    pub fn insert(&mut self, metric: VitalMetric, sample: VitalSample) {
        match metric {
            VitalMetric::HeartRate => self.heart_rate = Some(sample),
            VitalMetric::OxygenSaturation => self.oxygen_saturation = Some(sample),
            VitalMetric::Temperature => self.temperature = Some(sample),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.heart_rate.is_none() && self.oxygen_saturation.is_none() && self.temperature.is_none()
    }
}
