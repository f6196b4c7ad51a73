use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A monitored device as known to the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub device_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    pub status: DeviceStatus,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Active,
    Inactive,
    Decommissioned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    Other,
    Unknown,
}

/// Patient demographics and clinical context served by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: String,
    pub age: u32,
    pub sex: Sex,
    #[serde(default)]
    pub medical_conditions: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
}

/// Inclusive acceptable range for one vital.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalRange {
    pub min: f64,
    pub max: f64,
}

impl VitalRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BloodPressureRange {
    pub systolic: VitalRange,
    pub diastolic: VitalRange,
}

/// Per-patient alerting thresholds. A profile carrying a `device_id` is
/// device-specific and shadows the patient default on lookup.
///
/// Temperature bounds are Celsius; consumers comparing Fahrenheit readings
/// convert the reading, not the profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdProfile {
    pub patient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub heart_rate: VitalRange,
    pub blood_pressure: BloodPressureRange,
    pub temperature: VitalRange,
    pub oxygen_saturation: VitalRange,
    pub respiratory_rate: VitalRange,
}
