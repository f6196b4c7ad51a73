use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use vitalstream_domain::registry::{
    BloodPressureRange, Device, DeviceStatus, Patient, Sex, ThresholdProfile, VitalRange,
};

/// Startup data for the registry. Loaded from a JSON file when configured,
/// otherwise the built-in demo cohort is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySeed {
    #[serde(default)]
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub threshold_profiles: Vec<ThresholdProfile>,
}

impl RegistrySeed {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read registry seed {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse registry seed {}", path.display()))
    }

    /// Five patients, five linked devices, one threshold profile each.
    pub fn builtin() -> Self {
        let cohort: [(u32, Sex, f64, f64, f64, f64, f64); 5] = [
            (45, Sex::Male, 60.0, 100.0, 95.0, 36.1, 37.2),
            (32, Sex::Female, 65.0, 105.0, 96.0, 36.0, 37.0),
            (58, Sex::Male, 55.0, 95.0, 94.0, 35.8, 37.5),
            (28, Sex::Female, 70.0, 110.0, 97.0, 36.2, 37.1),
            (67, Sex::Male, 50.0, 90.0, 93.0, 35.5, 37.8),
        ];

        let mut seed = RegistrySeed::default();
        for (i, (age, sex, hr_min, hr_max, spo2_min, temp_min, temp_max)) in
            cohort.into_iter().enumerate()
        {
            let patient_id = format!("P{}", i + 1);
            let device_id = format!("D{}", i + 1);

            seed.patients.push(Patient {
                patient_id: patient_id.clone(),
                age,
                sex,
                medical_conditions: Vec::new(),
                medications: Vec::new(),
                allergies: Vec::new(),
            });

            let mut metadata = HashMap::new();
            metadata.insert("serial".to_string(), format!("DEV{:03}", i + 1));
            metadata.insert("firmware".to_string(), "v1.2.3".to_string());
            seed.devices.push(Device {
                device_id: device_id.clone(),
                device_type: "wearable_monitor".to_string(),
                patient_id: Some(patient_id.clone()),
                status: DeviceStatus::Active,
                metadata,
            });

            seed.threshold_profiles.push(ThresholdProfile {
                patient_id,
                device_id: None,
                heart_rate: VitalRange::new(hr_min, hr_max),
                blood_pressure: BloodPressureRange {
                    systolic: VitalRange::new(90.0, 140.0),
                    diastolic: VitalRange::new(60.0, 90.0),
                },
                temperature: VitalRange::new(temp_min, temp_max),
                oxygen_saturation: VitalRange::new(spo2_min, 100.0),
                respiratory_rate: VitalRange::new(12.0, 20.0),
            });
        }

        seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_seed_is_consistent() {
        let seed = RegistrySeed::builtin();
        assert_eq!(seed.patients.len(), 5);
        assert_eq!(seed.devices.len(), 5);
        assert_eq!(seed.threshold_profiles.len(), 5);

        for device in &seed.devices {
            let patient_id = device.patient_id.as_ref().unwrap();
            assert!(seed.patients.iter().any(|p| &p.patient_id == patient_id));
            assert!(seed
                .threshold_profiles
                .iter()
                .any(|t| &t.patient_id == patient_id));
        }
    }

    #[test]
    fn seed_round_trips_through_json() {
        let seed = RegistrySeed::builtin();
        let json = serde_json::to_string_pretty(&seed).unwrap();
        let back: RegistrySeed = serde_json::from_str(&json).unwrap();
        assert_eq!(back.patients.len(), seed.patients.len());
        assert_eq!(back.devices[0].device_id, "D1");
    }
}
