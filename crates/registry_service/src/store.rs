use std::collections::HashMap;
use tokio::sync::RwLock;

use vitalstream_domain::registry::{Device, Patient, ThresholdProfile};

use crate::seed::RegistrySeed;

/// In-memory registry data, seeded at startup. The pipeline only reads;
/// writes happen through the (out-of-scope) CRUD surface, so a read-write
/// lock keeps lookups cheap.
pub struct InMemoryRegistryStore {
    devices: RwLock<HashMap<String, Device>>,
    patients: RwLock<HashMap<String, Patient>>,
    profiles: RwLock<Vec<ThresholdProfile>>,
}

impl Default for InMemoryRegistryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistryStore {
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            patients: RwLock::new(HashMap::new()),
            profiles: RwLock::new(Vec::new()),
        }
    }

    pub fn from_seed(seed: RegistrySeed) -> Self {
        let devices = seed
            .devices
            .into_iter()
            .map(|d| (d.device_id.clone(), d))
            .collect();
        let patients = seed
            .patients
            .into_iter()
            .map(|p| (p.patient_id.clone(), p))
            .collect();

        Self {
            devices: RwLock::new(devices),
            patients: RwLock::new(patients),
            profiles: RwLock::new(seed.threshold_profiles),
        }
    }

    pub async fn device(&self, device_id: &str) -> Option<Device> {
        self.devices.read().await.get(device_id).cloned()
    }

    pub async fn patient(&self, patient_id: &str) -> Option<Patient> {
        self.patients.read().await.get(patient_id).cloned()
    }

    /// All profiles for a patient, device-specific and default alike.
    pub async fn threshold_profiles(&self, patient_id: &str) -> Vec<ThresholdProfile> {
        self.profiles
            .read()
            .await
            .iter()
            .filter(|p| p.patient_id == patient_id)
            .cloned()
            .collect()
    }

    pub async fn upsert_device(&self, device: Device) {
        self.devices
            .write()
            .await
            .insert(device.device_id.clone(), device);
    }

    pub async fn upsert_patient(&self, patient: Patient) {
        self.patients
            .write()
            .await
            .insert(patient.patient_id.clone(), patient);
    }

    pub async fn add_threshold_profile(&self, profile: ThresholdProfile) {
        self.profiles.write().await.push(profile);
    }
}
