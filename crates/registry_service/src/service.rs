use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use vitalstream_domain::error::{DomainError, DomainResult};
use vitalstream_domain::registry::{Device, Patient, ThresholdProfile};
use vitalstream_domain::repository::RegistryReader;

use crate::store::InMemoryRegistryStore;

/// Read-side registry lookups over the seeded store.
///
/// Threshold resolution happens here, not in callers: a profile carrying the
/// requesting device's id wins over the patient default, so the enricher
/// needs a single round-trip.
pub struct RegistryService {
    store: Arc<InMemoryRegistryStore>,
}

impl RegistryService {
    pub fn new(store: Arc<InMemoryRegistryStore>) -> Self {
        Self { store }
    }

    pub async fn get_device(&self, device_id: &str) -> DomainResult<Option<Device>> {
        if device_id.trim().is_empty() {
            return Err(DomainError::InvalidRequest("device_id is required".into()));
        }
        Ok(self.store.device(device_id).await)
    }

    pub async fn get_patient(&self, patient_id: &str) -> DomainResult<Option<Patient>> {
        if patient_id.trim().is_empty() {
            return Err(DomainError::InvalidRequest("patient_id is required".into()));
        }
        Ok(self.store.patient(patient_id).await)
    }

    pub async fn get_threshold_profile(
        &self,
        patient_id: &str,
        device_id: Option<&str>,
    ) -> DomainResult<Option<ThresholdProfile>> {
        if patient_id.trim().is_empty() {
            return Err(DomainError::InvalidRequest("patient_id is required".into()));
        }

        let profiles = self.store.threshold_profiles(patient_id).await;

        let device_specific = device_id.and_then(|device| {
            profiles
                .iter()
                .find(|p| p.device_id.as_deref() == Some(device))
                .cloned()
        });

        if let Some(profile) = device_specific {
            debug!(patient_id, device_id = ?device_id, "Resolved device-specific threshold profile");
            return Ok(Some(profile));
        }

        Ok(profiles.into_iter().find(|p| p.device_id.is_none()))
    }
}

/// The in-process counterpart of the gRPC reader used by the pipeline; lets
/// tests and the all-in-one binary consume the registry without a socket.
#[async_trait]
impl RegistryReader for RegistryService {
    async fn get_device(&self, device_id: &str) -> DomainResult<Option<Device>> {
        RegistryService::get_device(self, device_id).await
    }

    async fn get_patient(&self, patient_id: &str) -> DomainResult<Option<Patient>> {
        RegistryService::get_patient(self, patient_id).await
    }

    async fn get_threshold_profile(
        &self,
        patient_id: &str,
        device_id: Option<String>,
    ) -> DomainResult<Option<ThresholdProfile>> {
        RegistryService::get_threshold_profile(self, patient_id, device_id.as_deref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::RegistrySeed;
    use vitalstream_domain::registry::{BloodPressureRange, VitalRange};

    fn service() -> RegistryService {
        RegistryService::new(Arc::new(InMemoryRegistryStore::from_seed(
            RegistrySeed::builtin(),
        )))
    }

    #[tokio::test]
    async fn resolves_seeded_device_to_patient() {
        let svc = service();
        let device = svc.get_device("D1").await.unwrap().unwrap();
        assert_eq!(device.patient_id.as_deref(), Some("P1"));
    }

    #[tokio::test]
    async fn unknown_entities_return_none() {
        let svc = service();
        assert!(svc.get_device("D404").await.unwrap().is_none());
        assert!(svc.get_patient("P404").await.unwrap().is_none());
        assert!(svc
            .get_threshold_profile("P404", None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn blank_ids_are_invalid_requests() {
        let svc = service();
        assert!(matches!(
            svc.get_device(" ").await,
            Err(DomainError::InvalidRequest(_))
        ));
        assert!(matches!(
            svc.get_patient("").await,
            Err(DomainError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn patient_default_profile_used_without_device_match() {
        let svc = service();
        let profile = svc
            .get_threshold_profile("P1", Some("D1"))
            .await
            .unwrap()
            .unwrap();
        assert!(profile.device_id.is_none());
        assert_eq!(profile.heart_rate.max, 100.0);
    }

    #[tokio::test]
    async fn device_specific_profile_shadows_patient_default() {
        let store = Arc::new(InMemoryRegistryStore::from_seed(RegistrySeed::builtin()));
        store
            .add_threshold_profile(ThresholdProfile {
                patient_id: "P1".to_string(),
                device_id: Some("D1".to_string()),
                heart_rate: VitalRange::new(50.0, 160.0),
                blood_pressure: BloodPressureRange {
                    systolic: VitalRange::new(90.0, 140.0),
                    diastolic: VitalRange::new(60.0, 90.0),
                },
                temperature: VitalRange::new(35.5, 38.0),
                oxygen_saturation: VitalRange::new(90.0, 100.0),
                respiratory_rate: VitalRange::new(10.0, 24.0),
            })
            .await;

        let svc = RegistryService::new(store);

        let for_device = svc
            .get_threshold_profile("P1", Some("D1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(for_device.device_id.as_deref(), Some("D1"));
        assert_eq!(for_device.heart_rate.max, 160.0);

        // Another device on the same patient still gets the default.
        let other_device = svc
            .get_threshold_profile("P1", Some("D9"))
            .await
            .unwrap()
            .unwrap();
        assert!(other_device.device_id.is_none());
    }
}
