use async_trait::async_trait;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;
use tracing::{debug, info, warn};

use vitalstream_domain::envelope::SCHEMA_VERSION;
use vitalstream_domain::error::{DomainError, DomainResult};
use vitalstream_domain::registry::{Device, Patient, ThresholdProfile};
use vitalstream_domain::repository::RegistryReader;
use vitalstream_proto::registry::v1::registry_client::RegistryClient;
use vitalstream_proto::registry::v1::{
    GetDeviceRequest, GetPatientRequest, GetThresholdProfileRequest, Status as RegistryStatus,
};

use crate::conversions::{proto_to_device, proto_to_patient, proto_to_threshold_profile};

#[derive(Debug, Clone)]
pub struct GrpcRegistryConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for GrpcRegistryConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:50051".to_string(),
            timeout: Duration::from_secs(5),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Registry reader over gRPC with per-call deadlines and linear backoff.
///
/// The channel connects lazily so the pipeline starts even while the registry
/// is down; callers handle the resulting `RegistryUnavailable` per their own
/// degradation rules.
pub struct GrpcRegistryReader {
    client: RegistryClient<Channel>,
    config: GrpcRegistryConfig,
}

impl GrpcRegistryReader {
    pub fn connect(config: GrpcRegistryConfig) -> anyhow::Result<Self> {
        info!(endpoint = %config.endpoint, "Creating registry client");

        let channel = Endpoint::from_shared(config.endpoint.clone())?
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .connect_lazy();

        Ok(Self {
            client: RegistryClient::new(channel),
            config,
        })
    }

    /// Runs one lookup with linear backoff (`delay * attempt` between tries).
    /// Only transport-level failures are retried; definitive body statuses
    /// are returned immediately.
    async fn with_retries<T, F, Fut>(&self, operation_name: &str, mut call: F) -> DomainResult<T>
    where
        F: FnMut(RegistryClient<Channel>) -> Fut,
        Fut: std::future::Future<Output = Result<DomainResult<T>, tonic::Status>>,
    {
        let mut last_error = String::new();

        for attempt in 1..=self.config.retry_attempts {
            match call(self.client.clone()).await {
                Ok(outcome) => return outcome,
                Err(status) => {
                    last_error = status.to_string();
                    if attempt < self.config.retry_attempts {
                        let delay = self.config.retry_delay * attempt;
                        warn!(
                            operation = operation_name,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %status,
                            "Registry call failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(DomainError::RegistryUnavailable(format!(
            "{operation_name}: {last_error}"
        )))
    }
}

#[async_trait]
impl RegistryReader for GrpcRegistryReader {
    async fn get_device(&self, device_id: &str) -> DomainResult<Option<Device>> {
        debug!(device_id, "Looking up device");

        self.with_retries("GetDevice", |mut client| {
            let request = GetDeviceRequest {
                version: SCHEMA_VERSION.to_string(),
                device_id: device_id.to_string(),
            };
            async move {
                let response = client.get_device(Request::new(request)).await?.into_inner();
                Ok(match RegistryStatus::try_from(response.status) {
                    Ok(RegistryStatus::Success) => Ok(response.device.map(proto_to_device)),
                    Ok(RegistryStatus::NotFound) => Ok(None),
                    Ok(RegistryStatus::InvalidRequest) => {
                        Err(DomainError::InvalidRequest(response.message))
                    }
                    _ => Err(DomainError::RegistryUnavailable(response.message)),
                })
            }
        })
        .await
    }

    async fn get_patient(&self, patient_id: &str) -> DomainResult<Option<Patient>> {
        debug!(patient_id, "Looking up patient");

        self.with_retries("GetPatient", |mut client| {
            let request = GetPatientRequest {
                version: SCHEMA_VERSION.to_string(),
                patient_id: patient_id.to_string(),
            };
            async move {
                let response = client.get_patient(Request::new(request)).await?.into_inner();
                Ok(match RegistryStatus::try_from(response.status) {
                    Ok(RegistryStatus::Success) => Ok(response.patient.map(proto_to_patient)),
                    Ok(RegistryStatus::NotFound) => Ok(None),
                    Ok(RegistryStatus::InvalidRequest) => {
                        Err(DomainError::InvalidRequest(response.message))
                    }
                    _ => Err(DomainError::RegistryUnavailable(response.message)),
                })
            }
        })
        .await
    }

    async fn get_threshold_profile(
        &self,
        patient_id: &str,
        device_id: Option<String>,
    ) -> DomainResult<Option<ThresholdProfile>> {
        debug!(patient_id, device_id = ?device_id, "Looking up threshold profile");

        self.with_retries("GetThresholdProfile", |mut client| {
            let request = GetThresholdProfileRequest {
                version: SCHEMA_VERSION.to_string(),
                patient_id: patient_id.to_string(),
                device_id: device_id.clone().unwrap_or_default(),
            };
            async move {
                let response = client
                    .get_threshold_profile(Request::new(request))
                    .await?
                    .into_inner();
                Ok(match RegistryStatus::try_from(response.status) {
                    Ok(RegistryStatus::Success) => {
                        Ok(response.profile.map(proto_to_threshold_profile))
                    }
                    Ok(RegistryStatus::NotFound) => Ok(None),
                    Ok(RegistryStatus::InvalidRequest) => {
                        Err(DomainError::InvalidRequest(response.message))
                    }
                    _ => Err(DomainError::RegistryUnavailable(response.message)),
                })
            }
        })
        .await
    }
}
