use chrono::Utc;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{debug, error};

use registry_service::RegistryService;
use vitalstream_domain::envelope::SCHEMA_VERSION;
use vitalstream_domain::error::DomainError;
use vitalstream_proto::registry::v1::registry_server::Registry;
use vitalstream_proto::registry::v1::{
    GetDeviceRequest, GetDeviceResponse, GetPatientRequest, GetPatientResponse,
    GetThresholdProfileRequest, GetThresholdProfileResponse, Status as RegistryStatus,
};

use crate::conversions::{
    device_to_proto, patient_to_proto, threshold_profile_to_proto, wire_timestamp,
};

/// gRPC surface for the registry's read-side lookups. Lookup outcomes travel
/// in the response body status so the pipeline can distinguish not-found from
/// transport failure.
pub struct RegistryServiceHandler {
    service: Arc<RegistryService>,
}

impl RegistryServiceHandler {
    pub fn new(service: Arc<RegistryService>) -> Self {
        Self { service }
    }
}

fn status_for(error: &DomainError) -> RegistryStatus {
    match error {
        DomainError::InvalidRequest(_) | DomainError::Validation(_) => {
            RegistryStatus::InvalidRequest
        }
        _ => RegistryStatus::InternalError,
    }
}

#[tonic::async_trait]
impl Registry for RegistryServiceHandler {
    async fn get_device(
        &self,
        request: Request<GetDeviceRequest>,
    ) -> Result<Response<GetDeviceResponse>, Status> {
        let req = request.into_inner();
        debug!(device_id = %req.device_id, "Received GetDevice request");

        let mut response = GetDeviceResponse {
            version: SCHEMA_VERSION.to_string(),
            status: RegistryStatus::Success as i32,
            timestamp: wire_timestamp(Utc::now()),
            device: None,
            message: String::new(),
        };

        match self.service.get_device(&req.device_id).await {
            Ok(Some(device)) => {
                response.device = Some(device_to_proto(device));
            }
            Ok(None) => {
                response.status = RegistryStatus::NotFound as i32;
            }
            Err(e) => {
                error!(device_id = %req.device_id, error = %e, "GetDevice failed");
                response.status = status_for(&e) as i32;
                response.message = e.to_string();
            }
        }

        Ok(Response::new(response))
    }

    async fn get_patient(
        &self,
        request: Request<GetPatientRequest>,
    ) -> Result<Response<GetPatientResponse>, Status> {
        let req = request.into_inner();
        debug!(patient_id = %req.patient_id, "Received GetPatient request");

        let mut response = GetPatientResponse {
            version: SCHEMA_VERSION.to_string(),
            status: RegistryStatus::Success as i32,
            timestamp: wire_timestamp(Utc::now()),
            patient: None,
            message: String::new(),
        };

        match self.service.get_patient(&req.patient_id).await {
            Ok(Some(patient)) => {
                response.patient = Some(patient_to_proto(patient));
            }
            Ok(None) => {
                response.status = RegistryStatus::NotFound as i32;
            }
            Err(e) => {
                error!(patient_id = %req.patient_id, error = %e, "GetPatient failed");
                response.status = status_for(&e) as i32;
                response.message = e.to_string();
            }
        }

        Ok(Response::new(response))
    }

    async fn get_threshold_profile(
        &self,
        request: Request<GetThresholdProfileRequest>,
    ) -> Result<Response<GetThresholdProfileResponse>, Status> {
        let req = request.into_inner();
        debug!(
            patient_id = %req.patient_id,
            device_id = %req.device_id,
            "Received GetThresholdProfile request"
        );

        let device_id = if req.device_id.is_empty() {
            None
        } else {
            Some(req.device_id.as_str())
        };

        let mut response = GetThresholdProfileResponse {
            version: SCHEMA_VERSION.to_string(),
            status: RegistryStatus::Success as i32,
            timestamp: wire_timestamp(Utc::now()),
            profile: None,
            message: String::new(),
        };

        match self
            .service
            .get_threshold_profile(&req.patient_id, device_id)
            .await
        {
            Ok(Some(profile)) => {
                response.profile = Some(threshold_profile_to_proto(profile));
            }
            Ok(None) => {
                response.status = RegistryStatus::NotFound as i32;
            }
            Err(e) => {
                error!(patient_id = %req.patient_id, error = %e, "GetThresholdProfile failed");
                response.status = status_for(&e) as i32;
                response.message = e.to_string();
            }
        }

        Ok(Response::new(response))
    }
}
