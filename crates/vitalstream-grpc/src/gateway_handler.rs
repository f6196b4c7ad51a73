use chrono::Utc;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info};

use vitalstream_domain::envelope::SCHEMA_VERSION;
use vitalstream_domain::error::DomainError;
use vitalstream_domain::ingestion_service::{IngestionService, MeasurementsInput};
use vitalstream_domain::measurement::Measurement;
use vitalstream_proto::gateway::v1::telemetry_gateway_server::TelemetryGateway;
use vitalstream_proto::gateway::v1::{
    SendMeasurementsRequest, SendMeasurementsResponse, Status as GatewayStatus,
};

use crate::conversions::wire_timestamp;

/// RPC ingress of the gateway, structurally identical to the HTTP surface.
pub struct TelemetryGatewayHandler {
    service: Arc<IngestionService>,
}

impl TelemetryGatewayHandler {
    pub fn new(service: Arc<IngestionService>) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl TelemetryGateway for TelemetryGatewayHandler {
    async fn send_measurements(
        &self,
        request: Request<SendMeasurementsRequest>,
    ) -> Result<Response<SendMeasurementsResponse>, Status> {
        let req = request.into_inner();
        debug!(
            device_id = %req.device_id,
            measurements = req.measurements.len(),
            "Received SendMeasurements request"
        );

        let input = MeasurementsInput {
            device_id: req.device_id.clone(),
            device_type: if req.device_type.is_empty() {
                None
            } else {
                Some(req.device_type)
            },
            timestamp: if req.timestamp.is_empty() {
                None
            } else {
                Some(req.timestamp)
            },
            measurements: req
                .measurements
                .into_iter()
                .map(|m| Measurement {
                    metric: m.metric,
                    value: m.value,
                    unit: m.unit,
                })
                .collect(),
            metadata: if req.device_metadata.is_empty() {
                None
            } else {
                Some(req.device_metadata)
            },
        };

        let mut response = SendMeasurementsResponse {
            version: SCHEMA_VERSION.to_string(),
            status: GatewayStatus::Success as i32,
            message: String::new(),
            event_id: String::new(),
            timestamp: wire_timestamp(Utc::now()),
        };

        match self.service.ingest(input).await {
            Ok(event) => {
                info!(
                    device_id = %req.device_id,
                    event_id = %event.envelope.event_id,
                    "Accepted measurements over RPC"
                );
                response.event_id = event.envelope.event_id;
                response.message = "accepted".to_string();
            }
            Err(DomainError::Validation(msg)) => {
                response.status = GatewayStatus::ValidationError as i32;
                response.message = msg;
            }
            Err(DomainError::DeviceNotFound(device_id)) => {
                response.status = GatewayStatus::DeviceNotFound as i32;
                response.message = format!("device not registered: {device_id}");
            }
            Err(e) => {
                error!(device_id = %req.device_id, error = %e, "SendMeasurements failed");
                response.status = GatewayStatus::InternalError as i32;
                response.message = "internal error".to_string();
            }
        }

        Ok(Response::new(response))
    }
}
