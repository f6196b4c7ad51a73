use async_trait::async_trait;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;
use tracing::{debug, info};

use vitalstream_domain::envelope::SCHEMA_VERSION;
use vitalstream_domain::error::{DomainError, DomainResult};
use vitalstream_domain::repository::{ScoreVitalsOutcome, ScoreVitalsRequest, VitalsScorer};
use vitalstream_proto::anomaly::v1::anomaly_detection_client::AnomalyDetectionClient;
use vitalstream_proto::anomaly::v1::{
    ScoreVitalsRequest as ProtoScoreRequest, Status as AnomalyStatus,
};

use crate::conversions::{
    proto_to_anomaly_scores, proto_to_overall_risk, threshold_profile_to_proto, vitals_to_proto,
    wire_timestamp,
};

#[derive(Debug, Clone)]
pub struct GrpcScorerConfig {
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for GrpcScorerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:50051".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Vitals scorer over gRPC. A single attempt under the call deadline; the
/// rules engine degrades to zero scores when this fails, so retrying here
/// would only stall the partition.
pub struct GrpcVitalsScorer {
    client: AnomalyDetectionClient<Channel>,
}

impl GrpcVitalsScorer {
    pub fn connect(config: GrpcScorerConfig) -> anyhow::Result<Self> {
        info!(endpoint = %config.endpoint, "Creating anomaly scorer client");

        let channel = Endpoint::from_shared(config.endpoint.clone())?
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .connect_lazy();

        Ok(Self {
            client: AnomalyDetectionClient::new(channel),
        })
    }
}

#[async_trait]
impl VitalsScorer for GrpcVitalsScorer {
    async fn score_vitals(&self, request: ScoreVitalsRequest) -> DomainResult<ScoreVitalsOutcome> {
        debug!(patient_id = %request.patient_id, "Requesting anomaly scores");

        let proto_request = ProtoScoreRequest {
            version: SCHEMA_VERSION.to_string(),
            patient_id: request.patient_id,
            device_id: request.device_id,
            timestamp: wire_timestamp(request.timestamp),
            vitals: Some(vitals_to_proto(&request.vitals)),
            thresholds: request.thresholds.map(threshold_profile_to_proto),
            source_event_id: request.source_event_id.unwrap_or_default(),
        };

        let response = self
            .client
            .clone()
            .score_vitals(Request::new(proto_request))
            .await
            .map_err(|status| DomainError::ScoringUnavailable(status.to_string()))?
            .into_inner();

        match AnomalyStatus::try_from(response.status) {
            Ok(AnomalyStatus::Success) => {
                let metadata = response.metadata.unwrap_or_default();
                Ok(ScoreVitalsOutcome {
                    anomaly_scores: proto_to_anomaly_scores(
                        response.anomaly_scores.unwrap_or_default(),
                    ),
                    overall_risk_score: proto_to_overall_risk(
                        response.overall_risk_score.unwrap_or_default(),
                    ),
                    scoring_engine: metadata.scoring_engine,
                    scoring_engine_version: metadata.scoring_engine_version,
                })
            }
            Ok(AnomalyStatus::InvalidRequest) => {
                Err(DomainError::InvalidRequest(response.message))
            }
            _ => Err(DomainError::ScoringUnavailable(response.message)),
        }
    }
}
