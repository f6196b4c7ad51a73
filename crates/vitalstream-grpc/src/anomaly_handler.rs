use chrono::Utc;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{debug, error};

use anomaly_service::{ScoringService, SCORING_ENGINE, SCORING_ENGINE_VERSION};
use vitalstream_domain::envelope::SCHEMA_VERSION;
use vitalstream_domain::error::DomainError;
use vitalstream_domain::repository::{ScoreVitalsRequest as DomainScoreRequest, VitalsScorer};
use vitalstream_proto::anomaly::v1::anomaly_detection_server::AnomalyDetection;
use vitalstream_proto::anomaly::v1::{
    ScoreVitalsRequest, ScoreVitalsResponse, ScoringMetadata, Status as AnomalyStatus,
};

use crate::conversions::{
    anomaly_scores_to_proto, overall_risk_to_proto, proto_to_threshold_profile, proto_to_vitals,
    wire_timestamp,
};

/// gRPC surface of the anomaly scorer.
pub struct AnomalyServiceHandler {
    service: Arc<ScoringService>,
}

impl AnomalyServiceHandler {
    pub fn new(service: Arc<ScoringService>) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl AnomalyDetection for AnomalyServiceHandler {
    async fn score_vitals(
        &self,
        request: Request<ScoreVitalsRequest>,
    ) -> Result<Response<ScoreVitalsResponse>, Status> {
        let req = request.into_inner();
        debug!(patient_id = %req.patient_id, device_id = %req.device_id, "Received ScoreVitals request");

        let timestamp = chrono::DateTime::parse_from_rfc3339(&req.timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let domain_request = DomainScoreRequest {
            patient_id: req.patient_id.clone(),
            device_id: req.device_id,
            timestamp,
            vitals: proto_to_vitals(req.vitals.unwrap_or_default()),
            thresholds: req.thresholds.map(proto_to_threshold_profile),
            source_event_id: if req.source_event_id.is_empty() {
                None
            } else {
                Some(req.source_event_id)
            },
        };

        let mut response = ScoreVitalsResponse {
            version: SCHEMA_VERSION.to_string(),
            status: AnomalyStatus::Success as i32,
            patient_id: req.patient_id.clone(),
            timestamp: wire_timestamp(Utc::now()),
            message: String::new(),
            anomaly_scores: None,
            overall_risk_score: None,
            metadata: None,
        };

        match self.service.score_vitals(domain_request).await {
            Ok(outcome) => {
                response.anomaly_scores = Some(anomaly_scores_to_proto(&outcome.anomaly_scores));
                response.overall_risk_score =
                    Some(overall_risk_to_proto(&outcome.overall_risk_score));
                response.metadata = Some(ScoringMetadata {
                    scored_at: wire_timestamp(Utc::now()),
                    scoring_engine: outcome.scoring_engine,
                    scoring_engine_version: outcome.scoring_engine_version,
                });
            }
            Err(DomainError::InvalidRequest(msg)) => {
                response.status = AnomalyStatus::InvalidRequest as i32;
                response.message = msg;
            }
            Err(DomainError::BaselineStore(msg)) => {
                error!(patient_id = %req.patient_id, error = %msg, "Baseline storage failed");
                response.status = AnomalyStatus::ModelError as i32;
                response.message = msg;
                response.metadata = Some(ScoringMetadata {
                    scored_at: wire_timestamp(Utc::now()),
                    scoring_engine: SCORING_ENGINE.to_string(),
                    scoring_engine_version: SCORING_ENGINE_VERSION.to_string(),
                });
            }
            Err(e) => {
                error!(patient_id = %req.patient_id, error = %e, "ScoreVitals failed");
                response.status = AnomalyStatus::InternalError as i32;
                response.message = e.to_string();
            }
        }

        Ok(Response::new(response))
    }
}
