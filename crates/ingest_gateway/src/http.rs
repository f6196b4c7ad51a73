use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

use vitalstream_domain::error::DomainError;
use vitalstream_domain::ingestion_service::{IngestionService, MeasurementsInput};
use vitalstream_domain::measurement::Measurement;

/// JSON body of `POST /telemetry`. Metric keys are the short device-facing
/// aliases; the normalizer maps them onto canonical names downstream.
/// Temperature on this surface is Fahrenheit by convention and keeps that
/// unit through the pipeline.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRequest {
    // Lenient shape: absent fields surface as empty values so the service's
    // own validation answers with the documented 400 body instead of a
    // framework rejection.
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub metrics: TelemetryMetrics,
    #[serde(default)]
    pub meta: Option<DeviceMeta>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TelemetryMetrics {
    #[serde(default)]
    pub hr: Option<f64>,
    #[serde(default)]
    pub spo2: Option<f64>,
    #[serde(default)]
    pub temp: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceMeta {
    #[serde(default)]
    pub battery: Option<f64>,
    #[serde(default)]
    pub firmware: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub service: &'static str,
}

pub fn router(service: Arc<IngestionService>) -> Router {
    Router::new()
        .route("/telemetry", post(submit_telemetry))
        .route("/health", get(health))
        .with_state(service)
}

async fn submit_telemetry(
    State(service): State<Arc<IngestionService>>,
    Json(request): Json<TelemetryRequest>,
) -> (StatusCode, Json<TelemetryResponse>) {
    let mut measurements = Vec::new();
    if let Some(hr) = request.metrics.hr {
        measurements.push(Measurement {
            metric: "hr".to_string(),
            value: hr,
            unit: "bpm".to_string(),
        });
    }
    if let Some(spo2) = request.metrics.spo2 {
        measurements.push(Measurement {
            metric: "spo2".to_string(),
            value: spo2,
            unit: "percent".to_string(),
        });
    }
    if let Some(temp) = request.metrics.temp {
        measurements.push(Measurement {
            metric: "temp".to_string(),
            value: temp,
            unit: "fahrenheit".to_string(),
        });
    }

    let mut metadata = HashMap::new();
    if let Some(meta) = request.meta {
        if let Some(battery) = meta.battery {
            metadata.insert("battery".to_string(), battery.to_string());
        }
        if let Some(firmware) = meta.firmware {
            metadata.insert("firmware".to_string(), firmware);
        }
    }

    let input = MeasurementsInput {
        device_id: request.device_id,
        device_type: None,
        timestamp: request.timestamp,
        measurements,
        metadata: if metadata.is_empty() { None } else { Some(metadata) },
    };

    match service.ingest(input).await {
        Ok(event) => (
            StatusCode::OK,
            Json(TelemetryResponse {
                success: true,
                event_id: Some(event.envelope.event_id),
                message: "accepted".to_string(),
            }),
        ),
        Err(DomainError::Validation(message)) => (
            StatusCode::BAD_REQUEST,
            Json(TelemetryResponse {
                success: false,
                event_id: None,
                message,
            }),
        ),
        Err(DomainError::DeviceNotFound(device_id)) => (
            StatusCode::NOT_FOUND,
            Json(TelemetryResponse {
                success: false,
                event_id: None,
                message: format!("device not registered: {device_id}"),
            }),
        ),
        Err(e) => {
            error!(error = %e, "Telemetry ingest failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(TelemetryResponse {
                    success: false,
                    event_id: None,
                    message: "internal error".to_string(),
                }),
            )
        }
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        service: "ingest-gateway",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use vitalstream_domain::events::RawTelemetry;
    use vitalstream_domain::repository::{MockRawTelemetryProducer, MockRegistryReader};

    fn app(producer: MockRawTelemetryProducer) -> Router {
        router(Arc::new(IngestionService::new(
            Arc::new(MockRegistryReader::new()),
            Arc::new(producer),
            false,
        )))
    }

    fn telemetry_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/telemetry")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn accepts_full_payload_and_returns_event_id() {
        let mut producer = MockRawTelemetryProducer::new();
        producer
            .expect_publish()
            .withf(|event: &RawTelemetry| {
                event.device_id == "D1"
                    && event.measurements.len() == 3
                    && event
                        .measurements
                        .iter()
                        .any(|m| m.metric == "temp" && m.unit == "fahrenheit" && m.value == 98.6)
            })
            .times(1)
            .return_once(|_| Ok(()));

        let response = app(producer)
            .oneshot(telemetry_request(serde_json::json!({
                "deviceId": "D1",
                "timestamp": "2024-01-15T10:30:00.000Z",
                "metrics": {"hr": 72, "spo2": 98, "temp": 98.6},
                "meta": {"battery": 87.5, "firmware": "v1.2.3"}
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert!(body["eventId"].as_str().unwrap().starts_with("evt_"));
    }

    #[tokio::test]
    async fn empty_metrics_is_rejected() {
        let response = app(MockRawTelemetryProducer::new())
            .oneshot(telemetry_request(serde_json::json!({
                "deviceId": "D1",
                "timestamp": "2024-01-15T10:30:00.000Z",
                "metrics": {}
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn malformed_timestamp_is_rejected() {
        let response = app(MockRawTelemetryProducer::new())
            .oneshot(telemetry_request(serde_json::json!({
                "deviceId": "D1",
                "timestamp": "sometime today",
                "metrics": {"hr": 72}
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn broker_outage_maps_to_internal_error() {
        let mut producer = MockRawTelemetryProducer::new();
        producer
            .expect_publish()
            .times(1)
            .return_once(|_| Err(DomainError::Transport(anyhow::anyhow!("broker down"))));

        let response = app(producer)
            .oneshot(telemetry_request(serde_json::json!({
                "deviceId": "D1",
                "metrics": {"hr": 72}
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn health_endpoint_responds() {
        let response = app(MockRawTelemetryProducer::new())
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
    }
}
