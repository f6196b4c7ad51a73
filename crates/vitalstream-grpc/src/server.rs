use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{error, info};

use anomaly_service::ScoringService;
use registry_service::RegistryService;
use vitalstream_domain::ingestion_service::IngestionService;
use vitalstream_proto::anomaly::v1::anomaly_detection_server::AnomalyDetectionServer;
use vitalstream_proto::gateway::v1::telemetry_gateway_server::TelemetryGatewayServer;
use vitalstream_proto::registry::v1::registry_server::RegistryServer;

use crate::anomaly_handler::AnomalyServiceHandler;
use crate::gateway_handler::TelemetryGatewayHandler;
use crate::registry_handler::RegistryServiceHandler;

/// gRPC server configuration.
pub struct GrpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GrpcServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 50051,
        }
    }
}

/// Runs the platform's three RPC services on one listener with graceful
/// shutdown.
pub async fn run_grpc_server(
    config: GrpcServerConfig,
    registry_service: Arc<RegistryService>,
    scoring_service: Arc<ScoringService>,
    ingestion_service: Arc<IngestionService>,
    cancellation_token: CancellationToken,
) -> Result<(), anyhow::Error> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid gRPC server address: {e}"))?;

    info!("Starting gRPC server on {}", addr);

    let registry_handler = RegistryServiceHandler::new(registry_service);
    let anomaly_handler = AnomalyServiceHandler::new(scoring_service);
    let gateway_handler = TelemetryGatewayHandler::new(ingestion_service);

    let server = Server::builder()
        .add_service(RegistryServer::new(registry_handler))
        .add_service(AnomalyDetectionServer::new(anomaly_handler))
        .add_service(TelemetryGatewayServer::new(gateway_handler))
        .serve_with_shutdown(addr, async move {
            cancellation_token.cancelled().await;
            info!("gRPC server shutdown signal received");
        });

    match server.await {
        Ok(_) => {
            info!("gRPC server stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error!("gRPC server error: {}", e);
            Err(e.into())
        }
    }
}
