pub mod anomaly_client;
pub mod anomaly_handler;
pub mod conversions;
pub mod gateway_handler;
pub mod registry_client;
pub mod registry_handler;
pub mod server;

pub use anomaly_client::{GrpcScorerConfig, GrpcVitalsScorer};
pub use anomaly_handler::AnomalyServiceHandler;
pub use gateway_handler::TelemetryGatewayHandler;
pub use registry_client::{GrpcRegistryConfig, GrpcRegistryReader};
pub use registry_handler::RegistryServiceHandler;
pub use server::{run_grpc_server, GrpcServerConfig};
