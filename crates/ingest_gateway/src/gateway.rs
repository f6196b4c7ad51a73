use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use vitalstream_domain::ingestion_service::IngestionService;

use crate::http::router;

/// HTTP ingress of the gateway: owns the listener and serves the telemetry
/// router until the shutdown token fires.
pub struct IngestGateway {
    service: Arc<IngestionService>,
    bind_addr: String,
}

impl IngestGateway {
    pub fn new(service: Arc<IngestionService>, bind_addr: String) -> Self {
        Self { service, bind_addr }
    }

    pub async fn run(self, ctx: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.bind_addr)
            .await
            .with_context(|| format!("Failed to bind HTTP ingress on {}", self.bind_addr))?;

        info!(addr = %self.bind_addr, "HTTP ingress listening");

        axum::serve(listener, router(self.service))
            .with_graceful_shutdown(async move {
                ctx.cancelled().await;
                info!("HTTP ingress shutdown signal received");
            })
            .await
            .context("HTTP ingress server error")?;

        info!("HTTP ingress stopped gracefully");
        Ok(())
    }
}
