use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use vitalstream_domain::enricher_service::EnricherService;
use vitalstream_domain::repository::RegistryReader;
use vitalstream_nats::{EnrichedTelemetryJsonProducer, NatsClient, NatsConsumer, RetryPolicy};

use crate::processor::create_enricher_processor;

pub struct EnricherWorkerConfig {
    pub input_stream: String,
    pub output_stream: String,
    pub consumer_group: String,
    pub batch_size: usize,
    pub batch_wait_secs: u64,
    pub max_deliveries: u32,
    pub retry: RetryPolicy,
}

/// Stage C5: attaches registry context to normalized telemetry.
pub struct EnricherWorker {
    consumer: NatsConsumer,
}

impl EnricherWorker {
    pub async fn new(
        nats_client: Arc<NatsClient>,
        registry: Arc<dyn RegistryReader>,
        config: EnricherWorkerConfig,
    ) -> Result<Self> {
        info!("Initializing enricher worker");

        let producer = Arc::new(EnrichedTelemetryJsonProducer::new(
            nats_client.create_publisher_client(),
            config.output_stream.clone(),
            config.retry,
        ));
        let service = Arc::new(EnricherService::new(registry, producer));

        let consumer = NatsConsumer::new(
            nats_client.create_consumer_client(),
            &config.input_stream,
            &config.consumer_group,
            &format!("{}.*", config.input_stream),
            config.batch_size,
            config.batch_wait_secs,
            config.max_deliveries,
            create_enricher_processor(service),
        )
        .await?;

        info!("Enricher worker initialized");
        Ok(Self { consumer })
    }

    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        self.consumer.run(ctx).await
    }
}
