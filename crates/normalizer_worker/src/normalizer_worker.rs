use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use vitalstream_domain::normalizer_service::{ClampBounds, NormalizerService};
use vitalstream_nats::{NatsClient, NatsConsumer, NormalizedTelemetryJsonProducer, RetryPolicy};

use crate::processor::create_normalizer_processor;

pub struct NormalizerWorkerConfig {
    pub input_stream: String,
    pub output_stream: String,
    pub consumer_group: String,
    pub batch_size: usize,
    pub batch_wait_secs: u64,
    pub max_deliveries: u32,
    pub clamp_bounds: ClampBounds,
    pub retry: RetryPolicy,
}

/// Stage C4: consumes raw telemetry and emits normalized telemetry.
pub struct NormalizerWorker {
    consumer: NatsConsumer,
}

impl NormalizerWorker {
    pub async fn new(nats_client: Arc<NatsClient>, config: NormalizerWorkerConfig) -> Result<Self> {
        info!("Initializing normalizer worker");

        let producer = Arc::new(NormalizedTelemetryJsonProducer::new(
            nats_client.create_publisher_client(),
            config.output_stream.clone(),
            config.retry,
        ));
        let service = Arc::new(NormalizerService::new(producer, config.clamp_bounds));

        let consumer = NatsConsumer::new(
            nats_client.create_consumer_client(),
            &config.input_stream,
            &config.consumer_group,
            &format!("{}.*", config.input_stream),
            config.batch_size,
            config.batch_wait_secs,
            config.max_deliveries,
            create_normalizer_processor(service),
        )
        .await?;

        info!("Normalizer worker initialized");
        Ok(Self { consumer })
    }

    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        self.consumer.run(ctx).await
    }
}
