use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use vitalstream_domain::repository::VitalsScorer;
use vitalstream_domain::rules::RuleConstants;
use vitalstream_domain::rules_service::RulesService;
use vitalstream_nats::{
    AlertJsonProducer, NatsClient, NatsConsumer, RetryPolicy, ScoredTelemetryJsonProducer,
};

use crate::processor::create_rules_processor;

pub struct RulesWorkerConfig {
    pub input_stream: String,
    pub scored_stream: String,
    pub alerts_stream: String,
    pub consumer_group: String,
    pub batch_size: usize,
    pub batch_wait_secs: u64,
    pub max_deliveries: u32,
    pub rule_constants: RuleConstants,
    pub retry: RetryPolicy,
}

/// Stage C6: fuses threshold rules with anomaly scores, emits scored
/// telemetry and alerts.
pub struct RulesWorker {
    consumer: NatsConsumer,
}

impl RulesWorker {
    pub async fn new(
        nats_client: Arc<NatsClient>,
        scorer: Arc<dyn VitalsScorer>,
        config: RulesWorkerConfig,
    ) -> Result<Self> {
        info!("Initializing rules worker");

        let scored_producer = Arc::new(ScoredTelemetryJsonProducer::new(
            nats_client.create_publisher_client(),
            config.scored_stream.clone(),
            config.retry,
        ));
        let alert_producer = Arc::new(AlertJsonProducer::new(
            nats_client.create_publisher_client(),
            config.alerts_stream.clone(),
            config.retry,
        ));
        let service = Arc::new(RulesService::new(
            scorer,
            scored_producer,
            alert_producer,
            config.rule_constants,
        ));

        let consumer = NatsConsumer::new(
            nats_client.create_consumer_client(),
            &config.input_stream,
            &config.consumer_group,
            &format!("{}.*", config.input_stream),
            config.batch_size,
            config.batch_wait_secs,
            config.max_deliveries,
            create_rules_processor(service),
        )
        .await?;

        info!("Rules worker initialized");
        Ok(Self { consumer })
    }

    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        self.consumer.run(ctx).await
    }
}
