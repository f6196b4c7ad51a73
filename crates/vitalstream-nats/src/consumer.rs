use anyhow::{Context, Result};
use async_nats::jetstream::{self, Message};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::traits::{JetStreamConsumer, PullConsumer};

/// How messages in a processed batch are settled: acknowledged (offset
/// committed) or rejected (redelivered by the broker).
#[derive(Debug)]
pub struct ProcessingResult {
    /// Indices of messages that were fully processed, including all of their
    /// downstream publishes, and can be committed.
    pub ack: Vec<usize>,
    /// Indices of messages that failed and should be redelivered, with
    /// optional error details.
    pub nak: Vec<(usize, Option<String>)>,
}

impl ProcessingResult {
    pub fn ack_all(count: usize) -> Self {
        Self {
            ack: (0..count).collect(),
            nak: Vec::new(),
        }
    }

    pub fn nak_all(count: usize, error: Option<String>) -> Self {
        Self {
            ack: Vec::new(),
            nak: (0..count).map(|i| (i, error.clone())).collect(),
        }
    }

    pub fn new(ack: Vec<usize>, nak: Vec<(usize, Option<String>)>) -> Self {
        Self { ack, nak }
    }
}

/// Batch processor: deserializes and processes a slice of raw messages,
/// deciding per message whether to ack or nak.
pub type BatchProcessor =
    Box<dyn Fn(&[Message]) -> BoxFuture<'static, Result<ProcessingResult>> + Send + Sync>;

/// Durable JetStream pull consumer running one stage of the pipeline.
///
/// The consumer owns fetching and settlement; deserialization and business
/// logic live in the processor. A message is acked only after the processor
/// reports success, so a crash before settlement means redelivery, never
/// loss. Messages that keep failing are dropped after `max_deliveries`
/// attempts to avoid head-of-line blocking on a poison payload.
pub struct NatsConsumer {
    consumer: Box<dyn PullConsumer>,
    batch_size: usize,
    max_wait: Duration,
    max_deliveries: i64,
    processor: BatchProcessor,
}

impl NatsConsumer {
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        jetstream: Arc<dyn JetStreamConsumer>,
        stream_name: &str,
        consumer_name: &str,
        subject_filter: &str,
        batch_size: usize,
        max_wait_secs: u64,
        max_deliveries: u32,
        processor: BatchProcessor,
    ) -> Result<Self> {
        debug!(
            stream = stream_name,
            consumer = consumer_name,
            subject = subject_filter,
            "Creating JetStream consumer"
        );

        let config = jetstream::consumer::pull::Config {
            name: Some(consumer_name.to_string()),
            durable_name: Some(consumer_name.to_string()),
            filter_subject: subject_filter.to_string(),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            ..Default::default()
        };

        let consumer = jetstream
            .create_consumer(config, stream_name)
            .await
            .context("Failed to create consumer")?;

        info!(
            stream = stream_name,
            consumer = consumer_name,
            "Consumer created successfully"
        );

        Ok(Self {
            consumer,
            batch_size,
            max_wait: Duration::from_secs(max_wait_secs),
            max_deliveries: i64::from(max_deliveries),
            processor,
        })
    }

    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        info!("Starting consumer loop");

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("Received shutdown signal, stopping consumer");
                    break;
                }
                result = self.fetch_and_process_batch() => {
                    if let Err(e) = result {
                        error!(error = %e, "Error processing batch");
                        // Transient fetch errors must not kill the loop.
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        info!("Consumer stopped gracefully");
        Ok(())
    }

    async fn fetch_and_process_batch(&self) -> Result<()> {
        let raw_messages = self
            .consumer
            .fetch_messages(self.batch_size, self.max_wait)
            .await?;

        if raw_messages.is_empty() {
            return Ok(());
        }

        debug!(message_count = raw_messages.len(), "Received message batch");

        let processing_result = match (self.processor)(&raw_messages).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Processor returned error, rejecting all messages");
                ProcessingResult::nak_all(raw_messages.len(), Some(e.to_string()))
            }
        };

        for idx in processing_result.ack {
            match raw_messages.get(idx) {
                Some(msg) => {
                    if let Err(e) = msg.ack().await {
                        error!(error = %e, message_index = idx, "Failed to acknowledge message");
                    }
                }
                None => {
                    warn!(
                        message_index = idx,
                        batch_size = raw_messages.len(),
                        "Invalid ack index in ProcessingResult"
                    );
                }
            }
        }

        for (idx, error_msg) in processing_result.nak {
            let Some(msg) = raw_messages.get(idx) else {
                warn!(
                    message_index = idx,
                    batch_size = raw_messages.len(),
                    "Invalid nak index in ProcessingResult"
                );
                continue;
            };

            let delivered = msg.info().map(|info| info.delivered).unwrap_or(1);
            if delivered >= self.max_deliveries {
                error!(
                    message_index = idx,
                    subject = %msg.subject,
                    deliveries = delivered,
                    error = error_msg.as_deref().unwrap_or("unknown"),
                    "Dropping poison message after repeated failures"
                );
                if let Err(e) = msg.ack().await {
                    error!(error = %e, message_index = idx, "Failed to drop poison message");
                }
                continue;
            }

            warn!(
                message_index = idx,
                subject = %msg.subject,
                deliveries = delivered,
                error = error_msg.as_deref().unwrap_or("unspecified"),
                "Rejecting message for redelivery"
            );
            if let Err(e) = msg.ack_with(jetstream::AckKind::Nak(None)).await {
                error!(error = %e, message_index = idx, "Failed to reject message");
            }
        }

        Ok(())
    }
}
