use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use vitalstream_domain::error::{DomainError, DomainResult};
use vitalstream_domain::events::{
    Alert, EnrichedTelemetry, NormalizedTelemetry, RawTelemetry, ScoredTelemetry,
};
use vitalstream_domain::repository::{
    AlertProducer, EnrichedTelemetryProducer, NormalizedTelemetryProducer, RawTelemetryProducer,
    ScoredTelemetryProducer,
};

use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::traits::JetStreamPublisher;
use async_trait::async_trait;

/// Serializes an event to JSON and publishes it to `{base}.{key}` with
/// exponential-backoff retries. The subject key is the device id, which is
/// the pipeline's partition key: per-device order is subject order.
async fn publish_json<T: Serialize>(
    jetstream: &Arc<dyn JetStreamPublisher>,
    retry: &RetryPolicy,
    base_subject: &str,
    key: &str,
    event_id: &str,
    trace_id: &str,
    event: &T,
) -> DomainResult<()> {
    let payload = serde_json::to_vec(event)
        .map_err(|e| DomainError::MalformedEvent(format!("serialization failed: {e}")))?;
    let subject = format!("{base_subject}.{key}");

    debug!(
        subject = %subject,
        event_id = %event_id,
        size_bytes = payload.len(),
        "Publishing event"
    );

    let payload = bytes::Bytes::from(payload);
    retry_with_backoff(retry, base_subject, || {
        let jetstream = Arc::clone(jetstream);
        let subject = subject.clone();
        let payload = payload.clone();
        async move { jetstream.publish(subject, payload).await }
    })
    .await
    .map_err(DomainError::Transport)?;

    info!(
        subject = %subject,
        event_id = %event_id,
        trace_id = %trace_id,
        "Published event"
    );

    Ok(())
}

macro_rules! json_producer {
    ($name:ident, $trait_name:ident, $event:ty, $key:ident) => {
        pub struct $name {
            jetstream: Arc<dyn JetStreamPublisher>,
            base_subject: String,
            retry: RetryPolicy,
        }

        impl $name {
            pub fn new(
                jetstream: Arc<dyn JetStreamPublisher>,
                base_subject: String,
                retry: RetryPolicy,
            ) -> Self {
                info!(base_subject = %base_subject, "Created {}", stringify!($name));
                Self {
                    jetstream,
                    base_subject,
                    retry,
                }
            }
        }

        #[async_trait]
        impl $trait_name for $name {
            async fn publish(&self, event: &$event) -> DomainResult<()> {
                publish_json(
                    &self.jetstream,
                    &self.retry,
                    &self.base_subject,
                    &event.$key,
                    &event.envelope.event_id,
                    &event.envelope.trace_id,
                    event,
                )
                .await
            }
        }
    };
}

json_producer!(RawTelemetryJsonProducer, RawTelemetryProducer, RawTelemetry, device_id);
json_producer!(
    NormalizedTelemetryJsonProducer,
    NormalizedTelemetryProducer,
    NormalizedTelemetry,
    device_id
);
json_producer!(
    EnrichedTelemetryJsonProducer,
    EnrichedTelemetryProducer,
    EnrichedTelemetry,
    device_id
);
json_producer!(
    ScoredTelemetryJsonProducer,
    ScoredTelemetryProducer,
    ScoredTelemetry,
    device_id
);
json_producer!(AlertJsonProducer, AlertProducer, Alert, device_id);
