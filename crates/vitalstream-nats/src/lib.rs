pub mod client;
pub mod consumer;
pub mod producers;
pub mod retry;
pub mod traits;

pub use client::NatsClient;
pub use consumer::{BatchProcessor, NatsConsumer, ProcessingResult};
pub use producers::{
    AlertJsonProducer, EnrichedTelemetryJsonProducer, NormalizedTelemetryJsonProducer,
    RawTelemetryJsonProducer, ScoredTelemetryJsonProducer,
};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use traits::{JetStreamConsumer, JetStreamPublisher, PullConsumer};

#[cfg(any(test, feature = "testing"))]
pub use traits::{MockJetStreamConsumer, MockJetStreamPublisher, MockPullConsumer};
