use anyhow::Result;
use async_nats::jetstream;
use async_trait::async_trait;

/// Trait for JetStream consumer operations.
/// Abstracts the operations needed to create and use a durable pull consumer.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JetStreamConsumer: Send + Sync {
    /// Create a durable pull consumer on a stream.
    async fn create_consumer(
        &self,
        config: jetstream::consumer::pull::Config,
        stream_name: &str,
    ) -> Result<Box<dyn PullConsumer>>;
}

/// Trait for pull consumer operations.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PullConsumer: Send + Sync {
    /// Fetch up to `max_messages` messages, waiting at most `expires`.
    async fn fetch_messages(
        &self,
        max_messages: usize,
        expires: std::time::Duration,
    ) -> Result<Vec<jetstream::Message>>;
}

/// Trait for JetStream publisher operations.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JetStreamPublisher: Send + Sync {
    /// Get an existing stream by name.
    async fn get_stream(&self, stream_name: &str) -> Result<()>;

    /// Create a new stream with the given configuration.
    async fn create_stream(&self, config: jetstream::stream::Config) -> Result<()>;

    /// Publish a message to a subject and await the broker acknowledgment.
    async fn publish(&self, subject: String, payload: bytes::Bytes) -> Result<()>;
}
