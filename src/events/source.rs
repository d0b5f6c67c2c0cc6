use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::EventRecord;

#[derive(Error, Debug)]
pub enum EventSourceError {
    #[error("Invalid event hub connection string: {0}")]
    ConnectionString(String),

    #[error("Event hub client error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Event hub metadata error: {0}")]
    Metadata(String),

    #[error("Event hub worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// A subscription that pushes events into a channel.
///
/// Implementations must return once `sink` is closed: the collector drops the
/// receiving half to cancel a subscription. Errors on individual deliveries
/// are logged and skipped rather than ending the subscription.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn pump(&self, sink: mpsc::Sender<EventRecord>) -> Result<(), EventSourceError>;
}
