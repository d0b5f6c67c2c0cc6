use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaResult;
use rdkafka::{ClientConfig, Message, Offset, TopicPartitionList};
use tokio::sync::mpsc;

use super::{EventRecord, EventSource, EventSourceError};
use crate::config::EventsConfig;

/// Event Hubs namespaces expose a Kafka-compatible listener on this port.
const KAFKA_PORT: u16 = 9093;

const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// The parts of an Event Hubs connection string needed to reach the broker.
#[derive(Debug, PartialEq, Eq)]
pub struct EventHubConnection {
    pub namespace_host: String,
    pub entity_path: Option<String>,
}

impl EventHubConnection {
    pub fn parse(raw: &str) -> Result<Self, EventSourceError> {
        let mut endpoint = None;
        let mut entity_path = None;

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                EventSourceError::ConnectionString("segment without '='".to_string())
            })?;
            match key.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value.trim()),
                "entitypath" => entity_path = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let endpoint = endpoint
            .ok_or_else(|| EventSourceError::ConnectionString("missing Endpoint".to_string()))?;
        let namespace_host = endpoint
            .split_once("://")
            .map_or(endpoint, |(_, rest)| rest)
            .trim_end_matches('/')
            .to_string();
        if namespace_host.is_empty() {
            return Err(EventSourceError::ConnectionString(
                "empty Endpoint host".to_string(),
            ));
        }

        Ok(Self {
            namespace_host,
            entity_path: entity_path.filter(|p| !p.is_empty()),
        })
    }
}

/// Reads an Event Hub through the namespace's Kafka endpoint, starting at the
/// newest event of every partition.
///
/// Partitions are assigned directly rather than through a group join, so
/// concurrent pulls each see every partition and no rebalance is waited on.
pub struct KafkaEventSource {
    bootstrap_servers: String,
    topic: String,
    consumer_group: String,
    connection_string: String,
}

impl KafkaEventSource {
    pub fn from_connection_string(
        connection_string: &str,
        config: &EventsConfig,
    ) -> Result<Self, EventSourceError> {
        let parsed = EventHubConnection::parse(connection_string)?;
        let topic = config
            .event_hub_name
            .clone()
            .or(parsed.entity_path)
            .ok_or_else(|| {
                EventSourceError::ConnectionString(
                    "no EntityPath in connection string and EH_NAME is unset".to_string(),
                )
            })?;

        Ok(Self {
            bootstrap_servers: format!("{}:{}", parsed.namespace_host, KAFKA_PORT),
            topic,
            consumer_group: config.consumer_group.clone(),
            connection_string: connection_string.to_string(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", self.bootstrap_servers.as_str())
            .set("security.protocol", "SASL_SSL")
            .set("sasl.mechanism", "PLAIN")
            .set("sasl.username", "$ConnectionString")
            .set("sasl.password", self.connection_string.as_str())
            .set("group.id", self.consumer_group.as_str())
            .set("enable.auto.commit", "false");
        config
    }

    /// Partition ids of the topic, fetched off the async workers since the
    /// metadata call blocks.
    async fn partitions(&self, consumer: Arc<StreamConsumer>) -> Result<Vec<i32>, EventSourceError> {
        let topic = self.topic.clone();
        let metadata = tokio::task::spawn_blocking(move || {
            consumer.fetch_metadata(Some(&topic), METADATA_TIMEOUT)
        })
        .await??;

        let topic = metadata
            .topics()
            .iter()
            .find(|t| t.name() == self.topic)
            .ok_or_else(|| EventSourceError::Metadata(format!("topic {} not found", self.topic)))?;
        if let Some(err) = topic.error() {
            return Err(EventSourceError::Metadata(format!(
                "topic {}: {:?}",
                self.topic, err
            )));
        }
        let ids: Vec<i32> = topic.partitions().iter().map(|p| p.id()).collect();
        if ids.is_empty() {
            return Err(EventSourceError::Metadata(format!(
                "topic {} has no partitions",
                self.topic
            )));
        }
        Ok(ids)
    }
}

/// Every partition of `topic`, positioned at its end.
fn partition_assignment(topic: &str, partitions: &[i32]) -> KafkaResult<TopicPartitionList> {
    let mut assignment = TopicPartitionList::with_capacity(partitions.len());
    for &id in partitions {
        assignment.add_partition_offset(topic, id, Offset::End)?;
    }
    Ok(assignment)
}

fn record_from_message<M: Message>(message: &M) -> EventRecord {
    EventRecord {
        partition: message.partition().to_string(),
        offset: message.offset().to_string(),
        // The Kafka offset of an Event Hubs record is its sequence number.
        sequence_number: message.offset(),
        enqueued_time: EventRecord::enqueued_at(message.timestamp().to_millis()),
        body: EventRecord::decode_body(message.payload()),
    }
}

#[async_trait]
impl EventSource for KafkaEventSource {
    async fn pump(&self, sink: mpsc::Sender<EventRecord>) -> Result<(), EventSourceError> {
        let consumer: Arc<StreamConsumer> = Arc::new(self.client_config().create()?);
        let partitions = self.partitions(consumer.clone()).await?;
        consumer.assign(&partition_assignment(&self.topic, &partitions)?)?;
        tracing::info!(
            "Reading {} partitions of event hub {}",
            partitions.len(),
            self.topic
        );

        let mut delivered = 0usize;
        loop {
            let record = tokio::select! {
                _ = sink.closed() => break,
                received = consumer.recv() => match received {
                    Ok(message) => record_from_message(&message.detach()),
                    Err(e) => {
                        tracing::error!("Error processing event: {}", e);
                        continue;
                    }
                },
            };
            if sink.send(record).await.is_err() {
                break;
            }
            delivered += 1;
        }

        // Closing the consumer blocks until librdkafka shuts down.
        tokio::task::spawn_blocking(move || drop(consumer)).await?;
        tracing::info!("Event hub reader closed after {} events", delivered);
        Ok(())
    }
}
