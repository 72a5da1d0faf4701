//! Redpanda event bus implementation for Concourse.
//!
//! This crate provides a Kafka-compatible [`EventBus`] built on rdkafka. The
//! marketplace shares a single fan-out topic; every participant (and the
//! controller) publishes to it and reads all of it.
//!
//! # Wire mapping
//!
//! ```text
//! BusMessage                Kafka record
//! ───────────────────────   ─────────────────────────────
//! headers["ce_<attr>"]  ──▶ header "ce_<attr>"
//! content_type          ──▶ header "content-type"
//! payload               ──▶ value
//! ce_source             ──▶ key (per-participant ordering)
//! ```
//!
//! Decoding is the inverse. Headers are carried untouched, so both header
//! prefixes understood by `concourse-core` survive the trip, and a message can
//! be republished byte-for-byte.
//!
//! # Delivery Semantics
//!
//! Offsets are committed after the message is handed to the subscriber's
//! channel. The controller processes each delivered message once and does not
//! retry failed publishes.
//!
//! # Example
//!
//! ```no_run
//! use concourse_redpanda::RedpandaEventBus;
//! use concourse_core::event_bus::EventBus;
//! use concourse_core::event::CloudEvent;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let event_bus = RedpandaEventBus::new("localhost:9092")?;
//!
//! let reset = CloudEvent::new("Reset", "Controller").with_defaults();
//! event_bus.publish("concourse", &reset.to_message()).await?;
//!
//! let mut stream = event_bus.subscribe(&["concourse"]).await?;
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(message) => println!("Received: {:?}", message.attribute("type")),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use concourse_core::event::BusMessage;
use concourse_core::event_bus::{EventBus, EventBusError, EventStream};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Header carrying the transport content type.
pub const CONTENT_TYPE_HEADER: &str = "content-type";

/// Redpanda event bus implementation.
///
/// # Configuration
///
/// - **Broker addresses**: Bootstrap servers (required)
/// - **Consumer group**: Explicit ID or auto-generated from topics
/// - **Buffer size**: Message buffer capacity (default: 1000)
/// - **Offset reset**: Where new groups start reading (default: "latest")
///
/// # Example
///
/// ```no_run
/// use concourse_redpanda::RedpandaEventBus;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let event_bus = RedpandaEventBus::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .consumer_group("concourse-controller")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaEventBus {
    /// Kafka producer for publishing messages
    producer: FutureProducer,
    /// Broker addresses (for creating consumers)
    brokers: String,
    /// Producer timeout
    timeout: Duration,
    /// Consumer group ID (if explicitly set)
    consumer_group: Option<String>,
    /// Message buffer size for subscribers
    buffer_size: usize,
    /// Auto offset reset policy
    auto_offset_reset: String,
}

impl RedpandaEventBus {
    /// Create a new Redpanda event bus with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if the producer cannot be created.
    pub fn new(brokers: &str) -> Result<Self, EventBusError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a new builder for configuring the event bus.
    #[must_use]
    pub fn builder() -> RedpandaEventBusBuilder {
        RedpandaEventBusBuilder::default()
    }

    /// Get a reference to the brokers string.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }
}

/// Builder for configuring a [`RedpandaEventBus`].
#[derive(Default)]
pub struct RedpandaEventBusBuilder {
    brokers: Option<String>,
    timeout: Option<Duration>,
    consumer_group: Option<String>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
}

impl RedpandaEventBusBuilder {
    /// Set the broker addresses (comma-separated).
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the producer send timeout.
    ///
    /// Default: 5 seconds
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the consumer group ID for subscriptions.
    ///
    /// If not set, the consumer group is derived from the subscribed topics.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Set the message buffer size for subscriptions (default: 1000).
    ///
    /// A zero size is bumped to one.
    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size.max(1));
        self
    }

    /// Set the auto offset reset policy for new consumer groups (default: "latest").
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Build the [`RedpandaEventBus`].
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if:
    /// - Brokers not set
    /// - Cannot create producer
    pub fn build(self) -> Result<RedpandaEventBus, EventBusError> {
        let brokers = self
            .brokers
            .ok_or_else(|| EventBusError::ConnectionFailed("Brokers not configured".to_string()))?;

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| {
                EventBusError::ConnectionFailed(format!("Failed to create producer: {e}"))
            })?;

        tracing::info!(
            brokers = %brokers,
            buffer_size = self.buffer_size.unwrap_or(1000),
            auto_offset_reset = self.auto_offset_reset.as_deref().unwrap_or("latest"),
            "RedpandaEventBus created successfully"
        );

        Ok(RedpandaEventBus {
            producer,
            brokers,
            timeout: self.timeout.unwrap_or(Duration::from_secs(5)),
            consumer_group: self.consumer_group,
            buffer_size: self.buffer_size.unwrap_or(1000),
            auto_offset_reset: self
                .auto_offset_reset
                .unwrap_or_else(|| "latest".to_string()),
        })
    }
}

/// Convert a message's headers and content type into Kafka record headers.
#[must_use]
pub fn to_kafka_headers(message: &BusMessage) -> OwnedHeaders {
    let mut headers = OwnedHeaders::new_with_capacity(message.headers.len() + 1);
    if let Some(content_type) = &message.content_type {
        headers = headers.insert(Header {
            key: CONTENT_TYPE_HEADER,
            value: Some(content_type.as_str()),
        });
    }
    for (key, value) in &message.headers {
        headers = headers.insert(Header {
            key: key.as_str(),
            value: Some(value.as_str()),
        });
    }
    headers
}

/// Rebuild a [`BusMessage`] from Kafka header pairs and the record value.
///
/// Headers with no value or a non UTF-8 value are dropped.
pub fn from_kafka_parts<'a, I>(headers: I, payload: Option<&[u8]>) -> BusMessage
where
    I: IntoIterator<Item = (&'a str, Option<&'a [u8]>)>,
{
    let mut content_type = None;
    let mut map = BTreeMap::new();
    for (key, value) in headers {
        let Some(value) = value.and_then(|v| std::str::from_utf8(v).ok()) else {
            continue;
        };
        if key.eq_ignore_ascii_case(CONTENT_TYPE_HEADER) {
            content_type = Some(value.to_string());
        } else {
            map.insert(key.to_string(), value.to_string());
        }
    }
    BusMessage {
        content_type,
        headers: map,
        payload: payload.map(<[u8]>::to_vec).unwrap_or_default(),
    }
}

impl EventBus for RedpandaEventBus {
    fn publish(
        &self,
        topic: &str,
        message: &BusMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let message = message.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            // Keyed by source so one participant's events stay in order.
            let key = message.attribute("source").unwrap_or_default().to_string();
            let record = FutureRecord::to(&topic)
                .payload(&message.payload)
                .key(key.as_str())
                .headers(to_kafka_headers(&message));

            match self.producer.send(record, Timeout::After(timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %topic,
                        partition = partition,
                        offset = offset,
                        event_type = message.attribute("type").unwrap_or_default(),
                        "Message published successfully"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::error!(
                        topic = %topic,
                        error = %kafka_error,
                        "Failed to publish message"
                    );
                    Err(EventBusError::PublishFailed {
                        topic,
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();
        let brokers = self.brokers.clone();
        let consumer_group = self.consumer_group.clone();
        let buffer_size = self.buffer_size;
        let auto_offset_reset = self.auto_offset_reset.clone();

        Box::pin(async move {
            let consumer_group_id = consumer_group.unwrap_or_else(|| {
                let mut sorted_topics = topics.clone();
                sorted_topics.sort();
                format!("concourse-{}", sorted_topics.join("-"))
            });

            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &brokers)
                .set("group.id", &consumer_group_id)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", &auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to create consumer: {e}"),
                })?;

            let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
            consumer
                .subscribe(&topic_refs)
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to subscribe to topics: {e}"),
                })?;

            tracing::info!(
                topics = ?topics,
                consumer_group = %consumer_group_id,
                buffer_size = buffer_size,
                auto_offset_reset = %auto_offset_reset,
                "Subscribed to topics"
            );

            let (tx, rx) = tokio::sync::mpsc::channel(buffer_size);

            // The consumer task owns the consumer; a transport error ends the
            // stream so the caller can resubscribe.
            tokio::spawn(async move {
                use futures::StreamExt;
                use rdkafka::consumer::CommitMode;

                let mut stream = consumer.stream();

                while let Some(msg_result) = stream.next().await {
                    match msg_result {
                        Ok(record) => {
                            let pairs = record
                                .headers()
                                .map(|h| h.iter().map(|header| (header.key, header.value)).collect::<Vec<_>>())
                                .unwrap_or_default();
                            let message = from_kafka_parts(pairs, record.payload());

                            tracing::trace!(
                                topic = record.topic(),
                                partition = record.partition(),
                                offset = record.offset(),
                                "Received message"
                            );

                            if tx.send(Ok(message)).await.is_err() {
                                tracing::debug!("Channel receiver dropped, exiting consumer task");
                                break;
                            }

                            if let Err(e) = consumer.commit_message(&record, CommitMode::Async) {
                                tracing::warn!(
                                    topic = record.topic(),
                                    partition = record.partition(),
                                    offset = record.offset(),
                                    error = %e,
                                    "Failed to commit offset"
                                );
                            }
                        }
                        Err(e) => {
                            let err = EventBusError::TransportError(format!(
                                "Failed to receive message: {e}"
                            ));
                            let _ = tx.send(Err(err)).await;
                            break;
                        }
                    }
                }

                tracing::debug!("Consumer task exiting");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as EventStream)
        })
    }
}
