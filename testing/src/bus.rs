//! In-memory event bus.

use async_stream::stream;
use concourse_core::{BusMessage, CloudEvent, EventBus, EventBusError, EventStream};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

#[derive(Debug)]
struct Subscriber {
    topics: Vec<String>,
    sender: mpsc::UnboundedSender<BusMessage>,
}

#[derive(Debug, Default)]
struct Inner {
    published: Vec<(String, BusMessage)>,
    subscribers: Vec<Subscriber>,
    failing_subscribes: usize,
}

/// Fan-out bus living entirely in memory.
///
/// Every message published to a topic is delivered to each live subscription
/// on that topic, including subscriptions held by the publisher itself, just
/// like a shared broker topic. Published messages are also recorded so tests
/// can assert on outbound traffic.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventBus {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryEventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every message published so far, in order.
    #[must_use]
    pub fn published(&self) -> Vec<BusMessage> {
        self.lock()
            .published
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Published messages decoded as events, skipping undecodable ones.
    #[must_use]
    pub fn published_events(&self) -> Vec<CloudEvent> {
        self.published()
            .iter()
            .filter_map(|message| CloudEvent::from_message(message).ok())
            .collect()
    }

    /// Decoded events of one type.
    #[must_use]
    pub fn published_of_type(&self, event_type: &str) -> Vec<CloudEvent> {
        self.published_events()
            .into_iter()
            .filter(|event| event.event_type == event_type)
            .collect()
    }

    /// Forget recorded messages.
    pub fn clear(&self) {
        self.lock().published.clear();
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|s| !s.sender.is_closed());
        inner.subscribers.len()
    }

    /// End every open subscription stream, as a dropped broker connection would.
    pub fn drop_subscriptions(&self) {
        self.lock().subscribers.clear();
    }

    /// Make the next `count` subscribe calls fail.
    pub fn fail_next_subscribes(&self, count: usize) {
        self.lock().failing_subscribes = count;
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        topic: &str,
        message: &BusMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let message = message.clone();
        Box::pin(async move {
            let mut inner = self.lock();
            inner.subscribers.retain(|subscriber| {
                if !subscriber.topics.iter().any(|t| *t == topic) {
                    return !subscriber.sender.is_closed();
                }
                subscriber.sender.send(message.clone()).is_ok()
            });
            inner.published.push((topic, message));
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|t| (*t).to_string()).collect();
        Box::pin(async move {
            let mut inner = self.lock();
            if inner.failing_subscribes > 0 {
                inner.failing_subscribes -= 1;
                return Err(EventBusError::SubscriptionFailed {
                    topics,
                    reason: "in-memory bus configured to fail".to_string(),
                });
            }

            let (sender, mut receiver) = mpsc::unbounded_channel();
            inner.subscribers.push(Subscriber { topics, sender });
            drop(inner);

            let stream: EventStream = Box::pin(stream! {
                while let Some(message) = receiver.recv().await {
                    yield Ok(message);
                }
            });
            Ok(stream)
        })
    }
}
