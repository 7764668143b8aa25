//! Broker publishing.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::IntegrationEvent;

use crate::error::PublishError;

/// Sends integration events to a message broker.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes one event to a topic.
    async fn publish(&self, topic: &str, event: &IntegrationEvent) -> Result<(), PublishError>;
}

#[async_trait]
impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    async fn publish(&self, topic: &str, event: &IntegrationEvent) -> Result<(), PublishError> {
        (**self).publish(topic, event).await
    }
}

/// Publisher that writes every event to the log.
///
/// Used when no broker is configured.
#[derive(Debug, Clone, Default)]
pub struct LoggingPublisher;

#[async_trait]
impl Publisher for LoggingPublisher {
    async fn publish(&self, topic: &str, event: &IntegrationEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| PublishError::Rejected(e.to_string()))?;
        tracing::info!(
            topic,
            event_type = event.event_type(),
            %payload,
            "Published integration event"
        );
        Ok(())
    }
}

/// A message accepted by the [`InMemoryPublisher`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub event: IntegrationEvent,
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    published: Vec<PublishedMessage>,
    fail_next: usize,
    unavailable: bool,
}

/// In-memory publisher for tests.
///
/// Records every accepted message and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPublisher {
    state: Arc<RwLock<InMemoryPublisherState>>,
}

impl InMemoryPublisher {
    /// Creates a new in-memory publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` publish calls fail.
    pub fn fail_next(&self, count: usize) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_next = count;
    }

    /// Makes every publish call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .unavailable = unavailable;
    }

    /// Returns the accepted messages in publish order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .published
            .clone()
    }

    /// Returns the number of accepted messages.
    pub fn published_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .published
            .len()
    }
}

#[async_trait]
impl Publisher for InMemoryPublisher {
    async fn publish(&self, topic: &str, event: &IntegrationEvent) -> Result<(), PublishError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.unavailable {
            return Err(PublishError::Unavailable("broker is down".to_string()));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(PublishError::Unavailable("connection reset".to_string()));
        }

        state.published.push(PublishedMessage {
            topic: topic.to_string(),
            event: event.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;
    use domain::IntegrationEventContract;
    use domain::integration::CompanyDeletedV1;

    fn event() -> IntegrationEvent {
        CompanyDeletedV1 {
            company_id: AggregateId::new(),
            code: "ACME".to_string(),
        }
        .into_event()
    }

    #[tokio::test]
    async fn records_published_messages() {
        let publisher = InMemoryPublisher::new();
        publisher.publish("companies", &event()).await.unwrap();

        let published = publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "companies");
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let publisher = InMemoryPublisher::new();
        publisher.fail_next(1);

        assert!(publisher.publish("companies", &event()).await.is_err());
        assert!(publisher.publish("companies", &event()).await.is_ok());
        assert_eq!(publisher.published_count(), 1);
    }

    #[tokio::test]
    async fn logging_publisher_accepts_everything() {
        assert!(LoggingPublisher.publish("companies", &event()).await.is_ok());
    }
}
