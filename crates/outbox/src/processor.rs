//! Claims outbox rows and publishes them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use event_store::{
    ClaimRequest, EventStoreError, OutboxMessage, OutboxStore, TenantFilter,
};
use futures_util::StreamExt;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{OutboxError, Result};
use crate::policy::RetryPolicy;
use crate::publisher::Publisher;
use crate::registry::EventTypeRegistry;

/// Outbox processor settings.
#[derive(Debug, Clone)]
pub struct OutboxProcessorConfig {
    /// Lease owner name; must be unique per running processor.
    ///
    /// The default is a fresh `outbox-<uuid>` so that scaled-out instances
    /// never share a lease identity.
    pub worker_id: String,

    /// Maximum rows claimed per poll.
    pub batch_size: usize,

    /// Time between polls when the outbox is drained.
    pub poll_interval: Duration,

    /// How long a claim stays exclusive.
    pub lease: Duration,

    /// Messages published in parallel within a batch.
    pub concurrency: usize,

    pub retry: RetryPolicy,

    /// Tenants this processor drains.
    pub tenants: TenantFilter,
}

impl Default for OutboxProcessorConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("outbox-{}", Uuid::new_v4()),
            batch_size: 100,
            poll_interval: Duration::from_millis(500),
            lease: Duration::from_secs(30),
            concurrency: 8,
            retry: RetryPolicy::default(),
            tenants: TenantFilter::All,
        }
    }
}

/// Smallest poll interval the processor accepts.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

impl OutboxProcessorConfig {
    /// Clamps values that would stall or crash the poll loop.
    ///
    /// `batch_size` and `concurrency` become at least 1 and `poll_interval`
    /// at least [`MIN_POLL_INTERVAL`].
    pub fn sanitized(mut self) -> Self {
        self.batch_size = self.batch_size.max(1);
        self.concurrency = self.concurrency.max(1);
        self.poll_interval = self.poll_interval.max(MIN_POLL_INTERVAL);
        self
    }
}

/// What happened to the rows of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub claimed: usize,
    pub published: usize,
    pub retried: usize,
    pub failed: usize,
    /// Left claimed because the processor was shutting down.
    pub skipped: usize,
    /// Updates rejected because the lease had moved to another worker.
    pub lease_lost: usize,
    /// Updates that failed in the store; the lease will expire.
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Published,
    Retried,
    Failed,
    Skipped,
    LeaseLost,
    Error,
}

impl BatchReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Published => self.published += 1,
            Outcome::Retried => self.retried += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::LeaseLost => self.lease_lost += 1,
            Outcome::Error => self.errors += 1,
        }
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(1))
}

/// Drains the outbox into a [`Publisher`].
///
/// Each row moves `Pending → Published` on success. A publish error either
/// reschedules the row according to the [`RetryPolicy`] or, once attempts are
/// exhausted, moves it to `Failed`. Rows whose event type is unknown or whose
/// payload does not decode fail immediately without being published.
pub struct OutboxProcessor<S, P> {
    store: S,
    publisher: P,
    registry: Arc<EventTypeRegistry>,
    config: OutboxProcessorConfig,
}

impl<S, P> OutboxProcessor<S, P>
where
    S: OutboxStore,
    P: Publisher,
{
    /// Creates a processor that decodes every built-in contract.
    ///
    /// The configuration is [sanitized](OutboxProcessorConfig::sanitized).
    pub fn new(store: S, publisher: P, config: OutboxProcessorConfig) -> Self {
        Self {
            store,
            publisher,
            registry: Arc::new(EventTypeRegistry::with_defaults()),
            config: config.sanitized(),
        }
    }

    /// Replaces the event type registry.
    pub fn with_registry(mut self, registry: EventTypeRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn config(&self) -> &OutboxProcessorConfig {
        &self.config
    }

    /// Claims one batch and processes it.
    ///
    /// Once `shutdown` fires, messages not yet started are skipped and stay
    /// claimed until their lease expires.
    #[tracing::instrument(skip(self, shutdown), fields(worker_id = %self.config.worker_id))]
    pub async fn process_batch(&self, shutdown: &CancellationToken) -> Result<BatchReport> {
        let start = std::time::Instant::now();
        let request = ClaimRequest::new(
            self.config.worker_id.clone(),
            self.config.batch_size,
            to_chrono(self.config.lease),
        )
        .tenants(self.config.tenants.clone());

        let messages = self.store.claim_pending(&request).await?;
        let mut report = BatchReport {
            claimed: messages.len(),
            ..BatchReport::default()
        };
        if messages.is_empty() {
            return Ok(report);
        }

        let outcomes: Vec<Outcome> = futures_util::stream::iter(messages)
            .map(|message| self.process_message(message, shutdown))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;
        for outcome in outcomes {
            report.record(outcome);
        }

        metrics::histogram!("outbox_batch_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        debug!(?report, "Processed outbox batch");
        Ok(report)
    }

    async fn process_message(&self, message: OutboxMessage, shutdown: &CancellationToken) -> Outcome {
        if shutdown.is_cancelled() {
            return Outcome::Skipped;
        }

        let event = match self.registry.decode(&message.event_type, &message.payload) {
            Ok(event) => event,
            Err(e) => {
                let reason = match e {
                    OutboxError::UnknownEventType(_) => "unknown_type",
                    _ => "decode",
                };
                error!(
                    message_id = %message.id,
                    event_type = %message.event_type,
                    error = %e,
                    "Outbox message cannot be decoded"
                );
                return self.fail(&message, reason, &e.to_string()).await;
            }
        };

        match self.publisher.publish(&message.topic, &event).await {
            Ok(()) => {
                let result = self
                    .store
                    .mark_published(message.tenant_id, message.id, &self.config.worker_id, Utc::now())
                    .await;
                match result {
                    Ok(()) => {
                        metrics::counter!("outbox_messages_published_total", "topic" => message.topic.clone())
                            .increment(1);
                        debug!(
                            message_id = %message.id,
                            event_type = %message.event_type,
                            "Outbox message published"
                        );
                        Outcome::Published
                    }
                    Err(e) => self.transition_failed(&message, e),
                }
            }
            Err(e) => {
                let reason = e.to_string();
                match self.config.retry.next_delay(message.attempts) {
                    Some(delay) => {
                        warn!(
                            message_id = %message.id,
                            event_type = %message.event_type,
                            attempts = message.attempts,
                            retry_in_ms = delay.as_millis() as u64,
                            error = %reason,
                            "Publish failed, scheduling retry"
                        );
                        let next_attempt_at = Utc::now() + to_chrono(delay);
                        let result = self
                            .store
                            .schedule_retry(
                                message.tenant_id,
                                message.id,
                                &self.config.worker_id,
                                &reason,
                                next_attempt_at,
                            )
                            .await;
                        match result {
                            Ok(()) => {
                                metrics::counter!("outbox_messages_retried_total").increment(1);
                                Outcome::Retried
                            }
                            Err(e) => self.transition_failed(&message, e),
                        }
                    }
                    None => {
                        error!(
                            message_id = %message.id,
                            event_type = %message.event_type,
                            attempts = message.attempts,
                            error = %reason,
                            "Publish failed, giving up"
                        );
                        self.fail(&message, "exhausted", &reason).await
                    }
                }
            }
        }
    }

    async fn fail(&self, message: &OutboxMessage, reason: &'static str, error: &str) -> Outcome {
        let result = self
            .store
            .mark_failed(message.tenant_id, message.id, &self.config.worker_id, error)
            .await;
        match result {
            Ok(()) => {
                metrics::counter!("outbox_messages_failed_total", "reason" => reason).increment(1);
                Outcome::Failed
            }
            Err(e) => self.transition_failed(message, e),
        }
    }

    fn transition_failed(&self, message: &OutboxMessage, err: EventStoreError) -> Outcome {
        match err {
            EventStoreError::OutboxLeaseLost(_) | EventStoreError::InvalidOutboxTransition { .. } => {
                warn!(message_id = %message.id, "Outbox lease lost before update");
                Outcome::LeaseLost
            }
            e => {
                error!(message_id = %message.id, error = %e, "Failed to update outbox message");
                Outcome::Error
            }
        }
    }

    /// Polls until `shutdown` fires.
    ///
    /// A full batch is followed immediately by another claim; otherwise the
    /// processor waits for the next tick. Errors are logged and retried on the
    /// next tick.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            worker_id = %self.config.worker_id,
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Outbox processor started"
        );

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Outbox processor shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    loop {
                        match self.process_batch(&shutdown).await {
                            Ok(report) if report.claimed > 0
                                && report.claimed == self.config.batch_size
                                && !shutdown.is_cancelled() => continue,
                            Ok(_) => break,
                            Err(e) => {
                                error!(error = %e, "Outbox poll failed (will retry)");
                                break;
                            }
                        }
                    }
                }
            }
        }

        info!("Outbox processor stopped");
    }
}
