use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, TenantId, Version,
    outbox::{ClaimRequest, OutboxMessage, OutboxMessageId, OutboxStatus, OutboxStore},
    store::{AppendRequest, EventStore, StreamInfo, UniqueKey, validate_append},
};

#[derive(Debug, Clone)]
struct MemoryStream {
    aggregate_type: String,
    events: Vec<EventEnvelope>,
    archived: bool,
}

impl MemoryStream {
    fn version(&self) -> Version {
        self.events
            .last()
            .map(|e| e.version)
            .unwrap_or(Version::initial())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    streams: HashMap<(TenantId, AggregateId), MemoryStream>,
    unique_keys: HashMap<(TenantId, UniqueKey), AggregateId>,
    outbox: Vec<OutboxMessage>,
}

/// In-memory event store implementation for testing and local runs.
///
/// This implementation keeps streams, unique keys and the outbox behind one
/// lock, so every append commits all of them or none, like the PostgreSQL
/// implementation does with a transaction.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    state: Arc<RwLock<MemoryState>>,
    fail_outbox_writes: Arc<AtomicBool>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored across all tenants.
    pub async fn event_count(&self) -> usize {
        self.state
            .read()
            .await
            .streams
            .values()
            .map(|s| s.events.len())
            .sum()
    }

    /// Returns a copy of every outbox row across all tenants.
    pub async fn outbox_messages(&self) -> Vec<OutboxMessage> {
        self.state.read().await.outbox.clone()
    }

    /// Makes appends that carry outbox rows fail after the events were staged.
    ///
    /// Used to verify that events and outbox rows commit together.
    pub fn set_fail_outbox_writes(&self, fail: bool) {
        self.fail_outbox_writes.store(fail, Ordering::SeqCst);
    }

    async fn commit(&self, request: AppendRequest, starting: bool) -> Result<Version> {
        validate_append(&request)?;

        let aggregate_id = request.aggregate_id;
        let tenant_id = request.tenant_id;
        let mut state = self.state.write().await;

        let current = state.streams.get(&(tenant_id, aggregate_id)).cloned();
        let mut staged = match (current, starting) {
            (Some(_), true) => return Err(EventStoreError::StreamAlreadyExists(aggregate_id)),
            (None, true) => MemoryStream {
                aggregate_type: request.aggregate_type().to_string(),
                events: Vec::new(),
                archived: false,
            },
            (None, false) => return Err(EventStoreError::StreamNotFound(aggregate_id)),
            (Some(stream), false) => stream,
        };

        let actual = staged.version();
        if actual != request.expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: request.expected_version,
                actual,
            });
        }

        for key in &request.claim_keys {
            if let Some(owner) = state.unique_keys.get(&(tenant_id, key.clone()))
                && *owner != aggregate_id
            {
                return Err(EventStoreError::UniqueKeyViolation {
                    scope: key.scope.clone(),
                    value: key.value.clone(),
                });
            }
        }

        let new_version = request.target_version();
        staged.events.extend(request.events);
        staged.archived |= request.archive;

        if !request.outbox.is_empty() && self.fail_outbox_writes.load(Ordering::SeqCst) {
            // Staged events are dropped with the error; nothing was written.
            return Err(EventStoreError::Injected(
                "outbox write failed".to_string(),
            ));
        }

        for key in request.release_keys {
            let entry = (tenant_id, key);
            if state.unique_keys.get(&entry) == Some(&aggregate_id) {
                state.unique_keys.remove(&entry);
            }
        }
        for key in request.claim_keys {
            state.unique_keys.insert((tenant_id, key), aggregate_id);
        }
        state.outbox.extend(request.outbox);
        state.streams.insert((tenant_id, aggregate_id), staged);

        Ok(new_version)
    }

    async fn transition<F>(
        &self,
        tenant_id: TenantId,
        id: OutboxMessageId,
        worker_id: &str,
        to: OutboxStatus,
        update: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut OutboxMessage),
    {
        let now = Utc::now();
        let mut state = self.state.write().await;
        let message = state
            .outbox
            .iter_mut()
            .find(|m| m.id == id && m.tenant_id == tenant_id)
            .ok_or(EventStoreError::OutboxMessageNotFound(id))?;

        if message.status != OutboxStatus::Pending {
            return Err(EventStoreError::InvalidOutboxTransition {
                id,
                from: message.status,
                to,
            });
        }
        if !message.is_leased_by(worker_id, now) {
            return Err(EventStoreError::OutboxLeaseLost(id));
        }

        update(message);
        message.locked_by = None;
        message.locked_until = None;
        Ok(())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn start_stream(&self, request: AppendRequest) -> Result<Version> {
        if request.expected_version != Version::initial() {
            return Err(EventStoreError::InvalidAppend(
                "A new stream must start from the initial version".to_string(),
            ));
        }
        self.commit(request, true).await
    }

    async fn append(&self, request: AppendRequest) -> Result<Version> {
        self.commit(request, false).await
    }

    async fn fetch_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let state = self.state.read().await;
        match state.streams.get(&(tenant_id, aggregate_id)) {
            Some(stream) if !stream.events.is_empty() => Ok(stream.events.clone()),
            _ => Err(EventStoreError::StreamNotFound(aggregate_id)),
        }
    }

    async fn stream_info(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Option<StreamInfo>> {
        let state = self.state.read().await;
        Ok(state
            .streams
            .get(&(tenant_id, aggregate_id))
            .map(|stream| StreamInfo {
                aggregate_id,
                aggregate_type: stream.aggregate_type.clone(),
                version: stream.version(),
                archived: stream.archived,
            }))
    }

    async fn unique_key_owner(
        &self,
        tenant_id: TenantId,
        key: &UniqueKey,
    ) -> Result<Option<AggregateId>> {
        let state = self.state.read().await;
        Ok(state.unique_keys.get(&(tenant_id, key.clone())).copied())
    }
}

#[async_trait]
impl OutboxStore for InMemoryEventStore {
    async fn claim_pending(&self, request: &ClaimRequest) -> Result<Vec<OutboxMessage>> {
        let mut state = self.state.write().await;
        let locked_until = request.locked_until();

        let mut due: Vec<usize> = state
            .outbox
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_claimable(request.now) && request.tenants.matches(&m.tenant_id))
            .map(|(index, _)| index)
            .collect();
        due.sort_by_key(|&index| state.outbox[index].occurred_at);
        due.truncate(request.batch_size);

        let mut claimed = Vec::with_capacity(due.len());
        for index in due {
            let message = &mut state.outbox[index];
            message.locked_by = Some(request.worker_id.clone());
            message.locked_until = Some(locked_until);
            message.attempts += 1;
            claimed.push(message.clone());
        }

        Ok(claimed)
    }

    async fn mark_published(
        &self,
        tenant_id: TenantId,
        id: OutboxMessageId,
        worker_id: &str,
        published_at: DateTime<Utc>,
    ) -> Result<()> {
        self.transition(tenant_id, id, worker_id, OutboxStatus::Published, |m| {
            m.status = OutboxStatus::Published;
            m.published_at = Some(published_at);
            m.last_error = None;
        })
        .await
    }

    async fn mark_failed(
        &self,
        tenant_id: TenantId,
        id: OutboxMessageId,
        worker_id: &str,
        error: &str,
    ) -> Result<()> {
        self.transition(tenant_id, id, worker_id, OutboxStatus::Failed, |m| {
            m.status = OutboxStatus::Failed;
            m.last_error = Some(error.to_string());
        })
        .await
    }

    async fn schedule_retry(
        &self,
        tenant_id: TenantId,
        id: OutboxMessageId,
        worker_id: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<()> {
        self.transition(tenant_id, id, worker_id, OutboxStatus::Pending, |m| {
            m.next_attempt_at = next_attempt_at;
            m.last_error = Some(error.to_string());
        })
        .await
    }

    async fn requeue_failed(&self, tenant_id: TenantId, id: OutboxMessageId) -> Result<()> {
        let mut state = self.state.write().await;
        let message = state
            .outbox
            .iter_mut()
            .find(|m| m.id == id && m.tenant_id == tenant_id)
            .ok_or(EventStoreError::OutboxMessageNotFound(id))?;

        if message.status != OutboxStatus::Failed {
            return Err(EventStoreError::InvalidOutboxTransition {
                id,
                from: message.status,
                to: OutboxStatus::Pending,
            });
        }

        message.status = OutboxStatus::Pending;
        message.attempts = 0;
        message.next_attempt_at = Utc::now();
        message.locked_by = None;
        message.locked_until = None;
        Ok(())
    }

    async fn get_message(
        &self,
        tenant_id: TenantId,
        id: OutboxMessageId,
    ) -> Result<Option<OutboxMessage>> {
        let state = self.state.read().await;
        Ok(state
            .outbox
            .iter()
            .find(|m| m.id == id && m.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_messages(
        &self,
        tenant_id: TenantId,
        status: OutboxStatus,
        limit: usize,
    ) -> Result<Vec<OutboxMessage>> {
        let state = self.state.read().await;
        let mut messages: Vec<_> = state
            .outbox
            .iter()
            .filter(|m| m.tenant_id == tenant_id && m.status == status)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.occurred_at);
        messages.truncate(limit);
        Ok(messages)
    }
}
