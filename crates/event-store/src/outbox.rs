//! Transactional outbox rows and the storage contract used to drain them.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Result, TenantId};

/// Unique identifier for an outbox message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboxMessageId(Uuid);

impl OutboxMessageId {
    /// Creates a new random message ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a message ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OutboxMessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OutboxMessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery status of an outbox message.
///
/// ```text
/// Pending ──┬──► Published
///           └──► Failed ──(requeue)──► Pending
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutboxStatus {
    /// Waiting to be claimed and published.
    Pending,

    /// Delivered to the broker (terminal).
    Published,

    /// Gave up on delivery; kept for operators to inspect or requeue.
    Failed,
}

impl OutboxStatus {
    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "Pending",
            OutboxStatus::Published => "Published",
            OutboxStatus::Failed => "Failed",
        }
    }

    /// Parses a stored status name (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "pending" => Some(OutboxStatus::Pending),
            "published" => Some(OutboxStatus::Published),
            "failed" => Some(OutboxStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message scheduled for publication, written in the same transaction as
/// the events that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxMessage {
    /// Unique message identifier.
    pub id: OutboxMessageId,

    /// Tenant whose command produced the message.
    pub tenant_id: TenantId,

    /// Broker topic to publish to.
    pub topic: String,

    /// Stable integration event identifier (e.g. "companies.registered.v1").
    pub event_type: String,

    /// Serialized integration event.
    pub payload: Vec<u8>,

    /// When the triggering event happened.
    pub occurred_at: DateTime<Utc>,

    /// When the broker accepted the message.
    pub published_at: Option<DateTime<Utc>>,

    /// Current delivery status.
    pub status: OutboxStatus,

    /// Number of times the message has been claimed for delivery.
    pub attempts: u32,

    /// Earliest time the message may be claimed again.
    pub next_attempt_at: DateTime<Utc>,

    /// Last delivery error, if any.
    pub last_error: Option<String>,

    /// Worker currently holding the claim lease.
    pub locked_by: Option<String>,

    /// When the claim lease expires.
    pub locked_until: Option<DateTime<Utc>>,
}

impl OutboxMessage {
    /// Creates a new pending message.
    pub fn new(
        tenant_id: TenantId,
        topic: impl Into<String>,
        event_type: impl Into<String>,
        payload: Vec<u8>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OutboxMessageId::new(),
            tenant_id,
            topic: topic.into(),
            event_type: event_type.into(),
            payload,
            occurred_at,
            published_at: None,
            status: OutboxStatus::Pending,
            attempts: 0,
            next_attempt_at: occurred_at,
            last_error: None,
            locked_by: None,
            locked_until: None,
        }
    }

    /// Returns true if the message can be claimed at `now`.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.status == OutboxStatus::Pending
            && self.next_attempt_at <= now
            && self.locked_until.is_none_or(|until| until < now)
    }

    /// Returns true if `worker_id` holds an unexpired lease at `now`.
    pub fn is_leased_by(&self, worker_id: &str, now: DateTime<Utc>) -> bool {
        self.status == OutboxStatus::Pending
            && self.locked_by.as_deref() == Some(worker_id)
            && self.locked_until.is_some_and(|until| until >= now)
    }
}

/// Which tenants a claim may pick messages from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TenantFilter {
    /// Every tenant.
    #[default]
    All,

    /// Only the listed tenants.
    Only(Vec<TenantId>),
}

impl TenantFilter {
    /// Returns true if the tenant passes the filter.
    pub fn matches(&self, tenant_id: &TenantId) -> bool {
        match self {
            TenantFilter::All => true,
            TenantFilter::Only(tenants) => tenants.contains(tenant_id),
        }
    }
}

/// Parameters of a single claim.
#[derive(Debug, Clone)]
pub struct ClaimRequest {
    /// Identifies the claiming worker; stored as the lease owner.
    pub worker_id: String,

    /// Maximum number of messages to claim.
    pub batch_size: usize,

    /// How long the claim is exclusive before another worker may take it.
    pub lease: Duration,

    /// Tenants to claim from.
    pub tenants: TenantFilter,

    /// Reference time for due and lease checks.
    pub now: DateTime<Utc>,
}

impl ClaimRequest {
    /// Creates a claim request for all tenants at the current time.
    pub fn new(worker_id: impl Into<String>, batch_size: usize, lease: Duration) -> Self {
        Self {
            worker_id: worker_id.into(),
            batch_size,
            lease,
            tenants: TenantFilter::All,
            now: Utc::now(),
        }
    }

    /// Restricts the claim to the given tenants.
    pub fn tenants(mut self, tenants: TenantFilter) -> Self {
        self.tenants = tenants;
        self
    }

    /// Overrides the reference time.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Returns the lease expiry for this claim.
    pub fn locked_until(&self) -> DateTime<Utc> {
        self.now + self.lease
    }
}

/// Storage contract for draining the outbox.
///
/// Rows are inserted by [`EventStore::append`](crate::EventStore::append) and
/// [`EventStore::start_stream`](crate::EventStore::start_stream); this trait
/// only covers claiming and state transitions.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Atomically claims up to `batch_size` due pending messages.
    ///
    /// Two concurrent calls never return the same message while its lease is
    /// valid. Claiming increments `attempts`. Messages are returned oldest first.
    async fn claim_pending(&self, request: &ClaimRequest) -> Result<Vec<OutboxMessage>>;

    /// Marks a leased message as published.
    async fn mark_published(
        &self,
        tenant_id: TenantId,
        id: OutboxMessageId,
        worker_id: &str,
        published_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Marks a leased message as failed (terminal until requeued).
    async fn mark_failed(
        &self,
        tenant_id: TenantId,
        id: OutboxMessageId,
        worker_id: &str,
        error: &str,
    ) -> Result<()>;

    /// Releases a leased message back to pending, due at `next_attempt_at`.
    async fn schedule_retry(
        &self,
        tenant_id: TenantId,
        id: OutboxMessageId,
        worker_id: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Moves a failed message back to pending and resets its attempt count.
    async fn requeue_failed(&self, tenant_id: TenantId, id: OutboxMessageId) -> Result<()>;

    /// Retrieves a single message.
    async fn get_message(
        &self,
        tenant_id: TenantId,
        id: OutboxMessageId,
    ) -> Result<Option<OutboxMessage>>;

    /// Lists messages of a tenant in a given status, oldest first.
    async fn list_messages(
        &self,
        tenant_id: TenantId,
        status: OutboxStatus,
        limit: usize,
    ) -> Result<Vec<OutboxMessage>>;
}
