use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventStoreError, Result, TenantId, Version,
    outbox::{ClaimRequest, OutboxMessage, OutboxMessageId, OutboxStatus, OutboxStore, TenantFilter},
    store::{AppendRequest, EventStore, StreamInfo, UniqueKey, validate_append},
};

const EVENT_COLUMNS: &str = "id, tenant_id, event_type, aggregate_id, aggregate_type, version, timestamp, actor, payload, metadata";

const OUTBOX_COLUMNS: &str = "id, tenant_id, topic, event_type, payload, occurred_at, published_at, status, attempts, next_attempt_at, last_error, locked_by, locked_until";

/// PostgreSQL-backed event store implementation.
///
/// Streams, events, unique keys and outbox rows live in one database so each
/// append is a single transaction.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            tenant_id: TenantId::from_uuid(row.try_get::<Uuid, _>("tenant_id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            timestamp: row.try_get("timestamp")?,
            actor: row.try_get("actor")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }

    fn row_to_message(row: PgRow) -> Result<OutboxMessage> {
        let status: String = row.try_get("status")?;
        let status = OutboxStatus::parse(&status).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown outbox status: {status}").into())
        })?;
        let attempts: i32 = row.try_get("attempts")?;

        Ok(OutboxMessage {
            id: OutboxMessageId::from_uuid(row.try_get::<Uuid, _>("id")?),
            tenant_id: TenantId::from_uuid(row.try_get::<Uuid, _>("tenant_id")?),
            topic: row.try_get("topic")?,
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            occurred_at: row.try_get("occurred_at")?,
            published_at: row.try_get("published_at")?,
            status,
            attempts: u32::try_from(attempts).unwrap_or_default(),
            next_attempt_at: row.try_get("next_attempt_at")?,
            last_error: row.try_get("last_error")?,
            locked_by: row.try_get("locked_by")?,
            locked_until: row.try_get("locked_until")?,
        })
    }

    /// Moves the stream head from `expected_version` to the request's target
    /// version, or explains why it can't.
    async fn advance_stream(
        tx: &mut Transaction<'_, Postgres>,
        request: &AppendRequest,
        starting: bool,
    ) -> Result<()> {
        let aggregate_id = request.aggregate_id;

        if starting {
            let inserted = sqlx::query(
                r#"
                INSERT INTO event_streams (tenant_id, aggregate_id, aggregate_type, version, archived)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (tenant_id, aggregate_id) DO NOTHING
                "#,
            )
            .bind(request.tenant_id.as_uuid())
            .bind(aggregate_id.as_uuid())
            .bind(request.aggregate_type())
            .bind(request.target_version().as_i64())
            .bind(request.archive)
            .execute(&mut **tx)
            .await?
            .rows_affected();

            if inserted == 0 {
                return Err(EventStoreError::StreamAlreadyExists(aggregate_id));
            }
            return Ok(());
        }

        let updated = sqlx::query(
            r#"
            UPDATE event_streams
            SET version = $3, archived = archived OR $5
            WHERE tenant_id = $1 AND aggregate_id = $2 AND version = $4
            "#,
        )
        .bind(request.tenant_id.as_uuid())
        .bind(aggregate_id.as_uuid())
        .bind(request.target_version().as_i64())
        .bind(request.expected_version.as_i64())
        .bind(request.archive)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if updated == 1 {
            return Ok(());
        }

        let actual: Option<i64> = sqlx::query_scalar(
            "SELECT version FROM event_streams WHERE tenant_id = $1 AND aggregate_id = $2",
        )
        .bind(request.tenant_id.as_uuid())
        .bind(aggregate_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?;

        match actual {
            None => Err(EventStoreError::StreamNotFound(aggregate_id)),
            Some(actual) => Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: request.expected_version,
                actual: Version::new(actual),
            }),
        }
    }

    async fn commit(&self, request: AppendRequest, starting: bool) -> Result<Version> {
        validate_append(&request)?;

        let aggregate_id = request.aggregate_id;
        let tenant_id = request.tenant_id;

        // Start a transaction
        let mut tx = self.pool.begin().await?;

        Self::advance_stream(&mut tx, &request, starting).await?;

        for event in &request.events {
            let metadata_json = serde_json::to_value(&event.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO events (id, tenant_id, event_type, aggregate_id, aggregate_type, version, timestamp, actor, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(tenant_id.as_uuid())
            .bind(&event.event_type)
            .bind(aggregate_id.as_uuid())
            .bind(&event.aggregate_type)
            .bind(event.version.as_i64())
            .bind(event.timestamp)
            .bind(&event.actor)
            .bind(&event.payload)
            .bind(metadata_json)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // The stream head guards versions, this is a second line
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_stream_version")
                {
                    return EventStoreError::ConcurrencyConflict {
                        aggregate_id,
                        expected: request.expected_version,
                        actual: event.version,
                    };
                }
                EventStoreError::Database(e)
            })?;
        }

        for key in &request.release_keys {
            sqlx::query(
                r#"
                DELETE FROM unique_keys
                WHERE tenant_id = $1 AND scope = $2 AND value = $3 AND aggregate_id = $4
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(&key.scope)
            .bind(&key.value)
            .bind(aggregate_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        }

        for key in &request.claim_keys {
            // Re-claiming a key the aggregate already owns is a no-op
            let claimed = sqlx::query(
                r#"
                INSERT INTO unique_keys (tenant_id, scope, value, aggregate_id)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (tenant_id, scope, value) DO UPDATE
                SET aggregate_id = EXCLUDED.aggregate_id
                WHERE unique_keys.aggregate_id = EXCLUDED.aggregate_id
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(&key.scope)
            .bind(&key.value)
            .bind(aggregate_id.as_uuid())
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if claimed == 0 {
                return Err(EventStoreError::UniqueKeyViolation {
                    scope: key.scope.clone(),
                    value: key.value.clone(),
                });
            }
        }

        for message in &request.outbox {
            sqlx::query(
                r#"
                INSERT INTO outbox_messages (id, tenant_id, topic, event_type, payload, occurred_at, status, attempts, next_attempt_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(message.id.as_uuid())
            .bind(message.tenant_id.as_uuid())
            .bind(&message.topic)
            .bind(&message.event_type)
            .bind(&message.payload)
            .bind(message.occurred_at)
            .bind(message.status.as_str())
            .bind(message.attempts as i32)
            .bind(message.next_attempt_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let version = request.target_version();
        tracing::debug!(
            %tenant_id,
            %aggregate_id,
            %version,
            events = request.events.len(),
            outbox = request.outbox.len(),
            "Appended events"
        );
        Ok(version)
    }

    /// Works out why a guarded outbox update touched no rows.
    async fn transition_error(
        &self,
        tenant_id: TenantId,
        id: OutboxMessageId,
        to: OutboxStatus,
    ) -> EventStoreError {
        match self.get_message(tenant_id, id).await {
            Ok(None) => EventStoreError::OutboxMessageNotFound(id),
            Ok(Some(message)) if message.status != OutboxStatus::Pending => {
                EventStoreError::InvalidOutboxTransition {
                    id,
                    from: message.status,
                    to,
                }
            }
            Ok(Some(_)) => EventStoreError::OutboxLeaseLost(id),
            Err(err) => err,
        }
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
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
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE tenant_id = $1 AND aggregate_id = $2 ORDER BY version ASC"
        ))
        .bind(tenant_id.as_uuid())
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(EventStoreError::StreamNotFound(aggregate_id));
        }

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn stream_info(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Option<StreamInfo>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT aggregate_type, version, archived
            FROM event_streams
            WHERE tenant_id = $1 AND aggregate_id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(aggregate_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(StreamInfo {
                aggregate_id,
                aggregate_type: row.try_get("aggregate_type")?,
                version: Version::new(row.try_get("version")?),
                archived: row.try_get("archived")?,
            })),
            None => Ok(None),
        }
    }

    async fn unique_key_owner(
        &self,
        tenant_id: TenantId,
        key: &UniqueKey,
    ) -> Result<Option<AggregateId>> {
        let owner: Option<Uuid> = sqlx::query_scalar(
            "SELECT aggregate_id FROM unique_keys WHERE tenant_id = $1 AND scope = $2 AND value = $3",
        )
        .bind(tenant_id.as_uuid())
        .bind(&key.scope)
        .bind(&key.value)
        .fetch_optional(&self.pool)
        .await?;

        Ok(owner.map(AggregateId::from_uuid))
    }
}

#[async_trait]
impl OutboxStore for PostgresEventStore {
    async fn claim_pending(&self, request: &ClaimRequest) -> Result<Vec<OutboxMessage>> {
        let tenants: Option<Vec<Uuid>> = match &request.tenants {
            TenantFilter::All => None,
            TenantFilter::Only(tenants) => Some(tenants.iter().map(TenantId::as_uuid).collect()),
        };

        // SKIP LOCKED keeps concurrent claimers off each other's rows
        let rows = sqlx::query(&format!(
            r#"
            UPDATE outbox_messages o
            SET locked_by = $1, locked_until = $2, attempts = o.attempts + 1
            FROM (
                SELECT id FROM outbox_messages
                WHERE status = 'Pending'
                  AND next_attempt_at <= $3
                  AND (locked_until IS NULL OR locked_until < $3)
                  AND ($4::uuid[] IS NULL OR tenant_id = ANY($4))
                ORDER BY occurred_at ASC, id ASC
                LIMIT $5
                FOR UPDATE SKIP LOCKED
            ) claimed
            WHERE o.id = claimed.id
            RETURNING {}
            "#,
            OUTBOX_COLUMNS
                .split(", ")
                .map(|column| format!("o.{column}"))
                .collect::<Vec<_>>()
                .join(", ")
        ))
        .bind(&request.worker_id)
        .bind(request.locked_until())
        .bind(request.now)
        .bind(tenants)
        .bind(request.batch_size as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut messages = rows
            .into_iter()
            .map(Self::row_to_message)
            .collect::<Result<Vec<_>>>()?;
        // RETURNING does not preserve the subquery order
        messages.sort_by_key(|m| m.occurred_at);
        Ok(messages)
    }

    async fn mark_published(
        &self,
        tenant_id: TenantId,
        id: OutboxMessageId,
        worker_id: &str,
        published_at: DateTime<Utc>,
    ) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE outbox_messages
            SET status = 'Published', published_at = $4, last_error = NULL,
                locked_by = NULL, locked_until = NULL
            WHERE tenant_id = $1 AND id = $2 AND status = 'Pending'
              AND locked_by = $3 AND locked_until >= $5
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .bind(worker_id)
        .bind(published_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(self
                .transition_error(tenant_id, id, OutboxStatus::Published)
                .await);
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        tenant_id: TenantId,
        id: OutboxMessageId,
        worker_id: &str,
        error: &str,
    ) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE outbox_messages
            SET status = 'Failed', last_error = $4, locked_by = NULL, locked_until = NULL
            WHERE tenant_id = $1 AND id = $2 AND status = 'Pending'
              AND locked_by = $3 AND locked_until >= $5
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .bind(worker_id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(self
                .transition_error(tenant_id, id, OutboxStatus::Failed)
                .await);
        }
        Ok(())
    }

    async fn schedule_retry(
        &self,
        tenant_id: TenantId,
        id: OutboxMessageId,
        worker_id: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE outbox_messages
            SET last_error = $4, next_attempt_at = $5, locked_by = NULL, locked_until = NULL
            WHERE tenant_id = $1 AND id = $2 AND status = 'Pending'
              AND locked_by = $3 AND locked_until >= $6
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .bind(worker_id)
        .bind(error)
        .bind(next_attempt_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(self
                .transition_error(tenant_id, id, OutboxStatus::Pending)
                .await);
        }
        Ok(())
    }

    async fn requeue_failed(&self, tenant_id: TenantId, id: OutboxMessageId) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE outbox_messages
            SET status = 'Pending', attempts = 0, next_attempt_at = $3,
                locked_by = NULL, locked_until = NULL
            WHERE tenant_id = $1 AND id = $2 AND status = 'Failed'
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return match self.get_message(tenant_id, id).await? {
                None => Err(EventStoreError::OutboxMessageNotFound(id)),
                Some(message) => Err(EventStoreError::InvalidOutboxTransition {
                    id,
                    from: message.status,
                    to: OutboxStatus::Pending,
                }),
            };
        }
        Ok(())
    }

    async fn get_message(
        &self,
        tenant_id: TenantId,
        id: OutboxMessageId,
    ) -> Result<Option<OutboxMessage>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {OUTBOX_COLUMNS} FROM outbox_messages WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_message).transpose()
    }

    async fn list_messages(
        &self,
        tenant_id: TenantId,
        status: OutboxStatus,
        limit: usize,
    ) -> Result<Vec<OutboxMessage>> {
        let rows = sqlx::query(&format!(
            "SELECT {OUTBOX_COLUMNS} FROM outbox_messages WHERE tenant_id = $1 AND status = $2 ORDER BY occurred_at ASC, id ASC LIMIT $3"
        ))
        .bind(tenant_id.as_uuid())
        .bind(status.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_message).collect()
    }
}
