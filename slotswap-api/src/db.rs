//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling with deadpool-postgres and [`PgStore`], the
//! durable [`SlotStore`] backend.
//!
//! Swap batches run in a `SERIALIZABLE` transaction. Every event write is an
//! `UPDATE ... WHERE status = <expected>` that must touch exactly one row;
//! any miss rolls the whole transaction back. Serialization failures and
//! deadlocks surface as `StorageError::Conflict`.

use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use slotswap_core::{
    EntityIdType, EntityType, Event, EventId, EventPatch, EventStatus, SlotSwapError,
    SlotSwapResult, StateError, StorageError, StoredSwapRequest, SwapRequestData, SwapRequestId,
    SwapRequestStatus, UserId, UserProfile,
};
use slotswap_storage::{RequestWrite, SlotStore, SwapBatch};
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::{IsolationLevel, NoTls, Row};
use uuid::Uuid;

const SCHEMA: &str = include_str!("../migrations/001_init.sql");

const EVENT_COLUMNS: &str =
    "event_id, title, start_time, end_time, status, owner_id, created_at, updated_at";

const REQUEST_COLUMNS: &str = "swap_request_id, requester_id, responder_id, my_slot_id, \
     their_slot_id, status, created_at, updated_at, responded_at";

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Time to wait for a free connection
    pub timeout: Duration,
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("max_size", &self.max_size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "slotswap".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a database configuration from environment variables.
    ///
    /// `SLOTSWAP_DB_HOST`, `SLOTSWAP_DB_PORT`, `SLOTSWAP_DB_NAME`,
    /// `SLOTSWAP_DB_USER`, `SLOTSWAP_DB_PASSWORD`, `SLOTSWAP_DB_POOL_SIZE`,
    /// `SLOTSWAP_DB_TIMEOUT` (seconds).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("SLOTSWAP_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("SLOTSWAP_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("SLOTSWAP_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("SLOTSWAP_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("SLOTSWAP_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("SLOTSWAP_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: Duration::from_secs(
                std::env::var("SLOTSWAP_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn is_retryable(err: &tokio_postgres::Error) -> bool {
    matches!(
        err.code(),
        Some(code) if *code == SqlState::T_R_SERIALIZATION_FAILURE || *code == SqlState::T_R_DEADLOCK_DETECTED
    )
}

/// Map a driver error into the storage taxonomy.
fn storage_err(entity_type: EntityType, id: Uuid) -> impl Fn(tokio_postgres::Error) -> SlotSwapError {
    move |err| {
        if is_retryable(&err) {
            return StorageError::Conflict {
                entity_type,
                id,
                reason: "concurrent transaction".to_string(),
            }
            .into();
        }
        if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
            return StorageError::InsertFailed {
                entity_type,
                reason: "already exists".to_string(),
            }
            .into();
        }
        tracing::error!(?entity_type, %id, "Database error: {:?}", err);
        StorageError::Backend {
            reason: err.to_string(),
        }
        .into()
    }
}

fn backend_err(err: tokio_postgres::Error) -> SlotSwapError {
    tracing::error!("Database error: {:?}", err);
    StorageError::Backend {
        reason: err.to_string(),
    }
    .into()
}

fn conflict(entity_type: EntityType, id: Uuid, reason: impl Into<String>) -> SlotSwapError {
    StorageError::Conflict {
        entity_type,
        id,
        reason: reason.into(),
    }
    .into()
}

// ============================================================================
// ROW DECODING
// ============================================================================

fn event_from_row(row: &Row) -> SlotSwapResult<Event> {
    let status: String = row.try_get("status").map_err(backend_err)?;
    Ok(Event {
        event_id: EventId::new(row.try_get("event_id").map_err(backend_err)?),
        title: row.try_get("title").map_err(backend_err)?,
        start_time: row.try_get("start_time").map_err(backend_err)?,
        end_time: row.try_get("end_time").map_err(backend_err)?,
        status: EventStatus::from_db_str(&status).map_err(|e| StorageError::Backend {
            reason: e.to_string(),
        })?,
        owner_id: UserId::new(row.try_get("owner_id").map_err(backend_err)?),
        created_at: row.try_get("created_at").map_err(backend_err)?,
        updated_at: row.try_get("updated_at").map_err(backend_err)?,
    })
}

fn request_from_row(row: &Row) -> SlotSwapResult<StoredSwapRequest> {
    let status: String = row.try_get("status").map_err(backend_err)?;
    Ok(StoredSwapRequest {
        data: SwapRequestData {
            swap_request_id: SwapRequestId::new(row.try_get("swap_request_id").map_err(backend_err)?),
            requester_id: UserId::new(row.try_get("requester_id").map_err(backend_err)?),
            responder_id: UserId::new(row.try_get("responder_id").map_err(backend_err)?),
            my_slot_id: EventId::new(row.try_get("my_slot_id").map_err(backend_err)?),
            their_slot_id: EventId::new(row.try_get("their_slot_id").map_err(backend_err)?),
            created_at: row.try_get("created_at").map_err(backend_err)?,
            updated_at: row.try_get("updated_at").map_err(backend_err)?,
            responded_at: row.try_get("responded_at").map_err(backend_err)?,
        },
        status: SwapRequestStatus::from_db_str(&status).map_err(|e| StorageError::Backend {
            reason: e.to_string(),
        })?,
    })
}

fn user_from_row(row: &Row) -> SlotSwapResult<UserProfile> {
    Ok(UserProfile {
        user_id: UserId::new(row.try_get("user_id").map_err(backend_err)?),
        name: row.try_get("name").map_err(backend_err)?,
        email: row.try_get("email").map_err(backend_err)?,
        last_seen_at: row.try_get("last_seen_at").map_err(backend_err)?,
    })
}

// ============================================================================
// POSTGRES STORE
// ============================================================================

/// [`SlotStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl std::fmt::Debug for PgStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("PgStore")
            .field("pool_size", &status.size)
            .field("pool_available", &status.available)
            .finish()
    }
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Create tables and indexes if they do not exist.
    pub async fn migrate(&self) -> ApiResult<()> {
        let conn = self.pool.get().await?;
        conn.batch_execute(SCHEMA).await?;
        tracing::info!("Database schema is up to date");
        Ok(())
    }

    async fn get_conn(&self) -> SlotSwapResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| {
            tracing::error!("Connection pool error: {:?}", e);
            StorageError::Backend {
                reason: format!("connection pool: {}", e),
            }
            .into()
        })
    }

    async fn query_events(&self, sql: &str, owner: Uuid) -> SlotSwapResult<Vec<Event>> {
        let conn = self.get_conn().await?;
        let rows = conn.query(sql, &[&owner]).await.map_err(backend_err)?;
        rows.iter().map(event_from_row).collect()
    }

    async fn query_requests(&self, sql: &str, user: Uuid) -> SlotSwapResult<Vec<StoredSwapRequest>> {
        let conn = self.get_conn().await?;
        let rows = conn.query(sql, &[&user]).await.map_err(backend_err)?;
        rows.iter().map(request_from_row).collect()
    }
}

/// Lock an owned event for the rest of the transaction.
async fn lock_owned_event(
    tx: &deadpool_postgres::Transaction<'_>,
    id: EventId,
    owner: UserId,
) -> SlotSwapResult<Event> {
    let row = tx
        .query_opt(
            &format!(
                "SELECT {} FROM slotswap_event WHERE event_id = $1 AND owner_id = $2 FOR UPDATE",
                EVENT_COLUMNS
            ),
            &[&id.as_uuid(), &owner.as_uuid()],
        )
        .await
        .map_err(storage_err(EntityType::Event, id.as_uuid()))?;
    match row {
        Some(row) => event_from_row(&row),
        None => Err(SlotSwapError::not_found(EntityType::Event, id)),
    }
}

/// Explain why a guarded update touched no rows.
async fn missed_guard(
    tx: &deadpool_postgres::Transaction<'_>,
    table: &str,
    key: &str,
    entity_type: EntityType,
    id: Uuid,
) -> SlotSwapError {
    let sql = format!("SELECT status FROM {} WHERE {} = $1", table, key);
    match tx.query_opt(&sql, &[&id]).await {
        Ok(Some(row)) => {
            let status: String = row.try_get("status").unwrap_or_default();
            conflict(entity_type, id, format!("status is {}", status))
        }
        Ok(None) => SlotSwapError::not_found(entity_type, id),
        Err(err) => storage_err(entity_type, id)(err),
    }
}

#[async_trait]
impl SlotStore for PgStore {
    // ========================================================================
    // EVENT OPERATIONS
    // ========================================================================

    async fn event_insert(&self, event: &Event) -> SlotSwapResult<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO slotswap_event \
             (event_id, title, start_time, end_time, status, owner_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            &[
                &event.event_id.as_uuid(),
                &event.title,
                &event.start_time,
                &event.end_time,
                &event.status.as_db_str(),
                &event.owner_id.as_uuid(),
                &event.created_at,
                &event.updated_at,
            ],
        )
        .await
        .map_err(storage_err(EntityType::Event, event.event_id.as_uuid()))?;
        Ok(())
    }

    async fn event_get(&self, id: EventId) -> SlotSwapResult<Option<Event>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                &format!("SELECT {} FROM slotswap_event WHERE event_id = $1", EVENT_COLUMNS),
                &[&id.as_uuid()],
            )
            .await
            .map_err(backend_err)?;
        row.as_ref().map(event_from_row).transpose()
    }

    async fn events_get_many(&self, ids: &[EventId]) -> SlotSwapResult<Vec<Event>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                &format!("SELECT {} FROM slotswap_event WHERE event_id = ANY($1)", EVENT_COLUMNS),
                &[&ids],
            )
            .await
            .map_err(backend_err)?;
        rows.iter().map(event_from_row).collect()
    }

    async fn event_update_owned(
        &self,
        id: EventId,
        owner: UserId,
        patch: &EventPatch,
    ) -> SlotSwapResult<Event> {
        let mut conn = self.get_conn().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(storage_err(EntityType::Event, id.as_uuid()))?;

        let mut event = lock_owned_event(&tx, id, owner).await?;
        event.apply_owner_patch(patch, Utc::now())?;

        tx.execute(
            "UPDATE slotswap_event \
             SET title = $2, start_time = $3, end_time = $4, status = $5, updated_at = $6 \
             WHERE event_id = $1",
            &[
                &id.as_uuid(),
                &event.title,
                &event.start_time,
                &event.end_time,
                &event.status.as_db_str(),
                &event.updated_at,
            ],
        )
        .await
        .map_err(storage_err(EntityType::Event, id.as_uuid()))?;
        tx.commit()
            .await
            .map_err(storage_err(EntityType::Event, id.as_uuid()))?;
        Ok(event)
    }

    async fn event_delete_owned(&self, id: EventId, owner: UserId) -> SlotSwapResult<()> {
        let mut conn = self.get_conn().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(storage_err(EntityType::Event, id.as_uuid()))?;

        let event = lock_owned_event(&tx, id, owner).await?;
        if event.status.is_locked() {
            return Err(StateError::EventLocked {
                event_id: id.as_uuid(),
            }
            .into());
        }

        tx.execute("DELETE FROM slotswap_event WHERE event_id = $1", &[&id.as_uuid()])
            .await
            .map_err(storage_err(EntityType::Event, id.as_uuid()))?;
        tx.commit()
            .await
            .map_err(storage_err(EntityType::Event, id.as_uuid()))?;
        Ok(())
    }

    async fn event_list_by_owner(&self, owner: UserId) -> SlotSwapResult<Vec<Event>> {
        self.query_events(
            &format!(
                "SELECT {} FROM slotswap_event WHERE owner_id = $1 ORDER BY start_time, event_id",
                EVENT_COLUMNS
            ),
            owner.as_uuid(),
        )
        .await
    }

    async fn event_list_swappable(&self, exclude_owner: UserId) -> SlotSwapResult<Vec<Event>> {
        self.query_events(
            &format!(
                "SELECT {} FROM slotswap_event \
                 WHERE status = 'SWAPPABLE' AND owner_id <> $1 \
                 ORDER BY start_time, event_id",
                EVENT_COLUMNS
            ),
            exclude_owner.as_uuid(),
        )
        .await
    }

    // ========================================================================
    // SWAP LEDGER OPERATIONS
    // ========================================================================

    async fn swap_get(&self, id: SwapRequestId) -> SlotSwapResult<Option<StoredSwapRequest>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                &format!(
                    "SELECT {} FROM slotswap_swap_request WHERE swap_request_id = $1",
                    REQUEST_COLUMNS
                ),
                &[&id.as_uuid()],
            )
            .await
            .map_err(backend_err)?;
        row.as_ref().map(request_from_row).transpose()
    }

    async fn swap_list_incoming(&self, user: UserId) -> SlotSwapResult<Vec<StoredSwapRequest>> {
        self.query_requests(
            &format!(
                "SELECT {} FROM slotswap_swap_request \
                 WHERE responder_id = $1 AND status = 'PENDING' \
                 ORDER BY created_at DESC, swap_request_id DESC",
                REQUEST_COLUMNS
            ),
            user.as_uuid(),
        )
        .await
    }

    async fn swap_list_outgoing(&self, user: UserId) -> SlotSwapResult<Vec<StoredSwapRequest>> {
        self.query_requests(
            &format!(
                "SELECT {} FROM slotswap_swap_request \
                 WHERE requester_id = $1 \
                 ORDER BY created_at DESC, swap_request_id DESC",
                REQUEST_COLUMNS
            ),
            user.as_uuid(),
        )
        .await
    }

    async fn swap_apply(&self, batch: &SwapBatch) -> SlotSwapResult<()> {
        let record = batch.request.record();
        let request_id = record.id().as_uuid();
        let mut conn = self.get_conn().await?;
        let tx = conn
            .build_transaction()
            .isolation_level(IsolationLevel::Serializable)
            .start()
            .await
            .map_err(storage_err(EntityType::SwapRequest, request_id))?;

        for write in &batch.events {
            let id = write.event_id.as_uuid();
            let expected = write.transition.expected_status().as_db_str();
            let target = write.transition.target_status().as_db_str();
            let touched = match write.new_range {
                Some(range) => {
                    tx.execute(
                        "UPDATE slotswap_event \
                         SET status = $3, start_time = $4, end_time = $5, updated_at = $6 \
                         WHERE event_id = $1 AND status = $2",
                        &[&id, &expected, &target, &range.start(), &range.end(), &batch.at],
                    )
                    .await
                }
                None => {
                    tx.execute(
                        "UPDATE slotswap_event SET status = $3, updated_at = $4 \
                         WHERE event_id = $1 AND status = $2",
                        &[&id, &expected, &target, &batch.at],
                    )
                    .await
                }
            }
            .map_err(storage_err(EntityType::Event, id))?;

            if touched != 1 {
                return Err(missed_guard(&tx, "slotswap_event", "event_id", EntityType::Event, id).await);
            }
        }

        let data = &record.data;
        match &batch.request {
            RequestWrite::Insert(_) => {
                tx.execute(
                    &format!(
                        "INSERT INTO slotswap_swap_request ({}) \
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                        REQUEST_COLUMNS
                    ),
                    &[
                        &request_id,
                        &data.requester_id.as_uuid(),
                        &data.responder_id.as_uuid(),
                        &data.my_slot_id.as_uuid(),
                        &data.their_slot_id.as_uuid(),
                        &record.status.as_db_str(),
                        &data.created_at,
                        &data.updated_at,
                        &data.responded_at,
                    ],
                )
                .await
                .map_err(storage_err(EntityType::SwapRequest, request_id))?;
            }
            RequestWrite::Resolve(_) => {
                let expected = batch
                    .request
                    .expected_status()
                    .unwrap_or(SwapRequestStatus::Pending)
                    .as_db_str();
                let touched = tx
                    .execute(
                        "UPDATE slotswap_swap_request \
                         SET status = $3, updated_at = $4, responded_at = $5 \
                         WHERE swap_request_id = $1 AND status = $2",
                        &[
                            &request_id,
                            &expected,
                            &record.status.as_db_str(),
                            &data.updated_at,
                            &data.responded_at,
                        ],
                    )
                    .await
                    .map_err(storage_err(EntityType::SwapRequest, request_id))?;
                if touched != 1 {
                    return Err(missed_guard(
                        &tx,
                        "slotswap_swap_request",
                        "swap_request_id",
                        EntityType::SwapRequest,
                        request_id,
                    )
                    .await);
                }
            }
        }

        tx.commit()
            .await
            .map_err(storage_err(EntityType::SwapRequest, request_id))?;
        Ok(())
    }

    // ========================================================================
    // USER DIRECTORY
    // ========================================================================

    async fn user_upsert(&self, profile: &UserProfile) -> SlotSwapResult<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO slotswap_user (user_id, name, email, last_seen_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id) DO UPDATE \
             SET name = EXCLUDED.name, email = EXCLUDED.email, last_seen_at = EXCLUDED.last_seen_at",
            &[&profile.user_id.as_uuid(), &profile.name, &profile.email, &profile.last_seen_at],
        )
        .await
        .map_err(storage_err(EntityType::User, profile.user_id.as_uuid()))?;
        Ok(())
    }

    async fn user_get(&self, id: UserId) -> SlotSwapResult<Option<UserProfile>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "SELECT user_id, name, email, last_seen_at FROM slotswap_user WHERE user_id = $1",
                &[&id.as_uuid()],
            )
            .await
            .map_err(backend_err)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn users_get_many(&self, ids: &[UserId]) -> SlotSwapResult<Vec<UserProfile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT user_id, name, email, last_seen_at FROM slotswap_user WHERE user_id = ANY($1)",
                &[&ids],
            )
            .await
            .map_err(backend_err)?;
        rows.iter().map(user_from_row).collect()
    }

    // ========================================================================
    // HEALTH
    // ========================================================================

    async fn ping(&self) -> SlotSwapResult<()> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[]).await.map_err(backend_err)?;
        Ok(())
    }
}
