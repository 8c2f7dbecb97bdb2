//! PostgreSQL entity store.
//!
//! All kinds share one `documents` table: the JSON body plus the columns the
//! store filters, orders and guards on. Uniqueness among live rows is enforced
//! by a partial unique index, and conditional writes are single guarded
//! `UPDATE` statements, so neither depends on a prior read.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolError, RecyclingMethod, Runtime};
use serde_json::Value as JsonValue;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;
use trackwise_core::{
    Document, DocumentFilter, EntityId, PageWindow, StorageError, StorageResult, Timestamp,
};

use super::{EntityStore, WriteOutcome};

const UNIQUE_KEY_INDEX: &str = "idx_documents_live_unique_key";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    kind        TEXT        NOT NULL,
    id          UUID        PRIMARY KEY,
    scope       TEXT        NOT NULL,
    unique_key  TEXT        NULL,
    body        JSONB       NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL,
    is_deleted  BOOLEAN     NOT NULL DEFAULT FALSE
);
CREATE INDEX IF NOT EXISTS idx_documents_scope_created
    ON documents (kind, scope, created_at DESC, id DESC)
    WHERE NOT is_deleted;
CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_live_unique_key
    ON documents (kind, scope, unique_key)
    WHERE NOT is_deleted AND unique_key IS NOT NULL;
"#;

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait/create timeout for pooled connections
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "trackwise".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(5),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("TRACKWISE_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("TRACKWISE_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("TRACKWISE_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("TRACKWISE_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("TRACKWISE_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("TRACKWISE_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: std::env::var("TRACKWISE_DB_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> StorageResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        pool_cfg.timeouts.create = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StorageError::Unavailable {
                reason: format!("Failed to create pool: {}", e),
            })
    }
}

/// Create the `documents` table and its indexes if missing.
pub async fn ensure_schema(pool: &Pool) -> StorageResult<()> {
    let conn = pool.get().await.map_err(pool_error)?;
    conn.batch_execute(SCHEMA).await.map_err(db_error)?;
    Ok(())
}

fn pool_error(err: PoolError) -> StorageError {
    tracing::error!(error = %err, "Database pool error");
    StorageError::Unavailable {
        reason: format!("Connection pool error: {}", err),
    }
}

fn db_error(err: tokio_postgres::Error) -> StorageError {
    tracing::error!(error = %err, "Database error");
    StorageError::Unavailable {
        reason: format!("Database error: {}", err),
    }
}

fn is_unique_key_violation(err: &tokio_postgres::Error) -> bool {
    err.code() == Some(&SqlState::UNIQUE_VIOLATION)
        && err
            .as_db_error()
            .and_then(|db| db.constraint())
            .is_some_and(|constraint| constraint == UNIQUE_KEY_INDEX)
}

// ============================================================================
// STORE
// ============================================================================

/// [`EntityStore`] over a shared PostgreSQL pool.
pub struct PgEntityStore<D> {
    pool: Pool,
    _kind: PhantomData<fn() -> D>,
}

impl<D> Clone for PgEntityStore<D> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _kind: PhantomData,
        }
    }
}

impl<D: Document> PgEntityStore<D> {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            _kind: PhantomData,
        }
    }

    async fn get_conn(&self) -> StorageResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(pool_error)
    }

    fn encode(doc: &D) -> StorageResult<JsonValue> {
        serde_json::to_value(doc).map_err(|e| StorageError::CorruptDocument {
            kind: D::KIND,
            reason: e.to_string(),
        })
    }

    fn decode(body: JsonValue) -> StorageResult<D> {
        serde_json::from_value(body).map_err(|e| StorageError::CorruptDocument {
            kind: D::KIND,
            reason: e.to_string(),
        })
    }

    /// After a guarded write touched no row, tell absence from a stale
    /// expectation.
    async fn classify_miss(
        &self,
        conn: &deadpool_postgres::Object,
        id: EntityId,
    ) -> StorageResult<WriteOutcome> {
        let row = conn
            .query_opt(
                "SELECT 1 FROM documents WHERE kind = $1 AND id = $2 AND NOT is_deleted",
                &[&D::KIND.as_str(), &id],
            )
            .await
            .map_err(db_error)?;
        Ok(match row {
            Some(_) => WriteOutcome::VersionMismatch,
            None => WriteOutcome::Missing,
        })
    }
}

#[async_trait]
impl<D: Document> EntityStore<D> for PgEntityStore<D> {
    async fn get_by_id(&self, id: EntityId) -> StorageResult<Option<D>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "SELECT body FROM documents WHERE kind = $1 AND id = $2 AND NOT is_deleted",
                &[&D::KIND.as_str(), &id],
            )
            .await
            .map_err(db_error)?;
        row.map(|row| Self::decode(row.get(0))).transpose()
    }

    async fn get_by_scope(
        &self,
        scope: &str,
        filter: &D::Filter,
        window: PageWindow,
    ) -> StorageResult<(Vec<D>, u64)> {
        let conn = self.get_conn().await?;
        let kind = D::KIND.as_str();
        let constraints = filter.field_constraints();
        let limit = i64::try_from(window.take).unwrap_or(i64::MAX);
        let offset = i64::try_from(window.skip).unwrap_or(i64::MAX);

        let mut predicate = String::from("kind = $1 AND scope = $2 AND NOT is_deleted");
        let mut params: Vec<&(dyn ToSql + Sync)> = vec![&kind, &scope];
        for (field, value) in &constraints {
            params.push(value);
            predicate.push_str(&format!(" AND body->>'{}' = ${}", field, params.len()));
        }

        let count_sql = format!("SELECT COUNT(*) FROM documents WHERE {}", predicate);
        let total: i64 = conn
            .query_one(count_sql.as_str(), &params)
            .await
            .map_err(db_error)?
            .get(0);

        let page_sql = format!(
            "SELECT body FROM documents WHERE {} ORDER BY created_at DESC, id DESC LIMIT ${} OFFSET ${}",
            predicate,
            params.len() + 1,
            params.len() + 2
        );
        params.push(&limit);
        params.push(&offset);
        let rows = conn
            .query(page_sql.as_str(), &params)
            .await
            .map_err(db_error)?;

        let docs = rows
            .into_iter()
            .map(|row| Self::decode(row.get(0)))
            .collect::<StorageResult<Vec<D>>>()?;
        Ok((docs, u64::try_from(total).unwrap_or(0)))
    }

    async fn create(&self, doc: &D) -> StorageResult<WriteOutcome> {
        let conn = self.get_conn().await?;
        let body = Self::encode(doc)?;
        let result = conn
            .execute(
                "INSERT INTO documents (kind, id, scope, unique_key, body, created_at, updated_at, is_deleted) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE)",
                &[
                    &D::KIND.as_str(),
                    &doc.id(),
                    &doc.scope(),
                    &doc.unique_key(),
                    &body,
                    &doc.created_at(),
                    &doc.updated_at(),
                ],
            )
            .await;

        match result {
            Ok(_) => Ok(WriteOutcome::Applied),
            Err(err) if err.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
                Ok(WriteOutcome::Duplicate)
            }
            Err(err) => Err(db_error(err)),
        }
    }

    async fn update(
        &self,
        doc: &D,
        expected_updated_at: Option<Timestamp>,
    ) -> StorageResult<WriteOutcome> {
        let conn = self.get_conn().await?;
        let body = Self::encode(doc)?;
        let result = conn
            .execute(
                "UPDATE documents \
                 SET scope = $3, unique_key = $4, body = $5, updated_at = $6 \
                 WHERE kind = $1 AND id = $2 AND NOT is_deleted \
                   AND ($7::timestamptz IS NULL OR updated_at = $7)",
                &[
                    &D::KIND.as_str(),
                    &doc.id(),
                    &doc.scope(),
                    &doc.unique_key(),
                    &body,
                    &doc.updated_at(),
                    &expected_updated_at,
                ],
            )
            .await;

        match result {
            Ok(1) => Ok(WriteOutcome::Applied),
            Ok(_) => self.classify_miss(&conn, doc.id()).await,
            Err(err) if is_unique_key_violation(&err) => Ok(WriteOutcome::Duplicate),
            Err(err) => Err(db_error(err)),
        }
    }

    async fn delete(
        &self,
        id: EntityId,
        expected_updated_at: Option<Timestamp>,
    ) -> StorageResult<WriteOutcome> {
        let conn = self.get_conn().await?;
        let affected = conn
            .execute(
                "UPDATE documents \
                 SET is_deleted = TRUE, body = jsonb_set(body, '{is_deleted}', 'true'::jsonb) \
                 WHERE kind = $1 AND id = $2 AND NOT is_deleted \
                   AND ($3::timestamptz IS NULL OR updated_at = $3)",
                &[&D::KIND.as_str(), &id, &expected_updated_at],
            )
            .await
            .map_err(db_error)?;

        if affected == 1 {
            Ok(WriteOutcome::Applied)
        } else {
            self.classify_miss(&conn, id).await
        }
    }

    async fn exists_by_unique_key(
        &self,
        scope: &str,
        key: &str,
        exclude: Option<EntityId>,
    ) -> StorageResult<bool> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM documents \
                 WHERE kind = $1 AND scope = $2 AND unique_key = $3 AND NOT is_deleted \
                   AND ($4::uuid IS NULL OR id <> $4))",
                &[&D::KIND.as_str(), &scope, &key, &exclude],
            )
            .await
            .map_err(db_error)?;
        Ok(row.get(0))
    }
}
