//! SQLite contact store.
//!
//! One table, `contact_requests`, keyed by reference id. Rows are only ever
//! inserted by this crate; the `status` column is owned by staff tooling.

use admitline_core::contact::{ContactRequest, ContactStatus, QueryType};
use admitline_core::error::StoreError;
use admitline_core::store::ContactStore;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// A SQLite-backed contact store.
pub struct SqliteContactStore {
    pool: SqlitePool,
}

impl SqliteContactStore {
    /// Open (or create) the database at `path`.
    ///
    /// `"sqlite::memory:"` gives an ephemeral database on a single connection.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let in_memory = path.contains(":memory:");
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 4 })
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite contact store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS contact_requests (
                reference_id TEXT PRIMARY KEY NOT NULL,
                name         TEXT NOT NULL,
                email        TEXT NOT NULL,
                phone        TEXT NOT NULL,
                query_type   TEXT NOT NULL,
                message      TEXT,
                status       TEXT NOT NULL DEFAULT 'pending',
                created_at   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("contact_requests table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_contact_requests_created_at ON contact_requests(created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("created_at index: {e}")))?;

        Ok(())
    }

    fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<ContactRequest, StoreError> {
        let get = |col: &str| -> Result<String, StoreError> {
            row.try_get::<String, _>(col)
                .map_err(|e| StoreError::QueryFailed(format!("{col} column: {e}")))
        };

        let query_type = QueryType::from_str(&get("query_type")?).map_err(StoreError::QueryFailed)?;
        let status = ContactStatus::from_str(&get("status")?).map_err(StoreError::QueryFailed)?;
        let message: Option<String> = row
            .try_get("message")
            .map_err(|e| StoreError::QueryFailed(format!("message column: {e}")))?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&get("created_at")?)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(ContactRequest {
            reference_id: get("reference_id")?,
            name: get("name")?,
            email: get("email")?,
            phone: get("phone")?,
            query_type,
            message,
            status,
            created_at,
        })
    }
}

#[async_trait]
impl ContactStore for SqliteContactStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn save(&self, request: &ContactRequest) -> Result<String, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO contact_requests
                (reference_id, name, email, phone, query_type, message, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&request.reference_id)
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(request.query_type.as_str())
        .bind(&request.message)
        .bind(request.status.as_str())
        .bind(request.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("insert contact request: {e}")))?;

        debug!(reference_id = %request.reference_id, "Contact request stored");
        Ok(request.reference_id.clone())
    }

    async fn list(&self) -> Result<Vec<ContactRequest>, StoreError> {
        let rows = sqlx::query("SELECT * FROM contact_requests ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("list contact requests: {e}")))?;

        rows.iter().map(Self::row_to_request).collect()
    }

    async fn list_by_status(&self, status: ContactStatus) -> Result<Vec<ContactRequest>, StoreError> {
        let rows = sqlx::query("SELECT * FROM contact_requests WHERE status = ?1 ORDER BY created_at DESC")
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("list {} contact requests: {e}", status.as_str())))?;

        rows.iter().map(Self::row_to_request).collect()
    }
}
