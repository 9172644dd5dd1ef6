//! The persistent store (C1): accounts, model routes, the config singleton, and
//! request logs. Everything here is a thin `sqlx` wrapper; atomic in-memory
//! projections (the route cache, the token cache) live in their owning
//! components and are rebuilt from these tables.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{FromRow, SqlitePool};
use std::path::Path;
use std::str::FromStr;

use crate::error::AppError;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub provider: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub last_used_at: Option<i64>,
    pub is_active: bool,
    pub is_primary: bool,
    pub scopes: String,
    pub metadata: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Account {
    /// `metadata` is opaque JSON; at minimum carries `project_id`.
    pub fn project_id(&self) -> Option<String> {
        serde_json::from_str::<serde_json::Value>(&self.metadata)
            .ok()
            .and_then(|v| v.get("project_id").and_then(|p| p.as_str()).map(str::to_string))
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ModelRoute {
    pub id: i64,
    pub client_model: String,
    pub target_provider: String,
    pub target_model: String,
    pub is_active: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct RequestLog {
    pub id: i64,
    pub timestamp: i64,
    pub method: String,
    pub url: String,
    pub status: i64,
    pub duration: i64,
    pub provider: String,
    pub model: String,
    pub mapped_model: Option<String>,
    pub account_email: Option<String>,
    pub error: Option<String>,
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

#[derive(Debug, Clone, Default)]
pub struct NewRequestLog {
    pub timestamp: i64,
    pub method: String,
    pub url: String,
    pub status: i64,
    pub duration: i64,
    pub provider: String,
    pub model: String,
    pub mapped_model: Option<String>,
    pub account_email: Option<String>,
    pub error: Option<String>,
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

/// Owns the SQLite pool and every table the core mutates.
#[derive(Clone)]
pub struct Store {
    pub pool: SqlitePool,
}

impl Store {
    pub async fn connect(database_path: &str) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", database_path))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let store = Self { pool };
        store.ensure_api_key().await?;
        Ok(store)
    }

    /// An in-memory SQLite pool with migrations applied; used by tests and
    /// by the CLI's dry-run paths that don't need on-disk persistence.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        let store = Self { pool };
        store.ensure_api_key().await?;
        Ok(store)
    }

    /// Mints `sk-` + 16 random bytes hex on first boot if no `api_key` config exists.
    async fn ensure_api_key(&self) -> anyhow::Result<()> {
        let existing = self.get_config("api_key").await?;
        if existing.is_none() {
            let mut bytes = [0u8; 16];
            rand::thread_rng().fill_bytes(&mut bytes);
            let key = format!("sk-{}", hex::encode(bytes));
            self.set_config("api_key", &key).await?;
            tracing::info!("minted new shared API key on first boot");
        }
        Ok(())
    }

    pub async fn api_key(&self) -> Result<Option<String>, AppError> {
        self.get_config("api_key").await
    }

    pub async fn get_config(&self, key: &str) -> Result<Option<String>, AppError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM configs WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(v,)| v))
    }

    pub async fn set_config(&self, key: &str, value: &str) -> Result<(), AppError> {
        let now = now_secs();
        sqlx::query(
            "INSERT INTO configs (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- accounts -------------------------------------------------------

    pub async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        let rows = sqlx::query_as::<_, Account>("SELECT * FROM accounts ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn active_accounts(&self) -> Result<Vec<Account>, AppError> {
        let rows = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE is_active = 1 AND refresh_token != '' ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_account(&self, id: &str) -> Result<Option<Account>, AppError> {
        let row = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn upsert_account(
        &self,
        id: &str,
        email: &str,
        provider: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: i64,
        metadata: &str,
    ) -> Result<(), AppError> {
        let now = now_secs();
        sqlx::query(
            r#"
            INSERT INTO accounts (id, email, provider, access_token, refresh_token, expires_at,
                                   is_active, is_primary, scopes, metadata, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, 0, '', ?7, ?8, ?8)
            ON CONFLICT(email, provider) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                is_active = 1,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(provider)
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .bind(metadata)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_token(
        &self,
        id: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: i64,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE accounts SET access_token = ?1, refresh_token = ?2, expires_at = ?3,
             is_active = 1, updated_at = ?4 WHERE id = ?5",
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .bind(now_secs())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn touch_last_used(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE accounts SET last_used_at = ?1 WHERE id = ?2")
            .bind(now_secs())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn deactivate_account(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE accounts SET is_active = 0, updated_at = ?1 WHERE id = ?2")
            .bind(now_secs())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn promote_account(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE accounts SET is_primary = 0")
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE accounts SET is_primary = 1, updated_at = ?1 WHERE id = ?2")
            .bind(now_secs())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // --- model routes -----------------------------------------------------

    pub async fn list_routes(&self) -> Result<Vec<ModelRoute>, AppError> {
        let rows = sqlx::query_as::<_, ModelRoute>("SELECT * FROM model_routes ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn add_route(
        &self,
        client_model: &str,
        target_provider: &str,
        target_model: &str,
    ) -> Result<i64, AppError> {
        let now = now_secs();
        let result = sqlx::query(
            r#"
            INSERT INTO model_routes (client_model, target_provider, target_model, is_active, created_at)
            VALUES (?1, ?2, ?3, 1, ?4)
            ON CONFLICT(client_model, target_provider) DO UPDATE SET
                target_model = excluded.target_model, is_active = 1
            "#,
        )
        .bind(client_model)
        .bind(target_provider)
        .bind(target_model)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn remove_route(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM model_routes WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn reset_routes(&self) -> Result<(), AppError> {
        sqlx::query("DELETE FROM model_routes").execute(&self.pool).await?;
        Ok(())
    }

    // --- request logs -------------------------------------------------------

    pub async fn insert_request_log(&self, log: NewRequestLog) -> Result<i64, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO request_logs (
                timestamp, method, url, status, duration, provider, model, mapped_model,
                account_email, error, request_body, response_body, input_tokens, output_tokens
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(log.timestamp)
        .bind(&log.method)
        .bind(&log.url)
        .bind(log.status)
        .bind(log.duration)
        .bind(&log.provider)
        .bind(&log.model)
        .bind(&log.mapped_model)
        .bind(&log.account_email)
        .bind(&log.error)
        .bind(&log.request_body)
        .bind(&log.response_body)
        .bind(log.input_tokens)
        .bind(log.output_tokens)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn recent_request_logs(&self, limit: i64) -> Result<Vec<RequestLog>, AppError> {
        let rows = sqlx::query_as::<_, RequestLog>(
            "SELECT * FROM request_logs ORDER BY id DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

pub fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
