//! SQLite implementation of IUserRepository
//!
//! ## Type Mapping
//!
//! | Domain Type    | SQL Type | Strategy                                   |
//! |----------------|----------|--------------------------------------------|
//! | UserId         | TEXT     | UUID string via `.to_string()` / `FromStr` |
//! | DateTime<Utc>  | TEXT     | RFC 3339 via `to_rfc3339()`                |
//! | Tokens         | TEXT x3  | one column per field, per service          |
//! | StatusUpdate   | TEXT     | serde_json serialization                   |
//! | bool           | INTEGER  | 0 / 1                                      |

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use spotislack_core::domain::{Service, StatusUpdate, Tokens, User, UserId};
use spotislack_core::ports::IUserRepository;

use crate::StoreError;

/// SQLite-based implementation of the user repository port
#[derive(Debug, Clone)]
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    /// Creates a new repository instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Counts all users, enabled or not
    pub async fn count_users(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM users")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(n as u64)
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Parse a DateTime<Utc> from an RFC 3339 string (or SQLite's default format)
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| StoreError::SerializationError(format!("Failed to parse datetime '{s}': {e}")))
}

fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    match s {
        Some(ref val) if !val.is_empty() => parse_datetime(val).map(Some),
        _ => Ok(None),
    }
}

/// Column names holding one service's tokens
fn token_columns(service: Service) -> (&'static str, &'static str, &'static str) {
    match service {
        Service::Spotify => (
            "spotify_access_token",
            "spotify_refresh_token",
            "spotify_expires_at",
        ),
        Service::Slack => (
            "slack_access_token",
            "slack_refresh_token",
            "slack_expires_at",
        ),
    }
}

fn tokens_from_row(row: &SqliteRow, service: Service) -> Result<Tokens, StoreError> {
    let (access, refresh, expires) = token_columns(service);
    Ok(Tokens {
        access_token: row.get(access),
        refresh_token: row.get(refresh),
        expires_at: parse_optional_datetime(row.get(expires))?,
    })
}

fn status_to_json(status: Option<&StatusUpdate>) -> Result<Option<String>, StoreError> {
    status
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoreError::SerializationError(format!("last_status: {e}")))
}

// ============================================================================
// Row mapping
// ============================================================================

fn user_from_row(row: &SqliteRow) -> Result<User, StoreError> {
    let id_str: String = row.get("id");
    let id = UserId::from_str(&id_str)
        .map_err(|e| StoreError::SerializationError(format!("user id '{id_str}': {e}")))?;

    let last_status_json: Option<String> = row.get("last_status");
    let last_status = last_status_json
        .as_deref()
        .map(serde_json::from_str::<StatusUpdate>)
        .transpose()
        .map_err(|e| StoreError::SerializationError(format!("last_status of {id}: {e}")))?;

    let sync_enabled: i64 = row.get("sync_enabled");
    let created_at = parse_datetime(&row.get::<String, _>("created_at"))?;
    let updated_at = parse_datetime(&row.get::<String, _>("updated_at"))?;

    let user = User::new(
        row.get::<String, _>("slack_user_id"),
        row.get::<String, _>("slack_team_id"),
        row.get::<String, _>("spotify_user_id"),
        tokens_from_row(row, Service::Spotify)?,
        tokens_from_row(row, Service::Slack)?,
    )
    .with_last_status(last_status)
    .with_sync_enabled(sync_enabled != 0)
    .with_status_emoji(row.get("status_emoji"))
    .with_identity(id, created_at, updated_at);

    Ok(user)
}

// ============================================================================
// IUserRepository implementation
// ============================================================================

#[async_trait::async_trait]
impl IUserRepository for SqliteUserRepository {
    async fn list_enabled_users(&self) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT * FROM users WHERE sync_enabled = 1 ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in &rows {
            users.push(user_from_row(row)?);
        }
        tracing::trace!(count = users.len(), "Listed enabled users");
        Ok(users)
    }

    async fn get_user(&self, id: &UserId) -> anyhow::Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(user_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn save_user(&self, user: &User) -> anyhow::Result<()> {
        let id = user.id().to_string();
        let spotify = user.tokens(Service::Spotify);
        let slack = user.tokens(Service::Slack);
        let last_status = status_to_json(user.last_status())?;

        sqlx::query(
            "INSERT INTO users \
             (id, slack_user_id, slack_team_id, spotify_user_id, \
              spotify_access_token, spotify_refresh_token, spotify_expires_at, \
              slack_access_token, slack_refresh_token, slack_expires_at, \
              last_status, sync_enabled, status_emoji, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
              slack_user_id = excluded.slack_user_id, \
              slack_team_id = excluded.slack_team_id, \
              spotify_user_id = excluded.spotify_user_id, \
              spotify_access_token = excluded.spotify_access_token, \
              spotify_refresh_token = excluded.spotify_refresh_token, \
              spotify_expires_at = excluded.spotify_expires_at, \
              slack_access_token = excluded.slack_access_token, \
              slack_refresh_token = excluded.slack_refresh_token, \
              slack_expires_at = excluded.slack_expires_at, \
              last_status = excluded.last_status, \
              sync_enabled = excluded.sync_enabled, \
              status_emoji = excluded.status_emoji, \
              updated_at = excluded.updated_at",
        )
        .bind(&id)
        .bind(user.slack_user_id())
        .bind(user.slack_team_id())
        .bind(user.spotify_user_id())
        .bind(&spotify.access_token)
        .bind(&spotify.refresh_token)
        .bind(spotify.expires_at.map(|dt| dt.to_rfc3339()))
        .bind(&slack.access_token)
        .bind(&slack.refresh_token)
        .bind(slack.expires_at.map(|dt| dt.to_rfc3339()))
        .bind(&last_status)
        .bind(user.sync_enabled() as i64)
        .bind(user.status_emoji())
        .bind(user.created_at().to_rfc3339())
        .bind(user.updated_at().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::trace!(user_id = %id, "Saved user");
        Ok(())
    }

    async fn delete_user(&self, id: &UserId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        tracing::debug!(user_id = %id, "Deleted user");
        Ok(())
    }

    async fn update_tokens(
        &self,
        id: &UserId,
        service: Service,
        tokens: &Tokens,
    ) -> anyhow::Result<()> {
        let (access, refresh, expires) = token_columns(service);
        let sql = format!(
            "UPDATE users SET {access} = ?, {refresh} = ?, {expires} = ?, updated_at = ? \
             WHERE id = ?"
        );

        let result = sqlx::query(&sql)
            .bind(&tokens.access_token)
            .bind(&tokens.refresh_token)
            .bind(tokens.expires_at.map(|dt| dt.to_rfc3339()))
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()).into());
        }
        tracing::trace!(user_id = %id, %service, "Updated tokens");
        Ok(())
    }

    async fn update_last_status(
        &self,
        id: &UserId,
        status: Option<&StatusUpdate>,
    ) -> anyhow::Result<()> {
        let json = status_to_json(status)?;
        let result = sqlx::query("UPDATE users SET last_status = ?, updated_at = ? WHERE id = ?")
            .bind(&json)
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()).into());
        }
        tracing::trace!(user_id = %id, cleared = status.is_none(), "Updated last status");
        Ok(())
    }
}
