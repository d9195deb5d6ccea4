//! SQLite persistence for users and their profiles.
//!
//! The [`Database`] handle is cloned into every request; there is no global
//! connection. Tables are created on startup by [`Database::sync_schema`].

mod profiles;
mod users;

use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;

use crate::config::DatabaseConfig;

pub use profiles::{ProfileChanges, ProfileRecord, ProfilesRepository};
pub use users::{NewUser, UserRecord, UsersRepository};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE COLLATE NOCASE,
        email TEXT NOT NULL,
        password TEXT NOT NULL,
        date_joined TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS profiles (
        user_id INTEGER PRIMARY KEY REFERENCES users(id),
        bio TEXT NOT NULL DEFAULT '',
        fitness_goals TEXT NOT NULL DEFAULT '',
        preferred_activities TEXT NOT NULL DEFAULT '',
        avatar TEXT NOT NULL DEFAULT '',
        updated_at TEXT NOT NULL
    )
    "#,
];

#[derive(Debug, Error)]
pub enum DbError {
    #[error("username {0} is already taken")]
    UsernameTaken(String),
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Database wrapper providing connection pool access.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database. Every pooled connection to
    /// `sqlite::memory:` would otherwise see its own empty database.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.sync_schema().await?;
        Ok(db)
    }

    /// Create missing tables. Existing tables are left untouched.
    pub async fn sync_schema(&self) -> Result<(), DbError> {
        for &statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!(tables = SCHEMA.len(), "schema synced");
        Ok(())
    }

    /// Shut the pool down; later queries fail with `PoolClosed`.
    #[cfg(test)]
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn users(&self) -> UsersRepository {
        UsersRepository::new(self.pool.clone())
    }

    pub fn profiles(&self) -> ProfilesRepository {
        ProfilesRepository::new(self.pool.clone())
    }
}

/// Current UTC time as stored in `TEXT` timestamp columns.
fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
