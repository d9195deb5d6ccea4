use sqlx::{FromRow, SqlitePool};

use super::{now_rfc3339, DbError};

/// A stored account. The password column is never read back out.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub date_joined: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub struct UsersRepository {
    pool: SqlitePool,
}

impl UsersRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Usernames compare case-insensitively.
    pub async fn username_exists(&self, username: &str) -> Result<bool, DbError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Insert the user and its empty profile in one transaction.
    pub async fn create_with_profile(&self, user: NewUser) -> Result<UserRecord, DbError> {
        let now = now_rfc3339();
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (username, email, password, date_joined)
            VALUES (?, ?, ?, ?)
            RETURNING id, username, email, date_joined
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await;

        let record = match inserted {
            Ok(record) => record,
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                return Err(DbError::UsernameTaken(user.username));
            }
            Err(err) => return Err(err.into()),
        };

        sqlx::query("INSERT INTO profiles (user_id, updated_at) VALUES (?, ?)")
            .bind(record.id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(record)
    }
}
