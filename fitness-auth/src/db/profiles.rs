use sqlx::{FromRow, SqlitePool};

use super::{now_rfc3339, DbError};

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ProfileRecord {
    pub user_id: i64,
    pub username: String,
    pub bio: String,
    pub fitness_goals: String,
    pub preferred_activities: String,
    pub avatar: String,
    pub updated_at: String,
}

/// Fields to overwrite on a profile. `None` leaves the stored value as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub bio: Option<String>,
    pub fitness_goals: Option<String>,
    pub preferred_activities: Option<String>,
    pub avatar: Option<String>,
}

pub struct ProfilesRepository {
    pool: SqlitePool,
}

impl ProfilesRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, user_id: i64) -> Result<Option<ProfileRecord>, DbError> {
        let row = sqlx::query_as::<_, ProfileRecord>(
            r#"
            SELECT p.user_id, u.username, p.bio, p.fitness_goals, p.preferred_activities,
                   p.avatar, p.updated_at
            FROM profiles p
            JOIN users u ON u.id = p.user_id
            WHERE p.user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Apply `changes` and return the stored profile, or `None` when the user
    /// has no profile. `updated_at` only moves when a value actually differs,
    /// so repeating an update leaves the row untouched.
    pub async fn update(
        &self,
        user_id: i64,
        changes: &ProfileChanges,
    ) -> Result<Option<ProfileRecord>, DbError> {
        sqlx::query(
            r#"
            UPDATE profiles
            SET bio = COALESCE(?1, bio),
                fitness_goals = COALESCE(?2, fitness_goals),
                preferred_activities = COALESCE(?3, preferred_activities),
                avatar = COALESCE(?4, avatar),
                updated_at = ?5
            WHERE user_id = ?6
              AND (bio IS NOT COALESCE(?1, bio)
                OR fitness_goals IS NOT COALESCE(?2, fitness_goals)
                OR preferred_activities IS NOT COALESCE(?3, preferred_activities)
                OR avatar IS NOT COALESCE(?4, avatar))
            "#,
        )
        .bind(&changes.bio)
        .bind(&changes.fitness_goals)
        .bind(&changes.preferred_activities)
        .bind(&changes.avatar)
        .bind(now_rfc3339())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        self.get(user_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use anyhow::Result;

    use super::{ProfileChanges, ProfilesRepository};
    use crate::db::{Database, NewUser};

    async fn seeded() -> Result<(Database, i64)> {
        let db = Database::in_memory().await?;
        let user = db
            .users()
            .create_with_profile(NewUser {
                username: String::from("runner"),
                email: String::from("runner@example.com"),
                password: String::from("pw"),
            })
            .await?;
        Ok((db, user.id))
    }

    #[tokio::test]
    async fn get_returns_none_for_unknown_user() -> Result<()> {
        let (db, _) = seeded().await?;
        assert!(db.profiles().get(999).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn update_only_touches_given_fields() -> Result<()> {
        let (db, user_id) = seeded().await?;
        let profiles = db.profiles();

        profiles
            .update(
                user_id,
                &ProfileChanges {
                    bio: Some(String::from("Trail runner")),
                    fitness_goals: Some(String::from("Sub-4 marathon")),
                    ..Default::default()
                },
            )
            .await?;
        let updated = profiles
            .update(
                user_id,
                &ProfileChanges {
                    avatar: Some(String::from("https://example.com/me.png")),
                    ..Default::default()
                },
            )
            .await?
            .unwrap();

        assert_eq!(updated.bio, "Trail runner");
        assert_eq!(updated.fitness_goals, "Sub-4 marathon");
        assert_eq!(updated.preferred_activities, "");
        assert_eq!(updated.avatar, "https://example.com/me.png");
        Ok(())
    }

    const STALE: &str = "2020-01-01T00:00:00Z";

    async fn backdate(profiles: &ProfilesRepository, user_id: i64) -> Result<()> {
        sqlx::query("UPDATE profiles SET updated_at = ? WHERE user_id = ?")
            .bind(STALE)
            .bind(user_id)
            .execute(&profiles.pool)
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn repeated_update_keeps_stored_state() -> Result<()> {
        let (db, user_id) = seeded().await?;
        let profiles = db.profiles();
        let changes = ProfileChanges {
            bio: Some(String::from("Yoga most mornings")),
            ..Default::default()
        };

        let first = profiles.update(user_id, &changes).await?.unwrap();
        backdate(&profiles, user_id).await?;
        let second = profiles.update(user_id, &changes).await?.unwrap();

        assert_eq!(second.bio, first.bio);
        assert_eq!(second.updated_at, STALE);
        Ok(())
    }

    #[tokio::test]
    async fn changed_value_moves_updated_at() -> Result<()> {
        let (db, user_id) = seeded().await?;
        let profiles = db.profiles();
        backdate(&profiles, user_id).await?;

        let updated = profiles
            .update(
                user_id,
                &ProfileChanges {
                    preferred_activities: Some(String::from("Rowing")),
                    ..Default::default()
                },
            )
            .await?
            .unwrap();

        assert_eq!(updated.preferred_activities, "Rowing");
        assert_ne!(updated.updated_at, STALE);
        Ok(())
    }

    #[tokio::test]
    async fn update_returns_none_for_unknown_user() -> Result<()> {
        let (db, _) = seeded().await?;
        let result = db
            .profiles()
            .update(
                42,
                &ProfileChanges {
                    bio: Some(String::from("ghost")),
                    ..Default::default()
                },
            )
            .await?;
        assert!(result.is_none());
        Ok(())
    }
}
