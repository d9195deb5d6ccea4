use serde::Serialize;

use crate::db::{ProfileRecord, UserRecord};

/// Placeholder credential handed out by the login stub.
pub const MOCK_TOKEN: &str = "mock-jwt-token";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: &'static str,
}

/// Public view of a user. The password is write-only and never echoed.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub date_joined: String,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            date_joined: user.date_joined,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user_id: i64,
    pub username: String,
    pub bio: String,
    pub fitness_goals: String,
    pub preferred_activities: String,
    pub avatar: String,
    pub updated_at: String,
}

impl From<ProfileRecord> for ProfileResponse {
    fn from(profile: ProfileRecord) -> Self {
        Self {
            user_id: profile.user_id,
            username: profile.username,
            bio: profile.bio,
            fitness_goals: profile.fitness_goals,
            preferred_activities: profile.preferred_activities,
            avatar: profile.avatar,
            updated_at: profile.updated_at,
        }
    }
}
