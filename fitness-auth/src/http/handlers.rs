use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::HeaderName;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Map, Value};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::db::{NewUser, ProfileChanges};
use crate::validation::{
    json_kind, username_candidate, FieldErrors, Validate, USERNAME_TAKEN,
};

use super::error::ApiError;
use super::responses::{HealthResponse, ProfileResponse, TokenResponse, UserResponse, MOCK_TOKEN};
use super::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/register/", post(register))
        .route("/auth/login", post(login))
        .route("/auth/login/", post(login))
        .route("/auth/profile/{user_id}", get(profile_get).put(profile_put))
        .route("/auth/profile/{user_id}/", get(profile_get).put(profile_put))
        // Outermost last: the id is set before tracing and copied back on the way out.
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    if let Err(err) = state.db.ping().await {
        warn!(error = %err, "health check failed");
        return Err(ApiError::Unavailable);
    }
    Ok(Json(HealthResponse { status: "ok" }))
}

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let data = object_body(payload)?;
    let validated = NewUser::validate(&data);

    let users = state.db.users();
    let taken = match username_candidate(&data) {
        Some(username) => users.username_exists(&username).await?,
        None => false,
    };

    let new_user = match validated {
        Ok(new_user) if taken => {
            debug!(username = %new_user.username, "registration rejected: username taken");
            return Err(FieldErrors::single("username", USERNAME_TAKEN).into());
        }
        Ok(new_user) => new_user,
        Err(mut errors) => {
            if taken {
                errors.add("username", USERNAME_TAKEN);
            }
            return Err(errors.into());
        }
    };

    let user = users.create_with_profile(new_user).await?;
    info!(user_id = user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Placeholder: no credentials are checked and the token is a fixed string.
async fn login() -> Json<TokenResponse> {
    warn!("login is a placeholder; returning mock token without checking credentials");
    Json(TokenResponse { token: MOCK_TOKEN })
}

async fn profile_get(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let profile = state
        .db
        .profiles()
        .get(user_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    debug!(user_id, "profile requested");
    Ok(Json(ProfileResponse::from(profile)))
}

async fn profile_put(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let profiles = state.db.profiles();
    if profiles.get(user_id).await?.is_none() {
        return Err(ApiError::NotFound);
    }

    let data = object_body(payload)?;
    let changes = ProfileChanges::validate(&data)?;
    let profile = profiles
        .update(user_id, &changes)
        .await?
        .ok_or(ApiError::NotFound)?;
    info!(user_id, "profile updated");
    Ok(Json(ProfileResponse::from(profile)))
}

/// Unwrap a JSON body that must be an object.
fn object_body(
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Map<String, Value>, ApiError> {
    match payload {
        Ok(Json(Value::Object(map))) => Ok(map),
        Ok(Json(other)) => Err(ApiError::NotAnObject(json_kind(&other))),
        Err(rejection) => {
            debug!(error = %rejection, "rejected request body");
            Err(ApiError::MalformedBody(rejection.body_text()))
        }
    }
}

/// Only plain digit strings name a profile; anything else (signs, spaces,
/// overflow) is reported as missing.
fn parse_user_id(raw: &str) -> Result<i64, ApiError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::NotFound);
    }
    raw.parse::<i64>().map_err(|_| ApiError::NotFound)
}
