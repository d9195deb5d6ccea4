//! HTTP layer: Axum router, handlers, and responses.
//!
//! Exposes `/auth/register`, `/auth/login` and `/auth/profile/{user_id}`,
//! plus a `/health` check.

mod error;
mod handlers;
mod responses;
mod state;


pub use handlers::router;
pub use state::AppState;
