use axum::Router;

use crate::state::AppState;

mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;

pub use extractors::{AuthUser, RequestMeta};

pub fn router() -> Router<AppState> {
    handlers::router()
}
