use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod service;

pub use repo_types::{AuditAction, AuditResource, NewAuditLog};
pub use service::AuditService;

pub fn router() -> Router<AppState> {
    handlers::router()
}
