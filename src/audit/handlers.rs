use axum::{extract::State, routing::get, Router};
use tracing::instrument;

use crate::audit::dto::{AuditLogEntry, AuditLogQuery};
use crate::audit::repo;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Query};
use crate::pagination::Paginated;
use crate::state::AppState;
use crate::users::Role;

pub fn router() -> Router<AppState> {
    Router::new().route("/audit/logs", get(list_logs))
}

#[instrument(skip(state, auth))]
pub async fn list_logs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filters): Query<AuditLogQuery>,
) -> ApiResult<Json<Paginated<AuditLogEntry>>> {
    auth.require(Role::Admin)?;

    if let (Some(start), Some(end)) = (filters.start_date, filters.end_date) {
        if start > end {
            return Err(ApiError::validation("start_date must not be after end_date"));
        }
    }

    let (page, limit) = filters.page_limit();
    let offset = (page - 1) * limit;

    let total = repo::count(&state.db, &filters).await?;
    let rows = repo::list(&state.db, &filters, limit, offset).await?;
    let data = rows.into_iter().map(AuditLogEntry::from).collect();

    Ok(Json(Paginated::new(data, page, limit, total)))
}
