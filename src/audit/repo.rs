use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::audit::dto::AuditLogQuery;
use crate::audit::repo_types::{AuditLogRow, NewAuditLog};

pub async fn insert(db: &PgPool, entry: &NewAuditLog) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO audit_logs \
           (action, resource, resource_id, user_id, changes, ip_address, user_agent) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(entry.action)
    .bind(entry.resource)
    .bind(entry.resource_id.as_str())
    .bind(entry.user_id)
    .bind(entry.changes.as_ref())
    .bind(entry.ip_address.as_deref())
    .bind(entry.user_agent.as_deref())
    .execute(db)
    .await?;
    Ok(())
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &AuditLogQuery) {
    builder.push(" WHERE TRUE");
    if let Some(resource) = filters.resource {
        builder.push(" AND a.resource = ").push_bind(resource);
    }
    if let Some(action) = filters.action {
        builder.push(" AND a.action = ").push_bind(action);
    }
    if let Some(user_id) = filters.user_id {
        builder.push(" AND a.user_id = ").push_bind(user_id);
    }
    if let Some(start) = filters.start_date {
        builder.push(" AND a.created_at >= ").push_bind(start);
    }
    if let Some(end) = filters.end_date {
        builder.push(" AND a.created_at <= ").push_bind(end);
    }
}

pub async fn list(
    db: &PgPool,
    filters: &AuditLogQuery,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<AuditLogRow>> {
    let mut builder = QueryBuilder::new(
        "SELECT a.id, a.action, a.resource, a.resource_id, a.user_id, a.changes, \
                a.ip_address, a.user_agent, a.created_at, \
                u.email AS user_email, u.name AS user_name \
         FROM audit_logs a \
         LEFT JOIN users u ON u.id = a.user_id",
    );
    push_filters(&mut builder, filters);
    // Newest first; id breaks ties between same-timestamp rows.
    builder.push(" ORDER BY a.created_at DESC, a.id DESC");
    builder.push(" LIMIT ").push_bind(limit);
    builder.push(" OFFSET ").push_bind(offset);
    builder.build_query_as::<AuditLogRow>().fetch_all(db).await
}

pub async fn count(db: &PgPool, filters: &AuditLogQuery) -> sqlx::Result<i64> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM audit_logs a");
    push_filters(&mut builder, filters);
    let (total,): (i64,) = builder.build_query_as().fetch_one(db).await?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::repo_types::{AuditAction, AuditResource};
    use uuid::Uuid;

    #[test]
    fn no_filters_builds_bare_query() {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM audit_logs a");
        push_filters(&mut builder, &AuditLogQuery::default());
        assert_eq!(builder.sql(), "SELECT COUNT(*) FROM audit_logs a WHERE TRUE");
    }

    #[test]
    fn each_filter_adds_a_bound_clause() {
        let filters = AuditLogQuery {
            resource: Some(AuditResource::Post),
            action: Some(AuditAction::Update),
            user_id: Some(Uuid::new_v4()),
            start_date: Some(time::macros::datetime!(2025-01-01 00:00 UTC)),
            end_date: Some(time::macros::datetime!(2025-12-31 00:00 UTC)),
            ..Default::default()
        };
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM audit_logs a");
        push_filters(&mut builder, &filters);
        let sql = builder.sql();
        assert!(sql.contains("a.resource = $1"));
        assert!(sql.contains("a.action = $2"));
        assert!(sql.contains("a.user_id = $3"));
        assert!(sql.contains("a.created_at >= $4"));
        assert!(sql.contains("a.created_at <= $5"));
    }

    #[test]
    fn list_orders_newest_first() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM audit_logs a");
        push_filters(&mut builder, &AuditLogQuery::default());
        builder.push(" ORDER BY a.created_at DESC, a.id DESC");
        assert!(builder.sql().ends_with("ORDER BY a.created_at DESC, a.id DESC"));
    }
}
