use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::audit::repo_types::{AuditAction, AuditLogRow, AuditResource};

/// Filters for the audit query endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLogQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub resource: Option<AuditResource>,
    pub action: Option<AuditAction>,
    pub user_id: Option<Uuid>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
}

impl AuditLogQuery {
    pub fn page_limit(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(20).clamp(1, 100);
        (page, limit)
    }
}

/// Minimal projection of the acting user.
#[derive(Debug, Serialize)]
pub struct AuditActor {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub action: AuditAction,
    pub resource: AuditResource,
    pub resource_id: String,
    pub changes: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub user: Option<AuditActor>,
}

impl From<AuditLogRow> for AuditLogEntry {
    fn from(row: AuditLogRow) -> Self {
        let user = match (row.user_id, row.user_email, row.user_name) {
            (Some(id), Some(email), Some(name)) => Some(AuditActor { id, email, name }),
            _ => None,
        };
        Self {
            id: row.id,
            action: row.action,
            resource: row.resource,
            resource_id: row.resource_id,
            changes: row.changes,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: row.created_at,
            user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn row(user: bool) -> AuditLogRow {
        AuditLogRow {
            id: Uuid::new_v4(),
            action: AuditAction::Create,
            resource: AuditResource::Post,
            resource_id: "abc".into(),
            user_id: user.then(Uuid::new_v4),
            changes: None,
            ip_address: None,
            user_agent: None,
            created_at: datetime!(2025-06-01 12:00 UTC),
            user_email: user.then(|| "a@x.com".into()),
            user_name: user.then(|| "A".into()),
        }
    }

    #[test]
    fn entry_carries_user_projection_when_present() {
        let entry = AuditLogEntry::from(row(true));
        let user = entry.user.expect("user projection");
        assert_eq!(user.email, "a@x.com");
    }

    #[test]
    fn entry_user_is_null_for_anonymous_actions() {
        let entry = AuditLogEntry::from(row(false));
        assert!(entry.user.is_none());
    }

    #[test]
    fn page_limit_defaults_and_clamps() {
        let q = AuditLogQuery::default();
        assert_eq!(q.page_limit(), (1, 20));
        let q = AuditLogQuery {
            page: Some(0),
            limit: Some(5000),
            ..Default::default()
        };
        assert_eq!(q.page_limit(), (1, 100));
    }
}
