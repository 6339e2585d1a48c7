use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "audit_action", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Read,
    Login,
    Logout,
}

/// What it happened to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "audit_resource", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditResource {
    Post,
    User,
    Category,
    Tag,
    Product,
    Media,
    Comment,
    Newsletter,
    Contact,
    Press,
}

/// One entry headed for the append-only ledger.
#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub action: AuditAction,
    pub resource: AuditResource,
    pub resource_id: String,
    pub user_id: Option<Uuid>,
    pub changes: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Ledger row joined with the acting user's projection (null for system
/// or anonymous actions, or when the user was since deleted).
#[derive(Debug, Clone, FromRow)]
pub struct AuditLogRow {
    pub id: Uuid,
    pub action: AuditAction,
    pub resource: AuditResource,
    pub resource_id: String,
    pub user_id: Option<Uuid>,
    pub changes: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: OffsetDateTime,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_and_resource_serialize_uppercase() {
        assert_eq!(
            serde_json::to_string(&AuditAction::Create).unwrap(),
            "\"CREATE\""
        );
        assert_eq!(
            serde_json::to_string(&AuditResource::Newsletter).unwrap(),
            "\"NEWSLETTER\""
        );
        let action: AuditAction = serde_json::from_str("\"LOGIN\"").unwrap();
        assert_eq!(action, AuditAction::Login);
    }
}
