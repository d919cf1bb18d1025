use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, ConnectionTrait, Set};
use serde_json::Value;
use uuid::Uuid;

use crate::{entity::audit_logs::ActiveModel as AuditActive, error::AppResult};

/// One row in `audit_logs`: who did what to which resource.
#[derive(Debug, Clone)]
pub struct AuditEntry<'a> {
    pub user_id: Option<Uuid>,
    pub action: &'a str,
    pub resource: &'a str,
    pub metadata: Value,
}

pub async fn write_entry<C: ConnectionTrait>(conn: &C, entry: AuditEntry<'_>) -> AppResult<()> {
    AuditActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(entry.user_id),
        action: Set(entry.action.to_string()),
        resource: Set(Some(entry.resource.to_string())),
        metadata: Set(Some(entry.metadata)),
        created_at: NotSet,
    }
    .insert(conn)
    .await?;
    Ok(())
}

/// Best-effort audit write; a failure is logged and otherwise ignored.
pub async fn record<C: ConnectionTrait>(
    conn: &C,
    user_id: Option<Uuid>,
    action: &str,
    resource: &str,
    metadata: Value,
) {
    let entry = AuditEntry {
        user_id,
        action,
        resource,
        metadata,
    };
    if let Err(err) = write_entry(conn, entry).await {
        tracing::warn!(error = %err, action, "audit log failed");
    }
}
