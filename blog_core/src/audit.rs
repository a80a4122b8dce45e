use async_trait::async_trait;
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    entity::prelude::*,
    error::BlogResult,
    ids::{AuditLogId, UserId},
};

/// One state change worth keeping. `before`/`after` hold only the fields
/// that changed, never secrets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entity: String,
    pub action: String,
    pub entity_id: Uuid,
    pub performed_by: Option<UserId>,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
}

impl AuditEntry {
    pub fn new(entity: &str, action: &str, entity_id: impl Into<Uuid>) -> Self {
        Self {
            entity: entity.to_string(),
            action: action.to_string(),
            entity_id: entity_id.into(),
            performed_by: None,
            before: None,
            after: None,
        }
    }

    pub fn by(mut self, user: UserId) -> Self {
        self.performed_by = Some(user);
        self
    }

    pub fn before(mut self, value: serde_json::Value) -> Self {
        self.before = Some(value);
        self
    }

    pub fn after(mut self, value: serde_json::Value) -> Self {
        self.after = Some(value);
        self
    }
}

/// Receives audit entries after the change they describe is committed.
/// A failed `record` never undoes that change.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> BlogResult<()>;
}

/// Persists entries into `audit_log`.
#[derive(Clone)]
pub struct DbAuditSink {
    db: DatabaseConnection,
}

impl DbAuditSink {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Entries about one entity, oldest first.
pub async fn entries_for<C: ConnectionTrait>(conn: &C, entity_id: Uuid) -> BlogResult<Vec<AuditLogModel>> {
    Ok(AuditLog::find()
        .filter(AuditLogColumn::EntityId.eq(entity_id))
        .order_by_asc(AuditLogColumn::Timestamp)
        .order_by_asc(AuditLogColumn::Id)
        .all(conn)
        .await?)
}

#[async_trait]
impl AuditSink for DbAuditSink {
    async fn record(&self, entry: AuditEntry) -> BlogResult<()> {
        AuditLog::insert(AuditLogActiveModel {
            id: Set(AuditLogId::new()),
            entity: Set(entry.entity),
            action: Set(entry.action),
            entity_id: Set(entry.entity_id),
            performed_by: Set(entry.performed_by),
            before: Set(entry.before),
            after: Set(entry.after),
            timestamp: Set(Utc::now()),
        })
        .exec(&self.db)
        .await?;
        Ok(())
    }
}

/// Records `entry`, downgrading failures to a warning.
pub async fn emit(sink: &dyn AuditSink, entry: AuditEntry) {
    let action = entry.action.clone();
    let entity_id = entry.entity_id;
    if let Err(error) = sink.record(entry).await {
        tracing::warn!(%action, %entity_id, %error, "audit entry dropped");
    }
}
