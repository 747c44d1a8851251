use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Conflict, ConflictStat, ConflictStatus, ConflictType, User};
use crate::services::WriteGate;
use crate::store::{ConflictFilter, ConflictScope, ConflictStore};

/// Moves detected conflicts through appeal and resolution.
///
/// Resolving a conflict does not touch the timetables it links; callers
/// revalidate them through `TimetableService::revalidate`.
pub struct ConflictService {
    conflicts: Arc<dyn ConflictStore>,
    gate: WriteGate,
}

impl ConflictService {
    pub fn new(conflicts: Arc<dyn ConflictStore>, gate: WriteGate) -> Self {
        Self { conflicts, gate }
    }

    pub async fn resolve(&self, id: Uuid, notes: String, actor: &User) -> Result<Conflict, AppError> {
        let _guard = self.gate.lock().await;
        let mut conflict = self.require(id).await?;

        conflict.status = ConflictStatus::Resolved;
        conflict.resolution_notes = Some(notes);
        conflict.resolved_by = Some(actor.id);
        conflict.resolved_at = Some(Utc::now());
        self.conflicts.update_conflict(&conflict).await?;

        info!("conflict {} resolved by {}", id, actor.username);
        Ok(conflict)
    }

    pub async fn appeal(&self, id: Uuid, actor: &User) -> Result<Conflict, AppError> {
        let _guard = self.gate.lock().await;
        let mut conflict = self.require(id).await?;

        if conflict.status != ConflictStatus::Detected {
            return Err(AppError::InvalidState(format!(
                "conflict {} is {:?}; only DETECTED conflicts can be appealed",
                id, conflict.status
            )));
        }
        conflict.status = ConflictStatus::Appealed;
        self.conflicts.update_conflict(&conflict).await?;

        info!("conflict {} appealed by {}", id, actor.username);
        Ok(conflict)
    }

    pub async fn get(&self, id: Uuid) -> Result<Conflict, AppError> {
        self.require(id).await
    }

    /// DETECTED and APPEALED conflicts within `scope`, newest first.
    pub async fn list_unresolved(&self, scope: ConflictScope) -> Result<Vec<Conflict>, AppError> {
        self.conflicts
            .list_conflicts(&ConflictFilter::unresolved(scope))
            .await
    }

    pub async fn list_by_type(&self, conflict_type: ConflictType) -> Result<Vec<Conflict>, AppError> {
        let filter = ConflictFilter {
            scope: ConflictScope::All,
            statuses: Vec::new(),
            conflict_type: Some(conflict_type),
        };
        self.conflicts.list_conflicts(&filter).await
    }

    pub async fn list_by_status(&self, status: ConflictStatus) -> Result<Vec<Conflict>, AppError> {
        let filter = ConflictFilter {
            scope: ConflictScope::All,
            statuses: vec![status],
            conflict_type: None,
        };
        self.conflicts.list_conflicts(&filter).await
    }

    pub async fn statistics(&self) -> Result<Vec<ConflictStat>, AppError> {
        self.conflicts.conflict_stats().await
    }

    async fn require(&self, id: Uuid) -> Result<Conflict, AppError> {
        self.conflicts
            .find_conflict(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("conflict {}", id)))
    }
}
