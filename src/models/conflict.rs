use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    RoomConflict,
    LecturerConflict,
    TimeConflict,
    BorrowedCourseConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictStatus {
    Detected,
    Appealed,
    Resolved,
}

impl ConflictStatus {
    pub fn is_unresolved(self) -> bool {
        matches!(self, ConflictStatus::Detected | ConflictStatus::Appealed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Conflict {
    pub id: Uuid,
    pub timetable_1: Uuid,
    pub timetable_2: Uuid,
    pub conflict_type: ConflictType,
    pub status: ConflictStatus,
    pub detected_at: DateTime<Utc>,
    pub resolution_notes: Option<String>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Conflict {
    pub fn detected(timetable_1: Uuid, timetable_2: Uuid, conflict_type: ConflictType) -> Self {
        Self {
            id: Uuid::new_v4(),
            timetable_1,
            timetable_2,
            conflict_type,
            status: ConflictStatus::Detected,
            detected_at: Utc::now(),
            resolution_notes: None,
            resolved_by: None,
            resolved_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ConflictStat {
    pub conflict_type: ConflictType,
    pub status: ConflictStatus,
    pub count: i64,
}
