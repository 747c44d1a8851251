//! Storage contracts consumed by the detection engine and the controllers.
//!
//! Controllers hold these as `Arc<dyn ...>` so any backend can be injected;
//! `db::SqliteStore` implements all three.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    Conflict, ConflictStat, ConflictStatus, ConflictType, Course, Department, Room, Semester,
    TimeSlot, Timetable, TimetableStatus, User,
};

/// Which peers an overlap query compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapScope {
    Room(Uuid),
    /// Timetables whose course is taught by this lecturer.
    Lecturer(Uuid),
    /// Timetables whose course belongs to this department and level.
    Cohort { department_id: Uuid, level: i32 },
    Course(Uuid),
}

/// Finds non-rejected timetables in `semester` that overlap `slot` within
/// `scope`, skipping `exclude`.
///
/// Overlap needs the same axis (weekday or date) and `[start, end)` ranges
/// that intersect; touching endpoints do not overlap.
#[derive(Debug, Clone, Copy)]
pub struct OverlapQuery {
    pub scope: OverlapScope,
    pub slot: TimeSlot,
    pub semester: Semester,
    pub exclude: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct TimetableFilter {
    pub status: Option<TimetableStatus>,
    pub semester: Option<Semester>,
    pub department_id: Option<Uuid>,
    pub level: Option<i32>,
    pub lecturer_id: Option<Uuid>,
}

/// Restricts which conflicts a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictScope {
    All,
    Timetable(Uuid),
    Department(Uuid),
    Lecturer(Uuid),
}

#[derive(Debug, Clone)]
pub struct ConflictFilter {
    pub scope: ConflictScope,
    pub statuses: Vec<ConflictStatus>,
    pub conflict_type: Option<ConflictType>,
}

impl ConflictFilter {
    pub fn unresolved(scope: ConflictScope) -> Self {
        Self {
            scope,
            statuses: vec![ConflictStatus::Detected, ConflictStatus::Appealed],
            conflict_type: None,
        }
    }
}

#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn find_department(&self, id: Uuid) -> Result<Option<Department>, AppError>;
    async fn list_departments(&self) -> Result<Vec<Department>, AppError>;
    async fn find_course(&self, id: Uuid) -> Result<Option<Course>, AppError>;
    async fn find_room(&self, id: Uuid) -> Result<Option<Room>, AppError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    /// Courses owned by other departments that `department_id` takes.
    async fn borrowed_courses(&self, department_id: Uuid) -> Result<Vec<Course>, AppError>;
    /// Departments that take `course_id` without owning it.
    async fn borrowing_departments(&self, course_id: Uuid) -> Result<Vec<Department>, AppError>;
}

#[async_trait]
pub trait TimetableStore: Send + Sync {
    async fn find_timetable(&self, id: Uuid) -> Result<Option<Timetable>, AppError>;
    async fn find_overlapping(&self, query: &OverlapQuery) -> Result<Vec<Timetable>, AppError>;
    async fn list_timetables(&self, filter: &TimetableFilter) -> Result<Vec<Timetable>, AppError>;
    async fn exams_between(
        &self,
        department_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Timetable>, AppError>;
    /// Inserts or updates `timetable` and inserts every conflict whose
    /// unordered pair is not stored yet, in a single transaction. Returns the
    /// conflicts that were actually inserted.
    async fn commit(
        &self,
        timetable: &Timetable,
        conflicts: &[Conflict],
    ) -> Result<Vec<Conflict>, AppError>;
    /// Deletes the timetable and every conflict referencing it. Returns
    /// `false` when no such timetable exists.
    async fn delete_timetable(&self, id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait ConflictStore: Send + Sync {
    async fn find_conflict(&self, id: Uuid) -> Result<Option<Conflict>, AppError>;
    /// Looks up the record for the unordered pair `{a, b}`.
    async fn find_between(&self, a: Uuid, b: Uuid) -> Result<Option<Conflict>, AppError>;
    async fn conflicts_for_timetable(&self, timetable_id: Uuid) -> Result<Vec<Conflict>, AppError>;
    async fn list_conflicts(&self, filter: &ConflictFilter) -> Result<Vec<Conflict>, AppError>;
    async fn update_conflict(&self, conflict: &Conflict) -> Result<(), AppError>;
    async fn conflict_stats(&self) -> Result<Vec<ConflictStat>, AppError>;
}
