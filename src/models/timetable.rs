use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimetableStatus {
    Draft,
    PendingApproval,
    Conflicted,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    Lecture,
    Lab,
    Tutorial,
    Seminar,
    Exam,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Semester {
    First,
    Second,
}

impl Semester {
    /// February through July belongs to the second semester.
    pub fn containing(date: NaiveDate) -> Self {
        if (2..=7).contains(&date.month()) {
            Semester::Second
        } else {
            Semester::First
        }
    }
}

/// The axis an entry is scheduled on: a weekday for recurring activities or
/// a calendar date for single occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    Weekly(Weekday),
    Date(NaiveDate),
}

impl Schedule {
    pub fn from_parts(
        day_of_week: Option<Weekday>,
        specific_date: Option<NaiveDate>,
    ) -> Result<Self, AppError> {
        match (day_of_week, specific_date) {
            (Some(day), None) => Ok(Schedule::Weekly(day)),
            (None, Some(date)) => Ok(Schedule::Date(date)),
            (Some(_), Some(_)) => Err(AppError::Validation(
                "day_of_week and specific_date are mutually exclusive".to_string(),
            )),
            (None, None) => Err(AppError::Validation(
                "one of day_of_week or specific_date is required".to_string(),
            )),
        }
    }

    pub fn day_of_week(&self) -> Option<Weekday> {
        match self {
            Schedule::Weekly(day) => Some(*day),
            Schedule::Date(_) => None,
        }
    }

    pub fn specific_date(&self) -> Option<NaiveDate> {
        match self {
            Schedule::Weekly(_) => None,
            Schedule::Date(date) => Some(*date),
        }
    }
}

/// Half-open time range `[start, end)` on a schedule axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    pub schedule: Schedule,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSlot {
    pub fn new(schedule: Schedule, start: NaiveTime, end: NaiveTime) -> Result<Self, AppError> {
        let start = truncate_to_seconds(start);
        let end = truncate_to_seconds(end);
        if start >= end {
            return Err(AppError::Validation(format!(
                "start_time {start} must be before end_time {end}"
            )));
        }
        Ok(Self { schedule, start, end })
    }
}

fn truncate_to_seconds(time: NaiveTime) -> NaiveTime {
    time.with_nanosecond(0).unwrap_or(time)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timetable {
    pub id: Uuid,
    pub course_id: Uuid,
    pub activity_type: ActivityType,
    pub room_id: Uuid,
    pub schedule: Schedule,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub semester: Semester,
    pub status: TimetableStatus,
    pub created_at: DateTime<Utc>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

impl Timetable {
    /// Builds a fresh DRAFT entry with a newly assigned id.
    pub fn draft(req: TimetableRequest) -> Result<Self, AppError> {
        let slot = req.slot()?;
        Ok(Self {
            id: Uuid::new_v4(),
            course_id: req.course_id,
            activity_type: req.activity_type,
            room_id: req.room_id,
            schedule: slot.schedule,
            start_time: slot.start,
            end_time: slot.end,
            semester: req.semester,
            status: TimetableStatus::Draft,
            created_at: Utc::now(),
            approved_by: None,
            approved_at: None,
            description: req.description,
        })
    }

    /// Replaces the editable attributes, keeping identity, status and audit fields.
    pub fn apply(&mut self, req: TimetableRequest) -> Result<(), AppError> {
        let slot = req.slot()?;
        self.course_id = req.course_id;
        self.activity_type = req.activity_type;
        self.room_id = req.room_id;
        self.schedule = slot.schedule;
        self.start_time = slot.start;
        self.end_time = slot.end;
        self.semester = req.semester;
        self.description = req.description;
        Ok(())
    }

    pub fn slot(&self) -> TimeSlot {
        TimeSlot {
            schedule: self.schedule,
            start: self.start_time,
            end: self.end_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimetableRequest {
    pub course_id: Uuid,
    pub activity_type: ActivityType,
    pub room_id: Uuid,
    #[serde(default)]
    pub day_of_week: Option<Weekday>,
    #[serde(default)]
    pub specific_date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub semester: Semester,
    #[serde(default)]
    pub description: Option<String>,
}

impl TimetableRequest {
    pub fn slot(&self) -> Result<TimeSlot, AppError> {
        let schedule = Schedule::from_parts(self.day_of_week, self.specific_date)?;
        TimeSlot::new(schedule, self.start_time, self.end_time)
    }
}
