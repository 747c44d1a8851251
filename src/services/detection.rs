use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Conflict, ConflictType, Course, Timetable};
use crate::store::{DirectoryStore, OverlapQuery, OverlapScope, TimetableStore};

/// An overlap between the candidate and one stored timetable, not yet persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetectedConflict {
    pub counterpart: Uuid,
    pub conflict_type: ConflictType,
}

impl DetectedConflict {
    pub fn to_conflict(self, candidate: Uuid) -> Conflict {
        Conflict::detected(candidate, self.counterpart, self.conflict_type)
    }
}

/// Evaluates a candidate timetable against the stored ones.
///
/// Rules run in precedence order (room, lecturer, cohort, borrowed course)
/// and each counterpart is reported once, under the first rule it violates.
/// Every lookup is limited to the candidate's semester and skips rejected
/// entries and the candidate itself.
pub struct ConflictDetector {
    timetables: Arc<dyn TimetableStore>,
    directory: Arc<dyn DirectoryStore>,
}

#[derive(Default)]
struct Detections {
    found: Vec<DetectedConflict>,
    seen: HashSet<Uuid>,
}

impl Detections {
    fn record(&mut self, peers: Vec<Timetable>, conflict_type: ConflictType) {
        for peer in peers {
            if self.seen.insert(peer.id) {
                self.found.push(DetectedConflict {
                    counterpart: peer.id,
                    conflict_type,
                });
            }
        }
    }
}

impl ConflictDetector {
    pub fn new(timetables: Arc<dyn TimetableStore>, directory: Arc<dyn DirectoryStore>) -> Self {
        Self {
            timetables,
            directory,
        }
    }

    pub async fn detect(&self, candidate: &Timetable) -> Result<Vec<DetectedConflict>, AppError> {
        let course = self
            .directory
            .find_course(candidate.course_id)
            .await?
            .ok_or_else(|| {
                AppError::Validation(format!("course {} does not exist", candidate.course_id))
            })?;

        let mut detections = Detections::default();

        let peers = self
            .overlapping(candidate, OverlapScope::Room(candidate.room_id))
            .await?;
        detections.record(peers, ConflictType::RoomConflict);

        if let Some(lecturer_id) = course.lecturer_id {
            let peers = self
                .overlapping(candidate, OverlapScope::Lecturer(lecturer_id))
                .await?;
            detections.record(peers, ConflictType::LecturerConflict);
        }

        let cohort = OverlapScope::Cohort {
            department_id: course.department_id,
            level: course.level,
        };
        let peers = self.overlapping(candidate, cohort).await?;
        detections.record(peers, ConflictType::TimeConflict);

        let peers = self.borrowed_course_peers(candidate, &course).await?;
        detections.record(peers, ConflictType::BorrowedCourseConflict);

        debug!(
            "detected {} conflict(s) for timetable {}",
            detections.found.len(),
            candidate.id
        );
        Ok(detections.found)
    }

    /// Both directions of a borrowing relation: departments that take the
    /// candidate's course must keep their own cohort at that level free, and
    /// courses the candidate's department takes must not clash with it.
    async fn borrowed_course_peers(
        &self,
        candidate: &Timetable,
        course: &Course,
    ) -> Result<Vec<Timetable>, AppError> {
        let mut peers = Vec::new();

        for department in self.directory.borrowing_departments(course.id).await? {
            let scope = OverlapScope::Cohort {
                department_id: department.id,
                level: course.level,
            };
            peers.extend(self.overlapping(candidate, scope).await?);
        }

        for borrowed in self.directory.borrowed_courses(course.department_id).await? {
            if borrowed.level != course.level {
                continue;
            }
            peers.extend(
                self.overlapping(candidate, OverlapScope::Course(borrowed.id))
                    .await?,
            );
        }

        Ok(peers)
    }

    async fn overlapping(
        &self,
        candidate: &Timetable,
        scope: OverlapScope,
    ) -> Result<Vec<Timetable>, AppError> {
        let query = OverlapQuery {
            scope,
            slot: candidate.slot(),
            semester: candidate.semester,
            exclude: Some(candidate.id),
        };
        self.timetables.find_overlapping(&query).await
    }
}
