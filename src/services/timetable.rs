use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    Conflict, Semester, Timetable, TimetableRequest, TimetableStatus, User, UserRole,
};
use crate::notify::{Event, Notifier};
use crate::services::detection::ConflictDetector;
use crate::services::{Outcome, WriteGate, dispatch};
use crate::store::{ConflictStore, DirectoryStore, TimetableFilter, TimetableStore};

/// Drives a timetable entry from submission to approval or rejection.
pub struct TimetableService {
    timetables: Arc<dyn TimetableStore>,
    conflicts: Arc<dyn ConflictStore>,
    directory: Arc<dyn DirectoryStore>,
    detector: ConflictDetector,
    notifier: Arc<dyn Notifier>,
    gate: WriteGate,
}

impl TimetableService {
    pub fn new(
        timetables: Arc<dyn TimetableStore>,
        conflicts: Arc<dyn ConflictStore>,
        directory: Arc<dyn DirectoryStore>,
        notifier: Arc<dyn Notifier>,
        gate: WriteGate,
    ) -> Self {
        let detector = ConflictDetector::new(timetables.clone(), directory.clone());
        Self {
            timetables,
            conflicts,
            directory,
            detector,
            notifier,
            gate,
        }
    }

    pub async fn create(
        &self,
        req: TimetableRequest,
        actor: &User,
    ) -> Result<Outcome<Timetable>, AppError> {
        let mut timetable = Timetable::draft(req)?;
        self.check_references(&timetable).await?;

        let inserted = {
            let _guard = self.gate.lock().await;
            let detected = self.detector.detect(&timetable).await?;
            let conflicts: Vec<Conflict> = detected
                .into_iter()
                .map(|d| d.to_conflict(timetable.id))
                .collect();

            timetable.status = if conflicts.is_empty() {
                TimetableStatus::PendingApproval
            } else {
                TimetableStatus::Conflicted
            };
            self.timetables.commit(&timetable, &conflicts).await?
        };

        if inserted.is_empty() {
            info!("timetable {} created by {}", timetable.id, actor.username);
            return Ok(Outcome::quiet(timetable));
        }

        warn!(
            "timetable {} created by {} with {} conflict(s)",
            timetable.id,
            actor.username,
            inserted.len()
        );
        let notification_error = dispatch(
            &self.notifier,
            Event::ConflictsDetected {
                conflicts: inserted,
            },
        )
        .await;
        Ok(Outcome {
            value: timetable,
            notification_error,
        })
    }

    pub async fn update(
        &self,
        id: Uuid,
        req: TimetableRequest,
        actor: &User,
    ) -> Result<Outcome<Timetable>, AppError> {
        self.recheck(id, Some(req), actor).await
    }

    /// Re-runs detection on the stored attributes, e.g. after its conflicts
    /// were resolved.
    pub async fn revalidate(&self, id: Uuid, actor: &User) -> Result<Outcome<Timetable>, AppError> {
        self.recheck(id, None, actor).await
    }

    async fn recheck(
        &self,
        id: Uuid,
        req: Option<TimetableRequest>,
        actor: &User,
    ) -> Result<Outcome<Timetable>, AppError> {
        let (timetable, inserted) = {
            let _guard = self.gate.lock().await;
            let mut timetable = self.require(id).await?;
            let previous = timetable.status;
            if let Some(req) = req {
                timetable.apply(req)?;
                self.check_references(&timetable).await?;
            }

            let mut fresh = Vec::new();
            let mut outstanding = 0;
            for detected in self.detector.detect(&timetable).await? {
                match self.conflicts.find_between(id, detected.counterpart).await? {
                    None => fresh.push(detected.to_conflict(id)),
                    Some(existing) if existing.status.is_unresolved() => outstanding += 1,
                    // A resolved record for this pair stays accepted.
                    Some(_) => {}
                }
            }

            if !fresh.is_empty() || outstanding > 0 {
                timetable.status = TimetableStatus::Conflicted;
                timetable.approved_by = None;
                timetable.approved_at = None;
            } else if matches!(
                previous,
                TimetableStatus::Draft | TimetableStatus::Conflicted | TimetableStatus::Rejected
            ) {
                timetable.status = TimetableStatus::PendingApproval;
            }

            let inserted = self.timetables.commit(&timetable, &fresh).await?;
            info!(
                "timetable {} rechecked by {}: {:?} -> {:?} ({} new, {} outstanding conflict(s))",
                id,
                actor.username,
                previous,
                timetable.status,
                inserted.len(),
                outstanding
            );
            (timetable, inserted)
        };

        if inserted.is_empty() {
            return Ok(Outcome::quiet(timetable));
        }
        let notification_error = dispatch(
            &self.notifier,
            Event::ConflictsDetected {
                conflicts: inserted,
            },
        )
        .await;
        Ok(Outcome {
            value: timetable,
            notification_error,
        })
    }

    pub async fn approve(&self, id: Uuid, actor: &User) -> Result<Outcome<Timetable>, AppError> {
        let timetable = {
            let _guard = self.gate.lock().await;
            let mut timetable = self.require(id).await?;

            if !actor.can_approve() {
                return Err(AppError::Permission(format!(
                    "{} ({:?}) cannot approve timetables",
                    actor.username, actor.role
                )));
            }

            let unresolved = self
                .conflicts
                .conflicts_for_timetable(id)
                .await?
                .iter()
                .filter(|c| c.status.is_unresolved())
                .count();
            if unresolved > 0 {
                warn!(
                    "approval of timetable {} blocked by {} unresolved conflict(s)",
                    id, unresolved
                );
                return Err(AppError::UnresolvedConflict { count: unresolved });
            }

            // Rejected and draft entries go back through `update` first.
            if timetable.status != TimetableStatus::PendingApproval {
                return Err(AppError::InvalidState(format!(
                    "timetable {} is {:?}; only PENDING_APPROVAL entries can be approved",
                    id, timetable.status
                )));
            }

            timetable.status = TimetableStatus::Approved;
            timetable.approved_by = Some(actor.id);
            timetable.approved_at = Some(Utc::now());
            self.timetables.commit(&timetable, &[]).await?;
            timetable
        };
        info!("timetable {} approved by {}", id, actor.username);

        let notification_error = dispatch(
            &self.notifier,
            Event::TimetableApproved {
                timetable: timetable.clone(),
            },
        )
        .await;
        Ok(Outcome {
            value: timetable,
            notification_error,
        })
    }

    pub async fn reject(
        &self,
        id: Uuid,
        reason: String,
        actor: &User,
    ) -> Result<Outcome<Timetable>, AppError> {
        let timetable = {
            let _guard = self.gate.lock().await;
            let mut timetable = self.require(id).await?;
            if matches!(
                timetable.status,
                TimetableStatus::Approved | TimetableStatus::Rejected
            ) {
                return Err(AppError::InvalidState(format!(
                    "timetable {} is already {:?}",
                    id, timetable.status
                )));
            }
            timetable.status = TimetableStatus::Rejected;
            timetable.description = Some(reason.clone());
            timetable.approved_by = None;
            timetable.approved_at = None;
            self.timetables.commit(&timetable, &[]).await?;
            timetable
        };
        info!("timetable {} rejected by {}: {}", id, actor.username, reason);

        let notification_error = dispatch(
            &self.notifier,
            Event::TimetableRejected {
                timetable: timetable.clone(),
                reason,
            },
        )
        .await;
        Ok(Outcome {
            value: timetable,
            notification_error,
        })
    }

    /// Removes the timetable together with every conflict that references it.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let _guard = self.gate.lock().await;
        if !self.timetables.delete_timetable(id).await? {
            return Err(AppError::NotFound(format!("timetable {}", id)));
        }
        info!("timetable {} deleted with its conflicts", id);
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Timetable, AppError> {
        self.require(id).await
    }

    /// What `actor` should see for the semester running today.
    pub async fn timetables_for(&self, actor: &User) -> Result<Vec<Timetable>, AppError> {
        let semester = Semester::containing(Local::now().date_naive());
        self.timetables_for_semester(actor, semester).await
    }

    pub async fn timetables_for_semester(
        &self,
        actor: &User,
        semester: Semester,
    ) -> Result<Vec<Timetable>, AppError> {
        let filter = match actor.role {
            UserRole::Admin | UserRole::ExamsOfficer => TimetableFilter::default(),
            UserRole::Lecturer => TimetableFilter {
                semester: Some(semester),
                lecturer_id: Some(actor.id),
                ..TimetableFilter::default()
            },
            UserRole::Student => {
                let (Some(department_id), Some(level)) = (actor.department_id, actor.level) else {
                    warn!("student {} has no department or level on record", actor.username);
                    return Ok(Vec::new());
                };
                TimetableFilter {
                    status: Some(TimetableStatus::Approved),
                    semester: Some(semester),
                    department_id: Some(department_id),
                    level: Some(level),
                    ..TimetableFilter::default()
                }
            }
        };
        self.timetables.list_timetables(&filter).await
    }

    pub async fn pending_approvals(&self) -> Result<Vec<Timetable>, AppError> {
        let filter = TimetableFilter {
            status: Some(TimetableStatus::PendingApproval),
            ..TimetableFilter::default()
        };
        self.timetables.list_timetables(&filter).await
    }

    pub async fn department_timetables(&self, department_id: Uuid) -> Result<Vec<Timetable>, AppError> {
        if self.directory.find_department(department_id).await?.is_none() {
            return Err(AppError::NotFound(format!("department {}", department_id)));
        }
        let filter = TimetableFilter {
            department_id: Some(department_id),
            ..TimetableFilter::default()
        };
        self.timetables.list_timetables(&filter).await
    }

    /// Approved exams and tests of a department within `[from, to]`.
    pub async fn exams_between(
        &self,
        department_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Timetable>, AppError> {
        if from > to {
            return Err(AppError::Validation(format!(
                "date range {} to {} is inverted",
                from, to
            )));
        }
        self.timetables.exams_between(department_id, from, to).await
    }

    async fn require(&self, id: Uuid) -> Result<Timetable, AppError> {
        self.timetables
            .find_timetable(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("timetable {}", id)))
    }

    async fn check_references(&self, timetable: &Timetable) -> Result<(), AppError> {
        if self.directory.find_course(timetable.course_id).await?.is_none() {
            return Err(AppError::Validation(format!(
                "course {} does not exist",
                timetable.course_id
            )));
        }
        if self.directory.find_room(timetable.room_id).await?.is_none() {
            return Err(AppError::Validation(format!(
                "room {} does not exist",
                timetable.room_id
            )));
        }
        Ok(())
    }
}
