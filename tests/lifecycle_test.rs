mod common;

use std::sync::Arc;

use chrono::{NaiveDate, Weekday};
use uuid::Uuid;

use common::{FailingNotifier, RecordingNotifier, campus, campus_with, hm, weekly};
use timetabler::error::AppError;
use timetabler::models::{
    ActivityType, ConflictStatus, ConflictType, Semester, TimetableRequest, TimetableStatus,
};
use timetabler::store::{ConflictScope, ConflictStore};

#[tokio::test]
async fn test_entry_without_peers_goes_to_pending_approval() {
    let c = campus().await;
    let course = c.course("CSC101", &c.csc, Some(c.lecturer.id), 100).await;

    let outcome = c
        .timetables
        .create(weekly(&course, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0)), &c.lecturer)
        .await
        .expect("Failed to create");

    assert_eq!(outcome.value.status, TimetableStatus::PendingApproval);
    assert!(outcome.notification_error.is_none());

    let stored = c.timetables.get(outcome.value.id).await.expect("Failed to get");
    assert_eq!(stored.status, TimetableStatus::PendingApproval);
}

#[tokio::test]
async fn test_room_overlap_yields_one_conflict_in_either_order() {
    for reversed in [false, true] {
        let c = campus().await;
        let c1 = c.course("CSC101", &c.csc, None, 100).await;
        let c2 = c.course("MTH201", &c.mth, None, 200).await;

        let mut requests = vec![
            weekly(&c1, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0)),
            weekly(&c2, &c.r101, Weekday::Mon, hm(9, 30), hm(10, 30)),
        ];
        if reversed {
            requests.reverse();
        }

        let first = c.timetables.create(requests.remove(0), &c.admin).await.unwrap().value;
        let second = c.timetables.create(requests.remove(0), &c.admin).await.unwrap().value;

        assert_eq!(first.status, TimetableStatus::PendingApproval);
        assert_eq!(second.status, TimetableStatus::Conflicted);

        let linked = c.store.conflicts_for_timetable(first.id).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].conflict_type, ConflictType::RoomConflict);
        // The later submission is recorded as the candidate.
        assert_eq!((linked[0].timetable_1, linked[0].timetable_2), (second.id, first.id));
    }
}

#[tokio::test]
async fn test_touching_entries_do_not_conflict() {
    let c = campus().await;
    let c1 = c.course("CSC101", &c.csc, None, 100).await;
    let c2 = c.course("MTH201", &c.mth, None, 200).await;

    let a = c
        .timetables
        .create(weekly(&c1, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0)), &c.admin)
        .await
        .unwrap()
        .value;
    let b = c
        .timetables
        .create(weekly(&c2, &c.r101, Weekday::Mon, hm(10, 0), hm(11, 0)), &c.admin)
        .await
        .unwrap()
        .value;

    assert_eq!(a.status, TimetableStatus::PendingApproval);
    assert_eq!(b.status, TimetableStatus::PendingApproval);
    assert!(c.conflicts.list_unresolved(ConflictScope::All).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_redetection_never_duplicates_a_pair() {
    let c = campus().await;
    let c1 = c.course("CSC101", &c.csc, None, 100).await;
    let c2 = c.course("MTH201", &c.mth, None, 200).await;

    let a = c
        .timetables
        .create(weekly(&c1, &c.r101, Weekday::Tue, hm(9, 0), hm(11, 0)), &c.admin)
        .await
        .unwrap()
        .value;
    let b = c
        .timetables
        .create(weekly(&c2, &c.r101, Weekday::Tue, hm(10, 0), hm(12, 0)), &c.admin)
        .await
        .unwrap()
        .value;

    c.timetables.revalidate(b.id, &c.admin).await.unwrap();
    c.timetables.revalidate(b.id, &c.admin).await.unwrap();
    let again = c.timetables.revalidate(a.id, &c.admin).await.unwrap();

    // `a` now sees the unresolved pair as well.
    assert_eq!(again.value.status, TimetableStatus::Conflicted);
    let all = c.conflicts.list_unresolved(ConflictScope::All).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_same_lecturer_and_cohort_store_single_record() {
    let c = campus().await;
    let c1 = c.course("CSC101", &c.csc, Some(c.lecturer.id), 100).await;
    let c2 = c.course("CSC103", &c.csc, Some(c.lecturer.id), 100).await;

    let a = c
        .timetables
        .create(weekly(&c1, &c.r101, Weekday::Wed, hm(9, 0), hm(10, 0)), &c.admin)
        .await
        .unwrap()
        .value;
    let b = c
        .timetables
        .create(weekly(&c2, &c.r102, Weekday::Wed, hm(9, 0), hm(10, 0)), &c.admin)
        .await
        .unwrap()
        .value;

    assert_eq!(b.status, TimetableStatus::Conflicted);
    let linked = c.store.conflicts_for_timetable(a.id).await.unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].conflict_type, ConflictType::LecturerConflict);
}

#[tokio::test]
async fn test_approval_requires_privileged_role() {
    let c = campus().await;
    let course = c.course("CSC101", &c.csc, None, 100).await;
    let tt = c
        .timetables
        .create(weekly(&course, &c.r101, Weekday::Thu, hm(9, 0), hm(10, 0)), &c.lecturer)
        .await
        .unwrap()
        .value;

    let err = c.timetables.approve(tt.id, &c.student).await.unwrap_err();
    assert!(matches!(err, AppError::Permission(_)));
    let err = c.timetables.approve(tt.id, &c.lecturer).await.unwrap_err();
    assert!(matches!(err, AppError::Permission(_)));

    let approved = c.timetables.approve(tt.id, &c.admin).await.unwrap().value;
    assert_eq!(approved.status, TimetableStatus::Approved);
    assert_eq!(approved.approved_by, Some(c.admin.id));
    assert!(approved.approved_at.is_some());

    let stored = c.timetables.get(tt.id).await.unwrap();
    assert_eq!(stored.status, TimetableStatus::Approved);
    assert_eq!(stored.approved_by, Some(c.admin.id));
}

#[tokio::test]
async fn test_exams_officer_can_approve() {
    let c = campus().await;
    let course = c.course("CSC101", &c.csc, None, 100).await;
    let tt = c
        .timetables
        .create(weekly(&course, &c.r101, Weekday::Fri, hm(9, 0), hm(10, 0)), &c.lecturer)
        .await
        .unwrap()
        .value;

    let approved = c.timetables.approve(tt.id, &c.officer).await.unwrap().value;
    assert_eq!(approved.status, TimetableStatus::Approved);
}

#[tokio::test]
async fn test_unresolved_conflicts_block_approval_until_resolved() {
    let c = campus().await;
    let c1 = c.course("CSC101", &c.csc, None, 100).await;
    let c2 = c.course("MTH201", &c.mth, None, 200).await;

    let a = c
        .timetables
        .create(weekly(&c1, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0)), &c.admin)
        .await
        .unwrap()
        .value;
    let b = c
        .timetables
        .create(weekly(&c2, &c.r101, Weekday::Mon, hm(9, 30), hm(10, 30)), &c.admin)
        .await
        .unwrap()
        .value;
    let conflict = c.store.conflicts_for_timetable(b.id).await.unwrap().remove(0);

    let err = c.timetables.approve(b.id, &c.admin).await.unwrap_err();
    assert!(matches!(err, AppError::UnresolvedConflict { count: 1 }));
    let err = c.timetables.approve(a.id, &c.admin).await.unwrap_err();
    assert!(matches!(err, AppError::UnresolvedConflict { count: 1 }));

    let appealed = c.conflicts.appeal(conflict.id, &c.lecturer).await.unwrap();
    assert_eq!(appealed.status, ConflictStatus::Appealed);
    let err = c.timetables.approve(b.id, &c.admin).await.unwrap_err();
    assert!(matches!(err, AppError::UnresolvedConflict { .. }));

    let resolved = c
        .conflicts
        .resolve(conflict.id, "shared slot agreed".to_string(), &c.admin)
        .await
        .unwrap();
    assert_eq!(resolved.status, ConflictStatus::Resolved);
    assert_eq!(resolved.resolved_by, Some(c.admin.id));
    assert!(resolved.resolved_at.is_some());

    // Resolution alone leaves the timetable CONFLICTED.
    assert_eq!(c.timetables.get(b.id).await.unwrap().status, TimetableStatus::Conflicted);

    let revalidated = c.timetables.revalidate(b.id, &c.admin).await.unwrap().value;
    assert_eq!(revalidated.status, TimetableStatus::PendingApproval);

    let approved = c.timetables.approve(b.id, &c.admin).await.unwrap().value;
    assert_eq!(approved.status, TimetableStatus::Approved);
    assert_eq!(c.store.conflicts_for_timetable(b.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_moving_away_leaves_stale_conflict_to_be_resolved() {
    let c = campus().await;
    let c1 = c.course("CSC101", &c.csc, None, 100).await;
    let c2 = c.course("MTH201", &c.mth, None, 200).await;

    c.timetables
        .create(weekly(&c1, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0)), &c.admin)
        .await
        .unwrap();
    let b = c
        .timetables
        .create(weekly(&c2, &c.r101, Weekday::Mon, hm(9, 30), hm(10, 30)), &c.admin)
        .await
        .unwrap()
        .value;

    let moved = c
        .timetables
        .update(b.id, weekly(&c2, &c.r102, Weekday::Mon, hm(9, 30), hm(10, 30)), &c.admin)
        .await
        .unwrap()
        .value;
    assert_eq!(moved.status, TimetableStatus::PendingApproval);
    assert_eq!(moved.room_id, c.r102.id);

    let err = c.timetables.approve(b.id, &c.admin).await.unwrap_err();
    assert!(matches!(err, AppError::UnresolvedConflict { count: 1 }));
}

#[tokio::test]
async fn test_delete_removes_only_linked_conflicts() {
    let c = campus().await;
    let c1 = c.course("CSC101", &c.csc, None, 100).await;
    let c2 = c.course("MTH201", &c.mth, None, 200).await;

    let a = c
        .timetables
        .create(weekly(&c1, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0)), &c.admin)
        .await
        .unwrap()
        .value;
    let b = c
        .timetables
        .create(weekly(&c2, &c.r101, Weekday::Mon, hm(9, 30), hm(10, 30)), &c.admin)
        .await
        .unwrap()
        .value;
    let x = c
        .timetables
        .create(weekly(&c1, &c.r102, Weekday::Fri, hm(14, 0), hm(15, 0)), &c.admin)
        .await
        .unwrap()
        .value;
    let y = c
        .timetables
        .create(weekly(&c2, &c.r102, Weekday::Fri, hm(14, 30), hm(15, 30)), &c.admin)
        .await
        .unwrap()
        .value;
    assert_eq!(y.status, TimetableStatus::Conflicted);

    c.timetables.delete(a.id).await.unwrap();

    assert!(matches!(c.timetables.get(a.id).await, Err(AppError::NotFound(_))));
    assert!(c.store.conflicts_for_timetable(b.id).await.unwrap().is_empty());
    assert_eq!(c.store.conflicts_for_timetable(x.id).await.unwrap().len(), 1);

    let err = c.timetables.delete(a.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_reject_then_update_reopens_entry() {
    let recorder = Arc::new(RecordingNotifier::default());
    let c = campus_with(recorder.clone()).await;
    let course = c.course("CSC101", &c.csc, Some(c.lecturer.id), 100).await;
    let tt = c
        .timetables
        .create(weekly(&course, &c.r101, Weekday::Tue, hm(13, 0), hm(15, 0)), &c.lecturer)
        .await
        .unwrap()
        .value;

    let rejected = c
        .timetables
        .reject(tt.id, "room reserved for convocation".to_string(), &c.admin)
        .await
        .unwrap()
        .value;
    assert_eq!(rejected.status, TimetableStatus::Rejected);
    assert_eq!(rejected.description.as_deref(), Some("room reserved for convocation"));

    let reopened = c
        .timetables
        .update(tt.id, weekly(&course, &c.r102, Weekday::Tue, hm(13, 0), hm(15, 0)), &c.lecturer)
        .await
        .unwrap()
        .value;
    assert_eq!(reopened.status, TimetableStatus::PendingApproval);

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(events, vec!["timetable_rejected".to_string()]);
}

#[tokio::test]
async fn test_rejected_entries_do_not_block_new_ones() {
    let c = campus().await;
    let c1 = c.course("CSC101", &c.csc, None, 100).await;
    let c2 = c.course("MTH201", &c.mth, None, 200).await;

    let a = c
        .timetables
        .create(weekly(&c1, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0)), &c.admin)
        .await
        .unwrap()
        .value;
    c.timetables.reject(a.id, "duplicate".to_string(), &c.admin).await.unwrap();

    let b = c
        .timetables
        .create(weekly(&c2, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0)), &c.admin)
        .await
        .unwrap()
        .value;
    assert_eq!(b.status, TimetableStatus::PendingApproval);
}

#[tokio::test]
async fn test_conflict_notification_carries_new_conflicts() {
    let recorder = Arc::new(RecordingNotifier::default());
    let c = campus_with(recorder.clone()).await;
    let c1 = c.course("CSC101", &c.csc, None, 100).await;
    let c2 = c.course("MTH201", &c.mth, None, 200).await;

    c.timetables
        .create(weekly(&c1, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0)), &c.admin)
        .await
        .unwrap();
    let b = c
        .timetables
        .create(weekly(&c2, &c.r101, Weekday::Mon, hm(9, 30), hm(10, 30)), &c.admin)
        .await
        .unwrap()
        .value;
    c.timetables.revalidate(b.id, &c.admin).await.unwrap();

    // The second check finds nothing new and stays silent.
    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(events, vec!["conflicts_detected".to_string()]);
}

#[tokio::test]
async fn test_notification_failure_does_not_undo_approval() {
    let c = campus_with(Arc::new(FailingNotifier)).await;
    let course = c.course("CSC101", &c.csc, None, 100).await;
    let tt = c
        .timetables
        .create(weekly(&course, &c.r101, Weekday::Wed, hm(9, 0), hm(10, 0)), &c.lecturer)
        .await
        .unwrap()
        .value;

    let outcome = c.timetables.approve(tt.id, &c.admin).await.unwrap();
    assert!(outcome.notification_error.is_some());
    assert_eq!(outcome.value.status, TimetableStatus::Approved);
    assert_eq!(c.timetables.get(tt.id).await.unwrap().status, TimetableStatus::Approved);
}

#[tokio::test]
async fn test_malformed_requests_are_rejected_before_any_write() {
    let c = campus().await;
    let course = c.course("CSC101", &c.csc, None, 100).await;

    let inverted = weekly(&course, &c.r101, Weekday::Mon, hm(11, 0), hm(10, 0));
    let err = c.timetables.create(inverted, &c.admin).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let mut both = weekly(&course, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0));
    both.specific_date = NaiveDate::from_ymd_opt(2025, 11, 3);
    let err = c.timetables.create(both, &c.admin).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let mut neither = weekly(&course, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0));
    neither.day_of_week = None;
    let err = c.timetables.create(neither, &c.admin).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let mut ghost_room = weekly(&course, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0));
    ghost_room.room_id = Uuid::new_v4();
    let err = c.timetables.create(ghost_room, &c.admin).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert!(c.timetables.timetables_for(&c.admin).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_records_report_not_found() {
    let c = campus().await;
    let course = c.course("CSC101", &c.csc, None, 100).await;
    let missing = Uuid::new_v4();

    assert!(matches!(
        c.timetables.approve(missing, &c.admin).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        c.timetables.reject(missing, "n/a".to_string(), &c.admin).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        c.timetables
            .update(missing, weekly(&course, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0)), &c.admin)
            .await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        c.conflicts.resolve(missing, "n/a".to_string(), &c.admin).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        c.conflicts.appeal(missing, &c.admin).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_appeal_only_from_detected() {
    let c = campus().await;
    let c1 = c.course("CSC101", &c.csc, None, 100).await;
    let c2 = c.course("MTH201", &c.mth, None, 200).await;

    c.timetables
        .create(weekly(&c1, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0)), &c.admin)
        .await
        .unwrap();
    let b = c
        .timetables
        .create(weekly(&c2, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0)), &c.admin)
        .await
        .unwrap()
        .value;
    let conflict = c.store.conflicts_for_timetable(b.id).await.unwrap().remove(0);

    c.conflicts.appeal(conflict.id, &c.lecturer).await.unwrap();
    let err = c.conflicts.appeal(conflict.id, &c.lecturer).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    c.conflicts
        .resolve(conflict.id, "rescheduled".to_string(), &c.admin)
        .await
        .unwrap();
    let err = c.conflicts.appeal(conflict.id, &c.lecturer).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_conflict_queries_by_scope_type_and_stats() {
    let c = campus().await;
    let c1 = c.course("CSC101", &c.csc, Some(c.lecturer.id), 100).await;
    let c2 = c.course("MTH201", &c.mth, None, 200).await;

    let a = c
        .timetables
        .create(weekly(&c1, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0)), &c.admin)
        .await
        .unwrap()
        .value;
    c.timetables
        .create(weekly(&c2, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0)), &c.admin)
        .await
        .unwrap();

    assert_eq!(c.conflicts.list_unresolved(ConflictScope::Timetable(a.id)).await.unwrap().len(), 1);
    assert_eq!(c.conflicts.list_unresolved(ConflictScope::Department(c.mth.id)).await.unwrap().len(), 1);
    assert_eq!(c.conflicts.list_unresolved(ConflictScope::Lecturer(c.lecturer.id)).await.unwrap().len(), 1);
    assert!(c.conflicts.list_unresolved(ConflictScope::Lecturer(c.admin.id)).await.unwrap().is_empty());

    assert_eq!(c.conflicts.list_by_type(ConflictType::RoomConflict).await.unwrap().len(), 1);
    assert!(c.conflicts.list_by_type(ConflictType::TimeConflict).await.unwrap().is_empty());
    assert_eq!(c.conflicts.list_by_status(ConflictStatus::Detected).await.unwrap().len(), 1);

    let stats = c.conflicts.statistics().await.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].conflict_type, ConflictType::RoomConflict);
    assert_eq!(stats[0].status, ConflictStatus::Detected);
    assert_eq!(stats[0].count, 1);
}

#[tokio::test]
async fn test_concurrent_overlapping_submissions_are_both_checked() {
    let c = campus().await;
    let c1 = c.course("CSC101", &c.csc, None, 100).await;
    let c2 = c.course("MTH201", &c.mth, None, 200).await;

    let first = c.timetables.clone();
    let second = c.timetables.clone();
    let admin_a = c.admin.clone();
    let admin_b = c.admin.clone();
    let req_a = weekly(&c1, &c.r101, Weekday::Thu, hm(9, 0), hm(10, 0));
    let req_b = weekly(&c2, &c.r101, Weekday::Thu, hm(9, 15), hm(10, 15));

    let (a, b) = tokio::join!(
        tokio::spawn(async move { first.create(req_a, &admin_a).await }),
        tokio::spawn(async move { second.create(req_b, &admin_b).await }),
    );
    let a = a.unwrap().unwrap().value;
    let b = b.unwrap().unwrap().value;

    let statuses = [a.status, b.status];
    assert!(statuses.contains(&TimetableStatus::Conflicted));
    assert!(statuses.contains(&TimetableStatus::PendingApproval));
    assert_eq!(c.conflicts.list_unresolved(ConflictScope::All).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_visibility_per_role() {
    let c = campus().await;
    let mine = c.course("CSC101", &c.csc, Some(c.lecturer.id), 100).await;
    let other_level = c.course("CSC201", &c.csc, None, 200).await;
    let other_department = c.course("MTH101", &c.mth, None, 100).await;

    let approved = c
        .timetables
        .create(weekly(&mine, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0)), &c.lecturer)
        .await
        .unwrap()
        .value;
    c.timetables.approve(approved.id, &c.admin).await.unwrap();
    c.timetables
        .create(weekly(&mine, &c.r101, Weekday::Tue, hm(9, 0), hm(10, 0)), &c.lecturer)
        .await
        .unwrap();
    let senior = c
        .timetables
        .create(weekly(&other_level, &c.r102, Weekday::Mon, hm(9, 0), hm(10, 0)), &c.admin)
        .await
        .unwrap()
        .value;
    c.timetables.approve(senior.id, &c.admin).await.unwrap();
    let maths = c
        .timetables
        .create(weekly(&other_department, &c.r102, Weekday::Wed, hm(9, 0), hm(10, 0)), &c.admin)
        .await
        .unwrap()
        .value;
    c.timetables.approve(maths.id, &c.admin).await.unwrap();

    let student_view = c
        .timetables
        .timetables_for_semester(&c.student, Semester::First)
        .await
        .unwrap();
    assert_eq!(student_view.len(), 1);
    assert_eq!(student_view[0].id, approved.id);

    let lecturer_view = c
        .timetables
        .timetables_for_semester(&c.lecturer, Semester::First)
        .await
        .unwrap();
    assert_eq!(lecturer_view.len(), 2);
    assert!(lecturer_view.iter().all(|t| t.course_id == mine.id));

    assert!(c
        .timetables
        .timetables_for_semester(&c.student, Semester::Second)
        .await
        .unwrap()
        .is_empty());

    let admin_view = c.timetables.timetables_for(&c.admin).await.unwrap();
    assert_eq!(admin_view.len(), 4);

    let pending = c.timetables.pending_approvals().await.unwrap();
    assert_eq!(pending.len(), 1);

    let csc = c.timetables.department_timetables(c.csc.id).await.unwrap();
    assert_eq!(csc.len(), 3);
    assert!(matches!(
        c.timetables.department_timetables(Uuid::new_v4()).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_single_date_exams_use_interval_overlap() {
    let c = campus().await;
    let c1 = c.course("CSC101", &c.csc, None, 100).await;
    let c2 = c.course("MTH201", &c.mth, None, 200).await;
    let exam_day = NaiveDate::from_ymd_opt(2025, 12, 8).unwrap();

    let exam = |course_id, start, end| TimetableRequest {
        course_id,
        activity_type: ActivityType::Exam,
        room_id: c.r101.id,
        day_of_week: None,
        specific_date: Some(exam_day),
        start_time: start,
        end_time: end,
        semester: Semester::First,
        description: None,
    };

    let first = c.timetables.create(exam(c1.id, hm(9, 0), hm(12, 0)), &c.admin).await.unwrap().value;
    // Different start time, still overlapping.
    let second = c.timetables.create(exam(c2.id, hm(11, 0), hm(13, 0)), &c.admin).await.unwrap().value;
    assert_eq!(second.status, TimetableStatus::Conflicted);

    // A Monday lecture in the same room never collides with a dated exam.
    let lecture = c
        .timetables
        .create(weekly(&c2, &c.r101, Weekday::Mon, hm(9, 0), hm(12, 0)), &c.admin)
        .await
        .unwrap()
        .value;
    assert_eq!(lecture.status, TimetableStatus::PendingApproval);

    c.conflicts
        .resolve(
            c.store.conflicts_for_timetable(first.id).await.unwrap()[0].id,
            "split across halls".to_string(),
            &c.admin,
        )
        .await
        .unwrap();
    c.timetables.approve(first.id, &c.admin).await.unwrap();

    let from = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
    let to = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
    let exams = c.timetables.exams_between(c.csc.id, from, to).await.unwrap();
    assert_eq!(exams.len(), 1);
    assert_eq!(exams[0].id, first.id);

    let err = c.timetables.exams_between(c.csc.id, to, from).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_rejected_entry_cannot_be_approved_over_a_new_booking() {
    let c = campus().await;
    let c1 = c.course("CSC101", &c.csc, None, 100).await;
    let c2 = c.course("MTH201", &c.mth, None, 200).await;

    let a = c
        .timetables
        .create(weekly(&c1, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0)), &c.admin)
        .await
        .unwrap()
        .value;
    c.timetables.reject(a.id, "clashes with open day".to_string(), &c.admin).await.unwrap();

    // The slot is free while `a` is rejected.
    let b = c
        .timetables
        .create(weekly(&c2, &c.r101, Weekday::Mon, hm(9, 0), hm(10, 0)), &c.admin)
        .await
        .unwrap()
        .value;
    assert_eq!(b.status, TimetableStatus::PendingApproval);
    c.timetables.approve(b.id, &c.admin).await.unwrap();

    let err = c.timetables.approve(a.id, &c.admin).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(c.timetables.get(a.id).await.unwrap().status, TimetableStatus::Rejected);

    // Reopening runs detection again and finds the approved booking.
    let reopened = c.timetables.revalidate(a.id, &c.admin).await.unwrap().value;
    assert_eq!(reopened.status, TimetableStatus::Conflicted);
    let err = c.timetables.approve(a.id, &c.admin).await.unwrap_err();
    assert!(matches!(err, AppError::UnresolvedConflict { count: 1 }));
}

#[tokio::test]
async fn test_terminal_states_are_not_rewritten() {
    let c = campus().await;
    let course = c.course("CSC101", &c.csc, None, 100).await;
    let tt = c
        .timetables
        .create(weekly(&course, &c.r101, Weekday::Tue, hm(9, 0), hm(10, 0)), &c.lecturer)
        .await
        .unwrap()
        .value;

    c.timetables.approve(tt.id, &c.admin).await.unwrap();
    let err = c.timetables.approve(tt.id, &c.admin).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    let err = c
        .timetables
        .reject(tt.id, "too late".to_string(), &c.admin)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let stored = c.timetables.get(tt.id).await.unwrap();
    assert_eq!(stored.status, TimetableStatus::Approved);
    assert_eq!(stored.approved_by, Some(c.admin.id));
}
