#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveTime, Weekday};
use uuid::Uuid;

use timetabler::db::{SqliteStore, connect_in_memory};
use timetabler::models::{
    ActivityType, Course, Department, Room, Semester, TimetableRequest, User, UserRole,
};
use timetabler::notify::{Event, NotificationError, Notifier};
use timetabler::services::{ConflictService, TimetableService, WriteGate};

/// Remembers the name of every event it is handed.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &Event) -> Result<(), NotificationError> {
        self.events.lock().unwrap().push(event.name().to_string());
        Ok(())
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _event: &Event) -> Result<(), NotificationError> {
        Err(NotificationError::Rejected {
            status: 503,
            body: "mail relay unavailable".to_string(),
        })
    }
}

pub struct Campus {
    pub store: SqliteStore,
    pub timetables: Arc<TimetableService>,
    pub conflicts: ConflictService,
    pub csc: Department,
    pub mth: Department,
    pub r101: Room,
    pub r102: Room,
    pub admin: User,
    pub officer: User,
    pub lecturer: User,
    pub student: User,
}

pub async fn campus() -> Campus {
    campus_with(Arc::new(RecordingNotifier::default())).await
}

pub async fn campus_with(notifier: Arc<dyn Notifier>) -> Campus {
    let pool = connect_in_memory().await.expect("Failed to create test db");
    let store = SqliteStore::new(pool);
    let shared = Arc::new(store.clone());
    let gate = WriteGate::new();

    let timetables = TimetableService::new(
        shared.clone(),
        shared.clone(),
        shared.clone(),
        notifier,
        gate.clone(),
    );
    let conflicts = ConflictService::new(shared, gate);

    let csc = Department {
        id: Uuid::new_v4(),
        name: "Computer Science".to_string(),
        code: "CSC".to_string(),
    };
    let mth = Department {
        id: Uuid::new_v4(),
        name: "Mathematics".to_string(),
        code: "MTH".to_string(),
    };
    store.insert_department(&csc).await.expect("Failed to insert department");
    store.insert_department(&mth).await.expect("Failed to insert department");

    let admin = user("admin", UserRole::Admin, None, None);
    let officer = user("exams", UserRole::ExamsOfficer, None, None);
    let lecturer = user("bello", UserRole::Lecturer, Some(csc.id), None);
    let student = user("chidi", UserRole::Student, Some(csc.id), Some(100));
    for u in [&admin, &officer, &lecturer, &student] {
        store.insert_user(u).await.expect("Failed to insert user");
    }

    let r101 = Room {
        id: Uuid::new_v4(),
        name: "R101".to_string(),
        capacity: 100,
    };
    let r102 = Room {
        id: Uuid::new_v4(),
        name: "R102".to_string(),
        capacity: 60,
    };
    store.insert_room(&r101).await.expect("Failed to insert room");
    store.insert_room(&r102).await.expect("Failed to insert room");

    Campus {
        store,
        timetables: Arc::new(timetables),
        conflicts,
        csc,
        mth,
        r101,
        r102,
        admin,
        officer,
        lecturer,
        student,
    }
}

fn user(name: &str, role: UserRole, department_id: Option<Uuid>, level: Option<i32>) -> User {
    User {
        id: Uuid::new_v4(),
        username: name.to_string(),
        email: format!("{}@example.edu", name),
        role,
        department_id,
        level,
    }
}

impl Campus {
    pub async fn course(
        &self,
        code: &str,
        department: &Department,
        lecturer: Option<Uuid>,
        level: i32,
    ) -> Course {
        let course = Course {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: format!("{} course", code),
            department_id: department.id,
            lecturer_id: lecturer,
            level,
        };
        self.store.insert_course(&course).await.expect("Failed to insert course");
        course
    }
}

pub fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// A first-semester lecture on `day`.
pub fn weekly(course: &Course, room: &Room, day: Weekday, start: NaiveTime, end: NaiveTime) -> TimetableRequest {
    TimetableRequest {
        course_id: course.id,
        activity_type: ActivityType::Lecture,
        room_id: room.id,
        day_of_week: Some(day),
        specific_date: None,
        start_time: start,
        end_time: end,
        semester: Semester::First,
        description: None,
    }
}
