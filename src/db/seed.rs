use tracing::info;
use uuid::Uuid;

use crate::db::SqliteStore;
use crate::error::AppError;
use crate::models::{Course, Department, Room, User, UserRole};
use crate::store::DirectoryStore;

/// Directory records written by [`seed_demo_data`].
#[derive(Debug, Clone)]
pub struct Seeded {
    pub departments: Vec<Department>,
    pub rooms: Vec<Room>,
    pub users: Vec<User>,
    pub courses: Vec<Course>,
}

impl Seeded {
    pub fn user(&self, username: &str) -> Option<&User> {
        self.users.iter().find(|u| u.username == username)
    }
}

/// Populates an empty directory with a starter campus: two departments, four
/// rooms, one user per role and two courses. Returns `None` without writing
/// anything when departments already exist.
pub async fn seed_demo_data(store: &SqliteStore) -> Result<Option<Seeded>, AppError> {
    if !store.list_departments().await?.is_empty() {
        info!("directory already populated, skipping seed");
        return Ok(None);
    }

    let rooms = vec![
        room("CSC LT", 1000),
        room("ICT I", 150),
        room("CSC Lab 1", 30),
        room("Defense Lab 2", 30),
    ];
    for r in &rooms {
        store.insert_room(r).await?;
    }

    let csc = department("Computer Science", "CSC");
    let eee = department("Electrical Engineering", "EEE");
    store.insert_department(&csc).await?;
    store.insert_department(&eee).await?;

    let admin = user("admin", UserRole::Admin, None, None);
    let officer = user("eo_csc", UserRole::ExamsOfficer, Some(csc.id), None);
    let lecturer = user("jdoe", UserRole::Lecturer, Some(csc.id), None);
    let student = user("asmith", UserRole::Student, Some(csc.id), Some(100));
    let lecturer_id = lecturer.id;
    let users = vec![admin, officer, lecturer, student];
    for u in &users {
        store.insert_user(u).await?;
        info!("seeded {:?} user {} with id {}", u.role, u.username, u.id);
    }

    let courses = vec![
        course("CSC101", "Introduction to Programming", &csc, lecturer_id, 100),
        course("CSC201", "Data Structures", &csc, lecturer_id, 200),
    ];
    for c in &courses {
        store.insert_course(c).await?;
    }

    info!(
        "seeded {} rooms, 2 departments, {} users, {} courses",
        rooms.len(),
        users.len(),
        courses.len()
    );
    Ok(Some(Seeded {
        departments: vec![csc, eee],
        rooms,
        users,
        courses,
    }))
}

fn room(name: &str, capacity: i32) -> Room {
    Room {
        id: Uuid::new_v4(),
        name: name.to_string(),
        capacity,
    }
}

fn department(name: &str, code: &str) -> Department {
    Department {
        id: Uuid::new_v4(),
        name: name.to_string(),
        code: code.to_string(),
    }
}

fn user(username: &str, role: UserRole, department_id: Option<Uuid>, level: Option<i32>) -> User {
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: format!("{}@timeflow.edu", username.replace('_', ".")),
        role,
        department_id,
        level,
    }
}

fn course(code: &str, name: &str, department: &Department, lecturer_id: Uuid, level: i32) -> Course {
    Course {
        id: Uuid::new_v4(),
        code: code.to_string(),
        name: name.to_string(),
        department_id: department.id,
        lecturer_id: Some(lecturer_id),
        level,
    }
}
