use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    ActivityType, BorrowedCourse, Conflict, ConflictStat, Course, Department, Room, Schedule,
    Semester, Timetable, TimetableStatus, User,
};
use crate::store::{
    ConflictFilter, ConflictScope, ConflictStore, DirectoryStore, OverlapQuery, OverlapScope,
    TimetableFilter, TimetableStore,
};

const TIMETABLE_COLUMNS: &str = "t.id, t.course_id, t.activity_type, t.room_id, t.day_of_week, \
     t.specific_date, t.start_time, t.end_time, t.semester, t.status, t.created_at, \
     t.approved_by, t.approved_at, t.description";

const CONFLICT_COLUMNS: &str = "k.id, k.timetable_1, k.timetable_2, k.conflict_type, k.status, \
     k.detected_at, k.resolution_notes, k.resolved_by, k.resolved_at";

/// SQLite-backed directory, timetable and conflict store.
#[derive(Clone)]
pub struct SqliteStore {
    db: SqlitePool,
}

#[derive(Debug, FromRow)]
struct TimetableRow {
    id: Uuid,
    course_id: Uuid,
    activity_type: ActivityType,
    room_id: Uuid,
    day_of_week: Option<i64>,
    specific_date: Option<NaiveDate>,
    start_time: NaiveTime,
    end_time: NaiveTime,
    semester: Semester,
    status: TimetableStatus,
    created_at: DateTime<Utc>,
    approved_by: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
    description: Option<String>,
}

impl TryFrom<TimetableRow> for Timetable {
    type Error = AppError;

    fn try_from(row: TimetableRow) -> Result<Self, Self::Error> {
        let day = row.day_of_week.map(weekday_from_index).transpose()?;
        let schedule = Schedule::from_parts(day, row.specific_date).map_err(|e| {
            sqlx::Error::Decode(format!("timetable {} has a corrupt schedule: {}", row.id, e).into())
        })?;

        Ok(Timetable {
            id: row.id,
            course_id: row.course_id,
            activity_type: row.activity_type,
            room_id: row.room_id,
            schedule,
            start_time: row.start_time,
            end_time: row.end_time,
            semester: row.semester,
            status: row.status,
            created_at: row.created_at,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            description: row.description,
        })
    }
}

fn weekday_index(day: Weekday) -> i64 {
    i64::from(day.num_days_from_monday())
}

fn weekday_from_index(index: i64) -> Result<Weekday, AppError> {
    let day = match index {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        6 => Weekday::Sun,
        other => {
            return Err(sqlx::Error::Decode(format!("invalid day_of_week {}", other).into()).into());
        }
    };
    Ok(day)
}

fn into_timetables(rows: Vec<TimetableRow>) -> Result<Vec<Timetable>, AppError> {
    rows.into_iter().map(Timetable::try_from).collect()
}

impl SqliteStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn insert_department(&self, department: &Department) -> Result<(), AppError> {
        sqlx::query("INSERT INTO departments (id, name, code) VALUES (?, ?, ?)")
            .bind(department.id)
            .bind(&department.name)
            .bind(&department.code)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO users (id, username, email, role, department_id, level) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.role)
        .bind(user.department_id)
        .bind(user.level)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn insert_course(&self, course: &Course) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO courses (id, code, name, department_id, lecturer_id, level) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(course.id)
        .bind(&course.code)
        .bind(&course.name)
        .bind(course.department_id)
        .bind(course.lecturer_id)
        .bind(course.level)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn insert_room(&self, room: &Room) -> Result<(), AppError> {
        sqlx::query("INSERT INTO rooms (id, name, capacity) VALUES (?, ?, ?)")
            .bind(room.id)
            .bind(&room.name)
            .bind(room.capacity)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn add_borrowed_course(&self, borrowed: &BorrowedCourse) -> Result<(), AppError> {
        sqlx::query(
            "INSERT OR IGNORE INTO borrowed_courses (department_id, course_id) VALUES (?, ?)",
        )
        .bind(borrowed.department_id)
        .bind(borrowed.course_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for SqliteStore {
    async fn find_department(&self, id: Uuid) -> Result<Option<Department>, AppError> {
        let department = sqlx::query_as::<_, Department>(
            "SELECT id, name, code FROM departments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(department)
    }

    async fn list_departments(&self) -> Result<Vec<Department>, AppError> {
        let departments = sqlx::query_as::<_, Department>(
            "SELECT id, name, code FROM departments ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(departments)
    }

    async fn find_course(&self, id: Uuid) -> Result<Option<Course>, AppError> {
        let course = sqlx::query_as::<_, Course>(
            "SELECT id, code, name, department_id, lecturer_id, level FROM courses WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(course)
    }

    async fn find_room(&self, id: Uuid) -> Result<Option<Room>, AppError> {
        let room = sqlx::query_as::<_, Room>("SELECT id, name, capacity FROM rooms WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(room)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, role, department_id, level FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn borrowed_courses(&self, department_id: Uuid) -> Result<Vec<Course>, AppError> {
        let courses = sqlx::query_as::<_, Course>(
            r#"
            SELECT c.id, c.code, c.name, c.department_id, c.lecturer_id, c.level
            FROM borrowed_courses b
            JOIN courses c ON c.id = b.course_id
            WHERE b.department_id = ?1 AND c.department_id != ?1
            ORDER BY c.code
            "#,
        )
        .bind(department_id)
        .fetch_all(&self.db)
        .await?;
        Ok(courses)
    }

    async fn borrowing_departments(&self, course_id: Uuid) -> Result<Vec<Department>, AppError> {
        let departments = sqlx::query_as::<_, Department>(
            r#"
            SELECT d.id, d.name, d.code
            FROM borrowed_courses b
            JOIN departments d ON d.id = b.department_id
            JOIN courses c ON c.id = b.course_id
            WHERE b.course_id = ?1 AND d.id != c.department_id
            ORDER BY d.name
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.db)
        .await?;
        Ok(departments)
    }
}

#[async_trait]
impl TimetableStore for SqliteStore {
    async fn find_timetable(&self, id: Uuid) -> Result<Option<Timetable>, AppError> {
        let sql = format!("SELECT {TIMETABLE_COLUMNS} FROM timetables t WHERE t.id = ?");
        sqlx::query_as::<_, TimetableRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .map(Timetable::try_from)
            .transpose()
    }

    async fn find_overlapping(&self, query: &OverlapQuery) -> Result<Vec<Timetable>, AppError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {TIMETABLE_COLUMNS} FROM timetables t JOIN courses c ON c.id = t.course_id WHERE t.semester = "
        ));
        qb.push_bind(query.semester);
        qb.push(" AND t.status != ");
        qb.push_bind(TimetableStatus::Rejected);
        qb.push(" AND t.start_time < ");
        qb.push_bind(query.slot.end);
        qb.push(" AND t.end_time > ");
        qb.push_bind(query.slot.start);

        match query.slot.schedule {
            Schedule::Weekly(day) => {
                qb.push(" AND t.day_of_week = ");
                qb.push_bind(weekday_index(day));
            }
            Schedule::Date(date) => {
                qb.push(" AND t.specific_date = ");
                qb.push_bind(date);
            }
        }

        match query.scope {
            OverlapScope::Room(room_id) => {
                qb.push(" AND t.room_id = ");
                qb.push_bind(room_id);
            }
            OverlapScope::Lecturer(lecturer_id) => {
                qb.push(" AND c.lecturer_id = ");
                qb.push_bind(lecturer_id);
            }
            OverlapScope::Cohort {
                department_id,
                level,
            } => {
                qb.push(" AND c.department_id = ");
                qb.push_bind(department_id);
                qb.push(" AND c.level = ");
                qb.push_bind(level);
            }
            OverlapScope::Course(course_id) => {
                qb.push(" AND t.course_id = ");
                qb.push_bind(course_id);
            }
        }

        if let Some(exclude) = query.exclude {
            qb.push(" AND t.id != ");
            qb.push_bind(exclude);
        }
        qb.push(" ORDER BY t.start_time, t.created_at");

        let rows = qb
            .build_query_as::<TimetableRow>()
            .fetch_all(&self.db)
            .await?;
        into_timetables(rows)
    }

    async fn list_timetables(&self, filter: &TimetableFilter) -> Result<Vec<Timetable>, AppError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {TIMETABLE_COLUMNS} FROM timetables t JOIN courses c ON c.id = t.course_id WHERE 1 = 1"
        ));
        if let Some(status) = filter.status {
            qb.push(" AND t.status = ");
            qb.push_bind(status);
        }
        if let Some(semester) = filter.semester {
            qb.push(" AND t.semester = ");
            qb.push_bind(semester);
        }
        if let Some(department_id) = filter.department_id {
            qb.push(" AND c.department_id = ");
            qb.push_bind(department_id);
        }
        if let Some(level) = filter.level {
            qb.push(" AND c.level = ");
            qb.push_bind(level);
        }
        if let Some(lecturer_id) = filter.lecturer_id {
            qb.push(" AND c.lecturer_id = ");
            qb.push_bind(lecturer_id);
        }
        qb.push(" ORDER BY t.day_of_week, t.specific_date, t.start_time, t.created_at");

        let rows = qb
            .build_query_as::<TimetableRow>()
            .fetch_all(&self.db)
            .await?;
        into_timetables(rows)
    }

    async fn exams_between(
        &self,
        department_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Timetable>, AppError> {
        let sql = format!(
            r#"
            SELECT {TIMETABLE_COLUMNS}
            FROM timetables t
            JOIN courses c ON c.id = t.course_id
            WHERE t.specific_date BETWEEN ?1 AND ?2
              AND t.activity_type IN (?3, ?4)
              AND c.department_id = ?5
              AND t.status = ?6
            ORDER BY t.specific_date, t.start_time
            "#
        );
        let rows = sqlx::query_as::<_, TimetableRow>(&sql)
            .bind(from)
            .bind(to)
            .bind(ActivityType::Exam)
            .bind(ActivityType::Test)
            .bind(department_id)
            .bind(TimetableStatus::Approved)
            .fetch_all(&self.db)
            .await?;
        into_timetables(rows)
    }

    async fn commit(
        &self,
        timetable: &Timetable,
        conflicts: &[Conflict],
    ) -> Result<Vec<Conflict>, AppError> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO timetables
                (id, course_id, activity_type, room_id, day_of_week, specific_date,
                start_time, end_time, semester, status, created_at,
                approved_by, approved_at, description)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(id) DO UPDATE SET
                course_id = excluded.course_id,
                activity_type = excluded.activity_type,
                room_id = excluded.room_id,
                day_of_week = excluded.day_of_week,
                specific_date = excluded.specific_date,
                start_time = excluded.start_time,
                end_time = excluded.end_time,
                semester = excluded.semester,
                status = excluded.status,
                approved_by = excluded.approved_by,
                approved_at = excluded.approved_at,
                description = excluded.description
            "#,
        )
        .bind(timetable.id)
        .bind(timetable.course_id)
        .bind(timetable.activity_type)
        .bind(timetable.room_id)
        .bind(timetable.schedule.day_of_week().map(weekday_index))
        .bind(timetable.schedule.specific_date())
        .bind(timetable.start_time)
        .bind(timetable.end_time)
        .bind(timetable.semester)
        .bind(timetable.status)
        .bind(timetable.created_at)
        .bind(timetable.approved_by)
        .bind(timetable.approved_at)
        .bind(&timetable.description)
        .execute(&mut *tx)
        .await?;

        let mut inserted = Vec::new();
        for conflict in conflicts {
            let existing: Option<(Uuid,)> = sqlx::query_as(
                r#"
                SELECT id FROM conflicts
                WHERE (timetable_1 = ?1 AND timetable_2 = ?2)
                   OR (timetable_1 = ?2 AND timetable_2 = ?1)
                "#,
            )
            .bind(conflict.timetable_1)
            .bind(conflict.timetable_2)
            .fetch_optional(&mut *tx)
            .await?;
            if existing.is_some() {
                continue;
            }

            let affected = sqlx::query(
                r#"
                INSERT OR IGNORE INTO conflicts
                    (id, timetable_1, timetable_2, conflict_type, status, detected_at,
                    resolution_notes, resolved_by, resolved_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(conflict.id)
            .bind(conflict.timetable_1)
            .bind(conflict.timetable_2)
            .bind(conflict.conflict_type)
            .bind(conflict.status)
            .bind(conflict.detected_at)
            .bind(&conflict.resolution_notes)
            .bind(conflict.resolved_by)
            .bind(conflict.resolved_at)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if affected > 0 {
                inserted.push(conflict.clone());
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn delete_timetable(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM conflicts WHERE timetable_1 = ?1 OR timetable_2 = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM timetables WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl ConflictStore for SqliteStore {
    async fn find_conflict(&self, id: Uuid) -> Result<Option<Conflict>, AppError> {
        let sql = format!("SELECT {CONFLICT_COLUMNS} FROM conflicts k WHERE k.id = ?");
        let conflict = sqlx::query_as::<_, Conflict>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(conflict)
    }

    async fn find_between(&self, a: Uuid, b: Uuid) -> Result<Option<Conflict>, AppError> {
        let sql = format!(
            "SELECT {CONFLICT_COLUMNS} FROM conflicts k \
             WHERE (k.timetable_1 = ?1 AND k.timetable_2 = ?2) \
                OR (k.timetable_1 = ?2 AND k.timetable_2 = ?1)"
        );
        let conflict = sqlx::query_as::<_, Conflict>(&sql)
            .bind(a)
            .bind(b)
            .fetch_optional(&self.db)
            .await?;
        Ok(conflict)
    }

    async fn conflicts_for_timetable(&self, timetable_id: Uuid) -> Result<Vec<Conflict>, AppError> {
        let sql = format!(
            "SELECT {CONFLICT_COLUMNS} FROM conflicts k \
             WHERE k.timetable_1 = ?1 OR k.timetable_2 = ?1 \
             ORDER BY k.detected_at DESC"
        );
        let conflicts = sqlx::query_as::<_, Conflict>(&sql)
            .bind(timetable_id)
            .fetch_all(&self.db)
            .await?;
        Ok(conflicts)
    }

    async fn list_conflicts(&self, filter: &ConflictFilter) -> Result<Vec<Conflict>, AppError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            r#"
            SELECT {CONFLICT_COLUMNS}
            FROM conflicts k
            JOIN timetables t1 ON t1.id = k.timetable_1
            JOIN courses c1 ON c1.id = t1.course_id
            JOIN timetables t2 ON t2.id = k.timetable_2
            JOIN courses c2 ON c2.id = t2.course_id
            WHERE 1 = 1
            "#
        ));

        match filter.scope {
            ConflictScope::All => {}
            ConflictScope::Timetable(id) => {
                qb.push(" AND (k.timetable_1 = ");
                qb.push_bind(id);
                qb.push(" OR k.timetable_2 = ");
                qb.push_bind(id);
                qb.push(")");
            }
            ConflictScope::Department(id) => {
                qb.push(" AND (c1.department_id = ");
                qb.push_bind(id);
                qb.push(" OR c2.department_id = ");
                qb.push_bind(id);
                qb.push(")");
            }
            ConflictScope::Lecturer(id) => {
                qb.push(" AND (c1.lecturer_id = ");
                qb.push_bind(id);
                qb.push(" OR c2.lecturer_id = ");
                qb.push_bind(id);
                qb.push(")");
            }
        }

        if !filter.statuses.is_empty() {
            qb.push(" AND k.status IN (");
            let mut separated = qb.separated(", ");
            for status in &filter.statuses {
                separated.push_bind(*status);
            }
            separated.push_unseparated(")");
        }

        if let Some(conflict_type) = filter.conflict_type {
            qb.push(" AND k.conflict_type = ");
            qb.push_bind(conflict_type);
        }
        qb.push(" ORDER BY k.detected_at DESC");

        let conflicts = qb.build_query_as::<Conflict>().fetch_all(&self.db).await?;
        Ok(conflicts)
    }

    async fn update_conflict(&self, conflict: &Conflict) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE conflicts
            SET status = ?1,
                resolution_notes = ?2,
                resolved_by = ?3,
                resolved_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(conflict.status)
        .bind(&conflict.resolution_notes)
        .bind(conflict.resolved_by)
        .bind(conflict.resolved_at)
        .bind(conflict.id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn conflict_stats(&self) -> Result<Vec<ConflictStat>, AppError> {
        let stats = sqlx::query_as::<_, ConflictStat>(
            r#"
            SELECT conflict_type, status, COUNT(*) AS count
            FROM conflicts
            GROUP BY conflict_type, status
            ORDER BY conflict_type, status
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(stats)
    }
}
