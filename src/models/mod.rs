pub mod conflict;
pub mod directory;
pub mod timetable;

pub use conflict::{Conflict, ConflictStat, ConflictStatus, ConflictType};
pub use directory::{BorrowedCourse, Course, Department, Room, User, UserRole};
pub use timetable::{
    ActivityType, Schedule, Semester, TimeSlot, Timetable, TimetableRequest, TimetableStatus,
};
