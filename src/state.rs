use std::sync::Arc;

use sqlx::SqlitePool;

use crate::db::SqliteStore;
use crate::notify::Notifier;
use crate::services::{ConflictService, TimetableService, WriteGate};
use crate::store::DirectoryStore;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub directory: Arc<dyn DirectoryStore>,
    pub timetables: Arc<TimetableService>,
    pub conflicts: Arc<ConflictService>,
}

impl AppState {
    /// Wires both controllers onto one SQLite store and one write gate.
    pub fn new(db: SqlitePool, notifier: Arc<dyn Notifier>) -> Self {
        let store = Arc::new(SqliteStore::new(db.clone()));
        let gate = WriteGate::new();

        let timetables = TimetableService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            notifier,
            gate.clone(),
        );
        let conflicts = ConflictService::new(store.clone(), gate);

        Self {
            db,
            directory: store,
            timetables: Arc::new(timetables),
            conflicts: Arc::new(conflicts),
        }
    }
}
