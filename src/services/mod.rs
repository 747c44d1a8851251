pub mod conflict;
pub mod detection;
pub mod timetable;

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::warn;

use crate::notify::{Event, NotificationError, Notifier};

pub use conflict::ConflictService;
pub use detection::{ConflictDetector, DetectedConflict};
pub use timetable::TimetableService;

/// Serializes check-then-act sequences (detect + commit, check + approve)
/// across every controller sharing the gate.
#[derive(Clone, Default)]
pub struct WriteGate(Arc<Mutex<()>>);

impl WriteGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.0.lock().await
    }
}

/// A committed result plus the outcome of the notification it triggered.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub notification_error: Option<NotificationError>,
}

impl<T> Outcome<T> {
    pub fn quiet(value: T) -> Self {
        Self {
            value,
            notification_error: None,
        }
    }
}

/// Delivers `event`, logging and returning the failure instead of propagating it.
pub(crate) async fn dispatch(notifier: &Arc<dyn Notifier>, event: Event) -> Option<NotificationError> {
    match notifier.notify(&event).await {
        Ok(()) => None,
        Err(e) => {
            warn!("{} notification failed after commit: {}", event.name(), e);
            Some(e)
        }
    }
}
