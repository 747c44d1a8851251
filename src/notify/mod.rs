//! Outbound notification boundary.
//!
//! The core only hands structured events to a [`Notifier`]; formatting and
//! delivery belong to whoever implements it. Failures surface as
//! [`NotificationError`] and never undo the transition that produced the event.

pub mod webhook;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::models::{Conflict, Timetable};

pub use webhook::{WebhookConfig, WebhookNotifier};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    ConflictsDetected { conflicts: Vec<Conflict> },
    TimetableApproved { timetable: Timetable },
    TimetableRejected { timetable: Timetable, reason: String },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::ConflictsDetected { .. } => "conflicts_detected",
            Event::TimetableApproved { .. } => "timetable_approved",
            Event::TimetableRejected { .. } => "timetable_rejected",
        }
    }
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("notification endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("notification gave up after {attempts} attempt(s): {last}")]
    Exhausted {
        attempts: u32,
        last: Box<NotificationError>,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &Event) -> Result<(), NotificationError>;
}

pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _event: &Event) -> Result<(), NotificationError> {
        Ok(())
    }
}

/// Records events in the log instead of delivering them.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &Event) -> Result<(), NotificationError> {
        match event {
            Event::ConflictsDetected { conflicts } => {
                info!(event = event.name(), count = conflicts.len(), "notification");
            }
            Event::TimetableApproved { timetable } => {
                info!(event = event.name(), timetable = %timetable.id, "notification");
            }
            Event::TimetableRejected { timetable, reason } => {
                info!(event = event.name(), timetable = %timetable.id, reason = %reason, "notification");
            }
        }
        Ok(())
    }
}
