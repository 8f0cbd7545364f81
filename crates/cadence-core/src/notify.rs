use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CoreError;
use crate::timezone;

/// Boundary to the external notification service. The engine hands over a
/// task identifier and the desired send time; delivery, retries, and user
/// preferences all live on the other side of this seam.
///
/// `schedule` has enqueue semantics: fire and forget, no result.
pub trait Notifier: Send + Sync {
    fn schedule(&self, task_id: Uuid, send_at: DateTime<Utc>);
}

/// Default collaborator: drops every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn schedule(&self, _task_id: Uuid, _send_at: DateTime<Utc>) {}
}

/// Collaborator that records each request in the log, rendering the send
/// time in a display timezone. Reminder mail in the original product quoted
/// due times in the user's local zone, so the seam keeps that courtesy.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    timezone: String,
}

impl LogNotifier {
    pub fn new(timezone: &str) -> Result<Self, CoreError> {
        timezone::parse_timezone(timezone)?;
        Ok(Self {
            timezone: timezone.to_string(),
        })
    }
}

impl Notifier for LogNotifier {
    fn schedule(&self, task_id: Uuid, send_at: DateTime<Utc>) {
        // Not named `display`: tracing's macro imports `field::display`
        // into its expansion scope, which would shadow the local.
        let rendered = timezone::format_with_timezone(send_at, &self.timezone, "%Y-%m-%d %H:%M %Z")
            .unwrap_or_else(|_| send_at.to_rfc3339());
        tracing::info!(task = %task_id, send_at = %rendered, "notification scheduled");
    }
}
