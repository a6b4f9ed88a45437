//! Notification sink seam.
//!
//! Client notification is strictly best-effort: the engines spawn the notify
//! future and move on. A sink failure is logged at `warn` and never rolls
//! back or fails the allocation or reassignment that triggered it.

use crate::types::BookingId;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// What happened to the booking, from the client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// The booking was taken in (possibly waitlisted behind the scenes)
    Booked,
    /// A substitute vehicle/driver pair was committed
    Reassigned,
}

/// Failure while delivering a notification.
#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// External notification collaborator (email, push, SMS - not our concern).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a notification about a booking.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when delivery fails; callers log and discard.
    async fn notify(&self, booking_id: BookingId, kind: NotificationKind)
    -> Result<(), NotifyError>;
}

/// Sink that only logs. Useful as a default and in the demo binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationSink for TracingNotifier {
    async fn notify(
        &self,
        booking_id: BookingId,
        kind: NotificationKind,
    ) -> Result<(), NotifyError> {
        info!(booking = %booking_id, ?kind, "client notification");
        Ok(())
    }
}

/// Spawn a notification without awaiting it. Failures are logged and
/// swallowed; the caller's transaction has already committed.
pub fn notify_detached(sink: Arc<dyn NotificationSink>, booking_id: BookingId, kind: NotificationKind) {
    tokio::spawn(async move {
        if let Err(error) = sink.notify(booking_id, kind).await {
            metrics::counter!("fleetline_notifications_failed_total").increment(1);
            warn!(booking = %booking_id, ?kind, %error, "notification failed, not retried");
        }
    });
}
