//! Business metrics for the dispatch core.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `fleetline_allocations_total{waitlisted}` - Bookings admitted at intake
//! - `fleetline_waitlist_total{trigger}` - Waitlist entries created
//! - `fleetline_reassignments_total{outcome}` - Resolution attempts by outcome
//!   (reassigned, waitlisted, manual)
//! - `fleetline_cancellations_total` - Bookings cancelled
//! - `fleetline_notifications_failed_total` - Client notifications that were
//!   dropped after a sink failure

use metrics::describe_counter;

/// Register metric descriptions. Call once at startup, before any metrics
/// are recorded.
pub fn register_dispatch_metrics() {
    describe_counter!(
        "fleetline_allocations_total",
        "Total bookings admitted at intake, labeled by whether they were waitlisted"
    );
    describe_counter!(
        "fleetline_waitlist_total",
        "Total waitlist entries created, labeled by trigger (user_selected, system)"
    );
    describe_counter!(
        "fleetline_reassignments_total",
        "Total resolution attempts by outcome (reassigned, waitlisted, manual)"
    );
    describe_counter!(
        "fleetline_cancellations_total",
        "Total bookings cancelled"
    );
    describe_counter!(
        "fleetline_notifications_failed_total",
        "Total client notifications dropped after a sink failure"
    );

    tracing::info!("Dispatch metrics registered");
}
