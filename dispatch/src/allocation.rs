//! Allocation engine.
//!
//! Intake admission is optimistic: a booking whose vehicle turns out to be
//! busy is never rejected, it is persisted anyway and parked on the waitlist,
//! because a cancellation elsewhere may free the resource before trip time.
//! The conflict check and the insert happen as one atomic store operation
//! ([`crate::store::BookingStore::claim_window`]), so two concurrent intakes
//! for the same vehicle and window cannot both be admitted directly.

use crate::config::DispatchConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::notify::{NotificationKind, NotificationSink, notify_detached};
use crate::store::{BookingStore, WindowClaim};
use crate::types::{
    Booking, BookingCode, BookingDraft, BookingId, BookingStatus, OwnerScope, ServiceType,
    TimeWindow, WaitlistEntry,
};
use chrono::Duration;
use fleetline_core::environment::Clock;
use std::sync::Arc;
use tracing::{info, instrument};

/// Waitlist reason recorded when a client knowingly books a busy vehicle.
pub const REASON_VEHICLE_BUSY: &str = "vehicle busy (user-selected)";

/// Result of an allocation attempt. Admission always succeeds; `waitlisted`
/// tells the caller whether resolution was deferred.
#[derive(Debug, Clone)]
pub struct AllocationOutcome {
    /// The persisted booking
    pub booking: Booking,
    /// Whether a waitlist entry was created for it
    pub waitlisted: bool,
}

/// Admits booking drafts against the live occupancy picture.
#[derive(Clone)]
pub struct AllocationEngine {
    store: Arc<dyn BookingStore>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    config: DispatchConfig,
}

impl AllocationEngine {
    /// Wire up the engine.
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            config,
        }
    }

    /// Admit a booking draft.
    ///
    /// The draft's window is normalized first (transfers default to a
    /// four-hour occupancy, rentals to a multi-day one). The booking is
    /// persisted with status `Pending` either way; if the vehicle was busy
    /// the assignment is kept as a placeholder and a 48-hour `Waiting` entry
    /// is created alongside. The client is notified of the booking in both
    /// cases, fire-and-forget.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Validation`] for drafts without a vehicle or with an
    /// inverted window; [`DispatchError::Store`] when the write fails.
    #[instrument(skip(self, draft), fields(service = %draft.service_type))]
    pub async fn allocate(&self, draft: BookingDraft) -> DispatchResult<AllocationOutcome> {
        let vehicle_id = draft.vehicle_id.ok_or_else(|| {
            DispatchError::Validation("a vehicle must be selected before intake".into())
        })?;
        let window = self.normalize_window(&draft)?;
        let now = self.clock.now();

        let id = BookingId::new();
        let booking = Booking {
            id,
            code: BookingCode::from_booking_id(id),
            service_type: draft.service_type,
            status: BookingStatus::Pending,
            window: Some(window),
            vehicle_id: Some(vehicle_id),
            driver_id: draft.driver_id,
            owner: draft
                .partner_id
                .map_or(OwnerScope::System, OwnerScope::Partner),
            created_at: now,
        };

        let claim = self.store.claim_window(booking.clone()).await?;
        let waitlisted = match claim {
            WindowClaim::Free => false,
            WindowClaim::Busy => {
                let entry = WaitlistEntry::for_booking(
                    &booking,
                    REASON_VEHICLE_BUSY,
                    now + Duration::hours(self.config.user_waitlist_hours),
                    now,
                );
                self.store.insert_waitlist_entry(entry).await?;
                true
            },
        };

        metrics::counter!(
            "fleetline_allocations_total",
            "waitlisted" => if waitlisted { "true" } else { "false" }
        )
        .increment(1);
        if waitlisted {
            metrics::counter!("fleetline_waitlist_total", "trigger" => "user_selected")
                .increment(1);
        }
        info!(booking = %booking.id, code = %booking.code, waitlisted, "booking admitted");

        // Booked-successfully notification goes out regardless of waitlist
        // status; a sink failure must not surface here.
        notify_detached(self.notifier.clone(), booking.id, NotificationKind::Booked);

        Ok(AllocationOutcome { booking, waitlisted })
    }

    fn normalize_window(&self, draft: &BookingDraft) -> DispatchResult<TimeWindow> {
        let end = draft.end.unwrap_or(match draft.service_type {
            ServiceType::Transfer => {
                draft.start + Duration::hours(self.config.transfer_occupancy_hours)
            },
            ServiceType::Rental => draft.start + Duration::days(self.config.rental_default_days),
        });
        TimeWindow::new(draft.start, end).ok_or_else(|| {
            DispatchError::Validation(format!(
                "booking window must end after it starts ({} >= {end})",
                draft.start
            ))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::notify::{NotifyError, TracingNotifier};
    use crate::store::InMemoryBookingStore;
    use crate::types::{DriverId, PartnerId, VehicleId, WaitlistStatus};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use fleetline_testing::mocks::test_clock;

    fn t(hour: u32) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&format!("2025-06-01T{hour:02}:00:00Z"))
            .unwrap()
            .with_timezone(&Utc)
    }

    fn engine(store: Arc<InMemoryBookingStore>) -> AllocationEngine {
        AllocationEngine::new(
            store,
            Arc::new(TracingNotifier),
            Arc::new(test_clock()),
            DispatchConfig::default(),
        )
    }

    fn draft(vehicle: VehicleId, start: u32, end: Option<u32>) -> BookingDraft {
        BookingDraft {
            service_type: ServiceType::Transfer,
            start: t(start),
            end: end.map(t),
            vehicle_id: Some(vehicle),
            driver_id: Some(DriverId::new()),
            partner_id: Some(PartnerId::new()),
        }
    }

    #[tokio::test]
    async fn free_vehicle_is_admitted_directly() {
        let store = Arc::new(InMemoryBookingStore::new());
        let outcome = engine(store.clone())
            .allocate(draft(VehicleId::new(), 10, Some(14)))
            .await
            .unwrap();

        assert!(!outcome.waitlisted);
        assert_eq!(outcome.booking.status, BookingStatus::Pending);
        assert!(
            store
                .waiting_entry_for(outcome.booking.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn busy_vehicle_is_admitted_waitlisted_never_rejected() {
        let store = Arc::new(InMemoryBookingStore::new());
        let vehicle = VehicleId::new();
        let engine = engine(store.clone());

        engine.allocate(draft(vehicle, 10, Some(14))).await.unwrap();
        let outcome = engine.allocate(draft(vehicle, 11, Some(15))).await.unwrap();

        assert!(outcome.waitlisted);
        assert_eq!(outcome.booking.status, BookingStatus::Pending);
        // The tentative assignment stays on the booking as a placeholder.
        assert_eq!(outcome.booking.vehicle_id, Some(vehicle));

        let entry = store
            .waiting_entry_for(outcome.booking.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, WaitlistStatus::Waiting);
        assert_eq!(entry.reason, REASON_VEHICLE_BUSY);
        // User-initiated busy booking gets the 48h horizon.
        assert_eq!(entry.expires_at, test_clock_now() + Duration::hours(48));
    }

    fn test_clock_now() -> DateTime<Utc> {
        use fleetline_core::environment::Clock;
        test_clock().now()
    }

    #[tokio::test]
    async fn transfer_without_end_defaults_to_four_hours() {
        let store = Arc::new(InMemoryBookingStore::new());
        let outcome = engine(store)
            .allocate(draft(VehicleId::new(), 10, None))
            .await
            .unwrap();

        let window = outcome.booking.window.unwrap();
        assert_eq!(window.end - window.start, Duration::hours(4));
    }

    #[tokio::test]
    async fn rental_without_end_defaults_to_multi_day() {
        let store = Arc::new(InMemoryBookingStore::new());
        let mut rental = draft(VehicleId::new(), 10, None);
        rental.service_type = ServiceType::Rental;

        let outcome = engine(store).allocate(rental).await.unwrap();

        let window = outcome.booking.window.unwrap();
        assert_eq!(window.end - window.start, Duration::days(3));
    }

    #[tokio::test]
    async fn draft_without_vehicle_is_rejected_before_any_write() {
        let store = Arc::new(InMemoryBookingStore::new());
        let mut no_vehicle = draft(VehicleId::new(), 10, Some(14));
        no_vehicle.vehicle_id = None;

        let result = engine(store.clone()).allocate(no_vehicle).await;

        assert!(matches!(result, Err(DispatchError::Validation(_))));
        let all = store.bookings(&crate::store::BookingFilter::default()).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn inverted_window_is_rejected() {
        let store = Arc::new(InMemoryBookingStore::new());
        let result = engine(store).allocate(draft(VehicleId::new(), 14, Some(10))).await;
        assert!(matches!(result, Err(DispatchError::Validation(_))));
    }

    struct BrokenSink;

    #[async_trait]
    impl NotificationSink for BrokenSink {
        async fn notify(
            &self,
            _: BookingId,
            _: NotificationKind,
        ) -> Result<(), NotifyError> {
            Err(NotifyError("provider outage".into()))
        }
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_allocation() {
        let store = Arc::new(InMemoryBookingStore::new());
        let engine = AllocationEngine::new(
            store,
            Arc::new(BrokenSink),
            Arc::new(test_clock()),
            DispatchConfig::default(),
        );

        let outcome = engine.allocate(draft(VehicleId::new(), 10, Some(14))).await;
        assert!(outcome.is_ok());
    }
}
