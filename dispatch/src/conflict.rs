//! Conflict detector.
//!
//! Pure read over the booking store: which vehicles are already committed to
//! a live booking overlapping a given window. Sits on the hot path of both
//! intake and search/listing, so the answer is batch by construction - one
//! store query yields the conflict set for the whole catalog.

use crate::store::{BookingFilter, BookingStore};
use crate::types::{BookingStatus, TimeWindow, VehicleId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Detects vehicles committed to overlapping, non-terminal bookings.
#[derive(Clone)]
pub struct ConflictDetector {
    store: Arc<dyn BookingStore>,
}

impl ConflictDetector {
    /// Create a detector over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    /// Every vehicle bound to a pending or confirmed booking whose window
    /// overlaps `window` (half-open overlap). Cancelled and completed
    /// bookings never count.
    ///
    /// On a store read failure the result is empty-but-uncertain: the
    /// failure is logged and callers proceed conservatively rather than
    /// crash the booking flow. The atomic claim at commit time catches
    /// anything this read missed.
    pub async fn find_conflicting_vehicles(&self, window: TimeWindow) -> HashSet<VehicleId> {
        let filter = BookingFilter {
            statuses: Some(vec![BookingStatus::Pending, BookingStatus::Confirmed]),
            overlapping: Some(window),
            ..BookingFilter::default()
        };

        match self.store.bookings(&filter).await {
            Ok(rows) => rows
                .iter()
                .filter_map(|booking| booking.occupancy().map(|(vehicle, _)| vehicle))
                .collect(),
            Err(error) => {
                warn!(%error, "conflict check failed; treating result as empty-but-uncertain");
                HashSet::new()
            },
        }
    }

    /// Whether a single vehicle is free for the window.
    pub async fn vehicle_is_free(&self, vehicle: VehicleId, window: TimeWindow) -> bool {
        !self.find_conflicting_vehicles(window).await.contains(&vehicle)
    }
}
