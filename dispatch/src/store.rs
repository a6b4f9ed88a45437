//! Booking store seam.
//!
//! The durable record of bookings and waitlist entries is an external
//! collaborator; this core only relies on the read/write/update-by-id
//! contract below. [`InMemoryBookingStore`] backs tests and the demo binary.
//!
//! Two operations carry invariants the rest of the core depends on:
//!
//! - [`BookingStore::claim_window`] checks the requested vehicle's window
//!   against live bookings and inserts the new booking in one atomic step.
//!   Two concurrent intakes for the same vehicle and window therefore cannot
//!   both observe "free".
//! - [`BookingStore::insert_waitlist_entry`] expires any prior `Waiting`
//!   entry for the same booking before inserting (last-wins), keeping at
//!   most one `Waiting` entry per booking.

use crate::types::{
    Booking, BookingId, BookingStatus, DriverId, OwnerScope, PartnerId, ServiceType, TimeWindow,
    VehicleId, WaitlistEntry, WaitlistEntryId, WaitlistStatus,
};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors surfaced by a booking store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced record does not exist
    #[error("record not found")]
    NotFound,

    /// The backend could not be reached or failed mid-operation
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of an atomic window claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowClaim {
    /// No live booking overlapped the requested vehicle's window
    Free,
    /// The vehicle was already committed for an overlapping window
    Busy,
}

/// Query filter for booking reads. Every field is conjunctive; `None` means
/// "don't care".
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    /// Only bookings owned by this partner
    pub partner: Option<PartnerId>,
    /// Only bookings in one of these statuses
    pub statuses: Option<Vec<BookingStatus>>,
    /// Only bookings whose window overlaps this one
    pub overlapping: Option<TimeWindow>,
    /// Only bookings for this service
    pub service_type: Option<ServiceType>,
}

impl BookingFilter {
    fn matches(&self, booking: &Booking) -> bool {
        if self
            .partner
            .is_some_and(|partner| booking.owner.partner_id() != Some(partner))
        {
            return false;
        }
        if self
            .statuses
            .as_ref()
            .is_some_and(|statuses| !statuses.contains(&booking.status))
        {
            return false;
        }
        if let Some(window) = &self.overlapping {
            match &booking.window {
                Some(own) if own.overlaps(window) => {},
                _ => return false,
            }
        }
        if self
            .service_type
            .is_some_and(|service| booking.service_type != service)
        {
            return false;
        }
        true
    }
}

/// How an update changes a booking's assignment.
#[derive(Debug, Clone)]
pub enum AssignmentChange {
    /// Commit a substitute vehicle/driver pair under the given owner
    Assign {
        /// The substitute vehicle
        vehicle_id: VehicleId,
        /// The substitute driver
        driver_id: Option<DriverId>,
        /// The queue that operates on the booking from now on
        owner: OwnerScope,
    },
    /// Clear the assignment entirely and park the booking in the system
    /// queue, where only system operators can resolve it
    ClearToSystemQueue,
}

/// Partial update applied to a booking by id. `None` fields are untouched.
#[derive(Debug, Clone, Default)]
pub struct BookingUpdate {
    /// New lifecycle status
    pub status: Option<BookingStatus>,
    /// Assignment change
    pub assignment: Option<AssignmentChange>,
}

impl BookingUpdate {
    /// Update that only transitions the status.
    #[must_use]
    pub const fn status(status: BookingStatus) -> Self {
        Self {
            status: Some(status),
            assignment: None,
        }
    }
}

/// Transactional record of bookings and waitlist entries.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert a booking unconditionally.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn insert_booking(&self, booking: Booking) -> Result<(), StoreError>;

    /// Atomically check the booking's vehicle/window against live bookings
    /// and insert it. The booking is inserted either way; the claim reports
    /// whether the window was already taken.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn claim_window(&self, booking: Booking) -> Result<WindowClaim, StoreError>;

    /// Fetch a booking by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError>;

    /// Apply a partial update to a booking and return the updated row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the booking does not exist, or
    /// [`StoreError::Unavailable`] on backend failure.
    async fn update_booking(
        &self,
        id: BookingId,
        update: BookingUpdate,
    ) -> Result<Booking, StoreError>;

    /// Query bookings matching the filter, ordered by creation time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError>;

    /// Insert a waitlist entry, expiring any prior `Waiting` entry for the
    /// same booking in the same step (last-wins).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn insert_waitlist_entry(&self, entry: WaitlistEntry) -> Result<(), StoreError>;

    /// Transition a waitlist entry's status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the entry does not exist, or
    /// [`StoreError::Unavailable`] on backend failure.
    async fn update_waitlist_entry(
        &self,
        id: WaitlistEntryId,
        status: WaitlistStatus,
    ) -> Result<(), StoreError>;

    /// The current `Waiting` entry for a booking, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn waiting_entry_for(
        &self,
        booking_id: BookingId,
    ) -> Result<Option<WaitlistEntry>, StoreError>;
}

#[derive(Default)]
struct Tables {
    bookings: HashMap<BookingId, Booking>,
    waitlist: HashMap<WaitlistEntryId, WaitlistEntry>,
}

/// In-memory booking store for tests and the demo binary.
///
/// A single `RwLock` over both tables makes `claim_window` and
/// `insert_waitlist_entry` trivially atomic.
#[derive(Default)]
pub struct InMemoryBookingStore {
    tables: RwLock<Tables>,
}

impl InMemoryBookingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert_booking(&self, booking: Booking) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn claim_window(&self, booking: Booking) -> Result<WindowClaim, StoreError> {
        let mut tables = self.tables.write().await;
        let claim = match (booking.vehicle_id, booking.window) {
            (Some(vehicle), Some(window)) => {
                let busy = tables.bookings.values().any(|existing| {
                    existing
                        .occupancy()
                        .is_some_and(|(v, w)| v == vehicle && w.overlaps(&window))
                });
                if busy { WindowClaim::Busy } else { WindowClaim::Free }
            },
            // Nothing to claim without a full assignment.
            _ => WindowClaim::Free,
        };
        tables.bookings.insert(booking.id, booking);
        Ok(claim)
    }

    async fn booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.bookings.get(&id).cloned())
    }

    async fn update_booking(
        &self,
        id: BookingId,
        update: BookingUpdate,
    ) -> Result<Booking, StoreError> {
        let mut tables = self.tables.write().await;
        let booking = tables.bookings.get_mut(&id).ok_or(StoreError::NotFound)?;

        if let Some(status) = update.status {
            booking.status = status;
        }
        match update.assignment {
            Some(AssignmentChange::Assign {
                vehicle_id,
                driver_id,
                owner,
            }) => {
                booking.vehicle_id = Some(vehicle_id);
                booking.driver_id = driver_id;
                booking.owner = owner;
            },
            Some(AssignmentChange::ClearToSystemQueue) => {
                booking.vehicle_id = None;
                booking.driver_id = None;
                booking.owner = OwnerScope::System;
            },
            None => {},
        }
        Ok(booking.clone())
    }

    async fn bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|booking| filter.matches(booking))
            .cloned()
            .collect();
        rows.sort_by_key(|booking| booking.created_at);
        Ok(rows)
    }

    async fn insert_waitlist_entry(&self, entry: WaitlistEntry) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        for existing in tables.waitlist.values_mut() {
            if existing.booking_id == entry.booking_id
                && existing.status == WaitlistStatus::Waiting
            {
                existing.status = WaitlistStatus::Expired;
            }
        }
        tables.waitlist.insert(entry.id, entry);
        Ok(())
    }

    async fn update_waitlist_entry(
        &self,
        id: WaitlistEntryId,
        status: WaitlistStatus,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let entry = tables.waitlist.get_mut(&id).ok_or(StoreError::NotFound)?;
        entry.status = status;
        Ok(())
    }

    async fn waiting_entry_for(
        &self,
        booking_id: BookingId,
    ) -> Result<Option<WaitlistEntry>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .waitlist
            .values()
            .filter(|entry| {
                entry.booking_id == booking_id && entry.status == WaitlistStatus::Waiting
            })
            .max_by_key(|entry| entry.created_at)
            .cloned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::BookingCode;
    use chrono::{DateTime, Duration, Utc};

    fn t(hour: u32) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&format!("2025-06-01T{hour:02}:00:00Z"))
            .unwrap()
            .with_timezone(&Utc)
    }

    fn booking_on(vehicle: VehicleId, start: u32, end: u32) -> Booking {
        let id = BookingId::new();
        Booking {
            id,
            code: BookingCode::from_booking_id(id),
            service_type: ServiceType::Transfer,
            status: BookingStatus::Pending,
            window: TimeWindow::new(t(start), t(end)),
            vehicle_id: Some(vehicle),
            driver_id: Some(DriverId::new()),
            owner: OwnerScope::Partner(PartnerId::new()),
            created_at: t(start) - Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn second_claim_on_overlapping_window_is_busy() {
        let store = InMemoryBookingStore::new();
        let vehicle = VehicleId::new();

        let first = store.claim_window(booking_on(vehicle, 10, 14)).await.unwrap();
        let second = store.claim_window(booking_on(vehicle, 11, 15)).await.unwrap();

        assert_eq!(first, WindowClaim::Free);
        assert_eq!(second, WindowClaim::Busy);
    }

    #[tokio::test]
    async fn busy_claim_still_inserts_the_booking() {
        let store = InMemoryBookingStore::new();
        let vehicle = VehicleId::new();

        store.claim_window(booking_on(vehicle, 10, 14)).await.unwrap();
        let parked = booking_on(vehicle, 11, 15);
        let parked_id = parked.id;
        store.claim_window(parked).await.unwrap();

        let stored = store.booking(parked_id).await.unwrap().unwrap();
        assert_eq!(stored.vehicle_id, Some(vehicle));
    }

    #[tokio::test]
    async fn claims_on_other_vehicles_do_not_collide() {
        let store = InMemoryBookingStore::new();

        store
            .claim_window(booking_on(VehicleId::new(), 10, 14))
            .await
            .unwrap();
        let claim = store
            .claim_window(booking_on(VehicleId::new(), 10, 14))
            .await
            .unwrap();

        assert_eq!(claim, WindowClaim::Free);
    }

    #[tokio::test]
    async fn cancelled_bookings_release_their_window() {
        let store = InMemoryBookingStore::new();
        let vehicle = VehicleId::new();

        let original = booking_on(vehicle, 10, 14);
        let original_id = original.id;
        store.claim_window(original).await.unwrap();
        store
            .update_booking(original_id, BookingUpdate::status(BookingStatus::Cancelled))
            .await
            .unwrap();

        let claim = store.claim_window(booking_on(vehicle, 10, 14)).await.unwrap();
        assert_eq!(claim, WindowClaim::Free);
    }

    #[tokio::test]
    async fn waitlist_insert_is_last_wins() {
        let store = InMemoryBookingStore::new();
        let booking = booking_on(VehicleId::new(), 10, 14);
        let booking_id = booking.id;

        let first = WaitlistEntry::for_booking(&booking, "vehicle busy", t(16), t(9));
        let first_id = first.id;
        let second = WaitlistEntry::for_booking(&booking, "admin cancel", t(18), t(10));
        let second_id = second.id;

        store.insert_waitlist_entry(first).await.unwrap();
        store.insert_waitlist_entry(second).await.unwrap();

        let waiting = store.waiting_entry_for(booking_id).await.unwrap().unwrap();
        assert_eq!(waiting.id, second_id);
        assert_ne!(waiting.id, first_id);
    }

    #[tokio::test]
    async fn clear_to_system_queue_drops_the_whole_assignment() {
        let store = InMemoryBookingStore::new();
        let booking = booking_on(VehicleId::new(), 10, 14);
        let id = booking.id;
        store.insert_booking(booking).await.unwrap();

        let updated = store
            .update_booking(
                id,
                BookingUpdate {
                    status: Some(BookingStatus::Pending),
                    assignment: Some(AssignmentChange::ClearToSystemQueue),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.vehicle_id, None);
        assert_eq!(updated.driver_id, None);
        assert_eq!(updated.owner, OwnerScope::System);
        assert_eq!(updated.status, BookingStatus::Pending);
    }
}
