//! Service facade.
//!
//! `DispatchService` wires the engines and collaborator seams into the call
//! shapes the outer platform uses. It owns the ordering guarantees the
//! engines cannot provide alone: the cancellation commits before reassignment
//! is attempted, and a reassignment failure after a committed cancellation is
//! reported as a degraded success, never as a rollback.

use crate::allocation::{AllocationEngine, AllocationOutcome};
use crate::catalog::ResourceCatalog;
use crate::config::DispatchConfig;
use crate::conflict::ConflictDetector;
use crate::error::{DispatchError, DispatchResult};
use crate::notify::NotificationSink;
use crate::reassignment::{ReassignmentEngine, ReassignmentOutcome};
use crate::store::{BookingFilter, BookingStore, BookingUpdate};
use crate::types::{
    Booking, BookingDraft, BookingId, BookingStatus, DriverId, OwnerScope, PartnerId, VehicleId,
    WaitlistStatus,
};
use crate::visibility::{Caller, can_view, ensure_can_view, ensure_confirmable};
use fleetline_core::environment::Clock;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Result of `cancel_and_reassign`. The cancellation has always committed;
/// `reassignment` is auxiliary and `None` when the recovery step itself
/// failed (already logged and alerting).
#[derive(Debug, Clone)]
pub struct CancellationOutcome {
    /// The booking as of the cancellation commit
    pub cancelled_booking: Booking,
    /// What happened to the freed demand, if resolution succeeded
    pub reassignment: Option<ReassignmentOutcome>,
}

/// Facade over the dispatch core.
#[derive(Clone)]
pub struct DispatchService {
    store: Arc<dyn BookingStore>,
    catalog: Arc<dyn ResourceCatalog>,
    clock: Arc<dyn Clock>,
    conflict: ConflictDetector,
    allocation: AllocationEngine,
    reassignment: ReassignmentEngine,
}

impl DispatchService {
    /// Wire the service from its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        catalog: Arc<dyn ResourceCatalog>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            conflict: ConflictDetector::new(store.clone()),
            allocation: AllocationEngine::new(
                store.clone(),
                notifier.clone(),
                clock.clone(),
                config.clone(),
            ),
            reassignment: ReassignmentEngine::new(
                store.clone(),
                catalog.clone(),
                notifier,
                clock.clone(),
                config,
            ),
            store,
            catalog,
            clock,
        }
    }

    /// The conflict detector, for availability-style read paths.
    #[must_use]
    pub const fn conflicts(&self) -> &ConflictDetector {
        &self.conflict
    }

    /// Admit a booking draft. Never rejects a busy vehicle; see
    /// [`AllocationEngine::allocate`].
    ///
    /// # Errors
    ///
    /// Propagates validation and store errors from the allocation engine.
    pub async fn create_booking(&self, draft: BookingDraft) -> DispatchResult<AllocationOutcome> {
        self.allocation.allocate(draft).await
    }

    /// Cancel a booking and try to resolve the freed demand.
    ///
    /// The cancellation commits first and stands on its own. Reassignment is
    /// then attempted best-effort: if it fails, the booking stays cancelled
    /// and unassigned (safe, nothing double-books) and the outcome carries
    /// `reassignment: None`.
    ///
    /// # Errors
    ///
    /// [`DispatchError::NotFound`] for unknown bookings,
    /// [`DispatchError::AccessDenied`] when the caller may not see the
    /// booking, [`DispatchError::ConflictPolicy`] when it is already
    /// terminal, [`DispatchError::Store`] when the cancellation write fails.
    #[instrument(skip(self), fields(booking = %booking_id))]
    pub async fn cancel_and_reassign(
        &self,
        caller: Caller,
        booking_id: BookingId,
        reason: &str,
    ) -> DispatchResult<CancellationOutcome> {
        let booking = self.require_booking(booking_id).await?;
        let waiting = self.has_waiting_entry(booking_id).await?;
        ensure_can_view(caller, &booking, waiting)?;

        if booking.status.is_terminal() {
            return Err(DispatchError::ConflictPolicy(format!(
                "booking {booking_id} is already {}",
                booking.status
            )));
        }

        let cancelled = self
            .store
            .update_booking(booking_id, BookingUpdate::status(BookingStatus::Cancelled))
            .await?;
        metrics::counter!("fleetline_cancellations_total").increment(1);
        info!(booking = %booking_id, reason, "booking cancelled");

        let reassignment = match self.reassignment.reassign(&cancelled, reason).await {
            Ok(outcome) => Some(outcome),
            Err(error) => {
                // The cancellation stands; the freed demand just was not
                // resolved. Operators pick this up from the error log.
                error!(booking = %booking_id, %error, "post-cancellation reassignment failed");
                None
            },
        };

        Ok(CancellationOutcome {
            cancelled_booking: cancelled,
            reassignment,
        })
    }

    /// Privileged direct assignment. Operator-only: partners never reassign
    /// across fleets themselves.
    ///
    /// # Errors
    ///
    /// [`DispatchError::AccessDenied`] for non-system callers,
    /// [`DispatchError::NotFound`] for unknown bookings, plus the
    /// reassignment engine's validation and store errors.
    #[instrument(skip(self), fields(booking = %booking_id))]
    pub async fn manual_assign(
        &self,
        caller: Caller,
        booking_id: BookingId,
        partner_id: PartnerId,
        vehicle_id: VehicleId,
        driver_id: Option<DriverId>,
    ) -> DispatchResult<Booking> {
        if !caller.is_system() {
            return Err(DispatchError::AccessDenied(
                "manual assignment is restricted to system operators".into(),
            ));
        }
        let booking = self.require_booking(booking_id).await?;
        self.reassignment
            .manual_assign(&booking, partner_id, vehicle_id, driver_id)
            .await
    }

    /// Bookings visible to the caller, matching the filter.
    ///
    /// Partner callers are scoped to their own bookings and restricted
    /// bookings are silently omitted (direct fetches refuse explicitly
    /// instead, see [`Self::get_booking`]).
    ///
    /// # Errors
    ///
    /// [`DispatchError::Store`] on read failure.
    pub async fn list_bookings(
        &self,
        caller: Caller,
        mut filter: BookingFilter,
    ) -> DispatchResult<Vec<Booking>> {
        if let Caller::Partner(partner_id) = caller {
            filter.partner = Some(partner_id);
        }
        let rows = self.store.bookings(&filter).await?;
        if caller.is_system() {
            return Ok(rows);
        }

        let mut visible = Vec::with_capacity(rows.len());
        for booking in rows {
            let waiting = self.has_waiting_entry(booking.id).await?;
            if can_view(caller, &booking, waiting) {
                visible.push(booking);
            }
        }
        Ok(visible)
    }

    /// A single booking, with visibility enforced and stale waitlist entries
    /// resolved on the way.
    ///
    /// If the booking's `Waiting` entry has expired, it is marked `Expired`
    /// and resolution is re-run immediately, so no caller ever acts on a
    /// stale entry as if it were authoritative. (There is no background
    /// sweeper; reads are the enforcement point.)
    ///
    /// # Errors
    ///
    /// [`DispatchError::NotFound`] for unknown bookings,
    /// [`DispatchError::AccessDenied`] when the caller may not see it,
    /// [`DispatchError::Store`] on read failure.
    #[instrument(skip(self), fields(booking = %booking_id))]
    pub async fn get_booking(&self, caller: Caller, booking_id: BookingId) -> DispatchResult<Booking> {
        let mut booking = self.require_booking(booking_id).await?;
        let mut waiting_entry = self.store.waiting_entry_for(booking_id).await?;

        if let Some(entry) = &waiting_entry {
            if entry.is_stale(self.clock.now()) {
                info!(booking = %booking_id, entry = %entry.id, "expiring stale waitlist entry on read");
                self.store
                    .update_waitlist_entry(entry.id, WaitlistStatus::Expired)
                    .await?;
                match self.reassignment.reassign(&booking, "waitlist entry expired").await {
                    Ok(ReassignmentOutcome::Reassigned { booking: updated }) => {
                        booking = updated;
                        waiting_entry = None;
                    },
                    Ok(ReassignmentOutcome::Waitlisted {
                        booking: updated,
                        entry,
                    }) => {
                        booking = updated;
                        waiting_entry = Some(entry);
                    },
                    Err(error) => {
                        error!(booking = %booking_id, %error, "stale-entry resolution failed");
                        waiting_entry = None;
                    },
                }
            }
        }

        ensure_can_view(caller, &booking, waiting_entry.is_some())?;
        Ok(booking)
    }

    /// Confirm a pending booking on behalf of its owning partner.
    ///
    /// # Errors
    ///
    /// [`DispatchError::NotFound`] for unknown bookings,
    /// [`DispatchError::AccessDenied`] when the caller may not see it,
    /// [`DispatchError::ConflictPolicy`] when the confirmation guard refuses
    /// (waitlisted, system queue, unapproved partner, or non-pending status).
    #[instrument(skip(self), fields(booking = %booking_id))]
    pub async fn confirm_booking(
        &self,
        caller: Caller,
        booking_id: BookingId,
    ) -> DispatchResult<Booking> {
        let booking = self.require_booking(booking_id).await?;
        let waiting = self.has_waiting_entry(booking_id).await?;
        ensure_can_view(caller, &booking, waiting)?;

        let owner = match booking.owner {
            OwnerScope::Partner(partner_id) => self.catalog.partner(partner_id).await?,
            OwnerScope::System => None,
        };
        ensure_confirmable(&booking, waiting, owner.as_ref())?;

        let confirmed = self
            .store
            .update_booking(booking_id, BookingUpdate::status(BookingStatus::Confirmed))
            .await?;
        info!(booking = %booking_id, "booking confirmed");
        Ok(confirmed)
    }

    async fn require_booking(&self, booking_id: BookingId) -> DispatchResult<Booking> {
        self.store
            .booking(booking_id)
            .await?
            .ok_or(DispatchError::NotFound(booking_id))
    }

    async fn has_waiting_entry(&self, booking_id: BookingId) -> DispatchResult<bool> {
        Ok(self.store.waiting_entry_for(booking_id).await?.is_some())
    }
}
