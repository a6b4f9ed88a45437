//! Reassignment engine.
//!
//! When a booking is cancelled (or a waitlisted request needs resolution),
//! Fleetline searches for a substitute vehicle/driver pairing - first inside
//! the original partner's fleet, then across the whole catalog - before
//! falling back to a renewed waitlist entry.
//!
//! The decision logic is a pure state machine ([`ReassignmentReducer`])
//! driven phase by phase:
//!
//! ```text
//! Begin ─► SearchLocal ─► SearchGlobal ─► { Reassigned | Waitlisted }
//!              │                               ▲
//!              └── both candidate lists ───────┘
//!                  non-empty
//! ```
//!
//! The imperative shell ([`ReassignmentEngine`]) feeds it catalog query
//! results as `CandidatesFound` events and commits whatever phase the
//! attempt settles in. Pairing is first-candidate-wins on each list; this is
//! a best-effort picker by policy, not a joint vehicle/driver optimizer.

use crate::catalog::{DriverFilter, ResourceCatalog, VehicleFilter};
use crate::config::DispatchConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::notify::{NotificationKind, NotificationSink};
use crate::store::{AssignmentChange, BookingStore, BookingUpdate};
use crate::types::{
    Booking, BookingId, BookingStatus, Driver, DriverId, OwnerScope, PartnerId, ServiceType,
    Vehicle, VehicleId, WaitlistEntry, WaitlistStatus,
};
use chrono::Duration;
use fleetline_core::environment::Clock;
use fleetline_core::effect::Effect;
use fleetline_core::reducer::Reducer;
use fleetline_core::{SmallVec, smallvec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Which stage of the search produced a candidate set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchScope {
    /// Scoped to the original partner's fleet
    Local,
    /// The whole catalog
    Global,
}

/// Actions for the reassignment state machine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ReassignmentAction {
    // Commands
    /// Open a resolution attempt for a booking
    Begin {
        /// Snapshot of the booking needing resolution
        booking: Booking,
        /// Free-text cause carried onto any fallback waitlist entry
        reason: String,
    },

    /// Privileged direct assignment, bypassing the search
    ManualAssign {
        /// The booking being resolved
        booking: Booking,
        /// Operator-chosen vehicle
        vehicle: Vehicle,
        /// Driver for the new assignment
        driver_id: DriverId,
    },

    // Events
    /// A search stage returned its (capped) candidate lists
    CandidatesFound {
        /// The attempt this answers
        booking_id: BookingId,
        /// Which stage was queried
        scope: SearchScope,
        /// Vehicle candidates, best first
        vehicles: Vec<Vehicle>,
        /// Driver candidates, best first
        drivers: Vec<Driver>,
    },
}

// ============================================================================
// State
// ============================================================================

/// Where an in-flight resolution attempt currently stands.
#[derive(Clone, Debug)]
pub enum ResolutionPhase {
    /// Querying the original partner's fleet
    SearchLocal,
    /// Querying the whole catalog
    SearchGlobal,
    /// A substitute pairing was chosen and awaits commit
    Reassigned {
        /// The substitute vehicle (its partner becomes the new owner)
        vehicle: Vehicle,
        /// The substitute driver
        driver_id: DriverId,
    },
    /// No candidates anywhere; fall back to a renewed waitlist entry
    Waitlisted {
        /// The entry to persist
        entry: WaitlistEntry,
    },
}

/// One booking's resolution attempt.
#[derive(Clone, Debug)]
pub struct ResolutionAttempt {
    /// The booking being resolved
    pub booking_id: BookingId,
    /// Partner at the time resolution started
    pub original_partner_id: Option<PartnerId>,
    /// Vehicle being replaced (excluded from candidate lists)
    pub original_vehicle_id: Option<VehicleId>,
    /// Driver being replaced (excluded from candidate lists)
    pub original_driver_id: Option<DriverId>,
    /// Service the substitute must support
    pub service_type: ServiceType,
    /// Cause carried onto a fallback waitlist entry
    pub reason: String,
    /// Current phase
    pub phase: ResolutionPhase,
}

/// Reducer state: in-flight attempts keyed by booking.
#[derive(Clone, Debug, Default)]
pub struct ReassignmentState {
    attempts: HashMap<BookingId, ResolutionAttempt>,
    last_error: Option<String>,
}

impl ReassignmentState {
    /// Empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The attempt for a booking, if one is open.
    #[must_use]
    pub fn attempt(&self, booking_id: &BookingId) -> Option<&ResolutionAttempt> {
        self.attempts.get(booking_id)
    }

    /// Last rejected input, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Dependencies injected into the reassignment reducer.
#[derive(Clone)]
pub struct ReassignmentEnvironment {
    /// Clock for waitlist horizons
    pub clock: Arc<dyn Clock>,
    /// Sink reached by the notify effect after a committed reassignment
    pub notifier: Arc<dyn NotificationSink>,
    /// Policy tunables
    pub config: DispatchConfig,
}

impl ReassignmentEnvironment {
    /// Creates a new `ReassignmentEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationSink>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            clock,
            notifier,
            config,
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Pure state machine for resolution attempts.
#[derive(Clone, Debug, Default)]
pub struct ReassignmentReducer;

impl ReassignmentReducer {
    /// Creates a new `ReassignmentReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn notify_effect(
        env: &ReassignmentEnvironment,
        booking_id: BookingId,
    ) -> Effect<ReassignmentAction> {
        let notifier = env.notifier.clone();
        Effect::fire_and_forget(async move {
            if let Err(err) = notifier.notify(booking_id, NotificationKind::Reassigned).await {
                metrics::counter!("fleetline_notifications_failed_total").increment(1);
                tracing::warn!(booking = %booking_id, %err, "reassignment notification failed");
            }
        })
    }
}

impl Reducer for ReassignmentReducer {
    type State = ReassignmentState;
    type Action = ReassignmentAction;
    type Environment = ReassignmentEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            ReassignmentAction::Begin { booking, reason } => {
                // No known original partner means there is no local fleet to
                // prefer; the attempt starts at the global stage.
                let phase = if booking.owner.partner_id().is_some() {
                    ResolutionPhase::SearchLocal
                } else {
                    ResolutionPhase::SearchGlobal
                };
                state.attempts.insert(
                    booking.id,
                    ResolutionAttempt {
                        booking_id: booking.id,
                        original_partner_id: booking.owner.partner_id(),
                        original_vehicle_id: booking.vehicle_id,
                        original_driver_id: booking.driver_id,
                        service_type: booking.service_type,
                        reason,
                        phase,
                    },
                );
                state.last_error = None;
                SmallVec::new()
            },

            ReassignmentAction::ManualAssign {
                booking,
                vehicle,
                driver_id,
            } => {
                state.attempts.insert(
                    booking.id,
                    ResolutionAttempt {
                        booking_id: booking.id,
                        original_partner_id: booking.owner.partner_id(),
                        original_vehicle_id: booking.vehicle_id,
                        original_driver_id: booking.driver_id,
                        service_type: booking.service_type,
                        reason: String::new(),
                        phase: ResolutionPhase::Reassigned { vehicle, driver_id },
                    },
                );
                state.last_error = None;
                smallvec![Self::notify_effect(env, booking.id)]
            },

            ReassignmentAction::CandidatesFound {
                booking_id,
                scope,
                vehicles,
                drivers,
            } => {
                let Some(attempt) = state.attempts.get_mut(&booking_id) else {
                    state.last_error =
                        Some(format!("candidates for unknown attempt {booking_id}"));
                    return SmallVec::new();
                };
                if !matches!(
                    attempt.phase,
                    ResolutionPhase::SearchLocal | ResolutionPhase::SearchGlobal
                ) {
                    state.last_error =
                        Some(format!("attempt {booking_id} is already settled"));
                    return SmallVec::new();
                }

                // First candidate of each list wins; the two picks are
                // independent, matching the documented best-effort policy.
                match (vehicles.into_iter().next(), drivers.into_iter().next()) {
                    (Some(vehicle), Some(driver)) => {
                        attempt.phase = ResolutionPhase::Reassigned {
                            vehicle,
                            driver_id: driver.id,
                        };
                        state.last_error = None;
                        smallvec![Self::notify_effect(env, booking_id)]
                    },
                    _ if scope == SearchScope::Local => {
                        attempt.phase = ResolutionPhase::SearchGlobal;
                        state.last_error = None;
                        SmallVec::new()
                    },
                    _ => {
                        let now = env.clock.now();
                        let entry = WaitlistEntry {
                            id: crate::types::WaitlistEntryId::new(),
                            booking_id,
                            original_partner_id: attempt.original_partner_id,
                            original_vehicle_id: attempt.original_vehicle_id,
                            original_driver_id: attempt.original_driver_id,
                            service_type: attempt.service_type,
                            status: WaitlistStatus::Waiting,
                            reason: attempt.reason.clone(),
                            expires_at: now
                                + Duration::hours(env.config.system_waitlist_hours),
                            created_at: now,
                        };
                        attempt.phase = ResolutionPhase::Waitlisted { entry };
                        state.last_error = None;
                        SmallVec::new()
                    },
                }
            },
        }
    }
}

// ============================================================================
// Engine shell
// ============================================================================

/// Result of a resolution attempt, returned to the caller as auxiliary
/// information alongside the already-committed cancellation.
#[derive(Debug, Clone)]
pub enum ReassignmentOutcome {
    /// A substitute pairing was committed
    Reassigned {
        /// The booking with its new assignment, back in `Pending`
        booking: Booking,
    },
    /// No substitute anywhere; the booking sits in the system queue
    Waitlisted {
        /// The booking with its assignment cleared
        booking: Booking,
        /// The renewed waitlist entry
        entry: WaitlistEntry,
    },
}

/// Imperative shell around [`ReassignmentReducer`]: runs the catalog
/// queries, drives the phases, commits the result to the store.
#[derive(Clone)]
pub struct ReassignmentEngine {
    store: Arc<dyn BookingStore>,
    catalog: Arc<dyn ResourceCatalog>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    config: DispatchConfig,
    reducer: ReassignmentReducer,
}

impl ReassignmentEngine {
    /// Wire up the engine.
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        catalog: Arc<dyn ResourceCatalog>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            notifier,
            clock,
            config,
            reducer: ReassignmentReducer::new(),
        }
    }

    /// Search for a substitute pairing for `booking` and commit the result.
    ///
    /// Invoked after the triggering cancellation has already committed, as a
    /// best-effort recovery step: if this fails entirely the booking stays
    /// cancelled and unassigned, which is safe (nothing double-books), and
    /// the failure is logged at `error` for out-of-band alerting.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Store`] when a read or the final commit fails.
    #[instrument(skip(self, booking), fields(booking = %booking.id))]
    pub async fn reassign(
        &self,
        booking: &Booking,
        reason: &str,
    ) -> DispatchResult<ReassignmentOutcome> {
        let env = ReassignmentEnvironment::new(
            self.clock.clone(),
            self.notifier.clone(),
            self.config.clone(),
        );
        let mut state = ReassignmentState::new();
        let mut effects = self.reducer.reduce(
            &mut state,
            ReassignmentAction::Begin {
                booking: booking.clone(),
                reason: reason.to_owned(),
            },
            &env,
        );

        // Drive the search stages until the attempt settles. No waiting
        // between stages: an empty stage moves on immediately.
        loop {
            let (scope, partner, exclude_vehicle, exclude_driver) =
                match state.attempt(&booking.id) {
                    Some(attempt) => match attempt.phase {
                        ResolutionPhase::SearchLocal => (
                            SearchScope::Local,
                            attempt.original_partner_id,
                            attempt.original_vehicle_id,
                            attempt.original_driver_id,
                        ),
                        ResolutionPhase::SearchGlobal => (
                            SearchScope::Global,
                            None,
                            attempt.original_vehicle_id,
                            attempt.original_driver_id,
                        ),
                        _ => break,
                    },
                    None => break,
                };

            let vehicles = self
                .catalog
                .vehicles(&VehicleFilter::candidates(
                    partner,
                    booking.service_type,
                    exclude_vehicle,
                    self.config.candidate_cap,
                ))
                .await?;
            let drivers = self
                .catalog
                .drivers(&DriverFilter::candidates(
                    partner,
                    exclude_driver,
                    self.config.candidate_cap,
                ))
                .await?;

            effects = self.reducer.reduce(
                &mut state,
                ReassignmentAction::CandidatesFound {
                    booking_id: booking.id,
                    scope,
                    vehicles,
                    drivers,
                },
                &env,
            );
        }

        let outcome = match state.attempt(&booking.id).map(|a| a.phase.clone()) {
            Some(ResolutionPhase::Reassigned { vehicle, driver_id }) => {
                let committed = self.commit_reassignment(booking.id, &vehicle, driver_id).await;
                if let Err(error) = &committed {
                    error!(
                        booking = %booking.id, %error,
                        "reassignment commit failed; booking remains unassigned, alert operations"
                    );
                }
                let booking = committed?;
                metrics::counter!("fleetline_reassignments_total", "outcome" => "reassigned")
                    .increment(1);
                ReassignmentOutcome::Reassigned { booking }
            },
            Some(ResolutionPhase::Waitlisted { entry }) => {
                let booking = self.commit_waitlist_fallback(&entry).await?;
                metrics::counter!("fleetline_reassignments_total", "outcome" => "waitlisted")
                    .increment(1);
                metrics::counter!("fleetline_waitlist_total", "trigger" => "system").increment(1);
                ReassignmentOutcome::Waitlisted { booking, entry }
            },
            _ => {
                return Err(DispatchError::Validation(format!(
                    "resolution attempt for {} did not settle",
                    booking.id
                )));
            },
        };

        spawn_effects(effects);
        Ok(outcome)
    }

    /// Privileged direct assignment, bypassing the search.
    ///
    /// The driver defaults to the chosen vehicle's current driver unless
    /// explicitly overridden. Follows the same commit contract as automatic
    /// reassignment: closes any open waiting entry and notifies the client.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Validation`] when the vehicle does not belong to the
    /// partner or no driver can be determined; [`DispatchError::Store`] on
    /// write failure.
    #[instrument(skip(self, booking), fields(booking = %booking.id))]
    pub async fn manual_assign(
        &self,
        booking: &Booking,
        partner_id: PartnerId,
        vehicle_id: VehicleId,
        driver_override: Option<DriverId>,
    ) -> DispatchResult<Booking> {
        let vehicles = self
            .catalog
            .vehicles(&VehicleFilter {
                partner: Some(partner_id),
                ..VehicleFilter::default()
            })
            .await?;
        let vehicle = vehicles
            .into_iter()
            .find(|v| v.id == vehicle_id)
            .ok_or_else(|| {
                DispatchError::Validation(format!(
                    "vehicle {vehicle_id} does not belong to partner {partner_id}"
                ))
            })?;
        let driver_id = driver_override
            .or(vehicle.current_driver_id)
            .ok_or_else(|| {
                DispatchError::Validation(
                    "vehicle has no default driver; a driver must be supplied".into(),
                )
            })?;

        let env = ReassignmentEnvironment::new(
            self.clock.clone(),
            self.notifier.clone(),
            self.config.clone(),
        );
        let mut state = ReassignmentState::new();
        let effects = self.reducer.reduce(
            &mut state,
            ReassignmentAction::ManualAssign {
                booking: booking.clone(),
                vehicle: vehicle.clone(),
                driver_id,
            },
            &env,
        );

        let committed = self.commit_reassignment(booking.id, &vehicle, driver_id).await?;
        metrics::counter!("fleetline_reassignments_total", "outcome" => "manual").increment(1);
        spawn_effects(effects);
        Ok(committed)
    }

    async fn commit_reassignment(
        &self,
        booking_id: BookingId,
        vehicle: &Vehicle,
        driver_id: DriverId,
    ) -> DispatchResult<Booking> {
        // Ownership follows the substitute vehicle, which may move the
        // booking to a different partner than the original. Status returns
        // to Pending: the new partner must still act on it.
        let updated = self
            .store
            .update_booking(
                booking_id,
                BookingUpdate {
                    status: Some(BookingStatus::Pending),
                    assignment: Some(AssignmentChange::Assign {
                        vehicle_id: vehicle.id,
                        driver_id: Some(driver_id),
                        owner: OwnerScope::Partner(vehicle.partner_id),
                    }),
                },
            )
            .await?;

        if let Some(entry) = self.store.waiting_entry_for(booking_id).await? {
            self.store
                .update_waitlist_entry(entry.id, WaitlistStatus::Reassigned)
                .await?;
        }

        info!(
            booking = %booking_id,
            vehicle = %vehicle.id,
            partner = %vehicle.partner_id,
            "substitute pairing committed"
        );
        Ok(updated)
    }

    async fn commit_waitlist_fallback(&self, entry: &WaitlistEntry) -> DispatchResult<Booking> {
        self.store.insert_waitlist_entry(entry.clone()).await?;
        let updated = self
            .store
            .update_booking(
                entry.booking_id,
                BookingUpdate {
                    status: Some(BookingStatus::Pending),
                    assignment: Some(AssignmentChange::ClearToSystemQueue),
                },
            )
            .await?;

        info!(
            booking = %entry.booking_id,
            expires_at = %entry.expires_at,
            "no substitute found; booking parked in the system queue"
        );
        Ok(updated)
    }
}

/// Execute effects without awaiting them. Only `Future` effects carry side
/// work here; feedback actions are not re-dispatched.
fn spawn_effects<A: Send + 'static>(effects: SmallVec<[Effect<A>; 4]>) {
    for effect in effects {
        spawn_effect(effect);
    }
}

fn spawn_effect<A: Send + 'static>(effect: Effect<A>) {
    match effect {
        Effect::None | Effect::Delay { .. } => {},
        Effect::Parallel(inner) | Effect::Sequential(inner) => {
            for effect in inner {
                spawn_effect(effect);
            }
        },
        Effect::Future(future) => {
            tokio::spawn(async move {
                let _ = future.await;
            });
        },
    }
}
