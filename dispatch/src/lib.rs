//! Fleetline dispatch - resource allocation and waitlist reassignment core
//!
//! This crate is the booking platform's dispatch heart: it decides which
//! vehicle serves which booking, what happens when a wanted vehicle is busy,
//! and how a cancelled booking's demand gets re-routed through the fleet.
//!
//! # Architecture
//!
//! ```text
//!                       ┌────────────────────┐
//!   BookingDraft ──────►│  AllocationEngine  │────► Booking (Pending)
//!                       │  (atomic window    │  └─► WaitlistEntry (busy
//!                       │   claim)           │       vehicle, 48h)
//!                       └────────────────────┘
//!
//!   Cancel ────────────►┌────────────────────┐
//!                       │ ReassignmentEngine │  pure ReassignmentReducer:
//!                       │ (imperative shell) │  SearchLocal → SearchGlobal
//!                       └─────────┬──────────┘    → Reassigned | Waitlisted
//!                                 │
//!                ┌────────────────┼────────────────┐
//!                ▼                ▼                ▼
//!          BookingStore    ResourceCatalog   NotificationSink
//!          (claim/update)  (vehicles,        (fire-and-forget)
//!                           drivers,
//!                           partners)
//! ```
//!
//! # Key Rules
//!
//! ## 1. Optimistic Admission
//!
//! Intake never rejects a busy vehicle. The booking is persisted either way;
//! a busy claim parks it on the waitlist, because a cancellation elsewhere
//! may free the resource before trip time. The conflict check and the insert
//! are one atomic store operation, so concurrent intakes cannot both win the
//! same window.
//!
//! ## 2. Locality-First Reassignment
//!
//! A cancelled booking's demand is re-routed in two stages: the original
//! partner's fleet first, then the whole catalog. First candidate of each
//! list wins. When both stages come up empty the booking moves to the system
//! queue (owner [`types::OwnerScope::System`]) with a renewed 24h waitlist
//! entry.
//!
//! ## 3. Restricted Visibility
//!
//! Waitlisted and system-queue bookings are an internal operational concern:
//! partner callers never see them, and the confirmation guard refuses to
//! confirm them.
//!
//! # Usage
//!
//! [`DispatchService`] is the entry point; see `src/bin/demo.rs` for a wired
//! end-to-end flow over the in-memory collaborators.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod allocation;
pub mod catalog;
pub mod config;
pub mod conflict;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod reassignment;
pub mod service;
pub mod store;
pub mod types;
pub mod visibility;

pub use allocation::{AllocationEngine, AllocationOutcome};
pub use catalog::{DriverFilter, InMemoryCatalog, ResourceCatalog, VehicleFilter};
pub use config::DispatchConfig;
pub use conflict::ConflictDetector;
pub use error::{DispatchError, DispatchResult};
pub use notify::{NotificationKind, NotificationSink, TracingNotifier};
pub use reassignment::{ReassignmentEngine, ReassignmentOutcome, ReassignmentReducer};
pub use service::{CancellationOutcome, DispatchService};
pub use store::{BookingFilter, BookingStore, InMemoryBookingStore, StoreError};
pub use types::*;
pub use visibility::Caller;
