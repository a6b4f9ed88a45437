//! Domain types for the Fleetline dispatch core.
//!
//! Value objects and entities shared by the conflict detector, the
//! allocation engine, and the reassignment engine. Everything here is plain
//! owned data; ownership of vehicles and drivers lives with fleet management,
//! which this core only ever reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a booking
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(Uuid);

impl BookingId {
    /// Creates a new random `BookingId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `BookingId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a vehicle
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleId(Uuid);

impl VehicleId {
    /// Creates a new random `VehicleId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `VehicleId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for VehicleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a driver
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DriverId(Uuid);

impl DriverId {
    /// Creates a new random `DriverId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `DriverId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for DriverId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a partner (fleet-owning business entity)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartnerId(Uuid);

impl PartnerId {
    /// Creates a new random `PartnerId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `PartnerId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for PartnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PartnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a waitlist entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaitlistEntryId(Uuid);

impl WaitlistEntryId {
    /// Creates a new random `WaitlistEntryId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WaitlistEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WaitlistEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable booking code shown to clients and partners.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingCode(String);

impl BookingCode {
    /// Derive the code from a booking id (`BK-` plus the first eight hex
    /// digits, uppercased).
    #[must_use]
    pub fn from_booking_id(id: BookingId) -> Self {
        let hex = id.as_uuid().simple().to_string();
        Self(format!("BK-{}", hex[..8].to_uppercase()))
    }

    /// The code as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// The two services a booking can request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    /// Multi-day vehicle rental
    Rental,
    /// Point-to-point transfer
    Transfer,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rental => write!(f, "rental"),
            Self::Transfer => write!(f, "transfer"),
        }
    }
}

/// Lifecycle status of a booking. Bookings are never deleted; cancellation
/// and completion are terminal transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Created, awaiting partner confirmation
    Pending,
    /// Confirmed by the owning partner
    Confirmed,
    /// Cancelled by a client, a partner, or an operator
    Cancelled,
    /// Trip finished
    Completed,
}

impl BookingStatus {
    /// Whether this status can still occupy a vehicle.
    #[must_use]
    pub const fn occupies(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Whether this status is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Who operates on a booking.
///
/// `System` replaces the legacy "null partner" convention: a booking in the
/// system queue is invisible to every partner and may only be resolved by
/// system operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnerScope {
    /// Owned by a partner's operational queue
    Partner(PartnerId),
    /// Awaiting system-level reassignment
    System,
}

impl OwnerScope {
    /// The owning partner, if any.
    #[must_use]
    pub const fn partner_id(self) -> Option<PartnerId> {
        match self {
            Self::Partner(id) => Some(id),
            Self::System => None,
        }
    }

    /// Whether the booking sits in the system queue.
    #[must_use]
    pub const fn is_system(self) -> bool {
        matches!(self, Self::System)
    }
}

/// Operational status of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleStatus {
    /// In service
    Active,
    /// Parked, not offered
    Inactive,
    /// In the workshop
    Maintenance,
}

/// Which services a vehicle is offered for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    /// Rentals only
    Rental,
    /// Transfers only
    Transfer,
    /// Both services
    Both,
}

impl Availability {
    /// Whether a vehicle with this availability can serve the given service.
    #[must_use]
    pub const fn supports(self, service: ServiceType) -> bool {
        match self {
            Self::Both => true,
            Self::Rental => matches!(service, ServiceType::Rental),
            Self::Transfer => matches!(service, ServiceType::Transfer),
        }
    }
}

/// Account status of a partner. Confirmation is blocked while the partner is
/// still pending approval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartnerStatus {
    /// Fully onboarded
    Approved,
    /// Signed up, not yet vetted
    PendingApproval,
    /// Disabled by operations
    Suspended,
}

/// Status of a waitlist entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitlistStatus {
    /// Awaiting a substitute assignment
    Waiting,
    /// A substitute was committed
    Reassigned,
    /// Expired without resolution
    Expired,
}

// ============================================================================
// Time windows
// ============================================================================

/// Half-open occupancy interval `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Inclusive start
    pub start: DateTime<Utc>,
    /// Exclusive end
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build a window, rejecting empty or inverted intervals.
    #[must_use]
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Half-open interval overlap: `a.start < b.end && b.start < a.end`.
    ///
    /// Back-to-back windows (one ending exactly where the other starts) do
    /// not overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A client's request for a vehicle over a time window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    /// Opaque identity
    pub id: BookingId,
    /// Human-readable code
    pub code: BookingCode,
    /// Requested service
    pub service_type: ServiceType,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Occupancy window (absent only on malformed legacy rows)
    pub window: Option<TimeWindow>,
    /// Assigned vehicle, if any
    pub vehicle_id: Option<VehicleId>,
    /// Assigned driver, if any
    pub driver_id: Option<DriverId>,
    /// Which queue operates on this booking
    pub owner: OwnerScope,
    /// When the booking was taken in
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// The vehicle and window this booking occupies, if it occupies one at
    /// all: only pending/confirmed bookings with an assignment hold a
    /// vehicle.
    #[must_use]
    pub fn occupancy(&self) -> Option<(VehicleId, TimeWindow)> {
        if !self.status.occupies() {
            return None;
        }
        match (self.vehicle_id, self.window) {
            (Some(vehicle), Some(window)) => Some((vehicle, window)),
            _ => None,
        }
    }
}

/// Intake draft for a new booking. The vehicle is tentatively chosen
/// upstream by search; the end time may be left open and is defaulted per
/// service type on intake.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookingDraft {
    /// Requested service
    pub service_type: ServiceType,
    /// Trip start
    pub start: DateTime<Utc>,
    /// Trip end; defaulted when absent
    pub end: Option<DateTime<Utc>>,
    /// Tentatively chosen vehicle (required)
    pub vehicle_id: Option<VehicleId>,
    /// Driver suggested upstream, usually the vehicle's default
    pub driver_id: Option<DriverId>,
    /// Owning partner of the chosen vehicle
    pub partner_id: Option<PartnerId>,
}

/// Read-only view of a vehicle. Owned by fleet management.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Identity
    pub id: VehicleId,
    /// Owning fleet
    pub partner_id: PartnerId,
    /// Default driver, if one is attached
    pub current_driver_id: Option<DriverId>,
    /// Operational status
    pub status: VehicleStatus,
    /// Services this vehicle is offered for
    pub available_for: Availability,
}

/// Read-only view of a driver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    /// Identity
    pub id: DriverId,
    /// Owning fleet
    pub partner_id: PartnerId,
    /// Whether the driver currently takes jobs
    pub is_active: bool,
}

/// Read-only view of a partner account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    /// Identity
    pub id: PartnerId,
    /// Display name
    pub name: String,
    /// Account status
    pub status: PartnerStatus,
}

/// Deferred-resolution record created when no resource is immediately
/// available.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    /// Identity
    pub id: WaitlistEntryId,
    /// The booking awaiting resolution
    pub booking_id: BookingId,
    /// Partner at the time of waitlisting
    pub original_partner_id: Option<PartnerId>,
    /// Vehicle at the time of waitlisting
    pub original_vehicle_id: Option<VehicleId>,
    /// Driver at the time of waitlisting
    pub original_driver_id: Option<DriverId>,
    /// Service of the underlying booking
    pub service_type: ServiceType,
    /// Resolution status
    pub status: WaitlistStatus,
    /// Free-text cause, e.g. "vehicle busy (user-selected)"
    pub reason: String,
    /// Horizon after which an external sweep may expire the entry
    pub expires_at: DateTime<Utc>,
    /// When the entry was created
    pub created_at: DateTime<Utc>,
}

impl WaitlistEntry {
    /// Snapshot a booking into a fresh `Waiting` entry.
    #[must_use]
    pub fn for_booking(
        booking: &Booking,
        reason: impl Into<String>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: WaitlistEntryId::new(),
            booking_id: booking.id,
            original_partner_id: booking.owner.partner_id(),
            original_vehicle_id: booking.vehicle_id,
            original_driver_id: booking.driver_id,
            service_type: booking.service_type,
            status: WaitlistStatus::Waiting,
            reason: reason.into(),
            expires_at,
            created_at: now,
        }
    }

    /// The expiry sweep is external and not guaranteed to run promptly, so a
    /// `Waiting` entry past its horizon is ambiguous. Readers must treat a
    /// stale entry as "needs fresh resolution", never as authoritative.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.status == WaitlistStatus::Waiting && self.expires_at < now
    }
}
