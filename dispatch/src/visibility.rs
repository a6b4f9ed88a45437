//! Visibility and confirmation rules.
//!
//! Bookings that are waitlisted or parked in the system queue are an internal
//! operational concern: partners must not see them (and must not be able to
//! confirm them) until dispatch has resolved a real assignment. The rules are
//! pure predicates over a booking plus its waitlist status; the service layer
//! supplies both and turns a refusal into [`DispatchError::AccessDenied`] or
//! [`DispatchError::ConflictPolicy`].

use crate::error::{DispatchError, DispatchResult};
use crate::types::{Booking, BookingStatus, OwnerScope, Partner, PartnerId, PartnerStatus};

/// Who is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// Internal operator or automated job; sees everything
    System,
    /// A partner account; sees only its own unrestricted bookings
    Partner(PartnerId),
}

impl Caller {
    /// Whether the caller has operator privileges.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }
}

/// Whether a booking is restricted to system operators: it either sits in
/// the system queue (no owning partner) or has an open waiting entry.
#[must_use]
pub const fn is_restricted(booking: &Booking, has_waiting_entry: bool) -> bool {
    booking.owner.is_system() || has_waiting_entry
}

/// Whether `caller` may see `booking`. `has_waiting_entry` is the booking's
/// current waitlist status, looked up by the caller.
#[must_use]
pub fn can_view(caller: Caller, booking: &Booking, has_waiting_entry: bool) -> bool {
    match caller {
        Caller::System => true,
        Caller::Partner(partner_id) => {
            booking.owner == OwnerScope::Partner(partner_id)
                && !is_restricted(booking, has_waiting_entry)
        },
    }
}

/// Like [`can_view`], but an explicit refusal instead of silent omission.
/// Single-booking reads use this; list endpoints filter silently.
///
/// # Errors
///
/// [`DispatchError::AccessDenied`] when the caller may not see the booking.
pub fn ensure_can_view(
    caller: Caller,
    booking: &Booking,
    has_waiting_entry: bool,
) -> DispatchResult<()> {
    if can_view(caller, booking, has_waiting_entry) {
        Ok(())
    } else {
        Err(DispatchError::AccessDenied(format!(
            "booking {} is not visible to this caller",
            booking.id
        )))
    }
}

/// Gate on the pending -> confirmed transition.
///
/// A booking can be confirmed only when it is `Pending`, has no open waiting
/// entry, is owned by a partner, and that partner is approved. Everything
/// else is a policy refusal, not a missing-data error.
///
/// # Errors
///
/// [`DispatchError::ConflictPolicy`] naming the first violated rule.
pub fn ensure_confirmable(
    booking: &Booking,
    has_waiting_entry: bool,
    owner: Option<&Partner>,
) -> DispatchResult<()> {
    if booking.status != BookingStatus::Pending {
        return Err(DispatchError::ConflictPolicy(format!(
            "booking {} is {} and cannot be confirmed",
            booking.id, booking.status
        )));
    }
    if has_waiting_entry {
        return Err(DispatchError::ConflictPolicy(format!(
            "booking {} is waitlisted; resolve the assignment first",
            booking.id
        )));
    }
    let Some(partner) = owner else {
        return Err(DispatchError::ConflictPolicy(format!(
            "booking {} sits in the system queue and has no confirming partner",
            booking.id
        )));
    };
    if partner.status != PartnerStatus::Approved {
        return Err(DispatchError::ConflictPolicy(format!(
            "partner {} is not approved and cannot confirm bookings",
            partner.id
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{BookingCode, BookingId, ServiceType, TimeWindow};
    use chrono::{DateTime, Utc};

    fn t(hour: u32) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&format!("2025-06-01T{hour:02}:00:00Z"))
            .unwrap()
            .with_timezone(&Utc)
    }

    fn booking(owner: OwnerScope, status: BookingStatus) -> Booking {
        let id = BookingId::new();
        Booking {
            id,
            code: BookingCode::from_booking_id(id),
            service_type: ServiceType::Transfer,
            status,
            window: TimeWindow::new(t(10), t(14)),
            vehicle_id: None,
            driver_id: None,
            owner,
            created_at: t(8),
        }
    }

    fn approved_partner(id: PartnerId) -> Partner {
        Partner {
            id,
            name: "Luxe Rides GmbH".into(),
            status: PartnerStatus::Approved,
        }
    }

    #[test]
    fn system_sees_everything() {
        let system_queued = booking(OwnerScope::System, BookingStatus::Pending);
        assert!(can_view(Caller::System, &system_queued, true));
    }

    #[test]
    fn partner_sees_own_unrestricted_booking() {
        let partner = PartnerId::new();
        let own = booking(OwnerScope::Partner(partner), BookingStatus::Pending);
        assert!(can_view(Caller::Partner(partner), &own, false));
    }

    #[test]
    fn partner_cannot_see_waitlisted_booking_even_if_own() {
        let partner = PartnerId::new();
        let own = booking(OwnerScope::Partner(partner), BookingStatus::Pending);
        assert!(!can_view(Caller::Partner(partner), &own, true));
        assert!(matches!(
            ensure_can_view(Caller::Partner(partner), &own, true),
            Err(DispatchError::AccessDenied(_))
        ));
    }

    #[test]
    fn partner_cannot_see_system_queue_or_foreign_bookings() {
        let partner = PartnerId::new();
        let queued = booking(OwnerScope::System, BookingStatus::Pending);
        let foreign = booking(OwnerScope::Partner(PartnerId::new()), BookingStatus::Pending);
        assert!(!can_view(Caller::Partner(partner), &queued, false));
        assert!(!can_view(Caller::Partner(partner), &foreign, false));
    }

    #[test]
    fn pending_owned_booking_with_approved_partner_is_confirmable() {
        let partner_id = PartnerId::new();
        let b = booking(OwnerScope::Partner(partner_id), BookingStatus::Pending);
        assert!(ensure_confirmable(&b, false, Some(&approved_partner(partner_id))).is_ok());
    }

    #[test]
    fn waitlisted_booking_cannot_be_confirmed() {
        let partner_id = PartnerId::new();
        let b = booking(OwnerScope::Partner(partner_id), BookingStatus::Pending);
        assert!(matches!(
            ensure_confirmable(&b, true, Some(&approved_partner(partner_id))),
            Err(DispatchError::ConflictPolicy(_))
        ));
    }

    #[test]
    fn system_queue_booking_cannot_be_confirmed() {
        let b = booking(OwnerScope::System, BookingStatus::Pending);
        assert!(matches!(
            ensure_confirmable(&b, false, None),
            Err(DispatchError::ConflictPolicy(_))
        ));
    }

    #[test]
    fn unapproved_partner_cannot_confirm() {
        let partner_id = PartnerId::new();
        let b = booking(OwnerScope::Partner(partner_id), BookingStatus::Pending);
        let mut partner = approved_partner(partner_id);
        partner.status = PartnerStatus::PendingApproval;
        assert!(matches!(
            ensure_confirmable(&b, false, Some(&partner)),
            Err(DispatchError::ConflictPolicy(_))
        ));
    }

    #[test]
    fn non_pending_booking_cannot_be_confirmed() {
        let partner_id = PartnerId::new();
        for status in [
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            BookingStatus::Completed,
        ] {
            let b = booking(OwnerScope::Partner(partner_id), status);
            assert!(matches!(
                ensure_confirmable(&b, false, Some(&approved_partner(partner_id))),
                Err(DispatchError::ConflictPolicy(_))
            ));
        }
    }
}
