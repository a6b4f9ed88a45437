//! End-to-end dispatch demo over the in-memory collaborators.
//!
//! Seeds two partners with small fleets, then walks the core flows: direct
//! admission, waitlisting behind a busy vehicle, confirmation, cancellation
//! with locality-first reassignment, and the system-queue fallback.

use fleetline_core::environment::SystemClock;
use fleetline_dispatch::{
    Availability, BookingDraft, BookingFilter, Caller, DispatchConfig, DispatchService, Driver,
    DriverId, InMemoryBookingStore, InMemoryCatalog, Partner, PartnerId, PartnerStatus,
    ReassignmentOutcome, ServiceType, TracingNotifier, Vehicle, VehicleId, VehicleStatus,
    metrics::register_dispatch_metrics,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetline_dispatch=info,demo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    register_dispatch_metrics();

    info!("Starting Fleetline dispatch demo");

    let store = Arc::new(InMemoryBookingStore::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    let service = DispatchService::new(
        store,
        catalog.clone(),
        Arc::new(TracingNotifier),
        Arc::new(SystemClock),
        DispatchConfig::from_env(),
    );

    // Seed two partners: one with a spare vehicle, one with a single car.
    let coastal = PartnerId::new();
    let alpine = PartnerId::new();
    catalog
        .add_partner(Partner {
            id: coastal,
            name: "Coastal Shuttles".into(),
            status: PartnerStatus::Approved,
        })
        .await;
    catalog
        .add_partner(Partner {
            id: alpine,
            name: "Alpine Transfers".into(),
            status: PartnerStatus::Approved,
        })
        .await;

    let coastal_driver = seed_driver(&catalog, coastal).await;
    let coastal_spare_driver = seed_driver(&catalog, coastal).await;
    let coastal_car = seed_vehicle(&catalog, coastal, Some(coastal_driver)).await;
    let coastal_spare = seed_vehicle(&catalog, coastal, Some(coastal_spare_driver)).await;
    let alpine_driver = seed_driver(&catalog, alpine).await;
    let alpine_car = seed_vehicle(&catalog, alpine, Some(alpine_driver)).await;
    info!(%coastal_car, %coastal_spare, %alpine_car, "catalog seeded");

    let departure = Utc::now() + Duration::hours(6);

    // 1. Direct admission on a free vehicle.
    let first = service
        .create_booking(BookingDraft {
            service_type: ServiceType::Transfer,
            start: departure,
            end: None, // defaults to a four-hour occupancy
            vehicle_id: Some(coastal_car),
            driver_id: Some(coastal_driver),
            partner_id: Some(coastal),
        })
        .await?;
    info!(code = %first.booking.code, waitlisted = first.waitlisted, "first booking admitted");

    // 2. Same vehicle, overlapping window: admitted but waitlisted.
    let second = service
        .create_booking(BookingDraft {
            service_type: ServiceType::Transfer,
            start: departure + Duration::hours(1),
            end: None,
            vehicle_id: Some(coastal_car),
            driver_id: None,
            partner_id: Some(alpine),
        })
        .await?;
    info!(code = %second.booking.code, waitlisted = second.waitlisted, "second booking admitted");

    // 3. The owning partner confirms the first booking.
    let confirmed = service
        .confirm_booking(Caller::Partner(coastal), first.booking.id)
        .await?;
    info!(code = %confirmed.code, status = %confirmed.status, "first booking confirmed");

    // 4. Cancellation: the freed demand is re-routed inside Coastal's own
    //    fleet first (the spare car wins over Alpine's).
    let outcome = service
        .cancel_and_reassign(Caller::System, confirmed.id, "vehicle breakdown")
        .await?;
    match outcome.reassignment {
        Some(ReassignmentOutcome::Reassigned { booking }) => {
            info!(
                code = %booking.code,
                vehicle = ?booking.vehicle_id,
                "demand reassigned inside the original fleet"
            );
        },
        Some(ReassignmentOutcome::Waitlisted { booking, entry }) => {
            info!(code = %booking.code, expires_at = %entry.expires_at, "demand parked in the system queue");
        },
        None => info!("reassignment failed; booking stays cancelled and unassigned"),
    }

    // 5. What each caller sees.
    let operator_view = service
        .list_bookings(Caller::System, BookingFilter::default())
        .await?;
    let alpine_view = service
        .list_bookings(Caller::Partner(alpine), BookingFilter::default())
        .await?;
    info!(
        operator = operator_view.len(),
        alpine = alpine_view.len(),
        "visibility: operators see every booking, partners only their own unrestricted ones"
    );

    Ok(())
}

async fn seed_vehicle(
    catalog: &InMemoryCatalog,
    partner: PartnerId,
    driver: Option<DriverId>,
) -> VehicleId {
    let id = VehicleId::new();
    catalog
        .add_vehicle(Vehicle {
            id,
            partner_id: partner,
            current_driver_id: driver,
            status: VehicleStatus::Active,
            available_for: Availability::Both,
        })
        .await;
    id
}

async fn seed_driver(catalog: &InMemoryCatalog, partner: PartnerId) -> DriverId {
    let id = DriverId::new();
    catalog
        .add_driver(Driver {
            id,
            partner_id: partner,
            is_active: true,
        })
        .await;
    id
}
