//! Resource catalog seam.
//!
//! Read-only view of vehicles, drivers, and partner accounts. Fleet
//! management owns this data; the dispatch core only queries it, mainly from
//! the reassignment search and the confirmation guard.

use crate::store::StoreError;
use crate::types::{
    Driver, DriverId, Partner, PartnerId, ServiceType, Vehicle, VehicleId, VehicleStatus,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Vehicle query. All fields conjunctive; `None` means "don't care".
#[derive(Debug, Clone, Default)]
pub struct VehicleFilter {
    /// Only vehicles owned by this partner
    pub partner: Option<PartnerId>,
    /// Only vehicles in this operational status
    pub status: Option<VehicleStatus>,
    /// Only vehicles whose availability supports this service
    pub service: Option<ServiceType>,
    /// Exclude this vehicle (the one being replaced)
    pub exclude: Option<VehicleId>,
    /// Cap the result list
    pub limit: Option<usize>,
}

impl VehicleFilter {
    /// Candidate filter used by the reassignment search: active vehicles
    /// compatible with the service, minus the vehicle being replaced.
    #[must_use]
    pub fn candidates(
        partner: Option<PartnerId>,
        service: ServiceType,
        exclude: Option<VehicleId>,
        limit: usize,
    ) -> Self {
        Self {
            partner,
            status: Some(VehicleStatus::Active),
            service: Some(service),
            exclude,
            limit: Some(limit),
        }
    }

    fn matches(&self, vehicle: &Vehicle) -> bool {
        if self.partner.is_some_and(|p| vehicle.partner_id != p) {
            return false;
        }
        if self.status.is_some_and(|s| vehicle.status != s) {
            return false;
        }
        if self
            .service
            .is_some_and(|service| !vehicle.available_for.supports(service))
        {
            return false;
        }
        if self.exclude.is_some_and(|id| vehicle.id == id) {
            return false;
        }
        true
    }
}

/// Driver query. All fields conjunctive; `None` means "don't care".
#[derive(Debug, Clone, Default)]
pub struct DriverFilter {
    /// Only drivers employed by this partner
    pub partner: Option<PartnerId>,
    /// Only drivers currently taking jobs
    pub active_only: bool,
    /// Exclude this driver (the one being replaced)
    pub exclude: Option<DriverId>,
    /// Cap the result list
    pub limit: Option<usize>,
}

impl DriverFilter {
    /// Candidate filter used by the reassignment search: active drivers,
    /// minus the driver being replaced.
    #[must_use]
    pub const fn candidates(
        partner: Option<PartnerId>,
        exclude: Option<DriverId>,
        limit: usize,
    ) -> Self {
        Self {
            partner,
            active_only: true,
            exclude,
            limit: Some(limit),
        }
    }

    fn matches(&self, driver: &Driver) -> bool {
        if self.partner.is_some_and(|p| driver.partner_id != p) {
            return false;
        }
        if self.active_only && !driver.is_active {
            return false;
        }
        if self.exclude.is_some_and(|id| driver.id == id) {
            return false;
        }
        true
    }
}

/// Read-only catalog of fleet resources.
#[async_trait]
pub trait ResourceCatalog: Send + Sync {
    /// Vehicles matching the filter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn vehicles(&self, filter: &VehicleFilter) -> Result<Vec<Vehicle>, StoreError>;

    /// Drivers matching the filter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn drivers(&self, filter: &DriverFilter) -> Result<Vec<Driver>, StoreError>;

    /// Partner account by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn partner(&self, id: PartnerId) -> Result<Option<Partner>, StoreError>;
}

#[derive(Default)]
struct Fleet {
    vehicles: Vec<Vehicle>,
    drivers: Vec<Driver>,
    partners: HashMap<PartnerId, Partner>,
}

/// In-memory catalog for tests and the demo binary. Insertion order is
/// preserved, which makes "first candidate" deterministic under test.
#[derive(Default)]
pub struct InMemoryCatalog {
    fleet: RwLock<Fleet>,
}

impl InMemoryCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a vehicle.
    pub async fn add_vehicle(&self, vehicle: Vehicle) {
        self.fleet.write().await.vehicles.push(vehicle);
    }

    /// Register a driver.
    pub async fn add_driver(&self, driver: Driver) {
        self.fleet.write().await.drivers.push(driver);
    }

    /// Register a partner account.
    pub async fn add_partner(&self, partner: Partner) {
        self.fleet.write().await.partners.insert(partner.id, partner);
    }
}

#[async_trait]
impl ResourceCatalog for InMemoryCatalog {
    async fn vehicles(&self, filter: &VehicleFilter) -> Result<Vec<Vehicle>, StoreError> {
        let fleet = self.fleet.read().await;
        let mut rows: Vec<Vehicle> = fleet
            .vehicles
            .iter()
            .filter(|vehicle| filter.matches(vehicle))
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn drivers(&self, filter: &DriverFilter) -> Result<Vec<Driver>, StoreError> {
        let fleet = self.fleet.read().await;
        let mut rows: Vec<Driver> = fleet
            .drivers
            .iter()
            .filter(|driver| filter.matches(driver))
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn partner(&self, id: PartnerId) -> Result<Option<Partner>, StoreError> {
        let fleet = self.fleet.read().await;
        Ok(fleet.partners.get(&id).cloned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Availability;

    fn vehicle(partner: PartnerId, status: VehicleStatus, available_for: Availability) -> Vehicle {
        Vehicle {
            id: VehicleId::new(),
            partner_id: partner,
            current_driver_id: None,
            status,
            available_for,
        }
    }

    #[tokio::test]
    async fn candidate_filter_excludes_unavailable_vehicles() {
        let catalog = InMemoryCatalog::new();
        let partner = PartnerId::new();
        let other_partner = PartnerId::new();

        let good = vehicle(partner, VehicleStatus::Active, Availability::Both);
        let good_id = good.id;
        catalog.add_vehicle(good).await;
        catalog
            .add_vehicle(vehicle(partner, VehicleStatus::Maintenance, Availability::Both))
            .await;
        catalog
            .add_vehicle(vehicle(partner, VehicleStatus::Active, Availability::Rental))
            .await;
        catalog
            .add_vehicle(vehicle(other_partner, VehicleStatus::Active, Availability::Both))
            .await;

        let found = catalog
            .vehicles(&VehicleFilter::candidates(
                Some(partner),
                ServiceType::Transfer,
                None,
                10,
            ))
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, good_id);
    }

    #[tokio::test]
    async fn candidate_filter_excludes_the_original_resource() {
        let catalog = InMemoryCatalog::new();
        let partner = PartnerId::new();
        let original = vehicle(partner, VehicleStatus::Active, Availability::Both);
        let original_id = original.id;
        catalog.add_vehicle(original).await;

        let found = catalog
            .vehicles(&VehicleFilter::candidates(
                Some(partner),
                ServiceType::Transfer,
                Some(original_id),
                10,
            ))
            .await
            .unwrap();

        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn driver_candidates_respect_activity_and_cap() {
        let catalog = InMemoryCatalog::new();
        let partner = PartnerId::new();
        for active in [true, true, true, false] {
            catalog
                .add_driver(Driver {
                    id: DriverId::new(),
                    partner_id: partner,
                    is_active: active,
                })
                .await;
        }

        let found = catalog
            .drivers(&DriverFilter::candidates(Some(partner), None, 2))
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|driver| driver.is_active));
    }

    #[tokio::test]
    async fn unscoped_filter_searches_the_whole_fleet() {
        let catalog = InMemoryCatalog::new();
        for _ in 0..3 {
            catalog
                .add_vehicle(vehicle(PartnerId::new(), VehicleStatus::Active, Availability::Both))
                .await;
        }

        let found = catalog
            .vehicles(&VehicleFilter::candidates(None, ServiceType::Rental, None, 10))
            .await
            .unwrap();

        assert_eq!(found.len(), 3);
    }
}
