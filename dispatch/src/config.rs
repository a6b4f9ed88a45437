//! Configuration for the dispatch core.
//!
//! Loads from environment variables with sensible defaults, so tests and the
//! demo binary run with no environment at all.

use serde::{Deserialize, Serialize};
use std::env;

/// Tunables for allocation and reassignment policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Waitlist horizon for user-initiated bookings on an intentionally busy
    /// vehicle, in hours (default 48)
    pub user_waitlist_hours: i64,
    /// Waitlist horizon for system-triggered waitlisting, in hours
    /// (default 24)
    pub system_waitlist_hours: i64,
    /// Maximum candidates fetched per catalog query during reassignment
    /// search (default 10)
    pub candidate_cap: usize,
    /// Default occupancy window for transfers without an end time, in hours
    /// (default 4)
    pub transfer_occupancy_hours: i64,
    /// Default occupancy window for rentals without an end time, in days
    /// (default 3)
    pub rental_default_days: i64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            user_waitlist_hours: 48,
            system_waitlist_hours: 24,
            candidate_cap: 10,
            transfer_occupancy_hours: 4,
            rental_default_days: 3,
        }
    }
}

impl DispatchConfig {
    /// Load configuration from `FLEETLINE_*` environment variables, falling
    /// back to the defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            user_waitlist_hours: env_or(
                "FLEETLINE_USER_WAITLIST_HOURS",
                defaults.user_waitlist_hours,
            ),
            system_waitlist_hours: env_or(
                "FLEETLINE_SYSTEM_WAITLIST_HOURS",
                defaults.system_waitlist_hours,
            ),
            candidate_cap: env_or("FLEETLINE_CANDIDATE_CAP", defaults.candidate_cap),
            transfer_occupancy_hours: env_or(
                "FLEETLINE_TRANSFER_OCCUPANCY_HOURS",
                defaults.transfer_occupancy_hours,
            ),
            rental_default_days: env_or(
                "FLEETLINE_RENTAL_DEFAULT_DAYS",
                defaults.rental_default_days,
            ),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
