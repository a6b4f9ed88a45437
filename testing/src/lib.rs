//! # Fleetline Testing
//!
//! Testing utilities for the Fleetline dispatch architecture.
//!
//! This crate provides:
//! - Mock implementations of environment traits ([`mocks::FixedClock`])
//! - A Given-When-Then harness for pure reducers ([`ReducerTest`])
//! - Assertion helpers for effect lists ([`assertions`])
//!
//! Reducers carry all of the allocation and reassignment policy, so most of
//! the interesting coverage in the workspace runs through this harness with
//! no async runtime at all.

use chrono::{DateTime, Utc};
use fleetline_core::environment::Clock;

pub mod reducer_test;

pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Deterministic clock that always reports the same instant.
    ///
    /// Waitlist horizons and window defaulting are all derived from
    /// `Clock::now()`, so tests pin the clock to assert exact expiries.
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock reporting the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Default fixed clock for tests (2025-06-01 09:00:00 UTC).
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which should never
    /// happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-06-01T09:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::{FixedClock, test_clock};
    use chrono::Utc;
    use fleetline_core::environment::Clock;

    #[test]
    fn fixed_clock_never_advances() {
        let clock = FixedClock::new(Utc::now());
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_clock_reports_the_pinned_instant() {
        let clock = test_clock();
        assert_eq!(clock.now().to_rfc3339(), "2025-06-01T09:00:00+00:00");
    }
}
