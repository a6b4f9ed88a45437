//! # Fleetline Core
//!
//! Core traits and types for the Fleetline dispatch architecture.
//!
//! Fleetline's engines follow a "functional core, imperative shell" split:
//! business decisions live in pure [`reducer::Reducer`] implementations, and
//! the async engine shells gather inputs (store reads, catalog queries), feed
//! them to the reducer as actions, and persist whatever the reducer decided.
//!
//! ## Core Concepts
//!
//! - **State**: in-flight domain state for an engine
//! - **Action**: all possible inputs to a reducer (commands and events)
//! - **Reducer**: pure function `(State, Action, Environment) → Effects`
//! - **Effect**: side-effect descriptions (not execution)
//! - **Environment**: injected dependencies via traits
//!
//! Keeping the decision logic pure means every branch of the allocation and
//! reassignment policies can be exercised without a store, a catalog, or a
//! running notification sink.

// Re-export commonly used types so downstream crates share one surface.
pub use chrono::{DateTime, Utc};
pub use smallvec::{SmallVec, smallvec};

/// The core trait for business logic.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// A pure state transition function.
    ///
    /// Reducers validate an action, update state in place, and return
    /// descriptions of the side effects the shell should execute. They must
    /// not perform I/O themselves; anything async arrives as an action and
    /// leaves as an [`Effect`].
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects.
        ///
        /// Most reductions produce zero or one effect; the inline capacity
        /// of four keeps the common path allocation-free.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Side-effect descriptions returned by reducers.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// Describes a side effect to be executed by the engine shell.
    ///
    /// Effects are values, not execution. A reducer that wants to notify a
    /// client returns an `Effect::Future` wrapping the notification; the
    /// shell decides how (and whether) to run it. Futures resolve to an
    /// optional follow-up action for shells that drive a feedback loop.
    #[allow(missing_docs)]
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Run effects sequentially
        Sequential(Vec<Effect<Action>>),

        /// Delayed action (for timeouts, retries)
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after the delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the shell may feed the action
        /// back into the reducer.
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Wrap an async computation that produces no follow-up action.
        pub fn fire_and_forget<F>(future: F) -> Effect<Action>
        where
            F: Future<Output = ()> + Send + 'static,
        {
            Effect::Future(Box::pin(async move {
                future.await;
                None
            }))
        }
    }
}

/// Dependency injection traits shared by engine environments.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Abstracts time so reducers stay deterministic under test.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
