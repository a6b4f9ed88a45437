//! Given-When-Then harness for reducers.
//!
//! Supports dispatching a sequence of actions, which the phased engines need:
//! a reassignment attempt is `Begin` followed by one `CandidatesFound` per
//! search stage, and assertions run against the final state and the effects
//! of the last action.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use fleetline_core::{effect::Effect, reducer::Reducer};

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Fluent reducer test builder.
///
/// # Example
///
/// ```ignore
/// ReducerTest::new(ReassignmentReducer::new())
///     .with_env(test_env())
///     .given_state(ReassignmentState::new())
///     .when_action(ReassignmentAction::Begin { booking, reason })
///     .when_action(ReassignmentAction::CandidatesFound { .. })
///     .then_state(|state| assert!(state.attempt(&id).is_some()))
///     .then_effects(assertions::assert_no_effects)
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    actions: Vec<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Create a new test around the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Queue an action to dispatch (When). May be called repeatedly; actions
    /// are dispatched in order.
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Assert on the final state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Assert on the effects returned by the *last* dispatched action (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Dispatch the queued actions and execute all assertions.
    ///
    /// # Panics
    ///
    /// Panics if initial state, environment, or at least one action is not
    /// set, or if any assertion fails.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        assert!(
            !self.actions.is_empty(),
            "At least one action must be queued with when_action()"
        );

        let mut last_effects = smallvec::SmallVec::new();
        for action in self.actions {
            last_effects = self.reducer.reduce(&mut state, action, &env);
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }

        for assertion in self.effect_assertions {
            assertion(&last_effects);
        }
    }
}

/// Helper assertions for effect lists.
pub mod assertions {
    use fleetline_core::effect::Effect;

    /// Assert that there are no effects (or only `Effect::None`).
    ///
    /// # Panics
    ///
    /// Panics if a non-trivial effect is present.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.is_empty() || matches!(effects, [Effect::None]),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects.
    ///
    /// # Panics
    ///
    /// Panics if the count does not match.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that at least one `Effect::Future` is present (the shape every
    /// fire-and-forget notification takes).
    ///
    /// # Panics
    ///
    /// Panics if no Future effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(|e| matches!(e, Effect::Future(_))),
            "Expected at least one Future effect, but none found"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetline_core::effect::Effect;
    use fleetline_core::reducer::Reducer;
    use fleetline_core::{SmallVec, smallvec};

    #[derive(Clone, Debug, Default)]
    struct QueueState {
        depth: usize,
    }

    #[derive(Clone, Debug)]
    enum QueueAction {
        Park,
        Release,
    }

    struct QueueReducer;

    impl Reducer for QueueReducer {
        type State = QueueState;
        type Action = QueueAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                QueueAction::Park => {
                    state.depth += 1;
                    smallvec![Effect::fire_and_forget(async {})]
                },
                QueueAction::Release => {
                    state.depth = state.depth.saturating_sub(1);
                    smallvec![Effect::None]
                },
            }
        }
    }

    #[test]
    fn single_action_flow() {
        ReducerTest::new(QueueReducer)
            .with_env(())
            .given_state(QueueState::default())
            .when_action(QueueAction::Park)
            .then_state(|state| assert_eq!(state.depth, 1))
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn action_sequence_asserts_on_last_effects() {
        ReducerTest::new(QueueReducer)
            .with_env(())
            .given_state(QueueState::default())
            .when_action(QueueAction::Park)
            .when_action(QueueAction::Park)
            .when_action(QueueAction::Release)
            .then_state(|state| assert_eq!(state.depth, 1))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn release_saturates_at_zero() {
        ReducerTest::new(QueueReducer)
            .with_env(())
            .given_state(QueueState::default())
            .when_action(QueueAction::Release)
            .then_state(|state| assert_eq!(state.depth, 0))
            .run();
    }
}
