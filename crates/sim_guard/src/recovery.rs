//! Pluggable recovery strategies.
//!
//! Strategies are registered once at boundary construction and are immutable
//! thereafter. On each handled error the chain walks strategies in
//! descending priority order; the first whose `can_handle` claims the error
//! has its `recover` invoked. Recovery is a best-effort side channel: its
//! outcome is recorded but never suppresses the error record or the health
//! update. If no strategy claims the error, the boundary falls back to
//! log-and-continue.

use std::cmp::Reverse;

use futures::future::BoxFuture;
use sim_ecs::World;
use tracing::debug;

use crate::record::{ErrorRecord, ErrorSource};

/// The result of one recovery attempt. A closed set: strategies report
/// success, failure, or hand back a future to finish the work off the hot
/// path.
pub enum RecoveryOutcome {
    /// The error condition was resolved synchronously.
    Recovered,
    /// The strategy ran but could not resolve the condition.
    Failed,
    /// Remaining work runs as a detached task; the boundary spawns it and
    /// the tick never awaits it. The future resolves to the final success
    /// flag.
    Deferred(BoxFuture<'static, bool>),
}

impl std::fmt::Debug for RecoveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecoveryOutcome::Recovered => "Recovered",
            RecoveryOutcome::Failed => "Failed",
            RecoveryOutcome::Deferred(_) => "Deferred(..)",
        };
        f.write_str(s)
    }
}

/// A pluggable handler attempting to resolve a specific error condition.
pub trait RecoveryStrategy: Send + Sync {
    /// Stable name, used in logs and recovery reports.
    fn name(&self) -> &'static str;

    /// Evaluation order: higher priority is consulted first.
    fn priority(&self) -> i32 {
        0
    }

    /// Whether this strategy claims the given error.
    fn can_handle(&self, record: &ErrorRecord) -> bool;

    /// Attempt recovery. Runs synchronously inside `handle_error`; long
    /// work should be returned as [`RecoveryOutcome::Deferred`].
    fn recover(&self, record: &ErrorRecord, world: &mut World) -> RecoveryOutcome;
}

/// The ordered strategy chain. Built once, immutable thereafter.
pub struct RecoveryChain {
    strategies: Vec<Box<dyn RecoveryStrategy>>,
}

impl RecoveryChain {
    /// Build a chain, sorting strategies by descending priority (stable for
    /// equal priorities).
    #[must_use]
    pub fn new(mut strategies: Vec<Box<dyn RecoveryStrategy>>) -> Self {
        strategies.sort_by_key(|s| Reverse(s.priority()));
        Self { strategies }
    }

    /// Offer an error to the chain. Returns the claiming strategy's name and
    /// its outcome, or `None` if no strategy claimed it.
    pub fn dispatch(
        &self,
        record: &ErrorRecord,
        world: &mut World,
    ) -> Option<(&'static str, RecoveryOutcome)> {
        for strategy in &self.strategies {
            if strategy.can_handle(record) {
                debug!(strategy = strategy.name(), "recovery strategy claimed error");
                return Some((strategy.name(), strategy.recover(record, world)));
            }
        }
        None
    }

    /// Number of registered strategies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether the chain has no strategies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl std::fmt::Debug for RecoveryChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("RecoveryChain").field("strategies", &names).finish()
    }
}

/// Built-in strategy: detach the faulty component from the implicated
/// entity. Handles component-localised errors; the entity stays alive and
/// drops out of systems that required the detached kind.
#[derive(Debug, Default)]
pub struct DetachComponent;

impl RecoveryStrategy for DetachComponent {
    fn name(&self) -> &'static str {
        "detach-component"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn can_handle(&self, record: &ErrorRecord) -> bool {
        record.context.source == ErrorSource::Component
            && record.context.entity.is_some()
            && record.context.component.is_some()
    }

    fn recover(&self, record: &ErrorRecord, world: &mut World) -> RecoveryOutcome {
        // can_handle guarantees both fields.
        let (Some(entity), Some(kind)) =
            (record.context.entity, record.context.component.as_deref())
        else {
            return RecoveryOutcome::Failed;
        };
        if world.remove_component_by_kind(entity, kind) {
            debug!(entity = %entity, kind, "faulty component detached");
            RecoveryOutcome::Recovered
        } else {
            RecoveryOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use sim_ecs::{Component, EntityId};

    use super::*;
    use crate::record::ErrorContext;

    struct Position;

    impl Component for Position {
        fn kind() -> &'static str {
            "Position"
        }
    }

    struct Claiming {
        name: &'static str,
        priority: i32,
        calls: Arc<AtomicUsize>,
    }

    impl RecoveryStrategy for Claiming {
        fn name(&self) -> &'static str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn can_handle(&self, _record: &ErrorRecord) -> bool {
            true
        }

        fn recover(&self, _record: &ErrorRecord, _world: &mut World) -> RecoveryOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            RecoveryOutcome::Recovered
        }
    }

    fn record(ctx: ErrorContext) -> ErrorRecord {
        ErrorRecord {
            context: ctx,
            message: "test".to_string(),
        }
    }

    #[test]
    fn test_highest_priority_strategy_wins() {
        let low_calls = Arc::new(AtomicUsize::new(0));
        let high_calls = Arc::new(AtomicUsize::new(0));
        let chain = RecoveryChain::new(vec![
            Box::new(Claiming {
                name: "low",
                priority: 1,
                calls: low_calls.clone(),
            }),
            Box::new(Claiming {
                name: "high",
                priority: 9,
                calls: high_calls.clone(),
            }),
        ]);

        let mut world = World::new();
        let result = chain.dispatch(&record(ErrorContext::global()), &mut world);
        assert_eq!(result.unwrap().0, "high");
        assert_eq!(high_calls.load(Ordering::SeqCst), 1);
        assert_eq!(low_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unclaimed_error_returns_none() {
        let chain = RecoveryChain::new(vec![Box::new(DetachComponent)]);
        let mut world = World::new();
        // Global errors are not claimed by DetachComponent.
        assert!(chain.dispatch(&record(ErrorContext::global()), &mut world).is_none());
    }

    #[test]
    fn test_detach_component_removes_faulty_kind() {
        let chain = RecoveryChain::new(vec![Box::new(DetachComponent)]);
        let mut world = World::new();
        let e = world.create_entity();
        world.add_component(e, Position).unwrap();

        let (name, outcome) = chain
            .dispatch(&record(ErrorContext::component(e, "Position")), &mut world)
            .unwrap();
        assert_eq!(name, "detach-component");
        assert!(matches!(outcome, RecoveryOutcome::Recovered));
        assert!(!world.has_component::<Position>(e));
        assert!(world.entity_exists(e));
    }

    #[test]
    fn test_detach_component_fails_when_component_absent() {
        let chain = RecoveryChain::new(vec![Box::new(DetachComponent)]);
        let mut world = World::new();
        let e = world.create_entity();

        let (_, outcome) = chain
            .dispatch(&record(ErrorContext::component(e, "Position")), &mut world)
            .unwrap();
        assert!(matches!(outcome, RecoveryOutcome::Failed));
    }

    #[test]
    fn test_detach_component_ignores_unrelated_entity() {
        // Missing entity id: not claimed.
        let chain = RecoveryChain::new(vec![Box::new(DetachComponent)]);
        let mut world = World::new();
        let mut ctx = ErrorContext::component(EntityId::from_raw(1), "Position");
        ctx.entity = None;
        assert!(chain.dispatch(&record(ctx), &mut world).is_none());
    }
}
