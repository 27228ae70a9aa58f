//! The [`System`] trait, a unit of per-tick logic.
//!
//! A system declares the component kinds it requires and holds the set of
//! entities currently satisfying them (its *membership*). The world keeps
//! membership in sync as entities, components and systems change; systems
//! only read it inside [`System::update`].

use std::collections::HashSet;

use thiserror::Error;

use crate::entity::EntityId;
use crate::store::EntityStore;

/// Errors a system may return from its update.
///
/// These never escape the tick: the scheduler guards every update and turns
/// failures into report entries for the error boundary.
#[derive(Debug, Error)]
pub enum SystemError {
    /// General execution failure.
    #[error("{0}")]
    Failed(String),

    /// A failure localised to one component on one entity.
    #[error("component '{kind}' on {entity}: {message}")]
    Component {
        /// The entity carrying the faulty component.
        entity: EntityId,
        /// The component kind name.
        kind: String,
        /// What went wrong.
        message: String,
    },

    /// The update panicked; caught at the scheduler guard.
    #[error("panicked: {0}")]
    Panicked(String),
}

/// A unit of per-tick logic run by the world scheduler.
///
/// Implementors carry their own membership set; the provided
/// `add_entity` / `remove_entity` / `cleanup` defaults operate on it and
/// rarely need overriding. `can_process` defaults to the required-component
/// predicate and can be tightened by collaborators with extra eligibility
/// rules.
pub trait System: Send {
    /// The system's registered name. Must be unique within a world.
    fn name(&self) -> &str;

    /// Component kind names an entity must carry to be processed.
    fn required_components(&self) -> &[&'static str];

    /// Scheduling priority. Lower runs first; ties preserve registration
    /// order.
    fn priority(&self) -> i32 {
        0
    }

    /// Critical systems are never isolated by the error boundary.
    fn critical(&self) -> bool {
        false
    }

    /// The membership set: entities this system currently processes.
    fn entities(&self) -> &HashSet<EntityId>;

    /// Mutable access to the membership set. Used by the world for sync;
    /// systems should not mutate it themselves.
    fn entities_mut(&mut self) -> &mut HashSet<EntityId>;

    /// Run one tick of this system's logic.
    ///
    /// # Errors
    ///
    /// Returns a [`SystemError`] on failure. The scheduler catches it (and
    /// panics) so the remaining systems in the tick still run.
    fn update(&mut self, store: &mut EntityStore, dt: f64) -> Result<(), SystemError>;

    /// Whether an entity is eligible for this system.
    fn can_process(&self, store: &EntityStore, id: EntityId) -> bool {
        store.is_active(id) && store.has_all_kinds(id, self.required_components())
    }

    /// Admit an entity into membership.
    fn add_entity(&mut self, id: EntityId) {
        self.entities_mut().insert(id);
    }

    /// Drop an entity from membership.
    fn remove_entity(&mut self, id: EntityId) {
        self.entities_mut().remove(&id);
    }

    /// Clear membership. Called on unregistration and world teardown.
    fn cleanup(&mut self) {
        self.entities_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;

    struct Position;

    impl Component for Position {
        fn kind() -> &'static str {
            "Position"
        }
    }

    struct Probe {
        entities: HashSet<EntityId>,
    }

    impl System for Probe {
        fn name(&self) -> &str {
            "probe"
        }

        fn required_components(&self) -> &[&'static str] {
            &["Position"]
        }

        fn entities(&self) -> &HashSet<EntityId> {
            &self.entities
        }

        fn entities_mut(&mut self) -> &mut HashSet<EntityId> {
            &mut self.entities
        }

        fn update(&mut self, _store: &mut EntityStore, _dt: f64) -> Result<(), SystemError> {
            Ok(())
        }
    }

    #[test]
    fn test_default_membership_ops() {
        let mut probe = Probe {
            entities: HashSet::new(),
        };
        let id = EntityId::from_raw(1);
        probe.add_entity(id);
        assert!(probe.entities().contains(&id));
        probe.remove_entity(id);
        assert!(probe.entities().is_empty());
        probe.add_entity(id);
        probe.cleanup();
        assert!(probe.entities().is_empty());
    }

    #[test]
    fn test_default_can_process_checks_requirements_and_liveness() {
        let probe = Probe {
            entities: HashSet::new(),
        };
        let mut store = EntityStore::new();
        let id = store.spawn();
        assert!(!probe.can_process(&store, id));

        store.add_component(id, Position).unwrap();
        assert!(probe.can_process(&store, id));

        store.set_active(id, false).unwrap();
        assert!(!probe.can_process(&store, id));
    }

    #[test]
    fn test_default_priority_and_critical() {
        let probe = Probe {
            entities: HashSet::new(),
        };
        assert_eq!(probe.priority(), 0);
        assert!(!probe.critical());
    }
}
