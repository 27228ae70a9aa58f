//! The world scheduler.
//!
//! [`World`] coordinates the entity store and the registered systems. On each
//! tick it runs enabled systems in ascending priority order (stable on ties)
//! and keeps every system's membership set in sync as entities, components
//! and systems change.
//!
//! Every system update runs under a guard: an `Err` return or a panic is
//! captured into the tick's [`TickReport`] and the remaining systems still
//! execute. `World::update` itself never fails.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::component::Component;
use crate::entity::EntityId;
use crate::store::{EntityStore, StoreError};
use crate::system::{System, SystemError};

/// Errors raised by world-level registry operations.
#[derive(Debug, Error)]
pub enum WorldError {
    /// A system with this name is already registered.
    #[error("system '{0}' is already registered")]
    DuplicateSystem(String),

    /// No system with this name is registered.
    #[error("unknown system '{0}'")]
    UnknownSystem(String),

    /// Underlying storage error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One registered system plus its scheduling state.
///
/// The enabled flag lives here, not on the system, so the error boundary can
/// force it without every collaborator carrying mutable state.
struct SystemSlot {
    system: Box<dyn System>,
    enabled: bool,
    /// Cached from `System::priority()` at registration.
    priority: i32,
    /// Registration sequence; breaks priority ties.
    seq: u64,
}

/// The outcome of one system's update within a tick.
#[derive(Debug)]
pub struct SystemOutcome {
    /// The system's registered name.
    pub system: String,
    /// Wall-clock execution time of the update.
    pub duration: Duration,
    /// The captured failure, if the update did not succeed.
    pub error: Option<SystemError>,
}

/// What happened during one `World::update` call.
#[derive(Debug)]
pub struct TickReport {
    /// The tick counter after this tick.
    pub tick_id: u64,
    /// Per-system outcomes, in execution order.
    pub outcomes: Vec<SystemOutcome>,
}

impl TickReport {
    /// Returns `true` if every system update succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(|o| o.error.is_none())
    }
}

/// Entity registry plus system registry plus the per-tick scheduler.
pub struct World {
    store: EntityStore,
    slots: Vec<SystemSlot>,
    /// System name -> index into `slots`.
    index: HashMap<String, usize>,
    next_seq: u64,
    tick_id: u64,
}

impl World {
    /// Create a new empty world.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: EntityStore::new(),
            slots: Vec::new(),
            index: HashMap::new(),
            next_seq: 0,
            tick_id: 0,
        }
    }

    /// The number of completed ticks.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Read access to the entity store.
    #[must_use]
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Mutable access to the entity store.
    ///
    /// Membership is resynced from the store's change tracking at the start
    /// of the next update, so direct mutations are safe but take effect in
    /// membership one tick later. Prefer the world-level operations, which
    /// sync immediately.
    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    // -- Entity lifecycle --

    /// Create a new entity and offer it to every system for membership
    /// evaluation.
    pub fn create_entity(&mut self) -> EntityId {
        let id = self.store.spawn();
        self.sync_entity(id);
        id
    }

    /// Destroy an entity, removing it from every system. Works regardless of
    /// quarantine state.
    pub fn destroy_entity(&mut self, id: EntityId) -> Result<(), WorldError> {
        self.store.despawn(id)?;
        for slot in &mut self.slots {
            slot.system.remove_entity(id);
        }
        Ok(())
    }

    // -- Component passthroughs (membership synced immediately) --

    /// Attach a component; may promote the entity into systems whose
    /// requirements are now satisfied.
    pub fn add_component<T: Component>(&mut self, id: EntityId, value: T) -> Result<(), WorldError> {
        self.store.add_component(id, value)?;
        self.sync_entity(id);
        Ok(())
    }

    /// Detach a component by type; may demote the entity out of systems.
    /// Returns `true` if the component was present.
    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> bool {
        self.remove_component_by_kind(id, T::kind())
    }

    /// Detach a component by kind name; may demote the entity out of systems.
    pub fn remove_component_by_kind(&mut self, id: EntityId, kind: &str) -> bool {
        let removed = self.store.remove_component_by_kind(id, kind);
        if removed {
            self.sync_entity(id);
        }
        removed
    }

    /// Get a component. `None` for a missing entity or component.
    #[must_use]
    pub fn get_component<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.store.get_component(id)
    }

    /// Get a component mutably.
    pub fn get_component_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        self.store.get_component_mut(id)
    }

    /// Check for a component by type.
    #[must_use]
    pub fn has_component<T: Component>(&self, id: EntityId) -> bool {
        self.store.has_component::<T>(id)
    }

    /// Set the liveness flag; membership follows immediately.
    pub fn set_active(&mut self, id: EntityId, active: bool) -> Result<(), WorldError> {
        self.store.set_active(id, active)?;
        self.sync_entity(id);
        Ok(())
    }

    // -- System registry --

    /// Register a system and backfill its membership from all current
    /// entities.
    pub fn add_system(&mut self, system: Box<dyn System>) -> Result<(), WorldError> {
        let name = system.name().to_string();
        if self.index.contains_key(&name) {
            return Err(WorldError::DuplicateSystem(name));
        }
        let priority = system.priority();
        let seq = self.next_seq;
        self.next_seq += 1;

        let mut slot = SystemSlot {
            system,
            enabled: true,
            priority,
            seq,
        };
        for id in self.store.all_entities() {
            if !self.store.is_quarantined(id) && slot.system.can_process(&self.store, id) {
                slot.system.add_entity(id);
            }
        }
        info!(
            system = %name,
            priority,
            members = slot.system.entities().len(),
            "system registered"
        );
        self.index.insert(name, self.slots.len());
        self.slots.push(slot);
        Ok(())
    }

    /// Unregister a system. Its membership is cleared first.
    pub fn remove_system(&mut self, name: &str) -> Result<Box<dyn System>, WorldError> {
        let idx = self
            .index
            .remove(name)
            .ok_or_else(|| WorldError::UnknownSystem(name.to_string()))?;
        let mut slot = self.slots.remove(idx);
        slot.system.cleanup();
        // Later slots shifted down by one.
        for i in self.index.values_mut() {
            if *i > idx {
                *i -= 1;
            }
        }
        info!(system = name, "system unregistered");
        Ok(slot.system)
    }

    /// Look up a registered system by name.
    #[must_use]
    pub fn get_system(&self, name: &str) -> Option<&dyn System> {
        self.index.get(name).map(|&i| self.slots[i].system.as_ref())
    }

    /// Mutable lookup of a registered system.
    pub fn get_system_mut(&mut self, name: &str) -> Option<&mut Box<dyn System>> {
        let idx = *self.index.get(name)?;
        Some(&mut self.slots[idx].system)
    }

    /// Registered system names, in registration order.
    #[must_use]
    pub fn system_names(&self) -> Vec<String> {
        let mut slots: Vec<&SystemSlot> = self.slots.iter().collect();
        slots.sort_by_key(|s| s.seq);
        slots.iter().map(|s| s.system.name().to_string()).collect()
    }

    /// Whether the named system is currently enabled.
    #[must_use]
    pub fn system_enabled(&self, name: &str) -> Option<bool> {
        self.index.get(name).map(|&i| self.slots[i].enabled)
    }

    /// Force a system's enabled flag. Membership is preserved either way.
    pub fn set_system_enabled(&mut self, name: &str, enabled: bool) -> Result<(), WorldError> {
        let idx = *self
            .index
            .get(name)
            .ok_or_else(|| WorldError::UnknownSystem(name.to_string()))?;
        self.slots[idx].enabled = enabled;
        Ok(())
    }

    /// Whether the named system declared itself critical.
    #[must_use]
    pub fn system_critical(&self, name: &str) -> Option<bool> {
        self.index.get(name).map(|&i| self.slots[i].system.critical())
    }

    /// Whether an entity exists.
    #[must_use]
    pub fn entity_exists(&self, id: EntityId) -> bool {
        self.store.exists(id)
    }

    // -- Quarantine mechanics (records live in the guard layer) --

    /// Remove an entity from every system's membership without destroying
    /// it. Returns `false` for an unknown entity.
    pub fn quarantine_entity(&mut self, id: EntityId) -> bool {
        if !self.store.exists(id) {
            return false;
        }
        self.store.set_quarantined(id, true);
        for slot in &mut self.slots {
            slot.system.remove_entity(id);
        }
        true
    }

    /// Lift the quarantine mark and re-evaluate the entity against every
    /// system's predicate.
    pub fn release_entity(&mut self, id: EntityId) -> bool {
        if !self.store.exists(id) {
            return false;
        }
        self.store.set_quarantined(id, false);
        self.sync_entity(id);
        true
    }

    // -- Tick --

    /// Run one tick: enabled systems in ascending priority order, stable on
    /// ties. Never fails; each system's `Err` or panic is captured into the
    /// report and the remaining systems still run.
    pub fn update(&mut self, dt: f64) -> TickReport {
        self.tick_id += 1;
        // Pick up any direct store mutations since the last tick.
        self.sync_changed();

        let mut order: Vec<usize> = (0..self.slots.len())
            .filter(|&i| self.slots[i].enabled)
            .collect();
        order.sort_by_key(|&i| (self.slots[i].priority, self.slots[i].seq));

        debug!(tick_id = self.tick_id, dt, systems = order.len(), "tick start");

        let mut outcomes = Vec::with_capacity(order.len());
        for i in order {
            let Self { store, slots, .. } = self;
            let slot = &mut slots[i];
            let start = Instant::now();
            let result = panic::catch_unwind(AssertUnwindSafe(|| slot.system.update(store, dt)));
            let duration = start.elapsed();

            let error = match result {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(payload) => Some(SystemError::Panicked(panic_message(payload.as_ref()))),
            };
            if let Some(e) = &error {
                warn!(system = slot.system.name(), error = %e, "system update failed");
            }
            outcomes.push(SystemOutcome {
                system: slot.system.name().to_string(),
                duration,
                error,
            });

            // Membership must reflect this system's mutations before the
            // next system runs.
            self.sync_changed();
        }

        TickReport {
            tick_id: self.tick_id,
            outcomes,
        }
    }

    /// Tear down: clear every system's membership, unregister all systems
    /// and drop all entities.
    pub fn cleanup(&mut self) {
        for slot in &mut self.slots {
            slot.system.cleanup();
        }
        self.slots.clear();
        self.index.clear();
        self.store.clear();
        info!("world cleaned up");
    }

    // -- Membership sync --

    fn sync_changed(&mut self) {
        for id in self.store.take_changed() {
            self.sync_entity(id);
        }
    }

    /// Re-evaluate one entity against every system's predicate. Quarantine
    /// excludes regardless of qualification; membership is maintained for
    /// disabled systems too, so isolation preserves state.
    fn sync_entity(&mut self, id: EntityId) {
        let Self { store, slots, .. } = self;
        for slot in slots.iter_mut() {
            let qualifies = store.exists(id)
                && !store.is_quarantined(id)
                && slot.system.can_process(store, id);
            if qualifies {
                slot.system.add_entity(id);
            } else {
                slot.system.remove_entity(id);
            }
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
