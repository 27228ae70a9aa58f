//! Entity-component storage.
//!
//! The [`EntityStore`] owns every live entity and its component map. It is
//! the single source of truth for entity data; systems receive a mutable
//! reference to it during their update and never store entity data
//! themselves.
//!
//! `get_component` returns `None` for a missing component rather than an
//! error; callers are expected to check `has_component` first. This
//! permissive contract is deliberate; the loud failure lives at attach time,
//! where two Rust types claiming the same kind name are rejected.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::error;

use crate::component::{Component, ComponentCell};
use crate::entity::{EntityAllocator, EntityId};

/// Errors raised by entity/component storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The entity does not exist (never spawned, or already despawned).
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),

    /// Two distinct Rust types declared the same component kind name.
    #[error("component kind '{kind}' is already registered to a different type")]
    KindCollision {
        /// The contested kind name.
        kind: &'static str,
    },
}

/// A single entity's data: liveness flag plus its component map.
#[derive(Debug)]
struct EntityData {
    active: bool,
    components: HashMap<&'static str, ComponentCell>,
}

impl EntityData {
    fn new() -> Self {
        Self {
            active: true,
            components: HashMap::new(),
        }
    }
}

/// Entity registry and per-entity component store.
#[derive(Debug, Default)]
pub struct EntityStore {
    allocator: EntityAllocator,
    entities: HashMap<EntityId, EntityData>,
    /// Entities excluded from all system membership. The quarantine *records*
    /// (reason, timestamp) live in the guard layer; this set is only the
    /// membership mechanics.
    quarantined: HashSet<EntityId>,
    /// Maps each kind name to the Rust type registered for it.
    kinds: HashMap<&'static str, TypeId>,
    /// Entities mutated since the last membership sync.
    changed: HashSet<EntityId>,
}

impl EntityStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            entities: HashMap::new(),
            quarantined: HashSet::new(),
            kinds: HashMap::new(),
            changed: HashSet::new(),
        }
    }

    // -- Entity lifecycle --

    /// Spawn a new entity with no components. Starts active.
    pub fn spawn(&mut self) -> EntityId {
        let id = self.allocator.allocate();
        self.entities.insert(id, EntityData::new());
        self.changed.insert(id);
        id
    }

    /// Despawn an entity, dropping all its components.
    ///
    /// Independent of quarantine state: a quarantined entity can be
    /// despawned, and its quarantine mark is dropped with it.
    pub fn despawn(&mut self, id: EntityId) -> Result<(), StoreError> {
        if self.entities.remove(&id).is_none() {
            return Err(StoreError::EntityNotFound(id));
        }
        self.quarantined.remove(&id);
        self.changed.insert(id);
        Ok(())
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn exists(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Returns `true` if the entity exists and is active.
    #[must_use]
    pub fn is_active(&self, id: EntityId) -> bool {
        self.entities.get(&id).map(|d| d.active).unwrap_or(false)
    }

    /// Set the liveness flag. Inactive entities drop out of all system
    /// membership on the next sync without losing their components.
    pub fn set_active(&mut self, id: EntityId, active: bool) -> Result<(), StoreError> {
        let data = self
            .entities
            .get_mut(&id)
            .ok_or(StoreError::EntityNotFound(id))?;
        data.active = active;
        self.changed.insert(id);
        Ok(())
    }

    /// Return all entity IDs.
    #[must_use]
    pub fn all_entities(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Return the count of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // -- Component operations --

    /// Attach a component to an entity, replacing any existing value of the
    /// same kind.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::KindCollision`] if a *different* Rust type
    /// was previously attached under the same kind name anywhere in the
    /// store. This is the loud-failure point that makes every later lookup's
    /// downcast infallible.
    pub fn add_component<T: Component>(&mut self, id: EntityId, value: T) -> Result<(), StoreError> {
        if !self.entities.contains_key(&id) {
            return Err(StoreError::EntityNotFound(id));
        }
        let type_id = TypeId::of::<T>();
        match self.kinds.get(T::kind()) {
            Some(registered) if *registered != type_id => {
                error!(
                    kind = T::kind(),
                    "component kind collision: refusing to attach a second type under this name"
                );
                return Err(StoreError::KindCollision { kind: T::kind() });
            }
            Some(_) => {}
            None => {
                self.kinds.insert(T::kind(), type_id);
            }
        }
        let data = self
            .entities
            .get_mut(&id)
            .ok_or(StoreError::EntityNotFound(id))?;
        data.components
            .insert(T::kind(), ComponentCell::new(id, value));
        self.changed.insert(id);
        Ok(())
    }

    /// Detach a component by type. Returns `true` if it was present.
    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> bool {
        self.remove_component_by_kind(id, T::kind())
    }

    /// Detach a component by kind name. Returns `true` if it was present.
    pub fn remove_component_by_kind(&mut self, id: EntityId, kind: &str) -> bool {
        let Some(data) = self.entities.get_mut(&id) else {
            return false;
        };
        let removed = data.components.remove(kind).is_some();
        if removed {
            self.changed.insert(id);
        }
        removed
    }

    /// Get a component by type. `None` if the entity or component is absent.
    #[must_use]
    pub fn get_component<T: Component>(&self, id: EntityId) -> Option<&T> {
        let cell = self.entities.get(&id)?.components.get(T::kind())?;
        // Kind collisions are rejected at attach time, so this downcast
        // cannot see a foreign type.
        cell.value.downcast_ref::<T>()
    }

    /// Get a component mutably. Marks the entity changed.
    pub fn get_component_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        let data = self.entities.get_mut(&id)?;
        let cell = data.components.get_mut(T::kind())?;
        self.changed.insert(id);
        cell.value.downcast_mut::<T>()
    }

    /// Check if an entity has a component of type `T`.
    #[must_use]
    pub fn has_component<T: Component>(&self, id: EntityId) -> bool {
        self.has_kind(id, T::kind())
    }

    /// Check if an entity has a component of the given kind name.
    #[must_use]
    pub fn has_kind(&self, id: EntityId, kind: &str) -> bool {
        self.entities
            .get(&id)
            .map(|d| d.components.contains_key(kind))
            .unwrap_or(false)
    }

    /// Check if an entity has every one of the given kind names.
    #[must_use]
    pub fn has_all_kinds(&self, id: EntityId, kinds: &[&str]) -> bool {
        match self.entities.get(&id) {
            Some(d) => kinds.iter().all(|k| d.components.contains_key(*k)),
            None => false,
        }
    }

    /// Kind names of every component on an entity.
    #[must_use]
    pub fn component_kinds(&self, id: EntityId) -> Vec<&'static str> {
        self.entities
            .get(&id)
            .map(|d| d.components.keys().copied().collect())
            .unwrap_or_default()
    }

    /// The entity a stored component of kind `kind` is attached to, if any.
    ///
    /// Introspection only; the back-reference never extends a lifetime.
    #[must_use]
    pub fn component_owner(&self, id: EntityId, kind: &str) -> Option<EntityId> {
        self.entities
            .get(&id)
            .and_then(|d| d.components.get(kind))
            .map(|c| c.owner)
    }

    // -- Quarantine mechanics --

    /// Returns `true` if the entity is marked quarantined.
    #[must_use]
    pub fn is_quarantined(&self, id: EntityId) -> bool {
        self.quarantined.contains(&id)
    }

    pub(crate) fn set_quarantined(&mut self, id: EntityId, quarantined: bool) {
        if quarantined {
            self.quarantined.insert(id);
        } else {
            self.quarantined.remove(&id);
        }
        self.changed.insert(id);
    }

    // -- Change tracking --

    /// Drain the set of entities mutated since the last call.
    pub(crate) fn take_changed(&mut self) -> Vec<EntityId> {
        self.changed.drain().collect()
    }

    /// Drop all entities, components and quarantine marks.
    pub(crate) fn clear(&mut self) {
        self.entities.clear();
        self.quarantined.clear();
        self.changed.clear();
    }
}
