//! Entity identity.
//!
//! An entity is nothing but a number; all meaning comes from the components
//! attached to it in the store. Ids are minted by the store's
//! [`EntityAllocator`] and never recycled, so an id held by an error record
//! or quarantine record cannot silently come to mean a different entity.

use serde::{Deserialize, Serialize};

/// Opaque identifier for one entity.
///
/// Zero is reserved as the [`EntityId::INVALID`] sentinel and is never
/// minted, so a zeroed id in diagnostics always means "no entity".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Sentinel for "no entity".
    pub const INVALID: EntityId = EntityId(0);

    /// Wrap a raw id, e.g. one read back from a serialised error record.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// The raw numeric id.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// `false` only for the [`EntityId::INVALID`] sentinel.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity-{}", self.0)
    }
}

/// Mints entity ids for one store, starting at 1 and counting up.
///
/// Despawned ids are not returned to the pool. The store relies on this when
/// a despawn races a quarantine release or a late diagnostic lookup: a stale
/// id simply resolves to nothing.
#[derive(Debug)]
pub struct EntityAllocator {
    next: u64,
}

impl EntityAllocator {
    /// A fresh allocator. The first minted id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Mint the next id.
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next += 1;
        id
    }

    /// Total ids minted so far, despawned ones included.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next - 1
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::store::EntityStore;

    use super::*;

    #[test]
    fn test_invalid_sentinel_is_never_valid() {
        assert!(!EntityId::INVALID.is_valid());
        assert!(EntityId::from_raw(1).is_valid());
    }

    #[test]
    fn test_display_names_the_raw_id() {
        assert_eq!(EntityId::from_raw(42).to_string(), "entity-42");
    }

    #[test]
    fn test_store_spawns_valid_ascending_ids() {
        let mut store = EntityStore::new();
        let a = store.spawn();
        let b = store.spawn();
        let c = store.spawn();
        assert!(a.is_valid() && b.is_valid() && c.is_valid());
        assert!(a < b && b < c);
        assert_eq!(store.entity_count(), 3);
    }

    #[test]
    fn test_despawned_ids_are_not_reused() {
        let mut store = EntityStore::new();
        let dead = store.spawn();
        store.despawn(dead).unwrap();
        let next = store.spawn();
        assert!(next > dead, "a stale id must never alias a live entity");
        assert!(!store.exists(dead));
    }

    #[test]
    fn test_allocator_count_tracks_minted_ids() {
        let mut alloc = EntityAllocator::new();
        assert_eq!(alloc.count(), 0);
        alloc.allocate();
        alloc.allocate();
        assert_eq!(alloc.count(), 2);
    }
}
