//! # sim_ecs
//!
//! Entity-component storage and the per-tick system scheduler.
//!
//! The [`World`] owns the entity registry and a name-keyed system registry.
//! Once per frame the external driver calls [`World::update`], which runs
//! every enabled system in ascending priority order (stable on ties) with a
//! guard around each update: a failed or panicking system is captured into
//! the tick's [`TickReport`] and the remaining systems still run. The report
//! is consumed by the `sim_guard` error boundary.
//!
//! ## Usage
//!
//! ```rust
//! use std::collections::HashSet;
//! use sim_ecs::{Component, EntityId, EntityStore, System, SystemError, World};
//!
//! struct Position { x: f64 }
//!
//! impl Component for Position {
//!     fn kind() -> &'static str { "Position" }
//! }
//!
//! struct Drift { entities: HashSet<EntityId> }
//!
//! impl System for Drift {
//!     fn name(&self) -> &str { "drift" }
//!     fn required_components(&self) -> &[&'static str] { &["Position"] }
//!     fn entities(&self) -> &HashSet<EntityId> { &self.entities }
//!     fn entities_mut(&mut self) -> &mut HashSet<EntityId> { &mut self.entities }
//!     fn update(&mut self, store: &mut EntityStore, dt: f64) -> Result<(), SystemError> {
//!         for id in self.entities.iter().copied().collect::<Vec<_>>() {
//!             if let Some(p) = store.get_component_mut::<Position>(id) {
//!                 p.x += dt;
//!             }
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut world = World::new();
//! world.add_system(Box::new(Drift { entities: HashSet::new() })).unwrap();
//! let e = world.create_entity();
//! world.add_component(e, Position { x: 0.0 }).unwrap();
//! let report = world.update(1.0 / 60.0);
//! assert!(report.is_clean());
//! ```

pub mod component;
pub mod entity;
pub mod store;
pub mod system;
pub mod world;

pub use component::Component;
pub use entity::{EntityAllocator, EntityId};
pub use store::{EntityStore, StoreError};
pub use system::{System, SystemError};
pub use world::{SystemOutcome, TickReport, World, WorldError};
