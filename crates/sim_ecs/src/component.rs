//! Core [`Component`] trait and type-erased storage cell.
//!
//! Components are plain data attached to entities, keyed by a string **kind
//! name**. Systems declare the kind names they require, so the name is the
//! unit of composition; the Rust type behind a name is checked once at attach
//! time and a mismatch is rejected loudly rather than silently returning
//! wrong data on lookup.

use std::any::{Any, TypeId};

use crate::entity::EntityId;

/// The core component trait.
///
/// Any plain-data type can be a component. The kind name is the identity used
/// by system requirements and diagnostics.
///
/// # Examples
///
/// ```rust
/// use sim_ecs::Component;
///
/// #[derive(Debug, Clone)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     fn kind() -> &'static str { "Health" }
/// }
/// ```
pub trait Component: Any + Send + Sync {
    /// The kind name for this component type (e.g. `"Position"`).
    fn kind() -> &'static str
    where
        Self: Sized;
}

/// A single stored component instance.
///
/// Carries the owning entity as a non-owning back-reference, set once at
/// attach time and used only for introspection. The entity exclusively owns
/// its components.
pub(crate) struct ComponentCell {
    /// The kind name this cell was attached under.
    pub kind: &'static str,
    /// The entity this component is attached to.
    pub owner: EntityId,
    /// Concrete Rust type behind the kind name.
    pub type_id: TypeId,
    /// The component value.
    pub value: Box<dyn Any + Send + Sync>,
}

impl ComponentCell {
    pub(crate) fn new<T: Component>(owner: EntityId, value: T) -> Self {
        Self {
            kind: T::kind(),
            owner,
            type_id: TypeId::of::<T>(),
            value: Box::new(value),
        }
    }
}

impl std::fmt::Debug for ComponentCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentCell")
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}
