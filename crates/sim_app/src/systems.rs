//! Demo components and systems for the example simulation.

use std::collections::HashSet;

use sim_ecs::{Component, EntityId, EntityStore, System, SystemError};

/// 2D position.
#[derive(Debug, Clone, Copy)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Component for Position {
    fn kind() -> &'static str {
        "Position"
    }
}

/// 2D velocity.
#[derive(Debug, Clone, Copy)]
pub struct Velocity {
    pub dx: f64,
    pub dy: f64,
}

impl Component for Velocity {
    fn kind() -> &'static str {
        "Velocity"
    }
}

/// Integrates positions from velocities each tick.
pub struct MovementSystem {
    entities: HashSet<EntityId>,
}

impl MovementSystem {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: HashSet::new(),
        }
    }
}

impl Default for MovementSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for MovementSystem {
    fn name(&self) -> &str {
        "movement"
    }

    fn required_components(&self) -> &[&'static str] {
        &["Position", "Velocity"]
    }

    fn critical(&self) -> bool {
        true
    }

    fn entities(&self) -> &HashSet<EntityId> {
        &self.entities
    }

    fn entities_mut(&mut self) -> &mut HashSet<EntityId> {
        &mut self.entities
    }

    fn update(&mut self, store: &mut EntityStore, dt: f64) -> Result<(), SystemError> {
        let members: Vec<EntityId> = self.entities.iter().copied().collect();
        for id in members {
            let v = match store.get_component::<Velocity>(id) {
                Some(v) => *v,
                None => continue,
            };
            if let Some(p) = store.get_component_mut::<Position>(id) {
                p.x += v.dx * dt;
                p.y += v.dy * dt;
            }
        }
        Ok(())
    }
}

/// Fails every `period`-th tick to exercise the error boundary.
pub struct JitterSystem {
    entities: HashSet<EntityId>,
    period: u64,
    ticks: u64,
}

impl JitterSystem {
    #[must_use]
    pub fn new(period: u64) -> Self {
        Self {
            entities: HashSet::new(),
            period: period.max(1),
            ticks: 0,
        }
    }
}

impl System for JitterSystem {
    fn name(&self) -> &str {
        "jitter"
    }

    fn required_components(&self) -> &[&'static str] {
        &[]
    }

    fn priority(&self) -> i32 {
        10
    }

    fn entities(&self) -> &HashSet<EntityId> {
        &self.entities
    }

    fn entities_mut(&mut self) -> &mut HashSet<EntityId> {
        &mut self.entities
    }

    fn update(&mut self, _store: &mut EntityStore, _dt: f64) -> Result<(), SystemError> {
        self.ticks += 1;
        if self.ticks % self.period == 0 {
            return Err(SystemError::Failed(format!(
                "simulated fault at tick {}",
                self.ticks
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sim_ecs::World;

    use super::*;

    #[test]
    fn test_movement_integrates_members() {
        let mut world = World::new();
        world.add_system(Box::new(MovementSystem::new())).unwrap();
        let e = world.create_entity();
        world.add_component(e, Position { x: 0.0, y: 0.0 }).unwrap();
        world.add_component(e, Velocity { dx: 2.0, dy: -1.0 }).unwrap();

        world.update(0.5);
        let p = world.get_component::<Position>(e).unwrap();
        assert!((p.x - 1.0).abs() < f64::EPSILON);
        assert!((p.y + 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_jitter_fails_on_period() {
        let mut world = World::new();
        world.add_system(Box::new(JitterSystem::new(3))).unwrap();

        assert!(world.update(1.0).is_clean());
        assert!(world.update(1.0).is_clean());
        assert!(!world.update(1.0).is_clean());
        assert!(world.update(1.0).is_clean());
    }
}
