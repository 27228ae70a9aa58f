//! # sim_app
//!
//! Demo binary for the guarded simulation stack: a world with a movement
//! system and a deliberately flaky system, run under an error boundary for a
//! few seconds of simulated time, with a health summary at shutdown.

mod systems;
mod tick;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sim_ecs::World;
use sim_guard::{ErrorBoundary, GuardConfig};
use systems::{JitterSystem, MovementSystem, Position, Velocity};
use tick::{TickConfig, TickLoop};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sim_app=info".parse()?))
        .init();

    info!("simulation starting");

    let mut world = World::new();
    world.add_system(Box::new(MovementSystem::new()))?;
    world.add_system(Box::new(JitterSystem::new(30)))?;

    for i in 0..4 {
        let e = world.create_entity();
        world.add_component(e, Position { x: 0.0, y: 0.0 })?;
        world.add_component(
            e,
            Velocity {
                dx: 1.0 + f64::from(i),
                dy: 0.5,
            },
        )?;
    }

    let guard_config = GuardConfig {
        isolation_error_threshold: 5,
        ..GuardConfig::default()
    };
    let boundary = ErrorBoundary::new(guard_config);

    let config = TickConfig {
        tick_rate: 60.0,
        max_ticks: 300, // Five seconds of simulated time.
    };
    let mut tick_loop = TickLoop::new(config, world, boundary);
    tick_loop.run().await;

    for health in tick_loop.boundary().all_system_health() {
        info!(
            system = %health.name,
            status = %health.status,
            errors = health.error_count,
            avg_ms = health.avg_execution_ms,
            "shutdown health"
        );
    }
    for name in tick_loop.boundary().isolated_systems() {
        info!(system = %name, "isolated at shutdown");
    }

    tick_loop.boundary_mut().destroy();
    info!("simulation shut down");
    Ok(())
}
