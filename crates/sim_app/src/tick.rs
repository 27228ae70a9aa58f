//! Paced tick loop driving the guarded world.
//!
//! Each iteration runs one boundary-wrapped world tick, then sleeps off the
//! remainder of the tick budget. A tick over budget is logged and the loop
//! carries on at full speed rather than trying to catch up.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use sim_ecs::World;
use sim_guard::ErrorBoundary;

/// Configuration for the tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
        }
    }
}

/// Owns the world and its error boundary and paces their ticks.
pub struct TickLoop {
    config: TickConfig,
    world: World,
    boundary: ErrorBoundary,
}

impl TickLoop {
    /// Create a loop around an already-populated world.
    #[must_use]
    pub fn new(config: TickConfig, world: World, boundary: ErrorBoundary) -> Self {
        Self {
            config,
            world,
            boundary,
        }
    }

    /// Read access to the world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the world.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Read access to the error boundary.
    #[must_use]
    pub fn boundary(&self) -> &ErrorBoundary {
        &self.boundary
    }

    /// Mutable access to the error boundary.
    pub fn boundary_mut(&mut self) -> &mut ErrorBoundary {
        &mut self.boundary
    }

    /// Run the loop for the configured number of ticks, or until cancelled.
    pub async fn run(&mut self) {
        let tick_duration = Duration::from_secs_f64(1.0 / self.config.tick_rate);
        let dt = tick_duration.as_secs_f64();
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        loop {
            let start = Instant::now();
            self.boundary.tick(&mut self.world, dt);

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(ticks = tick_count, "tick loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                tokio::time::sleep(tick_duration - elapsed).await;
            } else {
                warn!(
                    tick_id = self.world.tick_id(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }
    }
}
