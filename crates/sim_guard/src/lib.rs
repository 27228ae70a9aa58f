//! Fault isolation and recovery around a [`sim_ecs::World`].
//!
//! [`ErrorBoundary`] wraps the world's tick so that no single system,
//! component or entity can take the simulation down: failures are logged to a
//! bounded history, per-system health is tracked and repeat offenders are
//! isolated, misbehaving entities can be quarantined, and pluggable
//! [`RecoveryStrategy`] implementations get a chance to repair the fault.
//! A sliding-window flood detector signals emergency mode when errors arrive
//! faster than the configured rate.
//!
//! ```
//! use sim_ecs::World;
//! use sim_guard::{ErrorBoundary, GuardConfig};
//!
//! let mut world = World::new();
//! let mut boundary = ErrorBoundary::new(GuardConfig::default());
//!
//! // Systems may fail or panic; the tick always completes.
//! let report = boundary.tick(&mut world, 1.0 / 60.0);
//! assert!(report.is_clean());
//! ```

pub mod boundary;
pub mod config;
pub mod flood;
pub mod health;
pub mod record;
pub mod recovery;

pub use boundary::{ErrorBoundary, ErrorSink, QuarantineRecord, RecoveryReport};
pub use config::GuardConfig;
pub use flood::FloodDetector;
pub use health::{HealthMonitor, HealthStatus, SystemHealth};
pub use record::{ErrorContext, ErrorLog, ErrorRecord, ErrorSource};
pub use recovery::{DetachComponent, RecoveryChain, RecoveryOutcome, RecoveryStrategy};
