//! Error boundary configuration.

use std::collections::HashSet;
use std::time::Duration;

use tracing::Level;

/// Configuration for the [`ErrorBoundary`](crate::ErrorBoundary).
///
/// The defaults match the tuning of the original simulation: a 60-errors-
/// per-minute flood threshold against a 16ms-budget tick, isolation after
/// five errors in a minute, and degradation at a 50ms smoothed average.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Errors within `flood_window` before emergency mode trips.
    pub max_errors_per_minute: usize,
    /// Sliding window for flood detection.
    pub flood_window: Duration,
    /// Run the recovery strategy chain on every handled error.
    pub enable_auto_recovery: bool,
    /// Allow systems to be isolated (disabled but kept registered).
    pub enable_system_isolation: bool,
    /// Allow entities to be quarantined out of all membership.
    pub enable_entity_quarantine: bool,
    /// Errors within `error_window` before a non-critical system is
    /// isolated automatically.
    pub isolation_error_threshold: u32,
    /// Sliding window for per-system error counting.
    pub error_window: Duration,
    /// Smoothed average execution time (ms) above which a system is
    /// degraded.
    pub degraded_threshold_ms: f64,
    /// Samples required before the degraded transition can trigger.
    pub min_health_samples: u32,
    /// Bound on the in-memory error log; oldest records are evicted.
    pub max_error_history: usize,
    /// System names never isolated, in addition to systems that declare
    /// themselves critical.
    pub critical_systems: HashSet<String>,
    /// On flood, bulk-isolate every non-critical system.
    pub disable_non_critical_on_flood: bool,
    /// Level error records are emitted at.
    pub log_level: Level,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_errors_per_minute: 60,
            flood_window: Duration::from_secs(60),
            enable_auto_recovery: true,
            enable_system_isolation: true,
            enable_entity_quarantine: true,
            isolation_error_threshold: 5,
            error_window: Duration::from_secs(60),
            degraded_threshold_ms: 50.0,
            min_health_samples: 10,
            max_error_history: 100,
            critical_systems: HashSet::new(),
            disable_non_critical_on_flood: false,
            log_level: Level::ERROR,
        }
    }
}

impl GuardConfig {
    /// Mark a system name as critical (never isolated).
    #[must_use]
    pub fn with_critical_system(mut self, name: impl Into<String>) -> Self {
        self.critical_systems.insert(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GuardConfig::default();
        assert_eq!(config.max_errors_per_minute, 60);
        assert_eq!(config.flood_window, Duration::from_secs(60));
        assert!(config.enable_auto_recovery);
        assert!(config.enable_system_isolation);
        assert!(config.enable_entity_quarantine);
        assert_eq!(config.max_error_history, 100);
    }

    #[test]
    fn test_with_critical_system() {
        let config = GuardConfig::default().with_critical_system("render");
        assert!(config.critical_systems.contains("render"));
    }
}
