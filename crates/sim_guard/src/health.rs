//! Per-system health tracking.
//!
//! The monitor keeps one [`SystemHealth`] record per system: a smoothed
//! execution-time average, a cumulative error count with a sliding recent
//! window, and a status. Healthy and degraded are pure functions of the
//! timing metric, re-evaluated on every sample; isolated is entered and left
//! only through explicit boundary calls.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;
use tracing::{info, warn};

/// Health classification of one system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Operating within its execution budget.
    Healthy,
    /// Smoothed execution time above the configured threshold.
    Degraded,
    /// Disabled by the boundary; kept registered with state preserved.
    Isolated,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Isolated => "isolated",
        };
        f.write_str(s)
    }
}

/// The health record for one registered system.
///
/// Created on the first sample or error, mutated only by the monitor, never
/// destroyed while the system is registered.
#[derive(Debug, Clone)]
pub struct SystemHealth {
    /// The system's registered name.
    pub name: String,
    /// Current classification.
    pub status: HealthStatus,
    /// Cumulative error count since registration.
    pub error_count: u64,
    /// Smoothed average execution time in milliseconds.
    pub avg_execution_ms: f64,
    /// Number of execution samples observed.
    pub samples: u32,
    /// When the most recent error was handled.
    pub last_error: Option<SystemTime>,
    /// Error instants inside the sliding window.
    recent_errors: VecDeque<Instant>,
}

impl SystemHealth {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Healthy,
            error_count: 0,
            avg_execution_ms: 0.0,
            samples: 0,
            last_error: None,
            recent_errors: VecDeque::new(),
        }
    }
}

/// Tracks health records for every system the boundary has seen.
#[derive(Debug)]
pub struct HealthMonitor {
    records: HashMap<String, SystemHealth>,
    degraded_threshold_ms: f64,
    min_samples: u32,
    error_window: Duration,
}

impl HealthMonitor {
    /// Create a monitor with the given degradation tuning.
    #[must_use]
    pub fn new(degraded_threshold_ms: f64, min_samples: u32, error_window: Duration) -> Self {
        Self {
            records: HashMap::new(),
            degraded_threshold_ms,
            min_samples,
            error_window,
        }
    }

    fn entry(&mut self, name: &str) -> &mut SystemHealth {
        self.records
            .entry(name.to_string())
            .or_insert_with(|| SystemHealth::new(name))
    }

    /// Feed one execution-time sample and re-evaluate healthy/degraded.
    ///
    /// The average is smoothed as `(avg + sample) / 2`, so a single fast
    /// sample after a degraded stretch pulls the system back under the
    /// threshold. Isolated systems keep their metrics updated but their
    /// status is untouched.
    pub fn record_execution(&mut self, name: &str, duration: Duration) {
        let threshold = self.degraded_threshold_ms;
        let min_samples = self.min_samples;
        let record = self.entry(name);

        let sample_ms = duration.as_secs_f64() * 1000.0;
        record.avg_execution_ms = if record.samples == 0 {
            sample_ms
        } else {
            (record.avg_execution_ms + sample_ms) / 2.0
        };
        record.samples += 1;

        if record.status == HealthStatus::Isolated {
            return;
        }
        let over_budget =
            record.samples >= min_samples && record.avg_execution_ms > threshold;
        match (record.status, over_budget) {
            (HealthStatus::Healthy, true) => {
                record.status = HealthStatus::Degraded;
                warn!(
                    system = name,
                    avg_ms = record.avg_execution_ms,
                    threshold_ms = threshold,
                    "system degraded: execution time over budget"
                );
            }
            (HealthStatus::Degraded, false) => {
                record.status = HealthStatus::Healthy;
                info!(
                    system = name,
                    avg_ms = record.avg_execution_ms,
                    "system recovered to healthy"
                );
            }
            _ => {}
        }
    }

    /// Count one error against a system. Returns the number of errors inside
    /// the sliding window, for the boundary's isolation decision.
    pub fn record_error(&mut self, name: &str, now: Instant, timestamp: SystemTime) -> u32 {
        let window = self.error_window;
        let record = self.entry(name);
        record.error_count += 1;
        record.last_error = Some(timestamp);
        record.recent_errors.push_back(now);
        while let Some(front) = record.recent_errors.front() {
            if now.duration_since(*front) > window {
                record.recent_errors.pop_front();
            } else {
                break;
            }
        }
        record.recent_errors.len() as u32
    }

    /// Mark a system isolated.
    pub fn mark_isolated(&mut self, name: &str) {
        self.entry(name).status = HealthStatus::Isolated;
    }

    /// Reset a system to healthy, clearing its recent error window. The
    /// cumulative error count is preserved.
    pub fn reset(&mut self, name: &str) {
        let record = self.entry(name);
        record.status = HealthStatus::Healthy;
        record.recent_errors.clear();
    }

    /// Look up one system's health record.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SystemHealth> {
        self.records.get(name)
    }

    /// All health records, sorted by system name for stable output.
    #[must_use]
    pub fn all(&self) -> Vec<&SystemHealth> {
        let mut records: Vec<&SystemHealth> = self.records.values().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }
}
