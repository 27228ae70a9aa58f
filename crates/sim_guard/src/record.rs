//! Error records and the bounded in-memory error log.
//!
//! Every failure the boundary sees, whether a system update, a
//! component-localised fault reported by a collaborator, a global report or
//! a detached-task failure, becomes one [`ErrorRecord`] in an append-only, size-bounded log.
//! The records are serialisable so external dashboards can export them.

use std::collections::VecDeque;
use std::time::SystemTime;

use serde::Serialize;
use sim_ecs::EntityId;

/// Where an error was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    /// Caught at the per-system guard during a tick.
    System,
    /// A failure localised to one component on one entity.
    Component,
    /// Reported from outside any system (the driver's own catch points).
    Global,
    /// Reported from a detached asynchronous task.
    Task,
}

impl std::fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorSource::System => "system",
            ErrorSource::Component => "component",
            ErrorSource::Global => "global",
            ErrorSource::Task => "task",
        };
        f.write_str(s)
    }
}

/// The fixed-shape context attached to every handled error.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorContext {
    /// Capture point.
    pub source: ErrorSource,
    /// The implicated system, if any.
    pub system: Option<String>,
    /// The implicated entity, if any.
    pub entity: Option<EntityId>,
    /// The implicated component kind, if any.
    pub component: Option<String>,
    /// When the error was handled.
    pub timestamp: SystemTime,
}

impl ErrorContext {
    fn new(source: ErrorSource) -> Self {
        Self {
            source,
            system: None,
            entity: None,
            component: None,
            timestamp: SystemTime::now(),
        }
    }

    /// Context for an error caught at a system's update guard.
    #[must_use]
    pub fn system(name: impl Into<String>) -> Self {
        Self {
            system: Some(name.into()),
            ..Self::new(ErrorSource::System)
        }
    }

    /// Context for a component-localised fault.
    #[must_use]
    pub fn component(entity: EntityId, kind: impl Into<String>) -> Self {
        Self {
            entity: Some(entity),
            component: Some(kind.into()),
            ..Self::new(ErrorSource::Component)
        }
    }

    /// Context for an error reported from outside any system.
    #[must_use]
    pub fn global() -> Self {
        Self::new(ErrorSource::Global)
    }

    /// Context for a failure reported from a detached task.
    #[must_use]
    pub fn task() -> Self {
        Self::new(ErrorSource::Task)
    }

    /// Attribute this context to a system as well.
    #[must_use]
    pub fn with_system(mut self, name: impl Into<String>) -> Self {
        self.system = Some(name.into());
        self
    }
}

/// One handled error: context plus message.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Capture context.
    #[serde(flatten)]
    pub context: ErrorContext,
    /// Human-readable description.
    pub message: String,
}

/// Append-only, size-bounded error log. Oldest records are evicted first.
#[derive(Debug)]
pub struct ErrorLog {
    records: VecDeque<ErrorRecord>,
    capacity: usize,
}

impl ErrorLog {
    /// Create a log holding at most `capacity` records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append a record, evicting the oldest while the log is over capacity.
    /// A zero-capacity log keeps nothing.
    pub fn push(&mut self, record: ErrorRecord) {
        self.records.push_back(record);
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }

    /// A snapshot of the log, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ErrorRecord> {
        self.records.iter().cloned().collect()
    }

    /// Number of records currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop all records.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(msg: &str) -> ErrorRecord {
        ErrorRecord {
            context: ErrorContext::global(),
            message: msg.to_string(),
        }
    }

    #[test]
    fn test_bounded_eviction_oldest_first() {
        let mut log = ErrorLog::new(3);
        for i in 0..5 {
            log.push(record(&format!("e{i}")));
        }
        let messages: Vec<_> = log.snapshot().into_iter().map(|r| r.message).collect();
        assert_eq!(messages, vec!["e2", "e3", "e4"]);
    }

    #[test]
    fn test_zero_capacity_log_holds_nothing() {
        let mut log = ErrorLog::new(0);
        for i in 0..5 {
            log.push(record(&format!("e{i}")));
        }
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn test_clear_empties_log() {
        let mut log = ErrorLog::new(10);
        log.push(record("e"));
        assert_eq!(log.len(), 1);
        log.clear();
        assert!(log.is_empty());
        assert!(log.snapshot().is_empty());
    }

    #[test]
    fn test_component_context_fields() {
        let e = EntityId::from_raw(9);
        let ctx = ErrorContext::component(e, "Position").with_system("physics");
        assert_eq!(ctx.source, ErrorSource::Component);
        assert_eq!(ctx.entity, Some(e));
        assert_eq!(ctx.component.as_deref(), Some("Position"));
        assert_eq!(ctx.system.as_deref(), Some("physics"));
    }
}
