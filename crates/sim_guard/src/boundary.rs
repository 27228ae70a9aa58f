//! The error boundary.
//!
//! Wraps the world's scheduling call and makes it non-fatal regardless of
//! what any individual system does. Every captured failure flows through
//! [`ErrorBoundary::handle_error`], the single entry point: append to the
//! bounded log, update the implicated system's health (isolating it after
//! repeated errors, unless critical), offer the error to the recovery
//! strategy chain, and feed the flood detector.
//!
//! Errors from outside the tick (the driver's own catch points and detached
//! tasks) arrive through a cloned [`ErrorSink`] and are drained on the next
//! tick. There is no process-global handle: the boundary is constructed
//! explicitly and passed to whatever needs it; [`ErrorBoundary::destroy`]
//! detaches the sink at shutdown.

use std::collections::HashMap;
use std::time::{Instant, SystemTime};

use serde::Serialize;
use sim_ecs::{EntityId, SystemError, TickReport, World};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Level};

use crate::config::GuardConfig;
use crate::flood::FloodDetector;
use crate::health::{HealthMonitor, HealthStatus, SystemHealth};
use crate::record::{ErrorContext, ErrorLog, ErrorRecord, ErrorSource};
use crate::recovery::{DetachComponent, RecoveryChain, RecoveryOutcome, RecoveryStrategy};

/// Why and when an entity was quarantined. Existence of a record is the sole
/// source of truth for "excluded from all systems regardless of
/// qualification".
#[derive(Debug, Clone, Serialize)]
pub struct QuarantineRecord {
    /// The quarantined entity.
    pub entity: EntityId,
    /// Operator- or boundary-supplied reason.
    pub reason: String,
    /// When the quarantine was imposed.
    pub timestamp: SystemTime,
}

/// The recorded result of one recovery attempt.
#[derive(Debug, Clone)]
pub struct RecoveryReport {
    /// The strategy that claimed the error.
    pub strategy: &'static str,
    /// Whether recovery succeeded.
    pub succeeded: bool,
    /// The implicated system, if the error named one.
    pub system: Option<String>,
}

enum Reported {
    External { source: ErrorSource, message: String },
    Recovery(RecoveryReport),
}

/// Clonable handle for reporting errors from outside the tick: the driver's
/// own catch points (`report_global`) and detached tasks (`report_task`).
///
/// Reports made after [`ErrorBoundary::destroy`] are silently dropped.
#[derive(Clone)]
pub struct ErrorSink {
    tx: mpsc::UnboundedSender<Reported>,
}

impl ErrorSink {
    /// Report an error caught outside any system.
    pub fn report_global(&self, message: impl Into<String>) {
        let _ = self.tx.send(Reported::External {
            source: ErrorSource::Global,
            message: message.into(),
        });
    }

    /// Report a failure from a detached asynchronous task.
    pub fn report_task(&self, message: impl Into<String>) {
        let _ = self.tx.send(Reported::External {
            source: ErrorSource::Task,
            message: message.into(),
        });
    }
}

impl std::fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ErrorSink")
    }
}

/// Fault-isolation layer around the world scheduler.
pub struct ErrorBoundary {
    config: GuardConfig,
    log: ErrorLog,
    health: HealthMonitor,
    chain: RecoveryChain,
    flood: FloodDetector,
    quarantine: HashMap<EntityId, QuarantineRecord>,
    recovery_reports: Vec<RecoveryReport>,
    tx: mpsc::UnboundedSender<Reported>,
    /// `None` after `destroy()`: external reports are no longer drained.
    rx: Option<mpsc::UnboundedReceiver<Reported>>,
    /// Captured at construction; deferred recovery needs a runtime to land on.
    runtime: Option<tokio::runtime::Handle>,
}

impl ErrorBoundary {
    /// Create a boundary with the default recovery chain (the built-in
    /// [`DetachComponent`] strategy).
    #[must_use]
    pub fn new(config: GuardConfig) -> Self {
        Self::with_strategies(config, vec![Box::new(DetachComponent)])
    }

    /// Create a boundary with an explicit strategy chain. Strategies are
    /// registered once here and are immutable thereafter.
    #[must_use]
    pub fn with_strategies(
        config: GuardConfig,
        strategies: Vec<Box<dyn RecoveryStrategy>>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let boundary = Self {
            health: HealthMonitor::new(
                config.degraded_threshold_ms,
                config.min_health_samples,
                config.error_window,
            ),
            log: ErrorLog::new(config.max_error_history),
            flood: FloodDetector::new(config.max_errors_per_minute, config.flood_window),
            chain: RecoveryChain::new(strategies),
            quarantine: HashMap::new(),
            recovery_reports: Vec::new(),
            tx,
            rx: Some(rx),
            runtime: tokio::runtime::Handle::try_current().ok(),
            config,
        };
        info!(strategies = boundary.chain.len(), "error boundary armed");
        boundary
    }

    /// A clonable sink for global and detached-task error reports.
    #[must_use]
    pub fn sink(&self) -> ErrorSink {
        ErrorSink {
            tx: self.tx.clone(),
        }
    }

    // -- Tick wrapping --

    /// Run one guarded tick: schedule the world, then feed every outcome's
    /// timing and failure through the monitor and `handle_error`, then drain
    /// externally reported errors and finished deferred recoveries.
    pub fn tick(&mut self, world: &mut World, dt: f64) -> TickReport {
        let report = world.update(dt);

        for outcome in &report.outcomes {
            self.health.record_execution(&outcome.system, outcome.duration);
            if let Some(err) = &outcome.error {
                let context = match err {
                    SystemError::Component { entity, kind, .. } => {
                        ErrorContext::component(*entity, kind.clone())
                            .with_system(outcome.system.clone())
                    }
                    _ => ErrorContext::system(outcome.system.clone()),
                };
                self.handle_error(world, context, err.to_string());
            }
        }

        // Entities destroyed since the last tick take their quarantine
        // records with them.
        self.quarantine.retain(|id, _| world.entity_exists(*id));

        self.drain_reported(world);
        report
    }

    // -- Error intake --

    /// The single entry point for every error the boundary sees.
    ///
    /// Appends the record (bounded, oldest evicted), updates system health
    /// and auto-isolates after repeated errors, offers the error to the
    /// recovery chain, and feeds the flood detector. Never fails and never
    /// re-throws.
    pub fn handle_error(
        &mut self,
        world: &mut World,
        context: ErrorContext,
        message: impl Into<String>,
    ) {
        let record = ErrorRecord {
            context,
            message: message.into(),
        };
        self.emit(&record);
        self.log.push(record.clone());

        if let Some(name) = record.context.system.clone() {
            let windowed =
                self.health
                    .record_error(&name, Instant::now(), record.context.timestamp);
            let already_isolated =
                self.health.get(&name).map(|h| h.status) == Some(HealthStatus::Isolated);
            if self.config.enable_system_isolation
                && !already_isolated
                && windowed >= self.config.isolation_error_threshold
            {
                self.isolate_system(world, &name, "repeated errors");
            }
        }

        if self.config.enable_auto_recovery {
            match self.chain.dispatch(&record, world) {
                Some((strategy, RecoveryOutcome::Recovered)) => {
                    debug!(strategy, "recovery succeeded");
                    self.push_recovery(RecoveryReport {
                        strategy,
                        succeeded: true,
                        system: record.context.system.clone(),
                    });
                }
                Some((strategy, RecoveryOutcome::Failed)) => {
                    warn!(strategy, "recovery failed");
                    self.push_recovery(RecoveryReport {
                        strategy,
                        succeeded: false,
                        system: record.context.system.clone(),
                    });
                }
                Some((strategy, RecoveryOutcome::Deferred(fut))) => {
                    self.spawn_recovery(strategy, record.context.system.clone(), fut);
                }
                None => {
                    debug!("no recovery strategy claimed error; continuing");
                }
            }
        }

        if self.flood.record(Instant::now()) {
            error!(
                threshold = self.config.max_errors_per_minute,
                window_secs = self.config.flood_window.as_secs(),
                "error flood detected; entering emergency mode"
            );
            self.log.push(ErrorRecord {
                context: ErrorContext::global(),
                message: "emergency mode: error flood".to_string(),
            });
            if self.config.disable_non_critical_on_flood {
                self.isolate_non_critical(world);
            }
        }
    }

    /// Convenience intake for collaborators reporting a fault localised to
    /// one component on one entity.
    pub fn report_component_error(
        &mut self,
        world: &mut World,
        entity: EntityId,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) {
        let context = ErrorContext::component(entity, kind);
        self.handle_error(world, context, message);
    }

    // -- Quarantine --

    /// Remove an entity from every system's membership without destroying
    /// it, and record why. Returns `false` if quarantine is disabled or the
    /// entity does not exist.
    pub fn quarantine_entity(
        &mut self,
        world: &mut World,
        entity: EntityId,
        reason: impl Into<String>,
    ) -> bool {
        if !self.config.enable_entity_quarantine {
            return false;
        }
        if !world.quarantine_entity(entity) {
            warn!(entity = %entity, "cannot quarantine unknown entity");
            return false;
        }
        let reason = reason.into();
        warn!(entity = %entity, reason = %reason, "entity quarantined");
        self.quarantine.insert(
            entity,
            QuarantineRecord {
                entity,
                reason,
                timestamp: SystemTime::now(),
            },
        );
        true
    }

    /// Lift a quarantine: the record is removed and the entity is
    /// re-evaluated against every system's requirement predicate. Returns
    /// `false` if the entity was not quarantined.
    pub fn release_entity(&mut self, world: &mut World, entity: EntityId) -> bool {
        if self.quarantine.remove(&entity).is_none() {
            return false;
        }
        world.release_entity(entity);
        info!(entity = %entity, "entity released from quarantine");
        true
    }

    /// Currently quarantined entities, in id order.
    #[must_use]
    pub fn quarantined_entities(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.quarantine.keys().copied().collect();
        ids.sort();
        ids
    }

    /// The full quarantine record for an entity, if present.
    #[must_use]
    pub fn quarantine_record(&self, entity: EntityId) -> Option<&QuarantineRecord> {
        self.quarantine.get(&entity)
    }

    // -- Isolation --

    /// Disable a system without unregistering it; membership and state are
    /// preserved. A no-op returning `false` for critical systems (declared
    /// on the system or named in the config), unknown systems, or when
    /// isolation is disabled.
    pub fn isolate_system(&mut self, world: &mut World, name: &str, reason: &str) -> bool {
        if !self.config.enable_system_isolation {
            return false;
        }
        let declared_critical = world.system_critical(name).unwrap_or(false);
        if declared_critical || self.config.critical_systems.contains(name) {
            info!(system = name, "isolation refused: critical system");
            return false;
        }
        if world.set_system_enabled(name, false).is_err() {
            warn!(system = name, "cannot isolate unknown system");
            return false;
        }
        self.health.mark_isolated(name);
        warn!(system = name, reason, "system isolated");
        true
    }

    /// Re-enable an isolated system and reset its health status to healthy.
    /// Returns `false` for an unknown system.
    pub fn restore_system(&mut self, world: &mut World, name: &str) -> bool {
        if world.set_system_enabled(name, true).is_err() {
            warn!(system = name, "cannot restore unknown system");
            return false;
        }
        self.health.reset(name);
        info!(system = name, "system restored");
        true
    }

    /// Names of currently isolated systems, sorted.
    #[must_use]
    pub fn isolated_systems(&self) -> Vec<String> {
        self.health
            .all()
            .into_iter()
            .filter(|h| h.status == HealthStatus::Isolated)
            .map(|h| h.name.clone())
            .collect()
    }

    fn isolate_non_critical(&mut self, world: &mut World) {
        for name in world.system_names() {
            let critical = world.system_critical(&name).unwrap_or(false)
                || self.config.critical_systems.contains(&name);
            let already = world.system_enabled(&name) == Some(false);
            if !critical && !already {
                self.isolate_system(world, &name, "error flood");
            }
        }
    }

    // -- Diagnostics --

    /// Health record for one system.
    #[must_use]
    pub fn system_health(&self, name: &str) -> Option<&SystemHealth> {
        self.health.get(name)
    }

    /// Health records for every system the boundary has seen.
    #[must_use]
    pub fn all_system_health(&self) -> Vec<&SystemHealth> {
        self.health.all()
    }

    /// Snapshot of the bounded error log, oldest first.
    #[must_use]
    pub fn error_history(&self) -> Vec<ErrorRecord> {
        self.log.snapshot()
    }

    /// Drop all error records.
    pub fn clear_error_history(&mut self) {
        self.log.clear();
    }

    /// Outcomes of completed recovery attempts, in completion order.
    #[must_use]
    pub fn recovery_reports(&self) -> &[RecoveryReport] {
        &self.recovery_reports
    }

    /// Whether a flood episode is currently active.
    #[must_use]
    pub fn in_emergency(&self) -> bool {
        self.flood.active(Instant::now())
    }

    /// Detach the external sink. Reports made after this are dropped and no
    /// longer drained; the boundary's own tick wrapping keeps working.
    pub fn destroy(&mut self) {
        self.rx = None;
        info!("error boundary destroyed; external sink detached");
    }

    // -- Internals --

    fn push_recovery(&mut self, report: RecoveryReport) {
        self.recovery_reports.push(report);
        while self.recovery_reports.len() > self.config.max_error_history {
            self.recovery_reports.remove(0);
        }
    }

    fn spawn_recovery(
        &mut self,
        strategy: &'static str,
        system: Option<String>,
        fut: futures::future::BoxFuture<'static, bool>,
    ) {
        let Some(handle) = &self.runtime else {
            warn!(strategy, "no async runtime; deferred recovery skipped");
            self.push_recovery(RecoveryReport {
                strategy,
                succeeded: false,
                system,
            });
            return;
        };
        debug!(strategy, "deferred recovery spawned");
        let tx = self.tx.clone();
        handle.spawn(async move {
            let succeeded = fut.await;
            let _ = tx.send(Reported::Recovery(RecoveryReport {
                strategy,
                succeeded,
                system,
            }));
        });
    }

    fn drain_reported(&mut self, world: &mut World) {
        let Some(rx) = self.rx.as_mut() else {
            return;
        };
        let mut pending = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            pending.push(msg);
        }
        for msg in pending {
            match msg {
                Reported::External { source, message } => {
                    let context = match source {
                        ErrorSource::Task => ErrorContext::task(),
                        _ => ErrorContext::global(),
                    };
                    self.handle_error(world, context, message);
                }
                Reported::Recovery(report) => {
                    if report.succeeded {
                        debug!(strategy = report.strategy, "deferred recovery succeeded");
                    } else {
                        warn!(strategy = report.strategy, "deferred recovery failed");
                    }
                    self.push_recovery(report);
                }
            }
        }
    }

    fn emit(&self, record: &ErrorRecord) {
        // `event!` needs a const level, so fan out over the configured one.
        macro_rules! emit_at {
            ($level:ident) => {
                tracing::$level!(
                    source = %record.context.source,
                    system = record.context.system.as_deref().unwrap_or("-"),
                    entity = ?record.context.entity,
                    component = record.context.component.as_deref().unwrap_or("-"),
                    message = %record.message,
                    "error handled"
                )
            };
        }
        let level = self.config.log_level;
        if level == Level::ERROR {
            emit_at!(error);
        } else if level == Level::WARN {
            emit_at!(warn);
        } else if level == Level::INFO {
            emit_at!(info);
        } else if level == Level::DEBUG {
            emit_at!(debug);
        } else {
            emit_at!(trace);
        }
    }
}

impl std::fmt::Debug for ErrorBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorBoundary")
            .field("errors", &self.log.len())
            .field("quarantined", &self.quarantine.len())
            .field("strategies", &self.chain.len())
            .finish_non_exhaustive()
    }
}
