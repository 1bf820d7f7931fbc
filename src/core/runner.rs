// src/core/runner.rs

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use strum::Display;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::{ExecutionMode, ScanConfig};
use crate::core::errors::RunnerError;
use crate::core::models::{ModuleOutcome, Report};
use crate::core::probe::ProbeContext;
use crate::core::registry::{DEFAULT_REGISTRY, ModuleRegistry};
use crate::core::transport::{NetTransport, Transport};

/// Lifecycle of one requested module identifier.
///
/// `Pending → Resolving → Running → Completed | Failed`, or
/// `Resolving → ResolveFailed | Failed` when the identifier is unknown or
/// its constructor panics. There are no retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ModuleState {
    Pending,
    Resolving,
    ResolveFailed,
    Running,
    Completed,
    Failed,
}

/// Runs the requested modules against one target and assembles the report.
pub struct AttackRunner {
    target: String,
    modules: Vec<String>,
    registry: &'static ModuleRegistry,
    transport: Arc<dyn Transport>,
    config: Arc<ScanConfig>,
}

impl AttackRunner {
    pub fn new(target: impl Into<String>, modules: Vec<String>, transport: Arc<dyn Transport>) -> Self {
        let target = target.into();
        info!(target = %target, modules = ?modules, "Initialized attack runner.");
        Self {
            target,
            modules,
            registry: &DEFAULT_REGISTRY,
            transport,
            config: Arc::new(ScanConfig::default()),
        }
    }

    /// Validates the invocation and builds a runner on the network transport.
    ///
    /// This is the only place a run can fail outright: errors here happen
    /// before any module is processed.
    pub fn from_config(target: &str, modules: Vec<String>, config: ScanConfig) -> Result<Self, RunnerError> {
        if target.trim().is_empty() {
            return Err(RunnerError::Fatal("target must not be empty".to_string()));
        }
        if modules.is_empty() {
            return Err(RunnerError::Fatal("at least one module is required".to_string()));
        }
        let transport = NetTransport::new(&config)?;
        Ok(Self::new(target, modules, Arc::new(transport)).with_config(config))
    }

    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn with_registry(mut self, registry: &'static ModuleRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    /// Runs every requested module and returns one entry per identifier.
    ///
    /// Never fails: unknown identifiers and failed modules become error
    /// records. A repeated identifier keeps the outcome of its last occurrence.
    pub async fn run(&self) -> Report {
        info!(target = %self.target, modules = self.modules.len(), mode = ?self.config.execution, "Starting attack run.");
        let ctx = Arc::new(ProbeContext::new(
            self.target.clone(),
            Arc::clone(&self.transport),
            Arc::clone(&self.config),
        ));

        let report = match self.config.execution {
            ExecutionMode::Sequential => self.run_sequential(ctx).await,
            ExecutionMode::Concurrent => self.run_concurrent(ctx).await,
        };

        let summary = report.summary();
        info!(
            completed = summary.modules_completed,
            failed = summary.modules_failed,
            findings = summary.total_findings,
            "Attack run completed."
        );
        report
    }

    async fn run_sequential(&self, ctx: Arc<ProbeContext>) -> Report {
        let mut report = Report::new();
        for identifier in &self.modules {
            let outcome = execute_module(self.registry, Arc::clone(&ctx), identifier.clone()).await;
            report.record(identifier, outcome);
        }
        report
    }

    async fn run_concurrent(&self, ctx: Arc<ProbeContext>) -> Report {
        let limit = Arc::new(Semaphore::new(self.config.max_concurrent_modules.max(1)));
        let mut tasks = JoinSet::new();
        let mut requested = HashMap::with_capacity(self.modules.len());

        for (index, identifier) in self.modules.iter().enumerate() {
            let limit = Arc::clone(&limit);
            let ctx = Arc::clone(&ctx);
            let registry = self.registry;
            let owned = identifier.clone();
            let handle = tasks.spawn(async move {
                // The semaphore is never closed, so a failed acquire only
                // means running without a permit.
                let _permit = limit.acquire_owned().await.ok();
                execute_module(registry, ctx, owned).await
            });
            requested.insert(handle.id(), (index, identifier.as_str()));
        }

        let mut finished = Vec::with_capacity(self.modules.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, outcome)) => {
                    if let Some(&(index, identifier)) = requested.get(&id) {
                        finished.push((index, identifier, outcome));
                    }
                }
                Err(e) => {
                    if let Some(&(index, identifier)) = requested.get(&e.id()) {
                        error!(module = identifier, error = %e, "Module task aborted.");
                        let err = RunnerError::ModuleExecution(join_error_message(e));
                        finished.push((index, identifier, ModuleOutcome::failed(err.to_string())));
                    }
                }
            }
        }

        // Apply in request order so a repeated identifier keeps its last occurrence.
        finished.sort_by_key(|(index, _, _)| *index);
        let mut report = Report::new();
        for (_, identifier, outcome) in finished {
            report.record(identifier, outcome);
        }
        report
    }
}

/// Resolves and runs a single module, converting every failure into an
/// error record.
///
/// Construction and execution share one task, so a panic in either the
/// factory or the module is caught here instead of tearing down the run.
async fn execute_module(
    registry: &'static ModuleRegistry,
    ctx: Arc<ProbeContext>,
    identifier: String,
) -> ModuleOutcome {
    debug!(module = %identifier, state = %ModuleState::Pending, "Module queued.");

    let task_identifier = identifier.clone();
    let task = tokio::spawn(async move {
        debug!(module = %task_identifier, state = %ModuleState::Resolving, "Resolving module.");
        let module = registry.resolve(&task_identifier, &ctx)?;
        info!(module = %task_identifier, state = %ModuleState::Running, "Starting module.");
        Ok::<_, RunnerError>(module.run().await)
    });

    match task.await {
        Ok(Ok(result)) => {
            let findings: usize = result.values().map(Vec::len).sum();
            info!(module = %identifier, state = %ModuleState::Completed, categories = result.len(), findings, "Module completed.");
            ModuleOutcome::Completed(result)
        }
        Ok(Err(e)) => {
            error!(module = %identifier, state = %ModuleState::ResolveFailed, error = %e, "Failed to resolve module.");
            ModuleOutcome::failed(format!("Module import failed: {}", e))
        }
        Err(e) => {
            let err = RunnerError::ModuleExecution(join_error_message(e));
            error!(module = %identifier, state = %ModuleState::Failed, error = %err, "Module execution failed.");
            ModuleOutcome::failed(err.to_string())
        }
    }
}

fn join_error_message(e: JoinError) -> String {
    if e.is_cancelled() {
        warn!("Module task was cancelled.");
        return "module task was cancelled".to_string();
    }
    panic_message(e.into_panic())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "module panicked".to_string()
    }
}
