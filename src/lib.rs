// src/lib.rs

pub mod config;
pub mod core;
pub mod logging;

pub use crate::config::{ExecutionMode, ScanConfig};
pub use crate::core::errors::{ProbeError, RunnerError, TransportError};
pub use crate::core::models::{Finding, ModuleOutcome, ModuleResult, Report, ReportSummary, ScanEnvelope};
pub use crate::core::modules::CheckModule;
pub use crate::core::probe::{Probe, ProbeContext, probe, run_probes};
pub use crate::core::registry::{DEFAULT_REGISTRY, ModuleKind, ModuleRegistry, ModuleSpec};
pub use crate::core::runner::AttackRunner;
pub use crate::core::transport::{HttpRequest, HttpResponse, NetTransport, PortState, PortStatus, RequestBody, Transport};
