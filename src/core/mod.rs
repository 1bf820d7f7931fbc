// src/core/mod.rs

// The `core` module holds the probing engine: data models, the transport
// seam, the probe harness, the check modules and the orchestration on top.

/// Findings, per-module results and the final report.
pub mod models;

/// Error taxonomy shared by probes, the registry and the runner.
pub mod errors;

/// The network capability probes are built on (HTTP, DNS, TCP sweep).
pub mod transport;

/// Probe contract and the concurrent, fault-isolating probe harness.
pub mod probe;

/// The built-in check modules, one per security domain.
pub mod modules;

/// Static lookup from module identifier to constructor.
pub mod registry;

/// Runs the requested modules against a target and assembles the report.
pub mod runner;
