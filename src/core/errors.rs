// src/core/errors.rs

use std::time::Duration;

use thiserror::Error;

/// Failures of the transport collaborator (HTTP, DNS, TCP).
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("DNS Error: {0}")]
    Resolve(#[from] hickory_resolver::error::ResolveError),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// An error escaping a probe body. The module harness records it as an
/// empty finding list for the probe's category.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid probe URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("{0}")]
    Other(String),
}

/// Errors surfaced at the attack runner boundary.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The identifier is not in the module registry.
    #[error("Unknown module: {0}")]
    UnknownModule(String),

    /// A module failed despite probe isolation (a panic escaped its task).
    #[error("{0}")]
    ModuleExecution(String),

    /// Raised before any module is processed; aborts the whole run.
    #[error("fatal: {0}")]
    Fatal(String),
}
