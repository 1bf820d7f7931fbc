// src/core/modules/mod.rs

// One file per security domain. Each module owns a fixed set of probes and
// relies on `run_probes` for concurrent execution and fault isolation.
pub mod auth;
pub mod client;
pub mod file;
pub mod post;
pub mod recon;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::core::errors::ProbeError;
use crate::core::models::{Finding, ModuleResult};
use crate::core::probe::{Probe, ProbeContext, run_probes};

pub use self::auth::AuthModule;
pub use self::client::ClientModule;
pub use self::file::FileModule;
pub use self::post::PostModule;
pub use self::recon::ReconModule;

/// A named bundle of probes for one security domain.
#[async_trait]
pub trait CheckModule: Send + Sync {
    /// The identifier the module is registered under.
    fn identifier(&self) -> &'static str;

    /// The module's probes, one per result category.
    fn probes(&self) -> Vec<Arc<dyn Probe>>;

    /// Runs every probe concurrently and returns one entry per category.
    ///
    /// Never fails: a probe that errors or panics contributes an empty list.
    async fn run(&self) -> ModuleResult {
        run_probes(self.identifier(), self.probes()).await
    }
}

/// Shared probe body for the "sensitive path answers 200" family of checks.
///
/// `paths` pairs a path with the details reported when it is served with a
/// 200. Unreachable paths are skipped.
pub(crate) async fn accessible_paths(
    ctx: &ProbeContext,
    category: &str,
    description: &str,
    paths: &[(&str, &str)],
) -> Result<Vec<Finding>, ProbeError> {
    let mut findings = Vec::new();
    for (path, details) in paths {
        let url = ctx.url(path)?;
        match ctx.get(url).await {
            Ok(response) if response.status == 200 => {
                debug!(category, path, "Path is accessible.");
                findings.push(Finding::new(category, description, *details));
            }
            Ok(response) => debug!(category, path, status = response.status, "Path not accessible."),
            Err(e) => debug!(category, path, error = %e, "Request failed, skipping path."),
        }
    }
    Ok(findings)
}
