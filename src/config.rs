// src/config.rs

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Ports probed by the recon sweep when no explicit list is configured.
pub const COMMON_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 111, 135, 139, 143, 443, 445, 993, 995, 1433, 1521, 2049,
    3306, 3389, 5432, 5900, 6379, 8000, 8080, 8443, 9200, 27017,
];

pub const DEFAULT_USER_AGENT: &str = "VanguardRS/0.1";

/// How the attack runner schedules the requested modules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One module at a time; probes inside each module still run concurrently.
    #[default]
    Sequential,
    /// Up to `max_concurrent_modules` modules at once.
    Concurrent,
}

/// Runtime settings shared by the runner, the transport and every probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Upper bound for any single HTTP request or DNS lookup.
    pub request_timeout: Duration,
    /// Upper bound for a single TCP connect during the port sweep.
    pub connect_timeout: Duration,
    pub user_agent: String,
    pub execution: ExecutionMode,
    pub max_concurrent_modules: usize,
    pub ports: Vec<u16>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_millis(750),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            execution: ExecutionMode::Sequential,
            max_concurrent_modules: 2,
            ports: COMMON_PORTS.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_probe_timeouts_bounded() {
        let config = ScanConfig::default();
        assert!(config.request_timeout >= Duration::from_secs(5));
        assert!(config.request_timeout <= Duration::from_secs(10));
        assert_eq!(config.execution, ExecutionMode::Sequential);
        assert!(config.max_concurrent_modules > 0);
        assert!(config.ports.contains(&443));
    }
}
