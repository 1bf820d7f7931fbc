// tests/common/mod.rs

#![allow(dead_code)]

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use vanguard_attack_runner::{
    HttpRequest, HttpResponse, NetTransport, PortStatus, ScanConfig, Transport, TransportError,
};

/// A transport on which every call fails, as if the target were unreachable.
pub struct FailingTransport;

#[async_trait]
impl Transport for FailingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        Err(TransportError::Unavailable(format!("{} {} refused", request.method, request.url)))
    }

    async fn resolve(&self, domain: &str) -> Result<Vec<IpAddr>, TransportError> {
        Err(TransportError::Unavailable(format!("cannot resolve {}", domain)))
    }

    async fn scan(&self, host: &str, _ports: &[u16]) -> Result<Vec<PortStatus>, TransportError> {
        Err(TransportError::Unavailable(format!("cannot scan {}", host)))
    }
}

pub fn failing_transport() -> Arc<dyn Transport> {
    Arc::new(FailingTransport)
}

/// Settings for runs against a local mock server.
pub fn local_config(ports: Vec<u16>) -> ScanConfig {
    ScanConfig {
        request_timeout: Duration::from_secs(2),
        connect_timeout: Duration::from_millis(250),
        ports,
        ..ScanConfig::default()
    }
}

pub fn net_transport(config: &ScanConfig) -> Arc<dyn Transport> {
    Arc::new(NetTransport::new(config).unwrap())
}

pub fn modules(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}
