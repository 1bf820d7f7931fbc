// src/core/transport.rs

//! The network capability consumed by probes.
//!
//! Probes never talk to `reqwest`, the DNS resolver or sockets directly; they
//! go through [`Transport`], which keeps every call bounded by a timeout and
//! lets tests swap the network out entirely.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use reqwest::Method;
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use strum::Display;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::ScanConfig;
use crate::core::errors::{RunnerError, TransportError};

/// Body of an outgoing request.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Form(Vec<(String, String)>),
    Json(serde_json::Value),
    Multipart {
        field: String,
        file_name: String,
        content: String,
        content_type: String,
    },
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub body: RequestBody,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: Url, timeout: Duration) -> Self {
        Self { method: Method::GET, url, body: RequestBody::Empty, timeout }
    }

    pub fn post(url: Url, body: RequestBody, timeout: Duration) -> Self {
        Self { method: Method::POST, url, body, timeout }
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    /// Returns a header value, or `None` if it is missing or not valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All `Set-Cookie` values of the response.
    pub fn set_cookies(&self) -> Vec<&str> {
        self.headers
            .get_all("set-cookie")
            .into_iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Open,
    Closed,
    Filtered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortStatus {
    pub port: u16,
    pub protocol: &'static str,
    pub state: PortState,
    pub service: &'static str,
}

impl PortStatus {
    pub fn tcp(port: u16, state: PortState) -> Self {
        Self { port, protocol: "tcp", state, service: service_name(port) }
    }
}

/// Well-known service name for a TCP port.
pub fn service_name(port: u16) -> &'static str {
    match port {
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 => "smtp",
        53 => "domain",
        80 | 8000 | 8080 => "http",
        110 => "pop3",
        111 => "rpcbind",
        135 => "msrpc",
        139 => "netbios-ssn",
        143 => "imap",
        443 | 8443 => "https",
        445 => "microsoft-ds",
        993 => "imaps",
        995 => "pop3s",
        1433 => "ms-sql-s",
        1521 => "oracle",
        2049 => "nfs",
        3306 => "mysql",
        3389 => "ms-wbt-server",
        5432 => "postgresql",
        5900 => "vnc",
        6379 => "redis",
        9200 => "elasticsearch",
        27017 => "mongodb",
        _ => "unknown",
    }
}

/// Request/response, name resolution and port sweep capability.
///
/// Implementations must bound every call with a timeout and must not retry
/// on their own behalf.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    async fn resolve(&self, domain: &str) -> Result<Vec<IpAddr>, TransportError>;

    async fn scan(&self, host: &str, ports: &[u16]) -> Result<Vec<PortStatus>, TransportError>;
}

/// Production transport backed by `reqwest`, `hickory-resolver` and tokio sockets.
pub struct NetTransport {
    client: reqwest::Client,
    resolver: TokioAsyncResolver,
    request_timeout: Duration,
    connect_timeout: Duration,
}

impl NetTransport {
    pub fn new(config: &ScanConfig) -> Result<Self, RunnerError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                error!(error = %e, "Failed to build HTTP client.");
                RunnerError::Fatal(format!("Failed to build HTTP client: {}", e))
            })?;

        let mut opts = ResolverOpts::default();
        opts.timeout = config.request_timeout;
        opts.attempts = 1;
        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), opts);

        Ok(Self {
            client,
            resolver,
            request_timeout: config.request_timeout,
            connect_timeout: config.connect_timeout,
        })
    }

    async fn scan_address(&self, ip: IpAddr, ports: &[u16]) -> Vec<PortStatus> {
        let mut tasks = JoinSet::new();
        for &port in ports {
            let connect_timeout = self.connect_timeout;
            tasks.spawn(async move {
                let state = match timeout(connect_timeout, TcpStream::connect((ip, port))).await {
                    Ok(Ok(_)) => PortState::Open,
                    Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => PortState::Closed,
                    _ => PortState::Filtered,
                };
                PortStatus::tcp(port, state)
            });
        }

        let mut statuses = Vec::with_capacity(ports.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(status) => statuses.push(status),
                Err(e) => warn!(error = %e, "Port connect task failed."),
            }
        }
        statuses.sort_by_key(|s| s.port);
        statuses
    }
}

#[async_trait]
impl Transport for NetTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "Sending HTTP request.");
        let builder = self
            .client
            .request(request.method, request.url)
            .timeout(request.timeout);

        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart { field, file_name, content, content_type } => {
                let part = Part::text(content).file_name(file_name).mime_str(&content_type)?;
                builder.multipart(Form::new().part(field, part))
            }
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;
        debug!(status, bytes = body.len(), "Received HTTP response.");
        Ok(HttpResponse { status, headers, body })
    }

    async fn resolve(&self, domain: &str) -> Result<Vec<IpAddr>, TransportError> {
        debug!(domain, "Resolving domain.");
        let lookup = timeout(self.request_timeout, self.resolver.lookup_ip(domain))
            .await
            .map_err(|_| TransportError::Timeout(self.request_timeout))??;
        Ok(lookup.iter().collect())
    }

    async fn scan(&self, host: &str, ports: &[u16]) -> Result<Vec<PortStatus>, TransportError> {
        let ip = match host.parse::<IpAddr>() {
            Ok(ip) => ip,
            Err(_) => self
                .resolve(host)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| TransportError::InvalidTarget(format!("{} has no addresses", host)))?,
        };

        info!(host, %ip, ports = ports.len(), "Starting TCP connect sweep.");
        let statuses = self.scan_address(ip, ports).await;
        let open = statuses.iter().filter(|s| s.state == PortState::Open).count();
        info!(host, open, "TCP connect sweep finished.");
        Ok(statuses)
    }
}
