// src/core/probe.rs

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::ScanConfig;
use crate::core::errors::{ProbeError, TransportError};
use crate::core::models::{Finding, ModuleResult};
use crate::core::transport::{HttpRequest, HttpResponse, RequestBody, Transport};

/// Everything a probe is bound to: the target, the transport and the settings.
///
/// Shared read-only between every probe of a run.
pub struct ProbeContext {
    target: String,
    transport: Arc<dyn Transport>,
    config: Arc<ScanConfig>,
}

impl ProbeContext {
    pub fn new(target: impl Into<String>, transport: Arc<dyn Transport>, config: Arc<ScanConfig>) -> Self {
        Self { target: target.into(), transport, config }
    }

    /// The target exactly as it was requested.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// The target parsed as a URL. Anything without an `http://` or
    /// `https://` prefix, `host:port` included, is treated as `https://target`.
    pub fn base_url(&self) -> Result<Url, ProbeError> {
        let target = self.target.trim();
        let lower = target.to_ascii_lowercase();
        let url = if lower.starts_with("http://") || lower.starts_with("https://") {
            Url::parse(target)?
        } else {
            Url::parse(&format!("https://{}", target))?
        };
        if url.host_str().is_none() {
            return Err(ProbeError::Other(format!("target {} has no host", self.target)));
        }
        Ok(url)
    }

    /// Resolves `path` against the target, replacing the target's own path.
    pub fn url(&self, path: &str) -> Result<Url, ProbeError> {
        Ok(self.base_url()?.join(path)?)
    }

    /// `path` on the target with a single query parameter attached.
    pub fn url_with_query(&self, path: &str, param: &str, value: &str) -> Result<Url, ProbeError> {
        let mut url = self.url(path)?;
        url.query_pairs_mut().clear().append_pair(param, value);
        Ok(url)
    }

    /// Host name of the target, without scheme, port or path.
    pub fn host(&self) -> Result<String, ProbeError> {
        self.base_url()?
            .host_str()
            .map(str::to_string)
            .ok_or_else(|| ProbeError::Other(format!("target {} has no host", self.target)))
    }

    pub async fn get(&self, url: Url) -> Result<HttpResponse, TransportError> {
        self.transport
            .send(HttpRequest::get(url, self.config.request_timeout))
            .await
    }

    pub async fn post(&self, url: Url, body: RequestBody) -> Result<HttpResponse, TransportError> {
        self.transport
            .send(HttpRequest::post(url, body, self.config.request_timeout))
            .await
    }
}

/// A single check against the target, bound to it at construction.
///
/// Transport failures should be handled inside `run` and turned into "no
/// findings"; anything that still escapes (an `Err` or a panic) is contained
/// by [`run_probes`].
#[async_trait]
pub trait Probe: Send + Sync {
    /// The category this probe populates in its module's result.
    fn category(&self) -> &'static str;

    async fn run(&self) -> Result<Vec<Finding>, ProbeError>;
}

/// A probe whose body is an async function of the shared context.
pub struct ProbeFn<F> {
    category: &'static str,
    ctx: Arc<ProbeContext>,
    body: F,
}

impl<F> ProbeFn<F> {
    pub fn new(category: &'static str, ctx: Arc<ProbeContext>, body: F) -> Self {
        Self { category, ctx, body }
    }
}

#[async_trait]
impl<F, Fut> Probe for ProbeFn<F>
where
    F: Fn(Arc<ProbeContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<Finding>, ProbeError>> + Send + 'static,
{
    fn category(&self) -> &'static str {
        self.category
    }

    async fn run(&self) -> Result<Vec<Finding>, ProbeError> {
        (self.body)(Arc::clone(&self.ctx)).await
    }
}

/// Shorthand for boxing a [`ProbeFn`].
pub fn probe<F, Fut>(category: &'static str, ctx: &Arc<ProbeContext>, body: F) -> Arc<dyn Probe>
where
    F: Fn(Arc<ProbeContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<Finding>, ProbeError>> + Send + 'static,
{
    Arc::new(ProbeFn::new(category, Arc::clone(ctx), body))
}

/// Runs every probe on its own task and merges the outputs.
///
/// The result holds exactly one entry per probe category. A probe that
/// returns an error or panics leaves its category empty; the others are
/// unaffected. Returns once every probe has finished.
pub async fn run_probes(module: &str, probes: Vec<Arc<dyn Probe>>) -> ModuleResult {
    info!(module, probes = probes.len(), "Launching probes.");

    let mut result = ModuleResult::new();
    let mut categories = HashMap::with_capacity(probes.len());
    let mut tasks = JoinSet::new();

    for probe in probes {
        let category = probe.category();
        result.insert(category.to_string(), Vec::new());
        let handle = tasks.spawn(async move { probe.run().await });
        categories.insert(handle.id(), category);
    }

    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((id, Ok(findings))) => {
                let category = categories.get(&id).copied().unwrap_or("unknown");
                debug!(module, category, findings = findings.len(), "Probe finished.");
                result.insert(category.to_string(), findings);
            }
            Ok((id, Err(e))) => {
                let category = categories.get(&id).copied().unwrap_or("unknown");
                warn!(module, category, error = %e, "Probe failed, recording no findings.");
            }
            Err(e) => {
                let category = categories.get(&e.id()).copied().unwrap_or("unknown");
                error!(module, category, panicked = e.is_panic(), error = %e, "Probe task aborted, recording no findings.");
            }
        }
    }

    let total: usize = result.values().map(Vec::len).sum();
    info!(module, findings = total, "All probes finished.");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::PortStatus;
    use std::net::IpAddr;
    use std::time::{Duration, Instant};

    struct OfflineTransport;

    #[async_trait]
    impl Transport for OfflineTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::Unavailable("offline".into()))
        }

        async fn resolve(&self, _domain: &str) -> Result<Vec<IpAddr>, TransportError> {
            Err(TransportError::Unavailable("offline".into()))
        }

        async fn scan(&self, _host: &str, _ports: &[u16]) -> Result<Vec<PortStatus>, TransportError> {
            Err(TransportError::Unavailable("offline".into()))
        }
    }

    fn context(target: &str) -> Arc<ProbeContext> {
        Arc::new(ProbeContext::new(target, Arc::new(OfflineTransport), Arc::new(ScanConfig::default())))
    }

    #[test]
    fn urls_are_joined_against_the_target_root() {
        let ctx = context("http://example.test/app/index.html");
        assert_eq!(ctx.url("/login").unwrap().as_str(), "http://example.test/login");
        assert_eq!(ctx.host().unwrap(), "example.test");

        let bare = context("example.test");
        assert_eq!(bare.url("/admin").unwrap().as_str(), "https://example.test/admin");

        let with_port = context("localhost:3000");
        assert_eq!(with_port.url("/login").unwrap().as_str(), "https://localhost:3000/login");
        assert_eq!(with_port.host().unwrap(), "localhost");
        assert_eq!(
            with_port.url_with_query("/", "q", "x").unwrap().as_str(),
            "https://localhost:3000/?q=x"
        );
    }

    #[test]
    fn query_values_are_encoded() {
        let ctx = context("http://example.test");
        let url = ctx.url_with_query("/", "q", "<script>alert(1)</script>").unwrap();
        assert_eq!(url.query_pairs().next().unwrap().1, "<script>alert(1)</script>");
        assert!(!url.as_str().contains('<'));
    }

    #[tokio::test]
    async fn every_category_is_present_even_when_probes_fail() {
        let ctx = context("http://example.test");
        let probes = vec![
            probe("ok", &ctx, |_ctx| async {
                Ok::<_, ProbeError>(vec![Finding::new("ok", "first", "a"), Finding::new("ok", "second", "b")])
            }),
            probe("errors", &ctx, |_ctx| async {
                Err::<Vec<Finding>, _>(ProbeError::Other("broken".into()))
            }),
            probe("panics", &ctx, |_ctx| async {
                if true {
                    panic!("probe bug");
                }
                Ok::<Vec<Finding>, ProbeError>(Vec::new())
            }),
            probe("empty", &ctx, |_ctx| async { Ok::<Vec<Finding>, ProbeError>(Vec::new()) }),
        ];

        let result = run_probes("test", probes).await;

        assert_eq!(result.len(), 4);
        assert!(result["errors"].is_empty());
        assert!(result["panics"].is_empty());
        assert!(result["empty"].is_empty());
        let descriptions: Vec<_> = result["ok"].iter().map(|f| f.description.as_str()).collect();
        assert_eq!(descriptions, ["first", "second"]);
    }

    #[tokio::test]
    async fn probes_run_concurrently() {
        let ctx = context("http://example.test");
        let probes = ["a", "b", "c", "d"]
            .into_iter()
            .map(|category| {
                probe(category, &ctx, |_ctx| async {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok::<Vec<Finding>, ProbeError>(Vec::new())
                })
            })
            .collect();

        let started = Instant::now();
        let result = run_probes("slow", probes).await;

        assert_eq!(result.len(), 4);
        assert!(started.elapsed() < Duration::from_millis(2500));
    }

    #[tokio::test]
    async fn transport_failures_reach_the_probe_as_errors() {
        let ctx = context("http://example.test");
        let url = ctx.url("/").unwrap();
        assert!(ctx.get(url).await.is_err());
        assert!(ctx.transport().resolve("example.test").await.is_err());
    }
}
