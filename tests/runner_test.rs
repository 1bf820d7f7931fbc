// tests/runner_test.rs

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::json;
use vanguard_attack_runner::core::modules::{auth, post, recon};
use vanguard_attack_runner::{
    AttackRunner, CheckModule, ExecutionMode, Finding, ModuleRegistry, ModuleResult, ModuleSpec, Probe,
    ProbeContext, ProbeError, ScanConfig, probe,
};

use common::{failing_transport, modules};

const TARGET: &str = "http://example.test";

fn runner(ids: &[&str]) -> AttackRunner {
    AttackRunner::new(TARGET, modules(ids), failing_transport())
}

fn assert_empty_categories(result: &ModuleResult, categories: &[&str]) {
    let keys: Vec<&str> = result.keys().map(String::as_str).collect();
    let mut expected = categories.to_vec();
    expected.sort_unstable();
    assert_eq!(keys, expected);
    assert!(result.values().all(Vec::is_empty));
}

// --- Test modules ---

static EXECUTIONS: AtomicUsize = AtomicUsize::new(0);

/// Reports which execution of the module produced the result.
struct CountingModule {
    ctx: Arc<ProbeContext>,
    execution: usize,
}

impl CheckModule for CountingModule {
    fn identifier(&self) -> &'static str {
        "auth"
    }

    fn probes(&self) -> Vec<Arc<dyn Probe>> {
        let execution = self.execution;
        vec![probe("runs", &self.ctx, move |_ctx| async move {
            Ok::<_, ProbeError>(vec![Finding::new("runs", "execution", execution.to_string())])
        })]
    }
}

fn counting_module(ctx: Arc<ProbeContext>) -> Box<dyn CheckModule> {
    let execution = EXECUTIONS.fetch_add(1, Ordering::SeqCst) + 1;
    Box::new(CountingModule { ctx, execution })
}

/// A module whose run escapes its own probe isolation.
struct ExplodingModule;

#[async_trait]
impl CheckModule for ExplodingModule {
    fn identifier(&self) -> &'static str {
        "explode"
    }

    fn probes(&self) -> Vec<Arc<dyn Probe>> {
        Vec::new()
    }

    async fn run(&self) -> ModuleResult {
        panic!("module exploded");
    }
}

fn exploding_module(_ctx: Arc<ProbeContext>) -> Box<dyn CheckModule> {
    Box::new(ExplodingModule)
}

/// Four probes that each take about a second.
struct SlowModule {
    ctx: Arc<ProbeContext>,
}

impl CheckModule for SlowModule {
    fn identifier(&self) -> &'static str {
        "slow"
    }

    fn probes(&self) -> Vec<Arc<dyn Probe>> {
        ["one", "two", "three", "four"]
            .into_iter()
            .map(|category| {
                probe(category, &self.ctx, move |_ctx| async move {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok::<_, ProbeError>(vec![Finding::new(category, "slept", "1s")])
                })
            })
            .collect()
    }
}

fn slow_module(ctx: Arc<ProbeContext>) -> Box<dyn CheckModule> {
    Box::new(SlowModule { ctx })
}

fn exploding_factory(_ctx: Arc<ProbeContext>) -> Box<dyn CheckModule> {
    panic!("factory exploded");
}

static COUNTING_REGISTRY: Lazy<ModuleRegistry> =
    Lazy::new(|| ModuleRegistry::new().register(ModuleSpec::new("auth", counting_module)));

static MIXED_REGISTRY: Lazy<ModuleRegistry> = Lazy::new(|| {
    ModuleRegistry::with_default_modules()
        .register(ModuleSpec::new("explode", exploding_module))
        .register(ModuleSpec::new("slow", slow_module))
        .register(ModuleSpec::new("boom", exploding_factory))
});

// --- Scenarios ---

#[tokio::test]
async fn unreachable_target_yields_empty_categories() {
    let report = runner(&["recon", "auth"]).run().await;

    assert_eq!(report.identifiers().collect::<Vec<_>>(), ["auth", "recon"]);
    assert_empty_categories(report.get("recon").unwrap().result().unwrap(), recon::CATEGORIES);
    assert_empty_categories(report.get("auth").unwrap().result().unwrap(), auth::CATEGORIES);
}

#[tokio::test]
async fn unknown_module_becomes_an_error_entry() {
    let report = runner(&["bogus"]).run().await;

    assert_eq!(
        serde_json::to_value(&report).unwrap(),
        json!({"bogus": {"error": "Module import failed: Unknown module: bogus"}})
    );
}

#[tokio::test]
async fn unknown_module_does_not_stop_the_others() {
    let report = runner(&["post", "bogus", "client"]).run().await;

    assert_eq!(report.len(), 3);
    assert!(report.get("bogus").unwrap().is_failed());
    assert!(report.get("post").unwrap().result().is_some());
    assert!(report.get("client").unwrap().result().is_some());
    assert_eq!(report.summary().modules_failed, 1);
}

#[tokio::test]
async fn duplicate_identifier_keeps_the_later_execution() {
    let report = runner(&["auth", "auth"])
        .with_registry(&COUNTING_REGISTRY)
        .run()
        .await;

    assert_eq!(report.len(), 1);
    let runs = &report.get("auth").unwrap().result().unwrap()["runs"];
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].details, "2");
}

#[tokio::test]
async fn duplicate_builtin_module_is_recorded_once() {
    let report = runner(&["auth", "auth"]).run().await;

    assert_eq!(report.len(), 1);
    assert_empty_categories(report.get("auth").unwrap().result().unwrap(), auth::CATEGORIES);
}

#[tokio::test]
async fn panicking_module_is_recorded_as_failed() {
    let report = runner(&["explode", "post"])
        .with_registry(&MIXED_REGISTRY)
        .run()
        .await;

    assert_eq!(report.get("explode").unwrap().error(), Some("module exploded"));
    assert!(report.get("post").unwrap().result().is_some());
}

#[tokio::test]
async fn panicking_constructor_is_recorded_as_failed() {
    let report = runner(&["post", "boom", "auth"])
        .with_registry(&MIXED_REGISTRY)
        .run()
        .await;

    assert_eq!(report.identifiers().collect::<Vec<_>>(), ["auth", "boom", "post"]);
    assert_eq!(report.get("boom").unwrap().error(), Some("factory exploded"));
    assert_empty_categories(report.get("post").unwrap().result().unwrap(), post::CATEGORIES);
    assert_empty_categories(report.get("auth").unwrap().result().unwrap(), auth::CATEGORIES);
}

#[tokio::test]
async fn panicking_constructor_is_contained_in_concurrent_mode() {
    let config = ScanConfig {
        execution: ExecutionMode::Concurrent,
        ..ScanConfig::default()
    };
    let report = runner(&["boom", "post"])
        .with_registry(&MIXED_REGISTRY)
        .with_config(config)
        .run()
        .await;

    assert_eq!(report.get("boom").unwrap().error(), Some("factory exploded"));
    assert!(report.get("post").unwrap().result().is_some());
}

#[tokio::test]
async fn module_time_is_bounded_by_its_slowest_probe() {
    let started = Instant::now();
    let report = runner(&["slow"]).with_registry(&MIXED_REGISTRY).run().await;

    assert!(started.elapsed() < Duration::from_millis(2500));
    let result = report.get("slow").unwrap().result().unwrap();
    assert_eq!(result.len(), 4);
    assert!(result.values().all(|findings| findings.len() == 1));
}

#[tokio::test]
async fn concurrent_execution_produces_the_same_report_shape() {
    let config = ScanConfig {
        execution: ExecutionMode::Concurrent,
        max_concurrent_modules: 3,
        ..ScanConfig::default()
    };
    let report = runner(&["recon", "bogus", "explode", "file", "recon"])
        .with_registry(&MIXED_REGISTRY)
        .with_config(config)
        .run()
        .await;

    assert_eq!(
        report.identifiers().collect::<Vec<_>>(),
        ["bogus", "explode", "file", "recon"]
    );
    assert_eq!(
        report.get("bogus").unwrap().error(),
        Some("Module import failed: Unknown module: bogus")
    );
    assert!(report.get("explode").unwrap().is_failed());
    assert!(report.get("file").unwrap().result().unwrap().values().all(Vec::is_empty));
}

#[tokio::test]
async fn concurrent_modules_overlap() {
    let config = ScanConfig {
        execution: ExecutionMode::Concurrent,
        max_concurrent_modules: 2,
        ..ScanConfig::default()
    };
    let started = Instant::now();
    let report = runner(&["slow", "slow"])
        .with_registry(&MIXED_REGISTRY)
        .with_config(config)
        .run()
        .await;

    assert_eq!(report.len(), 1);
    assert!(started.elapsed() < Duration::from_millis(2500));
}
