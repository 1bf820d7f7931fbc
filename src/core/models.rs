// src/core/models.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Core Data Models ---

/// A single observation reported by a probe.
///
/// Findings are immutable once produced and belong to exactly one probe
/// invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    pub category: String,
    pub description: String,
    pub details: String,
}

impl Finding {
    pub fn new(category: &str, description: &str, details: impl Into<String>) -> Self {
        Self {
            category: category.to_string(),
            description: description.to_string(),
            details: details.into(),
        }
    }
}

/// Findings of one module run, keyed by probe category.
///
/// A `BTreeMap` keeps the serialized key order stable across runs; the order
/// of findings inside one category is the order the probe discovered them.
pub type ModuleResult = BTreeMap<String, Vec<Finding>>;

/// Error record stored in place of a `ModuleResult` when a module could not
/// be resolved or did not complete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleError {
    pub error: String,
}

/// The per-module entry of a `Report`: either the findings or an error record.
///
/// Serialized untagged so the JSON is exactly the category map or
/// `{"error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ModuleOutcome {
    Completed(ModuleResult),
    Failed(ModuleError),
}

impl ModuleOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        ModuleOutcome::Failed(ModuleError { error: error.into() })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ModuleOutcome::Failed(_))
    }

    pub fn result(&self) -> Option<&ModuleResult> {
        match self {
            ModuleOutcome::Completed(result) => Some(result),
            ModuleOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ModuleOutcome::Completed(_) => None,
            ModuleOutcome::Failed(e) => Some(&e.error),
        }
    }
}

// --- Main Report ---

/// The full output of one attack run, keyed by module identifier.
///
/// Recording the same identifier twice keeps the later outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Report(BTreeMap<String, ModuleOutcome>);

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, identifier: &str, outcome: ModuleOutcome) {
        self.0.insert(identifier.to_string(), outcome);
    }

    pub fn get(&self, identifier: &str) -> Option<&ModuleOutcome> {
        self.0.get(identifier)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Counts completed and failed modules and the total number of findings.
    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for outcome in self.0.values() {
            match outcome {
                ModuleOutcome::Completed(result) => {
                    summary.modules_completed += 1;
                    summary.total_findings += result.values().map(Vec::len).sum::<usize>();
                }
                ModuleOutcome::Failed(_) => summary.modules_failed += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportSummary {
    pub modules_completed: usize,
    pub modules_failed: usize,
    pub total_findings: usize,
}

/// Report wrapped with run metadata, emitted by the CLI on request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEnvelope {
    pub target: String,
    pub modules: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub report: Report,
}

impl ScanEnvelope {
    pub fn new(
        target: &str,
        modules: &[String],
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        report: Report,
    ) -> Self {
        Self {
            target: target.to_string(),
            modules: modules.to_vec(),
            started_at,
            finished_at,
            summary: report.summary(),
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcomes_serialize_as_map_or_error_record() {
        let mut result = ModuleResult::new();
        result.insert(
            "xss".to_string(),
            vec![Finding::new("xss", "Potential XSS vulnerability", "Reflected XSS in parameter: q")],
        );
        result.insert("csrf".to_string(), Vec::new());

        let mut report = Report::new();
        report.record("client", ModuleOutcome::Completed(result));
        report.record("bogus", ModuleOutcome::failed("Module import failed: Unknown module: bogus"));

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            json!({
                "bogus": {"error": "Module import failed: Unknown module: bogus"},
                "client": {
                    "csrf": [],
                    "xss": [{
                        "category": "xss",
                        "description": "Potential XSS vulnerability",
                        "details": "Reflected XSS in parameter: q"
                    }]
                }
            })
        );
    }

    #[test]
    fn error_record_parses_back_as_failure() {
        let report: Report =
            serde_json::from_str(r#"{"auth": {"error": "boom"}, "post": {"persistence": []}}"#).unwrap();
        assert_eq!(report.get("auth").and_then(ModuleOutcome::error), Some("boom"));
        assert!(report.get("post").and_then(ModuleOutcome::result).is_some());
    }

    #[test]
    fn later_record_overwrites_earlier() {
        let mut report = Report::new();
        report.record("auth", ModuleOutcome::failed("first"));
        report.record("auth", ModuleOutcome::Completed(ModuleResult::new()));
        assert_eq!(report.len(), 1);
        assert!(!report.get("auth").unwrap().is_failed());
    }

    #[test]
    fn summary_counts_modules_and_findings() {
        let mut result = ModuleResult::new();
        result.insert(
            "data_leakage".to_string(),
            vec![
                Finding::new("data_leakage", "Potential sensitive data leakage", "/.env"),
                Finding::new("data_leakage", "Potential sensitive data leakage", "/.git/config"),
            ],
        );
        let mut report = Report::new();
        report.record("file", ModuleOutcome::Completed(result));
        report.record("nope", ModuleOutcome::failed("x"));

        assert_eq!(
            report.summary(),
            ReportSummary { modules_completed: 1, modules_failed: 1, total_findings: 2 }
        );
    }
}
