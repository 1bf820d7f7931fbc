// src/core/modules/file.rs

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{CheckModule, accessible_paths};
use crate::core::errors::ProbeError;
use crate::core::models::Finding;
use crate::core::probe::{Probe, ProbeContext, probe};
use crate::core::transport::RequestBody;

pub const CATEGORIES: &[&str] = &[
    "sql_injection",
    "nosql_injection",
    "command_injection",
    "file_upload",
    "data_leakage",
];

const SQL_PAYLOADS: &[&str] = &["' OR '1'='1", "' OR 1=1--", "' UNION SELECT NULL--", "admin'--"];
const SQL_PARAMS: &[&str] = &["id", "user", "name", "search"];

const NOSQL_PAYLOADS: &[&str] = &[r#"{"$gt": ""}"#, r#"{"$ne": null}"#, r#"{"$where": "1==1"}"#];

const COMMAND_PAYLOADS: &[&str] = &["; ls", "& dir", "| cat /etc/passwd", "`id`"];

/// (file name, content, content type) uploaded to the upload endpoint.
const UPLOAD_FILES: &[(&str, &str, &str)] = &[
    ("test.php", r#"<?php echo "test"; ?>"#, "application/x-php"),
    ("test.jsp", r#"<% out.println("test"); %>"#, "application/jsp"),
    ("test.asp", r#"<% Response.Write("test") %>"#, "application/asp"),
];

const SENSITIVE_FILES: &[(&str, &str)] = &[
    ("/.git/config", "Accessible sensitive file: /.git/config"),
    ("/.env", "Accessible sensitive file: /.env"),
    ("/config.php", "Accessible sensitive file: /config.php"),
    ("/backup.zip", "Accessible sensitive file: /backup.zip"),
    ("/database.sql", "Accessible sensitive file: /database.sql"),
];

// Response signatures. Matching is case-insensitive for database errors and
// exact for command output.
static RE_SQL_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)sql|mysql|postgresql|oracle").unwrap());
static RE_COMMAND_OUTPUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"root:|/bin/bash|uid=").unwrap());

/// Injection, upload and file exposure checks.
pub struct FileModule {
    ctx: Arc<ProbeContext>,
}

impl FileModule {
    pub fn new(ctx: Arc<ProbeContext>) -> Self {
        Self { ctx }
    }

    pub fn boxed(ctx: Arc<ProbeContext>) -> Box<dyn CheckModule> {
        Box::new(Self::new(ctx))
    }
}

impl CheckModule for FileModule {
    fn identifier(&self) -> &'static str {
        "file"
    }

    fn probes(&self) -> Vec<Arc<dyn Probe>> {
        vec![
            probe("sql_injection", &self.ctx, check_sql_injection),
            probe("nosql_injection", &self.ctx, check_nosql_injection),
            probe("command_injection", &self.ctx, check_command_injection),
            probe("file_upload", &self.ctx, check_file_upload),
            probe("data_leakage", &self.ctx, check_data_leakage),
        ]
    }
}

async fn check_sql_injection(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    info!(target = ctx.target(), "Checking for SQL injection.");
    let mut findings = Vec::new();

    for param in SQL_PARAMS {
        for payload in SQL_PAYLOADS {
            let url = ctx.url_with_query("/", param, payload)?;
            match ctx.get(url).await {
                Ok(response) if RE_SQL_ERROR.is_match(&response.body) => {
                    debug!(param, payload, "Database error signature in response.");
                    findings.push(Finding::new(
                        "sql_injection",
                        "Potential SQL injection vulnerability",
                        format!("SQL error in parameter: {}", param),
                    ));
                    break;
                }
                Ok(_) => {}
                Err(e) => debug!(param, error = %e, "SQL injection request failed."),
            }
        }
    }
    Ok(findings)
}

/// Whether a search response carries any results.
fn has_results(body: &str) -> bool {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => !items.is_empty(),
        Ok(Value::Object(fields)) => !fields.is_empty(),
        Ok(Value::String(s)) => !s.is_empty(),
        _ => false,
    }
}

async fn check_nosql_injection(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    info!(target = ctx.target(), "Checking for NoSQL injection.");
    let url = ctx.url("/api/search")?;

    for payload in NOSQL_PAYLOADS {
        let body = RequestBody::Json(json!({ "query": payload }));
        match ctx.post(url.clone(), body).await {
            Ok(response) if response.status == 200 && has_results(&response.body) => {
                debug!(payload, "Operator payload returned results.");
                return Ok(vec![Finding::new(
                    "nosql_injection",
                    "Potential NoSQL injection vulnerability",
                    "NoSQL query manipulation successful",
                )]);
            }
            Ok(_) => {}
            Err(e) => debug!(payload, error = %e, "NoSQL injection request failed."),
        }
    }
    Ok(Vec::new())
}

async fn check_command_injection(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    info!(target = ctx.target(), "Checking for command injection.");

    for payload in COMMAND_PAYLOADS {
        let url = ctx.url_with_query("/api/execute", "cmd", payload)?;
        match ctx.get(url).await {
            Ok(response) if RE_COMMAND_OUTPUT.is_match(&response.body) => {
                debug!(payload, "Command output signature in response.");
                return Ok(vec![Finding::new(
                    "command_injection",
                    "Potential command injection vulnerability",
                    "Command execution successful",
                )]);
            }
            Ok(_) => {}
            Err(e) => debug!(payload, error = %e, "Command injection request failed."),
        }
    }
    Ok(Vec::new())
}

async fn check_file_upload(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    info!(target = ctx.target(), "Checking for insecure file upload.");
    let url = ctx.url("/upload")?;

    for (file_name, content, content_type) in UPLOAD_FILES {
        let body = RequestBody::Multipart {
            field: "file".to_string(),
            file_name: file_name.to_string(),
            content: content.to_string(),
            content_type: content_type.to_string(),
        };
        match ctx.post(url.clone(), body).await {
            Ok(response) if response.status == 200 => {
                debug!(file_name, "Server-side script upload accepted.");
                return Ok(vec![Finding::new(
                    "file_upload",
                    "Potential insecure file upload",
                    format!("Uploaded file: {}", file_name),
                )]);
            }
            Ok(response) => debug!(file_name, status = response.status, "Upload rejected."),
            Err(e) => debug!(file_name, error = %e, "Upload request failed."),
        }
    }
    Ok(Vec::new())
}

async fn check_data_leakage(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    info!(target = ctx.target(), "Checking for exposed sensitive files.");
    accessible_paths(&ctx, "data_leakage", "Potential sensitive data leakage", SENSITIVE_FILES).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_results_require_non_empty_json() {
        assert!(has_results(r#"[{"name": "alice"}]"#));
        assert!(has_results(r#"{"total": 3}"#));
        assert!(!has_results("[]"));
        assert!(!has_results("{}"));
        assert!(!has_results("<html>not json</html>"));
    }

    #[test]
    fn signatures_match_known_output() {
        assert!(RE_SQL_ERROR.is_match("You have an error in your MySQL syntax"));
        assert!(RE_COMMAND_OUTPUT.is_match("uid=0(root) gid=0(root)"));
        assert!(!RE_COMMAND_OUTPUT.is_match("all good"));
    }
}
