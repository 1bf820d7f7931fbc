// src/core/modules/client.rs

use std::sync::Arc;

use scraper::{Html, Selector};
use tracing::{debug, info};

use super::CheckModule;
use crate::core::errors::ProbeError;
use crate::core::models::Finding;
use crate::core::probe::{Probe, ProbeContext, probe};
use crate::core::transport::{HttpResponse, RequestBody};

pub const CATEGORIES: &[&str] = &["xss", "csrf", "clickjacking", "client_validation"];

const XSS_PAYLOADS: &[&str] = &[
    "<script>alert(1)</script>",
    "\"><script>alert(1)</script>",
    "'><script>alert(1)</script>",
    "<img src=x onerror=alert(1)>",
];

const XSS_PARAMS: &[&str] = &["q", "search", "id", "name", "input"];

/// Substrings of form field names that identify an anti-CSRF token.
const CSRF_TOKEN_MARKERS: &[&str] = &["csrf", "xsrf", "_token", "authenticity_token", "__requestverificationtoken"];

const VALIDATION_CASES: &[(&str, &str)] = &[
    ("email", "test@test.com<script>alert(1)</script>"),
    ("phone", "1234567890<script>alert(1)</script>"),
    ("name", "<script>alert(1)</script>"),
];

/// Browser-side weaknesses: XSS, CSRF, framing and client-only validation.
pub struct ClientModule {
    ctx: Arc<ProbeContext>,
}

impl ClientModule {
    pub fn new(ctx: Arc<ProbeContext>) -> Self {
        Self { ctx }
    }

    pub fn boxed(ctx: Arc<ProbeContext>) -> Box<dyn CheckModule> {
        Box::new(Self::new(ctx))
    }
}

impl CheckModule for ClientModule {
    fn identifier(&self) -> &'static str {
        "client"
    }

    fn probes(&self) -> Vec<Arc<dyn Probe>> {
        vec![
            probe("xss", &self.ctx, check_xss),
            probe("csrf", &self.ctx, check_csrf),
            probe("clickjacking", &self.ctx, check_clickjacking),
            probe("client_validation", &self.ctx, check_client_validation),
        ]
    }
}

/// Payloads reflected verbatim in the response body. One finding per parameter.
async fn check_xss(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    info!(target = ctx.target(), "Checking for reflected XSS.");
    let mut findings = Vec::new();

    for param in XSS_PARAMS {
        for payload in XSS_PAYLOADS {
            let url = ctx.url_with_query("/", param, payload)?;
            match ctx.get(url).await {
                Ok(response) if response.body.contains(payload) => {
                    debug!(param, payload, "Payload reflected.");
                    findings.push(Finding::new(
                        "xss",
                        "Potential XSS vulnerability",
                        format!("Reflected XSS in parameter: {}", param),
                    ));
                    break;
                }
                Ok(_) => {}
                Err(e) => debug!(param, error = %e, "XSS request failed."),
            }
        }
    }
    Ok(findings)
}

/// Number of forms on the page and how many of them lack a token field.
fn forms_without_token(body: &str) -> (usize, usize) {
    let document = Html::parse_document(body);
    let (Ok(form_selector), Ok(field_selector)) = (
        Selector::parse("form"),
        Selector::parse("input[name], meta[name]"),
    ) else {
        return (0, 0);
    };

    let mut total = 0;
    let mut unprotected = 0;
    for form in document.select(&form_selector) {
        total += 1;
        let has_token = form.select(&field_selector).any(|field| {
            field
                .value()
                .attr("name")
                .map(|name| {
                    let name = name.to_ascii_lowercase();
                    CSRF_TOKEN_MARKERS.iter().any(|marker| name.contains(marker))
                })
                .unwrap_or(false)
        });
        if !has_token {
            unprotected += 1;
        }
    }
    (total, unprotected)
}

/// Forms on the landing page without an anti-CSRF token field.
async fn check_csrf(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    info!(target = ctx.target(), "Checking forms for CSRF tokens.");
    let response = match ctx.get(ctx.base_url()?).await {
        Ok(response) => response,
        Err(e) => {
            debug!(error = %e, "Landing page request failed.");
            return Ok(Vec::new());
        }
    };

    let (total, unprotected) = forms_without_token(&response.body);
    debug!(forms = total, unprotected, "Inspected forms.");
    if unprotected == 0 {
        return Ok(Vec::new());
    }
    Ok(vec![Finding::new(
        "csrf",
        "Potential CSRF vulnerability",
        format!("No CSRF token found in {} of {} forms", unprotected, total),
    )])
}

/// Whether the response forbids framing via either header.
fn framing_restricted(response: &HttpResponse) -> bool {
    if response.header("x-frame-options").is_some() {
        return true;
    }
    response
        .header("content-security-policy")
        .map(|csp| csp.to_ascii_lowercase().contains("frame-ancestors"))
        .unwrap_or(false)
}

/// Missing framing protection on the landing page.
async fn check_clickjacking(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    info!(target = ctx.target(), "Checking framing protection.");
    match ctx.get(ctx.base_url()?).await {
        Ok(response) if !framing_restricted(&response) => Ok(vec![Finding::new(
            "clickjacking",
            "Potential Clickjacking vulnerability",
            "Missing X-Frame-Options header",
        )]),
        Ok(_) => Ok(Vec::new()),
        Err(e) => {
            debug!(error = %e, "Landing page request failed.");
            Ok(Vec::new())
        }
    }
}

/// Script-bearing field values accepted by the submission endpoint.
async fn check_client_validation(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    info!(target = ctx.target(), "Checking server-side validation of form input.");
    let url = ctx.url("/submit")?;
    let mut findings = Vec::new();

    for (field, value) in VALIDATION_CASES {
        let body = RequestBody::Form(vec![(field.to_string(), value.to_string())]);
        match ctx.post(url.clone(), body).await {
            Ok(response) if response.status == 200 => findings.push(Finding::new(
                "client_validation",
                "Potential client-side validation bypass",
                format!("Bypassed validation for field: {}", field),
            )),
            Ok(response) => debug!(field, status = response.status, "Input rejected."),
            Err(e) => debug!(field, error = %e, "Submission failed."),
        }
    }
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forms_with_token_fields_are_protected() {
        let body = r#"
            <form action="/a"><input name="csrf_token" type="hidden"><input name="q"></form>
            <form action="/b"><input name="q"></form>
            <form action="/c"><input name="authenticity_token"></form>
        "#;
        assert_eq!(forms_without_token(body), (3, 1));
    }

    #[test]
    fn pages_without_forms_have_nothing_to_protect() {
        assert_eq!(forms_without_token("<html><body><p>hi</p></body></html>"), (0, 0));
    }
}
