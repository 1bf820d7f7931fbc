// src/core/modules/auth.rs

use std::sync::Arc;

use tracing::{debug, info};

use super::{CheckModule, accessible_paths};
use crate::core::errors::ProbeError;
use crate::core::models::Finding;
use crate::core::probe::{Probe, ProbeContext, probe};
use crate::core::transport::RequestBody;

pub const CATEGORIES: &[&str] = &["weak_auth", "session_issues", "brute_force", "auth_bypass"];

const LOGIN_PATH: &str = "/login";

const DEFAULT_CREDENTIALS: &[(&str, &str)] = &[
    ("admin", "admin"),
    ("admin", "password"),
    ("root", "root"),
    ("user", "password"),
];

/// Failed logins sent before concluding that no rate limiting is in place.
const BRUTE_FORCE_ATTEMPTS: usize = 10;

const PROTECTED_PATHS: &[(&str, &str)] = &[
    ("/admin", "Accessible path: /admin"),
    ("/dashboard", "Accessible path: /dashboard"),
    ("/user/profile", "Accessible path: /user/profile"),
    ("/api/user", "Accessible path: /api/user"),
];

/// Authentication and session handling checks.
pub struct AuthModule {
    ctx: Arc<ProbeContext>,
}

impl AuthModule {
    pub fn new(ctx: Arc<ProbeContext>) -> Self {
        Self { ctx }
    }

    pub fn boxed(ctx: Arc<ProbeContext>) -> Box<dyn CheckModule> {
        Box::new(Self::new(ctx))
    }
}

impl CheckModule for AuthModule {
    fn identifier(&self) -> &'static str {
        "auth"
    }

    fn probes(&self) -> Vec<Arc<dyn Probe>> {
        vec![
            probe("weak_auth", &self.ctx, check_weak_auth),
            probe("session_issues", &self.ctx, check_session_management),
            probe("brute_force", &self.ctx, test_brute_force),
            probe("auth_bypass", &self.ctx, check_auth_bypass),
        ]
    }
}

fn login_form(username: &str, password: &str) -> RequestBody {
    RequestBody::Form(vec![
        ("username".to_string(), username.to_string()),
        ("password".to_string(), password.to_string()),
    ])
}

/// Default credential pairs accepted by the login endpoint.
async fn check_weak_auth(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    info!(target = ctx.target(), "Checking for default credentials.");
    let url = ctx.url(LOGIN_PATH)?;
    let mut findings = Vec::new();

    for (username, password) in DEFAULT_CREDENTIALS {
        match ctx.post(url.clone(), login_form(username, password)).await {
            Ok(response) if response.status == 200 => {
                debug!(username, "Default credentials accepted.");
                findings.push(Finding::new(
                    "weak_auth",
                    "Default credentials found",
                    format!("Username: {}, Password: {}", username, password),
                ));
            }
            Ok(response) => debug!(username, status = response.status, "Default credentials rejected."),
            Err(e) => debug!(username, error = %e, "Login request failed."),
        }
    }
    Ok(findings)
}

/// Session cookies missing the `HttpOnly` or `Secure` attributes.
async fn check_session_management(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    info!(target = ctx.target(), "Checking session cookie flags.");
    let response = match ctx.get(ctx.base_url()?).await {
        Ok(response) => response,
        Err(e) => {
            debug!(error = %e, "Landing page request failed.");
            return Ok(Vec::new());
        }
    };

    let mut findings = Vec::new();
    for cookie in response.set_cookies() {
        let attributes: Vec<String> = cookie
            .split(';')
            .skip(1)
            .map(|a| a.trim().to_ascii_lowercase())
            .collect();
        let name = cookie.split('=').next().unwrap_or_default().trim();

        if !attributes.iter().any(|a| a == "httponly") {
            findings.push(Finding::new(
                "session_issues",
                "Missing HttpOnly flag",
                format!("Session cookie {} is accessible via JavaScript", name),
            ));
        }
        if !attributes.iter().any(|a| a == "secure") {
            findings.push(Finding::new(
                "session_issues",
                "Missing Secure flag",
                format!("Session cookie {} can be sent over non-HTTPS", name),
            ));
        }
    }
    Ok(findings)
}

/// Repeated failed logins that are never throttled with a 429.
async fn test_brute_force(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    info!(target = ctx.target(), "Testing login rate limiting.");
    let url = ctx.url(LOGIN_PATH)?;
    let mut answered = 0;

    for attempt in 1..=BRUTE_FORCE_ATTEMPTS {
        match ctx.post(url.clone(), login_form("test", "wrong")).await {
            Ok(response) if response.status == 429 => {
                debug!(attempt, "Login attempts are rate limited.");
                return Ok(Vec::new());
            }
            Ok(_) => answered += 1,
            Err(e) => debug!(attempt, error = %e, "Login attempt failed."),
        }
    }

    if answered == 0 {
        return Ok(Vec::new());
    }
    Ok(vec![Finding::new(
        "brute_force",
        "No rate limiting detected",
        format!("{} failed login attempts allowed", answered),
    )])
}

/// Protected pages served without any credentials.
async fn check_auth_bypass(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    info!(target = ctx.target(), "Checking for authentication bypass.");
    accessible_paths(&ctx, "auth_bypass", "Potential authentication bypass", PROTECTED_PATHS).await
}
