// src/core/modules/post.rs

use std::sync::Arc;

use tracing::info;

use super::{CheckModule, accessible_paths};
use crate::core::errors::ProbeError;
use crate::core::models::Finding;
use crate::core::probe::{Probe, ProbeContext, probe};

pub const CATEGORIES: &[&str] = &[
    "data_exfiltration",
    "lateral_movement",
    "persistence",
    "impact_assessment",
];

const EXPORT_PATHS: &[(&str, &str)] = &[
    ("/api/export", "Accessible export endpoint: /api/export"),
    ("/api/download", "Accessible export endpoint: /api/download"),
    ("/api/data", "Accessible export endpoint: /api/data"),
    ("/api/backup", "Accessible export endpoint: /api/backup"),
];

const INTERNAL_PATHS: &[(&str, &str)] = &[
    ("/api/internal", "Accessible internal endpoint: /api/internal"),
    ("/admin/internal", "Accessible internal endpoint: /admin/internal"),
    ("/internal", "Accessible internal endpoint: /internal"),
    ("/network", "Accessible internal endpoint: /network"),
];

const PERSISTENCE_PATHS: &[(&str, &str)] = &[
    ("/api/cron", "Accessible persistence endpoint: /api/cron"),
    ("/api/scheduled", "Accessible persistence endpoint: /api/scheduled"),
    ("/api/tasks", "Accessible persistence endpoint: /api/tasks"),
    ("/admin/settings", "Accessible persistence endpoint: /admin/settings"),
];

const HIGH_IMPACT_PATHS: &[(&str, &str)] = &[
    ("/api/users", "Accessible User management endpoint: /api/users"),
    ("/api/data", "Accessible Data access endpoint: /api/data"),
    ("/api/settings", "Accessible System settings endpoint: /api/settings"),
    ("/api/admin", "Accessible Admin functions endpoint: /api/admin"),
];

/// Post-exploitation reach: what an attacker could do once inside.
pub struct PostModule {
    ctx: Arc<ProbeContext>,
}

impl PostModule {
    pub fn new(ctx: Arc<ProbeContext>) -> Self {
        Self { ctx }
    }

    pub fn boxed(ctx: Arc<ProbeContext>) -> Box<dyn CheckModule> {
        Box::new(Self::new(ctx))
    }
}

impl CheckModule for PostModule {
    fn identifier(&self) -> &'static str {
        "post"
    }

    fn probes(&self) -> Vec<Arc<dyn Probe>> {
        vec![
            probe("data_exfiltration", &self.ctx, check_data_exfiltration),
            probe("lateral_movement", &self.ctx, check_lateral_movement),
            probe("persistence", &self.ctx, check_persistence),
            probe("impact_assessment", &self.ctx, assess_impact),
        ]
    }
}

async fn check_data_exfiltration(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    info!(target = ctx.target(), "Checking data exfiltration paths.");
    accessible_paths(&ctx, "data_exfiltration", "Potential data exfiltration path", EXPORT_PATHS).await
}

async fn check_lateral_movement(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    info!(target = ctx.target(), "Checking lateral movement paths.");
    accessible_paths(&ctx, "lateral_movement", "Potential lateral movement path", INTERNAL_PATHS).await
}

async fn check_persistence(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    info!(target = ctx.target(), "Checking persistence mechanisms.");
    accessible_paths(&ctx, "persistence", "Potential persistence mechanism", PERSISTENCE_PATHS).await
}

async fn assess_impact(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    info!(target = ctx.target(), "Assessing high-impact endpoints.");
    accessible_paths(&ctx, "impact_assessment", "Potential high-impact access", HIGH_IMPACT_PATHS).await
}
