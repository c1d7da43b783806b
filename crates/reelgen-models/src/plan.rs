//! Subscription plan classification.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Plan id substrings that mark a free tier.
pub const FREE_TIER_TOKENS: &[&str] = &["free", "trial", "basic", "starter"];

/// Watermark-relevant classification of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlanClass {
    FreeTier,
    Paid,
}

impl PlanClass {
    /// Classify a plan id (case-insensitive substring match).
    ///
    /// An empty id is free tier.
    pub fn classify(plan_id: &str) -> Self {
        let lower = plan_id.trim().to_lowercase();
        if lower.is_empty() || FREE_TIER_TOKENS.iter().any(|token| lower.contains(token)) {
            PlanClass::FreeTier
        } else {
            PlanClass::Paid
        }
    }

    pub fn requires_watermark(&self) -> bool {
        matches!(self, PlanClass::FreeTier)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanClass::FreeTier => "free_tier",
            PlanClass::Paid => "paid",
        }
    }
}

impl std::fmt::Display for PlanClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user's current plan as read from the usage store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlanRecord {
    pub plan_id: String,
}

impl PlanRecord {
    pub fn new(plan_id: impl Into<String>) -> Self {
        Self {
            plan_id: plan_id.into(),
        }
    }

    pub fn class(&self) -> PlanClass {
        PlanClass::classify(&self.plan_id)
    }
}
