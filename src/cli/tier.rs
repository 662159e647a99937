// src/cli/tier.rs — Subscription tier to consultation depth

use serde::Serialize;

/// Depth of a consultation. Derived from the subscription, never chosen directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationPlan {
    Basic,
    Premium,
    Ultra,
}

impl ConsultationPlan {
    /// enterprise → ultra, pro → premium, anything else → basic.
    pub fn from_subscription(subscription: &str) -> Self {
        match subscription.trim().to_ascii_lowercase().as_str() {
            "enterprise" => ConsultationPlan::Ultra,
            "pro" => ConsultationPlan::Premium,
            _ => ConsultationPlan::Basic,
        }
    }

    pub fn max_rounds(&self) -> u32 {
        match self {
            ConsultationPlan::Premium | ConsultationPlan::Ultra => 3,
            ConsultationPlan::Basic => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationPlan::Basic => "basic",
            ConsultationPlan::Premium => "premium",
            ConsultationPlan::Ultra => "ultra",
        }
    }
}

impl std::fmt::Display for ConsultationPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
