use chrono::{DateTime, Utc};
use db::models::subscription::{PlanInterval, SubscriptionStatus};
use serde::{Deserialize, Serialize};

/// Coarse entitlement bucket exposed to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Trial,
    Paid,
}

/// Drives the upgrade-prompt copy shown by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeReason {
    SubscriptionRequired,
    PaidTrialExpired,
    SubscriptionEnded,
    SubscriptionExpired,
    PaymentFailed,
}

/// Read-only projection of a subscription record at a point in time.
/// `can_access_full_features` gates the premium UI sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementInfo {
    pub status: SubscriptionStatus,
    pub tier: Tier,
    pub plan_interval: Option<PlanInterval>,
    pub paid_trial_ends_at: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub can_access_full_features: bool,
    pub requires_upgrade: bool,
    pub upgrade_reason: Option<UpgradeReason>,
}
