use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Billing status of a subscription record.
///
/// Transitions are driven exclusively by Stripe webhook events and the
/// checkout initiation path; client input never sets this directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Expired,
    PaidTrial,
    Active,
    Cancelled,
    PastDue,
}

impl SubscriptionStatus {
    /// Storage form, as written to the TEXT `status` column. Binding the
    /// string keeps the prepared statement on plain catalog types.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Expired => "EXPIRED",
            SubscriptionStatus::PaidTrial => "PAID_TRIAL",
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::Cancelled => "CANCELLED",
            SubscriptionStatus::PastDue => "PAST_DUE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanInterval {
    Monthly,
    Yearly,
}

impl PlanInterval {
    /// Storage form, as written to the TEXT `plan_interval` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanInterval::Monthly => "MONTHLY",
            PlanInterval::Yearly => "YEARLY",
        }
    }
}

impl FromStr for PlanInterval {
    type Err = ();

    /// Parses the wire-format interval names used by the checkout endpoint.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(PlanInterval::Monthly),
            "yearly" => Ok(PlanInterval::Yearly),
            _ => Err(()),
        }
    }
}

/// Per-user subscription record. Created lazily with status `EXPIRED` on
/// first authentication, mutated by the webhook interpreter, never deleted.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: SubscriptionStatus,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub plan_interval: Option<PlanInterval>,
    pub paid_trial_started_at: Option<DateTime<Utc>>,
    pub paid_trial_ends_at: Option<DateTime<Utc>>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_interval_parses_wire_values_only() {
        assert_eq!("monthly".parse::<PlanInterval>(), Ok(PlanInterval::Monthly));
        assert_eq!("yearly".parse::<PlanInterval>(), Ok(PlanInterval::Yearly));
        assert!("MONTHLY".parse::<PlanInterval>().is_err());
        assert!("weekly".parse::<PlanInterval>().is_err());
        assert!("".parse::<PlanInterval>().is_err());
    }

    /// The bound storage form must match the form the row decoder accepts,
    /// which is the serde rename of the variant.
    #[test]
    fn storage_form_matches_serialized_variant_name() {
        for status in [
            SubscriptionStatus::Expired,
            SubscriptionStatus::PaidTrial,
            SubscriptionStatus::Active,
            SubscriptionStatus::Cancelled,
            SubscriptionStatus::PastDue,
        ] {
            let serialized = serde_json::to_value(status).unwrap();
            assert_eq!(serialized, serde_json::Value::String(status.as_str().to_string()));
        }

        for interval in [PlanInterval::Monthly, PlanInterval::Yearly] {
            let serialized = serde_json::to_value(interval).unwrap();
            assert_eq!(
                serialized,
                serde_json::Value::String(interval.as_str().to_string())
            );
        }
    }
}
