use chrono::{DateTime, Utc};
use db::models::subscription::{SubscriptionRecord, SubscriptionStatus};

use crate::models::entitlement::{EntitlementInfo, Tier, UpgradeReason};

/// Derives the user-facing entitlement from a subscription record.
///
/// Pure projection: total over every status, no side effects, no mutation.
/// A missing record resolves like a fresh account that has never seen a
/// checkout, which is distinct from an existing EXPIRED record (the upgrade
/// reason differs).
pub fn resolve(record: Option<&SubscriptionRecord>, now: DateTime<Utc>) -> EntitlementInfo {
    let Some(record) = record else {
        return EntitlementInfo {
            status: SubscriptionStatus::Expired,
            tier: Tier::Free,
            plan_interval: None,
            paid_trial_ends_at: None,
            current_period_end: None,
            can_access_full_features: false,
            requires_upgrade: true,
            upgrade_reason: Some(UpgradeReason::SubscriptionRequired),
        };
    };

    let (tier, can_access_full_features, upgrade_reason) = match record.status {
        SubscriptionStatus::PaidTrial => {
            let trial_over = record
                .paid_trial_ends_at
                .map(|ends_at| now > ends_at)
                .unwrap_or(false);
            if trial_over {
                (Tier::Free, false, Some(UpgradeReason::PaidTrialExpired))
            } else {
                (Tier::Trial, true, None)
            }
        }

        SubscriptionStatus::Active => (Tier::Paid, true, None),

        SubscriptionStatus::Cancelled => {
            // grace period until the paid period elapses; a missing period
            // end denies access rather than granting it indefinitely
            let in_grace = record
                .current_period_end
                .map(|period_end| now < period_end)
                .unwrap_or(false);
            if in_grace {
                (Tier::Paid, true, None)
            } else {
                (Tier::Free, false, Some(UpgradeReason::SubscriptionEnded))
            }
        }

        SubscriptionStatus::Expired => (Tier::Free, false, Some(UpgradeReason::SubscriptionExpired)),

        SubscriptionStatus::PastDue => (Tier::Free, false, Some(UpgradeReason::PaymentFailed)),
    };

    EntitlementInfo {
        status: record.status,
        tier,
        plan_interval: record.plan_interval,
        paid_trial_ends_at: record.paid_trial_ends_at,
        current_period_end: record.current_period_end,
        can_access_full_features,
        requires_upgrade: upgrade_reason.is_some(),
        upgrade_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn record(status: SubscriptionStatus) -> SubscriptionRecord {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        SubscriptionRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            status,
            stripe_customer_id: Some("cus_123".to_string()),
            stripe_subscription_id: Some("sub_123".to_string()),
            plan_interval: None,
            paid_trial_started_at: None,
            paid_trial_ends_at: None,
            current_period_start: None,
            current_period_end: None,
            cancelled_at: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn missing_record_requires_subscription() {
        let info = resolve(None, now());
        assert_eq!(info.tier, Tier::Free);
        assert!(!info.can_access_full_features);
        assert!(info.requires_upgrade);
        assert_eq!(info.upgrade_reason, Some(UpgradeReason::SubscriptionRequired));
    }

    #[test]
    fn expired_record_differs_from_missing_record() {
        let rec = record(SubscriptionStatus::Expired);
        let info = resolve(Some(&rec), now());
        assert_eq!(info.tier, Tier::Free);
        assert!(info.requires_upgrade);
        // same free/upgrade shape as a missing record, different reason
        assert_eq!(info.upgrade_reason, Some(UpgradeReason::SubscriptionExpired));
    }

    #[test]
    fn trial_within_window_has_full_access() {
        let started = now();
        let mut rec = record(SubscriptionStatus::PaidTrial);
        rec.paid_trial_started_at = Some(started);
        rec.paid_trial_ends_at = Some(started + Duration::days(7));

        let info = resolve(Some(&rec), started + Duration::days(6));
        assert_eq!(info.tier, Tier::Trial);
        assert!(info.can_access_full_features);
        assert!(!info.requires_upgrade);
        assert_eq!(info.upgrade_reason, None);
    }

    #[test]
    fn trial_past_window_is_expired() {
        let started = now();
        let mut rec = record(SubscriptionStatus::PaidTrial);
        rec.paid_trial_started_at = Some(started);
        rec.paid_trial_ends_at = Some(started + Duration::days(7));

        let info = resolve(Some(&rec), started + Duration::days(8));
        assert_eq!(info.tier, Tier::Free);
        assert!(!info.can_access_full_features);
        assert_eq!(info.upgrade_reason, Some(UpgradeReason::PaidTrialExpired));
    }

    #[test]
    fn active_is_paid_with_full_access() {
        let rec = record(SubscriptionStatus::Active);
        let info = resolve(Some(&rec), now());
        assert_eq!(info.tier, Tier::Paid);
        assert!(info.can_access_full_features);
        assert!(!info.requires_upgrade);
    }

    #[test]
    fn cancelled_keeps_access_until_period_end() {
        let period_end = now();
        let mut rec = record(SubscriptionStatus::Cancelled);
        rec.current_period_end = Some(period_end);

        let info = resolve(Some(&rec), period_end - Duration::seconds(1));
        assert_eq!(info.tier, Tier::Paid);
        assert!(info.can_access_full_features);
        assert_eq!(info.upgrade_reason, None);
    }

    #[test]
    fn cancelled_loses_access_after_period_end() {
        let period_end = now();
        let mut rec = record(SubscriptionStatus::Cancelled);
        rec.current_period_end = Some(period_end);

        let info = resolve(Some(&rec), period_end + Duration::seconds(1));
        assert_eq!(info.tier, Tier::Free);
        assert!(!info.can_access_full_features);
        assert_eq!(info.upgrade_reason, Some(UpgradeReason::SubscriptionEnded));
    }

    #[test]
    fn cancelled_without_period_end_denies_access() {
        let rec = record(SubscriptionStatus::Cancelled);
        let info = resolve(Some(&rec), now());
        assert_eq!(info.tier, Tier::Free);
        assert!(!info.can_access_full_features);
        assert_eq!(info.upgrade_reason, Some(UpgradeReason::SubscriptionEnded));
    }

    #[test]
    fn past_due_requires_payment() {
        let rec = record(SubscriptionStatus::PastDue);
        let info = resolve(Some(&rec), now());
        assert_eq!(info.tier, Tier::Free);
        assert!(info.requires_upgrade);
        assert_eq!(info.upgrade_reason, Some(UpgradeReason::PaymentFailed));
    }

    #[test]
    fn upgrade_flag_tracks_reason_for_every_status() {
        for status in [
            SubscriptionStatus::Expired,
            SubscriptionStatus::PaidTrial,
            SubscriptionStatus::Active,
            SubscriptionStatus::Cancelled,
            SubscriptionStatus::PastDue,
        ] {
            let rec = record(status);
            let info = resolve(Some(&rec), now());
            assert_eq!(info.requires_upgrade, info.upgrade_reason.is_some());
            assert_eq!(info.status, status);
        }
    }
}
