use chrono::{DateTime, Duration, Utc};
use common::error::{AppError, Res};
use common::stripe::USER_ID_METADATA_KEY;
use db::models::subscription::{SubscriptionRecord, SubscriptionStatus};
use sqlx::PgPool;
use stripe::{Event, EventObject, EventType, Webhook};
use uuid::Uuid;

/// A Stripe webhook event reduced to the fields its kind guarantees.
///
/// Decoded once at the boundary; everything downstream dispatches on these
/// variants instead of re-inspecting the raw payload.
#[derive(Debug, Clone, PartialEq)]
pub enum BillingEvent {
    /// Checkout finished; the paid trial starts now.
    CheckoutCompleted {
        user_id: Uuid,
        subscription_id: Option<String>,
    },
    /// The provider reported a change on an existing subscription.
    SubscriptionUpdated {
        subscription_id: String,
        active: bool,
        cancel_at_period_end: bool,
        trial_end: Option<i64>,
        period_start: i64,
        period_end: i64,
    },
    /// The subscription is gone on the provider side.
    SubscriptionDeleted { subscription_id: String },
    /// An invoice charge failed.
    PaymentFailed { customer_id: String },
    /// An invoice charge went through.
    PaymentSucceeded { customer_id: String },
    /// Event kind or object shape outside this system's concern.
    Unmapped { kind: String },
}

/// Creates an event for the webhook based on the request payload and signature.
/// Requires a webhook secret key. Verification failure never mutates state.
pub fn construct_event(payload: &str, signature: &str, webhook_secret: &str) -> Res<Event> {
    match Webhook::construct_event(payload, signature, webhook_secret) {
        Ok(event) => Ok(event),
        Err(e) => {
            log::error!("Error constructing webhook event: {}", e);
            Err(AppError::InvalidSignature(e.to_string()))
        }
    }
}

/// Reduces a verified Stripe event to a `BillingEvent`.
///
/// A checkout event without a parsable user id correlator is unmapped, not
/// an error: Stripe expects a 200 for events outside our concern.
pub fn map_event(event: Event) -> BillingEvent {
    let kind = event.type_.to_string();
    match (event.type_, event.data.object) {
        (EventType::CheckoutSessionCompleted, EventObject::CheckoutSession(session)) => {
            let user_id = session
                .metadata
                .as_ref()
                .and_then(|metadata| metadata.get(USER_ID_METADATA_KEY))
                .and_then(|raw| raw.parse::<Uuid>().ok());

            match user_id {
                Some(user_id) => BillingEvent::CheckoutCompleted {
                    user_id,
                    subscription_id: session.subscription.as_ref().map(|s| s.id().to_string()),
                },
                None => {
                    log::warn!("Checkout session {} carries no user id metadata", session.id);
                    BillingEvent::Unmapped { kind }
                }
            }
        }

        (EventType::CustomerSubscriptionUpdated, EventObject::Subscription(subscription)) => {
            BillingEvent::SubscriptionUpdated {
                subscription_id: subscription.id.to_string(),
                active: subscription.status == stripe::SubscriptionStatus::Active,
                cancel_at_period_end: subscription.cancel_at_period_end,
                trial_end: subscription.trial_end,
                period_start: subscription.current_period_start,
                period_end: subscription.current_period_end,
            }
        }

        (EventType::CustomerSubscriptionDeleted, EventObject::Subscription(subscription)) => {
            BillingEvent::SubscriptionDeleted {
                subscription_id: subscription.id.to_string(),
            }
        }

        (EventType::InvoicePaymentFailed, EventObject::Invoice(invoice)) => {
            match invoice.customer.as_ref() {
                Some(customer) => BillingEvent::PaymentFailed {
                    customer_id: customer.id().to_string(),
                },
                None => BillingEvent::Unmapped { kind },
            }
        }

        (EventType::InvoicePaymentSucceeded, EventObject::Invoice(invoice)) => {
            match invoice.customer.as_ref() {
                Some(customer) => BillingEvent::PaymentSucceeded {
                    customer_id: customer.id().to_string(),
                },
                None => BillingEvent::Unmapped { kind },
            }
        }

        (other, _) => BillingEvent::Unmapped {
            kind: other.to_string(),
        },
    }
}

fn to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

/// Computes the record state after an event, or `None` when the event
/// changes nothing.
///
/// Every branch writes absolute target values, so applying the same event
/// twice converges on the same record.
pub fn transition(
    record: &SubscriptionRecord,
    event: &BillingEvent,
    now: DateTime<Utc>,
) -> Option<SubscriptionRecord> {
    match event {
        BillingEvent::CheckoutCompleted {
            subscription_id, ..
        } => {
            // duplicate delivery must not refresh the trial window
            if record.status == SubscriptionStatus::PaidTrial
                && record.stripe_subscription_id == *subscription_id
            {
                return None;
            }
            let mut next = record.clone();
            next.status = SubscriptionStatus::PaidTrial;
            next.stripe_subscription_id = subscription_id.clone();
            next.paid_trial_started_at = Some(now);
            next.paid_trial_ends_at = Some(now + Duration::days(7));
            Some(next)
        }

        BillingEvent::SubscriptionUpdated {
            active,
            cancel_at_period_end,
            trial_end,
            period_start,
            period_end,
            ..
        } => {
            if !active {
                return None;
            }
            if *cancel_at_period_end {
                let mut next = record.clone();
                next.status = SubscriptionStatus::Cancelled;
                next.cancelled_at = record.cancelled_at.or(Some(now));
                next.current_period_end = to_datetime(*period_end).or(record.current_period_end);
                return Some(next);
            }
            // a trial that has not elapsed yet keeps the record in PAID_TRIAL
            let trial_pending = trial_end
                .map(|ends_at| ends_at > now.timestamp())
                .unwrap_or(false);
            if trial_pending {
                return None;
            }
            let mut next = record.clone();
            next.status = SubscriptionStatus::Active;
            next.current_period_start = to_datetime(*period_start).or(record.current_period_start);
            next.current_period_end = to_datetime(*period_end).or(record.current_period_end);
            Some(next)
        }

        BillingEvent::SubscriptionDeleted { .. } => {
            let mut next = record.clone();
            next.status = SubscriptionStatus::Expired;
            Some(next)
        }

        BillingEvent::PaymentFailed { .. } => {
            let mut next = record.clone();
            next.status = SubscriptionStatus::PastDue;
            Some(next)
        }

        BillingEvent::PaymentSucceeded { .. } => {
            // only a recovery path; a succeeding invoice on a healthy
            // subscription changes nothing
            if record.status != SubscriptionStatus::PastDue {
                return None;
            }
            let mut next = record.clone();
            next.status = SubscriptionStatus::Active;
            Some(next)
        }

        BillingEvent::Unmapped { .. } => None,
    }
}

/// Looks up the record the event correlates to and persists the transition.
///
/// Events whose correlation id matches no record are dropped with a warning:
/// the provider may deliver events for records not yet materialized, and a
/// 200 is required to stop retry storms.
pub async fn apply(pool: &PgPool, event: BillingEvent, now: DateTime<Utc>) -> Res<()> {
    let record = match &event {
        BillingEvent::CheckoutCompleted { user_id, .. } => {
            db::subscription::get_by_user_id(pool, *user_id).await?
        }
        BillingEvent::SubscriptionUpdated {
            subscription_id, ..
        }
        | BillingEvent::SubscriptionDeleted { subscription_id } => {
            db::subscription::get_by_subscription_id(pool, subscription_id).await?
        }
        BillingEvent::PaymentFailed { customer_id }
        | BillingEvent::PaymentSucceeded { customer_id } => {
            db::subscription::get_by_customer_id(pool, customer_id).await?
        }
        BillingEvent::Unmapped { kind } => {
            log::info!("Unhandled event type: {}", kind);
            return Ok(());
        }
    };

    let Some(record) = record else {
        log::warn!("No subscription record matches webhook event {:?}; dropping", event);
        return Ok(());
    };

    if let Some(next) = transition(&record, &event, now) {
        db::subscription::store_state(pool, &next).await?;
        log::info!(
            "Subscription of user {} moved to {:?}",
            next.user_id,
            next.status
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

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

    /// Applies the event, then applies it again to the result; the second
    /// application must be a no-op.
    fn assert_idempotent(
        start: &SubscriptionRecord,
        event: &BillingEvent,
    ) -> Option<SubscriptionRecord> {
        let first = transition(start, event, now());
        if let Some(ref next) = first {
            assert_eq!(transition(next, event, now()), None);
        }
        first
    }

    #[test]
    fn checkout_completed_starts_paid_trial() {
        let start = record(SubscriptionStatus::Expired);
        let event = BillingEvent::CheckoutCompleted {
            user_id: start.user_id,
            subscription_id: Some("sub_456".to_string()),
        };

        let next = assert_idempotent(&start, &event).unwrap();
        assert_eq!(next.status, SubscriptionStatus::PaidTrial);
        assert_eq!(next.stripe_subscription_id.as_deref(), Some("sub_456"));
        assert_eq!(next.paid_trial_started_at, Some(now()));
        assert_eq!(next.paid_trial_ends_at, Some(now() + Duration::days(7)));
    }

    #[test]
    fn duplicate_checkout_does_not_refresh_trial_window() {
        let mut start = record(SubscriptionStatus::PaidTrial);
        let trial_start = now() - Duration::days(3);
        start.paid_trial_started_at = Some(trial_start);
        start.paid_trial_ends_at = Some(trial_start + Duration::days(7));

        let event = BillingEvent::CheckoutCompleted {
            user_id: start.user_id,
            subscription_id: Some("sub_123".to_string()),
        };

        assert_eq!(transition(&start, &event, now()), None);
    }

    #[test]
    fn update_active_without_trial_activates() {
        let start = record(SubscriptionStatus::PaidTrial);
        let period_start = now() - Duration::days(1);
        let period_end = now() + Duration::days(29);
        let event = BillingEvent::SubscriptionUpdated {
            subscription_id: "sub_123".to_string(),
            active: true,
            cancel_at_period_end: false,
            trial_end: Some((now() - Duration::days(1)).timestamp()),
            period_start: period_start.timestamp(),
            period_end: period_end.timestamp(),
        };

        let next = transition(&start, &event, now()).unwrap();
        assert_eq!(next.status, SubscriptionStatus::Active);
        assert_eq!(next.current_period_start, Some(period_start));
        assert_eq!(next.current_period_end, Some(period_end));

        // re-delivery converges on the same state
        assert_eq!(transition(&next, &event, now()), Some(next.clone()));
    }

    #[test]
    fn update_with_pending_trial_changes_nothing() {
        let start = record(SubscriptionStatus::PaidTrial);
        let event = BillingEvent::SubscriptionUpdated {
            subscription_id: "sub_123".to_string(),
            active: true,
            cancel_at_period_end: false,
            trial_end: Some((now() + Duration::days(4)).timestamp()),
            period_start: now().timestamp(),
            period_end: (now() + Duration::days(30)).timestamp(),
        };

        assert_eq!(transition(&start, &event, now()), None);
    }

    #[test]
    fn update_scheduled_for_cancellation_wins_over_active() {
        let start = record(SubscriptionStatus::Active);
        let period_end = now() + Duration::days(12);
        let event = BillingEvent::SubscriptionUpdated {
            subscription_id: "sub_123".to_string(),
            active: true,
            cancel_at_period_end: true,
            trial_end: None,
            period_start: now().timestamp(),
            period_end: period_end.timestamp(),
        };

        let next = transition(&start, &event, now()).unwrap();
        assert_eq!(next.status, SubscriptionStatus::Cancelled);
        assert_eq!(next.cancelled_at, Some(now()));
        assert_eq!(next.current_period_end, Some(period_end));

        // re-delivery keeps the original cancellation time
        let later = now() + Duration::hours(2);
        assert_eq!(transition(&next, &event, later), Some(next.clone()));
    }

    #[test]
    fn update_with_inactive_provider_status_changes_nothing() {
        let start = record(SubscriptionStatus::Active);
        let event = BillingEvent::SubscriptionUpdated {
            subscription_id: "sub_123".to_string(),
            active: false,
            cancel_at_period_end: false,
            trial_end: None,
            period_start: now().timestamp(),
            period_end: (now() + Duration::days(30)).timestamp(),
        };

        assert_eq!(transition(&start, &event, now()), None);
    }

    #[test]
    fn deletion_expires_the_subscription() {
        let start = record(SubscriptionStatus::Active);
        let event = BillingEvent::SubscriptionDeleted {
            subscription_id: "sub_123".to_string(),
        };

        let next = transition(&start, &event, now()).unwrap();
        assert_eq!(next.status, SubscriptionStatus::Expired);

        // applying again yields the same end state
        assert_eq!(transition(&next, &event, now()), Some(next.clone()));
    }

    #[test]
    fn failed_payment_marks_past_due() {
        let start = record(SubscriptionStatus::Active);
        let event = BillingEvent::PaymentFailed {
            customer_id: "cus_123".to_string(),
        };

        let next = transition(&start, &event, now()).unwrap();
        assert_eq!(next.status, SubscriptionStatus::PastDue);
        assert_eq!(transition(&next, &event, now()), Some(next.clone()));
    }

    #[test]
    fn successful_payment_recovers_past_due_only() {
        let past_due = record(SubscriptionStatus::PastDue);
        let event = BillingEvent::PaymentSucceeded {
            customer_id: "cus_123".to_string(),
        };

        let next = assert_idempotent(&past_due, &event).unwrap();
        assert_eq!(next.status, SubscriptionStatus::Active);

        // a succeeding invoice on a trial record is not an activation
        let trial = record(SubscriptionStatus::PaidTrial);
        assert_eq!(transition(&trial, &event, now()), None);
    }

    #[test]
    fn unmapped_event_changes_nothing() {
        let start = record(SubscriptionStatus::Active);
        let event = BillingEvent::Unmapped {
            kind: "customer.created".to_string(),
        };

        assert_eq!(transition(&start, &event, now()), None);
    }
}
