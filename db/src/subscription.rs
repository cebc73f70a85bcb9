use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::subscription::{PlanInterval, SubscriptionRecord};

/// Creates the subscription record for a user if it does not exist yet.
/// New records start as EXPIRED: no access until a payment method is attached.
pub async fn ensure<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<()> {
    sqlx::query(
        r#"
        INSERT INTO subscriptions (user_id, status)
        VALUES ($1, 'EXPIRED')
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn get_by_user_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<SubscriptionRecord>> {
    sqlx::query_as::<_, SubscriptionRecord>("SELECT * FROM subscriptions WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_by_customer_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    customer_id: &str,
) -> Res<Option<SubscriptionRecord>> {
    sqlx::query_as::<_, SubscriptionRecord>(
        "SELECT * FROM subscriptions WHERE stripe_customer_id = $1",
    )
    .bind(customer_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_by_subscription_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    subscription_id: &str,
) -> Res<Option<SubscriptionRecord>> {
    sqlx::query_as::<_, SubscriptionRecord>(
        "SELECT * FROM subscriptions WHERE stripe_subscription_id = $1",
    )
    .bind(subscription_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Records the Stripe customer id and the requested plan interval.
///
/// The customer id is write-once: the guard leaves an already-assigned id
/// untouched, so a concurrent or repeated checkout reuses the first customer.
/// Returns the record as it stands after the attempt.
pub async fn attach_customer<'e, E>(
    executor: E,
    user_id: Uuid,
    customer_id: &str,
    plan_interval: PlanInterval,
) -> Res<SubscriptionRecord>
where
    E: Executor<'e, Database = Postgres> + Copy,
{
    sqlx::query(
        r#"
        UPDATE subscriptions
        SET stripe_customer_id = $2,
            plan_interval = $3,
            updated_at = now()
        WHERE user_id = $1 AND stripe_customer_id IS NULL
        "#,
    )
    .bind(user_id)
    .bind(customer_id)
    .bind(plan_interval.as_str())
    .execute(executor)
    .await?;

    get_by_user_id(executor, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No subscription record found".to_string()))
}

/// Persists the webhook-mutable columns of a record as absolute values,
/// keyed by user id. `stripe_customer_id` is deliberately excluded; it is
/// only ever written through `attach_customer`.
pub async fn store_state<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    record: &SubscriptionRecord,
) -> Res<()> {
    sqlx::query(
        r#"
        UPDATE subscriptions
        SET status = $2,
            stripe_subscription_id = $3,
            plan_interval = $4,
            paid_trial_started_at = $5,
            paid_trial_ends_at = $6,
            current_period_start = $7,
            current_period_end = $8,
            cancelled_at = $9,
            updated_at = now()
        WHERE user_id = $1
        "#,
    )
    .bind(record.user_id)
    .bind(record.status.as_str())
    .bind(&record.stripe_subscription_id)
    .bind(record.plan_interval.map(|interval| interval.as_str()))
    .bind(record.paid_trial_started_at)
    .bind(record.paid_trial_ends_at)
    .bind(record.current_period_start)
    .bind(record.current_period_end)
    .bind(record.cancelled_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::GoogleProfile;

    async fn pool() -> sqlx::PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = sqlx::PgPool::connect(&url).await.expect("connect");
        sqlx::migrate!("./migrations").run(&pool).await.expect("migrate");
        pool
    }

    #[tokio::test]
    #[ignore = "needs a live Postgres via DATABASE_URL"]
    async fn attach_customer_keeps_first_customer_id() {
        let pool = pool().await;
        let suffix = Uuid::new_v4();
        let profile = GoogleProfile {
            google_id: format!("google-{}", suffix),
            email: format!("{}@example.com", suffix),
            name: "Test User".to_string(),
            avatar: None,
        };
        let user = crate::user::find_or_create_by_google(&pool, &profile)
            .await
            .expect("user");
        ensure(&pool, user.id).await.expect("ensure");

        let first = attach_customer(&pool, user.id, "cus_first", PlanInterval::Monthly)
            .await
            .expect("first attach");
        assert_eq!(first.stripe_customer_id.as_deref(), Some("cus_first"));
        assert_eq!(first.plan_interval, Some(PlanInterval::Monthly));

        // a second checkout must reuse the customer provisioned by the first
        let second = attach_customer(&pool, user.id, "cus_second", PlanInterval::Yearly)
            .await
            .expect("second attach");
        assert_eq!(second.stripe_customer_id.as_deref(), Some("cus_first"));
        assert_eq!(second.plan_interval, Some(PlanInterval::Monthly));
    }
}
