use common::env_config::Config;
use common::error::{AppError, Res};
use common::stripe::USER_ID_METADATA_KEY;
use db::models::subscription::PlanInterval;
use db::models::user::User;
use sqlx::PgPool;
use stripe::{
    BillingPortalSession, CheckoutSession, CheckoutSessionMode, Client,
    CreateBillingPortalSession, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionPaymentMethodTypes, CreateCheckoutSessionSubscriptionData, CustomerId,
};
use uuid::Uuid;

const TRIAL_PERIOD_DAYS: u32 = 7;

fn price_id(config: &Config, interval: PlanInterval) -> String {
    match interval {
        PlanInterval::Monthly => config.stripe.monthly_price_id.clone(),
        PlanInterval::Yearly => config.stripe.yearly_price_id.clone(),
    }
}

/// Creates a hosted checkout session for the user's requested plan.
///
/// The Stripe customer is provisioned lazily on the first checkout and then
/// reused forever; `attach_customer` is the single write path for the
/// customer id, so a repeated call can never overwrite it.
pub async fn create_checkout(
    client: &Client,
    pool: &PgPool,
    config: &Config,
    user: &User,
    interval: PlanInterval,
) -> Res<String> {
    let record = db::subscription::get_by_user_id(pool, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("No subscription record found".to_string()))?;

    let customer_id = match record.stripe_customer_id {
        Some(id) => id,
        None => {
            let customer =
                common::stripe::create_customer(client, &user.email, &user.name, user.id).await?;
            let record =
                db::subscription::attach_customer(pool, user.id, customer.id.as_str(), interval)
                    .await?;
            // a concurrent checkout may have won the write; use what stuck
            record.stripe_customer_id.ok_or_else(|| {
                AppError::Internal("Subscription record lost its customer id".to_string())
            })?
        }
    };

    let customer_id = customer_id
        .parse::<CustomerId>()
        .map_err(|e| AppError::Internal(format!("Invalid customer ID: {}", e)))?;

    let price = price_id(config, interval);
    let success_url = format!("{}/?subscription=success", config.frontend_url);
    let cancel_url = format!("{}/?subscription=cancelled", config.frontend_url);
    let user_metadata: stripe::Metadata = [(USER_ID_METADATA_KEY.to_string(), user.id.to_string())]
        .into_iter()
        .collect();

    let params = CreateCheckoutSession {
        payment_method_types: Some(vec![CreateCheckoutSessionPaymentMethodTypes::Card]),
        line_items: Some(vec![CreateCheckoutSessionLineItems {
            price: Some(price),
            quantity: Some(1),
            ..Default::default()
        }]),
        mode: Some(CheckoutSessionMode::Subscription),
        success_url: Some(success_url.as_str()),
        cancel_url: Some(cancel_url.as_str()),
        customer: Some(customer_id),
        subscription_data: Some(CreateCheckoutSessionSubscriptionData {
            trial_period_days: Some(TRIAL_PERIOD_DAYS),
            metadata: Some(user_metadata.clone()),
            ..Default::default()
        }),
        metadata: Some(user_metadata),
        ..Default::default()
    };

    let session = CheckoutSession::create(client, params)
        .await
        .map_err(AppError::from)?;

    session
        .url
        .ok_or_else(|| AppError::Internal("Checkout session carries no URL".to_string()))
}

/// Creates a hosted billing-management session. Requires a billing customer
/// to exist already; checkout is the path that creates one.
pub async fn create_portal_session(
    client: &Client,
    pool: &PgPool,
    user_id: Uuid,
    config: &Config,
) -> Res<String> {
    let record = db::subscription::get_by_user_id(pool, user_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("No billing customer found".to_string()))?;

    let customer_id = record
        .stripe_customer_id
        .ok_or_else(|| AppError::BadRequest("No billing customer found".to_string()))?
        .parse::<CustomerId>()
        .map_err(|e| AppError::Internal(format!("Invalid customer ID: {}", e)))?;

    let mut params = CreateBillingPortalSession::new(customer_id);
    params.return_url = Some(config.frontend_url.as_str());

    let session = BillingPortalSession::create(client, params)
        .await
        .map_err(AppError::from)?;

    Ok(session.url)
}
