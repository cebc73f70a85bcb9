use std::sync::Arc;

use actix_web::{Responder, post, web};
use chrono::Utc;
use common::{
    env_config::Config,
    error::{AppError, Res},
    http::Success,
};
use sqlx::PgPool;

use crate::{dtos::sub::WebhookAck, services};

/// Handles Stripe webhook events for the subscription lifecycle.
///
/// Not called by the frontend: Stripe's servers POST here when billing
/// events occur. The raw body is verified against the `stripe-signature`
/// header before any of it is interpreted; a bad signature never touches
/// the store. Interpretation failures answer 400 so Stripe retries
/// transient errors, while events outside our concern are acknowledged
/// with 200 to stop retry storms.
#[post("/webhook")]
pub async fn post_webhook(
    payload: String,
    req: actix_web::HttpRequest,
    pool: web::Data<PgPool>,
    config: web::Data<Arc<Config>>,
) -> Res<impl Responder> {
    let signature = match req.headers().get("stripe-signature") {
        Some(signature) => signature.to_str().unwrap_or(""),
        None => return Err(AppError::BadRequest("Stripe signature missing".to_string())),
    };

    let event =
        services::webhook::construct_event(&payload, signature, &config.stripe.webhook_secret)?;
    let billing_event = services::webhook::map_event(event);

    if let Err(e) = services::webhook::apply(&pool, billing_event, Utc::now()).await {
        log::error!("Webhook processing failed: {}", e);
        return Err(AppError::BadRequest(format!("Webhook error: {}", e)));
    }

    Success::ok(WebhookAck { received: true })
}
