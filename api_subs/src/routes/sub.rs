use std::sync::Arc;

use actix_web::{Responder, get, post, web};
use chrono::Utc;
use common::{
    env_config::Config,
    error::{AppError, Res},
    http::Success,
    jwt::JwtClaims,
};
use db::models::subscription::PlanInterval;
use sqlx::PgPool;

use crate::{
    dtos::sub::{BillingConfigResponse, CheckoutRequest, SessionResponse},
    services,
};

/// Public billing configuration for the web client: plan prices and the
/// publishable key used to render the checkout button.
#[get("/config")]
pub async fn get_config(config: web::Data<Arc<Config>>) -> Res<impl Responder> {
    Success::ok(BillingConfigResponse {
        publishable_key: config.stripe.publishable_key.clone(),
        monthly_price: config.stripe.monthly_price,
        yearly_price: config.stripe.yearly_price,
    })
}

/// Returns the entitlement projection for the authenticated user.
#[get("/status")]
pub async fn get_status(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<PgPool>,
) -> Res<impl Responder> {
    let record = db::subscription::get_by_user_id(pool.get_ref(), claims.sub).await?;
    let info = services::entitlement::resolve(record.as_ref(), Utc::now());
    Success::ok(info)
}

/// Creates a hosted checkout session for the requested plan and returns its
/// redirect URL.
#[post("/checkout")]
pub async fn post_checkout(
    claims: web::ReqData<JwtClaims>,
    req: web::Json<CheckoutRequest>,
    pool: web::Data<PgPool>,
    config: web::Data<Arc<Config>>,
    client: web::Data<stripe::Client>,
) -> Res<impl Responder> {
    let interval = req.plan_interval.parse::<PlanInterval>().map_err(|_| {
        AppError::BadRequest("planInterval must be \"monthly\" or \"yearly\"".to_string())
    })?;

    let user = db::user::get_user_by_id(pool.get_ref(), claims.sub).await?;
    let url = services::checkout::create_checkout(&client, &pool, &config, &user, interval).await?;

    Success::ok(SessionResponse { url })
}

/// Creates a hosted billing-management session and returns its redirect URL.
#[post("/portal")]
pub async fn post_portal(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<PgPool>,
    config: web::Data<Arc<Config>>,
    client: web::Data<stripe::Client>,
) -> Res<impl Responder> {
    let url =
        services::checkout::create_portal_session(&client, &pool, claims.sub, &config).await?;
    Success::ok(SessionResponse { url })
}
