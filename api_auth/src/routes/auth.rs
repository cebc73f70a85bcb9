use std::sync::Arc;

use actix_web::{Responder, get, post, web};
use common::{env_config::Config, error::Res, http::Success, jwt::JwtClaims};
use sqlx::PgPool;

use crate::{
    dtos::auth::{GoogleLoginRequest, MeResponse},
    services,
};

/// Signs a user in with a Google ID token obtained by the web client.
///
/// Verifies the token upstream, upserts the user, lazily creates their
/// subscription record and returns an application JWT.
#[post("/google")]
pub async fn post_google(
    req: web::Json<GoogleLoginRequest>,
    pool: web::Data<PgPool>,
    config: web::Data<Arc<Config>>,
) -> Res<impl Responder> {
    let tokens = services::auth::login_with_google(&pool, &config, &req.id_token).await?;
    Success::ok(tokens)
}

/// Returns the authenticated user.
#[get("/me")]
pub async fn get_me(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<PgPool>,
) -> Res<impl Responder> {
    let user = db::user::get_user_by_id(pool.get_ref(), claims.sub).await?;
    Success::ok(MeResponse { user })
}
