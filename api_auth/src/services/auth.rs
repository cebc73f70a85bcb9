use common::{
    env_config::Config,
    error::Res,
    jwt::{self, ClaimsSpec},
};
use sqlx::PgPool;

use crate::{dtos::auth::AuthTokens, misc::oauth};

/// Completes a Google sign-in: verifies the ID token, upserts the user and
/// makes sure a subscription record exists for them (new users start as
/// EXPIRED), then issues an application JWT.
pub async fn login_with_google(pool: &PgPool, config: &Config, id_token: &str) -> Res<AuthTokens> {
    let profile = oauth::verify_id_token(&config.google_client_id, id_token).await?;

    let user = db::user::find_or_create_by_google(pool, &profile).await?;

    db::subscription::ensure(pool, user.id).await?;

    let access_token = jwt::generate_jwt(
        ClaimsSpec {
            user_id: user.id,
            email: user.email.clone(),
        },
        &config.jwt_config,
    )?;

    Ok(AuthTokens {
        access_token,
        expires_in: config.jwt_config.expiration_hours * 3600,
        user,
    })
}
