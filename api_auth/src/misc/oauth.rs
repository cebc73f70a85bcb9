use common::error::{AppError, Res};
use serde::Deserialize;

use db::user::GoogleProfile;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Debug, Deserialize)]
struct GoogleTokenInfo {
    aud: String,
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Verifies a Google ID token against Google's tokeninfo endpoint and
/// returns the asserted profile. The token must have been issued for our
/// OAuth client id; anything else is rejected.
pub async fn verify_id_token(client_id: &str, id_token: &str) -> Res<GoogleProfile> {
    let response = reqwest::Client::new()
        .get(TOKENINFO_URL)
        .query(&[("id_token", id_token)])
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(AppError::Unauthorized(
            "Google rejected the ID token".to_string(),
        ));
    }

    let info: GoogleTokenInfo = response.json().await?;

    if info.aud != client_id {
        return Err(AppError::Unauthorized(
            "ID token was issued for a different client".to_string(),
        ));
    }

    let email = info
        .email
        .ok_or_else(|| AppError::Unauthorized("ID token carries no email".to_string()))?;

    Ok(GoogleProfile {
        google_id: info.sub,
        name: info.name.unwrap_or_else(|| email.clone()),
        email,
        avatar: info.picture,
    })
}
