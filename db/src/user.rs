use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::user::User;

pub struct GoogleProfile {
    pub google_id: String,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
}

pub async fn get_user_by_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(executor)
        .await
        .map_err(AppError::from)
}

/// Upserts a user from a verified Google profile, keyed by the Google
/// subject id. Profile fields are refreshed on every sign-in.
pub async fn find_or_create_by_google<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    profile: &GoogleProfile,
) -> Res<User> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (google_id, email, name, avatar)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (google_id) DO UPDATE
        SET email = EXCLUDED.email,
            name = EXCLUDED.name,
            avatar = EXCLUDED.avatar,
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(&profile.google_id)
    .bind(&profile.email)
    .bind(&profile.name)
    .bind(&profile.avatar)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}
