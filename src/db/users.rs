use sqlx::{Pool, Sqlite};

use crate::db::models::{now_millis, UserProfile};
use crate::error::AppError;

pub struct UserRepository;

impl UserRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        uid: &str,
        email: &str,
    ) -> Result<UserProfile, AppError> {
        let created_at = now_millis();

        let profile = sqlx::query_as::<_, UserProfile>(
            r#"
INSERT INTO users (uid, email, display_name, two_factor_enabled, email_verified, created_at)
VALUES (?, ?, NULL, 0, 0, ?)
RETURNING *
            "#,
        )
        .bind(uid)
        .bind(email)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(profile)
    }

    pub async fn get_by_id(
        pool: &Pool<Sqlite>,
        uid: &str,
    ) -> Result<Option<UserProfile>, AppError> {
        let profile = sqlx::query_as::<_, UserProfile>("SELECT * FROM users WHERE uid = ?")
            .bind(uid)
            .fetch_optional(pool)
            .await?;

        Ok(profile)
    }

    pub async fn set_email_verified(pool: &Pool<Sqlite>, uid: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET email_verified = 1 WHERE uid = ?")
            .bind(uid)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn set_display_name(
        pool: &Pool<Sqlite>,
        uid: &str,
        display_name: &str,
    ) -> Result<Option<UserProfile>, AppError> {
        let profile = sqlx::query_as::<_, UserProfile>(
            "UPDATE users SET display_name = ? WHERE uid = ? RETURNING *",
        )
        .bind(display_name)
        .bind(uid)
        .fetch_optional(pool)
        .await?;

        Ok(profile)
    }
}
