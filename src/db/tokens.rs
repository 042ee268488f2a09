use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::db::models::{now_millis, AuthToken};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    VerifyEmail,
    ResetPassword,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::VerifyEmail => "verify_email",
            TokenPurpose::ResetPassword => "reset_password",
        }
    }
}

/// One-shot tokens delivered by email.
pub struct TokenRepository;

impl TokenRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        account_id: &str,
        purpose: TokenPurpose,
        expiry_hours: i64,
    ) -> Result<AuthToken, AppError> {
        let token = Uuid::new_v4().simple().to_string();
        let created_at = now_millis();
        let expires_at = created_at + expiry_hours * 3_600_000;

        let token = sqlx::query_as::<_, AuthToken>(
            r#"
INSERT INTO auth_tokens (token, account_id, purpose, expires_at, created_at)
VALUES (?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&token)
        .bind(account_id)
        .bind(purpose.as_str())
        .bind(expires_at)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(token)
    }

    /// Removes the token and returns it if it was live and meant for `purpose`.
    pub async fn consume(
        pool: &Pool<Sqlite>,
        token: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<AuthToken>, AppError> {
        let now = now_millis();

        let token = sqlx::query_as::<_, AuthToken>(
            r#"
DELETE FROM auth_tokens
WHERE token = ? AND purpose = ? AND expires_at > ?
RETURNING *
            "#,
        )
        .bind(token)
        .bind(purpose.as_str())
        .bind(now)
        .fetch_optional(pool)
        .await?;

        Ok(token)
    }

    pub async fn cleanup_expired(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
        let now = now_millis();

        let result = sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}
