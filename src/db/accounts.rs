use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::crypto::PasswordDigest;
use crate::db::models::{now_millis, Account};
use crate::error::AppError;

pub struct AccountRepository;

impl AccountRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        email: &str,
        digest: &PasswordDigest,
    ) -> Result<Account, AppError> {
        let id = Uuid::new_v4().to_string();
        let created_at = now_millis();

        let account = sqlx::query_as::<_, Account>(
            r#"
INSERT INTO accounts (id, email, password_hash, password_salt, email_verified, created_at)
VALUES (?, ?, ?, ?, 0, ?)
RETURNING *
            "#,
        )
        .bind(&id)
        .bind(email)
        .bind(digest.hash.as_slice())
        .bind(digest.salt.as_slice())
        .bind(created_at)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            let duplicate = e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation());
            if duplicate {
                AppError::EmailInUse
            } else {
                AppError::from(e)
            }
        })?;

        Ok(account)
    }

    pub async fn get_by_email(
        pool: &Pool<Sqlite>,
        email: &str,
    ) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = ?")
            .bind(email)
            .fetch_optional(pool)
            .await?;

        Ok(account)
    }

    pub async fn get_by_id(pool: &Pool<Sqlite>, id: &str) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(account)
    }

    pub async fn mark_verified(pool: &Pool<Sqlite>, id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE accounts SET email_verified = 1 WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn update_password(
        pool: &Pool<Sqlite>,
        id: &str,
        digest: &PasswordDigest,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE accounts SET password_hash = ?, password_salt = ? WHERE id = ?")
            .bind(digest.hash.as_slice())
            .bind(digest.salt.as_slice())
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
