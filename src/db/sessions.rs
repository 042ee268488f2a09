use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::db::models::{now_millis, ChatSession};
use crate::error::AppError;

pub struct ChatSessionRepository;

impl ChatSessionRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        user_id: &str,
        title: &str,
    ) -> Result<ChatSession, AppError> {
        let id = Uuid::new_v4().to_string();
        let created_at = now_millis();

        let session = sqlx::query_as::<_, ChatSession>(
            r#"
INSERT INTO chat_sessions (id, user_id, title, created_at, last_message_at)
VALUES (?, ?, ?, ?, ?)
RETURNING id, user_id, title, created_at, last_message_at
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(title)
        .bind(created_at)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(session)
    }

    pub async fn get_by_id(
        pool: &Pool<Sqlite>,
        id: &str,
    ) -> Result<Option<ChatSession>, AppError> {
        let session = sqlx::query_as::<_, ChatSession>(
            "SELECT id, user_id, title, created_at, last_message_at FROM chat_sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(session)
    }

    /// Most recently active first.
    pub async fn list_for_user(
        pool: &Pool<Sqlite>,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatSession>, AppError> {
        let sessions = sqlx::query_as::<_, ChatSession>(
            r#"
SELECT id, user_id, title, created_at, last_message_at
FROM chat_sessions
WHERE user_id = ?
ORDER BY last_message_at DESC, seq DESC
LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(sessions)
    }

    pub async fn touch(pool: &Pool<Sqlite>, id: &str, at: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE chat_sessions SET last_message_at = MAX(last_message_at, ?) WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
