use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::db::models::{now_millis, ChatMessage, NewMessage};
use crate::error::AppError;

/// Position of a message in (timestamp, insertion) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageKey {
    pub timestamp: i64,
    pub seq: i64,
}

impl From<&ChatMessage> for MessageKey {
    fn from(message: &ChatMessage) -> Self {
        MessageKey {
            timestamp: message.timestamp,
            seq: message.seq,
        }
    }
}

pub struct ChatMessageRepository;

impl ChatMessageRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        user_id: &str,
        session_id: Option<&str>,
        message: NewMessage,
    ) -> Result<ChatMessage, AppError> {
        let id = Uuid::new_v4().to_string();
        let timestamp = now_millis();

        let message = sqlx::query_as::<_, ChatMessage>(
            r#"
INSERT INTO chat_messages (id, user_id, session_id, role, content, timestamp, invoice_id, temporary)
VALUES (?, ?, ?, ?, ?, ?, ?, ?)
RETURNING id, user_id, session_id, role, content, timestamp, invoice_id, temporary, seq
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(session_id)
        .bind(message.role)
        .bind(&message.content)
        .bind(timestamp)
        .bind(&message.metadata.invoice_id)
        .bind(message.metadata.temporary)
        .fetch_one(pool)
        .await?;

        Ok(message)
    }

    /// Oldest first, strictly after `after` when given.
    pub async fn list_for_session(
        pool: &Pool<Sqlite>,
        session_id: &str,
        after: Option<MessageKey>,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, AppError> {
        let (timestamp, seq) = after.map_or((i64::MIN, i64::MIN), |k| (k.timestamp, k.seq));

        let messages = sqlx::query_as::<_, ChatMessage>(
            r#"
SELECT id, user_id, session_id, role, content, timestamp, invoice_id, temporary, seq
FROM chat_messages
WHERE session_id = ?
  AND temporary = 0
  AND (timestamp > ? OR (timestamp = ? AND seq > ?))
ORDER BY timestamp ASC, seq ASC
LIMIT ?
            "#,
        )
        .bind(session_id)
        .bind(timestamp)
        .bind(timestamp)
        .bind(seq)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    /// Newest first across all of a user's messages, strictly before `before`.
    pub async fn list_history(
        pool: &Pool<Sqlite>,
        user_id: &str,
        before: Option<MessageKey>,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, AppError> {
        let (timestamp, seq) = before.map_or((i64::MAX, i64::MAX), |k| (k.timestamp, k.seq));

        let messages = sqlx::query_as::<_, ChatMessage>(
            r#"
SELECT id, user_id, session_id, role, content, timestamp, invoice_id, temporary, seq
FROM chat_messages
WHERE user_id = ?
  AND temporary = 0
  AND (timestamp < ? OR (timestamp = ? AND seq < ?))
ORDER BY timestamp DESC, seq DESC
LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(timestamp)
        .bind(timestamp)
        .bind(seq)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }
}
