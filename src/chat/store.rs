use std::fmt;
use std::str::FromStr;

use chrono::Local;
use sqlx::{Pool, Sqlite};

use crate::db::{
    ChatMessage, ChatMessageRepository, ChatSession, ChatSessionRepository, MessageKey,
    NewMessage,
};
use crate::error::{AppError, Field};

/// Opaque position in a message listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor(MessageKey);

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0.timestamp, self.0.seq)
    }
}

impl FromStr for Cursor {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::validation(Field::Cursor, format!("Invalid cursor: {}", s));
        let (timestamp, seq) = s.split_once('.').ok_or_else(invalid)?;
        Ok(Cursor(MessageKey {
            timestamp: timestamp.parse().map_err(|_| invalid())?,
            seq: seq.parse().map_err(|_| invalid())?,
        }))
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Present only when the page came back full.
    pub next_cursor: Option<Cursor>,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

pub fn default_session_title() -> String {
    format!("Chat session - {}", Local::now().format("%m/%d/%Y"))
}

/// Per-user chat sessions and their message history.
pub struct ChatSessionStore {
    db: Pool<Sqlite>,
    session_page_size: i64,
}

impl ChatSessionStore {
    pub fn new(db: Pool<Sqlite>, session_page_size: i64) -> Self {
        Self {
            db,
            session_page_size: session_page_size.max(1),
        }
    }

    pub async fn create_session(
        &self,
        user_id: &str,
        title: Option<&str>,
    ) -> Result<ChatSession, AppError> {
        let title = match title.map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => default_session_title(),
        };

        let session = ChatSessionRepository::create(&self.db, user_id, &title).await?;
        tracing::debug!(user_id, session_id = %session.id, "Chat session created");
        Ok(session)
    }

    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>, AppError> {
        ChatSessionRepository::list_for_user(&self.db, user_id, self.session_page_size).await
    }

    /// Write the message, then bump the session's activity timestamp. The two
    /// writes are independent.
    pub async fn append_message(
        &self,
        session_id: &str,
        message: NewMessage,
        user_id: &str,
    ) -> Result<ChatMessage, AppError> {
        self.authorize(session_id, user_id).await?;

        let message =
            ChatMessageRepository::create(&self.db, user_id, Some(session_id), message).await?;
        ChatSessionRepository::touch(&self.db, session_id, message.timestamp).await?;

        Ok(message)
    }

    /// Store a message that belongs to no session.
    pub async fn save_message(
        &self,
        user_id: &str,
        message: NewMessage,
    ) -> Result<ChatMessage, AppError> {
        ChatMessageRepository::create(&self.db, user_id, None, message).await
    }

    /// A page of the session's messages, oldest first.
    pub async fn get_session_messages(
        &self,
        session_id: &str,
        user_id: &str,
        cursor: Option<Cursor>,
        page_size: i64,
    ) -> Result<Page<ChatMessage>, AppError> {
        self.authorize(session_id, user_id).await?;

        let page_size = page_size.max(1);
        let items = ChatMessageRepository::list_for_session(
            &self.db,
            session_id,
            cursor.map(|c| c.0),
            page_size,
        )
        .await?;

        let next_cursor = next_cursor(items.len(), page_size, items.last());
        Ok(Page { items, next_cursor })
    }

    /// A page of the user's non-transient messages across sessions. Pages walk
    /// backwards in time; each page is returned oldest first.
    pub async fn get_history(
        &self,
        user_id: &str,
        cursor: Option<Cursor>,
        page_size: i64,
    ) -> Result<Page<ChatMessage>, AppError> {
        let page_size = page_size.max(1);
        let mut items =
            ChatMessageRepository::list_history(&self.db, user_id, cursor.map(|c| c.0), page_size)
                .await?;

        let next_cursor = next_cursor(items.len(), page_size, items.last());
        items.reverse();
        Ok(Page { items, next_cursor })
    }

    async fn authorize(&self, session_id: &str, user_id: &str) -> Result<ChatSession, AppError> {
        let session = ChatSessionRepository::get_by_id(&self.db, session_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Chat session not found".to_string()))?;

        if session.user_id != user_id {
            tracing::warn!(session_id, user_id, "Rejected access to another user's session");
            return Err(AppError::Unauthorized(
                "Unauthorized access to chat session".to_string(),
            ));
        }

        Ok(session)
    }
}

fn next_cursor(len: usize, page_size: i64, boundary: Option<&ChatMessage>) -> Option<Cursor> {
    if (len as i64) < page_size {
        return None;
    }
    boundary.map(|m| Cursor(MessageKey::from(m)))
}
