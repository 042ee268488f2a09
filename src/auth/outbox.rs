use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Verification,
    PasswordReset,
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub kind: EmailKind,
    pub token: String,
}

/// Delivery channel for verification and reset links.
#[async_trait]
pub trait Outbox: Send + Sync {
    async fn deliver(&self, email: OutgoingEmail) -> Result<(), AppError>;
}

/// Writes outgoing mail to the log.
pub struct TracingOutbox;

#[async_trait]
impl Outbox for TracingOutbox {
    async fn deliver(&self, email: OutgoingEmail) -> Result<(), AppError> {
        tracing::info!(
            to = %email.to,
            kind = ?email.kind,
            token = %email.token,
            "📧 Outgoing email"
        );
        Ok(())
    }
}

/// Keeps every delivered email in memory.
#[derive(Default)]
pub struct MemoryOutbox {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().await.clone()
    }

    /// Token of the latest email of `kind` sent to `to`.
    pub async fn last_token(&self, to: &str, kind: EmailKind) -> Option<String> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|email| email.to == to && email.kind == kind)
            .map(|email| email.token.clone())
    }
}

#[async_trait]
impl Outbox for MemoryOutbox {
    async fn deliver(&self, email: OutgoingEmail) -> Result<(), AppError> {
        self.sent.lock().await.push(email);
        Ok(())
    }
}
