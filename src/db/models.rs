use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Current time as stored in every timestamp column.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Utc::now)
}

#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub password_hash: Vec<u8>,
    pub password_salt: Vec<u8>,
    pub email_verified: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct AuthToken {
    pub token: String,
    pub account_id: String,
    pub purpose: String,
    pub expires_at: i64,
    pub created_at: i64,
}

/// Profile record written at signup.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub two_factor_enabled: bool,
    pub email_verified: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub name: String,
    pub quantity: u32,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsDetail {
    pub item: String,
    pub store: String,
    pub save: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Savings {
    pub total: f64,
    pub percentage: f64,
    pub details: Vec<SavingsDetail>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct InvoiceRow {
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    pub date: i64,
    pub status: String,
    pub description: String,
    pub items: Option<String>,
    pub savings: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    pub date: DateTime<Utc>,
    pub status: String,
    pub description: String,
    pub items: Option<Vec<InvoiceItem>>,
    pub savings: Option<Savings>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = serde_json::Error;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let items = row.items.as_deref().map(serde_json::from_str).transpose()?;
        let savings = row.savings.as_deref().map(serde_json::from_str).transpose()?;
        Ok(Invoice {
            id: row.id,
            user_id: row.user_id,
            amount: row.amount,
            date: to_datetime(row.date),
            status: row.status,
            description: row.description,
            items,
            savings,
        })
    }
}

/// Fields of an invoice that the caller supplies.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub amount: f64,
    pub status: String,
    pub description: String,
    pub items: Option<Vec<InvoiceItem>>,
    pub savings: Option<Savings>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: i64,
    pub last_message_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Bot,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub invoice_id: Option<String>,
    /// Transient messages never come back from history queries.
    pub temporary: bool,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub session_id: Option<String>,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: i64,
    #[sqlx(flatten)]
    pub metadata: MessageMetadata,
    #[serde(skip)]
    pub seq: i64,
}

/// A message before it has been written.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub role: MessageRole,
    pub content: String,
    pub metadata: MessageMetadata,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        NewMessage {
            role: MessageRole::User,
            content: content.into(),
            metadata: MessageMetadata::default(),
        }
    }

    pub fn bot(content: impl Into<String>) -> Self {
        NewMessage {
            role: MessageRole::Bot,
            content: content.into(),
            metadata: MessageMetadata::default(),
        }
    }

    pub fn with_invoice(mut self, invoice_id: Option<String>) -> Self {
        self.metadata.invoice_id = invoice_id;
        self
    }

    pub fn temporary(mut self) -> Self {
        self.metadata.temporary = true;
        self
    }
}
