pub mod accounts;
pub mod invoices;
pub mod messages;
pub mod models;
pub mod sessions;
pub mod tokens;
pub mod users;

pub use accounts::AccountRepository;
pub use invoices::InvoiceRepository;
pub use messages::{ChatMessageRepository, MessageKey};
pub use models::{
    Account, ChatMessage, ChatSession, Invoice, InvoiceItem, MessageMetadata, MessageRole,
    NewInvoice, NewMessage, Savings, SavingsDetail, UserProfile,
};
pub use sessions::ChatSessionRepository;
pub use tokens::{TokenPurpose, TokenRepository};
pub use users::UserRepository;

use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

use crate::config::Config;
use crate::error::AppError;

/// Open the configured database and apply migrations.
pub async fn connect(config: &Config) -> Result<Pool<Sqlite>, AppError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database; the schema lives as long as the pool.
pub async fn connect_in_memory() -> Result<Pool<Sqlite>, AppError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}
