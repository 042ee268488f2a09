use std::fmt;

use thiserror::Error;

/// Input field an error can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Email,
    Password,
    ConfirmPassword,
    File,
    Title,
    Cursor,
    DisplayName,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Email => "email",
            Field::Password => "password",
            Field::ConfirmPassword => "confirmPassword",
            Field::File => "file",
            Field::Title => "title",
            Field::Cursor => "cursor",
            Field::DisplayName => "displayName",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error on {field}: {message}")]
    Validation { field: Field, message: String },

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already in use")]
    EmailInUse,

    #[error("No account found with this email")]
    UserNotFound,

    #[error("Email not yet verified. Please check your inbox.")]
    EmailNotVerified,

    #[error("This link is invalid or has expired")]
    InvalidToken,

    #[error("Too many attempts. Try again later.")]
    RateLimited,

    #[error("Network error. Check your connection.")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: Field, message: impl Into<String>) -> Self {
        AppError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Converts the error into what the user sees: a message under the
    /// offending input, or a transient banner.
    pub fn notice(&self) -> Notice {
        match self {
            AppError::Validation { field, message } => Notice::field(*field, message.clone()),
            AppError::InvalidCredentials => {
                Notice::field(Field::Password, "Invalid email or password")
            }
            AppError::EmailInUse => Notice::field(Field::Email, "This email is already registered"),
            AppError::UserNotFound => Notice::field(Field::Email, self.to_string()),
            AppError::EmailNotVerified | AppError::InvalidToken | AppError::RateLimited => {
                Notice::error(self.to_string())
            }
            AppError::Network(_) => Notice::error("Network error. Check your connection."),
            AppError::Auth(msg)
            | AppError::Unauthorized(msg)
            | AppError::NotFound(msg)
            | AppError::Crypto(msg)
            | AppError::Config(msg)
            | AppError::Internal(msg) => Notice::error(msg.clone()),
            // Backend failures are passed through verbatim
            AppError::Database(err) => Notice::error(err.to_string()),
            AppError::Migration(err) => Notice::error(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                AppError::Network(err.to_string())
            }
            other => AppError::Database(other),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("Malformed record: {}", err))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A user-facing message produced at an operation boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Field { field: Field, message: String },
    Banner { level: NoticeLevel, message: String },
}

impl Notice {
    pub fn field(field: Field, message: impl Into<String>) -> Self {
        Notice::Field {
            field,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Notice::Banner {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Notice::Banner {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notice::Banner {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Notice::Field { message, .. } | Notice::Banner { message, .. } => message,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Field { field, message } => write!(f, "[{}] {}", field, message),
            Notice::Banner { level, message } => {
                let tag = match level {
                    NoticeLevel::Info => "info",
                    NoticeLevel::Success => "ok",
                    NoticeLevel::Error => "error",
                };
                write!(f, "({}) {}", tag, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_errors_map_to_fields() {
        assert_eq!(
            AppError::InvalidCredentials.notice(),
            Notice::field(Field::Password, "Invalid email or password")
        );
        assert_eq!(
            AppError::EmailInUse.notice(),
            Notice::field(Field::Email, "This email is already registered")
        );
    }

    #[test]
    fn test_rate_limit_and_network_are_banners() {
        assert_eq!(
            AppError::RateLimited.notice(),
            Notice::error("Too many attempts. Try again later.")
        );
        assert_eq!(
            AppError::Network("connection refused".into()).notice(),
            Notice::error("Network error. Check your connection.")
        );
    }

    #[test]
    fn test_pool_timeout_is_network_error() {
        let err: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, AppError::Network(_)));

        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[test]
    fn test_backend_message_passes_through() {
        let notice = AppError::Unauthorized("Unauthorized access to chat session".into()).notice();
        assert_eq!(notice.message(), "Unauthorized access to chat session");
    }
}
