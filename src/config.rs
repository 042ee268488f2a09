use std::str::FromStr;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    /// Lifetime of verification and password-reset links.
    pub token_expiry_hours: i64,
    pub signin_max_failures: u32,
    pub signin_window_secs: u64,
    pub invoice_page_size: i64,
    pub session_page_size: i64,
    pub message_page_size: i64,
    pub history_page_size: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: "sqlite://invoke_assistant.db?mode=rwc".to_string(),
            db_max_connections: 5,
            db_min_connections: 1,
            token_expiry_hours: 24,
            signin_max_failures: 5,
            signin_window_secs: 300,
            invoice_page_size: 10,
            session_page_size: 20,
            message_page_size: 50,
            history_page_size: 20,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = Config::default();
        Ok(Config {
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            db_min_connections: env_or("DB_MIN_CONNECTIONS", defaults.db_min_connections)?,
            token_expiry_hours: env_or("TOKEN_EXPIRY_HOURS", defaults.token_expiry_hours)?,
            signin_max_failures: env_or("SIGNIN_MAX_FAILURES", defaults.signin_max_failures)?,
            signin_window_secs: env_or("SIGNIN_WINDOW_SECS", defaults.signin_window_secs)?,
            invoice_page_size: env_or("INVOICE_PAGE_SIZE", defaults.invoice_page_size)?,
            session_page_size: env_or("SESSION_PAGE_SIZE", defaults.session_page_size)?,
            message_page_size: env_or("MESSAGE_PAGE_SIZE", defaults.message_page_size)?,
            history_page_size: env_or("HISTORY_PAGE_SIZE", defaults.history_page_size)?,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_parses_and_rejects() {
        std::env::set_var("INVOKE_TEST_PAGE_SIZE", "15");
        assert_eq!(env_or("INVOKE_TEST_PAGE_SIZE", 10i64).unwrap(), 15);

        std::env::set_var("INVOKE_TEST_BAD_SIZE", "lots");
        let err = env_or("INVOKE_TEST_BAD_SIZE", 10i64).unwrap_err();
        assert!(err.to_string().contains("INVOKE_TEST_BAD_SIZE"));

        assert_eq!(env_or("INVOKE_TEST_MISSING", 7u32).unwrap(), 7);
    }
}
