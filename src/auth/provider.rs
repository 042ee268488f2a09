use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::AppError;

/// The auth provider's view of a signed-up user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub email_verified: bool,
}

impl Identity {
    /// Local part of the email, used when no display name is set.
    pub fn email_handle(&self) -> &str {
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

/// Authentication backend. Implementations hold the signed-in identity and
/// publish every change to subscribers.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AppError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AppError>;

    async fn sign_out(&self) -> Result<(), AppError>;

    async fn send_verification(&self, identity: &Identity) -> Result<(), AppError>;

    async fn confirm_verification(&self, token: &str) -> Result<Identity, AppError>;

    /// Fetch a fresh copy of the identity from the backend.
    async fn reload(&self, identity: &Identity) -> Result<Identity, AppError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), AppError>;

    async fn confirm_password_reset(&self, token: &str, new_password: &str)
        -> Result<(), AppError>;

    fn current(&self) -> Option<Identity>;

    /// Dropping the receiver unsubscribes.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;
}
