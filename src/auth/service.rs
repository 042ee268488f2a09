use std::sync::Arc;

use sqlx::{Pool, Sqlite};
use tokio::sync::watch;

use crate::auth::provider::{AuthProvider, Identity};
use crate::auth::validation::{validate_email, validate_password, validate_password_match};
use crate::db::{InvoiceRepository, UserProfile, UserRepository};
use crate::error::{AppError, Field};
use crate::invoices::welcome_invoice;

/// Validated front door to the auth provider. Every input is checked before
/// the provider is called.
#[derive(Clone)]
pub struct CredentialService {
    provider: Arc<dyn AuthProvider>,
    db: Pool<Sqlite>,
}

impl CredentialService {
    pub fn new(provider: Arc<dyn AuthProvider>, db: Pool<Sqlite>) -> Self {
        Self { provider, db }
    }

    /// Create the account, send the verification email, then write the
    /// profile and the welcome invoice. Steps already done are kept when a
    /// later one fails.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        confirm_password: Option<&str>,
    ) -> Result<Identity, AppError> {
        let email = validate_email(email)?;
        validate_password(password)?;
        if let Some(confirm) = confirm_password {
            validate_password_match(password, confirm)?;
        }

        let identity = self.provider.create_account(&email, password).await?;

        if let Err(e) = self.provider.send_verification(&identity).await {
            tracing::error!(uid = %identity.uid, error = %e, "Email verification error");
            return Err(partial_signup(&identity, "Failed to send verification email"));
        }

        if let Err(e) = UserRepository::create(&self.db, &identity.uid, &email).await {
            tracing::error!(uid = %identity.uid, error = %e, "User profile write failed");
            return Err(partial_signup(&identity, "Failed to create user profile"));
        }

        if let Err(e) = InvoiceRepository::create(&self.db, &identity.uid, welcome_invoice()).await {
            tracing::error!(uid = %identity.uid, error = %e, "Welcome invoice write failed");
            return Err(partial_signup(&identity, "Failed to create welcome invoice"));
        }

        tracing::info!(uid = %identity.uid, "Signup completed");
        Ok(identity)
    }

    pub async fn signin(&self, email: &str, password: &str) -> Result<Identity, AppError> {
        let email = validate_email(email)?;
        validate_password(password)?;

        self.provider.sign_in(&email, password).await
    }

    pub async fn signout(&self) -> Result<(), AppError> {
        self.provider.sign_out().await
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), AppError> {
        let email = validate_email(email)?;
        self.provider.send_password_reset(&email).await
    }

    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        validate_password(new_password)?;
        self.provider.confirm_password_reset(token, new_password).await
    }

    /// Apply a verification link and mirror the flag into the profile.
    pub async fn confirm_email(&self, token: &str) -> Result<Identity, AppError> {
        let identity = self.provider.confirm_verification(token).await?;
        UserRepository::set_email_verified(&self.db, &identity.uid).await?;
        Ok(identity)
    }

    pub async fn resend_verification(&self) -> Result<(), AppError> {
        let identity = self.require_signed_in()?;
        self.provider.send_verification(&identity).await
    }

    /// Reload the signed-in identity and require its email to be verified.
    pub async fn check_verification(&self) -> Result<Identity, AppError> {
        let identity = self.require_signed_in()?;
        let fresh = self.provider.reload(&identity).await?;
        if !fresh.email_verified {
            return Err(AppError::EmailNotVerified);
        }
        Ok(fresh)
    }

    /// Set the name shown in greetings and on the dashboard.
    pub async fn update_display_name(&self, name: &str) -> Result<UserProfile, AppError> {
        let identity = self.require_signed_in()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation(Field::DisplayName, "Display name is required"));
        }

        UserRepository::set_display_name(&self.db, &identity.uid, name)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    /// Guard for protected views.
    pub fn require_signed_in(&self) -> Result<Identity, AppError> {
        self.provider
            .current()
            .ok_or_else(|| AppError::Auth("Please sign in to continue".to_string()))
    }

    pub fn current(&self) -> Option<Identity> {
        self.provider.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.provider.subscribe()
    }
}

fn partial_signup(identity: &Identity, message: &str) -> AppError {
    // No compensation: the identity stays registered
    tracing::warn!(uid = %identity.uid, "Signup left incomplete");
    AppError::Internal(message.to_string())
}
