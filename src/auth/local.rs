use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use tokio::sync::watch;

use crate::auth::outbox::{EmailKind, OutgoingEmail, Outbox};
use crate::auth::provider::{AuthProvider, Identity};
use crate::auth::throttle::SigninThrottle;
use crate::config::Config;
use crate::crypto::PasswordDigest;
use crate::db::{Account, AccountRepository, TokenPurpose, TokenRepository};
use crate::error::AppError;

impl From<Account> for Identity {
    fn from(account: Account) -> Self {
        Identity {
            uid: account.id,
            email: account.email,
            email_verified: account.email_verified,
        }
    }
}

/// Auth provider backed by the local accounts table.
pub struct LocalAuthProvider {
    db: Pool<Sqlite>,
    outbox: Arc<dyn Outbox>,
    throttle: SigninThrottle,
    token_expiry_hours: i64,
    state: watch::Sender<Option<Identity>>,
}

impl LocalAuthProvider {
    pub fn new(db: Pool<Sqlite>, outbox: Arc<dyn Outbox>, config: &Config) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            db,
            outbox,
            throttle: SigninThrottle::new(config.signin_max_failures, config.signin_window_secs),
            token_expiry_hours: config.token_expiry_hours,
            state,
        }
    }

    pub fn throttle(&self) -> &SigninThrottle {
        &self.throttle
    }

    async fn issue_token(
        &self,
        account: &Account,
        purpose: TokenPurpose,
        kind: EmailKind,
    ) -> Result<(), AppError> {
        let token =
            TokenRepository::create(&self.db, &account.id, purpose, self.token_expiry_hours)
                .await?;

        self.outbox
            .deliver(OutgoingEmail {
                to: account.email.clone(),
                kind,
                token: token.token,
            })
            .await
    }

    /// Republish the signed-in identity if it is the one that changed.
    fn refresh_current(&self, identity: &Identity) {
        self.state.send_if_modified(|current| match current {
            Some(signed_in) if signed_in.uid == identity.uid && signed_in != identity => {
                *signed_in = identity.clone();
                true
            }
            _ => false,
        });
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AppError> {
        if AccountRepository::get_by_email(&self.db, email).await?.is_some() {
            return Err(AppError::EmailInUse);
        }

        let digest = PasswordDigest::new(password)?;
        let account = AccountRepository::create(&self.db, email, &digest).await?;

        tracing::info!(uid = %account.id, "Account created");
        Ok(account.into())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AppError> {
        if self.throttle.is_limited(email).await {
            tracing::warn!(email, "Sign-in throttled");
            return Err(AppError::RateLimited);
        }

        let account = match AccountRepository::get_by_email(&self.db, email).await? {
            Some(account) => account,
            None => {
                self.throttle.record_failure(email).await;
                return Err(AppError::InvalidCredentials);
            }
        };

        let digest = PasswordDigest::from_stored(&account.password_hash, &account.password_salt)?;
        if !digest.matches(password)? {
            self.throttle.record_failure(email).await;
            return Err(AppError::InvalidCredentials);
        }

        self.throttle.clear(email).await;

        let identity = Identity::from(account);
        self.state.send_replace(Some(identity.clone()));
        tracing::info!(uid = %identity.uid, "Signed in");
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        if let Some(previous) = self.state.send_replace(None) {
            tracing::info!(uid = %previous.uid, "Signed out");
        }
        Ok(())
    }

    async fn send_verification(&self, identity: &Identity) -> Result<(), AppError> {
        let account = AccountRepository::get_by_id(&self.db, &identity.uid)
            .await?
            .ok_or(AppError::UserNotFound)?;

        self.issue_token(&account, TokenPurpose::VerifyEmail, EmailKind::Verification)
            .await
    }

    async fn confirm_verification(&self, token: &str) -> Result<Identity, AppError> {
        let token = TokenRepository::consume(&self.db, token.trim(), TokenPurpose::VerifyEmail)
            .await?
            .ok_or(AppError::InvalidToken)?;

        AccountRepository::mark_verified(&self.db, &token.account_id).await?;

        let account = AccountRepository::get_by_id(&self.db, &token.account_id)
            .await?
            .ok_or(AppError::UserNotFound)?;
        let identity = Identity::from(account);
        self.refresh_current(&identity);
        Ok(identity)
    }

    async fn reload(&self, identity: &Identity) -> Result<Identity, AppError> {
        let account = AccountRepository::get_by_id(&self.db, &identity.uid)
            .await?
            .ok_or(AppError::UserNotFound)?;

        let fresh = Identity::from(account);
        self.refresh_current(&fresh);
        Ok(fresh)
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AppError> {
        let account = AccountRepository::get_by_email(&self.db, email)
            .await?
            .ok_or(AppError::UserNotFound)?;

        self.issue_token(&account, TokenPurpose::ResetPassword, EmailKind::PasswordReset)
            .await
    }

    async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let token = TokenRepository::consume(&self.db, token.trim(), TokenPurpose::ResetPassword)
            .await?
            .ok_or(AppError::InvalidToken)?;

        let digest = PasswordDigest::new(new_password)?;
        AccountRepository::update_password(&self.db, &token.account_id, &digest).await?;

        if let Some(account) = AccountRepository::get_by_id(&self.db, &token.account_id).await? {
            self.throttle.clear(&account.email).await;
        }
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.state.subscribe()
    }
}
