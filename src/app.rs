use std::sync::Arc;

use sqlx::{Pool, Sqlite};
use tokio::sync::watch;

use crate::auth::{CredentialService, Identity, LocalAuthProvider, Outbox, SigninThrottle};
use crate::chat::{ChatSessionStore, ConversationController, PageSizes, SignedInUser};
use crate::config::Config;
use crate::dashboard::{Dashboard, DashboardView};
use crate::db::UserRepository;
use crate::error::AppError;
use crate::invoices::{InvoiceAnalyzer, InvoiceService};

/// Wires the services together for one client and forwards auth
/// transitions to the conversation.
pub struct App {
    pub config: Config,
    pub db: Pool<Sqlite>,
    pub credentials: CredentialService,
    pub invoices: Arc<InvoiceService>,
    pub store: Arc<ChatSessionStore>,
    pub conversation: ConversationController,
    throttle: SigninThrottle,
    auth_state: watch::Receiver<Option<Identity>>,
}

impl App {
    pub fn new(
        config: Config,
        db: Pool<Sqlite>,
        outbox: Arc<dyn Outbox>,
        analyzer: Arc<dyn InvoiceAnalyzer>,
    ) -> Self {
        let provider = Arc::new(LocalAuthProvider::new(db.clone(), outbox, &config));
        let throttle = provider.throttle().clone();
        let credentials = CredentialService::new(provider, db.clone());
        let invoices = Arc::new(InvoiceService::new(
            db.clone(),
            analyzer,
            config.invoice_page_size,
        ));
        let store = Arc::new(ChatSessionStore::new(db.clone(), config.session_page_size));
        let conversation = ConversationController::new(
            store.clone(),
            invoices.clone(),
            PageSizes {
                messages: config.message_page_size,
                history: config.history_page_size,
            },
        );
        let auth_state = credentials.subscribe();

        Self {
            config,
            db,
            credentials,
            invoices,
            store,
            conversation,
            throttle,
            auth_state,
        }
    }

    /// Apply a pending sign-in or sign-out to the conversation.
    pub async fn sync_auth_state(&mut self) -> Result<bool, AppError> {
        let changed = self
            .auth_state
            .has_changed()
            .map_err(|_| AppError::Internal("Auth state channel closed".to_string()))?;
        if !changed {
            return Ok(false);
        }

        let current = self.auth_state.borrow_and_update().clone();
        match current {
            Some(identity) => {
                let profile = match UserRepository::get_by_id(&self.db, &identity.uid).await {
                    Ok(profile) => profile,
                    Err(e) => {
                        tracing::warn!(uid = %identity.uid, error = %e, "Profile lookup failed");
                        None
                    }
                };
                self.conversation
                    .on_signed_in(SignedInUser::new(identity, profile.as_ref()))
                    .await;
            }
            None => self.conversation.on_signed_out(),
        }
        Ok(true)
    }

    /// Rename the signed-in user and greet them by the new name from now on.
    pub async fn update_display_name(&mut self, name: &str) -> Result<(), AppError> {
        let profile = self.credentials.update_display_name(name).await?;
        let identity = self.credentials.require_signed_in()?;
        self.conversation
            .on_signed_in(SignedInUser::new(identity, Some(&profile)))
            .await;
        Ok(())
    }

    pub fn throttle(&self) -> &SigninThrottle {
        &self.throttle
    }

    pub async fn dashboard(&self) -> Result<DashboardView, AppError> {
        Dashboard::load(&self.db, &self.credentials, &self.invoices).await
    }
}
