use sqlx::{Pool, Sqlite};

use crate::auth::CredentialService;
use crate::chat::SignedInUser;
use crate::db::{Invoice, UserRepository};
use crate::error::AppError;
use crate::invoices::InvoiceService;

/// What the protected dashboard shows.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub display_name: String,
    pub email: String,
    pub email_verified: bool,
    pub invoices: Vec<Invoice>,
}

pub struct Dashboard;

impl Dashboard {
    /// Requires a signed-in user.
    pub async fn load(
        db: &Pool<Sqlite>,
        credentials: &CredentialService,
        invoices: &InvoiceService,
    ) -> Result<DashboardView, AppError> {
        let identity = credentials.require_signed_in()?;
        let profile = UserRepository::get_by_id(db, &identity.uid).await?;
        let recent = invoices.get_user_invoices(&identity.uid).await?;

        let user = SignedInUser::new(identity, profile.as_ref());
        Ok(DashboardView {
            display_name: user.display_name,
            email: user.identity.email,
            email_verified: user.identity.email_verified,
            invoices: recent,
        })
    }
}
