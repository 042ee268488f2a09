pub mod analyzer;

pub use analyzer::{CannedAnalyzer, InvoiceAnalysis, InvoiceAnalyzer};

use std::sync::Arc;

use sqlx::{Pool, Sqlite};

use crate::db::{Invoice, InvoiceRepository, NewInvoice};
use crate::error::{AppError, Field};

/// The record every new account starts with.
pub fn welcome_invoice() -> NewInvoice {
    NewInvoice {
        amount: 1000.0,
        status: "Pending".to_string(),
        description: "Welcome Invoice".to_string(),
        items: None,
        savings: None,
    }
}

pub struct InvoiceService {
    db: Pool<Sqlite>,
    analyzer: Arc<dyn InvoiceAnalyzer>,
    page_size: i64,
}

impl InvoiceService {
    pub fn new(db: Pool<Sqlite>, analyzer: Arc<dyn InvoiceAnalyzer>, page_size: i64) -> Self {
        Self {
            db,
            analyzer,
            page_size: page_size.max(1),
        }
    }

    /// The user's most recent invoices, newest first.
    pub async fn get_user_invoices(&self, user_id: &str) -> Result<Vec<Invoice>, AppError> {
        InvoiceRepository::get_recent_for_user(&self.db, user_id, self.page_size)
            .await
            .map_err(|e| {
                tracing::error!(user_id, error = %e, "Invoice fetch failed");
                match e {
                    AppError::Network(_) => e,
                    other => AppError::Internal(format!("Failed to fetch invoices: {}", other)),
                }
            })
    }

    /// Analyze a receipt and, for a signed-in user, store it as an invoice.
    pub async fn process_invoice_file(
        &self,
        file: &[u8],
        user_id: Option<&str>,
    ) -> Result<InvoiceAnalysis, AppError> {
        if file.is_empty() {
            return Err(AppError::validation(Field::File, "The selected file is empty"));
        }

        let mut analysis = self.analyzer.analyze(file).await?;

        if let Some(user_id) = user_id {
            let invoice = InvoiceRepository::create(
                &self.db,
                user_id,
                NewInvoice {
                    amount: analysis.total,
                    status: "Analyzed".to_string(),
                    description: format!("Invoice from {}", analysis.store),
                    items: Some(analysis.items.clone()),
                    savings: analysis.savings.clone(),
                },
            )
            .await?;
            tracing::info!(user_id, invoice_id = %invoice.id, "Stored analyzed invoice");
            analysis.id = Some(invoice.id);
        }

        Ok(analysis)
    }
}
