use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::db::models::{now_millis, Invoice, InvoiceRow, NewInvoice};
use crate::error::AppError;

pub struct InvoiceRepository;

impl InvoiceRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        user_id: &str,
        invoice: NewInvoice,
    ) -> Result<Invoice, AppError> {
        let id = Uuid::new_v4().to_string();
        let date = now_millis();
        let items = invoice.items.as_ref().map(serde_json::to_string).transpose()?;
        let savings = invoice.savings.as_ref().map(serde_json::to_string).transpose()?;

        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"
INSERT INTO invoices (id, user_id, amount, date, status, description, items, savings)
VALUES (?, ?, ?, ?, ?, ?, ?, ?)
RETURNING id, user_id, amount, date, status, description, items, savings
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(invoice.amount)
        .bind(date)
        .bind(&invoice.status)
        .bind(&invoice.description)
        .bind(items)
        .bind(savings)
        .fetch_one(pool)
        .await?;

        Ok(Invoice::try_from(row)?)
    }

    /// Newest first, at most `limit` records.
    pub async fn get_recent_for_user(
        pool: &Pool<Sqlite>,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<Invoice>, AppError> {
        let rows = sqlx::query_as::<_, InvoiceRow>(
            r#"
SELECT id, user_id, amount, date, status, description, items, savings
FROM invoices
WHERE user_id = ?
ORDER BY date DESC, seq DESC
LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        rows.into_iter()
            .map(|row| Invoice::try_from(row).map_err(AppError::from))
            .collect()
    }
}
