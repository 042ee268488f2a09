use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::{InvoiceItem, Savings, SavingsDetail};
use crate::error::AppError;

/// Structured result of reading a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceAnalysis {
    /// Id of the invoice record the analysis was stored as, if any.
    pub id: Option<String>,
    pub store: String,
    pub items: Vec<InvoiceItem>,
    pub total: f64,
    pub savings: Option<Savings>,
}

/// Turns raw receipt bytes into an analysis. A document-understanding
/// backend plugs in here.
#[async_trait]
pub trait InvoiceAnalyzer: Send + Sync {
    async fn analyze(&self, file: &[u8]) -> Result<InvoiceAnalysis, AppError>;
}

/// Returns the same grocery receipt for every file.
pub struct CannedAnalyzer;

#[async_trait]
impl InvoiceAnalyzer for CannedAnalyzer {
    async fn analyze(&self, file: &[u8]) -> Result<InvoiceAnalysis, AppError> {
        tracing::debug!(bytes = file.len(), "Analyzing receipt with canned payload");

        let items = vec![
            item("Organic Milk", 1, 4.99),
            item("Sourdough Bread", 1, 5.49),
            item("Free-Range Eggs (dozen)", 1, 6.49),
            item("Greek Yogurt", 1, 5.99),
            item("Baby Spinach", 1, 3.99),
            item("Chicken Breast", 1, 12.99),
            item("Avocados", 2, 2.83),
        ];

        Ok(InvoiceAnalysis {
            id: None,
            store: "Whole Foods Market".to_string(),
            items,
            total: 45.60,
            savings: Some(Savings {
                total: 5.70,
                percentage: 12.5,
                details: vec![
                    detail("Organic Milk", "Trader Joe's", 1.00),
                    detail("Sourdough Bread", "Kroger", 0.70),
                    detail("Chicken Breast", "Costco", 2.50),
                    detail("Greek Yogurt", "Aldi", 1.50),
                ],
            }),
        })
    }
}

fn item(name: &str, quantity: u32, price: f64) -> InvoiceItem {
    InvoiceItem {
        name: name.to_string(),
        quantity,
        price,
    }
}

fn detail(item: &str, store: &str, save: f64) -> SavingsDetail {
    SavingsDetail {
        item: item.to_string(),
        store: store.to_string(),
        save,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_canned_payload_is_consistent() {
        let analysis = CannedAnalyzer.analyze(b"%PDF-1.7").await.unwrap();

        let line_total: f64 = analysis
            .items
            .iter()
            .map(|i| i.price * f64::from(i.quantity))
            .sum();
        assert!((line_total - analysis.total).abs() < 0.005);

        let savings = analysis.savings.unwrap();
        let detail_total: f64 = savings.details.iter().map(|d| d.save).sum();
        assert!((detail_total - savings.total).abs() < 0.005);
        assert!(analysis.id.is_none());
    }
}
