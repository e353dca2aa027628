//! Sale service
//!
//! Marketplace listings. A listing is created active and can only be marked
//! sold, by its seller.

use crate::db::repositories::SaleRepository;
use crate::models::{CreateSaleInput, Sale, SaleSummary, User};
use crate::services::post::MAX_TITLE_LEN;
use anyhow::Context;
use std::sync::Arc;

pub const MAX_PRICE_LEN: usize = 50;

/// Error types for sale service operations
#[derive(Debug, thiserror::Error)]
pub enum SaleServiceError {
    #[error("Sale not found: {0}")]
    NotFound(i64),

    /// Caller is not the seller
    #[error("Not allowed to modify sale {0}")]
    Forbidden(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct SaleService {
    repo: Arc<dyn SaleRepository>,
}

impl SaleService {
    pub fn new(repo: Arc<dyn SaleRepository>) -> Self {
        Self { repo }
    }

    /// Create a listing. Without a picture the default item image is used.
    pub async fn create(&self, seller: &User, input: CreateSaleInput) -> Result<Sale, SaleServiceError> {
        if input.title.trim().is_empty() || input.price.trim().is_empty() || input.content.trim().is_empty() {
            return Err(SaleServiceError::ValidationError(
                "Title, price and description are required".to_string(),
            ));
        }
        if input.title.chars().count() > MAX_TITLE_LEN || input.price.chars().count() > MAX_PRICE_LEN {
            return Err(SaleServiceError::ValidationError(
                "Title or price is too long".to_string(),
            ));
        }

        let sale = self
            .repo
            .create(seller.id, &input)
            .await
            .context("Failed to create sale")?;
        tracing::info!("User {} listed sale {}", seller.id, sale.id);

        Ok(sale)
    }

    pub async fn get(&self, id: i64) -> Result<Sale, SaleServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get sale")?
            .ok_or(SaleServiceError::NotFound(id))
    }

    /// Sale with seller and comment count, for the sale page
    pub async fn get_summary(&self, id: i64) -> Result<SaleSummary, SaleServiceError> {
        self.repo
            .get_summary(id)
            .await
            .context("Failed to get sale summary")?
            .ok_or(SaleServiceError::NotFound(id))
    }

    /// All listings, newest first, sold ones included
    pub async fn list(&self) -> Result<Vec<SaleSummary>, SaleServiceError> {
        let sales = self.repo.list_summaries().await.context("Failed to list sales")?;
        Ok(sales)
    }

    /// Mark a listing sold.
    ///
    /// The seller check happens before any write, so a refused request
    /// leaves the listing untouched. Repeating the call is a no-op.
    pub async fn mark_sold(&self, user: &User, id: i64) -> Result<Sale, SaleServiceError> {
        let sale = self.get(id).await?;
        if !user.owns(sale.user_id) {
            tracing::warn!("User {} tried to mark sale {} owned by {} as sold", user.id, id, sale.user_id);
            return Err(SaleServiceError::Forbidden(id));
        }

        if sale.is_active {
            self.repo
                .set_active(id, false)
                .await
                .context("Failed to mark sale as sold")?;
            tracing::info!("Sale {} marked as sold", id);
        }

        Ok(Sale {
            is_active: false,
            ..sale
        })
    }
}
