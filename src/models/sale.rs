//! Sale model
//!
//! A marketplace listing. Listings start active and can only be marked sold.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Item picture stored when a listing is created without one
pub const DEFAULT_ITEM_IMAGE: &str = "default_item.jpg";

/// Sale entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: i64,
    pub title: String,
    /// Free-form asking price, e.g. "20 EUR" or "trade only"
    pub price: String,
    /// Item picture file name under `item_pics/`
    pub image_file: String,
    pub is_active: bool,
    pub content: String,
    pub date_posted: DateTime<Utc>,
    /// Seller
    pub user_id: i64,
}

/// Sale joined with its seller and comment count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleSummary {
    #[serde(flatten)]
    pub sale: Sale,
    pub author: String,
    pub author_image: String,
    pub comment_count: i64,
}

/// Input for creating a listing
#[derive(Debug, Clone)]
pub struct CreateSaleInput {
    pub title: String,
    pub price: String,
    pub content: String,
    /// Stored picture file name; `None` falls back to [`DEFAULT_ITEM_IMAGE`]
    pub image_file: Option<String>,
}

impl CreateSaleInput {
    pub fn new(title: impl Into<String>, price: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            price: price.into(),
            content: content.into(),
            image_file: None,
        }
    }

    pub fn with_image(mut self, image_file: impl Into<String>) -> Self {
        self.image_file = Some(image_file.into());
        self
    }
}
