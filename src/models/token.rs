//! Token model
//!
//! Expiring opaque tokens (for example one-time links). Not tied to a user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: i64,
    pub token: String,
    pub date_expired: DateTime<Utc>,
}

impl Token {
    pub fn is_expired(&self) -> bool {
        self.date_expired < Utc::now()
    }
}
