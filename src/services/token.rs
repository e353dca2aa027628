//! Token service
//!
//! Opaque, expiring tokens. No route consumes them yet; they are issued,
//! looked up and purged alongside sessions.

use crate::db::repositories::TokenRepository;
use crate::models::Token;
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub struct TokenService {
    repo: Arc<dyn TokenRepository>,
}

impl TokenService {
    pub fn new(repo: Arc<dyn TokenRepository>) -> Self {
        Self { repo }
    }

    /// Issue a fresh random token valid for `ttl`
    pub async fn issue(&self, ttl: Duration) -> Result<Token> {
        let value = Uuid::new_v4().simple().to_string();
        self.repo
            .create(&value, Utc::now() + ttl)
            .await
            .context("Failed to issue token")
    }

    /// Look up a token, treating expired ones as absent
    pub async fn find_valid(&self, value: &str) -> Result<Option<Token>> {
        let token = self
            .repo
            .get_by_token(value)
            .await
            .context("Failed to look up token")?;

        Ok(token.filter(|t| !t.is_expired()))
    }

    /// Delete expired tokens, returning how many were removed
    pub async fn purge_expired(&self) -> Result<i64> {
        self.repo
            .delete_expired()
            .await
            .context("Failed to purge expired tokens")
    }
}
