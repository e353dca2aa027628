//! Token repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Token;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Token repository trait
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Store a token expiring at `date_expired`
    async fn create(&self, token: &str, date_expired: DateTime<Utc>) -> Result<Token>;

    /// Look a token up by its value
    async fn get_by_token(&self, token: &str) -> Result<Option<Token>>;

    /// Delete expired tokens, returning how many were removed
    async fn delete_expired(&self) -> Result<i64>;
}

pub struct SqlxTokenRepository {
    pool: DynDatabasePool,
}

impl SqlxTokenRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TokenRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TokenRepository for SqlxTokenRepository {
    async fn create(&self, token: &str, date_expired: DateTime<Utc>) -> Result<Token> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_token_sqlite(self.pool.sqlite()?, token, date_expired).await,
            DatabaseDriver::Mysql => create_token_mysql(self.pool.mysql()?, token, date_expired).await,
        }
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Token>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_token_sqlite(self.pool.sqlite()?, token).await,
            DatabaseDriver::Mysql => get_token_mysql(self.pool.mysql()?, token).await,
        }
    }

    async fn delete_expired(&self) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_expired_tokens_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => delete_expired_tokens_mysql(self.pool.mysql()?).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_token_sqlite(pool: &SqlitePool, token: &str, date_expired: DateTime<Utc>) -> Result<Token> {
    let result = sqlx::query("INSERT INTO tokens (token, date_expired) VALUES (?, ?)")
        .bind(token)
        .bind(date_expired)
        .execute(pool)
        .await
        .context("Failed to create token")?;

    Ok(Token {
        id: result.last_insert_rowid(),
        token: token.to_string(),
        date_expired,
    })
}

async fn get_token_sqlite(pool: &SqlitePool, token: &str) -> Result<Option<Token>> {
    let row = sqlx::query("SELECT id, token, date_expired FROM tokens WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await
        .context("Failed to get token")?;

    Ok(row.map(|row| Token {
        id: row.get("id"),
        token: row.get("token"),
        date_expired: row.get("date_expired"),
    }))
}

async fn delete_expired_tokens_sqlite(pool: &SqlitePool) -> Result<i64> {
    let result = sqlx::query("DELETE FROM tokens WHERE date_expired < ?")
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to delete expired tokens")?;

    Ok(result.rows_affected() as i64)
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_token_mysql(pool: &MySqlPool, token: &str, date_expired: DateTime<Utc>) -> Result<Token> {
    let result = sqlx::query("INSERT INTO tokens (token, date_expired) VALUES (?, ?)")
        .bind(token)
        .bind(date_expired)
        .execute(pool)
        .await
        .context("Failed to create token")?;

    Ok(Token {
        id: result.last_insert_id() as i64,
        token: token.to_string(),
        date_expired,
    })
}

async fn get_token_mysql(pool: &MySqlPool, token: &str) -> Result<Option<Token>> {
    let row = sqlx::query("SELECT id, token, date_expired FROM tokens WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await
        .context("Failed to get token")?;

    Ok(row.map(|row| Token {
        id: row.get("id"),
        token: row.get("token"),
        date_expired: row.get("date_expired"),
    }))
}

async fn delete_expired_tokens_mysql(pool: &MySqlPool) -> Result<i64> {
    let result = sqlx::query("DELETE FROM tokens WHERE date_expired < ?")
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to delete expired tokens")?;

    Ok(result.rows_affected() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup_test_repo() -> SqlxTokenRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxTokenRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get_token() {
        let repo = setup_test_repo().await;

        let created = repo
            .create("abc123", Utc::now() + Duration::hours(1))
            .await
            .expect("Failed to create token");

        let found = repo
            .get_by_token("abc123")
            .await
            .expect("Failed to get token")
            .expect("Token not found");
        assert_eq!(found.id, created.id);
        assert!(!found.is_expired());
        assert!(repo.get_by_token("missing").await.expect("query").is_none());
    }

    #[tokio::test]
    async fn test_delete_expired_tokens() {
        let repo = setup_test_repo().await;
        repo.create("old", Utc::now() - Duration::minutes(5))
            .await
            .expect("Failed to create token");
        repo.create("fresh", Utc::now() + Duration::minutes(5))
            .await
            .expect("Failed to create token");

        let deleted = repo.delete_expired().await.expect("Failed to purge tokens");

        assert_eq!(deleted, 1);
        assert!(repo.get_by_token("old").await.expect("query").is_none());
        assert!(repo.get_by_token("fresh").await.expect("query").is_some());
    }
}
