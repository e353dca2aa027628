//! Database connection pool abstraction
//!
//! A unified handle over SQLite and MySQL pools. Repositories ask the handle
//! for the concrete pool of the configured driver and run their queries on it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqlitePool, SqlitePoolOptions},
};
use std::path::Path;
use std::sync::Arc;

use crate::config::{DatabaseConfig, DatabaseDriver};

const SQLITE_MEMORY_URL: &str = "sqlite::memory:";

/// Driver-agnostic pool handle shared by all repositories
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Run a statement that returns no rows; used by migrations
    async fn execute(&self, query: &str) -> Result<u64>;

    fn driver(&self) -> DatabaseDriver;

    fn as_sqlite(&self) -> Option<&SqlitePool>;

    fn as_mysql(&self) -> Option<&MySqlPool>;

    /// The SQLite pool, or an error when the driver is something else
    fn sqlite(&self) -> Result<&SqlitePool> {
        self.as_sqlite().context("Database driver is not SQLite")
    }

    /// The MySQL pool, or an error when the driver is something else
    fn mysql(&self) -> Result<&MySqlPool> {
        self.as_mysql().context("Database driver is not MySQL")
    }
}

/// SQLite pool with foreign keys enforced, so deleting a post drops its comments
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let connection_url = sqlite_connection_url(url);
        if connection_url != SQLITE_MEMORY_URL {
            ensure_parent_dir(url)?;
        }

        // Every in-memory connection is its own database
        let max_connections = if connection_url == SQLITE_MEMORY_URL { 1 } else { 20 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON").execute(conn).await?;
                    Ok(())
                })
            })
            .connect(&connection_url)
            .await
            .with_context(|| format!("Failed to connect to SQLite database: {}", url))?;

        Ok(Self { pool })
    }
}

/// Turn a configured location into a sqlx URL that creates the file if needed
fn sqlite_connection_url(url: &str) -> String {
    match url {
        ":memory:" | SQLITE_MEMORY_URL => SQLITE_MEMORY_URL.to_string(),
        _ if url.starts_with("sqlite:") && url.contains('?') => url.to_string(),
        _ if url.starts_with("sqlite:") => format!("{}?mode=rwc", url),
        _ => format!("sqlite:{}?mode=rwc", url),
    }
}

/// `data/forum.db` needs `data/` before SQLite can create the file
fn ensure_parent_dir(url: &str) -> Result<()> {
    let path = url.trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory: {:?}", parent)),
        _ => Ok(()),
    }
}

#[async_trait]
impl DatabasePool for SqliteDatabase {
    async fn execute(&self, query: &str) -> Result<u64> {
        let result = sqlx::query(query)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to execute query: {}", query))?;
        Ok(result.rows_affected())
    }

    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Sqlite
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        Some(&self.pool)
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        None
    }
}

pub struct MysqlDatabase {
    pool: MySqlPool,
}

impl MysqlDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let connection_url = if url.starts_with("mysql://") {
            url.to_string()
        } else {
            format!("mysql://{}", url)
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(30)
            .connect(&connection_url)
            .await
            .with_context(|| format!("Failed to connect to MySQL database: {}", url))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabasePool for MysqlDatabase {
    async fn execute(&self, query: &str) -> Result<u64> {
        let result = sqlx::query(query)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to execute query: {}", query))?;
        Ok(result.rows_affected())
    }

    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Mysql
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        None
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        Some(&self.pool)
    }
}

pub type DynDatabasePool = Arc<dyn DatabasePool>;

/// Connect with the driver named in `database.driver`
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    Ok(match config.driver {
        DatabaseDriver::Sqlite => Arc::new(SqliteDatabase::new(&config.url).await?),
        DatabaseDriver::Mysql => Arc::new(MysqlDatabase::new(&config.url).await?),
    })
}

/// In-memory SQLite pool for tests
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    create_pool(&DatabaseConfig {
        driver: DatabaseDriver::Sqlite,
        url: ":memory:".to_string(),
    })
    .await
}

/// Whether an error chain contains a UNIQUE constraint violation.
///
/// Used to turn an insert that lost a race against the form check into the
/// same "already taken" answer the check would have given.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| match cause.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn foreign_keys_enabled(pool: &DynDatabasePool) -> bool {
        let (enabled,): (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(pool.sqlite().expect("sqlite pool"))
            .await
            .expect("Failed to read pragma");
        enabled == 1
    }

    #[test]
    fn test_sqlite_connection_url() {
        assert_eq!(sqlite_connection_url(":memory:"), "sqlite::memory:");
        assert_eq!(sqlite_connection_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(sqlite_connection_url("data/forum.db"), "sqlite:data/forum.db?mode=rwc");
        assert_eq!(sqlite_connection_url("sqlite:forum.db"), "sqlite:forum.db?mode=rwc");
        assert_eq!(sqlite_connection_url("sqlite:forum.db?mode=ro"), "sqlite:forum.db?mode=ro");
    }

    #[tokio::test]
    async fn test_test_pool_is_sqlite() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        assert_eq!(pool.driver(), DatabaseDriver::Sqlite);
        assert!(pool.sqlite().is_ok());
        assert!(pool.mysql().is_err());
        assert!(foreign_keys_enabled(&pool).await);
    }

    #[tokio::test]
    async fn test_file_pool_creates_missing_directories() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("data").join("forum.db");

        let pool = create_pool(&DatabaseConfig {
            driver: DatabaseDriver::Sqlite,
            url: db_path.to_string_lossy().to_string(),
        })
        .await
        .expect("Failed to create pool");

        assert!(db_path.exists());
        assert!(foreign_keys_enabled(&pool).await);
    }

    #[tokio::test]
    async fn test_foreign_key_violation_rejected() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        pool.execute("CREATE TABLE games (id INTEGER PRIMARY KEY)")
            .await
            .expect("Failed to create table");
        pool.execute("CREATE TABLE reviews (game_id INTEGER NOT NULL REFERENCES games(id))")
            .await
            .expect("Failed to create table");

        let orphan = pool.execute("INSERT INTO reviews (game_id) VALUES (7)").await;

        assert!(orphan.is_err());
    }

    #[tokio::test]
    async fn test_unique_violation_detected() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        pool.execute("CREATE TABLE t (name TEXT NOT NULL UNIQUE)")
            .await
            .expect("Failed to create table");
        pool.execute("INSERT INTO t (name) VALUES ('catan')")
            .await
            .expect("Failed to insert");

        let err = pool
            .execute("INSERT INTO t (name) VALUES ('catan')")
            .await
            .expect_err("Duplicate insert should fail");
        assert!(is_unique_violation(&err));

        assert!(!is_unique_violation(&anyhow::anyhow!("something else")));
    }

    #[tokio::test]
    #[ignore = "Requires MySQL server"]
    async fn test_mysql_pool_creation() {
        let url = std::env::var("MYSQL_TEST_URL")
            .unwrap_or_else(|_| "mysql://root@localhost/test".to_string());

        let pool = create_pool(&DatabaseConfig {
            driver: DatabaseDriver::Mysql,
            url,
        })
        .await
        .expect("Failed to create pool");

        assert_eq!(pool.driver(), DatabaseDriver::Mysql);
        assert!(pool.mysql().is_ok());
    }
}
