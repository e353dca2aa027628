//! Database migrations module
//!
//! Code-based migrations for the forum schema. All migrations are embedded
//! directly in Rust code as SQL strings, with one variant for SQLite and one
//! for MySQL, so the binary carries its own schema.
//!
//! # Usage
//!
//! ```ignore
//! use boardgameforum::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(20) NOT NULL UNIQUE,
                email VARCHAR(120) NOT NULL UNIQUE,
                image_file VARCHAR(64) NOT NULL DEFAULT 'default.jpg',
                password_hash VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                username VARCHAR(20) NOT NULL UNIQUE,
                email VARCHAR(120) NOT NULL UNIQUE,
                image_file VARCHAR(64) NOT NULL DEFAULT 'default.jpg',
                password_hash VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                persistent BOOLEAN NOT NULL DEFAULT 0,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL,
                persistent BOOLEAN NOT NULL DEFAULT FALSE,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_posts",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(100) NOT NULL,
                tag VARCHAR(50) NOT NULL,
                content TEXT NOT NULL,
                date_posted TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                user_id INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_posts_date_posted ON posts(date_posted);
            CREATE INDEX IF NOT EXISTS idx_posts_user_id ON posts(user_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS posts (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(100) NOT NULL,
                tag VARCHAR(50) NOT NULL,
                content TEXT NOT NULL,
                date_posted TIMESTAMP(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
                user_id BIGINT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_posts_date_posted ON posts(date_posted);
            CREATE INDEX idx_posts_user_id ON posts(user_id);
        "#,
    },
    Migration {
        version: 4,
        name: "create_sales",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS sales (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(100) NOT NULL,
                price VARCHAR(50) NOT NULL,
                image_file VARCHAR(64) NOT NULL DEFAULT 'default_item.jpg',
                is_active BOOLEAN NOT NULL DEFAULT 1,
                content TEXT NOT NULL,
                date_posted TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                user_id INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sales_date_posted ON sales(date_posted);
            CREATE INDEX IF NOT EXISTS idx_sales_user_id ON sales(user_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS sales (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(100) NOT NULL,
                price VARCHAR(50) NOT NULL,
                image_file VARCHAR(64) NOT NULL DEFAULT 'default_item.jpg',
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                content TEXT NOT NULL,
                date_posted TIMESTAMP(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
                user_id BIGINT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_sales_date_posted ON sales(date_posted);
            CREATE INDEX idx_sales_user_id ON sales(user_id);
        "#,
    },
    // A comment belongs to exactly one post or exactly one sale.
    Migration {
        version: 5,
        name: "create_comments",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                date_posted TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                user_id INTEGER NOT NULL,
                post_id INTEGER,
                sale_id INTEGER,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
                FOREIGN KEY (sale_id) REFERENCES sales(id) ON DELETE CASCADE,
                CHECK ((post_id IS NULL) <> (sale_id IS NULL))
            );
            CREATE INDEX IF NOT EXISTS idx_comments_post_id ON comments(post_id);
            CREATE INDEX IF NOT EXISTS idx_comments_sale_id ON comments(sale_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS comments (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                content TEXT NOT NULL,
                date_posted TIMESTAMP(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
                user_id BIGINT NOT NULL,
                post_id BIGINT NULL,
                sale_id BIGINT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
                FOREIGN KEY (sale_id) REFERENCES sales(id) ON DELETE CASCADE,
                CONSTRAINT chk_comments_parent CHECK ((post_id IS NULL) <> (sale_id IS NULL))
            );
            CREATE INDEX idx_comments_post_id ON comments(post_id);
            CREATE INDEX idx_comments_sale_id ON comments(sale_id);
        "#,
    },
    Migration {
        version: 6,
        name: "create_tokens",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token VARCHAR(60) NOT NULL,
                date_expired TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tokens_token ON tokens(token);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS tokens (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                token VARCHAR(60) NOT NULL,
                date_expired TIMESTAMP NOT NULL
            );
            CREATE INDEX idx_tokens_token ON tokens(token);
        "#,
    },
];

/// Run all pending migrations
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    match pool.driver() {
        DatabaseDriver::Sqlite => get_applied_migrations_sqlite(pool.sqlite()?).await,
        DatabaseDriver::Mysql => get_applied_migrations_mysql(pool.mysql()?).await,
    }
}

async fn get_applied_migrations_sqlite(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows =
        sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
            .fetch_all(pool)
            .await?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn get_applied_migrations_mysql(pool: &MySqlPool) -> Result<Vec<MigrationRecord>> {
    let rows =
        sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
            .fetch_all(pool)
            .await?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get::<i32, _>("version") as i64,
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match pool.driver() {
        DatabaseDriver::Sqlite => apply_migration_sqlite(pool.sqlite()?, migration).await,
        DatabaseDriver::Mysql => apply_migration_mysql(pool.mysql()?, migration).await,
    }
}

async fn apply_migration_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_sqlite) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

async fn apply_migration_mysql(pool: &MySqlPool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_mysql) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual trimmed statements, dropping comment-only chunks
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn migrated_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        pool
    }

    async fn insert_user(pool: &SqlitePool, username: &str) -> i64 {
        sqlx::query("INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?)")
            .bind(username)
            .bind(format!("{}@example.com", username))
            .bind("hash123")
            .execute(pool)
            .await
            .expect("Failed to create user")
            .last_insert_rowid()
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, MIGRATIONS.len());

        // Running again should apply 0 migrations
        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_user_defaults() {
        let pool = migrated_pool().await;
        let sqlite_pool = pool.sqlite().expect("sqlite pool");
        let id = insert_user(sqlite_pool, "meeple").await;

        let row = sqlx::query("SELECT image_file FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(sqlite_pool)
            .await
            .expect("Failed to read user");
        let image_file: String = row.get("image_file");
        assert_eq!(image_file, "default.jpg");
    }

    #[tokio::test]
    async fn test_sale_defaults_to_active() {
        let pool = migrated_pool().await;
        let sqlite_pool = pool.sqlite().expect("sqlite pool");
        let user_id = insert_user(sqlite_pool, "seller").await;

        let id = sqlx::query("INSERT INTO sales (title, price, content, user_id) VALUES (?, ?, ?, ?)")
            .bind("Catan")
            .bind("20 EUR")
            .bind("Barely played")
            .bind(user_id)
            .execute(sqlite_pool)
            .await
            .expect("Failed to create sale")
            .last_insert_rowid();

        let row = sqlx::query("SELECT is_active, image_file FROM sales WHERE id = ?")
            .bind(id)
            .fetch_one(sqlite_pool)
            .await
            .expect("Failed to read sale");
        let is_active: bool = row.get("is_active");
        let image_file: String = row.get("image_file");
        assert!(is_active);
        assert_eq!(image_file, "default_item.jpg");
    }

    #[tokio::test]
    async fn test_comment_requires_exactly_one_parent() {
        let pool = migrated_pool().await;
        let sqlite_pool = pool.sqlite().expect("sqlite pool");
        let user_id = insert_user(sqlite_pool, "talker").await;

        let post_id = sqlx::query("INSERT INTO posts (title, tag, content, user_id) VALUES (?, ?, ?, ?)")
            .bind("Rules question")
            .bind("rules")
            .bind("How does trading work?")
            .bind(user_id)
            .execute(sqlite_pool)
            .await
            .expect("Failed to create post")
            .last_insert_rowid();
        let sale_id = sqlx::query("INSERT INTO sales (title, price, content, user_id) VALUES (?, ?, ?, ?)")
            .bind("Azul")
            .bind("15")
            .bind("Complete")
            .bind(user_id)
            .execute(sqlite_pool)
            .await
            .expect("Failed to create sale")
            .last_insert_rowid();

        let no_parent = sqlx::query("INSERT INTO comments (content, user_id) VALUES (?, ?)")
            .bind("orphan")
            .bind(user_id)
            .execute(sqlite_pool)
            .await;
        assert!(no_parent.is_err());

        let both_parents = sqlx::query(
            "INSERT INTO comments (content, user_id, post_id, sale_id) VALUES (?, ?, ?, ?)",
        )
        .bind("greedy")
        .bind(user_id)
        .bind(post_id)
        .bind(sale_id)
        .execute(sqlite_pool)
        .await;
        assert!(both_parents.is_err());

        let on_sale = sqlx::query("INSERT INTO comments (content, user_id, sale_id) VALUES (?, ?, ?)")
            .bind("Still available?")
            .bind(user_id)
            .bind(sale_id)
            .execute(sqlite_pool)
            .await;
        assert!(on_sale.is_ok());
    }

    #[tokio::test]
    async fn test_deleting_post_cascades_to_comments() {
        let pool = migrated_pool().await;
        let sqlite_pool = pool.sqlite().expect("sqlite pool");
        let user_id = insert_user(sqlite_pool, "cascade").await;

        let post_id = sqlx::query("INSERT INTO posts (title, tag, content, user_id) VALUES (?, ?, ?, ?)")
            .bind("Title")
            .bind("tag")
            .bind("Content")
            .bind(user_id)
            .execute(sqlite_pool)
            .await
            .expect("Failed to create post")
            .last_insert_rowid();
        sqlx::query("INSERT INTO comments (content, user_id, post_id) VALUES (?, ?, ?)")
            .bind("first")
            .bind(user_id)
            .bind(post_id)
            .execute(sqlite_pool)
            .await
            .expect("Failed to create comment");

        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(post_id)
            .execute(sqlite_pool)
            .await
            .expect("Failed to delete post");

        let row = sqlx::query("SELECT COUNT(*) AS count FROM comments")
            .fetch_one(sqlite_pool)
            .await
            .expect("Failed to count comments");
        let count: i64 = row.get("count");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_foreign_key_constraints() {
        let pool = migrated_pool().await;
        let sqlite_pool = pool.sqlite().expect("sqlite pool");

        let result = sqlx::query(
            "INSERT INTO posts (title, tag, content, user_id) VALUES (?, ?, ?, ?)",
        )
        .bind("Ghost post")
        .bind("misc")
        .bind("Nobody wrote this")
        .bind(999i64)
        .execute(sqlite_pool)
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unique_constraints() {
        let pool = migrated_pool().await;
        let sqlite_pool = pool.sqlite().expect("sqlite pool");
        insert_user(sqlite_pool, "twin").await;

        let result = sqlx::query("INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?)")
            .bind("twin")
            .bind("other@example.com")
            .bind("hash456")
            .execute(sqlite_pool)
            .await;

        assert!(result.is_err());
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT); CREATE TABLE b (id INT);";
        assert_eq!(split_sql_statements(sql), vec!["CREATE TABLE a (id INT)", "CREATE TABLE b (id INT)"]);

        let sql_with_comments = "-- Comment\nCREATE TABLE a (id INT);\n-- trailing";
        assert_eq!(split_sql_statements(sql_with_comments).len(), 1);
    }

    #[test]
    fn test_is_comment_only() {
        assert!(is_comment_only("-- This is a comment"));
        assert!(is_comment_only("-- Line 1\n-- Line 2"));
        assert!(!is_comment_only("CREATE TABLE test"));
        assert!(!is_comment_only("-- Comment\nCREATE TABLE test"));
    }

    #[test]
    fn test_truncate_sql() {
        assert_eq!(truncate_sql("SELECT 1"), "SELECT 1");
        let long = "x".repeat(150);
        assert_eq!(truncate_sql(&long), format!("{}...", "x".repeat(100)));
    }
}
