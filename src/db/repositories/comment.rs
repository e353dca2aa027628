//! Comment repository
//!
//! Comments hang off either a post or a sale; the target decides which
//! parent column is written and filtered on.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{target_from_columns, Comment, CommentTarget, CommentWithAuthor};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Store a comment by `user_id` on `target`
    async fn create(&self, user_id: i64, target: CommentTarget, content: &str) -> Result<Comment>;

    /// Comments on `target` with their authors, newest first
    async fn list_for(&self, target: CommentTarget) -> Result<Vec<CommentWithAuthor>>;

    /// Number of comments on `target`
    async fn count_for(&self, target: CommentTarget) -> Result<i64>;
}

pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, user_id: i64, target: CommentTarget, content: &str) -> Result<Comment> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_comment_sqlite(self.pool.sqlite()?, user_id, target, content).await
            }
            DatabaseDriver::Mysql => {
                create_comment_mysql(self.pool.mysql()?, user_id, target, content).await
            }
        }
    }

    async fn list_for(&self, target: CommentTarget) -> Result<Vec<CommentWithAuthor>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_comments_sqlite(self.pool.sqlite()?, target).await,
            DatabaseDriver::Mysql => list_comments_mysql(self.pool.mysql()?, target).await,
        }
    }

    async fn count_for(&self, target: CommentTarget) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_comments_sqlite(self.pool.sqlite()?, target).await,
            DatabaseDriver::Mysql => count_comments_mysql(self.pool.mysql()?, target).await,
        }
    }
}

/// Parent column and id used to filter on `target`
fn parent_filter(target: CommentTarget) -> (&'static str, i64) {
    match target {
        CommentTarget::Post(id) => ("post_id", id),
        CommentTarget::Sale(id) => ("sale_id", id),
    }
}

fn list_sql(target: CommentTarget) -> String {
    let (column, _) = parent_filter(target);
    format!(
        r#"
        SELECT c.id, c.content, c.date_posted, c.user_id, c.post_id, c.sale_id,
               u.username AS author, u.image_file AS author_image
        FROM comments c
        INNER JOIN users u ON c.user_id = u.id
        WHERE c.{} = ?
        ORDER BY c.date_posted DESC, c.id DESC
        "#,
        column
    )
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_comment_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    target: CommentTarget,
    content: &str,
) -> Result<Comment> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO comments (content, date_posted, user_id, post_id, sale_id)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(content)
    .bind(now)
    .bind(user_id)
    .bind(target.post_id())
    .bind(target.sale_id())
    .execute(pool)
    .await
    .with_context(|| format!("Failed to create comment on {}", target))?;

    Ok(Comment {
        id: result.last_insert_rowid(),
        content: content.to_string(),
        date_posted: now,
        user_id,
        target,
    })
}

async fn list_comments_sqlite(pool: &SqlitePool, target: CommentTarget) -> Result<Vec<CommentWithAuthor>> {
    let (_, parent_id) = parent_filter(target);
    let rows = sqlx::query(&list_sql(target))
        .bind(parent_id)
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to list comments on {}", target))?;

    rows.iter().map(row_to_comment_sqlite).collect()
}

async fn count_comments_sqlite(pool: &SqlitePool, target: CommentTarget) -> Result<i64> {
    let (column, parent_id) = parent_filter(target);
    let sql = format!("SELECT COUNT(*) as count FROM comments WHERE {} = ?", column);
    let row = sqlx::query(&sql)
        .bind(parent_id)
        .fetch_one(pool)
        .await
        .context("Failed to count comments")?;

    Ok(row.get("count"))
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<CommentWithAuthor> {
    let id: i64 = row.get("id");
    let target = target_from_columns(row.get("post_id"), row.get("sale_id"))
        .ok_or_else(|| anyhow::anyhow!("Comment {} has no single parent", id))?;

    Ok(CommentWithAuthor {
        comment: Comment {
            id,
            content: row.get("content"),
            date_posted: row.get("date_posted"),
            user_id: row.get("user_id"),
            target,
        },
        author: row.get("author"),
        author_image: row.get("author_image"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_comment_mysql(
    pool: &MySqlPool,
    user_id: i64,
    target: CommentTarget,
    content: &str,
) -> Result<Comment> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO comments (content, date_posted, user_id, post_id, sale_id)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(content)
    .bind(now)
    .bind(user_id)
    .bind(target.post_id())
    .bind(target.sale_id())
    .execute(pool)
    .await
    .with_context(|| format!("Failed to create comment on {}", target))?;

    Ok(Comment {
        id: result.last_insert_id() as i64,
        content: content.to_string(),
        date_posted: now,
        user_id,
        target,
    })
}

async fn list_comments_mysql(pool: &MySqlPool, target: CommentTarget) -> Result<Vec<CommentWithAuthor>> {
    let (_, parent_id) = parent_filter(target);
    let rows = sqlx::query(&list_sql(target))
        .bind(parent_id)
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to list comments on {}", target))?;

    rows.iter().map(row_to_comment_mysql).collect()
}

async fn count_comments_mysql(pool: &MySqlPool, target: CommentTarget) -> Result<i64> {
    let (column, parent_id) = parent_filter(target);
    let sql = format!("SELECT COUNT(*) as count FROM comments WHERE {} = ?", column);
    let row = sqlx::query(&sql)
        .bind(parent_id)
        .fetch_one(pool)
        .await
        .context("Failed to count comments")?;

    Ok(row.get("count"))
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Result<CommentWithAuthor> {
    let id: i64 = row.get("id");
    let target = target_from_columns(row.get("post_id"), row.get("sale_id"))
        .ok_or_else(|| anyhow::anyhow!("Comment {} has no single parent", id))?;

    Ok(CommentWithAuthor {
        comment: Comment {
            id,
            content: row.get("content"),
            date_posted: row.get("date_posted"),
            user_id: row.get("user_id"),
            target,
        },
        author: row.get("author"),
        author_image: row.get("author_image"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    /// Seeds two users, one post (id 1) and one sale (id 1)
    async fn setup_test_repo() -> (DynDatabasePool, SqlxCommentRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let sqlite = pool.sqlite().expect("sqlite pool");
        for id in [1_i64, 2] {
            sqlx::query("INSERT INTO users (id, username, email, password_hash) VALUES (?, ?, ?, ?)")
                .bind(id)
                .bind(format!("member{}", id))
                .bind(format!("member{}@example.com", id))
                .bind("hash")
                .execute(sqlite)
                .await
                .expect("Failed to create test user");
        }
        sqlx::query("INSERT INTO posts (id, title, tag, content, user_id) VALUES (1, 't', 'misc', 'c', 1)")
            .execute(sqlite)
            .await
            .expect("Failed to create post");
        sqlx::query("INSERT INTO sales (id, title, price, content, user_id) VALUES (1, 't', '5', 'c', 1)")
            .execute(sqlite)
            .await
            .expect("Failed to create sale");

        let repo = SqlxCommentRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_create_comment_on_post() {
        let (_pool, repo) = setup_test_repo().await;

        let comment = repo
            .create(2, CommentTarget::Post(1), "Great thread")
            .await
            .expect("Failed to create comment");

        assert!(comment.id > 0);
        assert_eq!(comment.target, CommentTarget::Post(1));
        assert_eq!(repo.count_for(CommentTarget::Post(1)).await.expect("count"), 1);
        assert_eq!(repo.count_for(CommentTarget::Sale(1)).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn test_list_for_target_newest_first() {
        let (_pool, repo) = setup_test_repo().await;

        repo.create(1, CommentTarget::Sale(1), "Is it still available?")
            .await
            .expect("Failed to create comment");
        repo.create(2, CommentTarget::Sale(1), "Yes")
            .await
            .expect("Failed to create comment");
        repo.create(2, CommentTarget::Post(1), "Unrelated")
            .await
            .expect("Failed to create comment");

        let comments = repo
            .list_for(CommentTarget::Sale(1))
            .await
            .expect("Failed to list comments");

        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].comment.content, "Yes");
        assert_eq!(comments[0].author, "member2");
        assert_eq!(comments[1].comment.content, "Is it still available?");
        assert!(comments.iter().all(|c| c.comment.target == CommentTarget::Sale(1)));
    }

    #[tokio::test]
    async fn test_comment_on_missing_parent_rejected() {
        let (_pool, repo) = setup_test_repo().await;

        let result = repo.create(1, CommentTarget::Post(404), "ghost").await;

        assert!(result.is_err());
    }
}
