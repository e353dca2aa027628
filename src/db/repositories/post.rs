//! Post repository
//!
//! Database operations for forum posts.
//!
//! This module provides:
//! - `PostRepository` trait defining the interface for post data access
//! - `SqlxPostRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CreatePostInput, Post, PostSummary, UpdatePostInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Create a new post owned by `user_id`
    async fn create(&self, user_id: i64, input: &CreatePostInput) -> Result<Post>;

    /// Get post by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Get post by ID together with author and comment count
    async fn get_summary(&self, id: i64) -> Result<Option<PostSummary>>;

    /// List every post, newest first
    async fn list_summaries(&self) -> Result<Vec<PostSummary>>;

    /// Replace title, tag and content
    async fn update(&self, id: i64, input: &UpdatePostInput) -> Result<Post>;

    /// Delete a post (comments cascade)
    async fn delete(&self, id: i64) -> Result<()>;

    /// Distinct tags in use, alphabetical
    async fn list_tags(&self) -> Result<Vec<String>>;
}

/// SQLx-based post repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    /// Create a new SQLx post repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, user_id: i64, input: &CreatePostInput) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(self.pool.sqlite()?, user_id, input).await,
            DatabaseDriver::Mysql => create_post_mysql(self.pool.mysql()?, user_id, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_post_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_post_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_summary(&self, id: i64) -> Result<Option<PostSummary>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_post_summary_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_post_summary_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list_summaries(&self) -> Result<Vec<PostSummary>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_post_summaries_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_post_summaries_mysql(self.pool.mysql()?).await,
        }
    }

    async fn update(&self, id: i64, input: &UpdatePostInput) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_post_sqlite(self.pool.sqlite()?, id, input).await,
            DatabaseDriver::Mysql => update_post_mysql(self.pool.mysql()?, id, input).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_post_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_post_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list_tags(&self) -> Result<Vec<String>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_tags_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_tags_mysql(self.pool.mysql()?).await,
        }
    }
}

const SUMMARY_SELECT: &str = r#"
    SELECT p.id, p.title, p.tag, p.content, p.date_posted, p.user_id,
           u.username AS author, u.image_file AS author_image,
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count
    FROM posts p
    INNER JOIN users u ON p.user_id = u.id
"#;

const TAGS_SELECT: &str = "SELECT DISTINCT tag FROM posts ORDER BY tag ASC";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, user_id: i64, input: &CreatePostInput) -> Result<Post> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, tag, content, date_posted, user_id)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(&input.tag)
    .bind(&input.content)
    .bind(now)
    .bind(user_id)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_rowid(),
        title: input.title.clone(),
        tag: input.tag.clone(),
        content: input.content.clone(),
        date_posted: now,
        user_id,
    })
}

async fn get_post_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, tag, content, date_posted, user_id
        FROM posts
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get post by ID")?;

    Ok(row.map(|row| row_to_post_sqlite(&row)))
}

async fn get_post_summary_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<PostSummary>> {
    let sql = format!("{} WHERE p.id = ?", SUMMARY_SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post summary")?;

    Ok(row.map(|row| row_to_summary_sqlite(&row)))
}

async fn list_post_summaries_sqlite(pool: &SqlitePool) -> Result<Vec<PostSummary>> {
    let sql = format!("{} ORDER BY p.date_posted DESC, p.id DESC", SUMMARY_SELECT);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    Ok(rows.iter().map(row_to_summary_sqlite).collect())
}

async fn update_post_sqlite(pool: &SqlitePool, id: i64, input: &UpdatePostInput) -> Result<Post> {
    sqlx::query("UPDATE posts SET title = ?, tag = ?, content = ? WHERE id = ?")
        .bind(&input.title)
        .bind(&input.tag)
        .bind(&input.content)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update post")?;

    get_post_by_id_sqlite(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found after update"))
}

async fn delete_post_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete post")?;

    Ok(())
}

async fn list_tags_sqlite(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows = sqlx::query(TAGS_SELECT)
        .fetch_all(pool)
        .await
        .context("Failed to list tags")?;

    Ok(rows.iter().map(|row| row.get("tag")).collect())
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        title: row.get("title"),
        tag: row.get("tag"),
        content: row.get("content"),
        date_posted: row.get("date_posted"),
        user_id: row.get("user_id"),
    }
}

fn row_to_summary_sqlite(row: &sqlx::sqlite::SqliteRow) -> PostSummary {
    PostSummary {
        post: row_to_post_sqlite(row),
        author: row.get("author"),
        author_image: row.get("author_image"),
        comment_count: row.get("comment_count"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, user_id: i64, input: &CreatePostInput) -> Result<Post> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, tag, content, date_posted, user_id)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(&input.tag)
    .bind(&input.content)
    .bind(now)
    .bind(user_id)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_id() as i64,
        title: input.title.clone(),
        tag: input.tag.clone(),
        content: input.content.clone(),
        date_posted: now,
        user_id,
    })
}

async fn get_post_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, tag, content, date_posted, user_id
        FROM posts
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get post by ID")?;

    Ok(row.map(|row| row_to_post_mysql(&row)))
}

async fn get_post_summary_mysql(pool: &MySqlPool, id: i64) -> Result<Option<PostSummary>> {
    let sql = format!("{} WHERE p.id = ?", SUMMARY_SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post summary")?;

    Ok(row.map(|row| row_to_summary_mysql(&row)))
}

async fn list_post_summaries_mysql(pool: &MySqlPool) -> Result<Vec<PostSummary>> {
    let sql = format!("{} ORDER BY p.date_posted DESC, p.id DESC", SUMMARY_SELECT);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    Ok(rows.iter().map(row_to_summary_mysql).collect())
}

async fn update_post_mysql(pool: &MySqlPool, id: i64, input: &UpdatePostInput) -> Result<Post> {
    sqlx::query("UPDATE posts SET title = ?, tag = ?, content = ? WHERE id = ?")
        .bind(&input.title)
        .bind(&input.tag)
        .bind(&input.content)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update post")?;

    get_post_by_id_mysql(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found after update"))
}

async fn delete_post_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete post")?;

    Ok(())
}

async fn list_tags_mysql(pool: &MySqlPool) -> Result<Vec<String>> {
    let rows = sqlx::query(TAGS_SELECT)
        .fetch_all(pool)
        .await
        .context("Failed to list tags")?;

    Ok(rows.iter().map(|row| row.get("tag")).collect())
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Post {
    Post {
        id: row.get("id"),
        title: row.get("title"),
        tag: row.get("tag"),
        content: row.get("content"),
        date_posted: row.get("date_posted"),
        user_id: row.get("user_id"),
    }
}

fn row_to_summary_mysql(row: &sqlx::mysql::MySqlRow) -> PostSummary {
    PostSummary {
        post: row_to_post_mysql(row),
        author: row.get("author"),
        author_image: row.get("author_image"),
        comment_count: row.get("comment_count"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxPostRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxPostRepository::new(pool.clone());
        (pool, repo)
    }

    async fn create_test_user(pool: &DynDatabasePool, id: i64) {
        sqlx::query("INSERT INTO users (id, username, email, password_hash) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(format!("user{}", id))
            .bind(format!("user{}@example.com", id))
            .bind("hash")
            .execute(pool.sqlite().expect("sqlite pool"))
            .await
            .expect("Failed to create test user");
    }

    async fn add_comment(pool: &DynDatabasePool, post_id: i64, user_id: i64) {
        sqlx::query("INSERT INTO comments (content, user_id, post_id) VALUES (?, ?, ?)")
            .bind("nice")
            .bind(user_id)
            .bind(post_id)
            .execute(pool.sqlite().expect("sqlite pool"))
            .await
            .expect("Failed to add comment");
    }

    #[tokio::test]
    async fn test_create_and_get_post() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;

        let created = repo
            .create(1, &CreatePostInput::new("Gloomhaven", "campaign", "Worth it?"))
            .await
            .expect("Failed to create post");
        assert!(created.id > 0);

        let found = repo
            .get_by_id(created.id)
            .await
            .expect("Failed to get post")
            .expect("Post not found");
        assert_eq!(found.title, "Gloomhaven");
        assert_eq!(found.tag, "campaign");
        assert_eq!(found.user_id, 1);
    }

    #[tokio::test]
    async fn test_summary_includes_author_and_comment_count() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;
        create_test_user(&pool, 2).await;

        let post = repo
            .create(1, &CreatePostInput::new("Azul", "abstract", "Tiles!"))
            .await
            .expect("Failed to create post");
        add_comment(&pool, post.id, 2).await;
        add_comment(&pool, post.id, 1).await;

        let summary = repo
            .get_summary(post.id)
            .await
            .expect("Failed to get summary")
            .expect("Post not found");
        assert_eq!(summary.author, "user1");
        assert_eq!(summary.author_image, "default.jpg");
        assert_eq!(summary.comment_count, 2);
        assert!(repo.get_summary(999).await.expect("query").is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;

        for title in ["first", "second", "third"] {
            repo.create(1, &CreatePostInput::new(title, "misc", "body"))
                .await
                .expect("Failed to create post");
        }

        let titles: Vec<String> = repo
            .list_summaries()
            .await
            .expect("Failed to list posts")
            .into_iter()
            .map(|s| s.post.title)
            .collect();
        assert_eq!(titles, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_update_post() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;
        let post = repo
            .create(1, &CreatePostInput::new("Old", "old-tag", "old body"))
            .await
            .expect("Failed to create post");

        let updated = repo
            .update(post.id, &UpdatePostInput::new("New", "new-tag", "new body"))
            .await
            .expect("Failed to update post");

        assert_eq!(updated.title, "New");
        assert_eq!(updated.tag, "new-tag");
        assert_eq!(updated.content, "new body");
        assert_eq!(updated.date_posted, post.date_posted);
    }

    #[tokio::test]
    async fn test_delete_post_cascades_comments() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;
        let post = repo
            .create(1, &CreatePostInput::new("Doomed", "misc", "bye"))
            .await
            .expect("Failed to create post");
        add_comment(&pool, post.id, 1).await;

        repo.delete(post.id).await.expect("Failed to delete post");

        assert!(repo.get_by_id(post.id).await.expect("query").is_none());
        let row = sqlx::query("SELECT COUNT(*) as count FROM comments")
            .fetch_one(pool.sqlite().expect("sqlite pool"))
            .await
            .expect("count comments");
        let remaining: i64 = row.get("count");
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_list_tags_distinct_sorted() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;

        for tag in ["strategy", "party", "strategy", "abstract"] {
            repo.create(1, &CreatePostInput::new("t", tag, "c"))
                .await
                .expect("Failed to create post");
        }

        let tags = repo.list_tags().await.expect("Failed to list tags");
        assert_eq!(tags, vec!["abstract", "party", "strategy"]);
    }
}
