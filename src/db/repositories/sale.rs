//! Sale repository
//!
//! Database operations for marketplace listings.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CreateSaleInput, Sale, SaleSummary, DEFAULT_ITEM_IMAGE};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Sale repository trait
#[async_trait]
pub trait SaleRepository: Send + Sync {
    /// Create a new listing owned by `user_id`
    async fn create(&self, user_id: i64, input: &CreateSaleInput) -> Result<Sale>;

    /// Get sale by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Sale>>;

    /// Get sale by ID together with seller and comment count
    async fn get_summary(&self, id: i64) -> Result<Option<SaleSummary>>;

    /// List every sale, newest first
    async fn list_summaries(&self) -> Result<Vec<SaleSummary>>;

    /// Set the active flag
    async fn set_active(&self, id: i64, active: bool) -> Result<()>;
}

/// SQLx-based sale repository implementation
pub struct SqlxSaleRepository {
    pool: DynDatabasePool,
}

impl SqlxSaleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SaleRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SaleRepository for SqlxSaleRepository {
    async fn create(&self, user_id: i64, input: &CreateSaleInput) -> Result<Sale> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sale_sqlite(self.pool.sqlite()?, user_id, input).await,
            DatabaseDriver::Mysql => create_sale_mysql(self.pool.mysql()?, user_id, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Sale>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_sale_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_sale_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_summary(&self, id: i64) -> Result<Option<SaleSummary>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_sale_summary_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_sale_summary_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list_summaries(&self) -> Result<Vec<SaleSummary>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sale_summaries_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_sale_summaries_mysql(self.pool.mysql()?).await,
        }
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => set_sale_active_sqlite(self.pool.sqlite()?, id, active).await,
            DatabaseDriver::Mysql => set_sale_active_mysql(self.pool.mysql()?, id, active).await,
        }
    }
}

const SALE_COLUMNS: &str = "id, title, price, image_file, is_active, content, date_posted, user_id";

const SUMMARY_SELECT: &str = r#"
    SELECT s.id, s.title, s.price, s.image_file, s.is_active, s.content, s.date_posted, s.user_id,
           u.username AS author, u.image_file AS author_image,
           (SELECT COUNT(*) FROM comments c WHERE c.sale_id = s.id) AS comment_count
    FROM sales s
    INNER JOIN users u ON s.user_id = u.id
"#;

fn image_or_default(input: &CreateSaleInput) -> String {
    input
        .image_file
        .clone()
        .unwrap_or_else(|| DEFAULT_ITEM_IMAGE.to_string())
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sale_sqlite(pool: &SqlitePool, user_id: i64, input: &CreateSaleInput) -> Result<Sale> {
    let now = Utc::now();
    let image_file = image_or_default(input);

    let result = sqlx::query(
        r#"
        INSERT INTO sales (title, price, image_file, is_active, content, date_posted, user_id)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(&input.price)
    .bind(&image_file)
    .bind(true)
    .bind(&input.content)
    .bind(now)
    .bind(user_id)
    .execute(pool)
    .await
    .context("Failed to create sale")?;

    Ok(Sale {
        id: result.last_insert_rowid(),
        title: input.title.clone(),
        price: input.price.clone(),
        image_file,
        is_active: true,
        content: input.content.clone(),
        date_posted: now,
        user_id,
    })
}

async fn get_sale_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Sale>> {
    let sql = format!("SELECT {} FROM sales WHERE id = ?", SALE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get sale by ID")?;

    Ok(row.map(|row| row_to_sale_sqlite(&row)))
}

async fn get_sale_summary_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<SaleSummary>> {
    let sql = format!("{} WHERE s.id = ?", SUMMARY_SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get sale summary")?;

    Ok(row.map(|row| row_to_summary_sqlite(&row)))
}

async fn list_sale_summaries_sqlite(pool: &SqlitePool) -> Result<Vec<SaleSummary>> {
    let sql = format!("{} ORDER BY s.date_posted DESC, s.id DESC", SUMMARY_SELECT);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list sales")?;

    Ok(rows.iter().map(row_to_summary_sqlite).collect())
}

async fn set_sale_active_sqlite(pool: &SqlitePool, id: i64, active: bool) -> Result<()> {
    sqlx::query("UPDATE sales SET is_active = ? WHERE id = ?")
        .bind(active)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update sale status")?;

    Ok(())
}

fn row_to_sale_sqlite(row: &sqlx::sqlite::SqliteRow) -> Sale {
    Sale {
        id: row.get("id"),
        title: row.get("title"),
        price: row.get("price"),
        image_file: row.get("image_file"),
        is_active: row.get("is_active"),
        content: row.get("content"),
        date_posted: row.get("date_posted"),
        user_id: row.get("user_id"),
    }
}

fn row_to_summary_sqlite(row: &sqlx::sqlite::SqliteRow) -> SaleSummary {
    SaleSummary {
        sale: row_to_sale_sqlite(row),
        author: row.get("author"),
        author_image: row.get("author_image"),
        comment_count: row.get("comment_count"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_sale_mysql(pool: &MySqlPool, user_id: i64, input: &CreateSaleInput) -> Result<Sale> {
    let now = Utc::now();
    let image_file = image_or_default(input);

    let result = sqlx::query(
        r#"
        INSERT INTO sales (title, price, image_file, is_active, content, date_posted, user_id)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(&input.price)
    .bind(&image_file)
    .bind(true)
    .bind(&input.content)
    .bind(now)
    .bind(user_id)
    .execute(pool)
    .await
    .context("Failed to create sale")?;

    Ok(Sale {
        id: result.last_insert_id() as i64,
        title: input.title.clone(),
        price: input.price.clone(),
        image_file,
        is_active: true,
        content: input.content.clone(),
        date_posted: now,
        user_id,
    })
}

async fn get_sale_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Sale>> {
    let sql = format!("SELECT {} FROM sales WHERE id = ?", SALE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get sale by ID")?;

    Ok(row.map(|row| row_to_sale_mysql(&row)))
}

async fn get_sale_summary_mysql(pool: &MySqlPool, id: i64) -> Result<Option<SaleSummary>> {
    let sql = format!("{} WHERE s.id = ?", SUMMARY_SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get sale summary")?;

    Ok(row.map(|row| row_to_summary_mysql(&row)))
}

async fn list_sale_summaries_mysql(pool: &MySqlPool) -> Result<Vec<SaleSummary>> {
    let sql = format!("{} ORDER BY s.date_posted DESC, s.id DESC", SUMMARY_SELECT);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list sales")?;

    Ok(rows.iter().map(row_to_summary_mysql).collect())
}

async fn set_sale_active_mysql(pool: &MySqlPool, id: i64, active: bool) -> Result<()> {
    sqlx::query("UPDATE sales SET is_active = ? WHERE id = ?")
        .bind(active)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update sale status")?;

    Ok(())
}

fn row_to_sale_mysql(row: &sqlx::mysql::MySqlRow) -> Sale {
    Sale {
        id: row.get("id"),
        title: row.get("title"),
        price: row.get("price"),
        image_file: row.get("image_file"),
        is_active: row.get("is_active"),
        content: row.get("content"),
        date_posted: row.get("date_posted"),
        user_id: row.get("user_id"),
    }
}

fn row_to_summary_mysql(row: &sqlx::mysql::MySqlRow) -> SaleSummary {
    SaleSummary {
        sale: row_to_sale_mysql(row),
        author: row.get("author"),
        author_image: row.get("author_image"),
        comment_count: row.get("comment_count"),
    }
}
