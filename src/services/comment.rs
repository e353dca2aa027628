//! Comment service
//!
//! Members comment on posts and sales. Anonymous visitors may read but not
//! write, and comments are never edited.

use crate::db::repositories::{CommentRepository, PostRepository, SaleRepository};
use crate::models::{Comment, CommentTarget, CommentWithAuthor, User};
use anyhow::Context;
use std::sync::Arc;

/// Shown on the page when an anonymous visitor submits the comment form
pub const LOGIN_REQUIRED_MESSAGE: &str =
    "You are not logged in. You need to be logged in to be able to comment!";

/// Error types for comment service operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    /// No authenticated member
    #[error("{}", LOGIN_REQUIRED_MESSAGE)]
    LoginRequired,

    /// The post or sale does not exist
    #[error("Comment target not found: {0}")]
    TargetNotFound(CommentTarget),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    post_repo: Arc<dyn PostRepository>,
    sale_repo: Arc<dyn SaleRepository>,
}

impl CommentService {
    pub fn new(
        repo: Arc<dyn CommentRepository>,
        post_repo: Arc<dyn PostRepository>,
        sale_repo: Arc<dyn SaleRepository>,
    ) -> Self {
        Self {
            repo,
            post_repo,
            sale_repo,
        }
    }

    /// Add a comment on behalf of `author`.
    ///
    /// `None` means the visitor is not logged in; nothing is written.
    pub async fn create(
        &self,
        author: Option<&User>,
        target: CommentTarget,
        content: &str,
    ) -> Result<Comment, CommentServiceError> {
        let author = author.ok_or(CommentServiceError::LoginRequired)?;

        let content = content.trim();
        if content.is_empty() {
            return Err(CommentServiceError::ValidationError(
                "Comment cannot be empty".to_string(),
            ));
        }

        if !self.target_exists(target).await? {
            return Err(CommentServiceError::TargetNotFound(target));
        }

        let comment = self
            .repo
            .create(author.id, target, content)
            .await
            .context("Failed to create comment")?;
        tracing::debug!("User {} commented on {}", author.id, target);

        Ok(comment)
    }

    /// Comments on `target`, newest first
    pub async fn list(&self, target: CommentTarget) -> Result<Vec<CommentWithAuthor>, CommentServiceError> {
        let comments = self
            .repo
            .list_for(target)
            .await
            .context("Failed to list comments")?;

        Ok(comments)
    }

    async fn target_exists(&self, target: CommentTarget) -> Result<bool, CommentServiceError> {
        let exists = match target {
            CommentTarget::Post(id) => self
                .post_repo
                .get_by_id(id)
                .await
                .context("Failed to look up post")?
                .is_some(),
            CommentTarget::Sale(id) => self
                .sale_repo
                .get_by_id(id)
                .await
                .context("Failed to look up sale")?
                .is_some(),
        };
        Ok(exists)
    }
}
