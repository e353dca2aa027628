//! Post service
//!
//! Business logic for discussion posts:
//! - Create, update and delete with author-only checks
//! - Newest-first listing and the "hot posts" ordering
//! - The sidebar tag set

use crate::db::repositories::PostRepository;
use crate::models::{CreatePostInput, Post, PostSummary, UpdatePostInput, User};
use anyhow::Context;
use std::sync::Arc;

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_TAG_LEN: usize = 50;

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Post not found: {0}")]
    NotFound(i64),

    /// Caller is not the author
    #[error("Not allowed to modify post {0}")]
    Forbidden(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct PostService {
    repo: Arc<dyn PostRepository>,
}

impl PostService {
    pub fn new(repo: Arc<dyn PostRepository>) -> Self {
        Self { repo }
    }

    /// Create a post authored by `author`
    pub async fn create(&self, author: &User, input: CreatePostInput) -> Result<Post, PostServiceError> {
        validate_fields(&input.title, &input.tag, &input.content)?;

        let post = self
            .repo
            .create(author.id, &input)
            .await
            .context("Failed to create post")?;
        tracing::info!("User {} created post {}", author.id, post.id);

        Ok(post)
    }

    pub async fn get(&self, id: i64) -> Result<Post, PostServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound(id))
    }

    /// Post with author and comment count, for the post page
    pub async fn get_summary(&self, id: i64) -> Result<PostSummary, PostServiceError> {
        self.repo
            .get_summary(id)
            .await
            .context("Failed to get post summary")?
            .ok_or(PostServiceError::NotFound(id))
    }

    /// Fetch a post the caller is about to edit.
    ///
    /// Missing posts are `NotFound`; someone else's post is `Forbidden`.
    pub async fn get_owned(&self, user: &User, id: i64) -> Result<Post, PostServiceError> {
        let post = self.get(id).await?;
        ensure_author(user, &post)?;
        Ok(post)
    }

    /// All posts, newest first
    pub async fn list(&self) -> Result<Vec<PostSummary>, PostServiceError> {
        let posts = self.repo.list_summaries().await.context("Failed to list posts")?;
        Ok(posts)
    }

    /// Replace title, tag and content of a post loaded with
    /// [`get_owned`](Self::get_owned). Author only.
    pub async fn update(
        &self,
        user: &User,
        post: &Post,
        input: UpdatePostInput,
    ) -> Result<Post, PostServiceError> {
        ensure_author(user, post)?;
        validate_fields(&input.title, &input.tag, &input.content)?;

        let post = self
            .repo
            .update(post.id, &input)
            .await
            .context("Failed to update post")?;

        Ok(post)
    }

    /// Delete a post and its comments. Author only.
    pub async fn delete(&self, user: &User, id: i64) -> Result<(), PostServiceError> {
        self.get_owned(user, id).await?;

        self.repo.delete(id).await.context("Failed to delete post")?;
        tracing::info!("User {} deleted post {}", user.id, id);

        Ok(())
    }

    /// Distinct tags, alphabetical
    pub async fn tags(&self) -> Result<Vec<String>, PostServiceError> {
        let tags = self.repo.list_tags().await.context("Failed to list tags")?;
        Ok(tags)
    }
}

/// Re-sort a newest-first list by comment count, most discussed first.
///
/// The sort is stable, so posts with equal counts stay newest-first.
pub fn hot_posts(posts: &[PostSummary]) -> Vec<PostSummary> {
    let mut hot = posts.to_vec();
    hot.sort_by(|a, b| b.comment_count.cmp(&a.comment_count));
    hot
}

fn ensure_author(user: &User, post: &Post) -> Result<(), PostServiceError> {
    if !user.owns(post.user_id) {
        tracing::warn!("User {} tried to modify post {} owned by {}", user.id, post.id, post.user_id);
        return Err(PostServiceError::Forbidden(post.id));
    }
    Ok(())
}

fn validate_fields(title: &str, tag: &str, content: &str) -> Result<(), PostServiceError> {
    if title.trim().is_empty() || tag.trim().is_empty() || content.trim().is_empty() {
        return Err(PostServiceError::ValidationError(
            "Title, tag and content are required".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(PostServiceError::ValidationError(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    if tag.chars().count() > MAX_TAG_LEN {
        return Err(PostServiceError::ValidationError(format!(
            "Tag must be at most {} characters",
            MAX_TAG_LEN
        )));
    }
    Ok(())
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::db::repositories::{SqlxPostRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use chrono::Utc;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Hot posts are a permutation of the input, ordered by descending
        /// comment count, with ties in input order.
        #[test]
        fn property_hot_posts_order(counts in prop::collection::vec(0i64..5, 0..30)) {
            let posts: Vec<PostSummary> = counts
                .iter()
                .enumerate()
                .map(|(i, &count)| PostSummary {
                    post: Post {
                        id: i as i64,
                        title: String::new(),
                        tag: String::new(),
                        content: String::new(),
                        date_posted: Utc::now(),
                        user_id: 1,
                    },
                    author: String::new(),
                    author_image: String::new(),
                    comment_count: count,
                })
                .collect();

            let hot = hot_posts(&posts);
            prop_assert_eq!(hot.len(), posts.len());
            for pair in hot.windows(2) {
                prop_assert!(pair[0].comment_count >= pair[1].comment_count);
                if pair[0].comment_count == pair[1].comment_count {
                    prop_assert!(pair[0].post.id < pair[1].post.id);
                }
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(10))]

        /// The stored listing is the reverse of creation order.
        #[test]
        fn property_list_newest_first(count in 1usize..8) {
            let (mut created, listed) = tokio_test::block_on(async {
                let pool = create_test_pool().await.expect("Failed to create test pool");
                migrations::run_migrations(&pool).await.expect("Failed to run migrations");
                let author = SqlxUserRepository::new(pool.clone())
                    .create(&User::new("author".into(), "author@example.com".into(), "hash".into()))
                    .await
                    .expect("create author");
                let service = PostService::new(SqlxPostRepository::boxed(pool));

                let mut created = Vec::new();
                for i in 0..count {
                    let post = service
                        .create(&author, CreatePostInput::new(format!("post {}", i), "misc", "c"))
                        .await
                        .expect("create");
                    created.push(post.id);
                }
                let listed: Vec<i64> = service
                    .list()
                    .await
                    .expect("list")
                    .iter()
                    .map(|s| s.post.id)
                    .collect();
                (created, listed)
            });

            created.reverse();
            prop_assert_eq!(listed, created);
        }
    }
}
