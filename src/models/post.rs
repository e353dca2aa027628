//! Post model
//!
//! A discussion thread started by a member and labelled with a free-text tag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub tag: String,
    pub content: String,
    pub date_posted: DateTime<Utc>,
    /// Author
    pub user_id: i64,
}

/// Post joined with its author and comment count, as listed on pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostSummary {
    #[serde(flatten)]
    pub post: Post,
    pub author: String,
    pub author_image: String,
    pub comment_count: i64,
}

/// Input for creating a post
#[derive(Debug, Clone)]
pub struct CreatePostInput {
    pub title: String,
    pub tag: String,
    pub content: String,
}

impl CreatePostInput {
    pub fn new(title: impl Into<String>, tag: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            tag: tag.into(),
            content: content.into(),
        }
    }
}

/// Input for editing a post; every field is replaced
#[derive(Debug, Clone)]
pub struct UpdatePostInput {
    pub title: String,
    pub tag: String,
    pub content: String,
}

impl UpdatePostInput {
    pub fn new(title: impl Into<String>, tag: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            tag: tag.into(),
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_serializes_flat() {
        let summary = PostSummary {
            post: Post {
                id: 7,
                title: "Best co-op games?".to_string(),
                tag: "recommendations".to_string(),
                content: "Looking for ideas".to_string(),
                date_posted: Utc::now(),
                user_id: 3,
            },
            author: "alice".to_string(),
            author_image: "default.jpg".to_string(),
            comment_count: 4,
        };

        let json = serde_json::to_value(&summary).expect("serialize summary");
        assert_eq!(json["id"], 7);
        assert_eq!(json["title"], "Best co-op games?");
        assert_eq!(json["author"], "alice");
        assert_eq!(json["comment_count"], 4);
    }
}
