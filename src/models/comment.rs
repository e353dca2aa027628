//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a comment is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum CommentTarget {
    Post(i64),
    Sale(i64),
}

impl CommentTarget {
    /// Page that shows the target and its comments
    pub fn url(&self) -> String {
        match self {
            Self::Post(id) => format!("/post/{}", id),
            Self::Sale(id) => format!("/sale/{}", id),
        }
    }

    pub(crate) fn post_id(&self) -> Option<i64> {
        match self {
            Self::Post(id) => Some(*id),
            Self::Sale(_) => None,
        }
    }

    pub(crate) fn sale_id(&self) -> Option<i64> {
        match self {
            Self::Sale(id) => Some(*id),
            Self::Post(_) => None,
        }
    }
}

impl std::fmt::Display for CommentTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Post(id) => write!(f, "post {}", id),
            Self::Sale(id) => write!(f, "sale {}", id),
        }
    }
}

/// Comment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub date_posted: DateTime<Utc>,
    pub user_id: i64,
    pub target: CommentTarget,
}

/// Comment with its author, for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: String,
    pub author_image: String,
}

/// Resolve the two nullable parent columns into a target.
///
/// Rows violating the one-parent rule cannot be written, so `None` here means
/// the row was tampered with outside the application.
pub(crate) fn target_from_columns(post_id: Option<i64>, sale_id: Option<i64>) -> Option<CommentTarget> {
    match (post_id, sale_id) {
        (Some(id), None) => Some(CommentTarget::Post(id)),
        (None, Some(id)) => Some(CommentTarget::Sale(id)),
        _ => None,
    }
}
