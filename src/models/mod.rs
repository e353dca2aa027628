//! Data models
//!
//! Database entities (User, Session, Post, Sale, Comment, Token) and the
//! input/listing types built around them.

mod comment;
mod post;
mod sale;
mod session;
mod token;
mod user;

pub(crate) use comment::target_from_columns;
pub use comment::{Comment, CommentTarget, CommentWithAuthor};
pub use post::{CreatePostInput, Post, PostSummary, UpdatePostInput};
pub use sale::{CreateSaleInput, Sale, SaleSummary, DEFAULT_ITEM_IMAGE};
pub use session::Session;
pub use token::Token;
pub use user::{User, DEFAULT_PROFILE_IMAGE};
