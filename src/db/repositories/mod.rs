//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for a single entity.

pub mod comment;
pub mod post;
pub mod sale;
pub mod session;
pub mod token;
pub mod user;

pub use comment::{CommentRepository, SqlxCommentRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use sale::{SaleRepository, SqlxSaleRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use token::{SqlxTokenRepository, TokenRepository};
pub use user::{SqlxUserRepository, UserRepository};
