//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They are
//! responsible for:
//! - Enforcing business rules (uniqueness, ownership, login requirements)
//! - Hashing passwords and storing pictures
//! - Mapping storage failures into per-service error types

pub mod comment;
pub mod image;
pub mod password;
pub mod post;
pub mod sale;
pub mod token;
pub mod user;

pub use comment::{CommentService, CommentServiceError, LOGIN_REQUIRED_MESSAGE};
pub use image::{ImageError, ImageStore, PictureKind};
pub use password::{hash_password, verify_password};
pub use post::{hot_posts, PostService, PostServiceError};
pub use sale::{SaleService, SaleServiceError};
pub use token::TokenService;
pub use user::{LoginInput, RegisterInput, UpdateAccountInput, UserService, UserServiceError};
