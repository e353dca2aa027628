//! User model
//!
//! A registered forum member. Members own posts, sales and comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile picture given to every new account
pub const DEFAULT_PROFILE_IMAGE: &str = "default.jpg";

/// User entity representing a registered member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Profile picture file name under `profile_pics/`
    pub image_file: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with the default profile picture.
    ///
    /// Note: The password should already be hashed before calling this function.
    /// Use `services::password::hash_password()` to hash the password.
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            username,
            email,
            image_file: DEFAULT_PROFILE_IMAGE.to_string(),
            password_hash,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the user owns content created by `owner_id`
    pub fn owns(&self, owner_id: i64) -> bool {
        self.id == owner_id
    }
}
