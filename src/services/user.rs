//! User service
//!
//! Business logic for members:
//! - Registration with unique username and email
//! - Login by email and password, logout
//! - Session validation and expiry
//! - Account updates (username, email, profile picture)

use crate::config::SessionConfig;
use crate::db::is_unique_violation;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, User};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub const USERNAME_TAKEN: &str = "That username is taken. Please choose a different one.";
pub const EMAIL_TAKEN: &str = "That email is taken. Please choose a different one.";

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Username or email already belongs to another member
    #[error("{message}")]
    UserExists { field: &'static str, message: String },

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl UserServiceError {
    fn username_taken() -> Self {
        Self::UserExists {
            field: "username",
            message: USERNAME_TAKEN.to_string(),
        }
    }

    fn email_taken() -> Self {
        Self::UserExists {
            field: "email",
            message: EMAIL_TAKEN.to_string(),
        }
    }
}

/// User service for managing members and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_lifetime: Duration,
    remember_lifetime: Duration,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_lifetime: Duration::hours(config.lifetime_hours),
            remember_lifetime: Duration::days(config.remember_days),
        }
    }

    /// Register a new member.
    ///
    /// Field format is checked by the form layer; this enforces presence and
    /// uniqueness. A UNIQUE violation that slips past the lookups is reported
    /// the same way as a failed lookup.
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();

        if username.is_empty() || email.is_empty() || input.password.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Username, email and password are required".to_string(),
            ));
        }

        self.ensure_available(&username, &email, None).await?;

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = User::new(username, email, password_hash);

        match self.user_repo.create(&user).await {
            Ok(created) => {
                tracing::info!("Registered user {} ({})", created.username, created.id);
                Ok(created)
            }
            Err(e) if is_unique_violation(&e) => Err(self.classify_conflict(&user, None).await?),
            Err(e) => Err(UserServiceError::InternalError(e)),
        }
    }

    /// Check credentials and open a session.
    ///
    /// Unknown email and wrong password fail identically.
    pub async fn login(&self, input: LoginInput) -> Result<Session, UserServiceError> {
        let user = self
            .user_repo
            .get_by_email(input.email.trim())
            .await
            .context("Failed to get user by email")?;

        let user = match user {
            Some(user) => user,
            None => return Err(invalid_credentials()),
        };

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            return Err(invalid_credentials());
        }

        let session = self.create_session(user.id, input.remember).await?;
        tracing::debug!("User {} logged in (persistent: {})", user.id, session.persistent);

        Ok(session)
    }

    /// End a session. Unknown ids are not an error.
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;

        Ok(())
    }

    /// Resolve a session token to its member.
    ///
    /// Expired sessions are deleted and yield `None`.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    /// Change username, email and optionally the profile picture.
    ///
    /// Keeping one's own username or email is not a conflict.
    pub async fn update_account(
        &self,
        user: &User,
        input: UpdateAccountInput,
    ) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();

        if username.is_empty() || email.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Username and email are required".to_string(),
            ));
        }

        self.ensure_available(&username, &email, Some(user.id)).await?;

        let mut updated = user.clone();
        updated.username = username;
        updated.email = email;
        if let Some(image_file) = input.image_file {
            updated.image_file = image_file;
        }

        match self.user_repo.update(&updated).await {
            Ok(saved) => Ok(saved),
            Err(e) if is_unique_violation(&e) => {
                Err(self.classify_conflict(&updated, Some(user.id)).await?)
            }
            Err(e) => Err(UserServiceError::InternalError(e)),
        }
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<i64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;

        Ok(count)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    /// Fail if `username` or `email` belongs to someone other than `exclude_id`
    async fn ensure_available(
        &self,
        username: &str,
        email: &str,
        exclude_id: Option<i64>,
    ) -> Result<(), UserServiceError> {
        let is_other = |found: &Option<User>| match found {
            Some(existing) => Some(existing.id) != exclude_id,
            None => false,
        };

        let by_username = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to check username")?;
        if is_other(&by_username) {
            return Err(UserServiceError::username_taken());
        }

        let by_email = self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to check email")?;
        if is_other(&by_email) {
            return Err(UserServiceError::email_taken());
        }

        Ok(())
    }

    /// Work out which field lost a uniqueness race
    async fn classify_conflict(
        &self,
        user: &User,
        exclude_id: Option<i64>,
    ) -> Result<UserServiceError, UserServiceError> {
        match self.ensure_available(&user.username, &user.email, exclude_id).await {
            Err(conflict @ UserServiceError::UserExists { .. }) => Ok(conflict),
            Err(other) => Err(other),
            Ok(()) => Ok(UserServiceError::username_taken()),
        }
    }

    async fn create_session(&self, user_id: i64, persistent: bool) -> Result<Session, UserServiceError> {
        let now = Utc::now();
        let lifetime = if persistent {
            self.remember_lifetime
        } else {
            self.session_lifetime
        };

        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            persistent,
            expires_at: now + lifetime,
            created_at: now,
        };

        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok(created)
    }
}

fn invalid_credentials() -> UserServiceError {
    UserServiceError::AuthenticationError("Invalid email or password".to_string())
}

/// Input for user registration
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(username: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Input for user login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    /// "Remember me": long-lived persistent session
    pub remember: bool,
}

impl LoginInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            remember: false,
        }
    }

    pub fn remember(mut self, remember: bool) -> Self {
        self.remember = remember;
        self
    }
}

/// Input for the account page
#[derive(Debug, Clone)]
pub struct UpdateAccountInput {
    pub username: String,
    pub email: String,
    /// Newly stored profile picture, if one was uploaded
    pub image_file: Option<String>,
}

impl UpdateAccountInput {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            image_file: None,
        }
    }

    pub fn with_image(mut self, image_file: impl Into<String>) -> Self {
        self.image_file = Some(image_file.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup_test_service() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let service = UserService::new(user_repo, session_repo, &SessionConfig::default());

        (pool, service)
    }

    async fn register(service: &UserService, username: &str, email: &str) -> User {
        service
            .register(RegisterInput::new(username, email, "password123"))
            .await
            .expect("Failed to register")
    }

    // ========================================================================
    // Registration tests
    // ========================================================================

    #[tokio::test]
    async fn test_register_success() {
        let (_pool, service) = setup_test_service().await;

        let user = register(&service, "meeple", "meeple@example.com").await;

        assert!(user.id > 0);
        assert_eq!(user.username, "meeple");
        assert_eq!(user.image_file, "default.jpg");
        assert_ne!(user.password_hash, "password123");
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_duplicate_username_fails() {
        let (_pool, service) = setup_test_service().await;
        register(&service, "meeple", "first@example.com").await;

        let result = service
            .register(RegisterInput::new("meeple", "second@example.com", "password123"))
            .await;

        match result {
            Err(UserServiceError::UserExists { field, message }) => {
                assert_eq!(field, "username");
                assert_eq!(message, USERNAME_TAKEN);
            }
            other => panic!("expected UserExists, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_duplicate_email_fails() {
        let (_pool, service) = setup_test_service().await;
        register(&service, "first", "same@example.com").await;

        let result = service
            .register(RegisterInput::new("second", "same@example.com", "password123"))
            .await;

        assert!(matches!(
            result,
            Err(UserServiceError::UserExists { field: "email", .. })
        ));
    }

    #[tokio::test]
    async fn test_register_empty_password_fails() {
        let (_pool, service) = setup_test_service().await;

        let result = service
            .register(RegisterInput::new("meeple", "meeple@example.com", ""))
            .await;

        assert!(matches!(result, Err(UserServiceError::ValidationError(_))));
    }

    // ========================================================================
    // Login / session tests
    // ========================================================================

    #[tokio::test]
    async fn test_login_success_creates_session() {
        let (_pool, service) = setup_test_service().await;
        let user = register(&service, "meeple", "meeple@example.com").await;

        let session = service
            .login(LoginInput::new("meeple@example.com", "password123"))
            .await
            .expect("Login should succeed");

        assert_eq!(session.user_id, user.id);
        assert!(!session.persistent);
        let validated = service
            .validate_session(&session.id)
            .await
            .expect("validate")
            .expect("session should be valid");
        assert_eq!(validated.id, user.id);
    }

    #[tokio::test]
    async fn test_login_remember_me_is_persistent() {
        let (_pool, service) = setup_test_service().await;
        register(&service, "meeple", "meeple@example.com").await;

        let session = service
            .login(LoginInput::new("meeple@example.com", "password123").remember(true))
            .await
            .expect("Login should succeed");

        assert!(session.persistent);
        assert!(session.remaining_seconds() > Duration::days(29).num_seconds());
    }

    #[tokio::test]
    async fn test_login_wrong_password_fails() {
        let (pool, service) = setup_test_service().await;
        register(&service, "meeple", "meeple@example.com").await;

        let result = service
            .login(LoginInput::new("meeple@example.com", "wrong"))
            .await;

        assert!(matches!(result, Err(UserServiceError::AuthenticationError(_))));

        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
            .fetch_one(pool.sqlite().expect("sqlite pool"))
            .await
            .expect("count sessions");
        assert_eq!(row.0, 0);
    }

    #[tokio::test]
    async fn test_login_unknown_email_fails() {
        let (_pool, service) = setup_test_service().await;

        let result = service
            .login(LoginInput::new("nobody@example.com", "password123"))
            .await;

        assert!(matches!(result, Err(UserServiceError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn test_validate_expired_session_deletes_it() {
        let (pool, service) = setup_test_service().await;
        let user = register(&service, "meeple", "meeple@example.com").await;

        let session_repo = SqlxSessionRepository::new(pool.clone());
        let now = Utc::now();
        let expired = Session {
            id: "expired-token".to_string(),
            user_id: user.id,
            persistent: false,
            expires_at: now - Duration::hours(1),
            created_at: now - Duration::hours(25),
        };
        session_repo.create(&expired).await.expect("create session");

        let result = service.validate_session("expired-token").await.expect("validate");
        assert!(result.is_none());
        assert!(session_repo.get_by_id("expired-token").await.expect("query").is_none());
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let (_pool, service) = setup_test_service().await;
        register(&service, "meeple", "meeple@example.com").await;
        let session = service
            .login(LoginInput::new("meeple@example.com", "password123"))
            .await
            .expect("login");

        service.logout(&session.id).await.expect("logout");

        assert!(service.validate_session(&session.id).await.expect("validate").is_none());
        service.logout("never-existed").await.expect("logout of unknown session");
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let (pool, service) = setup_test_service().await;
        let user = register(&service, "meeple", "meeple@example.com").await;
        let session_repo = SqlxSessionRepository::new(pool.clone());
        let now = Utc::now();
        for (id, offset) in [("a", -2), ("b", -1), ("c", 5)] {
            session_repo
                .create(&Session {
                    id: id.to_string(),
                    user_id: user.id,
                    persistent: false,
                    expires_at: now + Duration::hours(offset),
                    created_at: now,
                })
                .await
                .expect("create session");
        }

        let removed = service.cleanup_expired_sessions().await.expect("cleanup");

        assert_eq!(removed, 2);
    }

    // ========================================================================
    // Account update tests
    // ========================================================================

    #[tokio::test]
    async fn test_update_account_keeps_own_values() {
        let (_pool, service) = setup_test_service().await;
        let user = register(&service, "meeple", "meeple@example.com").await;

        let updated = service
            .update_account(&user, UpdateAccountInput::new("meeple", "meeple@example.com"))
            .await
            .expect("unchanged update should succeed");

        assert_eq!(updated.username, "meeple");
        assert_eq!(updated.image_file, "default.jpg");
    }

    #[tokio::test]
    async fn test_update_account_changes_fields_and_picture() {
        let (_pool, service) = setup_test_service().await;
        let user = register(&service, "meeple", "meeple@example.com").await;

        let updated = service
            .update_account(
                &user,
                UpdateAccountInput::new("dicetower", "dice@example.com").with_image("0123456789abcdef.png"),
            )
            .await
            .expect("update should succeed");

        assert_eq!(updated.username, "dicetower");
        assert_eq!(updated.email, "dice@example.com");
        assert_eq!(updated.image_file, "0123456789abcdef.png");
        assert_eq!(updated.password_hash, user.password_hash);
    }

    #[tokio::test]
    async fn test_update_account_to_taken_username_fails() {
        let (_pool, service) = setup_test_service().await;
        register(&service, "taken", "taken@example.com").await;
        let user = register(&service, "meeple", "meeple@example.com").await;

        let result = service
            .update_account(&user, UpdateAccountInput::new("taken", "meeple@example.com"))
            .await;

        assert!(matches!(
            result,
            Err(UserServiceError::UserExists { field: "username", .. })
        ));
    }
}
