//! Page rendering and error responses
//!
//! Handlers render through [`Page`], which carries the standard template
//! variables and pending flash messages, and fail with [`PageError`].

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{Html, IntoResponse, Response},
};
use tera::Context as TeraContext;

use crate::api::flash::{clear_flash_cookie, read_flashes, FlashMessage, FLASH_COOKIE};
use crate::api::middleware::{cookie_value, AppState, AuthenticatedUser};
use crate::models::User;
use crate::services::{
    CommentServiceError, ImageError, PostServiceError, SaleServiceError, UserServiceError,
};
use crate::theme::{CurrentUser, StandardTemplateVars};

// ============================================================================
// Errors
// ============================================================================

/// Handler failure, rendered as an HTML error page
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Page not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PageError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let detail = match &self {
            Self::BadRequest(message) => Some(message.clone()),
            Self::Internal(e) => {
                // Logged, never shown
                tracing::error!("Request failed: {:#}", e);
                None
            }
            _ => None,
        };

        let status = self.status();
        let mut response = status.into_response();
        response.extensions_mut().insert(ErrorPage { status, detail });
        response
    }
}

impl From<PostServiceError> for PageError {
    fn from(e: PostServiceError) -> Self {
        match e {
            PostServiceError::NotFound(_) => Self::NotFound,
            PostServiceError::Forbidden(_) => Self::Forbidden,
            PostServiceError::ValidationError(message) => Self::BadRequest(message),
            PostServiceError::InternalError(e) => Self::Internal(e),
        }
    }
}

impl From<SaleServiceError> for PageError {
    fn from(e: SaleServiceError) -> Self {
        match e {
            SaleServiceError::NotFound(_) => Self::NotFound,
            SaleServiceError::Forbidden(_) => Self::Forbidden,
            SaleServiceError::ValidationError(message) => Self::BadRequest(message),
            SaleServiceError::InternalError(e) => Self::Internal(e),
        }
    }
}

impl From<CommentServiceError> for PageError {
    fn from(e: CommentServiceError) -> Self {
        match e {
            CommentServiceError::TargetNotFound(_) => Self::NotFound,
            CommentServiceError::InternalError(e) => Self::Internal(e),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<UserServiceError> for PageError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::InternalError(e) => Self::Internal(e),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<ImageError> for PageError {
    fn from(e: ImageError) -> Self {
        match e {
            ImageError::InternalError(e) => Self::Internal(e),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

/// Marker left on error responses for the error page middleware
#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub status: StatusCode,
    pub detail: Option<String>,
}

impl ErrorPage {
    fn text(&self) -> (&'static str, &'static str) {
        match self.status {
            StatusCode::NOT_FOUND => (
                "Oops. Page Not Found (404)",
                "That page does not exist. Please try a different location",
            ),
            StatusCode::FORBIDDEN => (
                "You don't have permission to do that (403)",
                "Please check your account and try again",
            ),
            StatusCode::BAD_REQUEST => ("Bad Request (400)", "The submitted request was not valid"),
            _ => (
                "Something went wrong (500)",
                "We're experiencing some trouble on our end. Please try again in the near future",
            ),
        }
    }

    /// Render `error.html`, falling back to plain text if that fails too
    pub async fn render(self, state: &AppState, path: &str, user: Option<&User>) -> Response {
        let (heading, message) = self.text();

        let mut context = TeraContext::new();
        context.insert("title", heading);
        context.insert("status", &self.status.as_u16());
        context.insert("heading", heading);
        context.insert("message", self.detail.as_deref().unwrap_or(message));

        // Tags come from the database, which may be what failed
        let vars = match state.standard_vars(path, user).await {
            Ok(vars) => vars,
            Err(e) => {
                tracing::warn!("Error page without sidebar: {}", e);
                let vars = StandardTemplateVars::new(&state.site.name, &state.site.description, path);
                match user {
                    Some(user) => vars.with_user(CurrentUser::from_user(user)),
                    None => vars,
                }
            }
        };

        match state
            .theme_engine
            .render_with_standard_vars("error.html", &context, &vars)
        {
            Ok(html) => (self.status, Html(html)).into_response(),
            Err(e) => {
                tracing::error!("Failed to render error page: {}", e);
                (self.status, heading).into_response()
            }
        }
    }
}

// ============================================================================
// Page rendering
// ============================================================================

/// Rendering context for one request
pub struct Page {
    vars: StandardTemplateVars,
    messages: Vec<FlashMessage>,
    /// The request carried a flash cookie that must be cleared
    had_flash_cookie: bool,
}

impl FromRequestParts<AppState> for Page {
    type Rejection = PageError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = parts.extensions.get::<AuthenticatedUser>().map(|user| &user.0);
        let vars = state.standard_vars(parts.uri.path(), user).await?;

        Ok(Self {
            vars,
            messages: read_flashes(&parts.headers),
            had_flash_cookie: cookie_value(&parts.headers, FLASH_COOKIE).is_some(),
        })
    }
}

impl Page {
    /// Show a message on the page being rendered rather than after a redirect
    pub fn flash(&mut self, message: FlashMessage) {
        self.messages.push(message);
    }

    pub fn render(self, state: &AppState, template: &str, mut context: TeraContext) -> Result<Response, PageError> {
        context.insert("messages", &self.messages);

        let html = state
            .theme_engine
            .render_with_standard_vars(template, &context, &self.vars)?;

        let mut response = Html(html).into_response();
        if self.had_flash_cookie {
            response
                .headers_mut()
                .append(header::SET_COOKIE, clear_flash_cookie());
        }
        Ok(response)
    }
}

/// Fallback for unknown routes
pub async fn not_found() -> PageError {
    PageError::NotFound
}
