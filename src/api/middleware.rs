//! Request middleware
//!
//! Contains middleware and extractors for:
//! - Session loading (resolves the `session` cookie on every request)
//! - Login guard for member-only routes
//! - HTML error pages for failed handlers

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::convert::Infallible;
use std::sync::Arc;

use crate::api::flash::Flash;
use crate::api::responses::{ErrorPage, PageError};
use crate::config::{Config, SessionConfig, SiteConfig};
use crate::db::repositories::{
    SqlxCommentRepository, SqlxPostRepository, SqlxSaleRepository, SqlxSessionRepository,
    SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{CommentService, ImageStore, PostService, SaleService, UserService};
use crate::theme::{CurrentUser, StandardTemplateVars, ThemeEngine};

pub const SESSION_COOKIE: &str = "session";

/// Flash shown after being bounced to the login page
pub const LOGIN_REQUIRED: &str = "Please log in to access this page.";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub sale_service: Arc<SaleService>,
    pub comment_service: Arc<CommentService>,
    pub theme_engine: Arc<ThemeEngine>,
    pub images: Arc<ImageStore>,
    pub site: Arc<SiteConfig>,
    pub session_config: Arc<SessionConfig>,
}

impl AppState {
    /// Wire repositories, services and the theme engine over `pool`
    pub fn new(pool: DynDatabasePool, config: &Config) -> anyhow::Result<Self> {
        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let sale_repo = SqlxSaleRepository::boxed(pool.clone());

        let user_service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            &config.session,
        );
        let comment_service = CommentService::new(
            SqlxCommentRepository::boxed(pool),
            post_repo.clone(),
            sale_repo.clone(),
        );

        Ok(Self {
            user_service: Arc::new(user_service),
            post_service: Arc::new(PostService::new(post_repo)),
            sale_service: Arc::new(SaleService::new(sale_repo)),
            comment_service: Arc::new(comment_service),
            theme_engine: Arc::new(ThemeEngine::new(&config.theme.path)?),
            images: Arc::new(ImageStore::new(&config.upload)),
            site: Arc::new(config.site.clone()),
            session_config: Arc::new(config.session.clone()),
        })
    }

    /// Variables every page gets: site identity, sidebar tags and the member
    pub async fn standard_vars(
        &self,
        path: &str,
        user: Option<&User>,
    ) -> Result<StandardTemplateVars, PageError> {
        let tags = self.post_service.tags().await?;

        let vars = StandardTemplateVars::new(&self.site.name, &self.site.description, path)
            .with_tags(tags);
        Ok(match user {
            Some(user) => vars.with_user(CurrentUser::from_user(user)),
            None => vars,
        })
    }
}

/// Logged-in member, placed in request extensions by [`load_user`]
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| login_redirect(&parts.uri))
    }
}

/// The member if logged in; never rejects
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|user| user.0.clone()),
        ))
    }
}

/// Value of cookie `name`, searching every `Cookie` header
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

pub fn session_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, SESSION_COOKIE).filter(|token| !token.is_empty())
}

/// Session loading middleware
///
/// Anonymous visitors and expired sessions pass through without a user.
pub async fn load_user(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if let Some(token) = session_token(request.headers()) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Session validation failed: {}", e),
        }
    }
    next.run(request).await
}

/// Authentication middleware: anonymous visitors are sent to the login page
pub async fn require_auth(request: Request, next: Next) -> Response {
    if request.extensions().get::<AuthenticatedUser>().is_none() {
        return login_redirect(request.uri());
    }
    next.run(request).await
}

/// Redirect to `/login?next=<path>` with the login-required flash
pub fn login_redirect(uri: &Uri) -> Response {
    let next = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let target = format!("/login?next={}", urlencoding::encode(next));
    (Flash::info(LOGIN_REQUIRED), Redirect::to(&target)).into_response()
}

/// Error page middleware
///
/// Responses produced by [`PageError`] carry an [`ErrorPage`] marker; those
/// are replaced by the rendered `error.html`.
pub async fn render_error_pages(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|user| user.0.clone());
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let error_page = response.extensions().get::<ErrorPage>().cloned();
    match error_page {
        Some(page) => page.render(&state, &path, user.as_ref()).await,
        None => response,
    }
}
