//! Authentication pages
//!
//! - GET/POST /register - Registration
//! - GET/POST /login - Login, honouring a local `?next=`
//! - GET /logout - End the session
//! - GET/POST /account - Username, email and profile picture

use anyhow::Context;
use axum::{
    extract::{Multipart, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::api::flash::{Flash, FlashMessage};
use crate::api::forms::{FormState, LoginForm, MultipartForm, RegisterForm};
use crate::api::middleware::{session_token, AppState, AuthenticatedUser, MaybeUser, SESSION_COOKIE};
use crate::api::responses::{Page, PageError};
use crate::config::SessionConfig;
use crate::models::{Session, User};
use crate::services::{LoginInput, PictureKind, RegisterInput, UpdateAccountInput, UserServiceError};

pub const ACCOUNT_CREATED: &str = "Your account has been created! You are now able to log in";
pub const LOGIN_FAILED: &str = "Login Unsuccessful. Please check email and password";
pub const ACCOUNT_UPDATED: &str = "Your account has been updated!";

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Only same-site paths are followed after login
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(|c| c.is_ascii_control() || c.is_whitespace()) =>
        {
            path
        }
        _ => "/",
    }
}

/// `Set-Cookie` for a new session; only "remember me" sessions outlive the browser
fn session_cookie(session: &Session, config: &SessionConfig) -> Result<HeaderValue, PageError> {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, session.id);
    if session.persistent {
        cookie.push_str(&format!("; Max-Age={}", session.remaining_seconds()));
    }
    if config.secure_cookie {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie).context("Session cookie is not a valid header")?)
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

fn home() -> Response {
    Redirect::to("/").into_response()
}

// ============================================================================
// Register
// ============================================================================

fn render_register(state: &AppState, page: Page, form: &FormState) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("title", "Register");
    context.insert("form", form);
    page.render(state, "register.html", context)
}

/// GET /register
pub async fn register_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    page: Page,
) -> Result<Response, PageError> {
    if user.is_some() {
        return Ok(home());
    }
    render_register(&state, page, &FormState::new())
}

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    page: Page,
    Form(input): Form<RegisterForm>,
) -> Result<Response, PageError> {
    if user.is_some() {
        return Ok(home());
    }

    let mut form = input.validate();
    if !form.is_valid() {
        return render_register(&state, page, &form);
    }

    let result = state
        .user_service
        .register(RegisterInput::new(&input.username, &input.email, &input.password))
        .await;

    match result {
        Ok(_) => Ok((Flash::success(ACCOUNT_CREATED), Redirect::to("/login")).into_response()),
        Err(UserServiceError::UserExists { field, message }) => {
            form.add_error(field, message);
            render_register(&state, page, &form)
        }
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Login / logout
// ============================================================================

fn render_login(
    state: &AppState,
    page: Page,
    form: &FormState,
    next: Option<&str>,
) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("title", "Login");
    context.insert("form", form);
    context.insert("next", &next);
    page.render(state, "login.html", context)
}

/// GET /login
pub async fn login_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<NextQuery>,
    page: Page,
) -> Result<Response, PageError> {
    if user.is_some() {
        return Ok(home());
    }
    render_login(&state, page, &FormState::new(), query.next.as_deref())
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<NextQuery>,
    mut page: Page,
    Form(input): Form<LoginForm>,
) -> Result<Response, PageError> {
    if user.is_some() {
        return Ok(home());
    }

    let form = input.validate();
    if !form.is_valid() {
        return render_login(&state, page, &form, query.next.as_deref());
    }

    let result = state
        .user_service
        .login(LoginInput::new(&input.email, &input.password).remember(input.remember()))
        .await;

    match result {
        Ok(session) => {
            let cookie = session_cookie(&session, &state.session_config)?;
            let target = safe_next(query.next.as_deref());
            Ok(([(header::SET_COOKIE, cookie)], Redirect::to(target)).into_response())
        }
        Err(UserServiceError::AuthenticationError(_)) => {
            page.flash(FlashMessage::danger(LOGIN_FAILED));
            render_login(&state, page, &form, query.next.as_deref())
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, PageError> {
    if let Some(token) = session_token(&headers) {
        state.user_service.logout(&token).await?;
    }
    Ok(([(header::SET_COOKIE, clear_session_cookie())], Redirect::to("/")).into_response())
}

// ============================================================================
// Account
// ============================================================================

fn account_form(user: &User) -> FormState {
    FormState::new()
        .with_value("username", user.username.as_str())
        .with_value("email", user.email.as_str())
}

fn render_account(state: &AppState, page: Page, form: &FormState) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("title", "Account");
    context.insert("form", form);
    page.render(state, "account.html", context)
}

/// GET /account
pub async fn account_page(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    page: Page,
) -> Result<Response, PageError> {
    render_account(&state, page, &account_form(&user))
}

/// POST /account (multipart)
pub async fn update_account(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    page: Page,
    multipart: Multipart,
) -> Result<Response, PageError> {
    let mut upload = MultipartForm::read(multipart).await?;
    let mut form = upload.validate_account(&state.images);
    if !form.is_valid() {
        return render_account(&state, page, &form);
    }

    let mut input = UpdateAccountInput::new(upload.field("username"), upload.field("email"));
    if let Some(filename) = upload
        .save_picture(&state.images, PictureKind::Profile, &mut form)
        .await?
    {
        input = input.with_image(filename);
    }
    if !form.is_valid() {
        return render_account(&state, page, &form);
    }

    match state.user_service.update_account(&user, input).await {
        Ok(updated) => {
            tracing::debug!("User {} updated their account", updated.id);
            Ok((Flash::success(ACCOUNT_UPDATED), Redirect::to("/account")).into_response())
        }
        Err(UserServiceError::UserExists { field, message }) => {
            form.add_error(field, message);
            render_account(&state, page, &form)
        }
        Err(e) => Err(e.into()),
    }
}
