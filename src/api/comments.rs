//! Comment submission, shared by post and sale pages

use axum::response::{IntoResponse, Redirect, Response};

use crate::api::flash::{Flash, FlashMessage};
use crate::api::forms::{CommentForm, FormState};
use crate::api::middleware::AppState;
use crate::api::responses::{Page, PageError};
use crate::api::{posts, sales};
use crate::models::{CommentTarget, User};
use crate::services::{CommentServiceError, LOGIN_REQUIRED_MESSAGE};

pub const COMMENT_ADDED: &str = "Your comment has been added!";

async fn render_target(
    state: &AppState,
    page: Page,
    target: CommentTarget,
    form: &FormState,
) -> Result<Response, PageError> {
    match target {
        CommentTarget::Post(id) => posts::render_post(state, page, id, form).await,
        CommentTarget::Sale(id) => sales::render_sale(state, page, id, form).await,
    }
}

/// Handle a submitted comment form.
///
/// Anonymous visitors get the page back with a notice and nothing is stored.
pub async fn submit(
    state: &AppState,
    mut page: Page,
    user: Option<&User>,
    target: CommentTarget,
    input: CommentForm,
) -> Result<Response, PageError> {
    let form = input.validate();
    if !form.is_valid() {
        return render_target(state, page, target, &form).await;
    }

    match state.comment_service.create(user, target, &input.content).await {
        Ok(_) => Ok((Flash::success(COMMENT_ADDED), Redirect::to(&target.url())).into_response()),
        Err(CommentServiceError::LoginRequired) => {
            page.flash(FlashMessage::danger(LOGIN_REQUIRED_MESSAGE));
            render_target(state, page, target, &form).await
        }
        Err(e) => Err(e.into()),
    }
}
