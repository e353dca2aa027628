//! Discussion post pages
//!
//! - GET/POST /post/new - Start a discussion
//! - GET/POST /post/{id} - Read a post and comment on it
//! - GET/POST /post/{id}/update - Edit (author only)
//! - GET /post/{id}/delete - Delete (author only)

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use tera::Context as TeraContext;

use crate::api::comments;
use crate::api::flash::Flash;
use crate::api::forms::{CommentForm, FormState, PostForm};
use crate::api::middleware::{AppState, AuthenticatedUser, MaybeUser};
use crate::api::responses::{Page, PageError};
use crate::models::{CommentTarget, CreatePostInput, Post, UpdatePostInput};

pub const POST_CREATED: &str = "Your post has been created!";
pub const POST_UPDATED: &str = "Your post has been updated!";
pub const POST_DELETED: &str = "Your post has been deleted!";

fn render_post_form(
    state: &AppState,
    page: Page,
    form: &FormState,
    legend: &str,
    action: &str,
) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("title", legend);
    context.insert("legend", legend);
    context.insert("action", action);
    context.insert("form", form);
    page.render(state, "create_post.html", context)
}

fn new_post_form(state: &AppState, page: Page, form: &FormState) -> Result<Response, PageError> {
    render_post_form(state, page, form, "Initiate Discussion", "/post/new")
}

fn edit_post_form(state: &AppState, page: Page, form: &FormState, id: i64) -> Result<Response, PageError> {
    render_post_form(state, page, form, "Update Post", &format!("/post/{}/update", id))
}

/// The post page with its comments; `comment_form` carries a rejected comment
pub async fn render_post(
    state: &AppState,
    page: Page,
    id: i64,
    comment_form: &FormState,
) -> Result<Response, PageError> {
    let post = state.post_service.get_summary(id).await?;
    let comments = state.comment_service.list(CommentTarget::Post(id)).await?;

    let mut context = TeraContext::new();
    context.insert("title", &post.post.title);
    context.insert("post", &post);
    context.insert("comments", &comments);
    context.insert("comment_form", comment_form);
    context.insert("comment_action", &CommentTarget::Post(id).url());
    page.render(state, "post.html", context)
}

/// GET /post/new
pub async fn new_post_page(State(state): State<AppState>, page: Page) -> Result<Response, PageError> {
    new_post_form(&state, page, &FormState::new())
}

/// POST /post/new
pub async fn create_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    page: Page,
    Form(input): Form<PostForm>,
) -> Result<Response, PageError> {
    let form = input.validate();
    if !form.is_valid() {
        return new_post_form(&state, page, &form);
    }

    state
        .post_service
        .create(
            &user,
            CreatePostInput::new(input.title.trim(), input.tag.trim(), input.content),
        )
        .await?;

    Ok((Flash::success(POST_CREATED), Redirect::to("/")).into_response())
}

/// GET /post/{id}
pub async fn show_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    page: Page,
) -> Result<Response, PageError> {
    render_post(&state, page, id, &FormState::new()).await
}

/// POST /post/{id}
pub async fn comment_on_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    MaybeUser(user): MaybeUser,
    page: Page,
    Form(input): Form<CommentForm>,
) -> Result<Response, PageError> {
    comments::submit(&state, page, user.as_ref(), CommentTarget::Post(id), input).await
}

fn post_values(post: &Post) -> FormState {
    FormState::new()
        .with_value("title", post.title.as_str())
        .with_value("tag", post.tag.as_str())
        .with_value("content", post.content.as_str())
}

/// GET /post/{id}/update
pub async fn edit_post_page(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    page: Page,
) -> Result<Response, PageError> {
    let post = state.post_service.get_owned(&user, id).await?;
    edit_post_form(&state, page, &post_values(&post), id)
}

/// POST /post/{id}/update
pub async fn update_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    page: Page,
    Form(input): Form<PostForm>,
) -> Result<Response, PageError> {
    // Strangers get 403 even with an invalid form
    let post = state.post_service.get_owned(&user, id).await?;

    let form = input.validate();
    if !form.is_valid() {
        return edit_post_form(&state, page, &form, id);
    }

    state
        .post_service
        .update(
            &user,
            &post,
            UpdatePostInput::new(input.title.trim(), input.tag.trim(), input.content),
        )
        .await?;

    let target = CommentTarget::Post(id).url();
    Ok((Flash::success(POST_UPDATED), Redirect::to(&target)).into_response())
}

/// GET /post/{id}/delete
pub async fn delete_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Response, PageError> {
    state.post_service.delete(&user, id).await?;
    Ok((Flash::success(POST_DELETED), Redirect::to("/")).into_response())
}
