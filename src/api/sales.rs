//! Marketplace pages
//!
//! - GET/POST /sale/new - List an item (multipart, optional picture)
//! - GET/POST /sale/{id} - View a listing and comment on it
//! - GET /sale/{id}/sold - Mark as sold (seller only)

use axum::{
    extract::{Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use tera::Context as TeraContext;

use crate::api::comments;
use crate::api::flash::Flash;
use crate::api::forms::{CommentForm, FormState, MultipartForm};
use crate::api::middleware::{AppState, AuthenticatedUser, MaybeUser};
use crate::api::responses::{Page, PageError};
use crate::models::{CommentTarget, CreateSaleInput};
use crate::services::PictureKind;

pub const SALE_CREATED: &str = "Your sale has been created!";

fn render_sale_form(state: &AppState, page: Page, form: &FormState) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("title", "New Sale");
    context.insert("legend", "Item to sell");
    context.insert("form", form);
    page.render(state, "create_sale.html", context)
}

/// The listing page with its comments
pub async fn render_sale(
    state: &AppState,
    page: Page,
    id: i64,
    comment_form: &FormState,
) -> Result<Response, PageError> {
    let sale = state.sale_service.get_summary(id).await?;
    let comments = state.comment_service.list(CommentTarget::Sale(id)).await?;

    let mut context = TeraContext::new();
    context.insert("title", &sale.sale.title);
    context.insert("sale", &sale);
    context.insert("comments", &comments);
    context.insert("comment_form", comment_form);
    context.insert("comment_action", &CommentTarget::Sale(id).url());
    page.render(state, "sale.html", context)
}

/// GET /sale/new
pub async fn new_sale_page(State(state): State<AppState>, page: Page) -> Result<Response, PageError> {
    render_sale_form(&state, page, &FormState::new())
}

/// POST /sale/new (multipart)
pub async fn create_sale(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    page: Page,
    multipart: Multipart,
) -> Result<Response, PageError> {
    let mut upload = MultipartForm::read(multipart).await?;
    let mut form = upload.validate_sale(&state.images);
    if !form.is_valid() {
        return render_sale_form(&state, page, &form);
    }

    let mut input = CreateSaleInput::new(
        upload.field("title").trim(),
        upload.field("price").trim(),
        upload.field("content"),
    );
    if let Some(filename) = upload
        .save_picture(&state.images, PictureKind::Item, &mut form)
        .await?
    {
        input = input.with_image(filename);
    }
    if !form.is_valid() {
        return render_sale_form(&state, page, &form);
    }

    state.sale_service.create(&user, input).await?;

    Ok((Flash::success(SALE_CREATED), Redirect::to("/")).into_response())
}

/// GET /sale/{id}
pub async fn show_sale(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    page: Page,
) -> Result<Response, PageError> {
    render_sale(&state, page, id, &FormState::new()).await
}

/// POST /sale/{id}
pub async fn comment_on_sale(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    MaybeUser(user): MaybeUser,
    page: Page,
    Form(input): Form<CommentForm>,
) -> Result<Response, PageError> {
    comments::submit(&state, page, user.as_ref(), CommentTarget::Sale(id), input).await
}

/// GET /sale/{id}/sold
///
/// Owner check happens before any write; repeating it is harmless.
pub async fn mark_sold(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Response, PageError> {
    state.sale_service.mark_sold(&user, id).await?;
    Ok(Redirect::to("/").into_response())
}
