//! Public pages
//!
//! - GET / and /home - Posts, hot posts and sales
//! - GET /about

use axum::{extract::State, response::Response};
use tera::Context as TeraContext;

use crate::api::middleware::AppState;
use crate::api::responses::{Page, PageError};
use crate::services::hot_posts;

/// GET / and /home
pub async fn home(State(state): State<AppState>, page: Page) -> Result<Response, PageError> {
    let posts = state.post_service.list().await?;
    let hot = hot_posts(&posts);
    let sales = state.sale_service.list().await?;

    let mut context = TeraContext::new();
    context.insert("posts", &posts);
    context.insert("hot_posts", &hot);
    context.insert("sales", &sales);
    page.render(&state, "home.html", context)
}

/// GET /about
pub async fn about(State(state): State<AppState>, page: Page) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("title", "About");
    page.render(&state, "about.html", context)
}
