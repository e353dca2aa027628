//! HTTP layer - page handlers and routing
//!
//! Server-rendered pages for the forum and marketplace:
//! - Site pages (home, about)
//! - Registration, login and account pages
//! - Post pages with comments
//! - Sale pages with comments
//! - Uploaded pictures under /static

pub mod auth;
pub mod comments;
pub mod flash;
pub mod forms;
pub mod middleware;
pub mod posts;
pub mod responses;
pub mod sales;
pub mod site;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::config::UploadConfig;

pub use flash::{Flash, FlashMessage};
pub use middleware::{AppState, AuthenticatedUser, MaybeUser};
pub use responses::{Page, PageError};

/// Room for the other form fields next to the largest accepted picture
const FORM_OVERHEAD: u64 = 64 * 1024;

/// Build the page router
pub fn build_page_router() -> Router<AppState> {
    // Member-only routes; authorship is checked by the services
    let protected_routes = Router::new()
        .route("/account", get(auth::account_page).post(auth::update_account))
        .route("/post/new", get(posts::new_post_page).post(posts::create_post))
        .route("/post/{id}/update", get(posts::edit_post_page).post(posts::update_post))
        .route("/post/{id}/delete", get(posts::delete_post))
        .route("/sale/new", get(sales::new_sale_page).post(sales::create_sale))
        .route("/sale/{id}/sold", get(sales::mark_sold))
        .route_layer(axum_middleware::from_fn(middleware::require_auth));

    // Public routes
    Router::new()
        .route("/", get(site::home))
        .route("/home", get(site::home))
        .route("/about", get(site::about))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/post/{id}", get(posts::show_post).post(posts::comment_on_post))
        .route("/sale/{id}", get(sales::show_sale).post(sales::comment_on_sale))
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, upload: &UploadConfig) -> Router {
    let body_limit = usize::try_from(upload.max_file_size + FORM_OVERHEAD).unwrap_or(usize::MAX);

    Router::new()
        .merge(build_page_router())
        .nest_service("/static", ServeDir::new(&upload.path))
        .fallback(responses::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        // Runs inside load_user so error pages know the member
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::render_error_pages,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::load_user,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
