//! Tests for the theme engine

use super::*;
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use tera::Context as TeraContext;

/// Engine pointed at a directory that does not exist, so only embedded
/// templates are loaded
fn embedded_engine() -> (TempDir, ThemeEngine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = ThemeEngine::new(&temp_dir.path().join("missing")).unwrap();
    (temp_dir, engine)
}

fn standard_vars() -> StandardTemplateVars {
    StandardTemplateVars::new("Board Game Forum", "Games talk", "/")
}

fn empty_form() -> serde_json::Value {
    json!({ "values": {}, "errors": {} })
}

#[test]
fn test_embedded_templates_loaded() {
    let embedded: Vec<String> = EmbeddedTemplates::iter().map(|name| name.to_string()).collect();

    for name in [
        "base.html",
        "macros.html",
        "home.html",
        "about.html",
        "register.html",
        "login.html",
        "account.html",
        "create_post.html",
        "post.html",
        "create_sale.html",
        "sale.html",
        "error.html",
    ] {
        assert!(embedded.iter().any(|n| n == name), "missing template {}", name);
    }
    assert!(!embedded.iter().any(|n| n == "index.html"));
}

#[test]
fn test_missing_override_dir_is_fine() {
    let temp_dir = TempDir::new().unwrap();

    let engine = ThemeEngine::new(&temp_dir.path().join("nope")).unwrap();

    assert!(engine
        .render_with_standard_vars("about.html", &TeraContext::new(), &standard_vars())
        .is_ok());
}

#[test]
fn test_render_with_standard_vars() {
    let (_dir, engine) = embedded_engine();

    let html = engine
        .render_with_standard_vars("about.html", &TeraContext::new(), &standard_vars())
        .unwrap();

    assert!(html.contains("About Board Game Forum"));
    assert!(html.contains("Games talk"));
    assert!(html.contains(&chrono::Utc::now().year().to_string()));
    // Anonymous visitors get the login links
    assert!(html.contains("href=\"/login\""));
    assert!(!html.contains("href=\"/logout\""));
}

#[test]
fn test_current_user_and_tags_in_layout() {
    let (_dir, engine) = embedded_engine();
    let mut user = crate::models::User::new(
        "meeple".to_string(),
        "meeple@example.com".to_string(),
        "hash".to_string(),
    );
    user.id = 4;

    let vars = standard_vars()
        .with_user(CurrentUser::from_user(&user))
        .with_tags(vec!["strategy".to_string(), "trading".to_string()]);
    let html = engine
        .render_with_standard_vars("about.html", &TeraContext::new(), &vars)
        .unwrap();

    assert!(html.contains("meeple"));
    // Tera escapes the slashes of the picture URL
    assert!(html.contains("profile_pics&#x2F;default.jpg"));
    assert!(html.contains("href=\"/logout\""));
    assert!(html.contains("strategy"));
    assert!(html.contains("trading"));
}

#[test]
fn test_flash_messages_rendered() {
    let (_dir, engine) = embedded_engine();
    let mut context = TeraContext::new();
    context.insert(
        "messages",
        &json!([{ "category": "success", "message": "Your post has been created!" }]),
    );

    let html = engine
        .render_with_standard_vars("about.html", &context, &standard_vars())
        .unwrap();

    assert!(html.contains("alert-success"));
    assert!(html.contains("Your post has been created!"));
}

#[test]
fn test_form_errors_and_values_rendered() {
    let (_dir, engine) = embedded_engine();
    let mut context = TeraContext::new();
    context.insert(
        "form",
        &json!({
            "values": { "username": "x", "email": "x@example.com", "password": "secret" },
            "errors": { "username": ["Field must be between 2 and 20 characters long."] }
        }),
    );

    let html = engine
        .render_with_standard_vars("register.html", &context, &standard_vars())
        .unwrap();

    assert!(html.contains("is-invalid"));
    assert!(html.contains("Field must be between 2 and 20 characters long."));
    assert!(html.contains("value=\"x@example.com\""));
    // Passwords are never echoed back
    assert!(!html.contains("secret"));
}

#[test]
fn test_login_form_keeps_next() {
    let (_dir, engine) = embedded_engine();
    let mut context = TeraContext::new();
    context.insert("form", &empty_form());
    context.insert("next", "/account");

    let html = engine
        .render_with_standard_vars("login.html", &context, &standard_vars())
        .unwrap();

    assert!(html.contains("action=\"/login?next="));
    assert!(html.contains("account\""));
}

#[test]
fn test_error_page() {
    let (_dir, engine) = embedded_engine();
    let mut context = TeraContext::new();
    context.insert("status", &403);
    context.insert("heading", "Forbidden");
    context.insert("message", "You don't have permission to do that.");

    let html = engine
        .render_with_standard_vars("error.html", &context, &standard_vars())
        .unwrap();

    assert!(html.contains("403"));
    assert!(html.contains("Forbidden"));
}

#[test]
fn test_override_replaces_embedded_template() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("about.html"),
        r#"{% extends "base.html" %}{% block content %}<p>Custom about for {{ site_name }}</p>{% endblock content %}"#,
    )
    .unwrap();

    let engine = ThemeEngine::new(temp_dir.path()).unwrap();
    let html = engine
        .render_with_standard_vars("about.html", &TeraContext::new(), &standard_vars())
        .unwrap();

    assert!(html.contains("Custom about for Board Game Forum"));
    assert!(!html.contains("sell games they no longer play"));
    // Other templates still come from the binary
    let mut context = TeraContext::new();
    context.insert("form", &empty_form());
    let login = engine
        .render_with_standard_vars("login.html", &context, &standard_vars())
        .unwrap();
    assert!(login.contains("name=\"email\""));
    assert!(!login.contains("Custom about"));
}

#[test]
fn test_override_in_subdirectory_and_new_template() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join("partials")).unwrap();
    fs::write(temp_dir.path().join("partials/banner.html"), "<b>{{ site_name }}</b>").unwrap();
    fs::write(temp_dir.path().join("notes.txt"), "not a template").unwrap();

    let engine = ThemeEngine::new(temp_dir.path()).unwrap();

    assert!(engine.render("notes.txt", &TeraContext::new()).is_err());
    let html = engine
        .render_with_standard_vars("partials/banner.html", &TeraContext::new(), &standard_vars())
        .unwrap();
    assert_eq!(html, "<b>Board Game Forum</b>");
}

#[test]
fn test_broken_override_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("about.html"), "{% if %}").unwrap();

    let result = ThemeEngine::new(temp_dir.path());

    assert!(result.is_err());
}

#[test]
fn test_render_error_names_template() {
    let (_dir, engine) = embedded_engine();

    // error.html needs `status`, which is missing here
    let err = engine
        .render_with_standard_vars("error.html", &TeraContext::new(), &standard_vars())
        .unwrap_err();

    assert!(err.to_string().contains("Failed to render 'error.html'"));
}

#[test]
fn test_render_unknown_template() {
    let (_dir, engine) = embedded_engine();

    let result = engine.render("nonexistent.html", &TeraContext::new());

    assert!(result.is_err());
}
