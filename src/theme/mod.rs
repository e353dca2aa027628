//! Theme engine
//!
//! Page rendering with Tera.
//! Features:
//! - Templates embedded in the binary from `templates/`
//! - Optional override directory: a file there replaces the embedded
//!   template of the same name
//! - Standard template variables shared by every page

use anyhow::{Context, Result};
use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fs;
use std::path::Path;
use tera::{Context as TeraContext, Tera};

mod error;

pub use error::ThemeError;

/// Templates compiled into the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Theme engine for rendering pages
pub struct ThemeEngine {
    tera: Tera,
}

impl ThemeEngine {
    /// Load embedded templates, then any overrides found in `override_path`.
    ///
    /// A missing override directory is not an error.
    pub fn new(override_path: &Path) -> Result<Self> {
        let mut templates = embedded_templates()?;

        if override_path.is_dir() {
            let mut overrides = Vec::new();
            collect_templates_from_dir(override_path, override_path, &mut overrides)?;
            for (name, content) in overrides {
                tracing::debug!("Template override from {:?}: {}", override_path, name);
                templates.retain(|(existing, _)| existing != &name);
                templates.push((name, content));
            }
        }

        let tera = build_tera(templates)?;
        tracing::info!("Loaded {} templates", tera.get_template_names().count());

        Ok(Self { tera })
    }

    /// Render a template with context
    ///
    /// Errors carry the whole Tera cause chain, which is where the useful
    /// part of a template error usually lives.
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            let mut error_msg = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(s) = source {
                error_msg.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            ThemeError::TemplateError(error_msg).into()
        })
    }

    /// Render a template with the standard variables added to `context`
    pub fn render_with_standard_vars(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full_context = context.clone();

        full_context.insert("site_name", &standard_vars.site_name);
        full_context.insert("site_description", &standard_vars.site_description);
        full_context.insert("request_path", &standard_vars.request_path);
        full_context.insert("year", &standard_vars.year);
        full_context.insert("tags", &standard_vars.tags);
        if let Some(ref user) = standard_vars.current_user {
            full_context.insert("current_user", user);
        }

        self.render(template, &full_context)
    }

}

fn embedded_templates() -> Result<Vec<(String, String)>> {
    let mut templates = Vec::new();
    for name in EmbeddedTemplates::iter() {
        let file = EmbeddedTemplates::get(&name)
            .ok_or_else(|| ThemeError::NotFound(name.to_string()))?;
        let content = String::from_utf8(file.data.into_owned())
            .map_err(|e| ThemeError::TemplateError(format!("Template {} is not UTF-8: {}", name, e)))?;
        templates.push((name.to_string(), content));
    }
    Ok(templates)
}

/// Recursively collect `.html` files with names relative to `base_path`
fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    for entry in fs::read_dir(current_path).map_err(ThemeError::IoError)? {
        let path = entry.map_err(ThemeError::IoError)?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| ThemeError::TemplateError("Failed to get relative path".to_string()))?;

            // Forward slashes on every platform
            let template_name = relative_path.to_string_lossy().replace('\\', "/");

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;

            templates.push((template_name, content));
        }
    }

    Ok(())
}

fn build_tera(templates: Vec<(String, String)>) -> Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_templates(templates)
        .map_err(|e| ThemeError::TemplateError(format!("Failed to load templates: {}", e)))?;
    Ok(tera)
}

/// Variables every page receives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardTemplateVars {
    pub site_name: String,
    pub site_description: String,
    pub current_user: Option<CurrentUser>,
    pub request_path: String,
    /// For the footer copyright
    pub year: i32,
    /// Sidebar tag list, alphabetical
    pub tags: Vec<String>,
}

/// Logged-in member as seen by templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// URL of the profile picture
    pub image_url: String,
}

impl CurrentUser {
    pub fn from_user(user: &crate::models::User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            image_url: format!("/static/profile_pics/{}", user.image_file),
        }
    }
}

impl StandardTemplateVars {
    pub fn new(
        site_name: impl Into<String>,
        site_description: impl Into<String>,
        request_path: impl Into<String>,
    ) -> Self {
        Self {
            site_name: site_name.into(),
            site_description: site_description.into(),
            current_user: None,
            request_path: request_path.into(),
            year: chrono::Utc::now().year(),
            tags: Vec::new(),
        }
    }

    pub fn with_user(mut self, user: CurrentUser) -> Self {
        self.current_user = Some(user);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

#[cfg(test)]
mod tests;
