//! Form validation
//!
//! Each form validates into a [`FormState`]: the submitted values (passwords
//! excluded) plus error messages per field, which templates render inline.

use axum::extract::Multipart;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::responses::PageError;
use crate::services::{ImageError, ImageStore, PictureKind};

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_EMAIL: &str = "Invalid email address.";
pub const PASSWORDS_DIFFER: &str = "Field must be equal to password.";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// Values and errors of one submitted form
#[derive(Debug, Clone, Default, Serialize)]
pub struct FormState {
    pub values: BTreeMap<String, String>,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, field: &str, value: impl Into<String>) -> Self {
        self.values.insert(field.to_string(), value.into());
        self
    }

    pub fn add_error(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn required(&mut self, field: &str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.add_error(field, REQUIRED);
            return false;
        }
        true
    }

    fn length(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let len = value.trim().chars().count();
        if len < min || len > max {
            self.add_error(
                field,
                format!("Field must be between {} and {} characters long.", min, max),
            );
        }
    }

    fn max_length(&mut self, field: &str, value: &str, max: usize) {
        if value.trim().chars().count() > max {
            self.add_error(field, format!("Field cannot be longer than {} characters.", max));
        }
    }

    fn email(&mut self, field: &str, value: &str) {
        if !EMAIL_RE.is_match(value.trim()) {
            self.add_error(field, INVALID_EMAIL);
        }
    }
}

fn username_rules(form: &mut FormState, username: &str) {
    if form.required("username", username) {
        form.length("username", username, 2, 20);
    }
}

fn email_rules(form: &mut FormState, email: &str) {
    if form.required("email", email) {
        form.email("email", email);
    }
}

// ============================================================================
// URL-encoded forms
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> FormState {
        let mut form = FormState::new()
            .with_value("username", self.username.trim())
            .with_value("email", self.email.trim());

        username_rules(&mut form, &self.username);
        email_rules(&mut form, &self.email);
        form.required("password", &self.password);
        if form.required("confirm_password", &self.confirm_password)
            && self.confirm_password != self.password
        {
            form.add_error("confirm_password", PASSWORDS_DIFFER);
        }
        form
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Checkbox; present when ticked
    pub remember: Option<String>,
}

impl LoginForm {
    pub fn remember(&self) -> bool {
        self.remember.as_deref().is_some_and(|v| !v.is_empty())
    }

    pub fn validate(&self) -> FormState {
        let mut form = FormState::new().with_value("email", self.email.trim());
        if self.remember() {
            form = form.with_value("remember", "y");
        }

        email_rules(&mut form, &self.email);
        form.required("password", &self.password);
        form
    }
}

/// Create and update share the same fields
#[derive(Debug, Default, Deserialize)]
pub struct PostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub content: String,
}

impl PostForm {
    pub fn validate(&self) -> FormState {
        let mut form = FormState::new()
            .with_value("title", self.title.as_str())
            .with_value("tag", self.tag.as_str())
            .with_value("content", self.content.as_str());

        if form.required("title", &self.title) {
            form.max_length("title", &self.title, crate::services::post::MAX_TITLE_LEN);
        }
        if form.required("tag", &self.tag) {
            form.max_length("tag", &self.tag, crate::services::post::MAX_TAG_LEN);
        }
        form.required("content", &self.content);
        form
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub content: String,
}

impl CommentForm {
    pub fn validate(&self) -> FormState {
        let mut form = FormState::new().with_value("content", self.content.as_str());
        form.required("content", &self.content);
        form
    }
}

// ============================================================================
// Multipart forms
// ============================================================================

/// A file field as received
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Text fields and the optional `picture` file of a multipart form
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: BTreeMap<String, String>,
    pub picture: Option<UploadedFile>,
}

impl MultipartForm {
    /// Read every part. An empty file input (no name, no bytes) is no file.
    pub async fn read(mut multipart: Multipart) -> Result<Self, PageError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| PageError::BadRequest(format!("Failed to read form: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            let file_name = field.file_name().map(|s| s.to_string());

            match file_name {
                Some(file_name) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| PageError::BadRequest(format!("Failed to read file: {}", e)))?;
                    if name == "picture" && !file_name.is_empty() && !bytes.is_empty() {
                        form.picture = Some(UploadedFile {
                            file_name,
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| PageError::BadRequest(format!("Failed to read form: {}", e)))?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    /// Extension and size checks; decoding problems surface when saving
    fn check_picture(&self, images: &ImageStore, form: &mut FormState) {
        if let Some(picture) = &self.picture {
            if let Err(e) = images.check(&picture.file_name, picture.bytes.len() as u64) {
                form.add_error("picture", e.to_string());
            }
        }
    }

    /// Store the uploaded picture, if any.
    ///
    /// A picture that cannot be decoded becomes a `picture` error on `form`
    /// and yields `Ok(None)`.
    pub async fn save_picture(
        &mut self,
        images: &ImageStore,
        kind: PictureKind,
        form: &mut FormState,
    ) -> Result<Option<String>, PageError> {
        let picture = match self.picture.take() {
            Some(picture) => picture,
            None => return Ok(None),
        };

        match images.save(kind, &picture.file_name, picture.bytes).await {
            Ok(filename) => Ok(Some(filename)),
            Err(ImageError::InternalError(e)) => Err(PageError::Internal(e)),
            Err(e) => {
                form.add_error("picture", e.to_string());
                Ok(None)
            }
        }
    }

    pub fn validate_account(&self, images: &ImageStore) -> FormState {
        let username = self.field("username");
        let email = self.field("email");
        let mut form = FormState::new()
            .with_value("username", username.trim())
            .with_value("email", email.trim());

        username_rules(&mut form, username);
        email_rules(&mut form, email);
        self.check_picture(images, &mut form);
        form
    }

    pub fn validate_sale(&self, images: &ImageStore) -> FormState {
        let title = self.field("title");
        let price = self.field("price");
        let content = self.field("content");
        let mut form = FormState::new()
            .with_value("title", title)
            .with_value("price", price)
            .with_value("content", content);

        if form.required("title", title) {
            form.max_length("title", title, crate::services::post::MAX_TITLE_LEN);
        }
        if form.required("price", price) {
            form.max_length("price", price, crate::services::sale::MAX_PRICE_LEN);
        }
        form.required("content", content);
        self.check_picture(images, &mut form);
        form
    }
}
