//! Flash messages
//!
//! One-time notices carried across a redirect in the `flash` cookie as
//! URL-encoded JSON. The next rendered page shows them and clears the cookie.

use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponseParts, ResponseParts};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use crate::api::middleware::cookie_value;

pub const FLASH_COOKIE: &str = "flash";

/// A notice with a Bootstrap alert category (`success`, `info`, `danger`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub category: String,
    pub message: String,
}

impl FlashMessage {
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new("success", message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new("info", message)
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self::new("danger", message)
    }
}

/// Messages to show on the page the client is redirected to.
///
/// Used as a response part: `(Flash::success("..."), Redirect::to("/"))`.
#[derive(Debug, Clone, Default)]
pub struct Flash(Vec<FlashMessage>);

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self(vec![FlashMessage::success(message)])
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self(vec![FlashMessage::info(message)])
    }
}

impl IntoResponseParts for Flash {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        match encode_cookie(&self.0) {
            Some(cookie) => {
                res.headers_mut().append(header::SET_COOKIE, cookie);
            }
            None => tracing::warn!("Dropping flash messages that could not be encoded"),
        }
        Ok(res)
    }
}

fn encode_cookie(messages: &[FlashMessage]) -> Option<HeaderValue> {
    let json = serde_json::to_string(messages).ok()?;
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        FLASH_COOKIE,
        urlencoding::encode(&json)
    );
    HeaderValue::from_str(&cookie).ok()
}

/// Messages pending in the request's `flash` cookie; malformed cookies read as empty
pub fn read_flashes(headers: &HeaderMap) -> Vec<FlashMessage> {
    cookie_value(headers, FLASH_COOKIE)
        .and_then(|raw| urlencoding::decode(&raw).ok().map(|s| s.into_owned()))
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default()
}

pub fn clear_flash_cookie() -> HeaderValue {
    HeaderValue::from_static("flash=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
