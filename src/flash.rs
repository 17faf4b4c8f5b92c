//! One-shot flash messages carried across a redirect in a short-lived cookie.
//!
//! The cookie value is `<kind>:<hex(message)>` so arbitrary text survives the
//! cookie character restrictions.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderName};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use std::convert::Infallible;

use crate::extractors::cookie_value;

pub const FLASH_COOKIE: &str = "civictrack_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub message: String,
}

impl FlashMessage {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == FlashKind::Error
    }

    pub fn css_class(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn encode(&self) -> String {
        format!("{}:{}", self.kind.as_str(), hex::encode(&self.message))
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let (kind, payload) = raw.split_once(':')?;
        let kind = match kind {
            "success" => FlashKind::Success,
            "error" => FlashKind::Error,
            _ => return None,
        };
        let bytes = hex::decode(payload).ok()?;
        let message = String::from_utf8(bytes).ok()?;
        Some(Self { kind, message })
    }

    fn set_cookie(&self) -> String {
        format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age=60",
            FLASH_COOKIE,
            self.encode()
        )
    }

    /// 303 redirect carrying this message to the next page.
    pub fn redirect(self, to: &str) -> Response {
        self.redirect_with_cookies(to, std::iter::empty())
    }

    /// Same as `redirect`, also setting the given `Set-Cookie` values.
    pub fn redirect_with_cookies<I>(self, to: &str, cookies: I) -> Response
    where
        I: IntoIterator<Item = String>,
    {
        let mut headers: Vec<(HeaderName, String)> = cookies
            .into_iter()
            .map(|cookie| (header::SET_COOKIE, cookie))
            .collect();
        headers.push((header::SET_COOKIE, self.set_cookie()));
        (AppendHeaders(headers), Redirect::to(to)).into_response()
    }
}

fn clear_flash_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", FLASH_COOKIE)
}

/// Flash message sent by the previous response, if any.
#[derive(Debug, Clone, Default)]
pub struct IncomingFlash(pub Option<FlashMessage>);

impl IncomingFlash {
    pub fn message(&self) -> Option<FlashMessage> {
        self.0.clone()
    }

    /// Header that removes the cookie once the message has been displayed.
    pub fn consume(&self) -> AppendHeaders<Vec<(HeaderName, String)>> {
        if self.0.is_some() {
            AppendHeaders(vec![(header::SET_COOKIE, clear_flash_cookie())])
        } else {
            AppendHeaders(Vec::new())
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for IncomingFlash {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(IncomingFlash(
            cookie_value(&parts.headers, FLASH_COOKIE).and_then(FlashMessage::decode),
        ))
    }
}
