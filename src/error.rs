use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::flash::FlashMessage;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Password hash error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Message shown to the user for errors that are recovered with a flash
    /// and a redirect. `None` means the error is a server fault.
    pub fn user_message(&self) -> Option<String> {
        match self {
            AppError::DuplicateEmail => {
                Some("Email already exists. Please use a different email.".to_string())
            }
            AppError::InvalidCredentials => Some("Invalid credentials. Try again.".to_string()),
            AppError::Validation(msg) => Some(msg.clone()),
            AppError::Unauthorized => Some("Unauthorized access.".to_string()),
            AppError::NotFound => Some("Issue not found.".to_string()),
            _ => None,
        }
    }

    /// Default page to send the user back to.
    pub fn redirect_target(&self) -> &'static str {
        match self {
            AppError::DuplicateEmail => "/signup",
            AppError::InvalidCredentials => "/login",
            _ => "/",
        }
    }

    /// Like `into_response`, but user-facing errors redirect to `to`.
    pub fn redirect_to(self, to: &str) -> Response {
        match self.user_message() {
            Some(msg) => FlashMessage::error(msg).redirect(to),
            None => self.into_response(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(msg) = self.user_message() {
            return FlashMessage::error(msg).redirect(self.redirect_target());
        }

        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::PasswordHash(e) => {
                tracing::error!("Password hash error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            // Handled above
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        (status, message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    fn location(response: &Response) -> Option<&str> {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    #[test]
    fn duplicate_email_redirects_to_signup_with_flash() {
        let response = AppError::DuplicateEmail.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/signup"));
        let cookie = response.headers().get(header::SET_COOKIE).unwrap();
        assert!(cookie.to_str().unwrap().starts_with("civictrack_flash=error:"));
    }

    #[test]
    fn invalid_credentials_redirects_to_login() {
        let response = AppError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/login"));
    }

    #[test]
    fn unauthorized_and_not_found_redirect_home() {
        for err in [AppError::Unauthorized, AppError::NotFound] {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(location(&response), Some("/"));
        }
    }

    #[test]
    fn redirect_to_overrides_target() {
        let response = AppError::Validation("Please fill all required fields.".into())
            .redirect_to("/report");
        assert_eq!(location(&response), Some("/report"));
    }

    #[test]
    fn bad_request_returns_400() {
        let response = AppError::BadRequest("oops".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_returns_500_even_with_redirect_to() {
        let response = AppError::Internal("boom".into()).redirect_to("/report");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn server_faults_have_no_user_message() {
        assert!(AppError::Internal("boom".into()).user_message().is_none());
        assert_eq!(
            AppError::Unauthorized.user_message().as_deref(),
            Some("Unauthorized access.")
        );
    }
}
