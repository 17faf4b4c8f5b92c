pub mod admin;
pub mod assets;
pub mod auth;
pub mod home;
pub mod issues;
pub mod map;

use askama::Template;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::extractors::CurrentUser;
use crate::flash::{FlashMessage, IncomingFlash};
use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes();

    Router::new()
        .route("/", get(home::index))
        .route("/assets/{*path}", get(assets::serve))
        .route("/uploads/{name}", get(assets::serve_upload))
        .merge(auth::router())
        .merge(issues::router(max_upload_bytes))
        .merge(map::router())
        .merge(admin::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// Render a page and drop the flash cookie it displayed.
pub fn page<T: Template>(flash: &IncomingFlash, template: T) -> Response {
    (flash.consume(), Html(template)).into_response()
}

/// Navigation and flash state shared by every page.
pub struct Layout {
    pub flash: Option<FlashMessage>,
    pub user: Option<CurrentUser>,
}

impl Layout {
    pub fn new(flash: &IncomingFlash, user: Option<&CurrentUser>) -> Self {
        Self {
            flash: flash.message(),
            user: user.cloned(),
        }
    }

    pub fn flash(&self) -> Option<&FlashMessage> {
        self.flash.as_ref()
    }

    pub fn logged_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_admin())
    }

    pub fn user_name(&self) -> &str {
        self.user.as_ref().map(|u| u.name.as_str()).unwrap_or("")
    }
}
