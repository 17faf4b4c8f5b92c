use askama::Template;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Form;
use serde::Deserialize;

use crate::auth::{service, session};
use crate::db::models::Role;
use crate::error::AppResult;
use crate::extractors::{cookie_value, MaybeUser};
use crate::flash::{FlashMessage, IncomingFlash};
use crate::routes::{page, Layout};
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/signup.html")]
pub struct SignupTemplate {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
}

// -- Request types --

#[derive(Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name)
}

// -- Signup --

/// GET /signup
pub async fn signup_page(MaybeUser(user): MaybeUser, flash: IncomingFlash) -> Response {
    page(
        &flash,
        SignupTemplate {
            layout: Layout::new(&flash, user.as_ref()),
        },
    )
}

/// POST /signup
pub async fn signup(
    State(state): State<AppState>,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    match service::register(
        &conn,
        &form.name,
        &form.email,
        &form.password,
        Role::User,
        state.config.auth.bcrypt_cost,
    ) {
        Ok(_) => Ok(FlashMessage::success("Account created successfully! Please login.")
            .redirect("/login")),
        Err(e) => Ok(e.redirect_to("/signup")),
    }
}

// -- Login --

/// GET /login
pub async fn login_page(MaybeUser(user): MaybeUser, flash: IncomingFlash) -> Response {
    page(
        &flash,
        LoginTemplate {
            layout: Layout::new(&flash, user.as_ref()),
        },
    )
}

/// POST /login — admins land on the dashboard, everyone else on the home page
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let user = match service::authenticate(&conn, &form.email, &form.password) {
        Ok(user) => user,
        Err(e) => return Ok(e.redirect_to("/login")),
    };

    let auth = &state.config.auth;
    let token = session::create_session(&conn, user.id, auth.session_hours)?;
    tracing::info!(user_id = user.id, "User logged in");

    let (message, target) = match user.role {
        Role::Admin => ("Admin logged in successfully!", "/admin"),
        Role::User => ("Logged in successfully!", "/"),
    };

    Ok(FlashMessage::success(message).redirect_with_cookies(
        target,
        [session_cookie(&auth.cookie_name, &token, auth.session_hours)],
    ))
}

/// GET /logout — delete the session (if any) and clear the cookie
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = cookie_value(&headers, cookie_name) {
        let conn = state.db.get()?;
        session::delete_session(&conn, token)?;
    }

    Ok(FlashMessage::success("Logged out successfully.")
        .redirect_with_cookies("/", [clear_session_cookie(cookie_name)]))
}
