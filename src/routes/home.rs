use askama::Template;
use axum::extract::State;
use axum::response::Response;

use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::flash::IncomingFlash;
use crate::routes::{page, Layout};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub issue_count: i64,
}

pub async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    flash: IncomingFlash,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let issue_count: i64 = conn.query_row("SELECT COUNT(*) FROM issues", [], |row| row.get(0))?;

    Ok(page(
        &flash,
        HomeTemplate {
            layout: Layout::new(&flash, user.as_ref()),
            issue_count,
        },
    ))
}
