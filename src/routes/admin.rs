use askama::Template;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::admin::{self, CategoryCount};
use crate::db::models::FlaggedIssue;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::flash::{FlashMessage, IncomingFlash};
use crate::issues::service::{self, STATUS_CHOICES};
use crate::routes::{page, Layout};
use crate::state::AppState;

pub struct StatusOption {
    pub value: &'static str,
    pub selected: bool,
}

pub struct AdminIssueRow {
    pub id: i64,
    pub title: String,
    pub status: String,
    pub options: Vec<StatusOption>,
}

#[derive(Template)]
#[template(path = "pages/admin.html")]
pub struct AdminTemplate {
    pub layout: Layout,
    pub total_issues: i64,
    pub top_category: Option<CategoryCount>,
    pub flagged_issues: Vec<FlaggedIssue>,
    pub issues: Vec<AdminIssueRow>,
}

impl AdminTemplate {
    pub fn top_category(&self) -> Option<&CategoryCount> {
        self.top_category.as_ref()
    }
}

#[derive(Deserialize)]
pub struct StatusForm {
    #[serde(default)]
    pub status: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin", get(dashboard))
        .route(
            "/update_status_from_dashboard/{id}",
            post(update_status_from_dashboard),
        )
}

fn status_options(current: &str) -> Vec<StatusOption> {
    STATUS_CHOICES
        .iter()
        .map(|&value| StatusOption {
            value,
            selected: value == current,
        })
        .collect()
}

/// GET /admin — statistics, flagged issues and bulk status controls
async fn dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
    flash: IncomingFlash,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let stats = admin::dashboard_stats(&conn, &user)?;

    let issues = stats
        .all_issues
        .into_iter()
        .map(|row| AdminIssueRow {
            options: status_options(&row.status),
            id: row.id,
            title: row.title,
            status: row.status,
        })
        .collect();

    Ok(page(
        &flash,
        AdminTemplate {
            layout: Layout::new(&flash, Some(&user)),
            total_issues: stats.total_issues,
            top_category: stats.top_category,
            flagged_issues: stats.flagged_issues,
            issues,
        },
    ))
}

/// POST /update_status_from_dashboard/{id}
async fn update_status_from_dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<StatusForm>,
) -> AppResult<Response> {
    let mut conn = state.db.get()?;
    match service::update_status(&mut conn, &user, id, &form.status) {
        Ok(()) => Ok(FlashMessage::success("Status updated successfully!").redirect("/admin")),
        Err(e @ AppError::Unauthorized) => Err(e),
        Err(e) => Ok(e.redirect_to("/admin")),
    }
}
