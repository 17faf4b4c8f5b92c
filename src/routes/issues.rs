use askama::Template;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use chrono::{NaiveDateTime, Utc};

use crate::db::models::{Issue, IssueSummary};
use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::flash::{FlashMessage, IncomingFlash};
use crate::issues::service::{self, NewIssue};
use crate::issues::uploads::{UploadedImage, ALLOWED_EXTENSIONS, MAX_IMAGES_PER_ISSUE};
use crate::routes::{page, Layout};
use crate::state::AppState;

// --- View structs ---

pub struct HistoryRow {
    pub status: String,
    pub timestamp: String,
    pub relative: String,
}

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/report.html")]
pub struct ReportTemplate {
    pub layout: Layout,
    pub max_images: usize,
    pub accept: String,
}

#[derive(Template)]
#[template(path = "pages/issues.html")]
pub struct IssuesTemplate {
    pub layout: Layout,
    pub issues: Vec<IssueSummary>,
}

#[derive(Template)]
#[template(path = "pages/issue_detail.html")]
pub struct IssueDetailTemplate {
    pub layout: Layout,
    pub issue: Issue,
    pub images: Vec<String>,
    pub history: Vec<HistoryRow>,
}

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub layout: Layout,
    pub name: String,
    pub email: String,
    pub issues: Vec<IssueSummary>,
}

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/report",
            get(report_page)
                .post(submit_report)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/issues", get(list_issues))
        .route("/issue/{id}", get(issue_detail))
        .route("/flag/{id}", post(flag_issue))
        .route("/profile", get(profile))
}

// --- Handlers ---

async fn report_page(MaybeUser(user): MaybeUser, flash: IncomingFlash) -> Response {
    if user.is_none() {
        return FlashMessage::error("Please login to report an issue.").redirect("/login");
    }

    let accept = ALLOWED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(",");

    page(
        &flash,
        ReportTemplate {
            layout: Layout::new(&flash, user.as_ref()),
            max_images: MAX_IMAGES_PER_ISSUE,
            accept,
        },
    )
}

async fn submit_report(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let Some(user) = user else {
        return Ok(FlashMessage::error("Please login to report an issue.").redirect("/login"));
    };

    let mut title = String::new();
    let mut description = String::new();
    let mut category = String::new();
    let mut latitude = String::new();
    let mut longitude = String::new();
    let mut images = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::debug!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read multipart data: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "images" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read image data: {}", e))
                })?;
                // Browsers send an empty, unnamed part when no file is chosen
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                images.push(UploadedImage::new(file_name, bytes.to_vec()));
            }
            "title" | "description" | "category" | "latitude" | "longitude" => {
                let text = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read {} field: {}", name, e))
                })?;
                match name.as_str() {
                    "title" => title = text,
                    "description" => description = text,
                    "category" => category = text,
                    "latitude" => latitude = text,
                    _ => longitude = text,
                }
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", name);
            }
        }
    }

    let (latitude, longitude) = match parse_coordinates(&latitude, &longitude) {
        Ok(coords) => coords,
        Err(e) => return Ok(e.redirect_to("/report")),
    };

    let new = NewIssue {
        title,
        description,
        category,
        latitude,
        longitude,
    };

    let mut conn = state.db.get()?;
    match service::create_issue(&mut conn, &state.images, &user, new, images) {
        Ok(outcome) => Ok(FlashMessage::success(outcome.summary()).redirect("/issues")),
        Err(e) => Ok(e.redirect_to("/report")),
    }
}

async fn list_issues(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    flash: IncomingFlash,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let issues = service::list_issues(&conn)?;

    Ok(page(
        &flash,
        IssuesTemplate {
            layout: Layout::new(&flash, user.as_ref()),
            issues,
        },
    ))
}

async fn issue_detail(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    flash: IncomingFlash,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let detail = service::get_issue_detail(&conn, id)?;

    let history = detail
        .status_history
        .into_iter()
        .map(|entry| HistoryRow {
            relative: parse_and_format_time(&entry.timestamp),
            status: entry.status,
            timestamp: entry.timestamp,
        })
        .collect();

    Ok(page(
        &flash,
        IssueDetailTemplate {
            layout: Layout::new(&flash, user.as_ref()),
            issue: detail.issue,
            images: detail.image_paths,
            history,
        },
    ))
}

async fn flag_issue(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Response> {
    let conn = state.db.get()?;
    service::flag_issue(&conn, id)?;
    Ok(FlashMessage::success("Issue flagged successfully!").redirect("/issues"))
}

async fn profile(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    flash: IncomingFlash,
) -> AppResult<Response> {
    let Some(user) = user else {
        return Ok(FlashMessage::error("Please login to view profile.").redirect("/login"));
    };

    let conn = state.db.get()?;
    let issues = service::list_issues_for_user(&conn, user.id)?;

    Ok(page(
        &flash,
        ProfileTemplate {
            layout: Layout::new(&flash, Some(&user)),
            name: user.name.clone(),
            email: user.email.clone(),
            issues,
        },
    ))
}

// --- Form parsing ---

pub(crate) fn parse_coordinates(latitude: &str, longitude: &str) -> AppResult<(f64, f64)> {
    let invalid =
        || AppError::Validation("Latitude and longitude must be valid coordinates.".into());
    let lat: f64 = latitude.trim().parse().map_err(|_| invalid())?;
    let lon: f64 = longitude.trim().parse().map_err(|_| invalid())?;
    service::validate_coordinates(lat, lon)?;
    Ok((lat, lon))
}

// --- Time formatting ---

fn parse_and_format_time(db_time: &str) -> String {
    NaiveDateTime::parse_from_str(db_time, "%Y-%m-%d %H:%M:%S")
        .map(|dt| format_relative_time(&dt))
        .unwrap_or_else(|_| db_time.to_string())
}

pub fn format_relative_time(dt: &NaiveDateTime) -> String {
    let now = Utc::now().naive_utc();
    let diff = now.signed_duration_since(*dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }

    dt.format("%b %-d, %Y").to_string()
}

// --- Tests ---
