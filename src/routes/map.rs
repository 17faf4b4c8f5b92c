use askama::Template;
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::flash::IncomingFlash;
use crate::geo::{self, NearbyIssue};
use crate::routes::issues::parse_coordinates;
use crate::routes::{page, Layout};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/map.html")]
pub struct MapTemplate {
    pub layout: Layout,
    pub radius_km: f64,
    pub latitude: String,
    pub longitude: String,
    pub issues: Vec<NearbyIssue>,
    pub message: Option<String>,
}

impl MapTemplate {
    pub fn notice(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

#[derive(Deserialize)]
pub struct LocationForm {
    #[serde(default)]
    pub latitude: String,
    #[serde(default)]
    pub longitude: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/map", get(map_page).post(search))
}

async fn map_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    flash: IncomingFlash,
) -> Response {
    page(
        &flash,
        MapTemplate {
            layout: Layout::new(&flash, user.as_ref()),
            radius_km: state.config.map.radius_km,
            latitude: String::new(),
            longitude: String::new(),
            issues: Vec::new(),
            message: None,
        },
    )
}

/// POST /map — issues within the configured radius of the submitted point
async fn search(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    flash: IncomingFlash,
    Form(form): Form<LocationForm>,
) -> AppResult<Response> {
    let (lat, lon) = match parse_coordinates(&form.latitude, &form.longitude) {
        Ok(coords) => coords,
        Err(e) => return Ok(e.redirect_to("/map")),
    };

    let radius_km = state.config.map.radius_km;
    let conn = state.db.get()?;
    let issues = geo::find_nearby(&conn, lat, lon, radius_km)?;
    tracing::debug!(lat, lon, found = issues.len(), "Proximity search");

    let message = issues
        .is_empty()
        .then(|| format!("No issues found within {} km radius.", radius_km));

    Ok(page(
        &flash,
        MapTemplate {
            layout: Layout::new(&flash, user.as_ref()),
            radius_km,
            latitude: form.latitude,
            longitude: form.longitude,
            issues,
            message,
        },
    ))
}
