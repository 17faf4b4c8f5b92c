//! Great-circle distance and the radius search behind the map page.

use rusqlite::Connection;
use serde::Serialize;

use crate::error::AppResult;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

pub const DEFAULT_RADIUS_KM: f64 = 5.0;

/// Haversine distance in kilometres between two points given in degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair above 1 for antipodal points
    let c = 2.0 * a.min(1.0).sqrt().asin();

    EARTH_RADIUS_KM * c
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyIssue {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_km: f64,
}

/// Every issue within `radius_km` of the point, nearest first.
///
/// Linear scan over all issues; the boundary is inclusive.
pub fn find_nearby(
    conn: &Connection,
    lat: f64,
    lon: f64,
    radius_km: f64,
) -> AppResult<Vec<NearbyIssue>> {
    let mut stmt =
        conn.prepare("SELECT id, title, category, latitude, longitude FROM issues ORDER BY id")?;

    let mut nearby = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter_map(|(id, title, category, latitude, longitude)| {
            let distance_km = haversine_km(lat, lon, latitude, longitude);
            (distance_km <= radius_km).then_some(NearbyIssue {
                id,
                title,
                category,
                latitude,
                longitude,
                distance_km,
            })
        })
        .collect::<Vec<_>>();

    nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    Ok(nearby)
}
