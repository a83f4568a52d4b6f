use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub use shared::GeoPoint;

/// The canonical full trail, stored as a precision-5 polyline.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlannedRoute {
    pub id: i32,
    pub section_name: Option<String>,
    pub section_order: Option<i32>,
    pub route_polyline: String,
    pub distance_km: Option<f64>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPlannedRoute {
    pub section_name: Option<String>,
    pub section_order: Option<i32>,
    pub route_polyline: String,
    pub distance_km: Option<f64>,
    pub description: Option<String>,
}

/// A sub-range of the full route. Indices are inclusive point positions.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RouteSection {
    pub id: i32,
    pub full_route_id: i32,
    pub section_name: String,
    pub start_point_index: i32,
    pub end_point_index: i32,
    pub start_distance_km: f64,
    pub end_distance_km: f64,
    pub is_active: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRouteSection {
    pub full_route_id: i32,
    pub section_name: String,
    pub start_point_index: i32,
    pub end_point_index: i32,
    pub start_distance_km: f64,
    pub end_distance_km: f64,
    pub description: Option<String>,
}

pub const SOURCE_GARMIN: &str = "garmin";
pub const SOURCE_GPX_UPLOAD: &str = "gpx_upload";
pub const SOURCE_STRAVA: &str = "strava";

/// A recorded day on the trail, whichever source it came from.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: i32,
    pub name: Option<String>,
    pub source: String,
    pub date: NaiveDate,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub distance_km: Option<f64>,
    pub elevation_gain_m: Option<i32>,
    pub elevation_loss_m: Option<i32>,
    pub min_elevation_m: Option<i32>,
    pub max_elevation_m: Option<i32>,
    pub duration_seconds: Option<i32>,
    pub route_polyline: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewActivity {
    pub name: Option<String>,
    pub source: String,
    pub date: NaiveDate,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub distance_km: Option<f64>,
    pub elevation_gain_m: Option<i32>,
    pub elevation_loss_m: Option<i32>,
    pub min_elevation_m: Option<i32>,
    pub max_elevation_m: Option<i32>,
    pub duration_seconds: Option<i32>,
    pub route_polyline: Option<String>,
}

/// Inclusive date filter for activity listings.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DateRange {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date.is_none_or(|start| date >= start)
            && self.end_date.is_none_or(|end| date <= end)
    }
}

/// Metadata of a trail photo. The image file itself lives outside this service.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Photo {
    pub id: i32,
    pub filename: String,
    pub caption: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_m: Option<f64>,
    pub date_taken: Option<DateTime<Utc>>,
    pub activity_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Photo {
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPhoto {
    pub filename: String,
    pub caption: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_m: Option<f64>,
    pub date_taken: Option<DateTime<Utc>>,
    /// Filled in by the nearest-activity match when the photo is registered.
    #[serde(skip)]
    pub activity_id: Option<i32>,
}

/// Map marker for a geotagged photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoLocation {
    pub id: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub caption: Option<String>,
    pub date_taken: Option<DateTime<Utc>>,
    pub activity_id: Option<i32>,
}

impl PhotoLocation {
    pub fn from_photo(photo: &Photo) -> Option<Self> {
        let point = photo.location()?;
        Some(Self {
            id: photo.id,
            latitude: point.lat,
            longitude: point.lon,
            caption: photo.caption.clone(),
            date_taken: photo.date_taken,
            activity_id: photo.activity_id,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadParams {
    pub section_name: Option<String>,
    pub description: Option<String>,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Two decimals, never above `value`.
pub fn floor2(value: f64) -> f64 {
    (value * 100.0).floor() / 100.0
}
