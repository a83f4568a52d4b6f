use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateSectionRequest {
    pub start_km: f64,
    pub end_km: f64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionView {
    pub id: i32,
    pub full_route_id: i32,
    pub name: String,
    pub start_index: usize,
    pub end_index: usize,
    pub start_distance_km: f64,
    pub end_distance_km: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullRouteView {
    pub id: i32,
    pub section_name: Option<String>,
    pub section_order: Option<i32>,
    pub route_polyline: String,
    pub distance_km: Option<f64>,
    pub description: Option<String>,
}

/// What the map shows: the active section when one is set, otherwise the full route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlannedRouteView {
    Section {
        section: SectionView,
        route_polyline: String,
        distance_km: f64,
        point_count: usize,
    },
    FullRoute {
        routes: Vec<FullRouteView>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSummary {
    pub id: i32,
    pub section_name: String,
    pub distance_km: f64,
    pub points_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub total_planned_km: f64,
    pub completed_km: f64,
    pub progress_percent: f64,
    pub days_on_trail: usize,
    pub activities_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_distance_km: f64,
    pub total_elevation_m: i64,
    pub total_days: usize,
    pub avg_distance_per_day: f64,
    pub longest_day_km: f64,
    pub highest_elevation_day_m: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoLocateRequest {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoLocateResponse {
    pub activity_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

/// Outcome of matching every geotagged photo against the recorded activities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RelinkSummary {
    pub linked: usize,
    pub unlinked: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpxExport {
    pub name: String,
    pub gpx_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}
