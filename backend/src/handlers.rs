// Handlers for the trail tracker API
// Every handler is a thin translation between HTTP and the workflow modules

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    ActivateSectionRequest, ApiError, GpxExport, PhotoLocateRequest, PhotoLocateResponse,
    PlannedRouteView, ProgressResponse, RelinkSummary, SectionView, StatsResponse, UploadSummary,
};

use crate::error::TrackerError;
use crate::gpx_import::{parse_activity, read_gpx, ParsedActivity};
use crate::models::{round2, Activity, DateRange, NewPhoto, Photo, PhotoLocation, UploadParams};
use crate::store::StoreError;
use crate::{photos, planned_route, stats, AppState};

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

const ROUTE_CACHE_CONTROL: &str = "public, max-age=3600";
const PROGRESS_CACHE_CONTROL: &str = "public, max-age=300";
const PHOTO_MARKERS_CACHE_CONTROL: &str = "public, max-age=300";

#[derive(Debug, Serialize)]
pub struct UploadResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub payload: T,
}

#[derive(Debug, Serialize)]
pub struct RouteUpload {
    pub route: UploadSummary,
}

#[derive(Debug, Serialize)]
pub struct ParsedUpload {
    pub activity: ParsedActivity,
}

#[derive(Debug, Serialize)]
pub struct SavedActivitySummary {
    pub id: i32,
    pub name: String,
    pub start_time: Option<DateTime<Utc>>,
    pub distance_km: f64,
    pub duration_minutes: f64,
    pub elevation_gain_m: f64,
    pub points_count: usize,
}

#[derive(Debug, Serialize)]
pub struct SavedUpload {
    pub activity: SavedActivitySummary,
}

#[derive(Debug, Deserialize)]
pub struct RelinkParams {
    pub max_distance_km: Option<f64>,
}

/// GET /api/planned-route - Active section, or the full route when none is set
pub async fn get_planned_route(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let view: PlannedRouteView = planned_route::read_planned_route(state.store.as_ref())
        .await
        .map_err(to_api_error)?;

    Ok(([(header::CACHE_CONTROL, ROUTE_CACHE_CONTROL)], Json(view)))
}

/// POST /api/planned-route/upload-gpx - Replace the planned route with a GPX file body
pub async fn upload_planned_route_gpx(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> ApiResult<Json<UploadResponse<RouteUpload>>> {
    let summary = planned_route::upload_planned_route(state.store.as_ref(), &body, params)
        .await
        .map_err(to_api_error)?;

    Ok(Json(UploadResponse {
        success: true,
        message: "Planned route uploaded successfully".to_string(),
        payload: RouteUpload { route: summary },
    }))
}

/// DELETE /api/planned-route - Remove the planned route and its sections
pub async fn delete_planned_route(State(state): State<AppState>) -> ApiResult<StatusCode> {
    let deleted = state
        .store
        .delete_full_route()
        .await
        .map_err(|e| to_api_error(e.into()))?;

    tracing::info!("Cleared planned route ({} deleted)", deleted);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/planned-route/progress - Completed distance against the planned route
pub async fn get_progress(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let planned = state
        .store
        .full_route()
        .await
        .map_err(|e| to_api_error(e.into()))?;
    let activities = state
        .store
        .activities(DateRange::default())
        .await
        .map_err(|e| to_api_error(e.into()))?;

    let progress: ProgressResponse = stats::trail_progress(planned.as_ref(), &activities);
    Ok(([(header::CACHE_CONTROL, PROGRESS_CACHE_CONTROL)], Json(progress)))
}

/// POST /api/planned-route/section - Activate a section by kilometer range
pub async fn activate_section(
    State(state): State<AppState>,
    Json(req): Json<ActivateSectionRequest>,
) -> ApiResult<Json<SectionView>> {
    planned_route::activate_section(state.store.as_ref(), &req)
        .await
        .map(Json)
        .map_err(to_api_error)
}

/// DELETE /api/planned-route/section - Go back to showing the full route
pub async fn clear_section(State(state): State<AppState>) -> ApiResult<StatusCode> {
    planned_route::clear_section(state.store.as_ref())
        .await
        .map_err(to_api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/planned-route/section/gpx - Download what the map is showing
pub async fn export_section_gpx(State(state): State<AppState>) -> ApiResult<Json<GpxExport>> {
    planned_route::export_gpx(state.store.as_ref())
        .await
        .map(Json)
        .map_err(to_api_error)
}

/// GET /api/activities - List activities, optionally filtered by date range
pub async fn list_activities(
    State(state): State<AppState>,
    Query(range): Query<DateRange>,
) -> ApiResult<Json<Vec<Activity>>> {
    state
        .store
        .activities(range)
        .await
        .map(Json)
        .map_err(|e| to_api_error(e.into()))
}

/// GET /api/activities/stats - Summary statistics over every activity
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let activities = state
        .store
        .activities(DateRange::default())
        .await
        .map_err(|e| to_api_error(e.into()))?;

    Ok(Json(stats::activity_stats(&activities)))
}

/// GET /api/activities/:id - Get a single activity
pub async fn get_activity(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Activity>> {
    state
        .store
        .activity(id)
        .await
        .map(Json)
        .map_err(|e| to_api_error(e.into()))
}

/// POST /api/gpx/upload - Parse a GPX file without saving it
pub async fn upload_gpx(body: Bytes) -> ApiResult<Json<UploadResponse<ParsedUpload>>> {
    let gpx = read_gpx(&body).map_err(to_api_error)?;
    let activity = parse_activity(&gpx).map_err(to_api_error)?;

    Ok(Json(UploadResponse {
        success: true,
        message: format!("GPX track '{}' parsed successfully", activity.name),
        payload: ParsedUpload { activity },
    }))
}

/// POST /api/gpx/upload-and-save - Parse a GPX file and store it as an activity
pub async fn upload_and_save_gpx(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<UploadResponse<SavedUpload>>> {
    let gpx = read_gpx(&body).map_err(to_api_error)?;
    let parsed = parse_activity(&gpx).map_err(to_api_error)?;
    let new_activity = parsed.to_new_activity().map_err(to_api_error)?;

    let saved = state
        .store
        .insert_activity(new_activity)
        .await
        .map_err(|e| to_api_error(e.into()))?;

    Ok(Json(UploadResponse {
        success: true,
        message: format!("Activity '{}' saved successfully", parsed.name),
        payload: SavedUpload {
            activity: SavedActivitySummary {
                id: saved.id,
                name: parsed.name,
                start_time: parsed.start_time,
                distance_km: round2(parsed.distance_km),
                duration_minutes: (parsed.duration_seconds as f64 / 60.0 * 10.0).round() / 10.0,
                elevation_gain_m: parsed.stats.elevation_gain,
                points_count: parsed.stats.total_points,
            },
        },
    }))
}

/// POST /api/photos/locate - Match a photo's coordinates to the nearest activity
pub async fn locate_photo(
    State(state): State<AppState>,
    Json(req): Json<PhotoLocateRequest>,
) -> ApiResult<Json<PhotoLocateResponse>> {
    let photo = photos::validate_location(req.lat, req.lon).map_err(to_api_error)?;

    let activities = state
        .store
        .activities(DateRange::default())
        .await
        .map_err(|e| to_api_error(e.into()))?;

    let matched = stats::nearest_activity(photo, &activities, state.settings.max_photo_distance_km);
    Ok(Json(PhotoLocateResponse {
        activity_id: matched.map(|(id, _)| id),
        distance_km: matched.map(|(_, d)| d),
    }))
}

/// GET /api/photos - Every photo record, most recently taken first
pub async fn list_photos(State(state): State<AppState>) -> ApiResult<Json<Vec<Photo>>> {
    state
        .store
        .photos()
        .await
        .map(Json)
        .map_err(|e| to_api_error(e.into()))
}

/// POST /api/photos - Register photo metadata, linking it to the nearest activity
pub async fn create_photo(
    State(state): State<AppState>,
    Json(photo): Json<NewPhoto>,
) -> ApiResult<Json<Photo>> {
    photos::register_photo(
        state.store.as_ref(),
        photo,
        state.settings.max_photo_distance_km,
    )
    .await
    .map(Json)
    .map_err(to_api_error)
}

/// GET /api/photos/by-location - Geotagged photos as map markers
pub async fn photos_by_location(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let tagged = state
        .store
        .photos_with_location()
        .await
        .map_err(|e| to_api_error(e.into()))?;

    let markers: Vec<PhotoLocation> = tagged.iter().filter_map(PhotoLocation::from_photo).collect();
    Ok(([(header::CACHE_CONTROL, PHOTO_MARKERS_CACHE_CONTROL)], Json(markers)))
}

/// GET /api/photos/:id - Get a single photo record
pub async fn get_photo(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Photo>> {
    state
        .store
        .photo(id)
        .await
        .map(Json)
        .map_err(|e| to_api_error(e.into()))
}

/// POST /api/photos/relink-all - Recompute the activity of every geotagged photo
pub async fn relink_photos(
    State(state): State<AppState>,
    Query(params): Query<RelinkParams>,
) -> ApiResult<Json<RelinkSummary>> {
    let max_distance_km = params
        .max_distance_km
        .unwrap_or(state.settings.max_photo_distance_km);

    photos::relink_all(state.store.as_ref(), max_distance_km)
        .await
        .map(Json)
        .map_err(to_api_error)
}

/// Convert TrackerError to API error response
fn to_api_error(err: TrackerError) -> (StatusCode, Json<ApiError>) {
    let status = match &err {
        TrackerError::Geometry(_)
        | TrackerError::Gpx(_)
        | TrackerError::InvalidGpx(_)
        | TrackerError::Polyline(_)
        | TrackerError::InvalidCoordinates(_) => StatusCode::BAD_REQUEST,
        TrackerError::NoPlannedRoute | TrackerError::Store(StoreError::NotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        TrackerError::Store(StoreError::Connection(_)) => StatusCode::SERVICE_UNAVAILABLE,
        TrackerError::CorruptRoute { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    } else {
        tracing::debug!("Request rejected ({}): {}", status, err);
    }

    (
        status,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}
