pub mod config;
pub mod database;
pub mod error;
pub mod geometry;
pub mod gpx_export;
pub mod gpx_import;
pub mod handlers;
pub mod models;
pub mod photos;
pub mod planned_route;
pub mod polyline_codec;
pub mod stats;
pub mod store;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Settings;
use crate::store::RouteStore;

/// Full-trail GPX files run to tens of thousands of points.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RouteStore>,
    pub settings: Arc<Settings>,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route(
            "/api/planned-route",
            get(handlers::get_planned_route).delete(handlers::delete_planned_route),
        )
        .route(
            "/api/planned-route/upload-gpx",
            post(handlers::upload_planned_route_gpx),
        )
        .route("/api/planned-route/progress", get(handlers::get_progress))
        .route(
            "/api/planned-route/section",
            post(handlers::activate_section).delete(handlers::clear_section),
        )
        .route(
            "/api/planned-route/section/gpx",
            get(handlers::export_section_gpx),
        )
        .route("/api/activities", get(handlers::list_activities))
        .route("/api/activities/stats", get(handlers::get_stats))
        .route("/api/activities/:id", get(handlers::get_activity))
        .route("/api/gpx/upload", post(handlers::upload_gpx))
        .route("/api/gpx/upload-and-save", post(handlers::upload_and_save_gpx))
        .route(
            "/api/photos",
            get(handlers::list_photos).post(handlers::create_photo),
        )
        .route("/api/photos/by-location", get(handlers::photos_by_location))
        .route("/api/photos/locate", post(handlers::locate_photo))
        .route("/api/photos/relink-all", post(handlers::relink_photos))
        .route("/api/photos/:id", get(handlers::get_photo))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

async fn root_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "message": format!("{} API", state.settings.app_name), "status": "running" }))
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
