use thiserror::Error;

use crate::geometry::GeometryError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("failed to read GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error("invalid GPX file: {0}")]
    InvalidGpx(String),
    #[error("polyline error: {0}")]
    Polyline(String),
    #[error("stored route {id} is unreadable: {message}")]
    CorruptRoute { id: i32, message: String },
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),
    #[error("no planned route has been uploaded")]
    NoPlannedRoute,
}
