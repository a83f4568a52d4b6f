//! Adapter between [`GeoPoint`] sequences and Google encoded polylines.
//!
//! `geo_types` coordinates are `x = lon, y = lat`; the swap happens here and
//! nowhere else.

use geo_types::Coord;

use crate::error::TrackerError;
use crate::models::GeoPoint;

/// Every polyline stored or served by this backend uses 5 decimal digits.
pub const PRECISION: u32 = 5;

pub fn decode_polyline(encoded: &str, precision: u32) -> Result<Vec<GeoPoint>, TrackerError> {
    let line = polyline::decode_polyline(encoded, precision)
        .map_err(|e| TrackerError::Polyline(e.to_string()))?;
    Ok(line
        .into_iter()
        .map(|c| GeoPoint { lat: c.y, lon: c.x })
        .collect())
}

pub fn encode_polyline(route: &[GeoPoint], precision: u32) -> Result<String, TrackerError> {
    let coords = route.iter().map(|p| Coord { x: p.lon, y: p.lat });
    polyline::encode_coordinates(coords, precision).map_err(|e| TrackerError::Polyline(e.to_string()))
}
