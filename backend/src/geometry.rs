//! Distance and slicing primitives over decoded routes.
//!
//! Every function here is pure: the HTTP layer decodes a route, builds the
//! cumulative table once, and hands both to the lookups below.

use crate::models::GeoPoint;

// Names the request handlers use for the engine.
pub use self::{
    cumulative_distances as compute_cumulative_table, slice_route as slice_for_display,
    total_distance_km as compute_total_distance,
};

pub const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("invalid range: start {start} must be before end {end}")]
    InvalidRange { start: f64, end: f64 },
    #[error("requested range {start_km:.2}-{end_km:.2} km is outside the route (0-{total_km:.2} km)")]
    OutOfBounds {
        start_km: f64,
        end_km: f64,
        total_km: f64,
    },
    #[error("route needs at least 2 points, got {0}")]
    EmptyRoute(usize),
}

/// Great-circle distance in kilometers (haversine, spherical Earth).
///
/// The haversine term is clamped to `[0, 1]` so rounding near coincident or
/// antipodal points never pushes `asin` out of its domain.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_KM * h.clamp(0.0, 1.0).sqrt().asin()
}

pub fn total_distance_km(route: &[GeoPoint]) -> f64 {
    route.windows(2).map(|w| haversine_km(w[0], w[1])).sum()
}

/// Running distance from the first point, one entry per point.
pub fn cumulative_distances(route: &[GeoPoint]) -> Vec<f64> {
    let mut table = Vec::with_capacity(route.len());
    if route.is_empty() {
        return table;
    }

    let mut travelled = 0.0;
    table.push(travelled);
    for pair in route.windows(2) {
        travelled += haversine_km(pair[0], pair[1]);
        table.push(travelled);
    }
    table
}

/// Index of the point whose cumulative distance is nearest to `target_km`.
///
/// Targets at or below zero map to the first point and targets at or beyond
/// the end map to the last one; that clamping is policy, not an error.
/// Equal deltas resolve to the lower index.
pub fn find_index_by_distance(table: &[f64], target_km: f64) -> usize {
    let Some(&last) = table.last() else {
        return 0;
    };
    if target_km <= 0.0 {
        return 0;
    }
    if target_km >= last {
        return table.len() - 1;
    }

    // table[0] == 0 < target < last, so 1 <= upper <= len - 1
    let upper = table.partition_point(|&d| d < target_km);
    if upper == 0 {
        return 0;
    }
    let lower = upper - 1;

    let below = target_km - table[lower];
    let above = table[upper] - target_km;
    if below <= above { lower } else { upper }
}

/// Inclusive `route[start_index..=end_index]` after clamping both ends to the route.
pub fn slice_route(
    route: &[GeoPoint],
    start_index: usize,
    end_index: usize,
) -> Result<Vec<GeoPoint>, GeometryError> {
    let Some(last) = route.len().checked_sub(1) else {
        return Err(GeometryError::InvalidRange {
            start: start_index as f64,
            end: end_index as f64,
        });
    };
    let end = end_index.min(last);
    if start_index >= end {
        return Err(GeometryError::InvalidRange {
            start: start_index as f64,
            end: end as f64,
        });
    }

    Ok(route[start_index..=end].to_vec())
}

/// Resolves a kilometer range to point indices.
///
/// Validates `0 <= start_km < end_km <= total` against the table's last entry.
pub fn resolve_section(
    table: &[f64],
    start_km: f64,
    end_km: f64,
) -> Result<(usize, usize), GeometryError> {
    if table.len() < 2 {
        return Err(GeometryError::EmptyRoute(table.len()));
    }
    if !start_km.is_finite() || !end_km.is_finite() || start_km >= end_km {
        return Err(GeometryError::InvalidRange {
            start: start_km,
            end: end_km,
        });
    }

    let total_km = table[table.len() - 1];
    if start_km < 0.0 || end_km > total_km {
        return Err(GeometryError::OutOfBounds {
            start_km,
            end_km,
            total_km,
        });
    }

    let start_index = find_index_by_distance(table, start_km);
    let end_index = find_index_by_distance(table, end_km);
    if start_index >= end_index {
        return Err(GeometryError::InvalidRange {
            start: start_index as f64,
            end: end_index as f64,
        });
    }

    tracing::debug!(
        "Resolved {:.2}-{:.2} km to points {}..={} of {}",
        start_km,
        end_km,
        start_index,
        end_index,
        table.len()
    );
    Ok((start_index, end_index))
}

/// Closest track point to `target`, as `(distance_km, index)`.
pub fn closest_point_on_track(target: GeoPoint, track: &[GeoPoint]) -> Option<(f64, usize)> {
    track
        .iter()
        .enumerate()
        .map(|(i, &p)| (haversine_km(target, p), i))
        .min_by(|a, b| a.0.total_cmp(&b.0))
}
