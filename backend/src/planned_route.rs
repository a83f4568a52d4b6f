//! The planned trail and its active section.
//!
//! The store keeps indices, never sliced geometry: every read decodes the
//! full route and slices it again, so a section always follows the route it
//! was cut from.

use shared::{
    ActivateSectionRequest, FullRouteView, GpxExport, PlannedRouteView, SectionView, UploadSummary,
};

use crate::error::TrackerError;
use crate::geometry::{
    compute_cumulative_table, compute_total_distance, resolve_section, slice_for_display,
    GeometryError,
};
use crate::gpx_export::encode_route_as_gpx;
use crate::gpx_import::{planned_route_points, read_gpx};
use crate::models::{
    floor2, round2, GeoPoint, NewPlannedRoute, NewRouteSection, PlannedRoute, RouteSection,
    UploadParams,
};
use crate::polyline_codec::{decode_polyline, encode_polyline, PRECISION};
use crate::store::RouteStore;

const DEFAULT_SECTION_NAME: &str = "Te Araroa Section";

/// Parses an uploaded GPX file and makes it the canonical route.
pub async fn upload_planned_route(
    store: &dyn RouteStore,
    content: &[u8],
    params: UploadParams,
) -> Result<UploadSummary, TrackerError> {
    let gpx = read_gpx(content)?;
    let points = planned_route_points(&gpx)?;
    let route_polyline = encode_polyline(&points, PRECISION)?;
    // Measured on the stored geometry and rounded down, so `0..=distance_km`
    // is always a valid section range
    let stored = decode_polyline(&route_polyline, PRECISION)?;
    let distance_km = floor2(compute_total_distance(&stored));

    let saved = store
        .replace_full_route(NewPlannedRoute {
            section_name: Some(
                params
                    .section_name
                    .unwrap_or_else(|| DEFAULT_SECTION_NAME.to_string()),
            ),
            section_order: Some(1),
            route_polyline,
            distance_km: Some(distance_km),
            description: params.description,
        })
        .await?;

    tracing::info!(
        "Planned route uploaded: {} points, {:.2} km",
        points.len(),
        distance_km
    );

    Ok(UploadSummary {
        id: saved.id,
        section_name: saved.section_name.unwrap_or_default(),
        distance_km,
        points_count: points.len(),
    })
}

/// Turns a kilometer range on `route` into a section ready to store.
pub fn plan_section(
    full_route_id: i32,
    route: &[GeoPoint],
    req: &ActivateSectionRequest,
) -> Result<NewRouteSection, TrackerError> {
    if route.len() < 2 {
        return Err(GeometryError::EmptyRoute(route.len()).into());
    }

    let table = compute_cumulative_table(route);
    let (start_index, end_index) = resolve_section(&table, req.start_km, req.end_km)?;

    Ok(NewRouteSection {
        full_route_id,
        section_name: req.name.clone(),
        start_point_index: index_to_i32(start_index)?,
        end_point_index: index_to_i32(end_index)?,
        start_distance_km: req.start_km,
        end_distance_km: req.end_km,
        description: req.description.clone(),
    })
}

pub async fn activate_section(
    store: &dyn RouteStore,
    req: &ActivateSectionRequest,
) -> Result<SectionView, TrackerError> {
    let full = store
        .full_route()
        .await?
        .ok_or(TrackerError::NoPlannedRoute)?;
    let route = stored_route(&full)?;

    let section = plan_section(full.id, &route, req)?;
    let saved = store.activate_section(section).await?;

    tracing::info!(
        "Active section is now '{}': points {}..={} ({:.2}-{:.2} km)",
        saved.section_name,
        saved.start_point_index,
        saved.end_point_index,
        saved.start_distance_km,
        saved.end_distance_km
    );
    section_summary(&saved)
}

pub async fn clear_section(store: &dyn RouteStore) -> Result<(), TrackerError> {
    store.clear_active_section().await?;
    Ok(())
}

/// The active section if one is set and still slices cleanly, otherwise the full route.
pub async fn read_planned_route(store: &dyn RouteStore) -> Result<PlannedRouteView, TrackerError> {
    let Some(full) = store.full_route().await? else {
        return Ok(PlannedRouteView::FullRoute { routes: Vec::new() });
    };

    if let Some(section) = store.active_section().await? {
        match section_view(&full, &section) {
            Ok(view) => return Ok(view),
            Err(err) => tracing::warn!(
                "Active section {} no longer fits route {}, serving full route: {}",
                section.id,
                full.id,
                err
            ),
        }
    }

    Ok(PlannedRouteView::FullRoute {
        routes: vec![full_route_view(&full)],
    })
}

/// GPX download of whatever `read_planned_route` would show.
pub async fn export_gpx(store: &dyn RouteStore) -> Result<GpxExport, TrackerError> {
    let full = store
        .full_route()
        .await?
        .ok_or(TrackerError::NoPlannedRoute)?;
    let route = stored_route(&full)?;

    let active = store.active_section().await?;
    let sliced = active
        .as_ref()
        .map(|section| slice_section(&route, section).map(|points| (section, points)));

    let (name, points) = match sliced {
        Some(Ok((section, points))) => (section.section_name.clone(), points),
        Some(Err(err)) => {
            tracing::warn!("Exporting full route, active section is stale: {}", err);
            (full_route_name(&full), route)
        }
        None => (full_route_name(&full), route),
    };

    Ok(GpxExport {
        gpx_base64: encode_route_as_gpx(&name, &points)?,
        name,
    })
}

fn section_view(full: &PlannedRoute, section: &RouteSection) -> Result<PlannedRouteView, TrackerError> {
    let route = stored_route(full)?;
    let points = slice_section(&route, section)?;

    Ok(PlannedRouteView::Section {
        route_polyline: encode_polyline(&points, PRECISION)?,
        distance_km: round2(compute_total_distance(&points)),
        point_count: points.len(),
        section: section_summary(section)?,
    })
}

fn section_summary(section: &RouteSection) -> Result<SectionView, TrackerError> {
    Ok(SectionView {
        id: section.id,
        full_route_id: section.full_route_id,
        name: section.section_name.clone(),
        start_index: points_index(section.start_point_index)?,
        end_index: points_index(section.end_point_index)?,
        start_distance_km: section.start_distance_km,
        end_distance_km: section.end_distance_km,
        description: section.description.clone(),
    })
}

/// Decodes the route as stored; a failure here is corrupt data, not bad input.
fn stored_route(full: &PlannedRoute) -> Result<Vec<GeoPoint>, TrackerError> {
    decode_polyline(&full.route_polyline, PRECISION).map_err(|err| match err {
        TrackerError::Polyline(message) => TrackerError::CorruptRoute {
            id: full.id,
            message,
        },
        other => other,
    })
}

fn slice_section(route: &[GeoPoint], section: &RouteSection) -> Result<Vec<GeoPoint>, TrackerError> {
    let start = points_index(section.start_point_index)?;
    let end = points_index(section.end_point_index)?;
    Ok(slice_for_display(route, start, end)?)
}

fn full_route_view(full: &PlannedRoute) -> FullRouteView {
    FullRouteView {
        id: full.id,
        section_name: full.section_name.clone(),
        section_order: full.section_order,
        route_polyline: full.route_polyline.clone(),
        distance_km: full.distance_km,
        description: full.description.clone(),
    }
}

fn full_route_name(full: &PlannedRoute) -> String {
    full.section_name
        .clone()
        .unwrap_or_else(|| DEFAULT_SECTION_NAME.to_string())
}

fn points_index(stored: i32) -> Result<usize, TrackerError> {
    usize::try_from(stored).map_err(|_| {
        GeometryError::InvalidRange {
            start: f64::from(stored),
            end: f64::from(stored),
        }
        .into()
    })
}

fn index_to_i32(index: usize) -> Result<i32, TrackerError> {
    i32::try_from(index).map_err(|_| {
        GeometryError::OutOfBounds {
            start_km: index as f64,
            end_km: index as f64,
            total_km: f64::from(i32::MAX),
        }
        .into()
    })
}
