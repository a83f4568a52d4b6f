use chrono::{DateTime, Utc};
use gpx::{Gpx, Waypoint};
use serde::Serialize;
use time::OffsetDateTime;

use crate::error::TrackerError;
use crate::geometry::total_distance_km;
use crate::models::{round2, GeoPoint, NewActivity, SOURCE_GPX_UPLOAD};
use crate::polyline_codec::{encode_polyline, PRECISION};

const UNNAMED_ACTIVITY: &str = "Unnamed Activity";

#[derive(Debug, Clone, Serialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

impl TrackPoint {
    pub fn geo_point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackStats {
    pub total_points: usize,
    pub min_elevation: Option<f64>,
    pub max_elevation: Option<f64>,
    pub elevation_gain: f64,
    pub elevation_loss: f64,
    /// Meters per second over the whole recording, 0 without timestamps.
    pub avg_speed: f64,
}

/// One recorded activity read from the first track of a GPX file.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedActivity {
    pub name: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    pub distance_km: f64,
    pub points: Vec<TrackPoint>,
    pub stats: TrackStats,
}

pub fn read_gpx(content: &[u8]) -> Result<Gpx, TrackerError> {
    Ok(gpx::read(content)?)
}

/// Every point of every segment of every track, in file order.
pub fn planned_route_points(gpx: &Gpx) -> Result<Vec<GeoPoint>, TrackerError> {
    if gpx.tracks.is_empty() {
        return Err(TrackerError::InvalidGpx("No tracks found in GPX file".into()));
    }

    let points: Vec<GeoPoint> = gpx
        .tracks
        .iter()
        .flat_map(|track| &track.segments)
        .flat_map(|segment| &segment.points)
        .map(to_geo_point)
        .collect();

    if points.is_empty() {
        return Err(TrackerError::InvalidGpx("No points found in GPX track".into()));
    }
    Ok(points)
}

pub fn parse_activity(gpx: &Gpx) -> Result<ParsedActivity, TrackerError> {
    let track = gpx
        .tracks
        .first()
        .ok_or_else(|| TrackerError::InvalidGpx("No tracks found in GPX file".into()))?;

    let points: Vec<TrackPoint> = track
        .segments
        .iter()
        .flat_map(|segment| &segment.points)
        .map(to_track_point)
        .collect();
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Err(TrackerError::InvalidGpx("No points found in GPX track".into()));
    };

    let start_time = first.time;
    let end_time = last.time;
    let duration_seconds = match (start_time, end_time) {
        (Some(start), Some(end)) => (end - start).num_seconds().max(0),
        _ => 0,
    };

    let route: Vec<GeoPoint> = points.iter().map(TrackPoint::geo_point).collect();
    let distance_km = total_distance_km(&route);
    let mut stats = elevation_stats(&points);
    stats.avg_speed = if duration_seconds > 0 {
        distance_km * 1000.0 / duration_seconds as f64
    } else {
        0.0
    };

    tracing::debug!(
        "Parsed GPX track: {} points, {:.2} km, {} s",
        points.len(),
        distance_km,
        duration_seconds
    );

    Ok(ParsedActivity {
        name: track.name.clone().unwrap_or_else(|| UNNAMED_ACTIVITY.to_string()),
        start_time,
        end_time,
        duration_seconds,
        distance_km,
        points,
        stats,
    })
}

impl ParsedActivity {
    /// Storage form of an uploaded activity; the track needs a start time to date it.
    pub fn to_new_activity(&self) -> Result<NewActivity, TrackerError> {
        let start = self
            .start_time
            .ok_or_else(|| TrackerError::InvalidGpx("GPX track has no timestamps".into()))?;
        let route: Vec<GeoPoint> = self.points.iter().map(TrackPoint::geo_point).collect();

        Ok(NewActivity {
            name: Some(self.name.clone()),
            source: SOURCE_GPX_UPLOAD.to_string(),
            date: start.date_naive(),
            start_time: Some(start),
            end_time: self.end_time,
            distance_km: Some(round2(self.distance_km)),
            duration_seconds: i32::try_from(self.duration_seconds).ok(),
            elevation_gain_m: whole_meters(Some(self.stats.elevation_gain)),
            elevation_loss_m: whole_meters(Some(self.stats.elevation_loss)),
            min_elevation_m: whole_meters(self.stats.min_elevation),
            max_elevation_m: whole_meters(self.stats.max_elevation),
            route_polyline: Some(encode_polyline(&route, PRECISION)?),
        })
    }
}

fn elevation_stats(points: &[TrackPoint]) -> TrackStats {
    let elevations: Vec<f64> = points.iter().filter_map(|p| p.elevation).collect();

    let mut gain = 0.0;
    let mut loss = 0.0;
    for pair in elevations.windows(2) {
        let diff = pair[1] - pair[0];
        if diff > 0.0 {
            gain += diff;
        } else {
            loss -= diff;
        }
    }

    TrackStats {
        total_points: points.len(),
        min_elevation: elevations.iter().copied().reduce(f64::min),
        max_elevation: elevations.iter().copied().reduce(f64::max),
        elevation_gain: gain,
        elevation_loss: loss,
        avg_speed: 0.0,
    }
}

fn whole_meters(value: Option<f64>) -> Option<i32> {
    value.filter(|v| v.is_finite()).map(|v| v.round() as i32)
}

fn to_geo_point(waypoint: &Waypoint) -> GeoPoint {
    let point = waypoint.point();
    GeoPoint {
        lat: point.y(),
        lon: point.x(),
    }
}

fn to_track_point(waypoint: &Waypoint) -> TrackPoint {
    let point = waypoint.point();
    TrackPoint {
        lat: point.y(),
        lon: point.x(),
        elevation: waypoint.elevation,
        time: waypoint.time.and_then(|t| {
            let at: OffsetDateTime = t.into();
            DateTime::from_timestamp(at.unix_timestamp(), at.nanosecond())
        }),
    }
}
