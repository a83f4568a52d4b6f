use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};

use crate::error::TrackerError;
use crate::models::GeoPoint;

const CREATOR: &str = "trail_tracker";

/// Renders `path` as a single-track GPX 1.1 document, base64 encoded.
pub fn encode_route_as_gpx(name: &str, path: &[GeoPoint]) -> Result<String, TrackerError> {
    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.into()),
        ..Default::default()
    };
    let mut track = Track {
        name: Some(name.into()),
        ..Default::default()
    };

    let mut segment = TrackSegment::new();
    segment.points.extend(path.iter().map(to_waypoint));
    track.segments.push(segment);
    gpx.tracks.push(track);

    let mut buffer = Vec::new();
    gpx::write(&gpx, &mut buffer)?;
    Ok(BASE64.encode(buffer))
}

fn to_waypoint(point: &GeoPoint) -> Waypoint {
    Waypoint::new(Point::new(point.lon, point.lat))
}
