//! Photo records and their link to the activity they were taken on.
//!
//! A photo belongs to the activity whose track passes closest to it, within
//! the configured distance. Links are set when a photo is registered and can
//! be recomputed for every photo after new activities arrive.

use shared::RelinkSummary;

use crate::error::TrackerError;
use crate::models::{DateRange, GeoPoint, NewPhoto, Photo};
use crate::stats::nearest_activity;
use crate::store::RouteStore;

/// Checks a coordinate pair the way photo metadata and lookups receive it.
pub fn validate_location(lat: f64, lon: f64) -> Result<GeoPoint, TrackerError> {
    let point = GeoPoint::new(lat, lon);
    if point.is_valid() {
        Ok(point)
    } else {
        Err(TrackerError::InvalidCoordinates(format!("lat {lat}, lon {lon}")))
    }
}

/// Stores a photo record, linked to its nearest activity when it is geotagged.
pub async fn register_photo(
    store: &dyn RouteStore,
    mut photo: NewPhoto,
    max_distance_km: f64,
) -> Result<Photo, TrackerError> {
    let location = match (photo.latitude, photo.longitude) {
        (Some(lat), Some(lon)) => Some(validate_location(lat, lon)?),
        (None, None) => None,
        _ => {
            return Err(TrackerError::InvalidCoordinates(
                "latitude and longitude must be given together".into(),
            ))
        }
    };

    photo.activity_id = match location {
        Some(point) => {
            let activities = store.activities(DateRange::default()).await?;
            nearest_activity(point, &activities, max_distance_km).map(|(id, _)| id)
        }
        None => None,
    };

    let saved = store.insert_photo(photo).await?;
    tracing::info!(
        "Photo registered: {} (ID: {}, activity: {:?})",
        saved.filename,
        saved.id,
        saved.activity_id
    );
    Ok(saved)
}

/// Re-matches every geotagged photo; photos with no activity in range are unlinked.
pub async fn relink_all(
    store: &dyn RouteStore,
    max_distance_km: f64,
) -> Result<RelinkSummary, TrackerError> {
    let photos = store.photos_with_location().await?;
    if photos.is_empty() {
        return Ok(RelinkSummary::default());
    }
    let activities = store.activities(DateRange::default()).await?;

    let mut summary = RelinkSummary {
        total: photos.len(),
        ..RelinkSummary::default()
    };
    for photo in &photos {
        let Some(point) = photo.location() else {
            continue;
        };
        let matched = nearest_activity(point, &activities, max_distance_km).map(|(id, _)| id);
        match matched {
            Some(_) => summary.linked += 1,
            None => summary.unlinked += 1,
        }
        if matched != photo.activity_id {
            store.set_photo_activity(photo.id, matched).await?;
        }
    }

    tracing::info!(
        "Re-linked {} photos, unlinked {} (threshold: {} km)",
        summary.linked,
        summary.unlinked,
        max_distance_km
    );
    Ok(summary)
}
