use std::collections::HashSet;

use shared::{ProgressResponse, StatsResponse};

use crate::geometry::closest_point_on_track;
use crate::models::{round2, Activity, GeoPoint, PlannedRoute};
use crate::polyline_codec::{decode_polyline, PRECISION};

pub const DEFAULT_MAX_PHOTO_DISTANCE_KM: f64 = 5.0;

pub fn activity_stats(activities: &[Activity]) -> StatsResponse {
    let total_distance: f64 = activities.iter().filter_map(|a| a.distance_km).sum();
    let total_elevation: i64 = activities
        .iter()
        .filter_map(|a| a.elevation_gain_m)
        .map(i64::from)
        .sum();
    let total_days = distinct_days(activities);
    let longest_day = activities
        .iter()
        .filter_map(|a| a.distance_km)
        .fold(0.0, f64::max);
    let highest_elevation = activities
        .iter()
        .filter_map(|a| a.elevation_gain_m)
        .max()
        .unwrap_or(0);

    let avg_distance = if total_days > 0 {
        total_distance / total_days as f64
    } else {
        0.0
    };

    StatsResponse {
        total_distance_km: round2(total_distance),
        total_elevation_m: total_elevation,
        total_days,
        avg_distance_per_day: round2(avg_distance),
        longest_day_km: round2(longest_day),
        highest_elevation_day_m: highest_elevation,
    }
}

pub fn trail_progress(planned: Option<&PlannedRoute>, activities: &[Activity]) -> ProgressResponse {
    let total_planned = planned.and_then(|r| r.distance_km).unwrap_or(0.0);
    let completed: f64 = activities.iter().filter_map(|a| a.distance_km).sum();
    let progress_percent = if total_planned > 0.0 {
        completed / total_planned * 100.0
    } else {
        0.0
    };

    ProgressResponse {
        total_planned_km: total_planned,
        completed_km: completed,
        progress_percent: round2(progress_percent),
        days_on_trail: distinct_days(activities),
        activities_count: activities.len(),
    }
}

/// The activity whose track passes closest to `photo`, if within `max_distance_km`.
///
/// Activities without a track, or with one that fails to decode, are skipped.
pub fn nearest_activity(
    photo: GeoPoint,
    activities: &[Activity],
    max_distance_km: f64,
) -> Option<(i32, f64)> {
    let mut best: Option<(i32, f64)> = None;

    for activity in activities {
        let Some(encoded) = activity.route_polyline.as_deref() else {
            continue;
        };
        let track = match decode_polyline(encoded, PRECISION) {
            Ok(track) => track,
            Err(err) => {
                tracing::debug!("Skipping activity {} track: {}", activity.id, err);
                continue;
            }
        };
        let Some((distance, _)) = closest_point_on_track(photo, &track) else {
            continue;
        };
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((activity.id, distance));
        }
    }

    best.filter(|&(_, distance)| distance <= max_distance_km)
}

fn distinct_days(activities: &[Activity]) -> usize {
    activities.iter().map(|a| a.date).collect::<HashSet<_>>().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SOURCE_GARMIN;
    use crate::polyline_codec::encode_polyline;
    use chrono::{NaiveDate, Utc};

    fn activity(id: i32, day: u32, km: f64, gain: i32, track: Option<&[GeoPoint]>) -> Activity {
        Activity {
            id,
            name: Some(format!("Activity {id}")),
            source: SOURCE_GARMIN.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 11, day).unwrap(),
            start_time: None,
            end_time: None,
            distance_km: Some(km),
            elevation_gain_m: Some(gain),
            elevation_loss_m: None,
            min_elevation_m: None,
            max_elevation_m: None,
            duration_seconds: None,
            route_polyline: track.map(|t| encode_polyline(t, PRECISION).unwrap()),
            created_at: Utc::now(),
        }
    }

    fn planned(distance_km: Option<f64>) -> PlannedRoute {
        PlannedRoute {
            id: 1,
            section_name: None,
            section_order: Some(1),
            route_polyline: String::new(),
            distance_km,
            description: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_stats_empty() {
        let stats = activity_stats(&[]);
        assert_eq!(
            stats,
            StatsResponse {
                total_distance_km: 0.0,
                total_elevation_m: 0,
                total_days: 0,
                avg_distance_per_day: 0.0,
                longest_day_km: 0.0,
                highest_elevation_day_m: 0,
            }
        );
    }

    #[test]
    fn test_stats_counts_distinct_days() {
        let activities = vec![
            activity(1, 1, 12.5, 300, None),
            activity(2, 1, 8.25, 150, None),
            activity(3, 2, 25.0, 900, None),
        ];
        let stats = activity_stats(&activities);

        assert_eq!(stats.total_distance_km, 45.75);
        assert_eq!(stats.total_elevation_m, 1350);
        assert_eq!(stats.total_days, 2);
        assert_eq!(stats.avg_distance_per_day, 22.88);
        assert_eq!(stats.longest_day_km, 25.0);
        assert_eq!(stats.highest_elevation_day_m, 900);
    }

    #[test]
    fn test_progress() {
        let activities = vec![activity(1, 1, 20.0, 0, None), activity(2, 3, 10.0, 0, None)];
        let progress = trail_progress(Some(&planned(Some(90.0))), &activities);

        assert_eq!(progress.total_planned_km, 90.0);
        assert_eq!(progress.completed_km, 30.0);
        assert_eq!(progress.progress_percent, 33.33);
        assert_eq!(progress.days_on_trail, 2);
        assert_eq!(progress.activities_count, 2);
    }

    #[test]
    fn test_progress_without_plan() {
        let progress = trail_progress(None, &[]);
        assert_eq!(progress.total_planned_km, 0.0);
        assert_eq!(progress.progress_percent, 0.0);
        assert_eq!(progress.activities_count, 0);

        let unmeasured = trail_progress(Some(&planned(None)), &[activity(1, 1, 5.0, 0, None)]);
        assert_eq!(unmeasured.progress_percent, 0.0);
    }

    #[test]
    fn test_nearest_activity_picks_closest_track() {
        let near = [GeoPoint::new(-44.0, 170.0), GeoPoint::new(-44.01, 170.0)];
        let far = [GeoPoint::new(-44.5, 170.5), GeoPoint::new(-44.51, 170.5)];
        let activities = vec![
            activity(1, 1, 1.0, 0, Some(&far)),
            activity(2, 2, 1.0, 0, Some(&near)),
            activity(3, 3, 1.0, 0, None),
        ];

        let found = nearest_activity(GeoPoint::new(-44.005, 170.001), &activities, 5.0);
        let (id, distance) = found.unwrap();
        assert_eq!(id, 2);
        assert!(distance < 1.0);
    }

    #[test]
    fn test_nearest_activity_respects_threshold() {
        let track = [GeoPoint::new(-44.0, 170.0), GeoPoint::new(-44.01, 170.0)];
        let activities = vec![activity(1, 1, 1.0, 0, Some(&track))];

        // roughly 11 km north of the track
        let photo = GeoPoint::new(-43.9, 170.0);
        assert!(nearest_activity(photo, &activities, DEFAULT_MAX_PHOTO_DISTANCE_KM).is_none());
        assert!(nearest_activity(photo, &activities, 15.0).is_some());
        assert!(nearest_activity(photo, &[], 15.0).is_none());
    }
}
