//! Persistence boundary for the planned route, its sections, activities and photos.
//!
//! There is at most one full route and at most one active section. Both
//! implementations keep those two facts true on every write: replacing the
//! full route drops its sections, and `activate_section` deactivates the old
//! section and inserts the new one as a single atomic step.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::models::{
    Activity, DateRange, NewActivity, NewPhoto, NewPlannedRoute, NewRouteSection, Photo,
    PlannedRoute, RouteSection,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Record not found: {0}")]
    NotFound(i32),
}

#[async_trait]
pub trait RouteStore: Send + Sync {
    async fn full_route(&self) -> Result<Option<PlannedRoute>, StoreError>;

    /// Replaces the canonical route; sections of the previous route go with it.
    async fn replace_full_route(&self, route: NewPlannedRoute) -> Result<PlannedRoute, StoreError>;

    /// Returns the number of routes removed.
    async fn delete_full_route(&self) -> Result<u64, StoreError>;

    async fn active_section(&self) -> Result<Option<RouteSection>, StoreError>;

    /// Deactivates whatever is active and stores `section` as the active one.
    async fn activate_section(&self, section: NewRouteSection) -> Result<RouteSection, StoreError>;

    /// No-op when nothing is active.
    async fn clear_active_section(&self) -> Result<(), StoreError>;

    async fn sections(&self) -> Result<Vec<RouteSection>, StoreError>;

    async fn insert_activity(&self, activity: NewActivity) -> Result<Activity, StoreError>;

    /// Activities in `range`, most recent first.
    async fn activities(&self, range: DateRange) -> Result<Vec<Activity>, StoreError>;

    async fn activity(&self, id: i32) -> Result<Activity, StoreError>;

    async fn insert_photo(&self, photo: NewPhoto) -> Result<Photo, StoreError>;

    /// Every photo, most recently taken first; undated photos last.
    async fn photos(&self) -> Result<Vec<Photo>, StoreError>;

    /// Photos carrying both coordinates, in the same order as `photos`.
    async fn photos_with_location(&self) -> Result<Vec<Photo>, StoreError>;

    async fn photo(&self, id: i32) -> Result<Photo, StoreError>;

    /// Links `id` to `activity_id`, or unlinks it with `None`.
    async fn set_photo_activity(
        &self,
        id: i32,
        activity_id: Option<i32>,
    ) -> Result<Photo, StoreError>;
}

#[derive(Default)]
struct MemoryState {
    next_id: i32,
    full_route: Option<PlannedRoute>,
    sections: Vec<RouteSection>,
    activities: Vec<Activity>,
    photos: Vec<Photo>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store used when no database is configured, and in tests.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RouteStore for MemoryStore {
    async fn full_route(&self) -> Result<Option<PlannedRoute>, StoreError> {
        Ok(self.state.read().await.full_route.clone())
    }

    async fn replace_full_route(&self, route: NewPlannedRoute) -> Result<PlannedRoute, StoreError> {
        let mut state = self.state.write().await;
        let id = state.allocate_id();
        let saved = PlannedRoute {
            id,
            section_name: route.section_name,
            section_order: route.section_order,
            route_polyline: route.route_polyline,
            distance_km: route.distance_km,
            description: route.description,
            created_at: Utc::now(),
        };
        state.full_route = Some(saved.clone());
        state.sections.clear();

        tracing::info!("Planned route replaced (ID: {})", id);
        Ok(saved)
    }

    async fn delete_full_route(&self) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        state.sections.clear();
        Ok(u64::from(state.full_route.take().is_some()))
    }

    async fn active_section(&self) -> Result<Option<RouteSection>, StoreError> {
        let state = self.state.read().await;
        Ok(state.sections.iter().find(|s| s.is_active).cloned())
    }

    async fn activate_section(&self, section: NewRouteSection) -> Result<RouteSection, StoreError> {
        let mut state = self.state.write().await;
        match &state.full_route {
            Some(route) if route.id == section.full_route_id => {}
            _ => return Err(StoreError::NotFound(section.full_route_id)),
        }

        let now = Utc::now();
        for existing in state.sections.iter_mut().filter(|s| s.is_active) {
            existing.is_active = false;
            existing.updated_at = now;
        }

        let id = state.allocate_id();
        let saved = RouteSection {
            id,
            full_route_id: section.full_route_id,
            section_name: section.section_name,
            start_point_index: section.start_point_index,
            end_point_index: section.end_point_index,
            start_distance_km: section.start_distance_km,
            end_distance_km: section.end_distance_km,
            is_active: true,
            description: section.description,
            created_at: now,
            updated_at: now,
        };
        state.sections.push(saved.clone());
        Ok(saved)
    }

    async fn clear_active_section(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        for existing in state.sections.iter_mut().filter(|s| s.is_active) {
            existing.is_active = false;
            existing.updated_at = now;
        }
        Ok(())
    }

    async fn sections(&self) -> Result<Vec<RouteSection>, StoreError> {
        Ok(self.state.read().await.sections.clone())
    }

    async fn insert_activity(&self, activity: NewActivity) -> Result<Activity, StoreError> {
        let mut state = self.state.write().await;
        let id = state.allocate_id();
        let saved = Activity {
            id,
            name: activity.name,
            source: activity.source,
            date: activity.date,
            start_time: activity.start_time,
            end_time: activity.end_time,
            distance_km: activity.distance_km,
            elevation_gain_m: activity.elevation_gain_m,
            elevation_loss_m: activity.elevation_loss_m,
            min_elevation_m: activity.min_elevation_m,
            max_elevation_m: activity.max_elevation_m,
            duration_seconds: activity.duration_seconds,
            route_polyline: activity.route_polyline,
            created_at: Utc::now(),
        };
        state.activities.push(saved.clone());
        Ok(saved)
    }

    async fn activities(&self, range: DateRange) -> Result<Vec<Activity>, StoreError> {
        let state = self.state.read().await;
        let mut activities: Vec<Activity> = state
            .activities
            .iter()
            .filter(|a| range.contains(a.date))
            .cloned()
            .collect();
        activities.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(activities)
    }

    async fn activity(&self, id: i32) -> Result<Activity, StoreError> {
        let state = self.state.read().await;
        state
            .activities
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn insert_photo(&self, photo: NewPhoto) -> Result<Photo, StoreError> {
        let mut state = self.state.write().await;
        let id = state.allocate_id();
        let now = Utc::now();
        let saved = Photo {
            id,
            filename: photo.filename,
            caption: photo.caption,
            latitude: photo.latitude,
            longitude: photo.longitude,
            altitude_m: photo.altitude_m,
            date_taken: photo.date_taken,
            activity_id: photo.activity_id,
            created_at: now,
            updated_at: now,
        };
        state.photos.push(saved.clone());
        Ok(saved)
    }

    async fn photos(&self) -> Result<Vec<Photo>, StoreError> {
        let state = self.state.read().await;
        let mut photos = state.photos.clone();
        sort_newest_taken_first(&mut photos);
        Ok(photos)
    }

    async fn photos_with_location(&self) -> Result<Vec<Photo>, StoreError> {
        let mut photos = self.photos().await?;
        photos.retain(|p| p.location().is_some());
        Ok(photos)
    }

    async fn photo(&self, id: i32) -> Result<Photo, StoreError> {
        let state = self.state.read().await;
        state
            .photos
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn set_photo_activity(
        &self,
        id: i32,
        activity_id: Option<i32>,
    ) -> Result<Photo, StoreError> {
        let mut state = self.state.write().await;
        let photo = state
            .photos
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound(id))?;
        photo.activity_id = activity_id;
        photo.updated_at = Utc::now();
        Ok(photo.clone())
    }
}

// Option orders None first, so a descending sort leaves undated photos at the end
fn sort_newest_taken_first(photos: &mut [Photo]) {
    photos.sort_by(|a, b| b.date_taken.cmp(&a.date_taken).then(b.id.cmp(&a.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn new_route(name: &str) -> NewPlannedRoute {
        NewPlannedRoute {
            section_name: Some(name.to_string()),
            section_order: Some(1),
            route_polyline: "_p~iF~ps|U_ulLnnqC_mqNvxq`@".to_string(),
            distance_km: Some(12.5),
            description: None,
        }
    }

    fn new_section(full_route_id: i32, name: &str) -> NewRouteSection {
        NewRouteSection {
            full_route_id,
            section_name: name.to_string(),
            start_point_index: 0,
            end_point_index: 2,
            start_distance_km: 0.0,
            end_distance_km: 5.0,
            description: None,
        }
    }

    fn new_activity(day: u32) -> NewActivity {
        NewActivity {
            name: Some(format!("Day {day}")),
            source: crate::models::SOURCE_GPX_UPLOAD.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 11, day).unwrap(),
            start_time: None,
            end_time: None,
            distance_km: Some(20.0),
            elevation_gain_m: Some(500),
            elevation_loss_m: None,
            min_elevation_m: None,
            max_elevation_m: None,
            duration_seconds: None,
            route_polyline: None,
        }
    }

    #[tokio::test]
    async fn test_activate_swaps_active_section() {
        let store = MemoryStore::new();
        let route = store.replace_full_route(new_route("Full")).await.unwrap();

        let first = store.activate_section(new_section(route.id, "first")).await.unwrap();
        let second = store.activate_section(new_section(route.id, "second")).await.unwrap();

        let sections = store.sections().await.unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections.iter().filter(|s| s.is_active).count(), 1);
        let active = store.active_section().await.unwrap().unwrap();
        assert_eq!(active.id, second.id);
        assert_ne!(active.id, first.id);
    }

    #[tokio::test]
    async fn test_replace_route_drops_sections() {
        let store = MemoryStore::new();
        let route = store.replace_full_route(new_route("Old")).await.unwrap();
        store.activate_section(new_section(route.id, "s")).await.unwrap();

        let replaced = store.replace_full_route(new_route("New")).await.unwrap();
        assert_ne!(replaced.id, route.id);
        assert!(store.sections().await.unwrap().is_empty());
        assert!(store.active_section().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_activate_requires_current_route() {
        let store = MemoryStore::new();
        let result = store.activate_section(new_section(42, "orphan")).await;
        assert!(matches!(result, Err(StoreError::NotFound(42))));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let store = MemoryStore::new();
        store.clear_active_section().await.unwrap();
        let route = store.replace_full_route(new_route("Full")).await.unwrap();
        store.activate_section(new_section(route.id, "s")).await.unwrap();
        store.clear_active_section().await.unwrap();
        store.clear_active_section().await.unwrap();
        assert!(store.active_section().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_full_route() {
        let store = MemoryStore::new();
        assert_eq!(store.delete_full_route().await.unwrap(), 0);
        store.replace_full_route(new_route("Full")).await.unwrap();
        assert_eq!(store.delete_full_route().await.unwrap(), 1);
        assert!(store.full_route().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_activities_filtered_newest_first() {
        let store = MemoryStore::new();
        for day in [3, 1, 2] {
            store.insert_activity(new_activity(day)).await.unwrap();
        }

        let all = store.activities(DateRange::default()).await.unwrap();
        let days: Vec<u32> = all.iter().map(|a| chrono::Datelike::day(&a.date)).collect();
        assert_eq!(days, vec![3, 2, 1]);

        let range = DateRange {
            start_date: NaiveDate::from_ymd_opt(2025, 11, 2),
            end_date: None,
        };
        assert_eq!(store.activities(range).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_activity_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.activity(7).await, Err(StoreError::NotFound(7))));
    }

    fn new_photo(filename: &str, location: Option<(f64, f64)>, day: Option<u32>) -> NewPhoto {
        NewPhoto {
            filename: filename.to_string(),
            caption: Some(format!("{filename} caption")),
            latitude: location.map(|(lat, _)| lat),
            longitude: location.map(|(_, lon)| lon),
            altitude_m: None,
            date_taken: day.map(|d| Utc.with_ymd_and_hms(2025, 11, d, 9, 0, 0).unwrap()),
            activity_id: None,
        }
    }

    #[tokio::test]
    async fn test_photos_newest_first_with_undated_last() {
        let store = MemoryStore::new();
        store.insert_photo(new_photo("a.jpg", Some((-45.0, 169.0)), Some(1))).await.unwrap();
        store.insert_photo(new_photo("b.jpg", None, None)).await.unwrap();
        store.insert_photo(new_photo("c.jpg", Some((-44.9, 169.1)), Some(3))).await.unwrap();

        let names: Vec<String> = store
            .photos()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.filename)
            .collect();
        assert_eq!(names, ["c.jpg", "a.jpg", "b.jpg"]);
    }

    #[tokio::test]
    async fn test_photos_with_location_skips_untagged() {
        let store = MemoryStore::new();
        store.insert_photo(new_photo("tagged.jpg", Some((-45.0, 169.0)), Some(2))).await.unwrap();
        store.insert_photo(new_photo("plain.jpg", None, Some(4))).await.unwrap();
        let mut half = new_photo("half.jpg", None, Some(5));
        half.latitude = Some(-45.0);
        store.insert_photo(half).await.unwrap();

        let located = store.photos_with_location().await.unwrap();
        assert_eq!(located.len(), 1);
        assert_eq!(located[0].filename, "tagged.jpg");
    }

    #[tokio::test]
    async fn test_set_photo_activity_links_and_unlinks() {
        let store = MemoryStore::new();
        let photo = store.insert_photo(new_photo("a.jpg", Some((-45.0, 169.0)), None)).await.unwrap();
        assert_eq!(photo.activity_id, None);

        let linked = store.set_photo_activity(photo.id, Some(42)).await.unwrap();
        assert_eq!(linked.activity_id, Some(42));
        assert_eq!(store.photo(photo.id).await.unwrap().activity_id, Some(42));

        let unlinked = store.set_photo_activity(photo.id, None).await.unwrap();
        assert_eq!(unlinked.activity_id, None);

        assert!(matches!(
            store.set_photo_activity(999, Some(1)).await,
            Err(StoreError::NotFound(999))
        ));
        assert!(matches!(store.photo(999).await, Err(StoreError::NotFound(999))));
    }
}
