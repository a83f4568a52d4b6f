// Module database - PostgreSQL implementation of the route store
// Architecture: every multi-statement write runs in one transaction

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::models::{
    Activity, DateRange, NewActivity, NewPhoto, NewPlannedRoute, NewRouteSection, Photo,
    PlannedRoute, RouteSection,
};
use crate::store::{RouteStore, StoreError};

/// Database connection pool
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create new database connection pool
    ///
    /// # Errors
    /// Returns StoreError if the connection fails
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        tracing::info!("PostgreSQL connection pool created");

        Ok(Self { pool })
    }

    /// Run database migrations
    ///
    /// # Errors
    /// Returns StoreError if migration fails
    pub async fn migrate(&self) -> Result<(), StoreError> {
        // query() cannot run several statements, raw_sql can
        let mut conn = self.pool.acquire().await?;

        let migration_sql = include_str!("../migrations/20250601_create_trail_tables.sql");

        sqlx::raw_sql(migration_sql).execute(&mut *conn).await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl RouteStore for Database {
    async fn full_route(&self) -> Result<Option<PlannedRoute>, StoreError> {
        let route = sqlx::query_as::<_, PlannedRoute>(
            "SELECT * FROM planned_route ORDER BY section_order, id LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(route)
    }

    async fn replace_full_route(&self, route: NewPlannedRoute) -> Result<PlannedRoute, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Sections go with their route (ON DELETE CASCADE)
        sqlx::query("DELETE FROM planned_route")
            .execute(&mut *tx)
            .await?;

        let saved = sqlx::query_as::<_, PlannedRoute>(
            r#"
            INSERT INTO planned_route (
                section_name, section_order, route_polyline, distance_km, description
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&route.section_name)
        .bind(route.section_order)
        .bind(&route.route_polyline)
        .bind(route.distance_km)
        .bind(&route.description)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Planned route replaced (ID: {})", saved.id);
        Ok(saved)
    }

    async fn delete_full_route(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM planned_route")
            .execute(&self.pool)
            .await?;

        tracing::info!("Planned route cleared ({} deleted)", result.rows_affected());
        Ok(result.rows_affected())
    }

    async fn active_section(&self) -> Result<Option<RouteSection>, StoreError> {
        let section = sqlx::query_as::<_, RouteSection>(
            "SELECT * FROM route_sections WHERE is_active LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(section)
    }

    async fn activate_section(&self, section: NewRouteSection) -> Result<RouteSection, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serialises concurrent activations; the partial unique index backs it up
        sqlx::query("LOCK TABLE route_sections IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let parent: Option<i32> = sqlx::query_scalar("SELECT id FROM planned_route WHERE id = $1")
            .bind(section.full_route_id)
            .fetch_optional(&mut *tx)
            .await?;
        if parent.is_none() {
            return Err(StoreError::NotFound(section.full_route_id));
        }

        sqlx::query(
            "UPDATE route_sections SET is_active = FALSE, updated_at = NOW() WHERE is_active",
        )
        .execute(&mut *tx)
        .await?;

        let saved = sqlx::query_as::<_, RouteSection>(
            r#"
            INSERT INTO route_sections (
                full_route_id, section_name, start_point_index, end_point_index,
                start_distance_km, end_distance_km, is_active, description
            )
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7)
            RETURNING *
            "#,
        )
        .bind(section.full_route_id)
        .bind(&section.section_name)
        .bind(section.start_point_index)
        .bind(section.end_point_index)
        .bind(section.start_distance_km)
        .bind(section.end_distance_km)
        .bind(&section.description)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Section activated: {} (ID: {})", saved.section_name, saved.id);
        Ok(saved)
    }

    async fn clear_active_section(&self) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE route_sections SET is_active = FALSE, updated_at = NOW() WHERE is_active",
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Active section cleared ({} updated)", result.rows_affected());
        Ok(())
    }

    async fn sections(&self) -> Result<Vec<RouteSection>, StoreError> {
        let sections =
            sqlx::query_as::<_, RouteSection>("SELECT * FROM route_sections ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        Ok(sections)
    }

    async fn insert_activity(&self, activity: NewActivity) -> Result<Activity, StoreError> {
        let saved = sqlx::query_as::<_, Activity>(
            r#"
            INSERT INTO activities (
                name, source, date, start_time, end_time, distance_km,
                elevation_gain_m, elevation_loss_m, min_elevation_m, max_elevation_m,
                duration_seconds, route_polyline
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(&activity.name)
        .bind(&activity.source)
        .bind(activity.date)
        .bind(activity.start_time)
        .bind(activity.end_time)
        .bind(activity.distance_km)
        .bind(activity.elevation_gain_m)
        .bind(activity.elevation_loss_m)
        .bind(activity.min_elevation_m)
        .bind(activity.max_elevation_m)
        .bind(activity.duration_seconds)
        .bind(&activity.route_polyline)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("Activity saved: {:?} (ID: {})", saved.name, saved.id);
        Ok(saved)
    }

    async fn activities(&self, range: DateRange) -> Result<Vec<Activity>, StoreError> {
        let activities = sqlx::query_as::<_, Activity>(
            r#"
            SELECT * FROM activities
            WHERE ($1::date IS NULL OR date >= $1)
              AND ($2::date IS NULL OR date <= $2)
            ORDER BY date DESC, id DESC
            "#,
        )
        .bind(range.start_date)
        .bind(range.end_date)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!("Retrieved {} activities", activities.len());
        Ok(activities)
    }

    async fn activity(&self, id: i32) -> Result<Activity, StoreError> {
        sqlx::query_as::<_, Activity>("SELECT * FROM activities WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))
    }

    async fn insert_photo(&self, photo: NewPhoto) -> Result<Photo, StoreError> {
        let saved = sqlx::query_as::<_, Photo>(
            r#"
            INSERT INTO photos (
                filename, caption, latitude, longitude, altitude_m, date_taken, activity_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&photo.filename)
        .bind(&photo.caption)
        .bind(photo.latitude)
        .bind(photo.longitude)
        .bind(photo.altitude_m)
        .bind(photo.date_taken)
        .bind(photo.activity_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("Photo saved: {} (ID: {})", saved.filename, saved.id);
        Ok(saved)
    }

    async fn photos(&self) -> Result<Vec<Photo>, StoreError> {
        let photos = sqlx::query_as::<_, Photo>(
            "SELECT * FROM photos ORDER BY date_taken DESC NULLS LAST, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(photos)
    }

    async fn photos_with_location(&self) -> Result<Vec<Photo>, StoreError> {
        let photos = sqlx::query_as::<_, Photo>(
            r#"
            SELECT * FROM photos
            WHERE latitude IS NOT NULL AND longitude IS NOT NULL
            ORDER BY date_taken DESC NULLS LAST, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!("Retrieved {} geotagged photos", photos.len());
        Ok(photos)
    }

    async fn photo(&self, id: i32) -> Result<Photo, StoreError> {
        sqlx::query_as::<_, Photo>("SELECT * FROM photos WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))
    }

    async fn set_photo_activity(
        &self,
        id: i32,
        activity_id: Option<i32>,
    ) -> Result<Photo, StoreError> {
        sqlx::query_as::<_, Photo>(
            "UPDATE photos SET activity_id = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(activity_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// Returns (Database, Container) - keep container alive to prevent Docker cleanup
    async fn setup_test_db() -> (
        Database,
        testcontainers::ContainerAsync<testcontainers_modules::postgres::Postgres>,
    ) {
        use testcontainers::{runners::AsyncRunner, ImageExt};
        use testcontainers_modules::postgres::Postgres;

        let container = Postgres::default()
            .with_tag("17-alpine")
            .start()
            .await
            .expect("Failed to start PostgreSQL container");

        let host = container.get_host().await.expect("Failed to get host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to get port");
        let database_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

        let db = Database::new(&database_url)
            .await
            .expect("Failed to connect to test DB");
        db.migrate().await.expect("Failed to run migrations");

        (db, container)
    }

    fn test_route() -> NewPlannedRoute {
        NewPlannedRoute {
            section_name: Some("Geraldine to Bluff".to_string()),
            section_order: Some(1),
            route_polyline: "_p~iF~ps|U_ulLnnqC_mqNvxq`@".to_string(),
            distance_km: Some(545.3),
            description: None,
        }
    }

    fn test_section(full_route_id: i32, name: &str) -> NewRouteSection {
        NewRouteSection {
            full_route_id,
            section_name: name.to_string(),
            start_point_index: 0,
            end_point_index: 1,
            start_distance_km: 0.0,
            end_distance_km: 250.0,
            description: Some("first leg".to_string()),
        }
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_replace_full_route() {
        let (db, _container) = setup_test_db().await;

        let first = db.replace_full_route(test_route()).await.unwrap();
        let second = db.replace_full_route(test_route()).await.unwrap();

        let current = db.full_route().await.unwrap().unwrap();
        assert_eq!(current.id, second.id);
        assert_ne!(first.id, second.id);
        assert_eq!(current.distance_km, Some(545.3));
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_single_active_section() {
        let (db, _container) = setup_test_db().await;
        let route = db.replace_full_route(test_route()).await.unwrap();

        db.activate_section(test_section(route.id, "one")).await.unwrap();
        let second = db.activate_section(test_section(route.id, "two")).await.unwrap();

        let sections = db.sections().await.unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections.iter().filter(|s| s.is_active).count(), 1);
        assert_eq!(db.active_section().await.unwrap().unwrap().id, second.id);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_replacing_route_cascades_to_sections() {
        let (db, _container) = setup_test_db().await;
        let route = db.replace_full_route(test_route()).await.unwrap();
        db.activate_section(test_section(route.id, "one")).await.unwrap();

        db.replace_full_route(test_route()).await.unwrap();
        assert!(db.sections().await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_activate_for_missing_route() {
        let (db, _container) = setup_test_db().await;
        let result = db.activate_section(test_section(999, "orphan")).await;
        assert!(matches!(result, Err(StoreError::NotFound(999))));
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_clear_active_section() {
        let (db, _container) = setup_test_db().await;
        db.clear_active_section().await.unwrap();

        let route = db.replace_full_route(test_route()).await.unwrap();
        db.activate_section(test_section(route.id, "one")).await.unwrap();
        db.clear_active_section().await.unwrap();

        assert!(db.active_section().await.unwrap().is_none());
        assert_eq!(db.sections().await.unwrap().len(), 1);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_activities_by_date() {
        let (db, _container) = setup_test_db().await;

        for day in 1..=3 {
            db.insert_activity(NewActivity {
                name: Some(format!("Day {}", day)),
                source: crate::models::SOURCE_GARMIN.to_string(),
                date: NaiveDate::from_ymd_opt(2025, 12, day).unwrap(),
                start_time: None,
                end_time: None,
                distance_km: Some(18.4),
                elevation_gain_m: Some(640),
                elevation_loss_m: Some(610),
                min_elevation_m: None,
                max_elevation_m: None,
                duration_seconds: Some(21_600),
                route_polyline: None,
            })
            .await
            .unwrap();
        }

        let all = db.activities(DateRange::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].name.as_deref(), Some("Day 3"));

        let range = DateRange {
            start_date: None,
            end_date: NaiveDate::from_ymd_opt(2025, 12, 2),
        };
        assert_eq!(db.activities(range).await.unwrap().len(), 2);

        let first = db.activity(all[2].id).await.unwrap();
        assert_eq!(first.name.as_deref(), Some("Day 1"));
        assert!(matches!(db.activity(12345).await, Err(StoreError::NotFound(12345))));
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_photo_records() {
        let (db, _container) = setup_test_db().await;
        let activity = db
            .insert_activity(NewActivity {
                name: Some("Day 1".to_string()),
                source: crate::models::SOURCE_GPX_UPLOAD.to_string(),
                date: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
                start_time: None,
                end_time: None,
                distance_km: None,
                elevation_gain_m: None,
                elevation_loss_m: None,
                min_elevation_m: None,
                max_elevation_m: None,
                duration_seconds: None,
                route_polyline: None,
            })
            .await
            .unwrap();

        let tagged = db
            .insert_photo(NewPhoto {
                filename: "summit.jpg".to_string(),
                latitude: Some(-43.5),
                longitude: Some(171.5),
                ..NewPhoto::default()
            })
            .await
            .unwrap();
        db.insert_photo(NewPhoto {
            filename: "tent.jpg".to_string(),
            ..NewPhoto::default()
        })
        .await
        .unwrap();

        assert_eq!(db.photos().await.unwrap().len(), 2);
        let located = db.photos_with_location().await.unwrap();
        assert_eq!(located.len(), 1);
        assert_eq!(located[0].id, tagged.id);

        let linked = db.set_photo_activity(tagged.id, Some(activity.id)).await.unwrap();
        assert_eq!(linked.activity_id, Some(activity.id));
        assert_eq!(db.photo(tagged.id).await.unwrap().activity_id, Some(activity.id));
        assert!(matches!(
            db.set_photo_activity(9999, None).await,
            Err(StoreError::NotFound(9999))
        ));
    }
}
