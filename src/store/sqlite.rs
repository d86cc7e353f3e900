use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use crate::error::{AppError, Result};
use crate::store::ListingStore;
use crate::types::{ComputedStats, Coordinates, Listing, NeighborListing};

/// Meters per degree of latitude (WGS84 mean).
const METERS_PER_DEG_LAT: f64 = 111_320.0;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct ListingRow {
    id: String,
    lat: f64,
    lon: f64,
    price: f64,
    area: f64,
    price_per_sqm: f64,
    expired: i64,
    computed: Option<String>,
    updated_at: i64,
}

impl ListingRow {
    fn into_listing(self) -> Result<Listing> {
        let computed = match self.computed {
            Some(json) => Some(serde_json::from_str::<ComputedStats>(&json)?),
            None => None,
        };
        Ok(Listing {
            id: self.id,
            coordinates: Coordinates { lat: self.lat, lon: self.lon },
            price: self.price,
            area: self.area,
            price_per_sqm: self.price_per_sqm,
            expired: self.expired != 0,
            computed,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NeighborRow {
    id: String,
    price: f64,
    area: f64,
    price_per_sqm: f64,
    lat: f64,
    lon: f64,
}

// ---------------------------------------------------------------------------
// SqliteListingStore
// ---------------------------------------------------------------------------

/// SQLite-backed listing store. The nearby query prefilters with a lat/lon
/// bounding box in SQL (SQLite has no geospatial index) and applies the exact
/// haversine radius in Rust.
pub struct SqliteListingStore {
    pool: sqlx::SqlitePool,
    query_timeout: Duration,
}

impl SqliteListingStore {
    pub fn new(pool: sqlx::SqlitePool, query_timeout: Duration) -> Self {
        Self { pool, query_timeout }
    }
}

#[async_trait]
impl ListingStore for SqliteListingStore {
    async fn find_candidates(&self, stale_before: i64) -> Result<Vec<Listing>> {
        let query = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT id, lat, lon, price, area, price_per_sqm, expired, computed, updated_at
            FROM listings
            WHERE expired = 0
              AND (computed IS NULL OR computed_updated_at <= ?)
            "#,
        )
        .bind(stale_before)
        .fetch_all(&self.pool);

        let rows = timeout(self.query_timeout, query)
            .await
            .map_err(|_| AppError::StoreQuery("candidate query timed out".to_string()))?
            .map_err(|e| AppError::StoreQuery(e.to_string()))?;

        rows.into_iter().map(ListingRow::into_listing).collect()
    }

    async fn find_nearby(
        &self,
        center: Coordinates,
        radius_m: f64,
    ) -> Result<Vec<NeighborListing>> {
        let (lat_min, lat_max, lon_min, lon_max) = bounding_box(center, radius_m);

        let query = sqlx::query_as::<_, NeighborRow>(
            r#"
            SELECT id, price, area, price_per_sqm, lat, lon
            FROM listings
            WHERE expired = 0
              AND lat BETWEEN ? AND ?
              AND lon BETWEEN ? AND ?
            ORDER BY updated_at DESC
            "#,
        )
        .bind(lat_min)
        .bind(lat_max)
        .bind(lon_min)
        .bind(lon_max)
        .fetch_all(&self.pool);

        let rows = timeout(self.query_timeout, query)
            .await
            .map_err(|_| AppError::StoreQuery("nearby query timed out".to_string()))?
            .map_err(|e| AppError::StoreQuery(e.to_string()))?;

        // The box circumscribes the radius circle; corners get trimmed here.
        Ok(rows
            .into_iter()
            .filter(|r| haversine_m(center, Coordinates { lat: r.lat, lon: r.lon }) <= radius_m)
            .map(|r| NeighborListing {
                id: r.id,
                price: r.price,
                area: r.area,
                price_per_sqm: r.price_per_sqm,
            })
            .collect())
    }

    async fn update_computed(
        &self,
        id: &str,
        computed: &ComputedStats,
        updated_at: i64,
    ) -> Result<()> {
        let computed_json =
            serde_json::to_string(computed).map_err(|e| AppError::StoreWrite(e.to_string()))?;

        let query = sqlx::query(
            r#"
            UPDATE listings
            SET computed = ?, computed_updated_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&computed_json)
        .bind(computed.updated_at)
        .bind(updated_at)
        .bind(id)
        .execute(&self.pool);

        timeout(self.query_timeout, query)
            .await
            .map_err(|_| AppError::StoreWrite(format!("update for {id} timed out")))?
            .map_err(|e| AppError::StoreWrite(e.to_string()))?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Geodesy helpers
// ---------------------------------------------------------------------------

/// Lat/lon box circumscribing the circle of `radius_m` around `center`.
/// Returns (lat_min, lat_max, lon_min, lon_max).
fn bounding_box(center: Coordinates, radius_m: f64) -> (f64, f64, f64, f64) {
    let lat_delta = radius_m / METERS_PER_DEG_LAT;
    // Longitude degrees shrink toward the poles; clamp the scale so listings
    // at extreme latitudes widen the box instead of dividing by zero.
    let lon_scale = center.lat.to_radians().cos().abs().max(1e-6);
    let lon_delta = radius_m / (METERS_PER_DEG_LAT * lon_scale);
    (
        center.lat - lat_delta,
        center.lat + lat_delta,
        center.lon - lon_delta,
        center.lon + lon_delta,
    )
}

/// Great-circle distance in meters.
fn haversine_m(a: Coordinates, b: Coordinates) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_store() -> SqliteListingStore {
        // Single connection — every handle must see the same in-memory DB.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteListingStore::new(pool, Duration::from_secs(5))
    }

    async fn insert_listing(
        store: &SqliteListingStore,
        id: &str,
        lat: f64,
        lon: f64,
        price: f64,
        expired: bool,
        computed_updated_at: Option<i64>,
        updated_at: i64,
    ) {
        let computed = computed_updated_at.map(|ts| format!(r#"{{"updated_at":{ts},"average_price":0.0,"average_ppsm":0.0,"average_area":0.0,"median_price":0.0,"median_ppsm":0.0,"median_area":0.0,"ranking_of_price":0,"ranking_of_ppsm":0,"ranking_of_area":0,"total":1,"range":500.0}}"#));
        sqlx::query(
            r#"
            INSERT INTO listings (id, lat, lon, price, area, price_per_sqm, expired, computed, computed_updated_at, updated_at)
            VALUES (?, ?, ?, ?, 50.0, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(lat)
        .bind(lon)
        .bind(price)
        .bind(price / 50.0)
        .bind(i64::from(expired))
        .bind(computed)
        .bind(computed_updated_at)
        .bind(updated_at)
        .execute(&store.pool)
        .await
        .unwrap();
    }

    #[test]
    fn haversine_matches_known_distance() {
        // One degree of latitude is ~111.2 km.
        let a = Coordinates { lat: 52.0, lon: 13.0 };
        let b = Coordinates { lat: 53.0, lon: 13.0 };
        let d = haversine_m(a, b);
        assert!((d - 111_195.0).abs() < 500.0, "d = {d}");
    }

    #[test]
    fn bounding_box_contains_radius_circle() {
        let center = Coordinates { lat: 52.0, lon: 13.0 };
        let (lat_min, lat_max, lon_min, lon_max) = bounding_box(center, 500.0);
        // A point 500m due north/east must still fall inside the box.
        assert!(lat_max - center.lat >= 500.0 / METERS_PER_DEG_LAT);
        assert!(center.lat - lat_min >= 500.0 / METERS_PER_DEG_LAT);
        assert!(lon_max > center.lon && lon_min < center.lon);
    }

    #[tokio::test]
    async fn candidates_are_missing_or_stale_and_not_expired() {
        let store = test_store().await;
        insert_listing(&store, "missing", 52.0, 13.0, 100.0, false, None, 10).await;
        insert_listing(&store, "stale", 52.0, 13.0, 100.0, false, Some(500), 10).await;
        insert_listing(&store, "fresh", 52.0, 13.0, 100.0, false, Some(2_000), 10).await;
        insert_listing(&store, "expired", 52.0, 13.0, 100.0, true, None, 10).await;

        let mut ids: Vec<String> = store
            .find_candidates(1_000)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["missing", "stale"]);
    }

    #[tokio::test]
    async fn nearby_filters_by_radius_and_orders_by_recency() {
        let store = test_store().await;
        let center = Coordinates { lat: 52.0, lon: 13.0 };
        // ~111m per 0.001 degree of latitude at this longitude.
        insert_listing(&store, "close_old", 52.001, 13.0, 80.0, false, None, 10).await;
        insert_listing(&store, "close_new", 52.002, 13.0, 90.0, false, None, 20).await;
        insert_listing(&store, "far", 52.2, 13.0, 70.0, false, None, 30).await;
        insert_listing(&store, "close_expired", 52.001, 13.0, 60.0, true, None, 40).await;

        let neighbors = store.find_nearby(center, 500.0).await.unwrap();
        let ids: Vec<&str> = neighbors.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["close_new", "close_old"]);
    }

    #[tokio::test]
    async fn update_computed_persists_and_unmarks_candidate() {
        let store = test_store().await;
        insert_listing(&store, "a", 52.0, 13.0, 100.0, false, None, 10).await;

        let candidates = store.find_candidates(1_000).await.unwrap();
        assert_eq!(candidates.len(), 1);

        let computed = ComputedStats {
            updated_at: 2_000,
            average_price: 100.0,
            average_ppsm: 2.0,
            average_area: 50.0,
            median_price: 100.0,
            median_ppsm: 2.0,
            median_area: 50.0,
            ranking_of_price: 0,
            ranking_of_ppsm: 0,
            ranking_of_area: 0,
            lowest_price_listing_id: None,
            lowest_ppsm_listing_id: None,
            total: 1,
            range: 500.0,
        };
        store.update_computed("a", &computed, 2_000).await.unwrap();

        // No longer a candidate against the same staleness cutoff.
        assert!(store.find_candidates(1_000).await.unwrap().is_empty());

        // But stale again once the cutoff passes its write time, and the
        // stored stats round-trip intact.
        let again = store.find_candidates(3_000).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].computed.as_ref(), Some(&computed));
    }
}
