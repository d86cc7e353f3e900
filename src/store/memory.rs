//! In-memory ListingStore double for pipeline tests. Ignores geometry — every
//! non-expired listing is a neighbor of every other — and records call timing
//! so tests can assert batch ordering.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::store::ListingStore;
use crate::types::{ComputedStats, Coordinates, Listing, NeighborListing};

#[derive(Default)]
pub struct MemoryListingStore {
    listings: Mutex<Vec<Listing>>,
    /// (listing_id, when the nearby query started). The id is resolved from
    /// the query center — nearby queries are always issued from a candidate's
    /// own position.
    pub nearby_started: Mutex<Vec<(String, Instant)>>,
    /// (listing_id, when the write finished).
    pub persist_finished: Mutex<Vec<(String, Instant)>>,
    /// id → stats written, last write wins.
    pub persisted: Mutex<HashMap<String, ComputedStats>>,
    /// Listing ids whose nearby query fails with a store error.
    pub fail_nearby_for: Mutex<HashSet<String>>,
    /// Artificial latency inside find_nearby.
    pub nearby_delay: Duration,
}

impl MemoryListingStore {
    pub fn new(listings: Vec<Listing>) -> Self {
        Self {
            listings: Mutex::new(listings),
            ..Self::default()
        }
    }

    pub fn with_nearby_delay(mut self, delay: Duration) -> Self {
        self.nearby_delay = delay;
        self
    }

    pub fn with_failing_nearby(self, id: &str) -> Self {
        self.fail_nearby_for.lock().unwrap().insert(id.to_string());
        self
    }

    pub fn persisted_ids(&self) -> HashSet<String> {
        self.persisted.lock().unwrap().keys().cloned().collect()
    }

    /// The listing whose coordinates match `center` — the nearby query is
    /// always issued from a candidate's own position.
    fn listing_at(&self, center: Coordinates) -> Option<Listing> {
        self.listings
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.coordinates == center)
            .cloned()
    }
}

#[async_trait]
impl ListingStore for MemoryListingStore {
    async fn find_candidates(&self, stale_before: i64) -> Result<Vec<Listing>> {
        Ok(self
            .listings
            .lock()
            .unwrap()
            .iter()
            .filter(|l| {
                !l.expired
                    && l.computed
                        .as_ref()
                        .map_or(true, |c| c.updated_at <= stale_before)
            })
            .cloned()
            .collect())
    }

    async fn find_nearby(
        &self,
        center: Coordinates,
        _radius_m: f64,
    ) -> Result<Vec<NeighborListing>> {
        let target = self.listing_at(center);
        let target_id = target.as_ref().map(|l| l.id.clone()).unwrap_or_default();
        self.nearby_started
            .lock()
            .unwrap()
            .push((target_id.clone(), Instant::now()));

        if self.fail_nearby_for.lock().unwrap().contains(&target_id) {
            return Err(AppError::StoreQuery(format!(
                "injected failure for {target_id}"
            )));
        }

        if !self.nearby_delay.is_zero() {
            tokio::time::sleep(self.nearby_delay).await;
        }

        // Everything non-expired is "nearby", the caller included.
        Ok(self
            .listings
            .lock()
            .unwrap()
            .iter()
            .filter(|l| !l.expired)
            .map(|l| NeighborListing {
                id: l.id.clone(),
                price: l.price,
                area: l.area,
                price_per_sqm: l.price_per_sqm,
            })
            .collect())
    }

    async fn update_computed(
        &self,
        id: &str,
        computed: &ComputedStats,
        updated_at: i64,
    ) -> Result<()> {
        {
            let mut listings = self.listings.lock().unwrap();
            let listing = listings
                .iter_mut()
                .find(|l| l.id == id)
                .ok_or_else(|| AppError::StoreWrite(format!("no listing {id}")))?;
            listing.computed = Some(computed.clone());
            listing.updated_at = updated_at;
        }
        self.persisted
            .lock()
            .unwrap()
            .insert(id.to_string(), computed.clone());
        self.persist_finished
            .lock()
            .unwrap()
            .push((id.to_string(), Instant::now()));
        Ok(())
    }
}
