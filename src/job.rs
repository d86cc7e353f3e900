//! The compute pipeline: select stale candidates, batch them, and for each
//! listing fetch its neighbors, compute stats and persist — batches strictly
//! in sequence, listings within a batch concurrently up to a bound.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::stats;
use crate::store::ListingStore;
use crate::types::Listing;

/// Outcome of a successful run, surfaced on the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub candidates: usize,
    pub batches: usize,
}

pub struct ComputeJob {
    store: Arc<dyn ListingStore>,
    radius_m: f64,
    stale_threshold_secs: i64,
    batch_size: usize,
    max_concurrency: usize,
}

impl ComputeJob {
    pub fn new(store: Arc<dyn ListingStore>, cfg: &Config) -> Self {
        Self {
            store,
            radius_m: cfg.nearby_radius_m,
            stale_threshold_secs: cfg.stale_threshold_secs(),
            batch_size: cfg.batch_size,
            max_concurrency: cfg.max_concurrency,
        }
    }

    /// One full run. Fail-fast: the first work-unit error cancels the rest of
    /// its batch (the in-flight futures are dropped with the stream) and no
    /// further batch starts. A candidate-query failure aborts before any
    /// batch. Listings that failed stay stale, so the next run retries them.
    pub async fn run(&self) -> Result<RunSummary> {
        let stale_before = now_secs() - self.stale_threshold_secs;
        let candidates = self.store.find_candidates(stale_before).await?;
        let batch_count = candidates.len().div_ceil(self.batch_size);
        info!(
            candidates = candidates.len(),
            batches = batch_count,
            "compute run starting"
        );

        for (index, batch) in candidates.chunks(self.batch_size).enumerate() {
            // Barrier: try_collect resolves only once every work unit of this
            // batch has completed, so batch k+1 never overlaps batch k.
            let units: Vec<_> = batch
                .iter()
                .map(|listing| self.process_listing(listing))
                .collect();
            stream::iter(units)
                .buffer_unordered(self.max_concurrency)
                .try_collect::<Vec<()>>()
                .await?;
            info!(batch = index + 1, batches = batch_count, "batch complete");
        }

        Ok(RunSummary {
            candidates: candidates.len(),
            batches: batch_count,
        })
    }

    /// One work unit: find neighbors → compute → persist.
    async fn process_listing(&self, listing: &Listing) -> Result<()> {
        let mut neighbors = self
            .store
            .find_nearby(listing.coordinates, self.radius_m)
            .await?;
        // The radius query matches the target itself at distance zero; drop
        // it so its own values are folded in exactly once.
        neighbors.retain(|n| n.id != listing.id);

        let now = now_secs();
        let computed = stats::compute(&neighbors, listing, now, self.radius_m);
        self.store.update_computed(&listing.id, &computed, now).await
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
