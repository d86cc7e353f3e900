pub mod sqlite;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ComputedStats, Coordinates, Listing, NeighborListing};

/// Boundary to the listing persistence engine. Production is SQLite via sqlx;
/// tests inject an in-memory double.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// All non-expired listings whose stats are missing or were computed at
    /// or before `stale_before` (unix seconds). Full projection — candidates
    /// are targets of the run.
    async fn find_candidates(&self, stale_before: i64) -> Result<Vec<Listing>>;

    /// Non-expired listings within `radius_m` meters of `center`, most
    /// recently updated first, projected to the fields statistics need.
    /// The listing at `center` itself matches at distance zero — callers
    /// filter it out by id.
    async fn find_nearby(&self, center: Coordinates, radius_m: f64)
        -> Result<Vec<NeighborListing>>;

    /// Writes freshly computed stats onto one listing. Idempotent — a repeat
    /// write of the same stats is observably a no-op.
    async fn update_computed(
        &self,
        id: &str,
        computed: &ComputedStats,
        updated_at: i64,
    ) -> Result<()>;
}
