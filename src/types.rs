use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// A real-estate listing as the compute job sees it. Owned by the external
/// ingestion system — the job reads price/area/coordinates/expired and writes
/// back `computed` + `updated_at`, nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub coordinates: Coordinates,
    pub price: f64,
    pub area: f64,
    pub price_per_sqm: f64,
    pub expired: bool,
    pub computed: Option<ComputedStats>,
    /// Unix seconds.
    pub updated_at: i64,
}

/// Minimal projection returned by the nearby query — only the fields the
/// statistics engine folds in, plus the id for lowest-value attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborListing {
    pub id: String,
    pub price: f64,
    pub area: f64,
    pub price_per_sqm: f64,
}

// ---------------------------------------------------------------------------
// ComputedStats
// ---------------------------------------------------------------------------

/// Comparative market statistics for one listing against its neighbor set.
/// Written wholesale on every recomputation, never merged.
///
/// Rankings are the zero-based position of the listing's own value in the
/// ascending sort of neighbors' values plus its own (first occurrence under
/// ties). `total` always equals the neighbor count plus one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedStats {
    /// Unix seconds of the run that produced these stats.
    pub updated_at: i64,
    pub average_price: f64,
    pub average_ppsm: f64,
    pub average_area: f64,
    pub median_price: f64,
    pub median_ppsm: f64,
    pub median_area: f64,
    pub ranking_of_price: usize,
    pub ranking_of_ppsm: usize,
    pub ranking_of_area: usize,
    /// Id of the neighbor holding the minimum price; None when the listing
    /// itself is the strict minimum.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lowest_price_listing_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lowest_ppsm_listing_id: Option<String>,
    /// Listings folded into the statistic, the target included.
    pub total: usize,
    /// Radius (meters) used for the neighbor query.
    pub range: f64,
}
