//! Pure statistics over one listing and its neighbor set. No I/O — everything
//! here is deterministic given its inputs, which is what makes recomputation
//! idempotent across runs.

use crate::types::{ComputedStats, Listing, NeighborListing};

/// Computes comparative stats for `target` against `neighbors`.
///
/// `neighbors` must not contain the target itself — its own values are folded
/// in here, exactly once. An empty neighbor set degenerates to single-element
/// statistics: averages and medians equal the target's own values, rankings
/// are 0 and no lowest-id fields are set.
pub fn compute(
    neighbors: &[NeighborListing],
    target: &Listing,
    now: i64,
    range: f64,
) -> ComputedStats {
    let prices = sorted_with(neighbors.iter().map(|n| n.price), target.price);
    let ppsm = sorted_with(neighbors.iter().map(|n| n.price_per_sqm), target.price_per_sqm);
    let areas = sorted_with(neighbors.iter().map(|n| n.area), target.area);

    ComputedStats {
        updated_at: now,
        average_price: mean(&prices),
        average_ppsm: mean(&ppsm),
        average_area: mean(&areas),
        median_price: median(&prices),
        median_ppsm: median(&ppsm),
        median_area: median(&areas),
        ranking_of_price: ranking(&prices, target.price),
        ranking_of_ppsm: ranking(&ppsm, target.price_per_sqm),
        ranking_of_area: ranking(&areas, target.area),
        lowest_price_listing_id: lowest_neighbor(neighbors, prices[0], |n| n.price),
        lowest_ppsm_listing_id: lowest_neighbor(neighbors, ppsm[0], |n| n.price_per_sqm),
        total: neighbors.len() + 1,
        range,
    }
}

/// Neighbors' values plus the target's own, sorted ascending.
fn sorted_with(values: impl Iterator<Item = f64>, own: f64) -> Vec<f64> {
    let mut v: Vec<f64> = values.chain(std::iter::once(own)).collect();
    v.sort_by(f64::total_cmp);
    v
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Arithmetic mean rounded to 2 decimal places. Never called on an empty
/// slice — the target's own value is always present.
fn mean(values: &[f64]) -> f64 {
    round2(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median of an ascending-sorted sequence. Odd length n: the middle element
/// at zero-based index (n - 1) / 2. Even length: the mean of the two elements
/// around the midpoint, rounded to 2 decimal places.
fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[(n - 1) / 2]
    } else {
        round2((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

/// Zero-based rank of `value` in an ascending-sorted sequence containing it:
/// the index of its first occurrence, i.e. the count of elements strictly
/// below it. Tied values all rank at the first equal slot.
fn ranking(sorted: &[f64], value: f64) -> usize {
    sorted.iter().take_while(|&&x| x < value).count()
}

/// Id of the first neighbor (store order) whose value equals the sequence
/// minimum. None when the target alone holds the minimum.
fn lowest_neighbor<F>(neighbors: &[NeighborListing], min: f64, value: F) -> Option<String>
where
    F: Fn(&NeighborListing) -> f64,
{
    neighbors.iter().find(|n| value(n) == min).map(|n| n.id.clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
