//! Global prior computation
//!
//! The library-wide mean over manually rated, non-noise tracks. It is
//! computed once per invocation and threaded as an immutable value
//! through every aggregation and inheritance call, so a run's results
//! are reproducible regardless of what gets written along the way.

use crate::catalog::{Catalog, NoiseFilter};
use crate::engine::engine_owns;
use rime_common::db::OwnershipRecord;
use rime_common::ratings::RATING_MAX;
use std::collections::HashMap;
use tracing::info;

/// Fallback when no qualifying manual ratings exist: the scale midpoint.
const DEFAULT_PRIOR: f32 = RATING_MAX / 2.0;

/// Compute the global prior. Returns the prior and the number of manual
/// ratings that informed it.
pub fn global_prior(
    catalog: &Catalog,
    state: &HashMap<String, OwnershipRecord>,
    noise: &NoiseFilter,
) -> (f32, usize) {
    let mut sum = 0.0f64;
    let mut count = 0usize;

    for track in catalog.tracks() {
        let Some(rating) = track.rating else { continue };
        if rating <= 0.0 {
            continue;
        }
        if noise.is_noise(track) {
            continue;
        }
        // Engine-authored ratings are derived evidence; feeding them
        // back into the prior would let inference drift itself.
        if engine_owns(state.get(&track.id)) {
            continue;
        }
        sum += f64::from(rating);
        count += 1;
    }

    let prior = if count > 0 {
        (sum / count as f64) as f32
    } else {
        DEFAULT_PRIOR
    };

    info!(prior, manual_ratings = count, "Global prior established");
    (prior, count)
}
