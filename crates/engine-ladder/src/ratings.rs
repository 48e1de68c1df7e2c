//! Elo rating engine.
//!
//! Ratings are recomputed deterministically from the full result ledger.
//! Anchor engines act as fixed reference points: their ratings calibrate the
//! floating ratings of unknown engines but are never themselves moved. Rows
//! are folded strictly in ledger order, so results are path-dependent by
//! design - each row's update sees the ratings as they stand after all prior
//! rows.

use crate::ledger::MatchRow;
use crate::registry::Registry;

/// Parameters of the rating update.
#[derive(Debug, Clone, Copy)]
pub struct RatingParams {
    /// Starting rating for non-anchor engines.
    pub default_elo: f64,
    /// Global K-factor, applied uniformly.
    pub k_factor: f64,
}

impl Default for RatingParams {
    fn default() -> Self {
        Self {
            default_elo: 2000.0,
            k_factor: 20.0,
        }
    }
}

/// Classic Elo logistic expectation.
///
/// Satisfies `expected_score(ra, rb) + expected_score(rb, ra) == 1` for all
/// finite inputs.
pub fn expected_score(ra: f64, rb: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((rb - ra) / 400.0))
}

/// Rebuilds every rating from scratch by folding the ordered ledger.
///
/// Every engine is first reset to its anchor value (or the default), with a
/// zero game count; each row is then applied via [`apply_row`]. Running this
/// twice on the same ledger yields bit-identical results.
pub fn recompute(registry: &mut Registry, rows: &[MatchRow], params: &RatingParams) {
    for engine in registry.iter_mut() {
        engine.games = 0;
        engine.rating = engine.base_elo.unwrap_or(params.default_elo);
    }
    for row in rows {
        apply_row(registry, row, params);
    }
}

/// Applies exactly one result to an already-consistent rating state.
///
/// This is both the fold step of [`recompute`] and the fast path used by the
/// orchestrator after appending a new row, which guarantees the two paths
/// converge to the same values.
///
/// Rows naming an engine unknown to the registry are skipped entirely,
/// tolerating stale ledger entries for removed engines. When neither side is
/// an anchor, both updates use the ratings from the start of the row - there
/// is no cascading within-row update.
pub fn apply_row(registry: &mut Registry, row: &MatchRow, params: &RatingParams) {
    let (ra, anchor_a, rb, anchor_b) =
        match (registry.get(&row.engine_a), registry.get(&row.engine_b)) {
            (Some(a), Some(b)) => (a.rating, a.is_anchor, b.rating, b.is_anchor),
            _ => return,
        };

    let sa = row.result_a;
    let sb = 1.0 - sa;
    let k = params.k_factor;

    let (new_ra, new_rb) = if anchor_a && anchor_b {
        // Reference points only calibrate each other's game counts.
        (ra, rb)
    } else if anchor_a {
        (ra, rb + k * (sb - expected_score(rb, ra)))
    } else if anchor_b {
        (ra + k * (sa - expected_score(ra, rb)), rb)
    } else {
        (
            ra + k * (sa - expected_score(ra, rb)),
            rb + k * (sb - expected_score(rb, ra)),
        )
    };

    if let Some(a) = registry.get_mut(&row.engine_a) {
        a.rating = new_ra;
        a.games += 1;
    }
    if let Some(b) = registry.get_mut(&row.engine_b) {
        b.rating = new_rb;
        b.games += 1;
    }
}
