//! Next-pair selection policy.
//!
//! Each invocation picks the two engines whose game would be most
//! informative: engine A comes from the least-played non-anchor engines, and
//! the opponent is chosen by rating proximity with a soft per-pair game cap
//! and two randomized escapes that keep the matchmaking from locking onto a
//! single pairing. All randomness flows through an injected [`Rng`], so
//! scheduling decisions are reproducible under a seeded generator.

use std::collections::HashMap;

use rand::Rng;
use thiserror::Error;

use crate::ledger::pair_key;
use crate::registry::{EngineEntry, Registry};

/// Errors that can occur during scheduling.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("need at least two engines to schedule a game, found {found}")]
    InsufficientEngines { found: usize },
}

/// Tunables of the pairing policy.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleParams {
    /// Soft cap on games per pair; ignored when no alternative exists.
    pub max_pair_games: u32,
    /// Chance to pick a non-best opponent to avoid exclusive pairings.
    pub mix_probability: f64,
    /// Chance to prefer a lower-rated opponent when one is available.
    pub lower_rated_probability: f64,
}

impl Default for ScheduleParams {
    fn default() -> Self {
        Self {
            max_pair_games: 20,
            mix_probability: 0.3,
            lower_rated_probability: 0.25,
        }
    }
}

/// Chooses the next pair of engine names to play.
///
/// 1. Candidate pool for A: non-anchor engines, falling back to the full
///    roster when every engine is an anchor.
/// 2. A is drawn uniformly from the pool entries tied for the minimum game
///    count, driving even sample coverage.
/// 3. Opponents are sorted by `(|rating difference|, prior meetings)`.
/// 4. Opponents at the pair cap are dropped unless that empties the list.
/// 5. With `lower_rated_probability`, a uniformly random strictly
///    lower-rated candidate is taken when one exists.
/// 6. Otherwise with `mix_probability` (and more than one candidate), a
///    uniformly random non-best candidate is taken.
/// 7. Otherwise the best match wins deterministically.
///
/// # Errors
///
/// Returns [`ScheduleError::InsufficientEngines`] when fewer than two
/// engines are registered.
pub fn choose_pair<R: Rng>(
    registry: &Registry,
    pair_counts: &HashMap<(String, String), u32>,
    params: &ScheduleParams,
    rng: &mut R,
) -> Result<(String, String), ScheduleError> {
    if registry.len() < 2 {
        return Err(ScheduleError::InsufficientEngines {
            found: registry.len(),
        });
    }

    let unknowns: Vec<&EngineEntry> = registry.iter().filter(|e| !e.is_anchor).collect();
    let pool: Vec<&EngineEntry> = if unknowns.is_empty() {
        registry.iter().collect()
    } else {
        unknowns
    };

    let min_games = pool.iter().map(|e| e.games).min().unwrap_or(0);
    let tied: Vec<&EngineEntry> = pool.into_iter().filter(|e| e.games == min_games).collect();
    let eng_a = tied[rng.gen_range(0..tied.len())];

    let meetings = |e: &EngineEntry| -> u32 {
        pair_counts
            .get(&pair_key(&eng_a.name, &e.name))
            .copied()
            .unwrap_or(0)
    };

    let mut others: Vec<&EngineEntry> =
        registry.iter().filter(|e| e.name != eng_a.name).collect();
    others.sort_by(|x, y| {
        let dx = (x.rating - eng_a.rating).abs();
        let dy = (y.rating - eng_a.rating).abs();
        dx.total_cmp(&dy).then_with(|| meetings(x).cmp(&meetings(y)))
    });

    let capped: Vec<&EngineEntry> = others
        .iter()
        .copied()
        .filter(|e| meetings(e) < params.max_pair_games)
        .collect();
    let candidates = if capped.is_empty() { others } else { capped };

    if rng.gen::<f64>() < params.lower_rated_probability {
        let lower: Vec<&EngineEntry> = candidates
            .iter()
            .copied()
            .filter(|e| e.rating < eng_a.rating)
            .collect();
        if !lower.is_empty() {
            let pick = lower[rng.gen_range(0..lower.len())];
            return Ok((eng_a.name.clone(), pick.name.clone()));
        }
    }

    if candidates.len() > 1 && rng.gen::<f64>() < params.mix_probability {
        let pick = candidates[rng.gen_range(1..candidates.len())];
        return Ok((eng_a.name.clone(), pick.name.clone()));
    }

    Ok((eng_a.name.clone(), candidates[0].name.clone()))
}
