//! In-memory engine table: descriptors plus mutable rating state.
//!
//! The registry is an explicit owned map passed by reference into the
//! scheduler and rating engine; there is no ambient or static state. The
//! descriptor half (name, path, options, anchor elo) is immutable for the
//! process lifetime; only `rating` and `games` are mutated, and only by the
//! rating engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::ArenaConfig;

/// One registered engine: identity, configuration, and rating state.
#[derive(Debug, Clone)]
pub struct EngineEntry {
    /// Unique name, used as the join key everywhere.
    pub name: String,
    /// Path to the executable.
    pub path: PathBuf,
    /// UCI options applied during the handshake.
    pub options: BTreeMap<String, String>,
    /// Fixed anchor rating from the config, if any.
    pub base_elo: Option<f64>,
    /// True when `base_elo` is set; anchor ratings are never updated.
    pub is_anchor: bool,
    /// Current rating estimate.
    pub rating: f64,
    /// Completed games, including anchor-vs-anchor games.
    pub games: u32,
}

/// Per-engine record in the JSON rating snapshot.
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub rating: f64,
    pub games: u32,
}

/// The owned engine table, keyed by engine name.
#[derive(Debug, Default)]
pub struct Registry {
    engines: BTreeMap<String, EngineEntry>,
}

impl Registry {
    /// Builds the registry from the loaded configuration.
    ///
    /// Anchors start at their fixed `elo`; unknowns start at the configured
    /// default. Game counts start at zero; call
    /// [`ratings::recompute`](crate::ratings::recompute) with the ledger to
    /// bring the state up to date.
    pub fn from_config(config: &ArenaConfig) -> Self {
        let engines = config
            .engines
            .iter()
            .map(|(name, cfg)| {
                let entry = EngineEntry {
                    name: name.clone(),
                    path: cfg.path.clone(),
                    options: cfg.options.clone(),
                    base_elo: cfg.elo,
                    is_anchor: cfg.elo.is_some(),
                    rating: cfg.elo.unwrap_or(config.ladder.default_elo),
                    games: 0,
                };
                (name.clone(), entry)
            })
            .collect();
        Self { engines }
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.engines.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&EngineEntry> {
        self.engines.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut EngineEntry> {
        self.engines.get_mut(name)
    }

    /// Iterates entries in deterministic (name) order.
    pub fn iter(&self) -> impl Iterator<Item = &EngineEntry> {
        self.engines.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut EngineEntry> {
        self.engines.values_mut()
    }

    /// Overlays rating state from a previous snapshot, if one exists.
    ///
    /// A missing snapshot is not an error: it simply means "no prior
    /// ratings". Snapshot entries for engines no longer in the registry are
    /// ignored. The snapshot only seeds the display before the first
    /// recompute; the ledger remains authoritative.
    pub fn load_snapshot<P: AsRef<Path>>(&mut self, path: P) -> std::io::Result<()> {
        let content = match std::fs::read_to_string(path.as_ref()) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        let snapshot: BTreeMap<String, SnapshotEntry> =
            serde_json::from_str(&content).map_err(std::io::Error::other)?;
        for (name, entry) in snapshot {
            if let Some(engine) = self.engines.get_mut(&name) {
                engine.rating = entry.rating;
                engine.games = entry.games;
            }
        }
        Ok(())
    }

    /// Writes the full rating snapshot, replacing any previous file.
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let snapshot: BTreeMap<&str, SnapshotEntry> = self
            .engines
            .values()
            .map(|e| {
                (
                    e.name.as_str(),
                    SnapshotEntry {
                        rating: e.rating,
                        games: e.games,
                    },
                )
            })
            .collect();
        let content = serde_json::to_string_pretty(&snapshot).map_err(std::io::Error::other)?;
        std::fs::write(path, content)
    }
}
