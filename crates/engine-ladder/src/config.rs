//! Configuration file loading for the engine ladder.
//!
//! The ladder is configured by a single TOML file (default `ladder.toml`)
//! containing one `[engines.NAME]` table per competitor and a `[ladder]`
//! table with the tournament settings. An engine with an `elo` key is an
//! anchor: its rating is fixed externally and never updated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// An engine entry points at an executable that does not exist.
    #[error("engine '{name}': executable not found: {path}")]
    MissingExecutable { name: String, path: PathBuf },
    /// An engine name contains a character the CSV ledger cannot carry.
    #[error("engine name {0:?} must not contain commas")]
    InvalidName(String),
}

/// Configuration for one competitor engine.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    /// Path to the UCI engine executable.
    pub path: PathBuf,
    /// UCI options applied during the handshake, in deterministic order.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    /// Fixed anchor rating. Presence marks the engine as an anchor whose
    /// rating is never updated by the rating engine.
    pub elo: Option<f64>,
}

/// Tournament settings from the `[ladder]` table.
///
/// Every field has a default, so an empty `[ladder]` table (or none at all)
/// yields a working configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LadderConfig {
    /// Path of the append-only CSV result ledger.
    #[serde(default = "default_results_csv")]
    pub results_csv: PathBuf,
    /// Path of the JSON rating snapshot, rewritten after every recompute.
    #[serde(default = "default_ratings_json")]
    pub ratings_json: PathBuf,
    /// Directory for per-game PGN transcripts.
    #[serde(default = "default_pgn_dir")]
    pub pgn_dir: PathBuf,
    /// Starting rating for engines without a fixed `elo`.
    #[serde(default = "default_elo")]
    pub default_elo: f64,
    /// Global Elo K-factor applied uniformly to every update.
    #[serde(default = "default_k_factor")]
    pub k_factor: f64,
    /// Soft cap on games per engine pair before deprioritising the pairing.
    #[serde(default = "default_max_pair_games")]
    pub max_pair_games: u32,
    /// Time budget per move, in milliseconds.
    #[serde(default = "default_movetime_ms")]
    pub movetime_ms: u64,
    /// Bound for handshake waits (`uciok` / `readyok`), in milliseconds.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Optional bound for the bestmove wait, in milliseconds. Unset waits
    /// indefinitely.
    pub move_timeout_ms: Option<u64>,
    /// Optional plain-text opening book: one whitespace-separated line of
    /// UCI moves per row.
    pub book_file: Option<PathBuf>,
    /// Maximum number of opening-book plies applied per game.
    #[serde(default = "default_book_max_depth")]
    pub book_max_depth: usize,
    /// Mirror all engine wire traffic to the log sink at trace level.
    #[serde(default)]
    pub log_engine_io: bool,
}

fn default_results_csv() -> PathBuf {
    PathBuf::from("data/results.csv")
}

fn default_ratings_json() -> PathBuf {
    PathBuf::from("data/ratings.json")
}

fn default_pgn_dir() -> PathBuf {
    PathBuf::from("data/pgn")
}

fn default_elo() -> f64 {
    2000.0
}

fn default_k_factor() -> f64 {
    20.0
}

fn default_max_pair_games() -> u32 {
    20
}

fn default_movetime_ms() -> u64 {
    500
}

fn default_handshake_timeout_ms() -> u64 {
    5000
}

fn default_book_max_depth() -> usize {
    10
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            results_csv: default_results_csv(),
            ratings_json: default_ratings_json(),
            pgn_dir: default_pgn_dir(),
            default_elo: default_elo(),
            k_factor: default_k_factor(),
            max_pair_games: default_max_pair_games(),
            movetime_ms: default_movetime_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            move_timeout_ms: None,
            book_file: None,
            book_max_depth: default_book_max_depth(),
            log_engine_io: false,
        }
    }
}

/// Main ladder configuration structure.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct ArenaConfig {
    /// Map of engine names to their configurations.
    #[serde(default)]
    pub engines: BTreeMap<String, EngineConfig>,
    /// Tournament settings.
    #[serde(default)]
    pub ladder: LadderConfig,
}

impl ArenaConfig {
    /// Loads the ladder configuration from the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if it contains invalid TOML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&content)?)
    }

    /// Validates every registry entry.
    ///
    /// Checks that each engine executable exists and that engine names are
    /// representable in the CSV ledger. Surfaced at startup; bad entries are
    /// fatal, never retried.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, engine) in &self.engines {
            if name.contains(',') {
                return Err(ConfigError::InvalidName(name.clone()));
            }
            if !engine.path.exists() {
                return Err(ConfigError::MissingExecutable {
                    name: name.clone(),
                    path: engine.path.clone(),
                });
            }
        }
        Ok(())
    }
}
