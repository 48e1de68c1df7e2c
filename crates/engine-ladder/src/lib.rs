//! Engine Ladder - a continuous rating ladder for UCI chess engines.
//!
//! This crate runs an automated tournament between UCI-compatible chess
//! engines: a scheduler picks the most informative next pairing, a game
//! runner drives one game between two engine subprocesses, the outcome is
//! appended to a flat CSV ledger, and Elo-style ratings are recomputed
//! from that ledger after every game.
//!
//! # Modules
//!
//! - [`config`] - TOML configuration and engine registry definitions
//! - [`registry`] - in-memory engine table with rating state
//! - [`uci_client`] - UCI protocol client for engine subprocesses
//! - [`openings`] - opening-book seam for seeding game prefixes
//! - [`game_runner`] - plays a single game between two engines
//! - [`ratings`] - Elo rating recomputation from the result ledger
//! - [`scheduler`] - next-pair selection policy
//! - [`ledger`] - append-only CSV result ledger
//! - [`pgn`] - per-game PGN transcript files

pub mod config;
pub mod game_runner;
pub mod ledger;
pub mod openings;
pub mod pgn;
pub mod ratings;
pub mod registry;
pub mod scheduler;
pub mod uci_client;
