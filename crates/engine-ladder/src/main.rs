use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::LevelFilter;
use rand::rngs::StdRng;
use rand::SeedableRng;
use simplelog::{Config as LogConfig, SimpleLogger};

use engine_ladder::config::ArenaConfig;
use engine_ladder::game_runner::{self, GameSettings};
use engine_ladder::ledger::{self, Ledger, MatchRow};
use engine_ladder::openings::{LineBook, NoBook, OpeningBook};
use engine_ladder::ratings::{self, RatingParams};
use engine_ladder::registry::Registry;
use engine_ladder::scheduler::{self, ScheduleParams};

#[derive(Parser)]
#[command(name = "engine-ladder")]
#[command(about = "Continuous rating ladder for UCI chess engines")]
struct Cli {
    /// Path to the ladder configuration file
    #[arg(short, long, default_value = "ladder.toml")]
    config: PathBuf,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play scheduled games and update ratings after each one
    Run {
        /// Number of games to play
        #[arg(short, long, default_value = "50")]
        games: u32,
        /// Override the configured time budget per move (ms)
        #[arg(long)]
        movetime: Option<u64>,
        /// Seed for reproducible scheduling and color decisions
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Recompute ratings from the ledger and print the standings
    Standings,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    SimpleLogger::init(level, LogConfig::default())?;

    let config = ArenaConfig::load(&cli.config)?;
    config.validate()?;

    match cli.command {
        Commands::Run {
            games,
            movetime,
            seed,
        } => run(&config, games, movetime, seed),
        Commands::Standings => standings(&config),
    }
}

/// The main tournament cycle: schedule a pair, play one game, append the
/// result to the ledger, fold it into the ratings, save the snapshot.
fn run(
    config: &ArenaConfig,
    games: u32,
    movetime: Option<u64>,
    seed: Option<u64>,
) -> Result<(), Box<dyn Error>> {
    let mut registry = Registry::from_config(config);
    registry.load_snapshot(&config.ladder.ratings_json)?;

    let ledger = Ledger::new(&config.ladder.results_csv);
    let mut rows = ledger.load()?;
    let rating_params = RatingParams {
        default_elo: config.ladder.default_elo,
        k_factor: config.ladder.k_factor,
    };
    ratings::recompute(&mut registry, &rows, &rating_params);

    let schedule_params = ScheduleParams {
        max_pair_games: config.ladder.max_pair_games,
        ..ScheduleParams::default()
    };
    let settings = GameSettings {
        movetime_ms: movetime.unwrap_or(config.ladder.movetime_ms),
        handshake_timeout: Duration::from_millis(config.ladder.handshake_timeout_ms),
        move_timeout: config.ladder.move_timeout_ms.map(Duration::from_millis),
        pgn_dir: config.ladder.pgn_dir.clone(),
        log_engine_io: config.ladder.log_engine_io,
    };
    let book: Box<dyn OpeningBook> = match &config.ladder.book_file {
        Some(path) => Box::new(LineBook::from_file(path, config.ladder.book_max_depth)?),
        None => Box::new(NoBook),
    };
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    log::info!("running ladder: {} engines, {} games", registry.len(), games);
    for engine in registry.iter() {
        log::info!(
            "- {} ({:.1}{})",
            engine.name,
            engine.rating,
            if engine.is_anchor { ", anchor" } else { "" }
        );
    }

    for i in 1..=games {
        let counts = ledger::pair_counts(&rows);
        let (name_a, name_b) =
            scheduler::choose_pair(&registry, &counts, &schedule_params, &mut rng)?;

        let (entry_a, entry_b) = match (registry.get(&name_a), registry.get(&name_b)) {
            (Some(a), Some(b)) => (a.clone(), b.clone()),
            _ => continue,
        };
        log::info!(
            "game {}/{}: {} ({:.1}) vs {} ({:.1})",
            i,
            games,
            entry_a.name,
            entry_a.rating,
            entry_b.name,
            entry_b.rating
        );

        let record = match game_runner::play_game(&entry_a, &entry_b, book.as_ref(), &settings, &mut rng)
        {
            Ok(record) => record,
            Err(e) => {
                // Fatal to this game only: no ledger row, move on.
                log::error!("game abandoned: {}", e);
                continue;
            }
        };

        let timestamp = chrono::Utc::now().timestamp();
        let row = MatchRow {
            game_id: format!("{}_{}_vs_{}", timestamp, name_a, name_b),
            timestamp,
            engine_a: name_a.clone(),
            engine_b: name_b.clone(),
            result_a: record.result_a,
            color_a: record.color_a.clone(),
            movetime_ms: settings.movetime_ms,
            pgn_path: record.pgn_path.clone(),
        };
        ledger.append(&row)?;
        ratings::apply_row(&mut registry, &row, &rating_params);
        rows.push(row);
        registry.save_snapshot(&config.ladder.ratings_json)?;

        let rating_a = registry.get(&name_a).map(|e| e.rating).unwrap_or_default();
        let rating_b = registry.get(&name_b).map(|e| e.rating).unwrap_or_default();
        log::info!(
            "result: {} vs {} -> {} | ratings: {} {:.1}, {} {:.1}",
            name_a,
            name_b,
            record.result_str,
            name_a,
            rating_a,
            name_b,
            rating_b
        );
    }

    Ok(())
}

/// Recomputes ratings from the full ledger and prints the table.
fn standings(config: &ArenaConfig) -> Result<(), Box<dyn Error>> {
    let mut registry = Registry::from_config(config);
    let rows = Ledger::new(&config.ladder.results_csv).load()?;
    let rating_params = RatingParams {
        default_elo: config.ladder.default_elo,
        k_factor: config.ladder.k_factor,
    };
    ratings::recompute(&mut registry, &rows, &rating_params);

    let mut table: Vec<_> = registry.iter().collect();
    table.sort_by(|a, b| b.rating.total_cmp(&a.rating));

    println!("{:<24} {:>8} {:>6}", "engine", "rating", "games");
    for engine in table {
        println!(
            "{:<24} {:>8.1} {:>6}{}",
            engine.name,
            engine.rating,
            engine.games,
            if engine.is_anchor { "  (anchor)" } else { "" }
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run_command() {
        let cli = Cli::try_parse_from([
            "engine-ladder",
            "run",
            "--games",
            "5",
            "--movetime",
            "250",
            "--seed",
            "42",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("ladder.toml"));
        match cli.command {
            Commands::Run {
                games,
                movetime,
                seed,
            } => {
                assert_eq!(games, 5);
                assert_eq!(movetime, Some(250));
                assert_eq!(seed, Some(42));
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_cli_run_defaults() {
        let cli = Cli::try_parse_from(["engine-ladder", "run"]).unwrap();
        match cli.command {
            Commands::Run {
                games,
                movetime,
                seed,
            } => {
                assert_eq!(games, 50);
                assert!(movetime.is_none());
                assert!(seed.is_none());
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_cli_parses_standings_with_config_override() {
        let cli =
            Cli::try_parse_from(["engine-ladder", "--config", "my.toml", "standings"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("my.toml"));
        assert!(matches!(cli.command, Commands::Standings));
    }
}
