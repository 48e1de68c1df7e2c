//! Game execution: plays exactly one game between two engines.
//!
//! The runner seeds the board with an opening prefix, coin-flips colors,
//! drives both [`UciClient`]s through the move loop with legality validation
//! on every engine reply, and writes a PGN transcript of the finished game.
//! Both subprocesses are guaranteed terminated on every path out of the
//! loop: the happy path stops them explicitly, and the [`Drop`] impl on
//! [`UciClient`] covers early error returns.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chess::{ChessMove, Color, Game};
use rand::Rng;
use thiserror::Error;

use crate::openings::OpeningBook;
use crate::pgn;
use crate::registry::EngineEntry;
use crate::uci_client::{UciClient, UciError};

/// Errors that can occur during game execution.
///
/// All of these are fatal to the current game only: the engines are killed,
/// the game is abandoned, and no ledger row is written.
#[derive(Error, Debug)]
pub enum GameError {
    /// An error occurred while communicating with a UCI engine.
    #[error("UCI error: {0}")]
    Uci(#[from] UciError),
    /// An engine returned a move that does not parse or is not legal in the
    /// current position.
    #[error("{engine} played an illegal move: {mv}")]
    IllegalMove { engine: String, mv: String },
    /// The transcript could not be written.
    #[error("failed to write transcript: {0}")]
    Transcript(#[from] std::io::Error),
}

/// Per-game settings, derived from the ladder configuration.
#[derive(Debug, Clone)]
pub struct GameSettings {
    /// Time budget per move, in milliseconds.
    pub movetime_ms: u64,
    /// Bound for handshake waits.
    pub handshake_timeout: Duration,
    /// Optional bound for the bestmove wait.
    pub move_timeout: Option<Duration>,
    /// Directory for PGN transcripts.
    pub pgn_dir: PathBuf,
    /// Mirror engine wire traffic to the log sink.
    pub log_engine_io: bool,
}

/// The outcome of one completed game, from engine A's perspective.
#[derive(Debug, Clone)]
pub struct GameRecord {
    pub white_name: String,
    pub black_name: String,
    /// All moves played, including the applied opening prefix, in UCI
    /// notation.
    pub moves: Vec<String>,
    /// The opening prefix actually applied (may be shorter than the sampled
    /// line if the book turned out corrupt).
    pub opening: Vec<String>,
    /// "1-0", "0-1" or "1/2-1/2".
    pub result_str: String,
    /// Score from A's perspective: 1.0, 0.5 or 0.0.
    pub result_a: f64,
    /// The color A played: "white" or "black".
    pub color_a: String,
    /// Path of the written transcript.
    pub pgn_path: String,
}

/// Plays one game between engines `a` and `b` and writes its transcript.
///
/// Colors are coin-flipped with the injected rng; the opening prefix comes
/// from `book` and is validated move by move, stopping early at the first
/// illegal prefix move rather than failing the game. Game termination
/// (checkmate, stalemate, threefold repetition, fifty-move rule) is
/// delegated to the rules library.
///
/// # Errors
///
/// Any [`GameError`] abandons the game with both subprocesses terminated.
pub fn play_game<R: Rng>(
    a: &EngineEntry,
    b: &EngineEntry,
    book: &dyn OpeningBook,
    settings: &GameSettings,
    rng: &mut R,
) -> Result<GameRecord, GameError> {
    let mut game = Game::new();
    let mut moves: Vec<String> = Vec::new();

    let mut opening = book.sample(rng);
    let applied = apply_opening(&mut game, &opening, &mut moves);
    opening.truncate(applied);

    let a_is_white = rng.gen_bool(0.5);
    let (white_entry, black_entry) = if a_is_white { (a, b) } else { (b, a) };

    log::debug!(
        "starting game: {} (white) vs {} (black), {} book plies",
        white_entry.name,
        black_entry.name,
        opening.len()
    );

    let mut white = start_engine(white_entry, settings)?;
    let mut black = start_engine(black_entry, settings)?;

    let loop_result = run_move_loop(&mut game, &mut white, &mut black, &mut moves, settings);
    white.stop();
    black.stop();
    loop_result?;

    let result_str = match game.result() {
        Some(chess::GameResult::WhiteCheckmates) | Some(chess::GameResult::BlackResigns) => "1-0",
        Some(chess::GameResult::BlackCheckmates) | Some(chess::GameResult::WhiteResigns) => "0-1",
        _ => "1/2-1/2",
    };
    let result_a = match result_str {
        "1-0" => {
            if a_is_white {
                1.0
            } else {
                0.0
            }
        }
        "0-1" => {
            if a_is_white {
                0.0
            } else {
                1.0
            }
        }
        _ => 0.5,
    };

    let mut record = GameRecord {
        white_name: white_entry.name.clone(),
        black_name: black_entry.name.clone(),
        moves,
        opening,
        result_str: result_str.to_string(),
        result_a,
        color_a: if a_is_white { "white" } else { "black" }.to_string(),
        pgn_path: String::new(),
    };

    std::fs::create_dir_all(&settings.pgn_dir)?;
    let filename = format!(
        "{}_{}_vs_{}.pgn",
        chrono::Local::now().format("%Y%m%d_%H%M%S"),
        record.white_name,
        record.black_name
    );
    let pgn_path = settings.pgn_dir.join(filename);
    pgn::write_transcript(&pgn_path, &record)?;
    record.pgn_path = pgn_path.to_string_lossy().into_owned();

    Ok(record)
}

/// Applies the book prefix to a fresh game, stopping at the first move that
/// does not parse or is illegal in the running position. Returns how many
/// prefix moves were applied.
fn apply_opening(game: &mut Game, opening: &[String], moves: &mut Vec<String>) -> usize {
    for (i, uci) in opening.iter().enumerate() {
        let mv = match ChessMove::from_str(uci) {
            Ok(mv) => mv,
            Err(_) => return i,
        };
        if !game.current_position().legal(mv) {
            return i;
        }
        game.make_move(mv);
        moves.push(uci.clone());
    }
    opening.len()
}

fn start_engine(entry: &EngineEntry, settings: &GameSettings) -> Result<UciClient, GameError> {
    let mut client = UciClient::spawn(&entry.path, &entry.name, settings.log_engine_io)?;
    client.init(&entry.options, settings.handshake_timeout)?;
    client.new_game(settings.handshake_timeout)?;
    Ok(client)
}

fn run_move_loop(
    game: &mut Game,
    white: &mut UciClient,
    black: &mut UciClient,
    moves: &mut Vec<String>,
    settings: &GameSettings,
) -> Result<(), GameError> {
    while game.result().is_none() {
        // Threefold / fifty-move adjudication is on the rules library; it
        // only takes effect when asked.
        if game.can_declare_draw() {
            game.declare_draw();
            continue;
        }

        let client = match game.side_to_move() {
            Color::White => &mut *white,
            Color::Black => &mut *black,
        };

        let uci = client.choose_move(moves, settings.movetime_ms, settings.move_timeout)?;
        let illegal = |mv: &str| GameError::IllegalMove {
            engine: client.name().to_string(),
            mv: mv.to_string(),
        };

        let mv = ChessMove::from_str(&uci).map_err(|_| illegal(&uci))?;
        if !game.current_position().legal(mv) {
            return Err(illegal(&uci));
        }
        game.make_move(mv);
        moves.push(uci);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openings::{LineBook, NoBook};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeMap;

    /// Writes an executable shell script implementing just enough UCI to
    /// play a fixed move sequence, indexed by how many moves the `position`
    /// command carries.
    #[cfg(unix)]
    fn scripted_engine(name: &str, moves: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = format!(
            r#"#!/bin/sh
moves="{moves}"
count=0
while read line; do
  set -- $line
  case "$1" in
    uci) echo "id name scripted"; echo "uciok";;
    isready) echo "readyok";;
    position)
      if [ "$#" -ge 3 ]; then shift 3; count=$#; else count=0; fi;;
    go)
      i=0
      for m in $moves; do
        if [ "$i" -eq "$count" ]; then echo "bestmove $m"; break; fi
        i=$((i+1))
      done;;
    quit) exit 0;;
  esac
done
"#
        );
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, script).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn entry(name: &str, path: PathBuf) -> EngineEntry {
        EngineEntry {
            name: name.to_string(),
            path,
            options: BTreeMap::new(),
            base_elo: None,
            is_anchor: false,
            rating: 2000.0,
            games: 0,
        }
    }

    fn settings(pgn_subdir: &str) -> GameSettings {
        GameSettings {
            movetime_ms: 10,
            handshake_timeout: Duration::from_secs(5),
            move_timeout: Some(Duration::from_secs(5)),
            pgn_dir: std::env::temp_dir().join(pgn_subdir),
            log_engine_io: false,
        }
    }

    #[test]
    fn test_apply_opening_stops_at_illegal_move() {
        let mut game = Game::new();
        let mut moves = Vec::new();
        let opening: Vec<String> = vec!["e2e4", "e7e5", "e4e6", "g8f6"]
            .into_iter()
            .map(String::from)
            .collect();

        let applied = apply_opening(&mut game, &opening, &mut moves);
        assert_eq!(applied, 2, "pawn e4-e6 is not a legal move");
        assert_eq!(moves, vec!["e2e4", "e7e5"]);
    }

    #[test]
    fn test_apply_opening_stops_at_unparseable_move() {
        let mut game = Game::new();
        let mut moves = Vec::new();
        let opening: Vec<String> = vec!["e2e4", "??", "e7e5"]
            .into_iter()
            .map(String::from)
            .collect();

        assert_eq!(apply_opening(&mut game, &opening, &mut moves), 1);
    }

    /// Both scripts play the fool's mate line; black always mates on move 2.
    #[cfg(unix)]
    #[test]
    fn test_scripted_game_ends_in_fools_mate() {
        let path = scripted_engine("engine_ladder_test_foolsmate.sh", "f2f3 e7e5 g2g4 d8h4");
        let a = entry("scripted-a", path.clone());
        let b = entry("scripted-b", path.clone());
        let settings = settings("engine_ladder_test_pgn_fools");
        let mut rng = StdRng::seed_from_u64(17);

        let record = play_game(&a, &b, &NoBook, &settings, &mut rng).expect("game should finish");

        assert_eq!(record.result_str, "0-1");
        assert_eq!(record.moves, vec!["f2f3", "e7e5", "g2g4", "d8h4"]);
        // Black won; A's score must match the color A was dealt.
        if record.color_a == "black" {
            assert_eq!(record.result_a, 1.0);
        } else {
            assert_eq!(record.result_a, 0.0);
        }
        assert!(
            std::path::Path::new(&record.pgn_path).exists(),
            "transcript must be written"
        );

        std::fs::remove_dir_all(&settings.pgn_dir).ok();
        std::fs::remove_file(&path).ok();
    }

    /// The book supplies the first two plies; the scripts continue from ply
    /// three because they index by the position's move count.
    #[cfg(unix)]
    #[test]
    fn test_scripted_game_with_book_prefix() {
        let path = scripted_engine("engine_ladder_test_bookgame.sh", "f2f3 e7e5 g2g4 d8h4");
        let a = entry("scripted-a", path.clone());
        let b = entry("scripted-b", path.clone());
        let settings = settings("engine_ladder_test_pgn_book");
        let mut rng = StdRng::seed_from_u64(23);

        let book = LineBook::new(
            vec![vec!["f2f3".to_string(), "e7e5".to_string()]],
            10,
        );
        let record = play_game(&a, &b, &book, &settings, &mut rng).expect("game should finish");

        assert_eq!(record.opening, vec!["f2f3", "e7e5"]);
        assert_eq!(record.result_str, "0-1");
        assert_eq!(record.moves.len(), 4);

        let transcript = std::fs::read_to_string(&record.pgn_path).unwrap();
        assert!(transcript.contains("[Opening \"book\"]"));
        assert!(transcript.contains("[StartMoves \"f2f3 e7e5\"]"));

        std::fs::remove_dir_all(&settings.pgn_dir).ok();
        std::fs::remove_file(&path).ok();
    }

    /// An engine answering with an illegal move fails the game.
    #[cfg(unix)]
    #[test]
    fn test_illegal_engine_move_is_fatal() {
        let path = scripted_engine("engine_ladder_test_illegal.sh", "e2e5");
        let a = entry("cheater-a", path.clone());
        let b = entry("cheater-b", path.clone());
        let settings = settings("engine_ladder_test_pgn_illegal");
        let mut rng = StdRng::seed_from_u64(5);

        let result = play_game(&a, &b, &NoBook, &settings, &mut rng);
        match result {
            Err(GameError::IllegalMove { mv, .. }) => assert_eq!(mv, "e2e5"),
            other => panic!("Expected IllegalMove, got {:?}", other.err()),
        }

        std::fs::remove_dir_all(&settings.pgn_dir).ok();
        std::fs::remove_file(&path).ok();
    }
}
