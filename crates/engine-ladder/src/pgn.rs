//! PGN transcript generation for completed ladder games.
//!
//! One file is written per game, containing the players, the result, and -
//! when the game was seeded from an opening book - the applied book line,
//! so a transcript is always replayable from the standard starting position.

use chrono::Utc;
use std::io::Write;
use std::path::Path;

use crate::game_runner::GameRecord;

/// Writes a completed game transcript to a PGN file.
///
/// Headers cover the Seven Tag Roster subset the ladder needs (Event, Site,
/// Date, White, Black, Result) plus an `Opening "book"` tag with the applied
/// starting move list when a book prefix was used. Moves are written in UCI
/// notation.
///
/// # Errors
///
/// Returns an `std::io::Error` if the file cannot be created or written.
pub fn write_transcript<P: AsRef<Path>>(path: P, record: &GameRecord) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;

    writeln!(file, "[Event \"Engine Ladder\"]")?;
    writeln!(file, "[Site \"local\"]")?;
    writeln!(file, "[Date \"{}\"]", Utc::now().format("%Y.%m.%d"))?;
    writeln!(file, "[White \"{}\"]", record.white_name)?;
    writeln!(file, "[Black \"{}\"]", record.black_name)?;
    writeln!(file, "[Result \"{}\"]", record.result_str)?;
    if !record.opening.is_empty() {
        writeln!(file, "[Opening \"book\"]")?;
        writeln!(file, "[StartMoves \"{}\"]", record.opening.join(" "))?;
    }
    writeln!(file)?;

    let mut move_text = String::new();
    for (i, mv) in record.moves.iter().enumerate() {
        if i % 2 == 0 {
            move_text.push_str(&format!("{}. ", i / 2 + 1));
        }
        move_text.push_str(mv);
        move_text.push(' ');
    }
    move_text.push_str(&record.result_str);

    // Wrap at 80 chars
    for chunk in move_text.as_bytes().chunks(80) {
        file.write_all(chunk)?;
        writeln!(file)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn record(opening: Vec<&str>) -> GameRecord {
        GameRecord {
            white_name: "WhiteBot".to_string(),
            black_name: "BlackBot".to_string(),
            moves: vec!["e2e4", "e7e5", "g1f3", "b8c6"]
                .into_iter()
                .map(String::from)
                .collect(),
            opening: opening.into_iter().map(String::from).collect(),
            result_str: "1-0".to_string(),
            result_a: 1.0,
            color_a: "white".to_string(),
            pgn_path: String::new(),
        }
    }

    #[test]
    fn test_transcript_headers_and_movetext() {
        let path = std::env::temp_dir().join("engine_ladder_test_transcript.pgn");
        write_transcript(&path, &record(vec![])).expect("write transcript");

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[Event \"Engine Ladder\"]"));
        assert!(contents.contains("[White \"WhiteBot\"]"));
        assert!(contents.contains("[Black \"BlackBot\"]"));
        assert!(contents.contains("[Result \"1-0\"]"));
        assert!(contents.contains("1. e2e4 e7e5"));
        assert!(contents.contains("2. g1f3 b8c6"));
        assert!(!contents.contains("[Opening"));

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_transcript_book_headers() {
        let path = std::env::temp_dir().join("engine_ladder_test_transcript_book.pgn");
        write_transcript(&path, &record(vec!["e2e4", "e7e5"])).expect("write transcript");

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[Opening \"book\"]"));
        assert!(contents.contains("[StartMoves \"e2e4 e7e5\"]"));

        fs::remove_file(&path).ok();
    }
}
