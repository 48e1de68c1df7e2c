//! Append-only CSV result ledger.
//!
//! One row per completed game, appended in chronological order and never
//! mutated or deleted. The ledger is the sole source of truth for ratings:
//! ratings are always a pure function of the ordered rows plus the static
//! anchor set. The header is written lazily when the file is first created.
//!
//! Columns: `game_id,timestamp,engine_a,engine_b,result_a,color_a,
//! movetime_ms,pgn_path`.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

const HEADER: &str = "game_id,timestamp,engine_a,engine_b,result_a,color_a,movetime_ms,pgn_path";

/// Errors that can occur reading or writing the ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A row does not have the expected shape. The ledger is the sole source
    /// of truth for ratings, so damage is surfaced rather than skipped.
    #[error("malformed ledger row {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// One immutable completed-game record.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRow {
    pub game_id: String,
    /// Unix seconds at append time.
    pub timestamp: i64,
    pub engine_a: String,
    pub engine_b: String,
    /// Score from A's perspective: 1.0, 0.5 or 0.0.
    pub result_a: f64,
    /// "white" or "black" - the color A played.
    pub color_a: String,
    pub movetime_ms: u64,
    /// Path of the PGN transcript, empty if none was written.
    pub pgn_path: String,
}

/// Handle to the CSV ledger file.
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Appends one row, creating the file (with header) on first use.
    ///
    /// The file is opened fresh for each append; the design assumes a single
    /// orchestrator process owns the ledger.
    pub fn append(&self, row: &MatchRow) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let fresh = !self.path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if fresh {
            writeln!(file, "{}", HEADER)?;
        }
        writeln!(
            file,
            "{},{},{},{},{},{},{},{}",
            row.game_id,
            row.timestamp,
            row.engine_a,
            row.engine_b,
            row.result_a,
            row.color_a,
            row.movetime_ms,
            row.pgn_path
        )?;
        Ok(())
    }

    /// Loads all rows in chronological (file) order.
    ///
    /// A missing file is an empty ledger, not an error.
    pub fn load(&self) -> Result<Vec<MatchRow>, LedgerError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut rows = Vec::new();
        for (i, line) in content.lines().enumerate() {
            if i == 0 || line.is_empty() {
                continue;
            }
            rows.push(parse_row(line, i + 1)?);
        }
        Ok(rows)
    }
}

fn parse_row(line: &str, line_no: usize) -> Result<MatchRow, LedgerError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 8 {
        return Err(LedgerError::Malformed {
            line: line_no,
            reason: format!("expected 8 columns, found {}", fields.len()),
        });
    }
    let malformed = |reason: &str| LedgerError::Malformed {
        line: line_no,
        reason: reason.to_string(),
    };

    Ok(MatchRow {
        game_id: fields[0].to_string(),
        timestamp: fields[1]
            .parse()
            .map_err(|_| malformed("timestamp is not an integer"))?,
        engine_a: fields[2].to_string(),
        engine_b: fields[3].to_string(),
        result_a: fields[4]
            .parse()
            .map_err(|_| malformed("result_a is not a float"))?,
        color_a: fields[5].to_string(),
        movetime_ms: fields[6]
            .parse()
            .map_err(|_| malformed("movetime_ms is not an integer"))?,
        pgn_path: fields[7].to_string(),
    })
}

/// Canonical unordered key for an engine pair.
pub fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Counts historical games per unordered engine pair.
///
/// Symmetric under argument order: `pair_counts[key(a,b)]` equals
/// `pair_counts[key(b,a)]` by construction.
pub fn pair_counts(rows: &[MatchRow]) -> HashMap<(String, String), u32> {
    let mut counts = HashMap::new();
    for row in rows {
        *counts
            .entry(pair_key(&row.engine_a, &row.engine_b))
            .or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(a: &str, b: &str, result_a: f64) -> MatchRow {
        MatchRow {
            game_id: format!("1700000000_{}_vs_{}", a, b),
            timestamp: 1_700_000_000,
            engine_a: a.to_string(),
            engine_b: b.to_string(),
            result_a,
            color_a: "white".to_string(),
            movetime_ms: 500,
            pgn_path: String::new(),
        }
    }

    fn temp_ledger(name: &str) -> Ledger {
        let path = std::env::temp_dir().join(name);
        std::fs::remove_file(&path).ok();
        Ledger::new(path)
    }

    #[test]
    fn test_append_writes_header_exactly_once() {
        let ledger = temp_ledger("engine_ladder_test_header.csv");
        ledger.append(&row("x", "y", 1.0)).unwrap();
        ledger.append(&row("y", "x", 0.5)).unwrap();

        let path = std::env::temp_dir().join("engine_ladder_test_header.csv");
        let content = std::fs::read_to_string(&path).unwrap();
        let header_lines = content.lines().filter(|l| l.starts_with("game_id")).count();
        assert_eq!(header_lines, 1);
        assert_eq!(content.lines().count(), 3);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_append_load_roundtrip_preserves_order() {
        let ledger = temp_ledger("engine_ladder_test_roundtrip.csv");
        let first = row("x", "y", 1.0);
        let second = row("y", "z", 0.0);
        ledger.append(&first).unwrap();
        ledger.append(&second).unwrap();

        let rows = ledger.load().unwrap();
        assert_eq!(rows, vec![first, second]);

        std::fs::remove_file(std::env::temp_dir().join("engine_ladder_test_roundtrip.csv")).ok();
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let ledger = Ledger::new("/nonexistent/dir/results.csv");
        assert!(ledger.load().unwrap().is_empty());
    }

    #[test]
    fn test_load_rejects_malformed_row() {
        let path = std::env::temp_dir().join("engine_ladder_test_malformed.csv");
        std::fs::write(&path, format!("{}\nnot,enough,columns\n", HEADER)).unwrap();

        let result = Ledger::new(&path).load();
        assert!(matches!(result, Err(LedgerError::Malformed { line: 2, .. })));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_pair_counts_symmetric() {
        let rows = vec![row("x", "y", 1.0), row("y", "x", 0.0), row("x", "z", 0.5)];
        let counts = pair_counts(&rows);

        assert_eq!(counts.get(&pair_key("x", "y")), Some(&2));
        assert_eq!(counts.get(&pair_key("y", "x")), Some(&2));
        assert_eq!(counts.get(&pair_key("z", "x")), Some(&1));
        assert_eq!(counts.get(&pair_key("y", "z")), None);
    }

    #[test]
    fn test_pair_key_order_independent() {
        assert_eq!(pair_key("alpha", "beta"), pair_key("beta", "alpha"));
        assert_eq!(pair_key("same", "same"), ("same".into(), "same".into()));
    }
}
