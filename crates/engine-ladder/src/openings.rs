//! Opening-book seam.
//!
//! The game runner seeds each game with an opening prefix obtained from an
//! [`OpeningBook`]. An empty prefix is a valid, not exceptional, outcome -
//! it simply means the game starts from the standard position. Book file
//! parsing beyond plain move-line lists is out of scope; a Polyglot reader
//! would plug in behind the same trait.

use std::path::Path;

use rand::seq::SliceRandom;
use rand::RngCore;

/// Source of opening-move prefixes.
pub trait OpeningBook {
    /// Returns one opening line as UCI moves from the starting position.
    /// May be empty.
    fn sample(&self, rng: &mut dyn RngCore) -> Vec<String>;
}

/// The no-book book: every game starts from the standard position.
pub struct NoBook;

impl OpeningBook for NoBook {
    fn sample(&self, _rng: &mut dyn RngCore) -> Vec<String> {
        Vec::new()
    }
}

/// A book backed by preloaded opening lines.
///
/// Sampling picks one line uniformly at random and truncates it to the
/// configured maximum depth.
pub struct LineBook {
    lines: Vec<Vec<String>>,
    max_depth: usize,
}

impl LineBook {
    pub fn new(lines: Vec<Vec<String>>, max_depth: usize) -> Self {
        Self { lines, max_depth }
    }

    /// Loads lines from a plain text file: one whitespace-separated sequence
    /// of UCI moves per row. Blank rows and `#` comment rows are skipped.
    pub fn from_file<P: AsRef<Path>>(path: P, max_depth: usize) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let lines = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|l| l.split_whitespace().map(str::to_string).collect())
            .collect();
        Ok(Self::new(lines, max_depth))
    }
}

impl OpeningBook for LineBook {
    fn sample(&self, rng: &mut dyn RngCore) -> Vec<String> {
        match self.lines.choose(rng) {
            Some(line) => line.iter().take(self.max_depth).cloned().collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_no_book_is_always_empty() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(NoBook.sample(&mut rng).is_empty());
    }

    #[test]
    fn test_empty_line_book_is_empty() {
        let mut rng = StdRng::seed_from_u64(0);
        let book = LineBook::new(Vec::new(), 10);
        assert!(book.sample(&mut rng).is_empty());
    }

    #[test]
    fn test_line_book_truncates_to_max_depth() {
        let mut rng = StdRng::seed_from_u64(0);
        let line: Vec<String> = ["e2e4", "c7c5", "g1f3", "d7d6", "d2d4"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let book = LineBook::new(vec![line], 3);

        let sampled = book.sample(&mut rng);
        assert_eq!(sampled, vec!["e2e4", "c7c5", "g1f3"]);
    }

    #[test]
    fn test_line_book_samples_every_line() {
        let mut rng = StdRng::seed_from_u64(4);
        let lines: Vec<Vec<String>> = vec![
            vec!["e2e4".to_string()],
            vec!["d2d4".to_string()],
            vec!["c2c4".to_string()],
        ];
        let book = LineBook::new(lines, 10);

        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(book.sample(&mut rng)[0].clone());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_from_file_skips_blank_and_comment_rows() {
        let path = std::env::temp_dir().join("engine_ladder_test_book.txt");
        std::fs::write(&path, "# sicilian\ne2e4 c7c5\n\nd2d4 g8f6\n").unwrap();

        let book = LineBook::from_file(&path, 10).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let sampled = book.sample(&mut rng);
        assert!(sampled == vec!["e2e4", "c7c5"] || sampled == vec!["d2d4", "g8f6"]);

        std::fs::remove_file(&path).ok();
    }
}
