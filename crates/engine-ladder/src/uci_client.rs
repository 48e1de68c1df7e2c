//! UCI (Universal Chess Interface) client for communicating with chess engines.
//!
//! This module spawns a UCI-compatible chess engine as a subprocess and talks
//! to it over stdin/stdout. A dedicated reader thread continuously drains the
//! engine's output into an unbounded channel, so writing commands never
//! contends with the engine's asynchronous chatter and the OS pipe buffer can
//! never back up against the orchestrator.
//!
//! Handshake waits (`uciok`, `readyok`) are bounded by a timeout; the
//! best-move wait is unbounded by default but can be bounded via
//! [`UciClient::choose_move`]'s `move_timeout` argument.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::time::Duration;
//! use engine_ladder::uci_client::UciClient;
//!
//! let mut client = UciClient::spawn("/usr/bin/stockfish", "stockfish", false).unwrap();
//! client.init(&BTreeMap::new(), Duration::from_secs(5)).unwrap();
//! client.new_game(Duration::from_secs(5)).unwrap();
//! let best = client.choose_move(&[], 500, None).unwrap();
//! println!("Best move: {}", best);
//! client.stop();
//! ```

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Errors that can occur when communicating with a UCI engine.
#[derive(Error, Debug)]
pub enum UciError {
    /// Failed to spawn the engine process or perform I/O on its pipes.
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The engine did not produce the expected handshake token in time.
    #[error("{engine}: no line containing '{token}' within {timeout_ms}ms")]
    HandshakeTimeout {
        engine: String,
        token: String,
        timeout_ms: u64,
    },
    /// The engine did not produce a `bestmove` line within the bounded wait.
    #[error("{engine}: no bestmove within {timeout_ms}ms")]
    SearchTimeout { engine: String, timeout_ms: u64 },
    /// The engine closed its output stream (process died or hung up).
    #[error("{engine}: engine output stream closed")]
    StreamClosed { engine: String },
    /// The engine returned a response the protocol does not allow here.
    #[error("{engine}: protocol violation: {line:?}")]
    ProtocolViolation { engine: String, line: String },
}

/// A client for one UCI engine subprocess.
///
/// The client owns the child process, a writer handle to its stdin, and the
/// receiving end of the line queue filled by the background reader thread.
///
/// # Lifecycle
///
/// 1. [`UciClient::spawn`] starts the process and the reader thread
/// 2. [`UciClient::init`] performs the UCI handshake and applies options
/// 3. [`UciClient::new_game`] resets the engine between games
/// 4. [`UciClient::choose_move`] synchronizes the position and searches
/// 5. [`UciClient::stop`] terminates the process (also run on [`Drop`])
///
/// Any handshake failure kills the subprocess before the error is returned,
/// so a timed-out engine is never left running.
pub struct UciClient {
    /// Display name used in logs and error messages.
    name: String,
    /// The child process handle.
    process: Child,
    /// Handle to write commands to the engine's stdin.
    stdin: ChildStdin,
    /// Receiving end of the line queue filled by the reader thread.
    lines: Receiver<String>,
    /// Whether wire traffic is mirrored to the log sink.
    log_io: bool,
    /// False once the process has been stopped.
    alive: bool,
}

impl UciClient {
    /// Spawns a new UCI engine process and its reader thread.
    ///
    /// The process is started with piped stdin/stdout; stderr is discarded.
    /// The reader thread drains stdout into an unbounded channel until the
    /// stream closes, so it can never block on a full queue.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the UCI engine executable.
    /// * `name` - Display name used in logs and errors.
    /// * `log_io` - Mirror all wire traffic to the log sink at trace level.
    ///
    /// # Errors
    ///
    /// Returns [`UciError::Io`] if the process cannot be spawned, typically
    /// because the executable does not exist or lacks permissions.
    pub fn spawn<P: AsRef<Path>>(path: P, name: &str, log_io: bool) -> Result<Self, UciError> {
        let mut process = Command::new(path.as_ref())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("child stdin not piped"))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("child stdout not piped"))?;

        let (tx, rx) = mpsc::channel::<String>();
        let reader_name = name.to_string();
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(_) => break,
                };
                if log_io {
                    log::trace!("[{} <<] {}", reader_name, line);
                }
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            name: name.to_string(),
            process,
            stdin,
            lines: rx,
            log_io,
            alive: true,
        })
    }

    /// The engine's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the subprocess is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.process.try_wait(), Ok(None))
    }

    /// Sends one command line to the engine.
    fn send(&mut self, cmd: &str) -> Result<(), UciError> {
        if self.log_io {
            log::trace!("[{} >>] {}", self.name, cmd);
        }
        writeln!(self.stdin, "{}", cmd)?;
        self.stdin.flush()?;
        Ok(())
    }

    /// Consumes queued lines until one contains `token`, bounded by `timeout`.
    ///
    /// Lines that do not contain the token are discarded; engines are free to
    /// emit arbitrary `info` chatter between protocol responses.
    fn wait_for(&mut self, token: &str, timeout: Duration) -> Result<String, UciError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.lines.recv_timeout(remaining) {
                Ok(line) => {
                    if line.contains(token) {
                        return Ok(line);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(UciError::HandshakeTimeout {
                        engine: self.name.clone(),
                        token: token.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(UciError::StreamClosed {
                        engine: self.name.clone(),
                    });
                }
            }
        }
    }

    /// Performs the UCI handshake and applies the configured options.
    ///
    /// Sends `uci` and waits for `uciok`, sends one `setoption` per entry,
    /// then sends `isready` and waits for `readyok`. Both waits are bounded
    /// by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`UciError::HandshakeTimeout`] if a token does not arrive in
    /// time. On any error the subprocess is killed before returning, so a
    /// failed handshake never leaves the engine running.
    pub fn init(
        &mut self,
        options: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<(), UciError> {
        let result = self.init_inner(options, timeout);
        if result.is_err() {
            self.stop();
        }
        result
    }

    fn init_inner(
        &mut self,
        options: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<(), UciError> {
        self.send("uci")?;
        self.wait_for("uciok", timeout)?;

        for (key, value) in options {
            self.send(&format!("setoption name {} value {}", key, value))?;
        }

        self.send("isready")?;
        self.wait_for("readyok", timeout)?;
        Ok(())
    }

    /// Resets the engine for a new game.
    ///
    /// Sends `ucinewgame` followed by an `isready`/`readyok` probe with the
    /// same timeout semantics as [`init`](Self::init), including killing the
    /// subprocess on failure.
    pub fn new_game(&mut self, timeout: Duration) -> Result<(), UciError> {
        let result = self.new_game_inner(timeout);
        if result.is_err() {
            self.stop();
        }
        result
    }

    fn new_game_inner(&mut self, timeout: Duration) -> Result<(), UciError> {
        self.send("ucinewgame")?;
        self.send("isready")?;
        self.wait_for("readyok", timeout)?;
        Ok(())
    }

    /// Synchronizes the position and asks the engine for its best move.
    ///
    /// Sends `position startpos [moves ...]` built from the full move list
    /// since the starting position, then `go movetime N`, and consumes queued
    /// lines until one starts with `bestmove`.
    ///
    /// # Arguments
    ///
    /// * `moves` - All moves played since the starting position, in UCI
    ///   notation.
    /// * `movetime_ms` - Time budget passed to `go movetime`.
    /// * `move_timeout` - Bound for the bestmove wait. `None` waits
    ///   indefinitely; a stalled engine then hangs the ladder, so production
    ///   configs should set a bound.
    ///
    /// # Errors
    ///
    /// Returns [`UciError::SearchTimeout`] if a bound is set and expires, or
    /// [`UciError::ProtocolViolation`] if the `bestmove` line carries no move
    /// token or a null move. On any error the subprocess is killed.
    pub fn choose_move(
        &mut self,
        moves: &[String],
        movetime_ms: u64,
        move_timeout: Option<Duration>,
    ) -> Result<String, UciError> {
        let result = self.choose_move_inner(moves, movetime_ms, move_timeout);
        if result.is_err() {
            self.stop();
        }
        result
    }

    fn choose_move_inner(
        &mut self,
        moves: &[String],
        movetime_ms: u64,
        move_timeout: Option<Duration>,
    ) -> Result<String, UciError> {
        if moves.is_empty() {
            self.send("position startpos")?;
        } else {
            self.send(&format!("position startpos moves {}", moves.join(" ")))?;
        }
        self.send(&format!("go movetime {}", movetime_ms))?;

        let deadline = move_timeout.map(|t| Instant::now() + t);
        loop {
            let line = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match self.lines.recv_timeout(remaining) {
                        Ok(line) => line,
                        Err(RecvTimeoutError::Timeout) => {
                            return Err(UciError::SearchTimeout {
                                engine: self.name.clone(),
                                timeout_ms: move_timeout.unwrap_or_default().as_millis() as u64,
                            });
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            return Err(UciError::StreamClosed {
                                engine: self.name.clone(),
                            });
                        }
                    }
                }
                None => self.lines.recv().map_err(|_| UciError::StreamClosed {
                    engine: self.name.clone(),
                })?,
            };

            if !line.starts_with("bestmove") {
                continue;
            }

            let token = line.split_whitespace().nth(1).unwrap_or("");
            if token.is_empty() || token == "(none)" || token == "0000" {
                return Err(UciError::ProtocolViolation {
                    engine: self.name.clone(),
                    line,
                });
            }
            return Ok(token.to_string());
        }
    }

    /// Terminates the engine subprocess.
    ///
    /// Sends `quit` best-effort, then kills and reaps the process. Idempotent
    /// and safe to call multiple times; failures are swallowed because the
    /// force-kill remedy has already been attempted.
    pub fn stop(&mut self) {
        if !self.alive {
            return;
        }
        self.alive = false;
        let _ = self.send("quit");
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

impl Drop for UciClient {
    /// Ensures the subprocess is terminated when the client is dropped, so
    /// early returns in the game loop can never leak an engine process.
    fn drop(&mut self) {
        self.stop();
    }
}
