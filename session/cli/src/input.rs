//! Keyboard input
//!
//! Stdin is read on its own thread and handed to the control loop over a
//! channel, so the control thread only ever polls.

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver};
use std::thread;

use anyhow::{bail, Result};
use tracing::{debug, warn};

const QUIT: &str = "/quit";

/// Front-end flavour
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Board rendering; input is `row col`
    Game,
    /// Every line is sent as-is
    Messenger,
}

/// What one line of input asks for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Move { row: usize, col: usize },
    Send(String),
    Quit,
    /// Unusable input; the text explains why
    Invalid(String),
    Ignore,
}

/// Interpret a line typed in `mode`
pub fn parse_command(line: &str, mode: Mode) -> Command {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim() == QUIT {
        return Command::Quit;
    }

    match mode {
        Mode::Messenger => {
            if line.is_empty() {
                Command::Ignore
            } else {
                Command::Send(line.to_string())
            }
        }
        Mode::Game => {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return Command::Ignore;
            }
            parse_move(trimmed).unwrap_or_else(|| {
                Command::Invalid(format!("Expected `row col` or {QUIT}, got {trimmed:?}"))
            })
        }
    }
}

fn parse_move(text: &str) -> Option<Command> {
    let mut parts = text.split(|c: char| c.is_whitespace() || c == ',');
    let mut next = || parts.find(|p| !p.is_empty());

    let row = next()?.parse().ok()?;
    let col = next()?.parse().ok()?;
    if next().is_some() {
        return None;
    }
    Some(Command::Move { row, col })
}

/// Ask for a non-empty value, re-prompting on blank lines
pub fn prompt<R: BufRead, W: Write>(label: &str, input: &mut R, output: &mut W) -> Result<String> {
    loop {
        write!(output, "{label}")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            bail!("Input closed while waiting for {}", label.trim_end_matches([':', ' ']));
        }

        let value = line.trim();
        if !value.is_empty() {
            return Ok(value.to_string());
        }
    }
}

/// Forward stdin lines until EOF; the channel disconnects afterwards
pub fn spawn_stdin_reader() -> io::Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
            debug!("Stdin reader finished");
        })?;

    Ok(rx)
}
