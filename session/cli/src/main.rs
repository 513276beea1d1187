//! Tic-tac-toe / messenger terminal client
//!
//! Connects to a game server over WebSocket, then runs a fixed-interval
//! control loop: drain the session's event queue, draw, handle typed input.
//!
//! # Usage
//!
//! ```bash
//! # Prompted for room and user
//! tictactoe --address game.example.org --port 8080
//!
//! # Messenger mode
//! tictactoe --room lobby --user alice --mode messenger
//!
//! # Verbose logging (stderr)
//! RUST_LOG=session_core=debug tictactoe
//! ```
//!
//! In game mode type `row col` to play; `/quit` or EOF leaves.

mod input;
mod render;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use session_core::{load_config, ConfigOverrides, SendOutcome, Session, Surface};

use input::{parse_command, prompt, spawn_stdin_reader, Command, Mode};
use render::TerminalSurface;

/// Tic-tac-toe and messenger client
#[derive(Parser, Debug)]
#[command(name = "tictactoe")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Room to join (prompted for when absent)
    #[arg(short = 'r', long, env = "TICTACTOE_ROOM")]
    room: Option<String>,

    /// User identifier (prompted for when absent)
    #[arg(short = 'u', long, env = "TICTACTOE_USER")]
    user: Option<String>,

    /// Front-end mode
    #[arg(short = 'm', long, value_enum, default_value_t = Mode::Game)]
    mode: Mode,

    /// Server host
    #[arg(short = 'a', long, value_name = "HOST")]
    address: Option<String>,

    /// Server port
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// WebSocket request path
    #[arg(long, value_name = "PATH")]
    path: Option<String>,

    /// Worker service-loop wait in milliseconds
    #[arg(long, value_name = "MS")]
    service_timeout: Option<u64>,

    /// Control-loop tick in milliseconds
    #[arg(long, value_name = "MS")]
    tick_interval: Option<u64>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "TICTACTOE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "TICTACTOE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            address: self.address.clone(),
            port: self.port,
            path: self.path.clone(),
            service_timeout_ms: self.service_timeout,
            tick_interval_ms: self.tick_interval,
        }
    }
}

/// Initialize logging on stderr; stdout belongs to the game
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("session_cli={level},session_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .with_thread_names(true)
        .init();
}

fn identity(args: &Args) -> Result<(String, String)> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();

    let room = match args.room.clone() {
        Some(room) => room,
        None => prompt("Enter Room ID: ", &mut input, &mut output)?,
    };
    let user = match args.user.clone() {
        Some(user) => user,
        None => prompt("Enter User ID: ", &mut input, &mut output)?,
    };
    Ok((room, user))
}

/// Tick, draw, and handle input until the session closes
fn run<W: Write>(
    session: &mut Session,
    surface: &mut TerminalSurface<W>,
    mode: Mode,
    lines: &Receiver<String>,
) {
    loop {
        session.tick(surface);
        surface.flush();
        if session.state().is_closed() {
            break;
        }

        loop {
            let line = match lines.try_recv() {
                Ok(line) => line,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("Input closed; shutting down");
                    session.request_shutdown(surface);
                    break;
                }
            };

            match parse_command(&line, mode) {
                Command::Move { row, col } => {
                    // rejections are already on the status line
                    let _ = session.request_move(row, col, surface);
                }
                Command::Send(text) => match session.request_send(&text) {
                    SendOutcome::Sent => {}
                    SendOutcome::Truncated { dropped } => {
                        warn!(dropped, "Message too long; truncated");
                    }
                    SendOutcome::Discarded => warn!("Not connected; message dropped"),
                },
                Command::Quit => {
                    session.request_shutdown(surface);
                    break;
                }
                Command::Invalid(reason) => {
                    surface.on_status_changed(&reason);
                }
                Command::Ignore => {}
            }
        }
        surface.flush();

        if !session.state().is_closed() {
            thread::sleep(session.tick_interval());
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let (config, source) = load_config(args.config.as_deref(), &args.overrides())
        .context("Failed to load configuration")?;
    info!(url = %config.endpoint.url(), source = %source, "Configuration loaded");

    let (room, user) = identity(&args)?;

    let mut session = Session::new(config);
    session
        .request_connect(room.as_str(), user.as_str())
        .context("Failed to connect")?;

    let lines = spawn_stdin_reader().context("Failed to start input reader")?;
    let mut surface = TerminalSurface::new(io::stdout(), args.mode);

    run(&mut session, &mut surface, args.mode, &lines);

    info!(room = %room, user = %user, "Session ended");
    Ok(())
}
