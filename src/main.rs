//! Chess Sessions - console client
//!
//! Drives the session manager by hand, the way a chat front end would.

#![warn(missing_docs)]

mod cli;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use chess_sessions::{BotConfig, ChannelId, GameSession, PlayerId, SessionManager, spawn_sweeper};
use clap::Parser;
use cli::{Cli, Command};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

const CONSOLE_HELP: &str = "Commands: new W B | fen W B FEN | move P M | resign P | board \
     | suggest [N] | engine | explain | pgn | stats | state | quit";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Console { channel } => run_console(config, channel).await,
        Command::Analyze { moves, fen, count } => run_analyze(config, moves, fen, count),
    }
}

#[instrument]
fn load_config(path: &Path) -> Result<BotConfig> {
    if path.exists() {
        Ok(BotConfig::from_file(path)?)
    } else {
        info!("Config file not found at {}, using defaults", path.display());
        Ok(BotConfig::default())
    }
}

/// Replay a move list and describe the resulting position
#[instrument(skip(config))]
fn run_analyze(
    config: BotConfig,
    moves: Vec<String>,
    fen: Option<String>,
    count: usize,
) -> Result<()> {
    let mut session = match &fen {
        Some(fen) => GameSession::from_fen(1, 2, 0, fen, &config)?,
        None => GameSession::with_config(1, 2, 0, &config)?,
    };

    for text in &moves {
        let report = session.apply_move(text)?;
        let note = report.note().to_string();
        if note.is_empty() {
            println!("{}", report.short());
        } else {
            println!("{} {}", report.short(), note);
        }
    }

    println!("FEN: {}", session.board().fen());
    println!("Status: {}", session.status());
    for (rank, suggestion) in session.suggestions(count).iter().enumerate() {
        println!("{}. {} ({:.1})", rank + 1, suggestion.notation(), suggestion.score());
    }
    println!();
    print!("{}", session.explain());
    Ok(())
}

/// Read line commands from stdin against one channel
#[instrument(skip(config))]
async fn run_console(config: BotConfig, channel: ChannelId) -> Result<()> {
    let interval = Duration::from_secs(*config.sweep_interval_secs());
    let max_idle = *config.max_idle_secs();
    let manager = SessionManager::with_config(config);
    let (sweeper, mut expired) = spawn_sweeper(manager.clone(), interval, max_idle);

    info!(channel, "Console ready");
    println!("{}", CONSOLE_HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(evicted) = expired.recv() => {
                for gone in evicted {
                    println!("Game {} expired due to inactivity.", gone.id());
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim() == "quit" {
                    break;
                }
                println!("{}", handle_command(&manager, channel, &line));
            }
        }
    }

    sweeper.abort();
    info!("Console closed");
    Ok(())
}

fn parse_player(text: Option<&str>) -> Option<PlayerId> {
    text.and_then(|t| t.parse().ok())
}

/// Executes one console command and returns the text to print
fn handle_command(manager: &SessionManager, channel: ChannelId, line: &str) -> String {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return String::new();
    };

    match command {
        "new" | "fen" => {
            let (Some(white), Some(black)) =
                (parse_player(words.next()), parse_player(words.next()))
            else {
                return "usage: new WHITE BLACK".to_string();
            };
            let created = if command == "fen" {
                let fen = words.collect::<Vec<_>>().join(" ");
                manager.create_from_fen(white, black, channel, &fen)
            } else {
                manager.create(white, black, channel)
            };
            match created {
                Ok(handle) => {
                    let session = handle.lock();
                    format!("Game {} started. White: {}, Black: {}", session.id(), white, black)
                }
                Err(e) => e.kind().to_string(),
            }
        }
        "move" => {
            let (Some(player), Some(notation)) = (parse_player(words.next()), words.next()) else {
                return "usage: move PLAYER MOVE".to_string();
            };
            let Some(handle) = manager.find_for_player(player, Some(channel)) else {
                return "You are not in an active game in this channel.".to_string();
            };
            let (reply, finished) = {
                let mut session = handle.lock();
                match session.apply_move_as(player, notation) {
                    Ok(report) => {
                        let mut reply =
                            format!("{} played {}. {}", player, report.short(), report.note());
                        if !session.is_active() {
                            match session.export_record() {
                                Ok(record) => reply.push_str(&format!("\n{}", record)),
                                Err(e) => warn!(error = %e, "Could not export record"),
                            }
                        }
                        (reply, (!session.is_active()).then(|| session.id().clone()))
                    }
                    Err(e) => (e.kind().to_string(), None),
                }
            };
            if let Some(id) = finished {
                manager.remove(&id);
            }
            reply
        }
        "resign" => {
            let Some(player) = parse_player(words.next()) else {
                return "usage: resign PLAYER".to_string();
            };
            let Some(handle) = manager.find_for_player(player, Some(channel)) else {
                return "You are not in an active game in this channel.".to_string();
            };
            let id = handle.lock().id().clone();
            if manager.resign(&id, player) {
                manager.remove(&id);
                format!("{} resigned.", player)
            } else {
                "Could not resign.".to_string()
            }
        }
        "board" | "suggest" | "engine" | "explain" | "pgn" | "state" => {
            let Some(handle) = manager.find_by_channel(channel) else {
                return "There is no active chess game in this channel.".to_string();
            };
            let mut session = handle.lock();
            match command {
                "board" => format!(
                    "{}\nTurn: {}",
                    session.board().fen(),
                    session.current_turn_player()
                ),
                "suggest" => {
                    let count = words
                        .next()
                        .and_then(|n| n.parse().ok())
                        .unwrap_or(*manager.config().suggestion_count());
                    session
                        .suggestions(count)
                        .iter()
                        .enumerate()
                        .map(|(i, s)| format!("{}. {} ({:.1})", i + 1, s.notation(), s.score()))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
                "engine" => session
                    .engine_move()
                    .map(|mv| format!("Engine suggests {}", mv))
                    .unwrap_or_else(|| "No legal moves.".to_string()),
                "explain" => session.explain().to_string(),
                "pgn" => session
                    .export_record()
                    .unwrap_or_else(|e| e.kind().to_string()),
                _ => serde_json::to_string_pretty(&session.snapshot())
                    .unwrap_or_else(|e| format!("Could not serialise game: {}", e)),
            }
        }
        "stats" => {
            let stats = manager.stats();
            format!(
                "Total: {}, Active: {}, Finished: {}",
                stats.total(),
                stats.active(),
                stats.finished()
            )
        }
        other => format!("Unknown command: {}", other),
    }
}
