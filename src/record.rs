//! Portable game records and serialisable session snapshots.
//!
//! Movetext is rebuilt purely from the long-notation move log, so an export
//! never depends on engine or board state held in memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shakmaty::Color;
use strum::{Display, EnumString};
use tracing::instrument;

use crate::error::RulesError;
use crate::oracle::Board;
use crate::session::GameResult;
use crate::{ChannelId, PlayerId, SessionId};

/// Header values for an exported record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeaders<'a> {
    /// Event label.
    pub event: &'a str,
    /// White participant.
    pub white: PlayerId,
    /// Black participant.
    pub black: PlayerId,
    /// Date the game started.
    pub date: DateTime<Utc>,
    /// Final result, if decided.
    pub result: Option<GameResult>,
}

/// Movetext result token for a decided or undecided game.
pub fn result_token(result: Option<GameResult>) -> &'static str {
    match result {
        Some(GameResult::WhiteWin) => "1-0",
        Some(GameResult::BlackWin) => "0-1",
        Some(GameResult::Draw) => "1/2-1/2",
        Some(GameResult::Abandoned) | None => "*",
    }
}

fn escape_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Writes a full game record: tag pairs, a blank line, then movetext.
///
/// `initial_fen` of `None` means the standard start; otherwise `SetUp` and
/// `FEN` tags are emitted and numbering continues from that position.
///
/// # Errors
///
/// Fails if a logged move is not legal when replayed.
#[instrument(skip(moves, headers), fields(plies = moves.len()))]
pub fn export_movetext(
    initial_fen: Option<&str>,
    moves: &[String],
    headers: &RecordHeaders<'_>,
) -> Result<String, RulesError> {
    let mut board = match initial_fen {
        Some(fen) => Board::from_fen(fen)?,
        None => Board::new(),
    };

    let result = result_token(headers.result);
    let mut tags: Vec<(&str, String)> = vec![
        ("Event", headers.event.to_string()),
        ("Site", "?".to_string()),
        ("Date", headers.date.format("%Y.%m.%d").to_string()),
        ("Round", "?".to_string()),
        ("White", format!("Player {}", headers.white)),
        ("Black", format!("Player {}", headers.black)),
        ("Result", result.to_string()),
    ];
    if let Some(fen) = initial_fen {
        tags.push(("SetUp", "1".to_string()));
        tags.push(("FEN", fen.to_string()));
    }

    let mut out = String::new();
    for (key, value) in &tags {
        out.push_str(&format!("[{} \"{}\"]\n", key, escape_value(value)));
    }
    out.push('\n');

    let mut parts = Vec::<String>::with_capacity(moves.len() + 1);
    for (ply, text) in moves.iter().enumerate() {
        let mv = board.parse_long_notation(text)?;
        let san = board.to_short_notation(&mv);
        match board.turn() {
            Color::White => parts.push(format!("{}. {}", board.fullmoves(), san)),
            Color::Black if ply == 0 => parts.push(format!("{}... {}", board.fullmoves(), san)),
            Color::Black => parts.push(san),
        }
        board.play(&mv);
    }
    parts.push(result.to_string());
    out.push_str(&parts.join(" "));
    out.push('\n');

    Ok(out)
}

/// Coarse lifecycle state as stored in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusKind {
    /// Moves are still accepted.
    Active,
    /// The game has a result.
    Finished,
}

/// Serialisable view of a session, suitable for a keyed record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// Session id.
    pub game_id: SessionId,
    /// Current position.
    pub fen: String,
    /// White participant.
    pub white_id: PlayerId,
    /// Black participant.
    pub black_id: PlayerId,
    /// Channel the session is bound to.
    pub channel_id: ChannelId,
    /// Starting position, if not the standard one.
    #[serde(default)]
    pub initial_fen: Option<String>,
    /// Moves in long notation, oldest first.
    pub move_history: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last accepted move.
    pub last_move_at: DateTime<Utc>,
    /// Lifecycle state.
    pub status: StatusKind,
    /// Result once finished.
    pub result: Option<GameResult>,
    /// Side to move, `white` or `black`.
    pub current_turn: String,
    /// Side to move is in check.
    pub is_check: bool,
    /// Side to move is checkmated.
    pub is_checkmate: bool,
    /// Side to move is stalemated.
    pub is_stalemate: bool,
    /// Neither side can mate.
    pub is_insufficient_material: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn headers(result: Option<GameResult>) -> RecordHeaders<'static> {
        RecordHeaders {
            event: "Chess Game",
            white: 1,
            black: 2,
            date: Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap(),
            result,
        }
    }

    #[test]
    fn tags_precede_movetext() {
        let moves = vec!["e2e4".to_string(), "e7e5".to_string(), "g1f3".to_string()];
        let text = export_movetext(None, &moves, &headers(None)).unwrap();
        assert!(text.starts_with("[Event \"Chess Game\"]\n"));
        assert!(text.contains("[Date \"2024.03.09\"]"));
        assert!(text.contains("[White \"Player 1\"]"));
        assert!(text.ends_with("\n1. e4 e5 2. Nf3 *\n"));
        assert!(!text.contains("SetUp"));
    }

    #[test]
    fn escapes_quotes_in_event() {
        let mut h = headers(Some(GameResult::Draw));
        h.event = "The \"Big\" One";
        let text = export_movetext(None, &[], &h).unwrap();
        assert!(text.contains("[Event \"The \\\"Big\\\" One\"]"));
        assert!(text.ends_with("\n1/2-1/2\n"));
    }

    #[test]
    fn illegal_log_entry_is_reported() {
        let moves = vec!["e2e5".to_string()];
        assert!(export_movetext(None, &moves, &headers(None)).is_err());
    }
}
