//! Error types for sessions, rules and configuration.
//!
//! Refusals carry a stable [`SessionErrorKind`] so the surrounding system can
//! match on the reason and format its own user-facing reply.

use derive_more::{Display, Error};
use tracing::instrument;

use crate::{ChannelId, PlayerId};

/// Failure reported by the rules oracle.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum RulesError {
    /// Text could not be read as a move in the requested notation.
    #[display("Unparseable move: {_0}")]
    UnparseableMove(#[error(not(source))] String),
    /// Text was well-formed but names no legal move in this position.
    #[display("Illegal move: {_0}")]
    IllegalMove(#[error(not(source))] String),
    /// A FEN string could not be turned into a legal position.
    #[display("Invalid FEN: {_0}")]
    InvalidFen(#[error(not(source))] String),
}

/// Why a session or manager operation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum SessionErrorKind {
    /// The notation resolved to no legal move.
    #[display(
        "Invalid move '{notation}'. Please use algebraic notation (e.g., 'e4', 'Nf3') or UCI notation (e.g., 'e2e4')."
    )]
    InvalidMove {
        /// Text the caller supplied.
        notation: String,
    },
    /// The session has already finished.
    #[display("The game is already over")]
    GameOver,
    /// The player is a participant but it is not their turn.
    #[display("It's not your turn")]
    NotYourTurn,
    /// The player does not take part in this session.
    #[display("You are not a participant in this game")]
    NotParticipant,
    /// One of the players already has an active game in the channel.
    #[display("Player {player} is already in an active game in channel {channel}")]
    PlayerAlreadyInGame {
        /// Player blocking the new session.
        player: PlayerId,
        /// Channel the conflict was found in.
        channel: ChannelId,
    },
    /// Both sides were assigned to the same player.
    #[display("A player cannot play against themselves")]
    SamePlayer,
    /// A starting position was rejected by the rules oracle.
    #[display("Invalid starting position: {_0}")]
    InvalidPosition(String),
    /// A stored record could not be replayed.
    #[display("Corrupt game record: {_0}")]
    CorruptRecord(String),
}

/// Session error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Session error: {} at {}:{}", kind, file, line)]
pub struct SessionError {
    /// Machine-checkable reason.
    #[error(not(source))]
    pub kind: SessionErrorKind,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl SessionError {
    /// Creates a new session error with caller location tracking.
    #[track_caller]
    #[instrument]
    pub fn new(kind: SessionErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Returns the refusal reason.
    pub fn kind(&self) -> &SessionErrorKind {
        &self.kind
    }
}

impl From<RulesError> for SessionErrorKind {
    fn from(err: RulesError) -> Self {
        match err {
            RulesError::InvalidFen(text) => Self::InvalidPosition(text),
            RulesError::UnparseableMove(text) | RulesError::IllegalMove(text) => {
                Self::InvalidMove { notation: text }
            }
        }
    }
}

impl From<SessionErrorKind> for SessionError {
    #[track_caller]
    fn from(kind: SessionErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_move_names_both_notations() {
        let kind = SessionErrorKind::InvalidMove {
            notation: "zz9".to_string(),
        };
        let text = kind.to_string();
        assert!(text.contains("'e4'"));
        assert!(text.contains("'e2e4'"));
        assert!(text.contains("zz9"));
    }

    #[test]
    fn session_error_tracks_location() {
        let err = SessionError::new(SessionErrorKind::GameOver);
        assert_eq!(err.kind(), &SessionErrorKind::GameOver);
        assert!(err.file.ends_with("error.rs"));
        assert!(err.to_string().contains("already over"));
    }
}
