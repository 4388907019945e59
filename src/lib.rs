//! Chess Sessions library - concurrent chess games with a built-in engine
//!
//! This library tracks many chess games at once and plays or suggests moves
//! for them. Chess rules come from `shakmaty`.
//!
//! # Architecture
//!
//! - **Oracle**: push/pop board and notation helpers over `shakmaty`
//! - **Engine**: static evaluation plus minimax with alpha-beta pruning
//! - **Session**: one game's board, move log and lifecycle
//! - **Manager**: registry of sessions with per-channel uniqueness and sweeping
//!
//! # Example
//!
//! ```no_run
//! use chess_sessions::SessionManager;
//!
//! # fn example() -> Result<(), chess_sessions::SessionError> {
//! let manager = SessionManager::new();
//! let handle = manager.create(1, 2, 100)?;
//!
//! let mut session = handle.lock();
//! session.apply_move("e4")?;
//! let reply = session.engine_move();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod analysis;
mod config;
mod engine;
mod error;
mod manager;
mod oracle;
mod record;
mod session;
mod sweeper;

/// Identifier of a player on the surrounding platform.
pub type PlayerId = u64;

/// Identifier of the channel a game is played in.
pub type ChannelId = u64;

/// Unique identifier for a game session.
pub type SessionId = String;

// Crate-level exports - Configuration
pub use config::BotConfig;

// Crate-level exports - Errors
pub use error::{ConfigError, RulesError, SessionError, SessionErrorKind};

// Crate-level exports - Rules oracle
pub use oracle::{Board, MoveGuard};
pub use shakmaty::{CastlingSide, Color, Move, Role, Square};

// Crate-level exports - Engine
pub use engine::{
    KING_DANGER_PENALTY, MATE_SCORE, PAWN_TABLE, RankedMove, SearchEngine, SearchOutcome, Skill,
    evaluate, piece_value, search,
};

// Crate-level exports - Analysis and records
pub use analysis::{GamePhase, PositionReport, explain};
pub use record::{GameSnapshot, RecordHeaders, StatusKind, export_movetext, result_token};

// Crate-level exports - Session management
pub use manager::{EvictedSession, ManagerStats, SessionHandle, SessionManager};
pub use session::{GameResult, GameSession, GameStatus, MoveReport, StatusNote};
pub use sweeper::spawn_sweeper;
