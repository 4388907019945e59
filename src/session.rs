//! Game session state machine.
//!
//! A [`GameSession`] owns one board, its move log and its lifecycle. Status
//! only ever moves from active to finished, and a result exists exactly when
//! the session is finished.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use shakmaty::{CastlingSide, Color, Move};
use strum::{Display, EnumString};
use tracing::{debug, info, instrument, warn};

use crate::analysis::{self, PositionReport};
use crate::config::BotConfig;
use crate::engine::{RankedMove, SearchEngine, Skill};
use crate::error::{SessionError, SessionErrorKind};
use crate::oracle::Board;
use crate::record::{self, GameSnapshot, RecordHeaders, StatusKind};
use crate::{ChannelId, PlayerId, SessionId};

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// How a finished game ended.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GameResult {
    /// White delivered mate or Black resigned.
    WhiteWin,
    /// Black delivered mate or White resigned.
    BlackWin,
    /// Stalemate or insufficient material.
    Draw,
    /// Nobody moved for too long.
    Abandoned,
}

impl GameResult {
    /// A win for `color`.
    pub fn win_for(color: Color) -> Self {
        match color {
            Color::White => Self::WhiteWin,
            Color::Black => Self::BlackWin,
        }
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameStatus {
    /// Moves are accepted.
    Active,
    /// The game is over with the given result.
    Finished(GameResult),
}

impl GameStatus {
    /// True while moves are accepted.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Result, if finished.
    pub fn result(self) -> Option<GameResult> {
        match self {
            Self::Active => None,
            Self::Finished(result) => Some(result),
        }
    }

    /// Coarse state without the result.
    pub fn kind(self) -> StatusKind {
        match self {
            Self::Active => StatusKind::Active,
            Self::Finished(_) => StatusKind::Finished,
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Finished(result) => write!(f, "finished ({})", result),
        }
    }
}

/// What happened on the board after an accepted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusNote {
    /// The mover checkmated the opponent.
    Checkmate {
        /// Side that delivered mate.
        winner: Color,
    },
    /// The opponent has no legal move and is not in check.
    Stalemate,
    /// Neither side can mate.
    InsufficientMaterial,
    /// The opponent is in check.
    Check,
    /// Nothing notable.
    Quiet,
}

impl fmt::Display for StatusNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checkmate { winner } => {
                write!(f, "Checkmate! {} wins the game.", color_name(*winner))
            }
            Self::Stalemate => write!(f, "Stalemate! The game ends in a draw."),
            Self::InsufficientMaterial => write!(f, "Draw due to insufficient material."),
            Self::Check => write!(f, "Check!"),
            Self::Quiet => Ok(()),
        }
    }
}

/// An accepted move.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct MoveReport {
    /// Canonical long notation, as stored in the move log.
    long: String,
    /// Short notation with check or mate suffix.
    short: String,
    /// Board situation after the move.
    note: StatusNote,
}

pub(crate) fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "White",
        Color::Black => "Black",
    }
}

/// One game between two players in one channel.
#[derive(Debug)]
pub struct GameSession {
    id: SessionId,
    sequence: u64,
    white: PlayerId,
    black: PlayerId,
    channel: ChannelId,
    board: Board,
    initial_fen: Option<String>,
    moves: Vec<String>,
    created_at: DateTime<Utc>,
    last_move_at: DateTime<Utc>,
    status: GameStatus,
    /// Mirrors `status.is_active()` for readers that do not hold the session lock.
    live: Arc<AtomicBool>,
    engine: SearchEngine,
    event_name: String,
}

impl GameSession {
    /// Starts a game from the standard position with default settings.
    #[instrument]
    pub fn new(
        white: PlayerId,
        black: PlayerId,
        channel: ChannelId,
    ) -> Result<Self, SessionError> {
        Self::with_config(white, black, channel, &BotConfig::default())
    }

    /// Starts a game from the standard position.
    #[instrument(skip(config))]
    pub fn with_config(
        white: PlayerId,
        black: PlayerId,
        channel: ChannelId,
        config: &BotConfig,
    ) -> Result<Self, SessionError> {
        Self::build(white, black, channel, Board::new(), None, config)
    }

    /// Starts a game from a FEN position.
    #[instrument(skip(config))]
    pub fn from_fen(
        white: PlayerId,
        black: PlayerId,
        channel: ChannelId,
        fen: &str,
        config: &BotConfig,
    ) -> Result<Self, SessionError> {
        let board = Board::from_fen(fen).map_err(SessionErrorKind::from)?;
        let initial = board.fen();
        Self::build(white, black, channel, board, Some(initial), config)
    }

    fn build(
        white: PlayerId,
        black: PlayerId,
        channel: ChannelId,
        board: Board,
        initial_fen: Option<String>,
        config: &BotConfig,
    ) -> Result<Self, SessionError> {
        if white == black {
            warn!(player = white, "Refusing session against self");
            return Err(SessionErrorKind::SamePlayer.into());
        }

        let now = Utc::now();
        let sequence = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let id = format!("{}_{}_{}_{}", white, black, now.timestamp_millis(), sequence);
        let engine = SearchEngine::new(Skill::new(*config.default_skill()))
            .with_candidate_limit(*config.candidate_limit());

        info!(
            session_id = %id,
            white,
            black,
            channel,
            "Creating new game session"
        );

        Ok(Self {
            id,
            sequence,
            white,
            black,
            channel,
            board,
            initial_fen,
            moves: Vec::new(),
            created_at: now,
            last_move_at: now,
            status: GameStatus::Active,
            live: Arc::new(AtomicBool::new(true)),
            engine,
            event_name: config.event_name().clone(),
        })
    }

    /// Rebuilds a session by replaying a snapshot's move log.
    ///
    /// The stored FEN must match the replayed position and the stored status
    /// must agree with the stored result.
    #[instrument(skip(snapshot, config), fields(session_id = %snapshot.game_id))]
    pub fn restore(snapshot: &GameSnapshot, config: &BotConfig) -> Result<Self, SessionError> {
        let corrupt = |reason: String| SessionError::new(SessionErrorKind::CorruptRecord(reason));

        if snapshot.white_id == snapshot.black_id {
            return Err(SessionErrorKind::SamePlayer.into());
        }
        let board = Board::replay(snapshot.initial_fen.as_deref(), &snapshot.move_history)
            .map_err(|e| corrupt(e.to_string()))?;
        if board.fen() != snapshot.fen {
            return Err(corrupt(format!(
                "replayed position {} differs from stored {}",
                board.fen(),
                snapshot.fen
            )));
        }
        let status = match (snapshot.status, snapshot.result) {
            (StatusKind::Active, None) => GameStatus::Active,
            (StatusKind::Finished, Some(result)) => GameStatus::Finished(result),
            (kind, result) => {
                return Err(corrupt(format!(
                    "status {} does not match result {:?}",
                    kind, result
                )));
            }
        };

        let sequence = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let engine = SearchEngine::new(Skill::new(*config.default_skill()))
            .with_candidate_limit(*config.candidate_limit());

        info!(plies = snapshot.move_history.len(), %status, "Restored game session");
        Ok(Self {
            id: snapshot.game_id.clone(),
            sequence,
            white: snapshot.white_id,
            black: snapshot.black_id,
            channel: snapshot.channel_id,
            board,
            initial_fen: snapshot.initial_fen.clone(),
            moves: snapshot.move_history.clone(),
            created_at: snapshot.created_at,
            last_move_at: snapshot.last_move_at,
            status,
            live: Arc::new(AtomicBool::new(status.is_active())),
            engine,
            event_name: config.event_name().clone(),
        })
    }

    /// Session id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Process-wide creation order, used to break timestamp ties.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// White participant.
    pub fn white(&self) -> PlayerId {
        self.white
    }

    /// Black participant.
    pub fn black(&self) -> PlayerId {
        self.black
    }

    /// Both participants, White first.
    pub fn players(&self) -> [PlayerId; 2] {
        [self.white, self.black]
    }

    /// Channel the session is bound to.
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Current position.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Starting FEN for sessions not begun from the standard position.
    pub fn initial_fen(&self) -> Option<&str> {
        self.initial_fen.as_deref()
    }

    /// Accepted moves in long notation, oldest first.
    pub fn moves(&self) -> &[String] {
        &self.moves
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the last accepted move, or creation if none.
    pub fn last_move_at(&self) -> DateTime<Utc> {
        self.last_move_at
    }

    /// Lifecycle status.
    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// Result once finished.
    pub fn result(&self) -> Option<GameResult> {
        self.status.result()
    }

    /// True while moves are accepted.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Skill of the attached engine.
    pub fn skill(&self) -> Skill {
        self.engine.skill()
    }

    /// Shared flag cleared when the session finishes.
    pub(crate) fn live_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.live)
    }

    fn finish(&mut self, result: GameResult) {
        self.status = GameStatus::Finished(result);
        self.live.store(false, Ordering::Release);
    }

    /// True if `player` takes part in this game.
    pub fn is_participant(&self, player: PlayerId) -> bool {
        player == self.white || player == self.black
    }

    /// Side `player` plays, if a participant.
    pub fn side_of(&self, player: PlayerId) -> Option<Color> {
        if player == self.white {
            Some(Color::White)
        } else if player == self.black {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// Player whose turn it is.
    pub fn current_turn_player(&self) -> PlayerId {
        match self.board.turn() {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    /// True if it is `player`'s turn.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn is_turn_of(&self, player: PlayerId) -> bool {
        let is_turn = player == self.current_turn_player();
        debug!(player, is_turn, "Checked if player's turn");
        is_turn
    }

    fn resolve(&self, notation: &str) -> Option<Move> {
        let text = notation.trim();
        if let Ok(mv) = self.board.parse_long_notation(text) {
            return Some(mv);
        }
        if let Ok(mv) = self.board.parse_short_notation(text) {
            return Some(mv);
        }
        match text.to_ascii_lowercase().as_str() {
            "o-o" | "0-0" => self.board.castle(CastlingSide::KingSide).ok(),
            "o-o-o" | "0-0-0" => self.board.castle(CastlingSide::QueenSide).ok(),
            _ => None,
        }
    }

    /// Applies a move given in long notation, short notation or a castling alias.
    ///
    /// On refusal the session is unchanged.
    ///
    /// # Errors
    ///
    /// [`SessionErrorKind::GameOver`] on a finished session,
    /// [`SessionErrorKind::InvalidMove`] if no notation yields a legal move.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn apply_move(&mut self, notation: &str) -> Result<MoveReport, SessionError> {
        if !self.is_active() {
            warn!("Move attempted on finished game");
            return Err(SessionErrorKind::GameOver.into());
        }

        let mv = self.resolve(notation).ok_or_else(|| {
            warn!(notation, "Invalid move");
            SessionError::new(SessionErrorKind::InvalidMove {
                notation: notation.to_string(),
            })
        })?;

        let long = self.board.to_long_notation(&mv);
        let short = self.board.to_short_notation(&mv);
        let mover = self.board.turn();
        self.board.play(&mv);
        self.moves.push(long.clone());
        self.last_move_at = Utc::now();

        let note = if self.board.is_checkmate() {
            self.finish(GameResult::win_for(mover));
            StatusNote::Checkmate { winner: mover }
        } else if self.board.is_stalemate() {
            self.finish(GameResult::Draw);
            StatusNote::Stalemate
        } else if self.board.is_insufficient_material() {
            self.finish(GameResult::Draw);
            StatusNote::InsufficientMaterial
        } else if self.board.is_check() {
            StatusNote::Check
        } else {
            StatusNote::Quiet
        };

        info!(
            long = %long,
            short = %short,
            ply = self.moves.len(),
            status = %self.status,
            "Move completed successfully"
        );

        Ok(MoveReport { long, short, note })
    }

    /// Applies a move on behalf of `player`, checking membership and turn first.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn apply_move_as(
        &mut self,
        player: PlayerId,
        notation: &str,
    ) -> Result<MoveReport, SessionError> {
        if !self.is_participant(player) {
            warn!(player, "Unknown player attempted move");
            return Err(SessionErrorKind::NotParticipant.into());
        }
        if !self.is_active() {
            return Err(SessionErrorKind::GameOver.into());
        }
        if !self.is_turn_of(player) {
            warn!(
                player,
                expected = self.current_turn_player(),
                "Player tried to move out of turn"
            );
            return Err(SessionErrorKind::NotYourTurn.into());
        }
        self.apply_move(notation)
    }

    /// Resigns for `player`, awarding the win to the opponent.
    ///
    /// Returns false for non-participants and finished games.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn resign(&mut self, player: PlayerId) -> bool {
        if !self.is_active() {
            debug!(player, "Resignation on finished game ignored");
            return false;
        }
        let Some(side) = self.side_of(player) else {
            warn!(player, "Non-participant tried to resign");
            return false;
        };
        self.finish(GameResult::win_for(side.other()));
        info!(player, status = %self.status, "Player resigned");
        true
    }

    /// Marks an idle game as abandoned. Returns false if already finished.
    pub(crate) fn abandon(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.finish(GameResult::Abandoned);
        info!(session_id = %self.id, "Game abandoned");
        true
    }

    /// Exports the game as tag pairs plus movetext.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn export_record(&self) -> Result<String, SessionError> {
        let headers = RecordHeaders {
            event: &self.event_name,
            white: self.white,
            black: self.black,
            date: self.created_at,
            result: self.result(),
        };
        record::export_movetext(self.initial_fen(), &self.moves, &headers)
            .map_err(|e| SessionError::new(SessionErrorKind::CorruptRecord(e.to_string())))
    }

    /// Engine's choice for the side to move, in short notation. Does not play it.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn engine_move(&mut self) -> Option<String> {
        let mv = self.engine.best_move(&mut self.board)?;
        let short = self.board.to_short_notation(&mv);
        debug!(short = %short, "Engine chose move");
        Some(short)
    }

    /// Up to `count` candidate moves, best for the mover first.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn suggestions(&mut self, count: usize) -> Vec<RankedMove> {
        self.engine.rank_moves(&mut self.board, count)
    }

    /// Explains the current position.
    pub fn explain(&self) -> PositionReport {
        analysis::explain(&self.board, self.moves.len())
    }

    /// Serialisable view of the session.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            game_id: self.id.clone(),
            fen: self.board.fen(),
            white_id: self.white,
            black_id: self.black,
            channel_id: self.channel,
            initial_fen: self.initial_fen.clone(),
            move_history: self.moves.clone(),
            created_at: self.created_at,
            last_move_at: self.last_move_at,
            status: self.status.kind(),
            result: self.result(),
            current_turn: color_name(self.board.turn()).to_lowercase(),
            is_check: self.board.is_check(),
            is_checkmate: self.board.is_checkmate(),
            is_stalemate: self.board.is_stalemate(),
            is_insufficient_material: self.board.is_insufficient_material(),
        }
    }

    /// Replaces the engine, e.g. with a seeded one.
    pub fn set_engine(&mut self, engine: SearchEngine) {
        self.engine = engine;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn castling_aliases_resolve_for_either_side() {
        let mut session = GameSession::new(1, 2, 9).unwrap();
        for m in ["e4", "e5", "Nf3", "Nc6", "Bc4", "Bc5"] {
            session.apply_move(m).unwrap();
        }
        let report = session.apply_move("0-0").unwrap();
        assert_eq!(report.long(), "e1g1");
        assert_eq!(report.short(), "O-O");
    }

    #[test]
    fn status_note_messages() {
        assert_eq!(
            StatusNote::Checkmate {
                winner: Color::Black
            }
            .to_string(),
            "Checkmate! Black wins the game."
        );
        assert_eq!(StatusNote::Check.to_string(), "Check!");
        assert_eq!(StatusNote::Quiet.to_string(), "");
    }

    #[test]
    fn result_names_are_snake_case() {
        assert_eq!(GameResult::WhiteWin.to_string(), "white_win");
        assert_eq!("abandoned".parse::<GameResult>().unwrap(), GameResult::Abandoned);
    }
}
