//! Rules oracle: a push/pop board over `shakmaty`.
//!
//! All chess knowledge lives in `shakmaty`. This module adds the undo stack the
//! search needs and the notation helpers the session needs.

use std::ops::{Deref, DerefMut};

use shakmaty::fen::Fen;
use shakmaty::san::{San, SanPlus};
use shakmaty::uci::UciMove;
use shakmaty::{
    CastlingMode, CastlingSide, Chess, Color, EnPassantMode, Move, Piece, Position, Square,
};
use tracing::{debug, instrument};

use crate::error::RulesError;

/// A chess position with a paired push/pop undo stack.
#[derive(Debug, Clone, Default)]
pub struct Board {
    position: Chess,
    undo: Vec<(Chess, Move)>,
}

impl Board {
    /// Creates a board in the standard starting position.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a board from a FEN string.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::InvalidFen`] if the text is malformed or describes
    /// an illegal position.
    #[instrument]
    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        let parsed: Fen = fen
            .trim()
            .parse()
            .map_err(|e| RulesError::InvalidFen(format!("{fen}: {e}")))?;
        let position: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| RulesError::InvalidFen(format!("{fen}: {e}")))?;
        Ok(Self {
            position,
            undo: Vec::new(),
        })
    }

    /// Rebuilds a board by replaying long-notation moves from a start position.
    ///
    /// `initial_fen` of `None` means the standard starting position.
    #[instrument(skip(moves), fields(plies = moves.len()))]
    pub fn replay(initial_fen: Option<&str>, moves: &[String]) -> Result<Self, RulesError> {
        let mut board = match initial_fen {
            Some(fen) => Self::from_fen(fen)?,
            None => Self::new(),
        };
        for text in moves {
            let mv = board.parse_long_notation(text)?;
            board.play(&mv);
        }
        debug!(fen = %board.fen(), "Replayed move log");
        Ok(board)
    }

    /// Returns the underlying `shakmaty` position.
    pub fn position(&self) -> &Chess {
        &self.position
    }

    /// Returns the position as FEN.
    pub fn fen(&self) -> String {
        Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string()
    }

    /// Returns the side to move.
    pub fn turn(&self) -> Color {
        self.position.turn()
    }

    /// Returns the full-move counter.
    pub fn fullmoves(&self) -> u32 {
        self.position.fullmoves().get()
    }

    /// Legal moves in the oracle's stable enumeration order.
    pub fn legal_moves(&self) -> Vec<Move> {
        self.position.legal_moves().into_iter().collect()
    }

    /// Plays `mv` permanently. Nothing is recorded for [`Board::pop`].
    ///
    /// The move must be legal in the current position.
    pub fn play(&mut self, mv: &Move) {
        self.position.play_unchecked(mv);
    }

    /// Plays `mv` and remembers how to take it back.
    ///
    /// The move must be legal in the current position. Every `push` must be
    /// paired with a [`Board::pop`]; prefer [`Board::push_scoped`].
    pub fn push(&mut self, mv: &Move) {
        let previous = self.position.clone();
        self.position.play_unchecked(mv);
        self.undo.push((previous, mv.clone()));
    }

    /// Takes back the most recent pushed move.
    pub fn pop(&mut self) -> Option<Move> {
        let (previous, mv) = self.undo.pop()?;
        self.position = previous;
        Some(mv)
    }

    /// Plays `mv` for the lifetime of the returned guard.
    ///
    /// The move is taken back when the guard drops, on every exit path.
    pub fn push_scoped(&mut self, mv: &Move) -> MoveGuard<'_> {
        self.push(mv);
        MoveGuard { board: self }
    }

    /// Number of moves currently pushed and not yet popped.
    pub fn pushed_len(&self) -> usize {
        self.undo.len()
    }

    /// True if the side to move is checkmated.
    pub fn is_checkmate(&self) -> bool {
        self.position.is_checkmate()
    }

    /// True if the side to move has no legal moves and is not in check.
    pub fn is_stalemate(&self) -> bool {
        self.position.is_stalemate()
    }

    /// True if neither side can possibly deliver mate.
    pub fn is_insufficient_material(&self) -> bool {
        self.position.is_insufficient_material()
    }

    /// True if the side to move is in check.
    pub fn is_check(&self) -> bool {
        self.position.is_check()
    }

    /// True on checkmate, stalemate or insufficient material.
    pub fn is_game_over(&self) -> bool {
        self.is_checkmate() || self.is_stalemate() || self.is_insufficient_material()
    }

    /// Parses square-pair notation such as `e2e4` or `e7e8q`.
    ///
    /// # Errors
    ///
    /// [`RulesError::UnparseableMove`] for malformed text,
    /// [`RulesError::IllegalMove`] if the move is not legal here.
    pub fn parse_long_notation(&self, text: &str) -> Result<Move, RulesError> {
        let uci: UciMove = text
            .trim()
            .parse()
            .map_err(|_| RulesError::UnparseableMove(text.to_string()))?;
        uci.to_move(&self.position)
            .map_err(|_| RulesError::IllegalMove(text.to_string()))
    }

    /// Parses short algebraic notation such as `Nf3`, `exd5` or `O-O`.
    ///
    /// # Errors
    ///
    /// [`RulesError::UnparseableMove`] for malformed text,
    /// [`RulesError::IllegalMove`] if no legal move matches.
    pub fn parse_short_notation(&self, text: &str) -> Result<Move, RulesError> {
        let san: SanPlus = text
            .trim()
            .parse()
            .map_err(|_| RulesError::UnparseableMove(text.to_string()))?;
        san.san
            .to_move(&self.position)
            .map_err(|_| RulesError::IllegalMove(text.to_string()))
    }

    /// Resolves castling on `side` for the side to move.
    pub fn castle(&self, side: CastlingSide) -> Result<Move, RulesError> {
        San::Castle(side)
            .to_move(&self.position)
            .map_err(|_| RulesError::IllegalMove(format!("{side:?} castling")))
    }

    /// Long notation for `mv`, e.g. `e2e4` (castling as `e1g1`).
    pub fn to_long_notation(&self, mv: &Move) -> String {
        mv.to_uci(CastlingMode::Standard).to_string()
    }

    /// Short notation for `mv` in this position, with `+`/`#` suffix.
    pub fn to_short_notation(&self, mv: &Move) -> String {
        SanPlus::from_move(self.position.clone(), mv).to_string()
    }

    /// Piece on `square`, if any.
    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.position.board().piece_at(square)
    }

    /// All occupied squares with their pieces.
    pub fn pieces(&self) -> Vec<(Square, Piece)> {
        let board = self.position.board();
        board
            .occupied()
            .into_iter()
            .filter_map(|sq| board.piece_at(sq).map(|piece| (sq, piece)))
            .collect()
    }

    /// Square of `color`'s king.
    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.position.board().king_of(color)
    }

    /// Number of enemy pieces attacking `color`'s king.
    pub fn attackers_of_king(&self, color: Color) -> usize {
        let board = self.position.board();
        match board.king_of(color) {
            Some(king) => board
                .attacks_to(king, color.other(), board.occupied())
                .count(),
            None => 0,
        }
    }
}

/// Keeps a move pushed on a [`Board`] until dropped.
#[derive(Debug)]
pub struct MoveGuard<'a> {
    board: &'a mut Board,
}

impl Deref for MoveGuard<'_> {
    type Target = Board;

    fn deref(&self) -> &Board {
        self.board
    }
}

impl DerefMut for MoveGuard<'_> {
    fn deref_mut(&mut self) -> &mut Board {
        self.board
    }
}

impl Drop for MoveGuard<'_> {
    fn drop(&mut self) {
        self.board.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_push_restores_position() {
        let mut board = Board::new();
        let before = board.fen();
        let mv = board.parse_long_notation("e2e4").unwrap();
        {
            let inner = board.push_scoped(&mv);
            assert_eq!(inner.turn(), Color::Black);
            assert_eq!(inner.pushed_len(), 1);
        }
        assert_eq!(board.fen(), before);
        assert_eq!(board.pushed_len(), 0);
    }

    #[test]
    fn long_and_short_notation_agree() {
        let board = Board::new();
        let long = board.parse_long_notation("g1f3").unwrap();
        let short = board.parse_short_notation("Nf3").unwrap();
        assert_eq!(long, short);
        assert_eq!(board.to_long_notation(&long), "g1f3");
        assert_eq!(board.to_short_notation(&long), "Nf3");
    }

    #[test]
    fn unparseable_and_illegal_are_distinguished() {
        let board = Board::new();
        assert!(matches!(
            board.parse_long_notation("hello"),
            Err(RulesError::UnparseableMove(_))
        ));
        assert!(matches!(
            board.parse_long_notation("e2e5"),
            Err(RulesError::IllegalMove(_))
        ));
    }

    #[test]
    fn replay_reproduces_fen() {
        let moves = vec!["e2e4".to_string(), "e7e5".to_string()];
        let board = Board::replay(None, &moves).unwrap();
        let mut manual = Board::new();
        for m in &moves {
            let mv = manual.parse_long_notation(m).unwrap();
            manual.push(&mv);
        }
        assert_eq!(board.fen(), manual.fen());
        assert_eq!(board.pushed_len(), 0);
    }

    #[test]
    fn play_leaves_nothing_to_pop() {
        let mut board = Board::new();
        let mv = board.parse_short_notation("d4").unwrap();
        board.play(&mv);
        assert_eq!(board.turn(), Color::Black);
        assert_eq!(board.pushed_len(), 0);

        let after = board.fen();
        assert_eq!(board.pop(), None);
        assert_eq!(board.fen(), after);
    }

    #[test]
    fn king_attackers_counted() {
        // Black queen on h4 gives check to the white king on e1.
        let board =
            Board::from_fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3")
                .unwrap();
        assert!(board.is_checkmate());
        assert_eq!(board.attackers_of_king(Color::White), 1);
        assert_eq!(board.attackers_of_king(Color::Black), 0);
    }
}
