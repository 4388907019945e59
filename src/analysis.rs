//! Plain-language position explanation.

use std::collections::HashSet;
use std::fmt;

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use shakmaty::{Color, Role};
use strum::{Display, EnumString};
use tracing::instrument;

use crate::oracle::Board;

/// Plies below which a game is still in the opening.
pub const OPENING_PLIES: usize = 10;

/// Plies below which a game is still in the middlegame.
pub const MIDDLEGAME_PLIES: usize = 30;

/// Material lead, in pawns, that counts as an advantage.
pub const MATERIAL_EDGE: i32 = 2;

/// Legal-move count above which the mover has many options.
pub const HIGH_MOBILITY: usize = 30;

/// Legal-move count below which the mover has limited options.
pub const LOW_MOBILITY: usize = 10;

/// Broad stage of the game, judged by plies played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GamePhase {
    /// Fewer than ten plies played.
    Opening,
    /// Fewer than thirty plies played.
    Middlegame,
    /// Everything after.
    Endgame,
}

impl GamePhase {
    /// Phase reached after `plies` half-moves.
    pub fn from_plies(plies: usize) -> Self {
        if plies < OPENING_PLIES {
            Self::Opening
        } else if plies < MIDDLEGAME_PLIES {
            Self::Middlegame
        } else {
            Self::Endgame
        }
    }

    fn advice(self) -> &'static str {
        match self {
            Self::Opening => {
                "Focus on developing pieces, controlling the center, and king safety."
            }
            Self::Middlegame => {
                "Focus on creating and executing plans, tactical opportunities, and piece coordination."
            }
            Self::Endgame => {
                "Focus on pawn promotion, king activity, and simplification if ahead in material."
            }
        }
    }
}

/// Facts about a position, per side.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct PositionReport {
    /// Stage of the game.
    phase: GamePhase,
    /// White material in pawn units, king excluded.
    white_material: i32,
    /// Black material in pawn units, king excluded.
    black_material: i32,
    /// Black pieces attacking the white king.
    white_king_attackers: usize,
    /// White pieces attacking the black king.
    black_king_attackers: usize,
    /// True if White is to move.
    white_to_move: bool,
    /// Legal moves available to the side to move.
    mobility: usize,
    /// Extra white pawns sharing a file.
    white_doubled_pawns: usize,
    /// Extra black pawns sharing a file.
    black_doubled_pawns: usize,
}

impl PositionReport {
    /// White material minus Black material, in pawns.
    pub fn material_difference(&self) -> i32 {
        self.white_material - self.black_material
    }
}

fn pawn_units(role: Role) -> i32 {
    match role {
        Role::Pawn => 1,
        Role::Knight | Role::Bishop => 3,
        Role::Rook => 5,
        Role::Queen => 9,
        Role::King => 0,
    }
}

fn side_name(white: bool) -> &'static str {
    if white { "White" } else { "Black" }
}

/// Builds a [`PositionReport`] for `board` after `plies_played` half-moves.
#[instrument(skip(board))]
pub fn explain(board: &Board, plies_played: usize) -> PositionReport {
    let mut white_material = 0;
    let mut black_material = 0;
    let mut white_pawns = 0usize;
    let mut black_pawns = 0usize;
    let mut white_files = HashSet::new();
    let mut black_files = HashSet::new();

    for (square, piece) in board.pieces() {
        let units = pawn_units(piece.role);
        match piece.color {
            Color::White => white_material += units,
            Color::Black => black_material += units,
        }
        if piece.role == Role::Pawn {
            match piece.color {
                Color::White => {
                    white_pawns += 1;
                    white_files.insert(square.file());
                }
                Color::Black => {
                    black_pawns += 1;
                    black_files.insert(square.file());
                }
            }
        }
    }

    PositionReport {
        phase: GamePhase::from_plies(plies_played),
        white_material,
        black_material,
        white_king_attackers: board.attackers_of_king(Color::White),
        black_king_attackers: board.attackers_of_king(Color::Black),
        white_to_move: board.turn() == Color::White,
        mobility: board.legal_moves().len(),
        white_doubled_pawns: white_pawns - white_files.len(),
        black_doubled_pawns: black_pawns - black_files.len(),
    }
}

impl fmt::Display for PositionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Position Analysis")?;
        let phase = match self.phase {
            GamePhase::Opening => "Opening phase",
            GamePhase::Middlegame => "Middlegame phase",
            GamePhase::Endgame => "Endgame phase",
        };
        writeln!(f, "{}: {}", phase, self.phase.advice())?;

        let diff = self.material_difference();
        if diff > MATERIAL_EDGE {
            writeln!(f, "Material: White is ahead by {} points.", diff)?;
        } else if diff < -MATERIAL_EDGE {
            writeln!(f, "Material: Black is ahead by {} points.", diff.abs())?;
        } else {
            writeln!(f, "Material: Material is roughly equal.")?;
        }

        if self.white_king_attackers > 0 {
            writeln!(
                f,
                "King Safety: White's king is under attack by {} piece(s).",
                self.white_king_attackers
            )?;
        }
        if self.black_king_attackers > 0 {
            writeln!(
                f,
                "King Safety: Black's king is under attack by {} piece(s).",
                self.black_king_attackers
            )?;
        }

        let mover = side_name(self.white_to_move);
        if self.mobility > HIGH_MOBILITY {
            writeln!(
                f,
                "Mobility: {} has many options ({} legal moves).",
                mover, self.mobility
            )?;
        } else if self.mobility < LOW_MOBILITY {
            writeln!(
                f,
                "Mobility: {} has limited options (only {} legal moves).",
                mover, self.mobility
            )?;
        }

        if self.white_doubled_pawns > 0 {
            writeln!(
                f,
                "Pawn Structure: White has {} doubled pawn(s).",
                self.white_doubled_pawns
            )?;
        }
        if self.black_doubled_pawns > 0 {
            writeln!(
                f,
                "Pawn Structure: Black has {} doubled pawn(s).",
                self.black_doubled_pawns
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_position_is_balanced_opening() {
        let report = explain(&Board::new(), 0);
        assert_eq!(*report.phase(), GamePhase::Opening);
        assert_eq!(*report.white_material(), 39);
        assert_eq!(report.material_difference(), 0);
        assert_eq!(*report.mobility(), 20);
        assert_eq!(*report.white_doubled_pawns(), 0);
        assert!(report.to_string().contains("roughly equal"));
    }

    #[test]
    fn phase_boundaries() {
        assert_eq!(GamePhase::from_plies(9), GamePhase::Opening);
        assert_eq!(GamePhase::from_plies(10), GamePhase::Middlegame);
        assert_eq!(GamePhase::from_plies(29), GamePhase::Middlegame);
        assert_eq!(GamePhase::from_plies(30), GamePhase::Endgame);
    }

    #[test]
    fn doubled_pawns_and_material_edge() {
        // White: king, two pawns on the e-file and a rook. Black: king only.
        let board = Board::from_fen("4k3/8/8/8/4P3/4P3/8/R3K3 w - - 0 1").unwrap();
        let report = explain(&board, 40);
        assert_eq!(*report.phase(), GamePhase::Endgame);
        assert_eq!(*report.white_doubled_pawns(), 1);
        assert_eq!(report.material_difference(), 7);
        let text = report.to_string();
        assert!(text.contains("White is ahead by 7 points"));
        assert!(text.contains("White has 1 doubled pawn(s)"));
    }
}
