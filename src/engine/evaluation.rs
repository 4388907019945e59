//! Static position evaluation.
//!
//! Scores are from White's point of view: positive favours White, negative
//! favours Black. The evaluator never mutates the board.

use shakmaty::{Color, Role, Square};

use crate::oracle::Board;

/// Score of a checkmated position, signed against the mated side.
pub const MATE_SCORE: f64 = 10_000.0;

/// Penalty applied against a side whose king is attacked.
pub const KING_DANGER_PENALTY: f64 = 50.0;

/// Weight of each legal move available to the side to move.
pub const MOBILITY_WEIGHT: f64 = 0.1;

/// Positional bonus for pawns, indexed by square from the owner's side.
///
/// Index 0 is a1 for White. Black pawns read the table at `63 - square`.
#[rustfmt::skip]
pub const PAWN_TABLE: [i32; 64] = [
     0,  0,  0,  0,  0,  0,  0,  0,
    50, 50, 50, 50, 50, 50, 50, 50,
    10, 10, 20, 30, 30, 20, 10, 10,
     5,  5, 10, 25, 25, 10,  5,  5,
     0,  0,  0, 20, 20,  0,  0,  0,
     5, -5,-10,  0,  0,-10, -5,  5,
     5, 10, 10,-20,-20, 10, 10,  5,
     0,  0,  0,  0,  0,  0,  0,  0,
];

/// Material value of a piece kind in centipawns.
#[inline]
pub const fn piece_value(role: Role) -> i32 {
    match role {
        Role::Pawn => 100,
        Role::Knight => 320,
        Role::Bishop => 330,
        Role::Rook => 500,
        Role::Queen => 900,
        Role::King => 20_000,
    }
}

#[inline]
fn pawn_bonus(square: Square, color: Color) -> i32 {
    let index = square as usize;
    match color {
        Color::White => PAWN_TABLE[index],
        Color::Black => PAWN_TABLE[63 - index],
    }
}

/// Material plus pawn placement, White minus Black.
fn material_balance(board: &Board) -> i32 {
    board
        .pieces()
        .into_iter()
        .map(|(square, piece)| {
            let mut value = piece_value(piece.role);
            if piece.role == Role::Pawn {
                value += pawn_bonus(square, piece.color);
            }
            match piece.color {
                Color::White => value,
                Color::Black => -value,
            }
        })
        .sum()
}

/// Scores `board` from White's perspective.
///
/// Checkmate is worth [`MATE_SCORE`] against the side to move. Stalemate and
/// insufficient material are exactly zero.
pub fn evaluate(board: &Board) -> f64 {
    if board.is_checkmate() {
        return match board.turn() {
            Color::White => -MATE_SCORE,
            Color::Black => MATE_SCORE,
        };
    }
    if board.is_stalemate() || board.is_insufficient_material() {
        return 0.0;
    }

    let mut score = f64::from(material_balance(board));

    let mobility = board.legal_moves().len() as f64 * MOBILITY_WEIGHT;
    score += match board.turn() {
        Color::White => mobility,
        Color::Black => -mobility,
    };

    if board.attackers_of_king(Color::White) > 0 {
        score -= KING_DANGER_PENALTY;
    }
    if board.attackers_of_king(Color::Black) > 0 {
        score += KING_DANGER_PENALTY;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pawn_table_mirrors_for_black() {
        // e2 for White and e7 for Black read the same entry.
        assert_eq!(
            pawn_bonus(Square::E2, Color::White),
            pawn_bonus(Square::E7, Color::Black)
        );
        assert_eq!(pawn_bonus(Square::D4, Color::White), 25);
    }

    #[test]
    fn king_outweighs_everything_else() {
        let army = 8 * piece_value(Role::Pawn)
            + 2 * piece_value(Role::Knight)
            + 2 * piece_value(Role::Bishop)
            + 2 * piece_value(Role::Rook)
            + piece_value(Role::Queen);
        assert!(piece_value(Role::King) > army);
    }
}
