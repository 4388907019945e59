//! Position evaluation and move search.

pub mod evaluation;
pub mod search;

pub use evaluation::{KING_DANGER_PENALTY, MATE_SCORE, PAWN_TABLE, evaluate, piece_value};
pub use search::{RankedMove, SearchEngine, SearchOutcome, Skill, search};
