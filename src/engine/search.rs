//! Depth-limited minimax with alpha-beta pruning.
//!
//! The engine searches the live [`Board`] by pushing and popping moves through
//! [`Board::push_scoped`], so the caller's board is restored on every return
//! path, including pruning cutoffs.

use std::fmt;

use derive_getters::Getters;
use derive_new::new;
use rand::prelude::IndexedRandom;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use shakmaty::{Color, Move};
use tracing::{debug, instrument};

use super::evaluation::evaluate;
use crate::oracle::Board;

/// Deepest search the skill scale maps to.
pub const MAX_DEPTH: u8 = 3;

/// Default number of legal moves scored by [`SearchEngine::rank_moves`].
pub const DEFAULT_CANDIDATE_LIMIT: usize = 10;

/// Engine strength on a 1-10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Skill(u8);

impl Skill {
    /// Weakest setting.
    pub const MIN: Skill = Skill(1);
    /// Strongest setting.
    pub const MAX: Skill = Skill(10);

    /// Creates a skill, clamping `value` into 1..=10.
    pub fn new(value: u8) -> Self {
        Self(value.clamp(Self::MIN.0, Self::MAX.0))
    }

    /// Raw 1-10 value.
    pub fn value(self) -> u8 {
        self.0
    }

    /// Chance that a move is picked at random instead of searched.
    pub fn random_move_probability(self) -> f64 {
        1.0 - f64::from(self.0) / 10.0
    }

    /// Search depth in plies.
    pub fn depth(self) -> u8 {
        (self.0 / 3).clamp(1, MAX_DEPTH)
    }
}

impl Default for Skill {
    fn default() -> Self {
        Self(5)
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/10", self.0)
    }
}

/// Result of a root search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    /// First move reaching the best score in enumeration order.
    pub best: Move,
    /// Minimax value of `best`, White-positive.
    pub score: f64,
}

/// A candidate move with its one-ply evaluation.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize, new)]
pub struct RankedMove {
    /// Short notation, with check or mate suffix.
    notation: String,
    /// Evaluation after the move, White-positive.
    score: f64,
}

/// Move chooser combining random play with alpha-beta search.
pub struct SearchEngine {
    skill: Skill,
    candidate_limit: usize,
    rng: StdRng,
}

impl fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchEngine")
            .field("skill", &self.skill)
            .field("candidate_limit", &self.candidate_limit)
            .finish_non_exhaustive()
    }
}

impl SearchEngine {
    /// Creates an engine seeded from the operating system.
    #[instrument]
    pub fn new(skill: Skill) -> Self {
        debug!(%skill, "Creating search engine");
        Self {
            skill,
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Creates an engine with a deterministic random source.
    pub fn with_seed(skill: Skill, seed: u64) -> Self {
        Self {
            skill,
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Sets how many legal moves [`SearchEngine::rank_moves`] scores.
    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.candidate_limit = limit;
        self
    }

    /// Current skill.
    pub fn skill(&self) -> Skill {
        self.skill
    }

    /// Picks a move for the side to move, or `None` if there is none.
    ///
    /// With probability `1 - skill/10` the move is uniformly random. Otherwise
    /// it comes from [`search`] at the skill's depth.
    #[instrument(skip(self, board), fields(skill = self.skill.value()))]
    pub fn best_move(&mut self, board: &mut Board) -> Option<Move> {
        if board.is_game_over() {
            return None;
        }
        let legal = board.legal_moves();
        if legal.is_empty() {
            return None;
        }

        if self.rng.random::<f64>() < self.skill.random_move_probability() {
            let picked = legal.choose(&mut self.rng).cloned();
            debug!(legal = legal.len(), "Playing a random move");
            return picked;
        }

        match search(board, self.skill.depth()) {
            Some(outcome) => {
                debug!(score = outcome.score, "Search selected move");
                Some(outcome.best)
            }
            None => {
                debug!("Search found no improving move, falling back to random");
                legal.choose(&mut self.rng).cloned()
            }
        }
    }

    /// Scores a prefix of the legal moves one ply deep, best for the mover first.
    ///
    /// Returns at most `count` entries, empty once the game is over.
    #[instrument(skip(self, board))]
    pub fn rank_moves(&self, board: &mut Board, count: usize) -> Vec<RankedMove> {
        if board.is_game_over() {
            return Vec::new();
        }

        let mut ranked: Vec<RankedMove> = board
            .legal_moves()
            .iter()
            .take(self.candidate_limit)
            .map(|mv| {
                let notation = board.to_short_notation(mv);
                let child = board.push_scoped(mv);
                RankedMove::new(notation, evaluate(&child))
            })
            .collect();

        match board.turn() {
            Color::White => ranked.sort_by(|a, b| b.score.total_cmp(&a.score)),
            Color::Black => ranked.sort_by(|a, b| a.score.total_cmp(&b.score)),
        }
        ranked.truncate(count);
        debug!(returned = ranked.len(), "Ranked candidate moves");
        ranked
    }
}

/// Searches `depth` plies from `board` and returns the best root move.
///
/// White maximises and Black minimises at every node. Root ties keep the
/// earliest move in legal-move order. Returns `None` when there is no legal
/// move or no root move beats the initial bound.
pub fn search(board: &mut Board, depth: u8) -> Option<SearchOutcome> {
    let maximizing = board.turn() == Color::White;
    let mut best: Option<SearchOutcome> = None;
    let mut best_score = if maximizing {
        f64::NEG_INFINITY
    } else {
        f64::INFINITY
    };

    for mv in board.legal_moves() {
        let score = {
            let mut child = board.push_scoped(&mv);
            alpha_beta(
                &mut child,
                depth.saturating_sub(1),
                f64::NEG_INFINITY,
                f64::INFINITY,
            )
        };
        let improves = if maximizing {
            score > best_score
        } else {
            score < best_score
        };
        if improves {
            best_score = score;
            best = Some(SearchOutcome { best: mv, score });
        }
    }
    best
}

/// Fail-hard alpha-beta from White's perspective.
fn alpha_beta(board: &mut Board, depth: u8, mut alpha: f64, mut beta: f64) -> f64 {
    if depth == 0 || board.is_game_over() {
        return evaluate(board);
    }

    let moves = board.legal_moves();
    if board.turn() == Color::White {
        let mut value = f64::NEG_INFINITY;
        for mv in &moves {
            let score = {
                let mut child = board.push_scoped(mv);
                alpha_beta(&mut child, depth - 1, alpha, beta)
            };
            value = value.max(score);
            alpha = alpha.max(score);
            if beta <= alpha {
                break;
            }
        }
        value
    } else {
        let mut value = f64::INFINITY;
        for mv in &moves {
            let score = {
                let mut child = board.push_scoped(mv);
                alpha_beta(&mut child, depth - 1, alpha, beta)
            };
            value = value.min(score);
            beta = beta.min(score);
            if beta <= alpha {
                break;
            }
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_maps_to_depth() {
        assert_eq!(Skill::new(1).depth(), 1);
        assert_eq!(Skill::new(5).depth(), 1);
        assert_eq!(Skill::new(6).depth(), 2);
        assert_eq!(Skill::new(9).depth(), 3);
        assert_eq!(Skill::new(10).depth(), 3);
    }

    #[test]
    fn skill_is_clamped() {
        assert_eq!(Skill::new(0), Skill::MIN);
        assert_eq!(Skill::new(42), Skill::MAX);
        assert_eq!(Skill::MAX.random_move_probability(), 0.0);
    }

    #[test]
    fn depth_zero_search_still_picks_a_move() {
        let mut board = Board::new();
        let outcome = search(&mut board, 0).unwrap();
        assert!(board.legal_moves().contains(&outcome.best));
        assert_eq!(board.pushed_len(), 0);
    }
}
