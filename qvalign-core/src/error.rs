use thiserror::Error;

use crate::align::params::MoveSet;

#[derive(Debug, Error)]
pub enum QvError {
    #[error("invalid character '{ch}' at position {pos}")]
    InvalidChar { ch: char, pos: usize },

    #[error("invalid banding: bandwidth={bandwidth}, score_diff={score_diff} (bandwidth must be >= 1, score_diff finite and > 0)")]
    InvalidBanding { bandwidth: usize, score_diff: f64 },

    #[error("invalid move set {moves:?}: incorporate, extra and delete moves are required")]
    InvalidMoveSet { moves: MoveSet },

    #[error("feature channel '{channel}' has length {got}, read has length {expected}")]
    FeatureLengthMismatch {
        channel: &'static str,
        got: usize,
        expected: usize,
    },

    #[error("banded recursion could not reach cell ({read_len}, {tpl_len}); retry with wider banding")]
    PathInfeasible { read_len: usize, tpl_len: usize },

    #[error("alpha/beta terminal scores diverged beyond tolerance: {alpha} vs {beta}")]
    AlphaBetaMismatch { alpha: f64, beta: f64 },
}

pub type QvResult<T> = Result<T, QvError>;
