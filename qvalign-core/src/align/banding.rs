//! Band placement: which rows of a column are worth computing.

use super::matrix::ScoreMatrix;
use crate::error::{QvError, QvResult};

/// Banding knobs: `bandwidth` caps how many rows of a column may be filled;
/// `score_diff` is how far below a column's best score a cell may fall
/// before it is dropped from the next column's band.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BandingOptions {
    pub bandwidth: usize,
    pub score_diff: f64,
}

impl BandingOptions {
    pub fn new(bandwidth: usize, score_diff: f64) -> Self {
        Self {
            bandwidth,
            score_diff,
        }
    }

    /// Effectively unbanded: every row admissible, no score cutoff.
    pub fn unbanded() -> Self {
        Self::new(usize::MAX, 1e9)
    }

    pub(crate) fn validate(&self) -> QvResult<()> {
        if self.bandwidth == 0 || !self.score_diff.is_finite() || self.score_diff <= 0.0 {
            return Err(QvError::InvalidBanding {
                bandwidth: self.bandwidth,
                score_diff: self.score_diff,
            });
        }
        Ok(())
    }
}

pub(crate) fn range_union(a: (usize, usize), b: (usize, usize)) -> (usize, usize) {
    (a.0.min(b.0), a.1.max(b.1))
}

/// Used range of column `j` trimmed to the rows within `score_diff` of the
/// column maximum (read off the recorded metadata, no rescan for the max).
pub(crate) fn row_range<M: ScoreMatrix>(j: usize, m: &M, score_diff: f64) -> (usize, usize) {
    let (begin, end) = m.used_row_range(j);
    if begin >= end {
        return (begin, end);
    }
    let (_, max_score) = m.column_max(j);
    let threshold = max_score - score_diff;
    let mut lo = begin;
    while lo < end && m.get(lo, j) < threshold {
        lo += 1;
    }
    let mut hi = end;
    while hi > lo && m.get(hi - 1, j) < threshold {
        hi -= 1;
    }
    (lo, hi)
}

/// Union the trimmed ranges of the guide and of the matrix itself at column
/// `j` into the running band hint. Returns false when neither contributes.
pub(crate) fn range_guide<M: ScoreMatrix>(
    j: usize,
    guide: Option<&M>,
    matrix: &M,
    score_diff: f64,
    band: &mut (usize, usize),
) -> bool {
    let use_guide = guide.is_some_and(|g| !g.is_column_empty(j));
    let use_matrix = !matrix.is_column_empty(j);
    if !use_guide && !use_matrix {
        return false;
    }
    let mut interval = *band;
    if use_guide {
        let g = guide.expect("use_guide implies a guide");
        interval = range_union(row_range(j, g, score_diff), interval);
    }
    if use_matrix {
        interval = range_union(row_range(j, matrix, score_diff), interval);
    }
    *band = interval;
    true
}

/// Cap a band at `bandwidth` rows, keeping it near `center`.
pub(crate) fn clip_to_bandwidth(
    band: (usize, usize),
    center: usize,
    bandwidth: usize,
) -> (usize, usize) {
    let (lo, hi) = band;
    if hi - lo <= bandwidth {
        return band;
    }
    let new_lo = center
        .saturating_sub(bandwidth / 2)
        .clamp(lo, hi - bandwidth);
    (new_lo, new_lo + bandwidth)
}
