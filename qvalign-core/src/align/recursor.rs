//! Recursor strategies: fill the alpha (forward) and beta (backward)
//! matrices under the banding policy, link them, and decode transcripts.

use std::marker::PhantomData;

use log::{debug, warn};

use super::banding::{self, BandingOptions};
use super::combiner::Combiner;
use super::evaluator::QvEvaluator;
use super::matrix::{DenseMatrix, ScoreMatrix, SparseMatrix, NEG_INF};
use super::pairwise::{AlignmentMove, PairwiseAlignment};
use super::params::MoveSet;
use crate::error::{QvError, QvResult};

const MAX_FLIP_FLOPS: usize = 5;
const ALPHA_BETA_MISMATCH_TOLERANCE: f64 = 0.2;
const REBANDING_THRESHOLD: f64 = 0.04;

/// One forward cell: combine every admissible incoming move at `(i, j)`.
#[inline]
pub(crate) fn alpha_cell<M: ScoreMatrix, C: Combiner>(
    e: &QvEvaluator<'_>,
    alpha: &M,
    moves: MoveSet,
    i: usize,
    j: usize,
) -> f64 {
    let mut score = NEG_INF;
    if i == 0 && j == 0 {
        score = 0.0;
    }
    if i > 0 && j > 0 {
        score = C::combine(score, alpha.get(i - 1, j - 1) + e.inc(i - 1, j - 1));
    }
    if i > 0 {
        score = C::combine(score, alpha.get(i - 1, j) + e.extra(i - 1, j));
    }
    if j > 0 {
        score = C::combine(score, alpha.get(i, j - 1) + e.del(i, j - 1));
    }
    if moves.contains(MoveSet::MERGE) && i > 0 && j > 1 {
        score = C::combine(score, alpha.get(i - 1, j - 2) + e.merge(i - 1, j - 2));
    }
    score
}

/// One backward cell, from `(i, j)` toward the terminal corner.
#[inline]
pub(crate) fn beta_cell<M: ScoreMatrix, C: Combiner>(
    e: &QvEvaluator<'_>,
    beta: &M,
    moves: MoveSet,
    i: usize,
    j: usize,
) -> f64 {
    let i_len = e.read_len();
    let j_len = e.tpl_len();
    let mut score = NEG_INF;
    if i == i_len && j == j_len {
        score = 0.0;
    }
    if i < i_len && j < j_len {
        score = C::combine(score, beta.get(i + 1, j + 1) + e.inc(i, j));
    }
    if i < i_len {
        score = C::combine(score, beta.get(i + 1, j) + e.extra(i, j));
    }
    if j < j_len {
        score = C::combine(score, beta.get(i, j + 1) + e.del(i, j));
    }
    if moves.contains(MoveSet::MERGE) && j + 1 < j_len && i < i_len {
        score = C::combine(score, beta.get(i + 1, j + 2) + e.merge(i, j));
    }
    score
}

/// Common contract of all recursor strategies.
///
/// `fill_alpha`/`fill_beta` are strategy-specific; everything else is shared
/// scalar logic provided by the trait.
pub trait Recursor {
    type Matrix: ScoreMatrix;
    type Combiner: Combiner;

    fn move_set(&self) -> MoveSet;
    fn banding(&self) -> &BandingOptions;

    /// Forward pass. With a guide, the computed band also covers the
    /// guide's high-scoring rows per column.
    fn fill_alpha(&self, e: &QvEvaluator<'_>, guide: Option<&Self::Matrix>, alpha: &mut Self::Matrix);

    /// Backward pass, symmetric to `fill_alpha`.
    fn fill_beta(&self, e: &QvEvaluator<'_>, guide: Option<&Self::Matrix>, beta: &mut Self::Matrix);

    /// Fill both matrices with self-determined bands, refilling
    /// back-and-forth until the forward and backward terminal scores agree.
    /// Returns the number of refill rounds.
    fn fill_alpha_beta(
        &self,
        e: &QvEvaluator<'_>,
        alpha: &mut Self::Matrix,
        beta: &mut Self::Matrix,
    ) -> QvResult<usize> {
        let i_len = e.read_len();
        let j_len = e.tpl_len();
        self.fill_alpha(e, None, alpha);
        self.fill_beta(e, Some(&*alpha), beta);

        if alpha.get(i_len, j_len) == NEG_INF || beta.get(0, 0) == NEG_INF {
            return Err(QvError::PathInfeasible {
                read_len: i_len,
                tpl_len: j_len,
            });
        }

        let mut flip_flops = 0;
        let max_size = (0.5 + REBANDING_THRESHOLD * ((i_len + 1) * (j_len + 1)) as f64) as usize;

        // Using too much space: refill to take advantage of rebanding.
        if alpha.used_entries() >= max_size || beta.used_entries() >= max_size {
            debug!(
                "rebanding: alpha {} / beta {} used entries exceed {}",
                alpha.used_entries(),
                beta.used_entries(),
                max_size
            );
            self.fill_alpha(e, Some(&*beta), alpha);
            self.fill_beta(e, Some(&*alpha), beta);
            self.fill_alpha(e, Some(&*beta), alpha);
            flip_flops += 3;
        }

        while (alpha.get(i_len, j_len) - beta.get(0, 0)).abs() > ALPHA_BETA_MISMATCH_TOLERANCE
            && flip_flops <= MAX_FLIP_FLOPS
        {
            if flip_flops % 2 == 0 {
                self.fill_alpha(e, Some(&*beta), alpha);
            } else {
                self.fill_beta(e, Some(&*alpha), beta);
            }
            flip_flops += 1;
        }

        let a = alpha.get(i_len, j_len);
        let b = beta.get(0, 0);
        if a == NEG_INF || b == NEG_INF {
            return Err(QvError::PathInfeasible {
                read_len: i_len,
                tpl_len: j_len,
            });
        }
        if (a - b).abs() > ALPHA_BETA_MISMATCH_TOLERANCE {
            if cfg!(debug_assertions) {
                return Err(QvError::AlphaBetaMismatch { alpha: a, beta: b });
            }
            warn!(
                "alpha/beta terminal scores still diverged after {} refills: {} vs {}",
                flip_flops, a, b
            );
        }
        Ok(flip_flops)
    }

    /// Recompute `num_ext_columns` columns of alpha starting at
    /// `begin_column`, writing into `ext` instead of the full matrix.
    /// Columns of `ext` beyond alpha's width take alpha's last used range
    /// extended to the bottom row.
    fn extend_alpha(
        &self,
        e: &QvEvaluator<'_>,
        alpha: &Self::Matrix,
        begin_column: usize,
        ext: &mut Self::Matrix,
        num_ext_columns: usize,
    ) {
        debug_assert!(num_ext_columns >= 2);
        debug_assert!(alpha.rows() == e.read_len() + 1 && ext.rows() == e.read_len() + 1);
        debug_assert!(begin_column >= 2 && begin_column + 1 < e.tpl_len() + 1);
        debug_assert!(ext.cols() >= num_ext_columns);

        let merge_on = self.move_set().contains(MoveSet::MERGE);
        for ext_col in 0..num_ext_columns {
            let j = begin_column + ext_col;
            let (begin_row, end_row) = if j < alpha.cols() {
                alpha.used_row_range(j)
            } else {
                (alpha.used_row_range(alpha.cols() - 1).0, alpha.rows())
            };
            ext.start_editing_column(ext_col, begin_row, end_row);
            for i in begin_row..end_row {
                let mut score = NEG_INF;
                if i > 0 && j > 0 {
                    let prev = if ext_col == 0 {
                        alpha.get(i - 1, j - 1)
                    } else {
                        ext.get(i - 1, ext_col - 1)
                    };
                    score = Self::Combiner::combine(score, prev + e.inc(i - 1, j - 1));
                }
                if i > 0 {
                    score = Self::Combiner::combine(score, ext.get(i - 1, ext_col) + e.extra(i - 1, j));
                }
                if j > 0 {
                    let prev = if ext_col == 0 {
                        alpha.get(i, j - 1)
                    } else {
                        ext.get(i, ext_col - 1)
                    };
                    score = Self::Combiner::combine(score, prev + e.del(i, j - 1));
                }
                if merge_on && i > 0 && j > 1 {
                    let prev = if ext_col >= 2 {
                        ext.get(i - 1, ext_col - 2)
                    } else {
                        alpha.get(i - 1, j - 2)
                    };
                    score = Self::Combiner::combine(score, prev + e.merge(i - 1, j - 2));
                }
                ext.set(i, ext_col, score);
            }
            ext.finish_editing_column(ext_col, begin_row, end_row);
        }
    }

    /// Backward counterpart of `extend_alpha`. `last_column` is the largest
    /// (old-template) beta column recomputed, filled first; `length_diff`
    /// maps old beta columns onto the evaluator's template positions when
    /// the template length changed.
    fn extend_beta(
        &self,
        e: &QvEvaluator<'_>,
        beta: &Self::Matrix,
        last_column: usize,
        ext: &mut Self::Matrix,
        num_ext_columns: usize,
        length_diff: isize,
    ) {
        let i_len = beta.rows() - 1;
        let j_len = beta.cols() - 1;
        let last_ext_col = num_ext_columns - 1;
        debug_assert!(ext.rows() == i_len + 1);
        debug_assert!(last_column + 2 <= j_len);
        debug_assert!(ext.cols() >= num_ext_columns);

        let merge_on = self.move_set().contains(MoveSet::MERGE);
        for step in 0..num_ext_columns {
            let j = last_column as isize - step as isize;
            let ext_col = last_ext_col - step;
            let (begin_row, end_row) = if j < 0 {
                (0, beta.used_row_range(0).1)
            } else {
                beta.used_row_range(j as usize)
            };
            let jp = j + length_diff;
            debug_assert!(jp >= 0 && jp <= e.tpl_len() as isize);
            let jp = jp as usize;
            ext.start_editing_column(ext_col, begin_row, end_row);
            let mut i = end_row;
            while i > begin_row {
                let row = i - 1;
                let mut score = NEG_INF;
                if row < i_len && j < j_len as isize {
                    let prev = if ext_col == last_ext_col {
                        beta.get(row + 1, (j + 1) as usize)
                    } else {
                        ext.get(row + 1, ext_col + 1)
                    };
                    score = Self::Combiner::combine(score, prev + e.inc(row, jp));
                }
                if row < i_len {
                    score = Self::Combiner::combine(score, ext.get(row + 1, ext_col) + e.extra(row, jp));
                }
                if j < j_len as isize {
                    let prev = if ext_col == last_ext_col {
                        beta.get(row, (j + 1) as usize)
                    } else {
                        ext.get(row, ext_col + 1)
                    };
                    score = Self::Combiner::combine(score, prev + e.del(row, jp));
                }
                if merge_on && j + 1 < j_len as isize && row < i_len {
                    let prev = if ext_col + 2 <= last_ext_col {
                        ext.get(row + 1, ext_col + 2)
                    } else {
                        beta.get(row + 1, (j + 2) as usize)
                    };
                    score = Self::Combiner::combine(score, prev + e.merge(row, jp));
                }
                ext.set(row, ext_col, score);
                i -= 1;
            }
            ext.finish_editing_column(ext_col, begin_row, end_row);
        }
    }

    /// Total path score through a shared column, stitching an alpha prefix
    /// to a beta suffix. `alpha_column`, `beta_column` and
    /// `absolute_column` name the same logical template position; they
    /// differ when either matrix covers a sub-range of the template.
    fn link_alpha_beta(
        &self,
        e: &QvEvaluator<'_>,
        alpha: &Self::Matrix,
        alpha_column: usize,
        beta: &Self::Matrix,
        beta_column: usize,
        absolute_column: usize,
    ) -> f64 {
        let i_len = e.read_len();
        debug_assert!(alpha_column > 1 && absolute_column > 1);
        debug_assert!(absolute_column < e.tpl_len());

        let (used_begin, used_end) = banding::range_union(
            banding::range_union(
                alpha.used_row_range(alpha_column - 2),
                alpha.used_row_range(alpha_column - 1),
            ),
            banding::range_union(
                beta.used_row_range(beta_column),
                beta.used_row_range(beta_column + 1),
            ),
        );

        let merge_on = self.move_set().contains(MoveSet::MERGE);
        let mut v = NEG_INF;
        for i in used_begin..used_end {
            if i < i_len {
                // Incorporate
                v = Self::Combiner::combine(
                    v,
                    alpha.get(i, alpha_column - 1)
                        + e.inc(i, absolute_column - 1)
                        + beta.get(i + 1, beta_column),
                );
                // Merge, both ways of straddling the link column
                if merge_on {
                    v = Self::Combiner::combine(
                        v,
                        alpha.get(i, alpha_column - 2)
                            + e.merge(i, absolute_column - 2)
                            + beta.get(i + 1, beta_column),
                    );
                    v = Self::Combiner::combine(
                        v,
                        alpha.get(i, alpha_column - 1)
                            + e.merge(i, absolute_column - 1)
                            + beta.get(i + 1, beta_column + 1),
                    );
                }
            }
            // Delete
            v = Self::Combiner::combine(
                v,
                alpha.get(i, alpha_column - 1)
                    + e.del(i, absolute_column - 1)
                    + beta.get(i, beta_column),
            );
        }
        v
    }

    /// Viterbi backtrack through a filled alpha matrix.
    ///
    /// Ties resolve by a fixed evaluation order (incorporation, deletion,
    /// extra, merge, under strict improvement) so repeated runs reproduce
    /// the same transcript.
    fn alignment(&self, e: &QvEvaluator<'_>, alpha: &Self::Matrix) -> QvResult<PairwiseAlignment> {
        assert!(
            Self::Combiner::IS_VITERBI,
            "transcript decoding requires the Viterbi combiner"
        );
        let i_len = e.read_len();
        let j_len = e.tpl_len();
        if alpha.get(i_len, j_len) == NEG_INF {
            return Err(QvError::PathInfeasible {
                read_len: i_len,
                tpl_len: j_len,
            });
        }

        let merge_on = self.move_set().contains(MoveSet::MERGE);
        let mut i = i_len;
        let mut j = j_len;
        let mut moves: Vec<AlignmentMove> = Vec::new();

        while i > 0 || j > 0 {
            let mut best_move: Option<AlignmentMove> = None;
            let mut best_score = NEG_INF;

            if i > 0 && j > 0 {
                let total = alpha.get(i - 1, j - 1) + e.inc(i - 1, j - 1);
                if total > best_score {
                    best_score = total;
                    best_move = Some(if e.is_match(i - 1, j - 1) {
                        AlignmentMove::Match
                    } else {
                        AlignmentMove::Mismatch
                    });
                }
            }
            if j > 0 {
                let free_delete =
                    (!e.pin_end() && i == i_len) || (!e.pin_start() && i == 0);
                let move_score = if free_delete { 0.0 } else { e.del(i, j - 1) };
                let total = alpha.get(i, j - 1) + move_score;
                if total > best_score {
                    best_score = total;
                    best_move = Some(AlignmentMove::Deletion);
                }
            }
            if i > 0 {
                let total = alpha.get(i - 1, j) + e.extra(i - 1, j);
                if total > best_score {
                    best_score = total;
                    best_move = Some(AlignmentMove::Insertion);
                }
            }
            if merge_on && i > 0 && j > 1 {
                let total = alpha.get(i - 1, j - 2) + e.merge(i - 1, j - 2);
                if total > best_score {
                    best_score = total;
                    best_move = Some(AlignmentMove::Merge);
                }
            }

            let Some(mv) = best_move else {
                // Band discontinuity: no stored predecessor.
                return Err(QvError::PathInfeasible {
                    read_len: i_len,
                    tpl_len: j_len,
                });
            };
            debug_assert!((alpha.get(i, j) - best_score).abs() < 1e-9);
            moves.push(mv);
            i -= mv.read_delta();
            j -= mv.tpl_delta();
        }
        moves.reverse();

        // Replay the moves to build the gapped strings.
        let tpl = e.template();
        let read = e.read().seq();
        let mut target = String::new();
        let mut query = String::new();
        let (mut i, mut j) = (0usize, 0usize);
        for &mv in &moves {
            match mv {
                AlignmentMove::Match | AlignmentMove::Mismatch => {
                    target.push(tpl[j] as char);
                    query.push(read[i] as char);
                }
                AlignmentMove::Insertion => {
                    target.push('-');
                    query.push(read[i] as char);
                }
                AlignmentMove::Deletion => {
                    target.push(tpl[j] as char);
                    query.push('-');
                }
                AlignmentMove::Merge => {
                    target.push(tpl[j] as char);
                    target.push(tpl[j + 1] as char);
                    query.push('-');
                    query.push(read[i] as char);
                }
            }
            i += mv.read_delta();
            j += mv.tpl_delta();
        }
        Ok(PairwiseAlignment::with_moves(target, query, moves))
    }
}

/// Reference scalar strategy, parameterized by matrix backing and combiner.
#[derive(Debug)]
pub struct SimpleRecursor<M, C> {
    moves: MoveSet,
    banding: BandingOptions,
    _strategy: PhantomData<fn() -> (M, C)>,
}

impl<M: ScoreMatrix, C: Combiner> SimpleRecursor<M, C> {
    pub fn new(moves: MoveSet, banding: BandingOptions) -> QvResult<Self> {
        banding.validate()?;
        if !moves.contains(MoveSet::BASIC) {
            return Err(QvError::InvalidMoveSet { moves });
        }
        Ok(Self {
            moves,
            banding,
            _strategy: PhantomData,
        })
    }
}

impl<M: ScoreMatrix, C: Combiner> Recursor for SimpleRecursor<M, C> {
    type Matrix = M;
    type Combiner = C;

    fn move_set(&self) -> MoveSet {
        self.moves
    }

    fn banding(&self) -> &BandingOptions {
        &self.banding
    }

    fn fill_alpha(&self, e: &QvEvaluator<'_>, guide: Option<&M>, alpha: &mut M) {
        let i_len = e.read_len();
        let j_len = e.tpl_len();
        debug_assert!(alpha.rows() == i_len + 1 && alpha.cols() == j_len + 1);

        let bw = self.banding.bandwidth;
        let score_diff = self.banding.score_diff;

        let mut hint = (0usize, 0usize);
        for j in 0..=j_len {
            banding::range_guide(j, guide, &*alpha, score_diff, &mut hint);
            // Every row reachable from the previous band by a single move.
            hint.1 = (hint.1 + 1).min(i_len + 1);
            let center = if j == 0 {
                0
            } else {
                alpha.column_max(j - 1).0 + 1
            };
            hint = banding::clip_to_bandwidth(hint, center, bw);

            let begin_row = hint.0.min(i_len + 1);
            let max_end_row = begin_row.saturating_add(bw).min(i_len + 1);
            let required_end = hint.1.min(max_end_row);

            alpha.start_editing_column(j, begin_row, required_end.max(begin_row));
            let mut score = NEG_INF;
            let mut max_score = NEG_INF;
            let mut threshold = NEG_INF;
            let mut i = begin_row;
            while i < max_end_row && (score >= threshold || i < required_end) {
                score = alpha_cell::<M, C>(e, alpha, self.moves, i, j);
                alpha.set(i, j, score);
                if score > max_score {
                    max_score = score;
                    threshold = max_score - score_diff;
                }
                i += 1;
            }
            let end_row = i;
            alpha.finish_editing_column(j, begin_row, end_row);

            // Revise the hint to where the mass actually lived.
            hint.1 = end_row;
            let mut lo = begin_row;
            while lo < end_row && alpha.get(lo, j) < threshold {
                lo += 1;
            }
            hint.0 = lo;
        }
    }

    fn fill_beta(&self, e: &QvEvaluator<'_>, guide: Option<&M>, beta: &mut M) {
        let i_len = e.read_len();
        let j_len = e.tpl_len();
        debug_assert!(beta.rows() == i_len + 1 && beta.cols() == j_len + 1);

        let bw = self.banding.bandwidth;
        let score_diff = self.banding.score_diff;

        let mut hint = (i_len + 1, i_len + 1);
        for j in (0..=j_len).rev() {
            banding::range_guide(j, guide, &*beta, score_diff, &mut hint);
            hint.0 = hint.0.saturating_sub(1);
            let center = if j == j_len {
                i_len
            } else {
                beta.column_max(j + 1).0.saturating_sub(1)
            };
            hint = banding::clip_to_bandwidth(hint, center, bw);

            let end_row = hint.1.min(i_len + 1);
            let min_begin_row = end_row.saturating_sub(bw);
            let required_begin = hint.0.max(min_begin_row);

            beta.start_editing_column(j, required_begin.min(end_row), end_row);
            let mut score = NEG_INF;
            let mut max_score = NEG_INF;
            let mut threshold = NEG_INF;
            let mut i = end_row;
            while i > min_begin_row && (score >= threshold || i > required_begin) {
                let row = i - 1;
                score = beta_cell::<M, C>(e, beta, self.moves, row, j);
                beta.set(row, j, score);
                if score > max_score {
                    max_score = score;
                    threshold = max_score - score_diff;
                }
                i -= 1;
            }
            let begin_row = i;
            beta.finish_editing_column(j, begin_row, end_row);

            hint.0 = begin_row;
            let mut hi = end_row;
            while hi > begin_row && beta.get(hi - 1, j) < threshold {
                hi -= 1;
            }
            hint.1 = hi;
        }
    }
}

pub type SimpleQvRecursor = SimpleRecursor<DenseMatrix, super::combiner::ViterbiCombiner>;
pub type SparseQvRecursor = SimpleRecursor<SparseMatrix, super::combiner::ViterbiCombiner>;
pub type SparseSumProductRecursor = SimpleRecursor<SparseMatrix, super::combiner::SumProductCombiner>;
