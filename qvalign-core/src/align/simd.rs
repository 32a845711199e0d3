//! Vectorized recursor: four matrix cells per instruction in the column
//! fills. Produces the same transcripts as the scalar strategies; under the
//! Viterbi combiner the cell values are bit-identical.

use std::marker::PhantomData;

use wide::f64x4;

use super::banding::{self, BandingOptions};
use super::combiner::Combiner;
use super::evaluator::QvEvaluator;
use super::matrix::{ScoreMatrix, SparseMatrix, NEG_INF};
use super::params::MoveSet;
use super::recursor::{alpha_cell, beta_cell, Recursor};
use crate::error::{QvError, QvResult};

pub struct SimdRecursor<M, C> {
    moves: MoveSet,
    banding: BandingOptions,
    _strategy: PhantomData<fn() -> (M, C)>,
}

impl<M: ScoreMatrix, C: Combiner> SimdRecursor<M, C> {
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

impl<M: ScoreMatrix, C: Combiner> Recursor for SimdRecursor<M, C> {
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
        let merge_on = self.moves.contains(MoveSet::MERGE);

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

            // Scalar prologue: row 0 must go through here, and it leaves the
            // remaining row count divisible by four so the lane loop can run
            // to the last row.
            let mut i = begin_row;
            while i < max_end_row && (i == 0 || (i_len + 1 - i) % 4 != 0) {
                score = alpha_cell::<M, C>(e, alpha, self.moves, i, j);
                alpha.set(i, j, score);
                if score > max_score {
                    max_score = score;
                    threshold = max_score - score_diff;
                }
                i += 1;
            }

            // Lane loop over blocks of four rows.
            while i + 4 <= max_end_row && (score >= threshold || i < required_end) {
                let mut score4 = f64x4::splat(NEG_INF);
                if j > 0 {
                    score4 = C::combine4(score4, alpha.get4(i - 1, j - 1) + e.inc4(i - 1, j - 1));
                }
                if merge_on && j >= 2 {
                    score4 = C::combine4(score4, alpha.get4(i - 1, j - 2) + e.merge4(i - 1, j - 2));
                }
                if j > 0 {
                    score4 = C::combine4(score4, alpha.get4(i, j - 1) + e.del4(i, j - 1));
                }

                // Extra: the within-column dependency runs as a five-slot
                // scalar cascade seeded with the row above the block.
                let ins4 = e.extra4(i - 1, j).to_array();
                let mut s5 = [0.0f64; 5];
                s5[0] = alpha.get(i - 1, j);
                s5[1..5].copy_from_slice(&score4.to_array());
                for k in 1..5 {
                    s5[k] = C::combine(s5[k], s5[k - 1] + ins4[k - 1]);
                }
                alpha.set4(i, j, f64x4::from([s5[1], s5[2], s5[3], s5[4]]));

                let mut block_max = s5[1];
                let mut block_min = s5[1];
                for &v in &s5[2..5] {
                    block_max = block_max.max(v);
                    block_min = block_min.min(v);
                }
                score = block_min;
                if block_max > max_score {
                    max_score = block_max;
                    threshold = max_score - score_diff;
                }
                i += 4;
            }

            // Scalar epilogue when the bandwidth cap is not lane-aligned.
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
        let merge_on = self.moves.contains(MoveSet::MERGE);

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

            // Scalar prologue: the bottom row goes through here, stopping
            // once the rows below the cursor are a multiple of four.
            let mut i = end_row;
            while i > min_begin_row {
                let row = i - 1;
                if !(row == i_len || (row + 1) % 4 != 0) {
                    break;
                }
                score = beta_cell::<M, C>(e, beta, self.moves, row, j);
                beta.set(row, j, score);
                if score > max_score {
                    max_score = score;
                    threshold = max_score - score_diff;
                }
                i -= 1;
            }

            // Lane loop over blocks of four rows, moving upward.
            while i >= min_begin_row + 4 && (score >= threshold || i > required_begin) {
                let base = i - 4;
                let mut score4 = f64x4::splat(NEG_INF);
                if j < j_len {
                    score4 = C::combine4(score4, beta.get4(base + 1, j + 1) + e.inc4(base, j));
                }
                if merge_on && j + 1 < j_len {
                    score4 = C::combine4(score4, beta.get4(base + 1, j + 2) + e.merge4(base, j));
                }
                if j < j_len {
                    score4 = C::combine4(score4, beta.get4(base, j + 1) + e.del4(base, j));
                }

                let ins4 = e.extra4(base, j).to_array();
                let mut s5 = [0.0f64; 5];
                s5[4] = beta.get(base + 4, j);
                s5[0..4].copy_from_slice(&score4.to_array());
                for k in (0..4).rev() {
                    s5[k] = C::combine(s5[k], s5[k + 1] + ins4[k]);
                }
                beta.set4(base, j, f64x4::from([s5[0], s5[1], s5[2], s5[3]]));

                let mut block_max = s5[0];
                let mut block_min = s5[0];
                for &v in &s5[1..4] {
                    block_max = block_max.max(v);
                    block_min = block_min.min(v);
                }
                score = block_min;
                if block_max > max_score {
                    max_score = block_max;
                    threshold = max_score - score_diff;
                }
                i -= 4;
            }

            // Scalar epilogue under the bandwidth cap.
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

pub type SparseSimdQvRecursor = SimdRecursor<SparseMatrix, super::combiner::ViterbiCombiner>;
