pub mod banding;
pub mod combiner;
pub mod evaluator;
pub mod features;
pub mod matrix;
pub mod pairwise;
pub mod params;
pub mod recursor;
#[cfg(feature = "simd")]
pub mod simd;

pub use banding::BandingOptions;
pub use combiner::{Combiner, SumProductCombiner, ViterbiCombiner};
pub use evaluator::QvEvaluator;
pub use features::{QvFeatures, QvRead};
pub use matrix::{DenseMatrix, ScoreMatrix, SparseMatrix, NEG_INF};
pub use pairwise::{
    align_nw, target_to_query_positions, AlignmentMove, NwParams, PairwiseAlignment,
};
pub use params::{preset, presets, ModelPreset, MoveSet, QvConfig, QvModelParams};
pub use recursor::{
    Recursor, SimpleQvRecursor, SimpleRecursor, SparseQvRecursor, SparseSumProductRecursor,
};
#[cfg(feature = "simd")]
pub use simd::{SimdRecursor, SparseSimdQvRecursor};

#[cfg(test)]
mod tests;

use crate::error::{QvError, QvResult};

/// Align one read against a template with the banded sparse recursor,
/// returning the decoded transcript.
pub fn align_read(tpl: &[u8], read: &QvRead, config: &QvConfig) -> QvResult<PairwiseAlignment> {
    let e = QvEvaluator::new(read, tpl, &config.params)?;
    let recursor = SparseQvRecursor::new(config.moves, config.banding)?;
    let mut alpha = SparseMatrix::new(read.len() + 1, tpl.len() + 1);
    let mut beta = SparseMatrix::new(read.len() + 1, tpl.len() + 1);
    recursor.fill_alpha_beta(&e, &mut alpha, &mut beta)?;
    recursor.alignment(&e, &alpha)
}

/// Log-likelihood of a read given a template: the terminal cell of a banded
/// forward pass.
pub fn score_read(tpl: &[u8], read: &QvRead, config: &QvConfig) -> QvResult<f64> {
    let e = QvEvaluator::new(read, tpl, &config.params)?;
    let recursor = SparseQvRecursor::new(config.moves, config.banding)?;
    let mut alpha = SparseMatrix::new(read.len() + 1, tpl.len() + 1);
    recursor.fill_alpha(&e, None, &mut alpha);
    let score = alpha.get(read.len(), tpl.len());
    if score == NEG_INF {
        return Err(QvError::PathInfeasible {
            read_len: read.len(),
            tpl_len: tpl.len(),
        });
    }
    Ok(score)
}

/// Score many reads against one template, one independent matrix fill per
/// read (parallel when the `parallel` feature is on).
pub fn score_reads(tpl: &[u8], reads: &[QvRead], config: &QvConfig) -> Vec<QvResult<f64>> {
    par_map!(reads, |read| score_read(tpl, read, config))
}
