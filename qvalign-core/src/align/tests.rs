use approx::assert_relative_eq;
use proptest::prelude::*;

use super::banding::BandingOptions;
use super::combiner::{Combiner, SumProductCombiner, ViterbiCombiner};
use super::evaluator::QvEvaluator;
use super::features::{QvFeatures, QvRead};
use super::matrix::{DenseMatrix, ScoreMatrix, SparseMatrix, NEG_INF};
use super::pairwise::{align_nw, target_to_query_positions, AlignmentMove, NwParams, PairwiseAlignment};
use super::params::{preset, presets, MoveSet, QvConfig, QvModelParams};
use super::recursor::{Recursor, SimpleRecursor};
#[cfg(feature = "simd")]
use super::simd::SimdRecursor;
use super::{align_read, score_read, score_reads};
use crate::error::QvError;

fn testing_params() -> QvModelParams {
    preset("*").unwrap().clone()
}

fn no_banding() -> BandingOptions {
    BandingOptions::unbanded()
}

fn standard_banding() -> BandingOptions {
    BandingOptions::new(15, 200.0)
}

/// Uniform construction across strategies so one suite can drive them all.
trait TestRecursor: Recursor + Sized {
    fn make(moves: MoveSet, banding: BandingOptions) -> Self;
}

impl<M: ScoreMatrix, C: Combiner> TestRecursor for SimpleRecursor<M, C> {
    fn make(moves: MoveSet, banding: BandingOptions) -> Self {
        SimpleRecursor::new(moves, banding).unwrap()
    }
}

#[cfg(feature = "simd")]
impl<M: ScoreMatrix, C: Combiner> TestRecursor for SimdRecursor<M, C> {
    fn make(moves: MoveSet, banding: BandingOptions) -> Self {
        SimdRecursor::new(moves, banding).unwrap()
    }
}

fn filled_alpha<R: TestRecursor>(r: &R, e: &QvEvaluator<'_>) -> R::Matrix {
    let mut alpha = R::Matrix::new(e.read_len() + 1, e.tpl_len() + 1);
    r.fill_alpha(e, None, &mut alpha);
    alpha
}

fn filled_beta<R: TestRecursor>(r: &R, e: &QvEvaluator<'_>) -> R::Matrix {
    let mut beta = R::Matrix::new(e.read_len() + 1, e.tpl_len() + 1);
    r.fill_beta(e, None, &mut beta);
    beta
}

fn decode<R: TestRecursor>(tpl: &[u8], read_seq: &[u8], moves: MoveSet) -> PairwiseAlignment {
    let params = testing_params();
    let read = QvRead::anonymous(read_seq).unwrap();
    let e = QvEvaluator::new(&read, tpl, &params).unwrap();
    let r = R::make(moves, no_banding());
    let alpha = filled_alpha(&r, &e);
    r.alignment(&e, &alpha).unwrap()
}

//
// Per-strategy suite: every recursor must pass the same checks.
//

fn small_match_impl<R: TestRecursor<Combiner = ViterbiCombiner>>() {
    let params = testing_params();
    let read = QvRead::anonymous(b"GATG").unwrap();
    let e = QvEvaluator::new(&read, b"GATG", &params).unwrap();
    let r = R::make(MoveSet::BASIC, no_banding());
    let alpha = filled_alpha(&r, &e);
    let beta = filled_beta(&r, &e);
    assert_eq!(alpha.get(4, 4), 0.0);
    assert_eq!(beta.get(0, 0), 0.0);

    let aln = r.alignment(&e, &alpha).unwrap();
    assert_eq!(aln.target(), "GATG");
    assert_eq!(aln.query(), "GATG");
    assert_eq!(aln.accuracy(), 1.0);
}

fn small_mismatch_impl<R: TestRecursor<Combiner = ViterbiCombiner>>() {
    let params = testing_params();
    let read = QvRead::anonymous(b"GATC").unwrap();
    let e = QvEvaluator::new(&read, b"GATG", &params).unwrap();
    let r = R::make(MoveSet::BASIC, no_banding());
    let alpha = filled_alpha(&r, &e);
    let beta = filled_beta(&r, &e);
    assert_eq!(alpha.get(4, 4), -10.0);
    assert_eq!(beta.get(0, 0), -10.0);

    let aln = r.alignment(&e, &alpha).unwrap();
    assert_eq!(aln.target(), "GATG");
    assert_eq!(aln.query(), "GATC");
    assert_eq!(aln.mismatches(), 1);
}

fn small_merge_impl<R: TestRecursor<Combiner = ViterbiCombiner>>() {
    let params = testing_params();
    let read = QvRead::anonymous(b"GAT").unwrap();
    let e = QvEvaluator::new(&read, b"GATT", &params).unwrap();
    let r = R::make(MoveSet::ALL, no_banding());
    let alpha = filled_alpha(&r, &e);
    let beta = filled_beta(&r, &e);
    assert_eq!(alpha.get(3, 4), -2.0);
    assert_eq!(beta.get(0, 0), -2.0);

    let aln = r.alignment(&e, &alpha).unwrap();
    assert_eq!(aln.target(), "GATT");
    assert_eq!(aln.query(), "GA-T");
    assert_eq!(
        aln.moves()
            .iter()
            .filter(|&&m| m == AlignmentMove::Merge)
            .count(),
        1
    );
}

fn gattaca_exact_impl<R: TestRecursor<Combiner = ViterbiCombiner>>() {
    let aln = decode::<R>(b"GATTACA", b"GATTACA", MoveSet::ALL);
    assert_eq!(aln.transcript(), "MMMMMMM");
    assert_eq!(aln.accuracy(), 1.0);
}

fn gattaca_one_extra_base_impl<R: TestRecursor<Combiner = ViterbiCombiner>>() {
    let aln = decode::<R>(b"GATTACA", b"GATTTACA", MoveSet::ALL);
    assert_eq!(
        aln.moves()
            .iter()
            .filter(|&&m| m == AlignmentMove::Insertion)
            .count(),
        1
    );
    assert_eq!(aln.matches(), 7);
    assert_relative_eq!(aln.accuracy(), 7.0 / 8.0);
}

fn merge_disabled_impl<R: TestRecursor<Combiner = ViterbiCombiner>>() {
    // Merge is priced better than a deletion here, but the move set rules
    // it out entirely.
    let mut params = testing_params();
    params.merge = [-0.1; 4];
    let read = QvRead::anonymous(b"GAT").unwrap();
    let e = QvEvaluator::new(&read, b"GATT", &params).unwrap();
    let r = R::make(MoveSet::BASIC, no_banding());
    let alpha = filled_alpha(&r, &e);
    let aln = r.alignment(&e, &alpha).unwrap();
    assert!(aln.moves().iter().all(|&m| m != AlignmentMove::Merge));
    assert_eq!(alpha.get(3, 4), -4.0); // forced to pay the deletion
}

fn link_matches_terminal_impl<R: TestRecursor<Combiner = ViterbiCombiner>>() {
    let params = testing_params();
    let read = QvRead::anonymous(b"GATTTACA").unwrap();
    let tpl = b"GATTACA";
    let e = QvEvaluator::new(&read, tpl, &params).unwrap();
    let r = R::make(MoveSet::ALL, no_banding());
    let alpha = filled_alpha(&r, &e);
    let beta = filled_beta(&r, &e);
    let total = alpha.get(read.len(), tpl.len());
    for j in 2..tpl.len() {
        let linked = r.link_alpha_beta(&e, &alpha, j, &beta, j, j);
        assert_relative_eq!(linked, total, max_relative = 1e-6);
    }
}

fn roundtrip_impl<R: TestRecursor<Combiner = ViterbiCombiner>>() {
    let tpl = b"GATTACAGATTACA";
    let read_seq = b"GATACAGTTTACA";
    let aln = decode::<R>(tpl, read_seq, MoveSet::ALL);
    let degapped_target: Vec<u8> = aln.target().bytes().filter(|&b| b != b'-').collect();
    let degapped_query: Vec<u8> = aln.query().bytes().filter(|&b| b != b'-').collect();
    assert_eq!(degapped_target, tpl);
    assert_eq!(degapped_query, read_seq);
}

macro_rules! recursor_suite {
    ($name:ident, $ty:ty) => {
        mod $name {
            use super::*;

            #[test]
            fn small_match() {
                small_match_impl::<$ty>();
            }

            #[test]
            fn small_mismatch() {
                small_mismatch_impl::<$ty>();
            }

            #[test]
            fn small_merge() {
                small_merge_impl::<$ty>();
            }

            #[test]
            fn gattaca_exact() {
                gattaca_exact_impl::<$ty>();
            }

            #[test]
            fn gattaca_one_extra_base() {
                gattaca_one_extra_base_impl::<$ty>();
            }

            #[test]
            fn merge_disabled() {
                merge_disabled_impl::<$ty>();
            }

            #[test]
            fn link_matches_terminal() {
                link_matches_terminal_impl::<$ty>();
            }

            #[test]
            fn roundtrip() {
                roundtrip_impl::<$ty>();
            }
        }
    };
}

recursor_suite!(simple_dense, SimpleRecursor<DenseMatrix, ViterbiCombiner>);
recursor_suite!(simple_sparse, SimpleRecursor<SparseMatrix, ViterbiCombiner>);
#[cfg(feature = "simd")]
recursor_suite!(simd_sparse, SimdRecursor<SparseMatrix, ViterbiCombiner>);
#[cfg(feature = "simd")]
recursor_suite!(simd_dense, SimdRecursor<DenseMatrix, ViterbiCombiner>);

//
// Cross-strategy agreement.
//

fn transcript_of<R: TestRecursor<Combiner = ViterbiCombiner>>(
    tpl: &[u8],
    read: &QvRead,
    moves: MoveSet,
    banding: BandingOptions,
) -> (f64, String) {
    let params = testing_params();
    let e = QvEvaluator::new(read, tpl, &params).unwrap();
    let r = R::make(moves, banding);
    let alpha = filled_alpha(&r, &e);
    let aln = r.alignment(&e, &alpha).unwrap();
    (alpha.get(read.len(), tpl.len()), aln.transcript().to_string())
}

#[test]
fn strategies_agree_on_transcripts() {
    let cases: Vec<(&[u8], &[u8])> = vec![
        (b"GATTACA", b"GATTACA"),
        (b"GATTACA", b"GATTTACA"),
        (b"GATTACA", b"GATACA"),
        (b"GATTACAGATTACA", b"GATCACAGTTACA"),
        (b"AAAAAAA", b"AAAAAA"),
    ];
    for (tpl, read_seq) in cases {
        let read = QvRead::anonymous(read_seq).unwrap();
        for moves in [MoveSet::BASIC, MoveSet::ALL] {
            let (s_dense, t_dense) = transcript_of::<SimpleRecursor<DenseMatrix, ViterbiCombiner>>(
                tpl,
                &read,
                moves,
                no_banding(),
            );
            let (s_sparse, t_sparse) = transcript_of::<SimpleRecursor<SparseMatrix, ViterbiCombiner>>(
                tpl,
                &read,
                moves,
                standard_banding(),
            );
            assert_eq!(t_dense, t_sparse);
            assert_relative_eq!(s_dense, s_sparse, max_relative = 1e-9);

            #[cfg(feature = "simd")]
            {
                let (s_simd, t_simd) = transcript_of::<SimdRecursor<SparseMatrix, ViterbiCombiner>>(
                    tpl,
                    &read,
                    moves,
                    standard_banding(),
                );
                assert_eq!(t_dense, t_simd);
                assert_relative_eq!(s_dense, s_simd, max_relative = 1e-9);
            }
        }
    }
}

//
// Banding behavior.
//

#[test]
fn narrow_band_reports_infeasible_path() {
    // Five extra bases cannot fit through a one-row band.
    let params = testing_params();
    let read = QvRead::anonymous(b"GATTTTTTTACA").unwrap();
    let tpl = b"GATTACA";
    let e = QvEvaluator::new(&read, tpl, &params).unwrap();
    let r = SimpleRecursor::<SparseMatrix, ViterbiCombiner>::new(
        MoveSet::BASIC,
        BandingOptions::new(1, 200.0),
    )
    .unwrap();
    let mut alpha = SparseMatrix::new(read.len() + 1, tpl.len() + 1);
    let mut beta = SparseMatrix::new(read.len() + 1, tpl.len() + 1);
    let err = r.fill_alpha_beta(&e, &mut alpha, &mut beta).unwrap_err();
    assert!(matches!(err, QvError::PathInfeasible { .. }));
}

#[test]
fn narrow_band_still_tracks_an_exact_match() {
    let params = testing_params();
    let read = QvRead::anonymous(b"GATTACA").unwrap();
    let e = QvEvaluator::new(&read, b"GATTACA", &params).unwrap();
    let r = SimpleRecursor::<SparseMatrix, ViterbiCombiner>::new(
        MoveSet::BASIC,
        BandingOptions::new(1, 200.0),
    )
    .unwrap();
    let alpha = filled_alpha(&r, &e);
    assert_eq!(alpha.get(7, 7), 0.0);
}

#[test]
fn widening_bandwidth_never_lowers_the_terminal_score() {
    let params = testing_params();
    let read = QvRead::anonymous(b"GATTTTACA").unwrap(); // two extra bases
    let tpl = b"GATTACA";
    let e = QvEvaluator::new(&read, tpl, &params).unwrap();
    let mut last = NEG_INF;
    for bw in [1usize, 2, 4, 8, 16, 32] {
        let r = SimpleRecursor::<SparseMatrix, ViterbiCombiner>::new(
            MoveSet::BASIC,
            BandingOptions::new(bw, 200.0),
        )
        .unwrap();
        let alpha = filled_alpha(&r, &e);
        let score = alpha.get(read.len(), tpl.len());
        assert!(
            score >= last,
            "bandwidth {} lowered the score: {} < {}",
            bw,
            score,
            last
        );
        last = score;
    }
    assert!(last > NEG_INF);
}

#[test]
fn banded_fill_stays_within_the_bandwidth_cap() {
    let params = testing_params();
    let tpl: Vec<u8> = b"GATTACACCGTTAGACGATTACACCGTTAGACGATTACACCGTTAGAC".to_vec();
    let read = QvRead::anonymous(&tpl).unwrap();
    let e = QvEvaluator::new(&read, &tpl, &params).unwrap();
    let bw = 8usize;
    let r = SimpleRecursor::<SparseMatrix, ViterbiCombiner>::new(
        MoveSet::BASIC,
        BandingOptions::new(bw, 10.0),
    )
    .unwrap();
    let alpha = filled_alpha(&r, &e);
    assert!(alpha.used_entries() <= bw * (tpl.len() + 1));
    assert_eq!(alpha.get(read.len(), tpl.len()), 0.0);
}

#[test]
fn fill_alpha_beta_scores_agree() {
    let params = testing_params();
    let read = QvRead::anonymous(b"GATTTACAGATACA").unwrap();
    let tpl = b"GATTACAGATTACA";
    let e = QvEvaluator::new(&read, tpl, &params).unwrap();
    let r = SimpleRecursor::<SparseMatrix, ViterbiCombiner>::new(MoveSet::ALL, standard_banding())
        .unwrap();
    let mut alpha = SparseMatrix::new(read.len() + 1, tpl.len() + 1);
    let mut beta = SparseMatrix::new(read.len() + 1, tpl.len() + 1);
    let flip_flops = r.fill_alpha_beta(&e, &mut alpha, &mut beta).unwrap();
    assert!(flip_flops <= 5);
    assert_relative_eq!(
        alpha.get(read.len(), tpl.len()),
        beta.get(0, 0),
        epsilon = 0.2
    );
}

//
// Extension passes.
//

#[test]
fn extend_alpha_reproduces_unchanged_columns() {
    let params = testing_params();
    let read = QvRead::anonymous(b"GATTTACA").unwrap();
    let tpl = b"GATTACA";
    let e = QvEvaluator::new(&read, tpl, &params).unwrap();
    let r =
        SimpleRecursor::<SparseMatrix, ViterbiCombiner>::new(MoveSet::ALL, no_banding()).unwrap();
    let alpha = filled_alpha(&r, &e);

    let mut ext = SparseMatrix::new(read.len() + 1, 2);
    let begin_column = 3;
    r.extend_alpha(&e, &alpha, begin_column, &mut ext, 2);
    for ext_col in 0..2 {
        let j = begin_column + ext_col;
        let (lo, hi) = alpha.used_row_range(j);
        for i in lo..hi {
            assert_relative_eq!(ext.get(i, ext_col), alpha.get(i, j), max_relative = 1e-12);
        }
    }
}

#[test]
fn extend_beta_reproduces_unchanged_columns() {
    let params = testing_params();
    let read = QvRead::anonymous(b"GATTTACA").unwrap();
    let tpl = b"GATTACA";
    let e = QvEvaluator::new(&read, tpl, &params).unwrap();
    let r =
        SimpleRecursor::<SparseMatrix, ViterbiCombiner>::new(MoveSet::ALL, no_banding()).unwrap();
    let beta = filled_beta(&r, &e);

    let mut ext = SparseMatrix::new(read.len() + 1, 2);
    let last_column = 4;
    r.extend_beta(&e, &beta, last_column, &mut ext, 2, 0);
    for step in 0..2usize {
        let j = last_column - step;
        let ext_col = 1 - step;
        let (lo, hi) = beta.used_row_range(j);
        for i in lo..hi {
            assert_relative_eq!(ext.get(i, ext_col), beta.get(i, j), max_relative = 1e-12);
        }
    }
}

//
// Evaluator and model behavior.
//

#[test]
fn substitution_qv_scales_the_mismatch_penalty() {
    let params = testing_params();
    let tpl = b"GATG";
    let plain = QvRead::anonymous(b"GATC").unwrap();
    let flagged = QvRead::new(
        "flagged",
        QvFeatures::new(
            b"GATC",
            vec![0.0; 4],
            vec![0.0, 0.0, 0.0, 20.0],
            vec![0.0; 4],
            vec![0.0; 4],
            vec![0.0; 4],
        )
        .unwrap(),
    );
    let config = QvConfig::new(params, MoveSet::BASIC, no_banding());
    let base = score_read(tpl, &plain, &config).unwrap();
    let shifted = score_read(tpl, &flagged, &config).unwrap();
    assert_relative_eq!(base, -10.0);
    assert_relative_eq!(shifted, base + config.params.mismatch_slope * 20.0);
}

#[test]
fn merge_requires_the_homopolymer_context() {
    let params = testing_params();
    let read = QvRead::anonymous(b"GAT").unwrap();
    // No base run in the template, so no cell admits a merge.
    let e = QvEvaluator::new(&read, b"GATC", &params).unwrap();
    for j in 0..3 {
        for i in 0..3 {
            assert_eq!(e.merge(i, j), NEG_INF);
        }
    }
}

#[test]
fn unpinned_ends_make_terminal_deletions_free() {
    let params = testing_params();
    let read = QvRead::anonymous(b"TTAC").unwrap();
    let tpl = b"GATTACA";
    let e = QvEvaluator::with_pins(&read, tpl, &params, false, false).unwrap();
    let r =
        SimpleRecursor::<DenseMatrix, ViterbiCombiner>::new(MoveSet::BASIC, no_banding()).unwrap();
    let alpha = filled_alpha(&r, &e);
    assert_eq!(alpha.get(4, 7), 0.0);
    let aln = r.alignment(&e, &alpha).unwrap();
    assert_eq!(aln.target(), "GATTACA");
    assert_eq!(aln.query(), "--TTAC-");
}

#[test]
fn preset_lookup_falls_back_to_the_wildcard() {
    assert!(!presets().is_empty());
    let exact = preset("*").unwrap();
    let fallback = preset("some-future-chemistry").unwrap();
    assert_eq!(exact, fallback);
    assert_eq!(exact.mismatch, -10.0);
}

//
// Construction-time validation.
//

#[test]
fn zero_bandwidth_is_rejected() {
    let err = SimpleRecursor::<SparseMatrix, ViterbiCombiner>::new(
        MoveSet::BASIC,
        BandingOptions::new(0, 200.0),
    )
    .unwrap_err();
    assert!(matches!(err, QvError::InvalidBanding { .. }));
}

#[test]
fn non_positive_score_diff_is_rejected() {
    for score_diff in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let result = SimpleRecursor::<SparseMatrix, ViterbiCombiner>::new(
            MoveSet::BASIC,
            BandingOptions::new(10, score_diff),
        );
        assert!(result.is_err(), "score_diff {} accepted", score_diff);
    }
}

#[test]
fn move_set_without_the_basic_moves_is_rejected() {
    let err = SimpleRecursor::<SparseMatrix, ViterbiCombiner>::new(
        MoveSet::MERGE,
        standard_banding(),
    )
    .unwrap_err();
    assert!(matches!(err, QvError::InvalidMoveSet { .. }));
}

#[test]
fn invalid_bases_are_rejected() {
    assert!(matches!(
        QvRead::anonymous(b"GAXT").unwrap_err(),
        QvError::InvalidChar { ch: 'X', pos: 2 }
    ));
    let params = testing_params();
    let read = QvRead::anonymous(b"GAT").unwrap();
    assert!(QvEvaluator::new(&read, b"GA-T", &params).is_err());
}

#[test]
fn feature_channel_lengths_must_match_the_read() {
    let err = QvFeatures::new(
        b"GAT",
        vec![0.0; 2],
        vec![0.0; 3],
        vec![0.0; 3],
        vec![0.0; 3],
        vec![0.0; 3],
    )
    .unwrap_err();
    assert!(matches!(
        err,
        QvError::FeatureLengthMismatch { channel: "ins_qv", .. }
    ));
}

//
// Sum-product semantics.
//

#[test]
fn sum_product_link_matches_the_forward_total() {
    let params = testing_params();
    let read = QvRead::anonymous(b"GATTTACA").unwrap();
    let tpl = b"GATTACA";
    let e = QvEvaluator::new(&read, tpl, &params).unwrap();
    let r = SimpleRecursor::<SparseMatrix, SumProductCombiner>::new(MoveSet::ALL, no_banding())
        .unwrap();
    let alpha = filled_alpha(&r, &e);
    let beta = filled_beta(&r, &e);
    let total = alpha.get(read.len(), tpl.len());
    for j in 2..tpl.len() {
        let linked = r.link_alpha_beta(&e, &alpha, j, &beta, j, j);
        assert_relative_eq!(linked, total, max_relative = 1e-6);
    }
}

#[test]
fn sum_product_total_dominates_the_viterbi_path() {
    let params = testing_params();
    let read = QvRead::anonymous(b"GATACA").unwrap();
    let tpl = b"GATTACA";
    let e = QvEvaluator::new(&read, tpl, &params).unwrap();
    let viterbi =
        SimpleRecursor::<DenseMatrix, ViterbiCombiner>::new(MoveSet::BASIC, no_banding()).unwrap();
    let sum = SimpleRecursor::<DenseMatrix, SumProductCombiner>::new(MoveSet::BASIC, no_banding())
        .unwrap();
    let v = filled_alpha(&viterbi, &e).get(read.len(), tpl.len());
    let s = filled_alpha(&sum, &e).get(read.len(), tpl.len());
    assert!(s >= v);
}

//
// Classical-aligner equivalence and pairwise utilities.
//

#[test]
fn neutral_qvs_match_the_classical_aligner_on_substitutions() {
    // Substitution-only differences leave no indel ambiguity; both engines
    // must produce the same columnwise transcript.
    let cases: Vec<(&[u8], &[u8])> = vec![
        (b"GATTACA", b"GATCACA"),
        (b"GATTACA", b"GATTACA"),
        (b"ACGTACGT", b"ACGAACGA"),
    ];
    for (tpl, read_seq) in cases {
        let qv = decode::<SimpleRecursor<DenseMatrix, ViterbiCombiner>>(
            tpl,
            read_seq,
            MoveSet::BASIC,
        );
        let nw = align_nw(tpl, read_seq, &NwParams::default());
        assert_eq!(qv.transcript(), nw.transcript());
    }
}

#[test]
fn pairwise_representation_and_stats() {
    let a = PairwiseAlignment::new("GATC".into(), "GA-C".into());
    assert_eq!(a.target(), "GATC");
    assert_eq!(a.query(), "GA-C");
    assert_eq!(a.length(), 4);
    assert_eq!(a.matches(), 3);
    assert_eq!(a.deletions(), 1);
    assert_eq!(a.mismatches(), 0);
    assert_eq!(a.insertions(), 0);
    assert_relative_eq!(a.accuracy(), 0.75);
    assert_eq!(a.transcript(), "MMDM");

    let a2 = PairwiseAlignment::new("GATTA-CA".into(), "CA-TAACA".into());
    assert_eq!(a2.transcript(), "RMDMMIMM");
    assert_relative_eq!(a2.accuracy(), 5.0 / 8.0);
    assert_eq!(a2.mismatches(), 1);
    assert_eq!(a2.errors(), 3);
}

#[test]
fn nw_global_alignments() {
    let params = NwParams::default();
    let a = align_nw(b"GATT", b"GATT", &params);
    assert_eq!(a.transcript(), "MMMM");
    assert_relative_eq!(a.accuracy(), 1.0);

    let a = align_nw(b"GATT", b"GAT", &params);
    assert_eq!(a.target(), "GATT");
    assert_relative_eq!(a.accuracy(), 0.75);

    let a = align_nw(b"GATTACA", b"TT", &params);
    assert_eq!(a.target(), "GATTACA");
    assert_eq!(a.query(), "--TT---");
    assert_relative_eq!(a.accuracy(), 2.0 / 7.0);
}

#[test]
fn target_positions_in_query() {
    assert_eq!(target_to_query_positions("MMM"), vec![0, 1, 2, 3]);
    assert_eq!(target_to_query_positions("DMM"), vec![0, 0, 1, 2]);
    assert_eq!(target_to_query_positions("MDM"), vec![0, 1, 1, 2]);
    assert_eq!(target_to_query_positions("MMD"), vec![0, 1, 2, 2]);
    assert_eq!(target_to_query_positions("IMM"), vec![1, 2, 3]);
    assert_eq!(target_to_query_positions("MIM"), vec![0, 2, 3]);
    assert_eq!(target_to_query_positions("MMI"), vec![0, 1, 3]);
    assert_eq!(target_to_query_positions("MRM"), vec![0, 1, 2, 3]);
    assert_eq!(target_to_query_positions("MDIM"), vec![0, 1, 2, 3]);
    assert_eq!(target_to_query_positions("MIDM"), vec![0, 2, 2, 3]);
}

//
// One-call and batch entry points.
//

#[test]
fn align_read_end_to_end() {
    let config = QvConfig::standard();
    let read = QvRead::anonymous(b"GATTTACA").unwrap();
    let aln = align_read(b"GATTACA", &read, &config).unwrap();
    assert_eq!(aln.matches(), 7);
    assert_relative_eq!(aln.accuracy(), 7.0 / 8.0);
}

#[test]
fn batch_scores_match_individual_scores() {
    let config = QvConfig::standard();
    let tpl = b"GATTACAGATTACA";
    let reads: Vec<QvRead> = [
        &b"GATTACAGATTACA"[..],
        &b"GATTTACAGATACA"[..],
        &b"GATACAGATTACA"[..],
    ]
    .iter()
    .map(|s| QvRead::anonymous(s).unwrap())
    .collect();
    let batch = score_reads(tpl, &reads, &config);
    assert_eq!(batch.len(), reads.len());
    for (read, scored) in reads.iter().zip(&batch) {
        let single = score_read(tpl, read, &config).unwrap();
        assert_relative_eq!(*scored.as_ref().unwrap(), single);
    }
}

//
// Randomized agreement and round-trip properties.
//

fn dna_seq(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')],
        1..max_len,
    )
}

proptest! {
    #[test]
    fn dense_and_sparse_decode_identically(tpl in dna_seq(30), read_seq in dna_seq(30)) {
        let read = QvRead::anonymous(&read_seq).unwrap();
        let (s_dense, t_dense) = transcript_of::<SimpleRecursor<DenseMatrix, ViterbiCombiner>>(
            &tpl, &read, MoveSet::ALL, no_banding());
        let (s_sparse, t_sparse) = transcript_of::<SimpleRecursor<SparseMatrix, ViterbiCombiner>>(
            &tpl, &read, MoveSet::ALL, no_banding());
        prop_assert_eq!(t_dense, t_sparse);
        prop_assert_eq!(s_dense, s_sparse);
    }
}

#[cfg(feature = "simd")]
proptest! {
    #[test]
    fn simd_matches_scalar(tpl in dna_seq(40), read_seq in dna_seq(40)) {
        let read = QvRead::anonymous(&read_seq).unwrap();
        let (s_scalar, t_scalar) = transcript_of::<SimpleRecursor<SparseMatrix, ViterbiCombiner>>(
            &tpl, &read, MoveSet::ALL, no_banding());
        let (s_simd, t_simd) = transcript_of::<SimdRecursor<SparseMatrix, ViterbiCombiner>>(
            &tpl, &read, MoveSet::ALL, no_banding());
        prop_assert_eq!(s_scalar, s_simd);
        prop_assert_eq!(t_scalar, t_simd);
    }
}

proptest! {
    #[test]
    fn decoded_strings_roundtrip(tpl in dna_seq(25), read_seq in dna_seq(25)) {
        let aln = decode::<SimpleRecursor<DenseMatrix, ViterbiCombiner>>(
            &tpl, &read_seq, MoveSet::ALL);
        let degapped_target: Vec<u8> = aln.target().bytes().filter(|&b| b != b'-').collect();
        let degapped_query: Vec<u8> = aln.query().bytes().filter(|&b| b != b'-').collect();
        prop_assert_eq!(degapped_target, tpl);
        prop_assert_eq!(degapped_query, read_seq);
        prop_assert!(aln.accuracy() >= 0.0 && aln.accuracy() <= 1.0);
    }
}
