//! Model parameter sets and the named preset registry.

use std::sync::LazyLock;

use bitflags::bitflags;

use super::banding::BandingOptions;

bitflags! {
    /// Moves a recursor is allowed to consider.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MoveSet: u8 {
        const INCORPORATE = 0x1;
        const EXTRA = 0x2;
        const DELETE = 0x4;
        const MERGE = 0x8;
        const BASIC = Self::INCORPORATE.bits() | Self::EXTRA.bits() | Self::DELETE.bits();
        const ALL = Self::BASIC.bits() | Self::MERGE.bits();
    }
}

/// Log-probability weights of the QV transition/emission model.
///
/// All weights are natural-log probabilities (<= 0); the `*_slope` fields
/// scale the corresponding per-base QV channel. `merge`/`merge_slope` are
/// indexed by template base code (A, C, G, T).
#[derive(Clone, Debug, PartialEq)]
pub struct QvModelParams {
    pub match_score: f64,
    pub mismatch: f64,
    pub mismatch_slope: f64,
    pub branch: f64,
    pub branch_slope: f64,
    pub deletion_no_tag: f64,
    pub deletion_with_tag: f64,
    pub deletion_with_tag_slope: f64,
    pub nce: f64,
    pub nce_slope: f64,
    pub merge: [f64; 4],
    pub merge_slope: [f64; 4],
}

impl QvModelParams {
    /// Parameter set with a single merge rate shared by all template bases.
    #[allow(clippy::too_many_arguments)]
    pub fn with_uniform_merge(
        match_score: f64,
        mismatch: f64,
        mismatch_slope: f64,
        branch: f64,
        branch_slope: f64,
        deletion_no_tag: f64,
        deletion_with_tag: f64,
        deletion_with_tag_slope: f64,
        nce: f64,
        nce_slope: f64,
        merge: f64,
        merge_slope: f64,
    ) -> Self {
        Self {
            match_score,
            mismatch,
            mismatch_slope,
            branch,
            branch_slope,
            deletion_no_tag,
            deletion_with_tag,
            deletion_with_tag_slope,
            nce,
            nce_slope,
            merge: [merge; 4],
            merge_slope: [merge_slope; 4],
        }
    }
}

/// A named, versioned parameter preset.
pub struct ModelPreset {
    pub chemistry: &'static str,
    pub model: &'static str,
    pub params: QvModelParams,
}

/// Chemistry name that matches any read when no exact entry exists.
pub const FALLBACK_CHEMISTRY: &str = "*";

static PRESETS: LazyLock<Vec<ModelPreset>> = LazyLock::new(|| {
    vec![ModelPreset {
        chemistry: FALLBACK_CHEMISTRY,
        model: "TrainedQv",
        params: QvModelParams::with_uniform_merge(
            0.0,   // match
            -10.0, // mismatch
            -0.1,  // mismatch slope
            -5.0,  // branch
            -0.1,  // branch slope
            -4.0,  // deletion, no tag
            -6.0,  // deletion with tag
            -0.1,  // deletion-with-tag slope
            -8.0,  // non-cognate extra
            -0.1,  // nce slope
            -2.0,  // merge
            0.0,   // merge slope
        ),
    }]
});

/// Look up a preset by chemistry name, falling back to `"*"`.
pub fn preset(chemistry: &str) -> Option<&'static QvModelParams> {
    PRESETS
        .iter()
        .find(|p| p.chemistry == chemistry)
        .or_else(|| PRESETS.iter().find(|p| p.chemistry == FALLBACK_CHEMISTRY))
        .map(|p| &p.params)
}

pub fn presets() -> &'static [ModelPreset] {
    &PRESETS
}

/// Everything needed to run one alignment: model weights, the move set the
/// recursor may use, and banding.
#[derive(Clone, Debug)]
pub struct QvConfig {
    pub params: QvModelParams,
    pub moves: MoveSet,
    pub banding: BandingOptions,
}

impl QvConfig {
    pub fn new(params: QvModelParams, moves: MoveSet, banding: BandingOptions) -> Self {
        Self {
            params,
            moves,
            banding,
        }
    }

    /// The fallback preset with generous banding.
    pub fn standard() -> Self {
        Self::new(
            preset(FALLBACK_CHEMISTRY)
                .expect("fallback preset is always registered")
                .clone(),
            MoveSet::ALL,
            BandingOptions::new(50, 200.0),
        )
    }
}
