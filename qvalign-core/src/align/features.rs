//! Per-base quality-value channels attached to a read.

use crate::error::{QvError, QvResult};

/// Base code (0..4) for an upper-case nucleotide, used to index
/// per-template-base parameters.
pub(crate) fn encode_base(b: u8) -> Option<u8> {
    match b {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

pub(crate) fn validate_bases(seq: &[u8]) -> QvResult<()> {
    for (pos, &b) in seq.iter().enumerate() {
        if encode_base(b).is_none() {
            return Err(QvError::InvalidChar { ch: b as char, pos });
        }
    }
    Ok(())
}

/// Observed sequence plus its five QV channels, one value per base.
///
/// `del_tag` holds an ASCII base code (or 0 for "no tag") stored as f64 so
/// the vectorized evaluator can compare it lanewise against template bases.
#[derive(Clone, Debug, PartialEq)]
pub struct QvFeatures {
    bases: Vec<u8>,
    bases_f64: Vec<f64>,
    pub ins_qv: Vec<f64>,
    pub subs_qv: Vec<f64>,
    pub del_qv: Vec<f64>,
    pub del_tag: Vec<f64>,
    pub merge_qv: Vec<f64>,
}

impl QvFeatures {
    /// Features with every channel at zero: neutral influence on scoring.
    pub fn neutral(seq: &[u8]) -> QvResult<Self> {
        validate_bases(seq)?;
        let n = seq.len();
        Ok(Self {
            bases: seq.to_vec(),
            bases_f64: seq.iter().map(|&b| b as f64).collect(),
            ins_qv: vec![0.0; n],
            subs_qv: vec![0.0; n],
            del_qv: vec![0.0; n],
            del_tag: vec![0.0; n],
            merge_qv: vec![0.0; n],
        })
    }

    pub fn new(
        seq: &[u8],
        ins_qv: Vec<f64>,
        subs_qv: Vec<f64>,
        del_qv: Vec<f64>,
        del_tag: Vec<f64>,
        merge_qv: Vec<f64>,
    ) -> QvResult<Self> {
        validate_bases(seq)?;
        let expected = seq.len();
        for (channel, v) in [
            ("ins_qv", &ins_qv),
            ("subs_qv", &subs_qv),
            ("del_qv", &del_qv),
            ("del_tag", &del_tag),
            ("merge_qv", &merge_qv),
        ] {
            if v.len() != expected {
                return Err(QvError::FeatureLengthMismatch {
                    channel,
                    got: v.len(),
                    expected,
                });
            }
        }
        for (pos, &tag) in del_tag.iter().enumerate() {
            let ok = tag == 0.0
                || [b'A', b'C', b'G', b'T', b'N']
                    .iter()
                    .any(|&b| tag == b as f64);
            if !ok {
                return Err(QvError::InvalidChar {
                    ch: (tag as u8) as char,
                    pos,
                });
            }
        }
        Ok(Self {
            bases: seq.to_vec(),
            bases_f64: seq.iter().map(|&b| b as f64).collect(),
            ins_qv,
            subs_qv,
            del_qv,
            del_tag,
            merge_qv,
        })
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    pub fn bases(&self) -> &[u8] {
        &self.bases
    }

    #[inline]
    pub fn base(&self, i: usize) -> u8 {
        self.bases[i]
    }

    /// Bases widened to f64, for lanewise equality tests.
    pub(crate) fn bases_f64(&self) -> &[f64] {
        &self.bases_f64
    }
}

/// A named read: sequence bases plus QV features.
#[derive(Clone, Debug, PartialEq)]
pub struct QvRead {
    pub name: String,
    features: QvFeatures,
}

impl QvRead {
    pub fn new(name: impl Into<String>, features: QvFeatures) -> Self {
        Self {
            name: name.into(),
            features,
        }
    }

    /// An unnamed read with neutral QVs, mostly for tests and simulations.
    pub fn anonymous(seq: &[u8]) -> QvResult<Self> {
        Ok(Self::new("anonymous", QvFeatures::neutral(seq)?))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn seq(&self) -> &[u8] {
        self.features.bases()
    }

    pub fn features(&self) -> &QvFeatures {
        &self.features
    }
}
