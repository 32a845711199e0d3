//! Turns a (template, read, QV features, parameters) quadruple into per-cell
//! move scores. Stateless after construction; safe to share by reference
//! across recursors.

use wide::{f64x4, CmpEq};

use super::features::{encode_base, validate_bases, QvRead};
use super::matrix::NEG_INF;
use super::params::QvModelParams;
use crate::error::QvResult;

#[inline]
fn load4(v: &[f64], i: usize) -> f64x4 {
    f64x4::from([v[i], v[i + 1], v[i + 2], v[i + 3]])
}

#[inline]
fn affine4(base: f64, slope: f64, qv: &[f64], i: usize) -> f64x4 {
    f64x4::splat(base) + f64x4::splat(slope) * load4(qv, i)
}

pub struct QvEvaluator<'a> {
    read: &'a QvRead,
    tpl: &'a [u8],
    tpl_codes: Vec<u8>,
    params: &'a QvModelParams,
    pin_start: bool,
    pin_end: bool,
}

impl<'a> QvEvaluator<'a> {
    pub fn new(read: &'a QvRead, tpl: &'a [u8], params: &'a QvModelParams) -> QvResult<Self> {
        Self::with_pins(read, tpl, params, true, true)
    }

    /// Unpinned ends make terminal deletions free, for alignments whose
    /// start or end is not anchored to the template boundary.
    pub fn with_pins(
        read: &'a QvRead,
        tpl: &'a [u8],
        params: &'a QvModelParams,
        pin_start: bool,
        pin_end: bool,
    ) -> QvResult<Self> {
        validate_bases(tpl)?;
        let tpl_codes = tpl
            .iter()
            .map(|&b| encode_base(b).expect("validated above"))
            .collect();
        Ok(Self {
            read,
            tpl,
            tpl_codes,
            params,
            pin_start,
            pin_end,
        })
    }

    pub fn read(&self) -> &QvRead {
        self.read
    }

    pub fn template(&self) -> &[u8] {
        self.tpl
    }

    pub fn read_len(&self) -> usize {
        self.read.len()
    }

    pub fn tpl_len(&self) -> usize {
        self.tpl.len()
    }

    pub fn pin_start(&self) -> bool {
        self.pin_start
    }

    pub fn pin_end(&self) -> bool {
        self.pin_end
    }

    #[inline]
    pub fn is_match(&self, i: usize, j: usize) -> bool {
        self.read.seq()[i] == self.tpl[j]
    }

    /// Incorporation (match or mismatch) of read base `i` against template
    /// base `j`.
    #[inline]
    pub fn inc(&self, i: usize, j: usize) -> f64 {
        debug_assert!(i < self.read_len() && j < self.tpl_len());
        if self.is_match(i, j) {
            self.params.match_score
        } else {
            self.params.mismatch + self.params.mismatch_slope * self.read.features().subs_qv[i]
        }
    }

    /// Deletion of template base `j` between read bases `i-1` and `i`.
    #[inline]
    pub fn del(&self, i: usize, j: usize) -> f64 {
        debug_assert!(i <= self.read_len() && j < self.tpl_len());
        if (!self.pin_start && i == 0) || (!self.pin_end && i == self.read_len()) {
            return 0.0;
        }
        let f = self.read.features();
        if i < self.read_len() && f.del_tag[i] == self.tpl[j] as f64 {
            self.params.deletion_with_tag + self.params.deletion_with_tag_slope * f.del_qv[i]
        } else {
            self.params.deletion_no_tag
        }
    }

    /// Extra (inserted) read base `i` before template position `j`: a branch
    /// when it repeats the upcoming template base, non-cognate otherwise.
    #[inline]
    pub fn extra(&self, i: usize, j: usize) -> f64 {
        debug_assert!(i < self.read_len() && j <= self.tpl_len());
        let f = self.read.features();
        if j < self.tpl_len() && self.is_match(i, j) {
            self.params.branch + self.params.branch_slope * f.ins_qv[i]
        } else {
            self.params.nce + self.params.nce_slope * f.ins_qv[i]
        }
    }

    /// Merge: template bases `j` and `j+1` explained by the single read base
    /// `i`. Requires the homopolymer context read[i] == tpl[j] == tpl[j+1].
    #[inline]
    pub fn merge(&self, i: usize, j: usize) -> f64 {
        debug_assert!(i < self.read_len() && j + 1 < self.tpl_len());
        let base = self.read.seq()[i];
        if !(base == self.tpl[j] && base == self.tpl[j + 1]) {
            return NEG_INF;
        }
        let code = self.tpl_codes[j] as usize;
        self.params.merge[code] + self.params.merge_slope[code] * self.read.features().merge_qv[i]
    }

    //
    // Four-lane forms, computing the same quantities for rows i..i+4.
    //

    #[inline]
    pub fn inc4(&self, i: usize, j: usize) -> f64x4 {
        debug_assert!(i + 4 <= self.read_len() && j < self.tpl_len());
        let f = self.read.features();
        let mask = load4(f.bases_f64(), i).cmp_eq(f64x4::splat(self.tpl[j] as f64));
        let matched = f64x4::splat(self.params.match_score);
        let mismatched = affine4(self.params.mismatch, self.params.mismatch_slope, &f.subs_qv, i);
        mask.blend(matched, mismatched)
    }

    #[inline]
    pub fn del4(&self, i: usize, j: usize) -> f64x4 {
        debug_assert!(i + 3 <= self.read_len() && j < self.tpl_len());
        if i != 0 && i + 3 != self.read_len() {
            let f = self.read.features();
            let mask = load4(&f.del_tag, i).cmp_eq(f64x4::splat(self.tpl[j] as f64));
            let with_tag = affine4(
                self.params.deletion_with_tag,
                self.params.deletion_with_tag_slope,
                &f.del_qv,
                i,
            );
            mask.blend(with_tag, f64x4::splat(self.params.deletion_no_tag))
        } else {
            // Pin logic and the last-row QV boundary; punt to scalar.
            f64x4::from([
                self.del(i, j),
                self.del(i + 1, j),
                self.del(i + 2, j),
                self.del(i + 3, j),
            ])
        }
    }

    #[inline]
    pub fn extra4(&self, i: usize, j: usize) -> f64x4 {
        debug_assert!(i + 4 <= self.read_len() && j <= self.tpl_len());
        let f = self.read.features();
        if j == self.tpl_len() {
            return affine4(self.params.nce, self.params.nce_slope, &f.ins_qv, i);
        }
        let mask = load4(f.bases_f64(), i).cmp_eq(f64x4::splat(self.tpl[j] as f64));
        let branch = affine4(self.params.branch, self.params.branch_slope, &f.ins_qv, i);
        let nce = affine4(self.params.nce, self.params.nce_slope, &f.ins_qv, i);
        mask.blend(branch, nce)
    }

    #[inline]
    pub fn merge4(&self, i: usize, j: usize) -> f64x4 {
        debug_assert!(i + 4 <= self.read_len() && j + 1 < self.tpl_len());
        let no_merge = f64x4::splat(NEG_INF);
        if self.tpl[j] != self.tpl[j + 1] {
            return no_merge;
        }
        let f = self.read.features();
        let code = self.tpl_codes[j] as usize;
        let merged = affine4(
            self.params.merge[code],
            self.params.merge_slope[code],
            &f.merge_qv,
            i,
        );
        let mask = load4(f.bases_f64(), i).cmp_eq(f64x4::splat(self.tpl[j] as f64));
        mask.blend(merged, no_merge)
    }
}
