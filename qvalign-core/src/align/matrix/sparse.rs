use wide::f64x4;

use super::{ColumnMeta, ScoreMatrix, NEG_INF};

/// Extra rows allocated on each side of a requested range, so small band
/// drift between refills stays within the existing buffer.
const PADDING: usize = 8;
const SHRINK_THRESHOLD: f64 = 0.8;

/// One column of a banded matrix: a flat buffer backing the allocated row
/// window `[alloc_begin, alloc_end)` of a logically `logical_len`-row column.
#[derive(Clone, Debug)]
pub(crate) struct SparseVector {
    storage: Vec<f64>,
    logical_len: usize,
    alloc_begin: usize,
    alloc_end: usize,
}

impl SparseVector {
    pub(crate) fn new(logical_len: usize, begin: usize, end: usize) -> Self {
        debug_assert!(begin <= end && end <= logical_len);
        let alloc_begin = begin.saturating_sub(PADDING);
        let alloc_end = (end + PADDING).min(logical_len);
        Self {
            storage: vec![NEG_INF; alloc_end - alloc_begin],
            logical_len,
            alloc_begin,
            alloc_end,
        }
    }

    /// Make room for `[begin, end)` (plus padding), clearing old entries.
    pub(crate) fn reset_for_range(&mut self, begin: usize, end: usize) {
        debug_assert!(begin <= end && end <= self.logical_len);
        let new_begin = begin.saturating_sub(PADDING);
        let new_end = (end + PADDING).min(self.logical_len);
        let new_len = new_end - new_begin;
        let cur_len = self.alloc_end - self.alloc_begin;
        if new_len > cur_len {
            self.storage.resize(new_len, NEG_INF);
            self.clear();
        } else if (new_len as f64) < SHRINK_THRESHOLD * cur_len as f64 {
            self.storage = vec![NEG_INF; new_len];
        } else {
            self.clear();
        }
        self.alloc_begin = new_begin;
        self.alloc_end = new_end;
    }

    fn clear(&mut self) {
        self.storage.fill(NEG_INF);
    }

    /// Grow the allocated window, preserving existing contents.
    fn expand(&mut self, new_begin: usize, new_end: usize) {
        debug_assert!(new_begin <= self.alloc_begin && new_end >= self.alloc_end);
        debug_assert!(new_end <= self.logical_len);
        let old_len = self.alloc_end - self.alloc_begin;
        let mut storage = vec![NEG_INF; new_end - new_begin];
        let offset = self.alloc_begin - new_begin;
        storage[offset..offset + old_len].copy_from_slice(&self.storage[..old_len]);
        self.storage = storage;
        self.alloc_begin = new_begin;
        self.alloc_end = new_end;
    }

    #[inline]
    pub(crate) fn is_allocated(&self, i: usize) -> bool {
        i >= self.alloc_begin && i < self.alloc_end
    }

    #[inline]
    pub(crate) fn get(&self, i: usize) -> f64 {
        if self.is_allocated(i) {
            self.storage[i - self.alloc_begin]
        } else {
            NEG_INF
        }
    }

    #[inline]
    pub(crate) fn set(&mut self, i: usize, v: f64) {
        debug_assert!(i < self.logical_len);
        if !self.is_allocated(i) {
            let new_begin = i.saturating_sub(PADDING).min(self.alloc_begin);
            let new_end = (i + 1 + PADDING).min(self.logical_len).max(self.alloc_end);
            self.expand(new_begin, new_end);
        }
        self.storage[i - self.alloc_begin] = v;
    }

    #[inline]
    pub(crate) fn get4(&self, i: usize) -> f64x4 {
        if i >= self.alloc_begin && i + 4 <= self.alloc_end {
            let s = &self.storage[i - self.alloc_begin..i - self.alloc_begin + 4];
            f64x4::from([s[0], s[1], s[2], s[3]])
        } else {
            f64x4::from([self.get(i), self.get(i + 1), self.get(i + 2), self.get(i + 3)])
        }
    }

    #[inline]
    pub(crate) fn set4(&mut self, i: usize, v: f64x4) {
        debug_assert!(i + 4 <= self.logical_len);
        if !(self.is_allocated(i) && self.is_allocated(i + 3)) {
            let new_begin = i.saturating_sub(PADDING).min(self.alloc_begin);
            let new_end = (i + 4 + PADDING).min(self.logical_len).max(self.alloc_end);
            self.expand(new_begin, new_end);
        }
        let base = i - self.alloc_begin;
        self.storage[base..base + 4].copy_from_slice(&v.to_array());
    }
}

/// Banded storage: only an active row window per column is backed by memory.
/// Unfilled columns hold no storage at all.
#[derive(Clone, Debug)]
pub struct SparseMatrix {
    columns: Vec<Option<SparseVector>>,
    rows: usize,
    cols: usize,
    meta: ColumnMeta,
}

impl ScoreMatrix for SparseMatrix {
    fn new(rows: usize, cols: usize) -> Self {
        Self {
            columns: (0..cols).map(|_| None).collect(),
            rows,
            cols,
            meta: ColumnMeta::new(cols),
        }
    }

    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    fn get(&self, i: usize, j: usize) -> f64 {
        match &self.columns[j] {
            Some(col) => col.get(i),
            None => NEG_INF,
        }
    }

    #[inline]
    fn get4(&self, i: usize, j: usize) -> f64x4 {
        match &self.columns[j] {
            Some(col) => col.get4(i),
            None => f64x4::splat(NEG_INF),
        }
    }

    #[inline]
    fn set(&mut self, i: usize, j: usize, v: f64) {
        let col = self.columns[j]
            .as_mut()
            .expect("start_editing_column before set");
        col.set(i, v);
        self.meta.note(i, v);
    }

    #[inline]
    fn set4(&mut self, i: usize, j: usize, v: f64x4) {
        let col = self.columns[j]
            .as_mut()
            .expect("start_editing_column before set4");
        col.set4(i, v);
        for (lane, &val) in v.to_array().iter().enumerate() {
            self.meta.note(i + lane, val);
        }
    }

    fn start_editing_column(&mut self, j: usize, hint_begin: usize, hint_end: usize) {
        self.meta.begin_edit(j);
        let hint_begin = hint_begin.min(self.rows);
        let hint_end = hint_end.clamp(hint_begin, self.rows);
        match &mut self.columns[j] {
            Some(col) => col.reset_for_range(hint_begin, hint_end),
            None => self.columns[j] = Some(SparseVector::new(self.rows, hint_begin, hint_end)),
        }
    }

    fn finish_editing_column(&mut self, j: usize, used_begin: usize, used_end: usize) {
        self.meta.finish_edit(j, used_begin, used_end);
    }

    fn used_row_range(&self, j: usize) -> (usize, usize) {
        self.meta.used_row_range(j)
    }

    fn is_column_empty(&self, j: usize) -> bool {
        let (lo, hi) = self.meta.used_row_range(j);
        lo >= hi
    }

    fn is_allocated(&self, i: usize, j: usize) -> bool {
        self.columns[j].as_ref().is_some_and(|c| c.is_allocated(i))
    }

    fn column_max(&self, j: usize) -> (usize, f64) {
        self.meta.column_max(j)
    }

    fn clear_column(&mut self, j: usize) {
        if let Some(col) = &mut self.columns[j] {
            col.clear();
        }
        self.meta.clear(j);
    }
}
