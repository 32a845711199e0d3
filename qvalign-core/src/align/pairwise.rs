//! Decoded alignments: gapped strings, transcript, accuracy statistics, and
//! a crude reference Needleman-Wunsch aligner.

/// One step of an alignment path through the (read, template) grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlignmentMove {
    Match,
    Mismatch,
    /// Consumes a read base, none of the template.
    Insertion,
    /// Consumes a template base, none of the read.
    Deletion,
    /// Two template bases explained by one read base.
    Merge,
}

impl AlignmentMove {
    pub fn read_delta(self) -> usize {
        match self {
            Self::Match | Self::Mismatch | Self::Insertion | Self::Merge => 1,
            Self::Deletion => 0,
        }
    }

    pub fn tpl_delta(self) -> usize {
        match self {
            Self::Match | Self::Mismatch | Self::Deletion => 1,
            Self::Insertion => 0,
            Self::Merge => 2,
        }
    }
}

/// A pairwise alignment as gapped target/query strings.
///
/// The transcript follows Gusfield: `M` match, `R` mismatch, `I` insertion
/// (gap in target), `D` deletion (gap in query). A merge shows up in the
/// columns as a `D` immediately followed by an `M`; the distinct move is
/// preserved in `moves`.
#[derive(Clone, Debug, PartialEq)]
pub struct PairwiseAlignment {
    target: String,
    query: String,
    transcript: String,
    moves: Vec<AlignmentMove>,
}

fn transcript_of(target: &str, query: &str) -> String {
    debug_assert_eq!(target.len(), query.len());
    target
        .bytes()
        .zip(query.bytes())
        .map(|(t, q)| match (t, q) {
            (b'-', _) => 'I',
            (_, b'-') => 'D',
            _ if t == q => 'M',
            _ => 'R',
        })
        .collect()
}

fn moves_of(transcript: &str) -> Vec<AlignmentMove> {
    transcript
        .chars()
        .map(|c| match c {
            'M' => AlignmentMove::Match,
            'R' => AlignmentMove::Mismatch,
            'I' => AlignmentMove::Insertion,
            _ => AlignmentMove::Deletion,
        })
        .collect()
}

impl PairwiseAlignment {
    pub fn new(target: String, query: String) -> Self {
        let transcript = transcript_of(&target, &query);
        let moves = moves_of(&transcript);
        Self {
            target,
            query,
            transcript,
            moves,
        }
    }

    pub(crate) fn with_moves(target: String, query: String, moves: Vec<AlignmentMove>) -> Self {
        let transcript = transcript_of(&target, &query);
        Self {
            target,
            query,
            transcript,
            moves,
        }
    }

    /// Target string, including gaps; usually the template.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Query string, including gaps; usually the read.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// The decoded move path from (0, 0) to (I, J).
    pub fn moves(&self) -> &[AlignmentMove] {
        &self.moves
    }

    pub fn length(&self) -> usize {
        self.transcript.len()
    }

    pub fn matches(&self) -> usize {
        self.transcript.bytes().filter(|&c| c == b'M').count()
    }

    pub fn mismatches(&self) -> usize {
        self.transcript.bytes().filter(|&c| c == b'R').count()
    }

    pub fn insertions(&self) -> usize {
        self.transcript.bytes().filter(|&c| c == b'I').count()
    }

    pub fn deletions(&self) -> usize {
        self.transcript.bytes().filter(|&c| c == b'D').count()
    }

    pub fn errors(&self) -> usize {
        self.length() - self.matches()
    }

    pub fn accuracy(&self) -> f64 {
        self.matches() as f64 / self.length() as f64
    }
}

/// For each target position (plus the end), the corresponding query index.
pub fn target_to_query_positions(transcript: &str) -> Vec<usize> {
    let mut out = Vec::with_capacity(transcript.len() + 1);
    let mut q = 0usize;
    for c in transcript.chars() {
        match c {
            'M' | 'R' => {
                out.push(q);
                q += 1;
            }
            'D' => out.push(q),
            'I' => q += 1,
            _ => {}
        }
    }
    out.push(q);
    out
}

/// Scores for the reference aligner: no substitution matrix, no affine gaps.
#[derive(Clone, Copy, Debug)]
pub struct NwParams {
    pub match_score: f64,
    pub mismatch_score: f64,
    pub insert_score: f64,
    pub delete_score: f64,
}

impl Default for NwParams {
    fn default() -> Self {
        Self {
            match_score: 0.0,
            mismatch_score: -1.0,
            insert_score: -1.0,
            delete_score: -1.0,
        }
    }
}

/// Crude global Needleman-Wunsch alignment, used as the classical-aligner
/// comparator for the probabilistic engine.
pub fn align_nw(target: &[u8], query: &[u8], params: &NwParams) -> PairwiseAlignment {
    let t_len = target.len();
    let q_len = query.len();
    let cols = q_len + 1;
    let mut score = vec![0.0f64; (t_len + 1) * cols];
    // Cumulative border sums, so the backtrack's equality tests reproduce
    // the fill arithmetic exactly.
    for i in 1..=t_len {
        score[i * cols] = score[(i - 1) * cols] + params.delete_score;
    }
    for j in 1..=q_len {
        score[j] = score[j - 1] + params.insert_score;
    }
    for i in 1..=t_len {
        for j in 1..=q_len {
            let sub = if target[i - 1] == query[j - 1] {
                params.match_score
            } else {
                params.mismatch_score
            };
            let diag = score[(i - 1) * cols + j - 1] + sub;
            let del = score[(i - 1) * cols + j] + params.delete_score;
            let ins = score[i * cols + j - 1] + params.insert_score;
            score[i * cols + j] = diag.max(del).max(ins);
        }
    }

    // Backtrack; ties resolve diagonal first, then deletion, then insertion.
    let mut i = t_len;
    let mut j = q_len;
    let mut target_aln = Vec::new();
    let mut query_aln = Vec::new();
    while i > 0 || j > 0 {
        let here = score[i * cols + j];
        if i > 0 && j > 0 {
            let sub = if target[i - 1] == query[j - 1] {
                params.match_score
            } else {
                params.mismatch_score
            };
            if here == score[(i - 1) * cols + j - 1] + sub {
                target_aln.push(target[i - 1]);
                query_aln.push(query[j - 1]);
                i -= 1;
                j -= 1;
                continue;
            }
        }
        if i > 0 && here == score[(i - 1) * cols + j] + params.delete_score {
            target_aln.push(target[i - 1]);
            query_aln.push(b'-');
            i -= 1;
            continue;
        }
        target_aln.push(b'-');
        query_aln.push(query[j - 1]);
        j -= 1;
    }
    target_aln.reverse();
    query_aln.reverse();
    PairwiseAlignment::new(
        String::from_utf8(target_aln).expect("alignment strings are ASCII"),
        String::from_utf8(query_aln).expect("alignment strings are ASCII"),
    )
}
