use crate::index::posting::Posting;

/// Scorer trait
pub trait Scorer: Send + Sync {
    fn score(&self, posting: &Posting, term_stats: &TermStats, field_stats: &FieldScoringStats) -> f32;

    fn name(&self) -> &str;
}

/// Collection-wide statistics of one term
#[derive(Debug, Clone, Copy)]
pub struct TermStats {
    pub doc_freq: u64,
}

/// Collection-wide statistics of the scored field
#[derive(Debug, Clone, Copy)]
pub struct FieldScoringStats {
    pub total_docs: u64,       // Documents holding the field
    pub avg_field_length: f32, // Average token count of the field
}

/// BM25 Scorer
pub struct BM25Scorer {
    pub k1: f32,  // Term frequency saturation (default: 1.2)
    pub b: f32,   // Length normalization strength (default: 0.75)
}

impl Default for BM25Scorer {
    fn default() -> Self {
        BM25Scorer {
            k1: 1.2,
            b: 0.75,
        }
    }
}

impl BM25Scorer {
    /// Lucene-style IDF, never negative
    pub fn idf(&self, doc_freq: u64, total_docs: u64) -> f32 {
        let n = total_docs.max(doc_freq) as f32;
        let df = doc_freq as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }
}

impl Scorer for BM25Scorer {
    fn score(&self, posting: &Posting, term_stats: &TermStats, field_stats: &FieldScoringStats) -> f32 {
        let tf = posting.term_freq as f32;
        let doc_len = posting.field_length as f32;
        let avg_doc_len = field_stats.avg_field_length.max(1.0);
        let idf = self.idf(term_stats.doc_freq, field_stats.total_docs);

        // BM25 formula
        let numerator = idf * tf * (self.k1 + 1.0);
        let denominator = tf + self.k1 * (1.0 - self.b + self.b * (doc_len / avg_doc_len));

        numerator / denominator
    }

    fn name(&self) -> &str {
        "bm25"
    }
}
