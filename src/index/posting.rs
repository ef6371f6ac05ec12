/// Segment-local document ordinal
pub type DocOrdinal = u32;

#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    pub doc: DocOrdinal,
    pub term_freq: u32,       // Term frequency in the field value
    pub positions: Vec<u32>,  // Token positions for phrase queries
    pub field_length: u32,    // Tokens in the field value, for length normalization
}

/// Posting list for a term
/// Note: Sorted by doc ordinal for efficient merging
#[derive(Debug, Clone, Default)]
pub struct PostingList {
    pub postings: Vec<Posting>,
}

impl PostingList {
    pub fn new() -> Self {
        PostingList {
            postings: Vec::new(),
        }
    }

    pub fn add_posting(&mut self, posting: Posting) {
        match self.postings.binary_search_by_key(&posting.doc, |p| p.doc) {
            Ok(pos) => {
                self.postings[pos] = posting;
            }
            Err(pos) => {
                self.postings.insert(pos, posting);
            }
        }
    }

    /// Returns true when a posting was removed
    pub fn remove(&mut self, doc: DocOrdinal) -> bool {
        match self.postings.binary_search_by_key(&doc, |p| p.doc) {
            Ok(pos) => {
                self.postings.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn get(&self, doc: DocOrdinal) -> Option<&Posting> {
        self.postings
            .binary_search_by_key(&doc, |p| p.doc)
            .ok()
            .map(|pos| &self.postings[pos])
    }

    pub fn docs(&self) -> impl Iterator<Item = DocOrdinal> + '_ {
        self.postings.iter().map(|p| p.doc)
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn doc_freq(&self) -> u32 {
        self.postings.len() as u32
    }

    pub fn total_freq(&self) -> u64 {
        self.postings.iter().map(|p| p.term_freq as u64).sum()
    }

    /// Intersect two posting lists (simple linear merge)
    pub fn intersect(&self, other: &PostingList) -> Vec<DocOrdinal> {
        let mut result = Vec::new();
        let mut i = 0;
        let mut j = 0;

        while i < self.postings.len() && j < other.postings.len() {
            let doc1 = self.postings[i].doc;
            let doc2 = other.postings[j].doc;

            if doc1 == doc2 {
                result.push(doc1);
                i += 1;
                j += 1;
            } else if doc1 < doc2 {
                i += 1;
            } else {
                j += 1;
            }
        }

        result
    }
}
