use std::collections::HashMap;
use roaring::RoaringBitmap;
use crate::index::document::{IndexedRecord, IndexedValue};
use crate::index::facet::FacetIndex;
use crate::index::inverted::{InvertedIndex, Term};
use crate::index::numeric::NumericIndex;
use crate::index::posting::DocOrdinal;

/// What one document contributed, so a replace or tombstone can undo it exactly
#[derive(Debug, Clone, Default)]
struct DocEntry {
    text: Vec<(String, Vec<Term>, u32)>,
    numbers: Vec<(String, f64)>,
    facets: Vec<String>,
}

/// One shard's slice of a table's index.
///
/// Written only by the shard's pipeline worker. Readers evaluate queries
/// against a published snapshot of it.
#[derive(Debug, Clone, Default)]
pub struct TableSegment {
    pub inverted: InvertedIndex,
    pub numeric: NumericIndex,
    pub facets: FacetIndex,
    pub live: RoaringBitmap,
    ordinals: HashMap<String, DocOrdinal>,
    ids: HashMap<DocOrdinal, String>,
    entries: HashMap<DocOrdinal, DocEntry>,
    next_ordinal: DocOrdinal,
    generation: u64,
}

impl TableSegment {
    pub fn new() -> Self {
        TableSegment::default()
    }

    /// Full replace: any previous contribution of the same id is removed first
    pub fn upsert(&mut self, record: &IndexedRecord) {
        let doc = match self.ordinals.get(&record.id) {
            Some(&doc) => {
                self.remove_contributions(doc);
                doc
            }
            None => {
                let doc = self.next_ordinal;
                self.next_ordinal += 1;
                self.ordinals.insert(record.id.clone(), doc);
                self.ids.insert(doc, record.id.clone());
                doc
            }
        };

        let mut entry = DocEntry::default();
        for field in &record.fields {
            match &field.value {
                IndexedValue::Text(tokens) => {
                    let terms = self.inverted.add_field(doc, &field.name, tokens);
                    if !terms.is_empty() {
                        entry.text.push((field.name.clone(), terms, tokens.len() as u32));
                    }
                }
                IndexedValue::Number(value) => {
                    self.numeric.add(doc, &field.name, *value);
                    entry.numbers.push((field.name.clone(), *value));
                }
                IndexedValue::Facet(path) => {
                    self.facets.add(doc, &field.name, path);
                    entry.facets.push(field.name.clone());
                }
            }
        }

        self.entries.insert(doc, entry);
        self.live.insert(doc);
    }

    /// Tombstone. Returns false when the id was not indexed here.
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(doc) = self.ordinals.remove(id) else {
            return false;
        };
        self.remove_contributions(doc);
        self.ids.remove(&doc);
        self.live.remove(doc);
        true
    }

    fn remove_contributions(&mut self, doc: DocOrdinal) {
        let Some(entry) = self.entries.remove(&doc) else {
            return;
        };
        for (field, terms, length) in &entry.text {
            self.inverted.remove_field(doc, field, terms, *length);
        }
        for (field, value) in &entry.numbers {
            self.numeric.remove(doc, field, *value);
        }
        for field in &entry.facets {
            self.facets.remove(doc, field);
        }
    }

    pub fn clear(&mut self) {
        self.inverted.clear();
        self.numeric.clear();
        self.facets.clear();
        self.live.clear();
        self.ordinals.clear();
        self.ids.clear();
        self.entries.clear();
    }

    pub fn id_of(&self, doc: DocOrdinal) -> Option<&str> {
        self.ids.get(&doc).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ordinals.contains_key(id)
    }

    /// Indexed numeric value of a field for one document
    pub fn number_of(&self, doc: DocOrdinal, field: &str) -> Option<f64> {
        self.entries.get(&doc)
            .and_then(|entry| entry.numbers.iter().find(|(name, _)| name == field))
            .map(|(_, value)| *value)
    }

    pub fn doc_count(&self) -> u64 {
        self.live.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Marks a batch of changes as published
    pub fn bump_generation(&mut self) {
        self.generation += 1;
    }
}
