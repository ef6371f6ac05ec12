use std::collections::HashMap;
use roaring::RoaringBitmap;
use crate::index::posting::DocOrdinal;

/// Category paths per facet field.
///
/// Every prefix of a document's path (including the empty root) maps to the
/// documents below it, so drilling into `[2015, Jan]` is a single lookup.
#[derive(Debug, Clone, Default)]
pub struct FacetIndex {
    pub postings: HashMap<String, HashMap<Vec<String>, RoaringBitmap>>,
    pub paths: HashMap<String, HashMap<DocOrdinal, Vec<String>>>,
}

impl FacetIndex {
    pub fn new() -> Self {
        FacetIndex::default()
    }

    pub fn add(&mut self, doc: DocOrdinal, field: &str, path: &[String]) {
        let prefixes = self.postings.entry(field.to_string()).or_default();
        for len in 0..=path.len() {
            prefixes.entry(path[..len].to_vec()).or_default().insert(doc);
        }
        self.paths.entry(field.to_string())
            .or_default()
            .insert(doc, path.to_vec());
    }

    pub fn remove(&mut self, doc: DocOrdinal, field: &str) {
        let Some(path) = self.paths.get_mut(field).and_then(|docs| docs.remove(&doc)) else {
            return;
        };

        if let Some(prefixes) = self.postings.get_mut(field) {
            for len in 0..=path.len() {
                let prefix = &path[..len];
                if let Some(docs) = prefixes.get_mut(prefix) {
                    docs.remove(doc);
                    if docs.is_empty() {
                        prefixes.remove(prefix);
                    }
                }
            }
            if prefixes.is_empty() {
                self.postings.remove(field);
                self.paths.remove(field);
            }
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.postings.contains_key(field)
    }

    /// Documents whose path for `field` starts with `path`
    pub fn docs_under(&self, field: &str, path: &[String]) -> RoaringBitmap {
        self.postings.get(field)
            .and_then(|prefixes| prefixes.get(path))
            .cloned()
            .unwrap_or_default()
    }

    pub fn path_of(&self, field: &str, doc: DocOrdinal) -> Option<&Vec<String>> {
        self.paths.get(field).and_then(|docs| docs.get(&doc))
    }

    /// For each document in `scope` below `path`, the next path element
    pub fn children<'a>(
        &'a self,
        field: &'a str,
        path: &'a [String],
        scope: &'a RoaringBitmap,
    ) -> impl Iterator<Item = (DocOrdinal, &'a str)> + 'a {
        let under = self.docs_under(field, path) & scope;
        under.into_iter().filter_map(move |doc| {
            self.path_of(field, doc)
                .and_then(|p| p.get(path.len()))
                .map(|label| (doc, label.as_str()))
        })
    }

    pub fn clear(&mut self) {
        self.postings.clear();
        self.paths.clear();
    }
}
