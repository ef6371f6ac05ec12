use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use rust_stemmers::Algorithm;
use crate::analysis::filter::TokenFilter;
use crate::analysis::filters::lowercase::LowercaseFilter;
use crate::analysis::filters::stemmer::StemmerFilter;
use crate::analysis::filters::stopword::StopWordFilter;
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{KeywordTokenizer, StandardTokenizer, Tokenizer};
use crate::core::error::{Error, ErrorKind, Result};

/// Text analysis pipeline
pub struct Analyzer {
    pub tokenizer: Box<dyn Tokenizer>,
    pub filters: Vec<Box<dyn TokenFilter>>,
    pub name: String,
}

impl Analyzer {
    pub fn new(name: String, tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer {
            tokenizer,
            filters: Vec::new(),
            name,
        }
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(text);

        for filter in &self.filters {
            tokens = filter.filter(tokens);
        }

        tokens
    }

    /// Whether query patterns (prefix, wildcard) should be lowercased to match
    pub fn lowercases(&self) -> bool {
        self.filters.iter().any(|f| f.name() == "lowercase")
    }

    /// Create standard analyzer for English
    pub fn standard_english() -> Self {
        Analyzer::new("standard".to_string(),
                      Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter))
            .add_filter(Box::new(StopWordFilter::english()))
            .add_filter(Box::new(StemmerFilter::new(Algorithm::English)))
    }

    /// Unicode words, lowercased, nothing removed
    pub fn simple() -> Self {
        Analyzer::new("simple".to_string(),
                      Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter))
    }

    /// Exact value matching
    pub fn keyword() -> Self {
        Analyzer::new("keyword".to_string(), Box::new(KeywordTokenizer))
    }
}

/// Registry for managing analyzers
pub struct AnalyzerRegistry {
    analyzers: RwLock<HashMap<String, Arc<Analyzer>>>,
    default_analyzer: String,
}

impl AnalyzerRegistry {
    pub fn new(default_analyzer: &str) -> Self {
        let registry = AnalyzerRegistry {
            analyzers: RwLock::new(HashMap::new()),
            default_analyzer: default_analyzer.to_string(),
        };

        // Register default analyzers
        registry.register("standard", Analyzer::standard_english());
        registry.register("simple", Analyzer::simple());
        registry.register("keyword", Analyzer::keyword());
        registry
    }

    pub fn register(&self, name: &str, analyzer: Analyzer) {
        self.analyzers.write().insert(name.to_string(), Arc::new(analyzer));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Analyzer>> {
        self.analyzers.read().get(name).cloned()
    }

    pub fn default_analyzer(&self) -> Arc<Analyzer> {
        self.get(&self.default_analyzer)
            .or_else(|| self.get("standard"))
            .unwrap_or_else(|| Arc::new(Analyzer::standard_english()))
    }

    pub fn keyword(&self) -> Arc<Analyzer> {
        self.get("keyword").unwrap_or_else(|| Arc::new(Analyzer::keyword()))
    }

    /// Resolves an optional per-column analyzer name
    pub fn resolve(&self, name: Option<&String>) -> Result<Arc<Analyzer>> {
        match name {
            None => Ok(self.default_analyzer()),
            Some(name) => self.get(name).ok_or_else(|| Error {
                kind: ErrorKind::IndexError,
                context: format!("Analyzer '{}' not found", name),
            }),
        }
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        AnalyzerRegistry::new("standard")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(analyzer: &Analyzer, text: &str) -> Vec<String> {
        analyzer.analyze(text).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_standard_lowercases_drops_stopwords_and_stems() {
        let analyzer = Analyzer::standard_english();
        assert_eq!(terms(&analyzer, "The Cities of NY"), vec!["citi".to_string(), "ny".to_string()]);
    }

    #[test]
    fn test_keyword_is_exact() {
        let analyzer = Analyzer::keyword();
        assert_eq!(terms(&analyzer, "Order-42"), vec!["Order-42".to_string()]);
        assert!(!analyzer.lowercases());
    }

    #[test]
    fn test_registry_resolution() {
        let registry = AnalyzerRegistry::new("simple");
        assert_eq!(registry.default_analyzer().name, "simple");
        assert_eq!(registry.resolve(Some(&"keyword".to_string())).unwrap().name, "keyword");

        let err = registry.resolve(Some(&"klingon".to_string())).err().unwrap();
        assert_eq!(err.kind, ErrorKind::IndexError);
    }
}
