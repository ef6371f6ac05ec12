use serde::{Serialize, Deserialize};
use crate::core::types::RecordValue;

/// Column definition with indexing and analyzer options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub indexed: bool,
    pub score_param: bool,         // Usable as a drilldown weight
    pub analyzer: Option<String>,  // Analyzer name for text columns
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    String,
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    Binary,
    Facet,
}

impl ColumnType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Long | ColumnType::Float | ColumnType::Double)
    }

    /// Type inferred for a value written to an undeclared column
    pub fn infer(value: &RecordValue) -> Option<ColumnType> {
        match value {
            RecordValue::Null => None,
            RecordValue::String(_) => Some(ColumnType::String),
            RecordValue::Integer(_) => Some(ColumnType::Integer),
            RecordValue::Long(_) => Some(ColumnType::Long),
            RecordValue::Float(_) => Some(ColumnType::Float),
            RecordValue::Double(_) => Some(ColumnType::Double),
            RecordValue::Boolean(_) => Some(ColumnType::Boolean),
            RecordValue::Binary(_) => Some(ColumnType::Binary),
            RecordValue::Facet(_) => Some(ColumnType::Facet),
        }
    }
}

/// Table schema. Columns are optional: records may carry undeclared columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSchema {
    pub columns: Vec<ColumnDefinition>,
    pub primary_keys: Vec<String>,
}

impl AnalyticsSchema {
    pub fn new() -> Self {
        AnalyticsSchema::default()
    }

    pub fn add_column(mut self, name: &str, column_type: ColumnType, indexed: bool) -> Self {
        self.columns.retain(|c| c.name != name);
        self.columns.push(ColumnDefinition {
            name: name.to_string(),
            column_type,
            indexed,
            score_param: false,
            analyzer: None,
        });
        self
    }

    pub fn add_text_column(mut self, name: &str, analyzer: Option<String>) -> Self {
        self = self.add_column(name, ColumnType::String, true);
        if let Some(column) = self.columns.last_mut() {
            column.analyzer = analyzer;
        }
        self
    }

    pub fn add_facet_column(self, name: &str) -> Self {
        self.add_column(name, ColumnType::Facet, true)
    }

    pub fn add_score_column(mut self, name: &str, column_type: ColumnType) -> Self {
        self = self.add_column(name, column_type, true);
        if let Some(column) = self.columns.last_mut() {
            column.score_param = true;
        }
        self
    }

    pub fn with_primary_keys(mut self, keys: &[&str]) -> Self {
        self.primary_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn get_analyzer_for_column(&self, name: &str) -> Option<&String> {
        self.column(name).and_then(|c| c.analyzer.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.primary_keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redeclaring_column_replaces_it() {
        let schema = AnalyticsSchema::new()
            .add_column("amount", ColumnType::Integer, false)
            .add_column("amount", ColumnType::Double, true);

        assert_eq!(schema.columns.len(), 1);
        let column = schema.column("amount").unwrap();
        assert_eq!(column.column_type, ColumnType::Double);
        assert!(column.indexed);
    }

    #[test]
    fn test_builder_flags() {
        let schema = AnalyticsSchema::new()
            .add_text_column("title", Some("keyword".to_string()))
            .add_score_column("weight", ColumnType::Double)
            .with_primary_keys(&["title"]);

        assert_eq!(schema.get_analyzer_for_column("title").map(String::as_str), Some("keyword"));
        assert!(schema.column("weight").unwrap().score_param);
        assert_eq!(schema.primary_keys, vec!["title".to_string()]);
    }
}
