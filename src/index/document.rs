use std::sync::Arc;
use crate::analysis::analyzer::{Analyzer, AnalyzerRegistry};
use crate::analysis::token::Token;
use crate::core::error::{Error, Result};
use crate::core::types::{Record, RecordValue, ALL_FIELD, ID_FIELD, TIMESTAMP_FIELD};
use crate::schema::schema::{AnalyticsSchema, ColumnType};

/// A record reduced to the structures the index stores
#[derive(Debug, Clone)]
pub struct IndexedRecord {
    pub id: String,
    pub timestamp: i64,
    pub fields: Vec<IndexedField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedField {
    pub name: String,
    pub value: IndexedValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexedValue {
    Text(Vec<Token>),
    Number(f64),
    Facet(Vec<String>),
}

/// Turns records into indexable fields according to a table schema.
///
/// Declared columns are indexed only when flagged `indexed`; undeclared
/// columns are indexed by the type of their value.
pub struct RecordIndexer<'a> {
    schema: &'a AnalyticsSchema,
    analyzers: &'a AnalyzerRegistry,
}

impl<'a> RecordIndexer<'a> {
    pub fn new(schema: &'a AnalyticsSchema, analyzers: &'a AnalyzerRegistry) -> Self {
        RecordIndexer { schema, analyzers }
    }

    pub fn index(&self, record: &Record) -> Result<IndexedRecord> {
        let keyword = self.analyzers.keyword();
        let mut fields = vec![
            IndexedField {
                name: ID_FIELD.to_string(),
                value: IndexedValue::Text(keyword.analyze(&record.id)),
            },
            IndexedField {
                name: TIMESTAMP_FIELD.to_string(),
                value: IndexedValue::Number(record.timestamp as f64),
            },
        ];
        let mut all_tokens: Vec<Token> = Vec::new();

        // Stable field order keeps `_all` positions deterministic
        let mut names: Vec<&String> = record.values.keys().collect();
        names.sort();

        for name in names {
            let value = &record.values[name];
            let column_type = match self.schema.column(name) {
                Some(column) if !column.indexed => continue,
                Some(column) => column.column_type,
                None => match ColumnType::infer(value) {
                    Some(t) => t,
                    None => continue,
                },
            };

            match self.index_value(name, column_type, value)? {
                Some(IndexedValue::Text(tokens)) => {
                    if column_type == ColumnType::String {
                        let base = all_tokens.last().map(|t| t.position + 2).unwrap_or(0);
                        all_tokens.extend(tokens.iter().map(|t| Token {
                            position: base + t.position,
                            ..t.clone()
                        }));
                    }
                    fields.push(IndexedField { name: name.clone(), value: IndexedValue::Text(tokens) });
                }
                Some(indexed) => fields.push(IndexedField { name: name.clone(), value: indexed }),
                None => {}
            }
        }

        if !all_tokens.is_empty() {
            fields.push(IndexedField {
                name: ALL_FIELD.to_string(),
                value: IndexedValue::Text(all_tokens),
            });
        }

        Ok(IndexedRecord {
            id: record.id.clone(),
            timestamp: record.timestamp,
            fields,
        })
    }

    fn index_value(&self, name: &str, column_type: ColumnType, value: &RecordValue) -> Result<Option<IndexedValue>> {
        if matches!(value, RecordValue::Null) {
            return Ok(None);
        }

        let indexed = match column_type {
            ColumnType::String => {
                let analyzer = self.analyzer_for(name)?;
                let text = match value {
                    RecordValue::String(s) => s.clone(),
                    other => other.canonical_string(),
                };
                Some(IndexedValue::Text(analyzer.analyze(&text)))
            }
            ColumnType::Integer | ColumnType::Long | ColumnType::Float | ColumnType::Double => {
                let number = match value {
                    RecordValue::String(s) => s.trim().parse::<f64>().ok(),
                    other => other.as_f64(),
                };
                match number {
                    Some(n) => Some(IndexedValue::Number(n)),
                    None => return Err(Error::index(format!(
                        "column '{}' is declared {:?} but holds {:?}", name, column_type, value
                    ))),
                }
            }
            ColumnType::Boolean => match value {
                RecordValue::Boolean(b) => Some(IndexedValue::Text(self.analyzers.keyword().analyze(&b.to_string()))),
                other => return Err(Error::index(format!(
                    "column '{}' is declared Boolean but holds {:?}", name, other
                ))),
            },
            ColumnType::Facet => match value {
                RecordValue::Facet(path) => Some(IndexedValue::Facet(path.clone())),
                RecordValue::String(s) => Some(IndexedValue::Facet(parse_facet_path(s))),
                other => return Err(Error::index(format!(
                    "column '{}' is declared Facet but holds {:?}", name, other
                ))),
            },
            ColumnType::Binary => None,
        };

        Ok(indexed)
    }

    fn analyzer_for(&self, column: &str) -> Result<Arc<Analyzer>> {
        self.analyzers.resolve(self.schema.get_analyzer_for_column(column))
    }
}

/// Facet strings are comma separated category paths: "2015, Jan, 01"
pub fn parse_facet_path(value: &str) -> Vec<String> {
    value.split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn record(values: Vec<(&str, RecordValue)>) -> Record {
        let values: HashMap<String, RecordValue> = values.into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Record::with_id("r1", "t", values).at(42)
    }

    fn field<'r>(indexed: &'r IndexedRecord, name: &str) -> Option<&'r IndexedValue> {
        indexed.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    #[test]
    fn test_dynamic_columns_are_indexed_by_value_type() {
        let registry = AnalyzerRegistry::default();
        let schema = AnalyticsSchema::new();
        let indexed = RecordIndexer::new(&schema, &registry)
            .index(&record(vec![
                ("city", RecordValue::from("New York")),
                ("amount", RecordValue::from(5)),
                ("region", RecordValue::facet(&["us", "east"])),
            ]))
            .unwrap();

        assert_eq!(field(&indexed, "amount"), Some(&IndexedValue::Number(5.0)));
        assert_eq!(field(&indexed, TIMESTAMP_FIELD), Some(&IndexedValue::Number(42.0)));
        assert_eq!(field(&indexed, "region"), Some(&IndexedValue::Facet(vec!["us".into(), "east".into()])));
        match field(&indexed, ALL_FIELD) {
            Some(IndexedValue::Text(tokens)) => assert_eq!(tokens.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_declared_unindexed_column_is_skipped() {
        let registry = AnalyzerRegistry::default();
        let schema = AnalyticsSchema::new().add_column("secret", ColumnType::String, false);
        let indexed = RecordIndexer::new(&schema, &registry)
            .index(&record(vec![("secret", RecordValue::from("hidden"))]))
            .unwrap();
        assert!(field(&indexed, "secret").is_none());
        assert!(field(&indexed, ALL_FIELD).is_none());
    }

    #[test]
    fn test_declared_facet_parses_strings_and_rejects_numbers() {
        let registry = AnalyzerRegistry::default();
        let schema = AnalyticsSchema::new().add_facet_column("date");
        let indexer = RecordIndexer::new(&schema, &registry);

        let indexed = indexer.index(&record(vec![("date", RecordValue::from("2015, Jan"))])).unwrap();
        assert_eq!(field(&indexed, "date"), Some(&IndexedValue::Facet(vec!["2015".into(), "Jan".into()])));

        let err = indexer.index(&record(vec![("date", RecordValue::from(7))])).unwrap_err();
        assert_eq!(err.kind, crate::core::error::ErrorKind::IndexError);
    }
}
