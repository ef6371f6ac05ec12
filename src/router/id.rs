use uuid::Uuid;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Record, RecordValue};
use crate::schema::schema::AnalyticsSchema;

/// Resolves the identity of a record about to be stored.
///
/// A caller-supplied id wins. Otherwise a table with primary keys derives a
/// stable UUID v5 from the key values, and any other table gets a random UUID v4.
pub fn resolve_id(record: &Record, schema: &AnalyticsSchema) -> Result<String> {
    if !record.id.is_empty() {
        return Ok(record.id.clone());
    }
    if schema.primary_keys.is_empty() {
        return Ok(Uuid::new_v4().to_string());
    }
    primary_key_id(record, schema)
}

fn primary_key_id(record: &Record, schema: &AnalyticsSchema) -> Result<String> {
    let mut canonical = String::new();
    for (i, key) in schema.primary_keys.iter().enumerate() {
        let value = match record.get_value(key) {
            Some(RecordValue::Null) | None => {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    format!("record is missing primary key column '{}'", key),
                ));
            }
            Some(value) => value,
        };
        if i > 0 {
            canonical.push('\u{1f}');
        }
        canonical.push_str(key);
        canonical.push('=');
        canonical.push_str(&value.canonical_string());
    }
    Ok(Uuid::new_v5(&Uuid::NAMESPACE_OID, canonical.as_bytes()).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn record(values: Vec<(&str, RecordValue)>) -> Record {
        Record::new("t", values.into_iter().map(|(k, v)| (k.to_string(), v)).collect::<HashMap<_, _>>())
    }

    #[test]
    fn test_explicit_id_wins() {
        let schema = AnalyticsSchema::new().with_primary_keys(&["a"]);
        let mut r = record(vec![]);
        r.id = "given".to_string();
        assert_eq!(resolve_id(&r, &schema).unwrap(), "given");
    }

    #[test]
    fn test_primary_key_id_is_stable_and_value_sensitive() {
        let schema = AnalyticsSchema::new().with_primary_keys(&["region", "year"]);
        let a = record(vec![("region", RecordValue::from("eu")), ("year", RecordValue::from(2015)), ("x", RecordValue::from(1))]);
        let b = record(vec![("region", RecordValue::from("eu")), ("year", RecordValue::from(2015)), ("x", RecordValue::from(2))]);
        let c = record(vec![("region", RecordValue::from("eu")), ("year", RecordValue::from(2016))]);

        let id = resolve_id(&a, &schema).unwrap();
        assert_eq!(id, resolve_id(&b, &schema).unwrap());
        assert_ne!(id, resolve_id(&c, &schema).unwrap());
    }

    #[test]
    fn test_missing_primary_key_is_rejected() {
        let schema = AnalyticsSchema::new().with_primary_keys(&["region"]);
        let err = resolve_id(&record(vec![]), &schema).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let schema = AnalyticsSchema::new();
        let r = record(vec![]);
        assert_ne!(resolve_id(&r, &schema).unwrap(), resolve_id(&r, &schema).unwrap());
    }
}
