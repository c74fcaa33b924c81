//! Reusable whole-record validators.
//!
//! Each helper returns a pure `Record -> SynthResult<Record>` step. Schemas
//! thread their record through these in declaration order, so the first
//! violated rule is the one reported.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::attrs::Record;
use crate::error::SynthError;

use super::RecordValidator;

/// Move a deprecated attribute onto its canonical name.
///
/// Setting both the alias and the canonical attribute is an invariant
/// violation rather than a silent override.
pub fn alias(deprecated: &str, canonical: &str) -> RecordValidator {
    let deprecated = deprecated.to_string();
    let canonical = canonical.to_string();
    Arc::new(move |mut record: Record| {
        let Some(value) = record.remove(&deprecated) else {
            return Ok(record);
        };
        if value.is_null() {
            return Ok(record);
        }
        if record.is_set(&canonical) {
            return Err(SynthError::invariant(format!(
                "`{deprecated}` is a deprecated alias of `{canonical}`; set only `{canonical}`"
            )));
        }
        debug!(from = %deprecated, to = %canonical, "resolved deprecated alias");
        record.insert(canonical.clone(), value);
        Ok(record)
    })
}

/// Exactly one attribute of the group must be set.
pub fn exactly_one_of(fields: &[&str]) -> RecordValidator {
    let fields = owned(fields);
    Arc::new(move |record: Record| {
        let set = set_fields(&record, &fields);
        match set.len() {
            1 => Ok(record),
            0 => Err(SynthError::invariant(format!(
                "exactly one of [{}] must be set",
                fields.join(", ")
            ))),
            _ => Err(SynthError::invariant(format!(
                "only one of [{}] may be set, got [{}]",
                fields.join(", "),
                set.join(", ")
            ))),
        }
    })
}

/// At most one attribute of the group may be set.
pub fn at_most_one_of(fields: &[&str]) -> RecordValidator {
    let fields = owned(fields);
    Arc::new(move |record: Record| {
        let set = set_fields(&record, &fields);
        if set.len() > 1 {
            return Err(SynthError::invariant(format!(
                "only one of [{}] may be set, got [{}]",
                fields.join(", "),
                set.join(", ")
            )));
        }
        Ok(record)
    })
}

/// When `field` is set, `dependency` must be set too.
pub fn requires(field: &str, dependency: &str) -> RecordValidator {
    let field = field.to_string();
    let dependency = dependency.to_string();
    Arc::new(move |record: Record| {
        if record.is_set(&field) && !record.is_set(&dependency) {
            return Err(SynthError::invariant(format!(
                "`{field}` requires `{dependency}` to be set"
            )));
        }
        Ok(record)
    })
}

/// Entries of the array attribute `field` must carry distinct values for `key`.
pub fn unique_by(field: &str, key: &str) -> RecordValidator {
    let field = field.to_string();
    let key = key.to_string();
    Arc::new(move |record: Record| {
        let Some(Value::Array(entries)) = record.get(&field) else {
            return Ok(record);
        };
        let mut seen = BTreeSet::new();
        for entry in entries {
            let Some(value) = entry.get(&key).filter(|v| !v.is_null()) else {
                continue;
            };
            if !seen.insert(value.to_string()) {
                return Err(SynthError::invariant(format!(
                    "`{field}` entries must have a unique `{key}`; {value} appears more than once"
                )));
            }
        }
        Ok(record)
    })
}

/// Fill `target` from the rest of the record when it was not supplied.
pub fn derive<F>(target: &str, compute: F) -> RecordValidator
where
    F: Fn(&Record) -> Option<Value> + Send + Sync + 'static,
{
    let target = target.to_string();
    Arc::new(move |mut record: Record| {
        if !record.is_set(&target) {
            if let Some(value) = compute(&record) {
                record.insert(target.clone(), value);
            }
        }
        Ok(record)
    })
}

/// Arbitrary invariant over the record.
pub fn check<F>(description: &str, holds: F) -> RecordValidator
where
    F: Fn(&Record) -> bool + Send + Sync + 'static,
{
    let description = description.to_string();
    Arc::new(move |record: Record| {
        if holds(&record) { Ok(record) } else { Err(SynthError::invariant(description.clone())) }
    })
}

fn owned(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

fn set_fields<'a>(record: &Record, fields: &'a [String]) -> Vec<&'a str> {
    fields.iter().filter(|f| record.is_set(f)).map(String::as_str).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> Record {
        let mut r = Record::new();
        for (k, v) in pairs {
            r.insert(*k, v.clone());
        }
        r
    }

    #[test]
    fn alias_moves_value() {
        let v = alias("alb_target_group_arn", "lb_target_group_arn");
        let out = v(record(&[("alb_target_group_arn", json!("arn:1"))])).unwrap();
        assert_eq!(out.get("lb_target_group_arn"), Some(&json!("arn:1")));
        assert!(!out.is_set("alb_target_group_arn"));

        let err = alias("old", "new")(record(&[("old", json!(1)), ("new", json!(2))])).unwrap_err();
        assert!(matches!(err, SynthError::CrossFieldInvariantViolation { .. }));
    }

    #[test]
    fn exclusivity_cardinalities() {
        let v = exactly_one_of(&["elb", "lb_target_group_arn"]);
        assert!(v(record(&[])).is_err());
        assert!(v(record(&[("elb", json!("a"))])).is_ok());
        let both = record(&[("elb", json!("a")), ("lb_target_group_arn", json!("b"))]);
        let err = v(both).unwrap_err();
        assert_eq!(
            err.to_string(),
            "only one of [elb, lb_target_group_arn] may be set, got [elb, lb_target_group_arn]"
        );

        let v = at_most_one_of(&["prefix", "and"]);
        assert!(v(record(&[])).is_ok());
        assert!(v(record(&[("prefix", json!("logs/")), ("and", json!({}))])).is_err());
    }

    #[test]
    fn requires_dependency() {
        let v = requires("kms_key_arn", "encryption_option");
        assert!(v(record(&[("encryption_option", json!("SSE_S3"))])).is_ok());
        assert!(v(record(&[("kms_key_arn", json!("k"))])).is_err());
    }

    #[test]
    fn unique_orders() {
        let v = unique_by("default_action", "order");
        assert!(v(record(&[("default_action", json!([{"order": 1}, {"order": 2}]))])).is_ok());
        let repeated = record(&[("default_action", json!([{"order": 1}, {"order": 1}]))]);
        let err = v(repeated).unwrap_err();
        assert!(matches!(err, SynthError::CrossFieldInvariantViolation { .. }));
    }

    #[test]
    fn derive_fills_only_when_unset() {
        let v = derive("name", |r| r.get("id").cloned());
        assert_eq!(v(record(&[("id", json!("x"))])).unwrap().get("name"), Some(&json!("x")));
        let named = v(record(&[("id", json!("x")), ("name", json!("y"))])).unwrap();
        assert_eq!(named.get("name"), Some(&json!("y")));
    }
}
