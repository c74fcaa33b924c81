//! Value-type descriptors.
//!
//! A `TypeDescriptor` is built once when a schema is defined and is then
//! shared (cheaply cloned) by every validation of that schema. Nested schemas
//! are held behind `Arc` handles so descriptors can compose to any depth: a
//! filter nested inside a rule nested inside a resource is just three levels
//! of `Kind::Nested`.
pub mod constraint;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::block::sanitize_key;
use crate::error::{SynthError, SynthResult};
use crate::reference::is_interpolation;
use crate::schema::ResourceSchema;

pub use constraint::Constraint;

#[derive(Debug, Clone)]
pub enum Kind {
    /// Accepts every value unchanged.
    Any,
    Bool,
    Integer,
    Number,
    String,
    Array {
        item: Box<TypeDescriptor>,
        min_items: Option<usize>,
        max_items: Option<usize>,
    },
    /// Object with arbitrary keys and uniformly typed values.
    Map(Box<TypeDescriptor>),
    Nested(Arc<ResourceSchema>),
    Enum(Vec<String>),
    Constrained {
        base: Box<TypeDescriptor>,
        constraints: Vec<Constraint>,
    },
    /// Null is valid, anything else delegates.
    Optional(Box<TypeDescriptor>),
}

#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    kind: Kind,
    default: Option<Value>,
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTION
// ————————————————————————————————————————————————————————————————————————————

impl TypeDescriptor {
    fn of(kind: Kind) -> Self {
        Self { kind, default: None }
    }
    pub fn any() -> Self {
        Self::of(Kind::Any)
    }
    pub fn bool() -> Self {
        Self::of(Kind::Bool)
    }
    pub fn integer() -> Self {
        Self::of(Kind::Integer)
    }
    pub fn number() -> Self {
        Self::of(Kind::Number)
    }
    pub fn string() -> Self {
        Self::of(Kind::String)
    }
    pub fn array_of(item: TypeDescriptor) -> Self {
        Self::of(Kind::Array { item: Box::new(item), min_items: None, max_items: None })
    }
    pub fn map_of(value: TypeDescriptor) -> Self {
        Self::of(Kind::Map(Box::new(value)))
    }
    pub fn nested(schema: impl Into<Arc<ResourceSchema>>) -> Self {
        Self::of(Kind::Nested(schema.into()))
    }
    pub fn enumeration<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::of(Kind::Enum(allowed.into_iter().map(Into::into).collect()))
    }
    pub fn optional(inner: TypeDescriptor) -> Self {
        Self::of(Kind::Optional(Box::new(inner)))
    }

    /// Wrap `self` in a constrained descriptor, or extend an existing one.
    pub fn with_constraint(self, constraint: Constraint) -> Self {
        let Self { kind, default } = self;
        let kind = match kind {
            Kind::Constrained { base, mut constraints } => {
                constraints.push(constraint);
                Kind::Constrained { base, constraints }
            }
            other => Kind::Constrained {
                base: Box::new(Self::of(other)),
                constraints: vec![constraint],
            },
        };
        Self { kind, default }
    }

    pub fn constrained<I>(self, constraints: I) -> Self
    where
        I: IntoIterator<Item = Constraint>,
    {
        constraints.into_iter().fold(self, Self::with_constraint)
    }

    /// Item-count bounds; only meaningful on arrays.
    pub fn with_items(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        if let Kind::Array { min_items, max_items, .. } = &mut self.kind {
            *min_items = min;
            *max_items = max;
        }
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Short name of the expected JSON shape, for mismatch messages.
    pub fn expected(&self) -> String {
        match &self.kind {
            Kind::Any => "any value".to_string(),
            Kind::Bool => "bool".to_string(),
            Kind::Integer => "integer".to_string(),
            Kind::Number => "number".to_string(),
            Kind::String | Kind::Enum(_) => "string".to_string(),
            Kind::Array { item, .. } => format!("array<{}>", item.expected()),
            Kind::Map(value) => format!("map<{}>", value.expected()),
            Kind::Nested(schema) => format!("object ({})", schema.name()),
            Kind::Constrained { base, .. } => base.expected(),
            Kind::Optional(inner) => format!("optional {}", inner.expected()),
        }
    }

    fn is_scalar(&self) -> bool {
        match &self.kind {
            Kind::Bool | Kind::Integer | Kind::Number | Kind::String | Kind::Enum(_) => true,
            Kind::Constrained { base, .. } => base.is_scalar(),
            _ => false,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// VALIDATION
// ————————————————————————————————————————————————————————————————————————————

impl TypeDescriptor {
    /// The supplied value if present (and not null), otherwise the default.
    pub fn apply_default(&self, present: Option<&Value>) -> Option<Value> {
        match present {
            Some(value) if !value.is_null() => Some(value.clone()),
            _ => self.default.clone(),
        }
    }

    /// Validate `value`, reporting failures against the attribute path `field`.
    ///
    /// Returns the materialized value: integral floats become integers and
    /// nested objects come back with defaults applied.
    pub fn validate(&self, field: &str, value: &Value) -> SynthResult<Value> {
        if self.is_scalar() && value.as_str().is_some_and(is_interpolation) {
            return Ok(value.clone());
        }
        match &self.kind {
            Kind::Any => Ok(value.clone()),
            Kind::Bool => match value {
                Value::Bool(_) => Ok(value.clone()),
                _ => Err(SynthError::mismatch(field, "bool", value)),
            },
            Kind::Integer => {
                as_integer(value).ok_or_else(|| SynthError::mismatch(field, "integer", value))
            }
            Kind::Number => match value {
                Value::Number(_) => Ok(value.clone()),
                _ => Err(SynthError::mismatch(field, "number", value)),
            },
            Kind::String => match value {
                Value::String(_) => Ok(value.clone()),
                _ => Err(SynthError::mismatch(field, "string", value)),
            },
            Kind::Enum(allowed) => {
                let Some(s) = value.as_str() else {
                    return Err(SynthError::mismatch(field, "string", value));
                };
                if allowed.iter().any(|a| a == s) {
                    Ok(value.clone())
                } else {
                    Err(SynthError::InvalidEnumValue {
                        field: field.to_string(),
                        allowed: allowed.clone(),
                        value: value.to_string(),
                    })
                }
            }
            Kind::Constrained { base, constraints } => {
                let value = base.validate(field, value)?;
                if value.as_str().is_some_and(is_interpolation) {
                    return Ok(value);
                }
                for constraint in constraints {
                    constraint
                        .check(&value)
                        .map_err(|description| SynthError::constraint(field, description, &value))?;
                }
                Ok(value)
            }
            Kind::Array { item, min_items, max_items } => {
                let Value::Array(xs) = value else {
                    return Err(SynthError::mismatch(field, self.expected(), value));
                };
                if let Some(min) = min_items {
                    if xs.len() < *min {
                        let description = format!("must have at least {min} items");
                        return Err(SynthError::constraint(field, description, value));
                    }
                }
                if let Some(max) = max_items {
                    if xs.len() > *max {
                        let description = format!("must have at most {max} items");
                        return Err(SynthError::constraint(field, description, value));
                    }
                }
                xs.iter()
                    .enumerate()
                    .map(|(i, x)| item.validate(&format!("{field}[{i}]"), x))
                    .collect::<SynthResult<Vec<_>>>()
                    .map(Value::Array)
            }
            Kind::Map(inner) => {
                let Value::Object(entries) = value else {
                    return Err(SynthError::mismatch(field, self.expected(), value));
                };
                // keys become block identifiers on emission and must stay distinct there
                let mut block_keys: HashMap<String, &str> = HashMap::with_capacity(entries.len());
                let mut out = Map::new();
                for (key, x) in entries {
                    if let Some(previous) = block_keys.insert(sanitize_key(key), key) {
                        return Err(SynthError::invariant(format!(
                            "`{field}` keys `{previous}` and `{key}` collide as block key `{}`",
                            sanitize_key(key)
                        )));
                    }
                    out.insert(key.clone(), inner.validate(&format!("{field}.{key}"), x)?);
                }
                Ok(Value::Object(out))
            }
            Kind::Nested(schema) => {
                let Value::Object(entries) = value else {
                    return Err(SynthError::mismatch(field, self.expected(), value));
                };
                let record = schema.validate_record(field, entries)?;
                Ok(Value::Object(record.into_map()))
            }
            Kind::Optional(inner) => {
                if value.is_null() { Ok(Value::Null) } else { inner.validate(field, value) }
            }
        }
    }
}

/// Integers pass through; integral floats are narrowed to integers.
fn as_integer(value: &Value) -> Option<Value> {
    let Value::Number(n) = value else {
        return None;
    };
    if n.is_i64() || n.is_u64() {
        return Some(value.clone());
    }
    let f = n.as_f64()?;
    if !f.is_finite() || f.fract() != 0.0 {
        return None;
    }
    // both bounds are powers of two, so the upper ones are exclusive
    if f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(Value::from(f as i64))
    } else if f >= 0.0 && f < u64::MAX as f64 {
        Some(Value::from(f as u64))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use serde_json::json;

    fn name_type() -> TypeDescriptor {
        TypeDescriptor::string().constrained([
            Constraint::length(1, 128),
            Constraint::pattern(
                Regex::new(r"^[a-zA-Z0-9_-]*$").unwrap(),
                "may only contain [a-zA-Z0-9_-]",
            ),
        ])
    }

    #[test]
    fn primitives_type_check() {
        assert_eq!(TypeDescriptor::bool().validate("f", &json!(true)), Ok(json!(true)));
        assert!(matches!(
            TypeDescriptor::bool().validate("f", &json!("true")),
            Err(SynthError::TypeMismatch { .. })
        ));
        assert_eq!(TypeDescriptor::integer().validate("f", &json!(4.0)), Ok(json!(4)));
        assert!(TypeDescriptor::integer().validate("f", &json!(4.5)).is_err());
        assert_eq!(TypeDescriptor::number().validate("f", &json!(4.5)), Ok(json!(4.5)));
    }

    #[test]
    fn integral_floats_keep_their_value() {
        let ty = TypeDescriptor::integer();
        // 2^63 does not fit an i64 and must not saturate to i64::MAX
        assert_eq!(
            ty.validate("n", &json!(9223372036854775808.0)),
            Ok(json!(9223372036854775808u64))
        );
        assert_eq!(ty.validate("n", &json!(-9223372036854775808.0)), Ok(json!(i64::MIN)));
        assert!(ty.validate("n", &json!(18446744073709551616.0)).is_err());
        assert!(ty.validate("n", &json!(-1.0e19)).is_err());
    }

    #[test]
    fn constrained_name_boundaries() {
        let ty = name_type();
        assert!(ty.validate("name", &json!("a")).is_ok());
        assert!(ty.validate("name", &json!("a".repeat(128))).is_ok());
        for bad in [json!(""), json!("a".repeat(129)), json!("has space"), json!("dot.ted")] {
            assert!(
                matches!(
                    ty.validate("name", &bad),
                    Err(SynthError::ConstraintViolation { ref field, .. }) if field == "name"
                ),
                "{bad} should violate"
            );
        }
        // the base check still comes first
        assert!(matches!(ty.validate("name", &json!(7)), Err(SynthError::TypeMismatch { .. })));
    }

    #[test]
    fn enum_membership() {
        let ty = TypeDescriptor::enumeration(["Enabled", "Disabled"]);
        assert!(ty.validate("status", &json!("Enabled")).is_ok());
        let err = ty.validate("status", &json!("enabled")).unwrap_err();
        assert_eq!(
            err,
            SynthError::InvalidEnumValue {
                field: "status".into(),
                allowed: vec!["Enabled".into(), "Disabled".into()],
                value: "\"enabled\"".into(),
            }
        );
    }

    #[test]
    fn arrays_report_first_failing_index() {
        let ty = TypeDescriptor::array_of(TypeDescriptor::integer()).with_items(Some(1), Some(3));
        assert!(ty.validate("ports", &json!([1, 2])).is_ok());
        for bad in [json!([]), json!([1, 2, 3, 4])] {
            assert!(matches!(
                ty.validate("ports", &bad),
                Err(SynthError::ConstraintViolation { .. })
            ));
        }
        let err = ty.validate("ports", &json!([1, "x", "y"])).unwrap_err();
        assert_eq!(err.field(), Some("ports[1]"));
    }

    #[test]
    fn maps_validate_every_value() {
        let ty = TypeDescriptor::map_of(TypeDescriptor::string());
        assert_eq!(ty.validate("tags", &json!({"Env": "prod"})), Ok(json!({"Env": "prod"})));
        let err = ty.validate("tags", &json!({"Env": "prod", "Tier": 3})).unwrap_err();
        assert_eq!(err.field(), Some("tags.Tier"));
    }

    #[test]
    fn map_keys_must_stay_distinct_as_block_keys() {
        let ty = TypeDescriptor::map_of(TypeDescriptor::string());
        let err = ty
            .validate("tags", &json!({"cost center": "A", "cost_center": "B"}))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "`tags` keys `cost center` and `cost_center` collide as block key `cost_center`"
        );
        assert!(matches!(err, SynthError::CrossFieldInvariantViolation { .. }));
        assert!(ty.validate("tags", &json!({"cost center": "A", "cost-center": "B"})).is_ok());
    }

    #[test]
    fn optional_accepts_null() {
        let ty = TypeDescriptor::optional(TypeDescriptor::string());
        assert_eq!(ty.validate("f", &Value::Null), Ok(Value::Null));
        assert!(ty.validate("f", &json!(1)).is_err());
    }

    #[test]
    fn interpolations_bypass_scalar_checks() {
        let placeholder = json!("${aws_lb.main.arn}");
        assert_eq!(name_type().validate("name", &placeholder), Ok(placeholder.clone()));
        assert_eq!(
            TypeDescriptor::integer().validate("port", &placeholder),
            Ok(placeholder.clone())
        );
        let strings = TypeDescriptor::array_of(TypeDescriptor::string());
        assert!(strings.validate("xs", &placeholder).is_err());
    }

    #[test]
    fn defaults_fill_absent_and_null() {
        let ty = TypeDescriptor::string().with_default("ENABLED");
        assert_eq!(ty.apply_default(None), Some(json!("ENABLED")));
        assert_eq!(ty.apply_default(Some(&Value::Null)), Some(json!("ENABLED")));
        assert_eq!(ty.apply_default(Some(&json!("DISABLED"))), Some(json!("DISABLED")));
        assert_eq!(TypeDescriptor::string().apply_default(None), None);
    }
}
