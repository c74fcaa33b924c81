//! Resource schemas: ordered attribute specs, whole-record validators and
//! derived accessors, compiled into a single fail-fast validation pass.
pub mod validators;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::attrs::{Record, ValidatedAttributes};
use crate::descriptor::TypeDescriptor;
use crate::error::{SynthError, SynthResult};

pub type FieldValidator = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;
pub type RecordValidator = Arc<dyn Fn(Record) -> SynthResult<Record> + Send + Sync>;
pub type DerivedFn = Arc<dyn Fn(&ValidatedAttributes) -> Option<Value> + Send + Sync>;

// ————————————————————————————————————————————————————————————————————————————
// ATTRIBUTE SPECS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone)]
pub struct AttributeSpec {
    name: String,
    descriptor: TypeDescriptor,
    required: bool,
    description: Option<String>,
    validator: Option<FieldValidator>,
}

impl AttributeSpec {
    pub fn required(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self { name: name.into(), descriptor, required: true, description: None, validator: None }
    }

    pub fn optional(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self { name: name.into(), descriptor, required: false, description: None, validator: None }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Runs after the descriptor accepted the value; may rewrite it.
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn resolve(&self, path: &str, supplied: Option<&Value>) -> SynthResult<Option<Value>> {
        let Some(value) = supplied.filter(|v| !v.is_null()) else {
            return match self.descriptor.apply_default(None) {
                Some(default) => Ok(Some(default)),
                None if self.required => Err(SynthError::missing(path)),
                None => Ok(None),
            };
        };
        let value = self.descriptor.validate(path, value)?;
        match &self.validator {
            Some(validator) => validator(&value)
                .map(Some)
                .map_err(|reason| SynthError::constraint(path, reason, &value)),
            None => Ok(Some(value)),
        }
    }
}

impl fmt::Debug for AttributeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeSpec")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .field("required", &self.required)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SCHEMA
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKeys {
    #[default]
    Deny,
    Ignore,
}

#[derive(Clone)]
pub struct ResourceSchema {
    name: String,
    description: Option<String>,
    attributes: Vec<AttributeSpec>,
    validators: Vec<RecordValidator>,
    derived: Vec<(String, DerivedFn)>,
    unknown_keys: UnknownKeys,
}

impl ResourceSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            attributes: Vec::new(),
            validators: Vec::new(),
            derived: Vec::new(),
            unknown_keys: UnknownKeys::Deny,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn attribute(mut self, spec: AttributeSpec) -> Self {
        self.attributes.push(spec);
        self
    }

    /// Append a whole-record validator; validators run in the order added.
    pub fn validator(mut self, validator: RecordValidator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Declare a pure accessor evaluated over the frozen record.
    pub fn derive<F>(mut self, name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&ValidatedAttributes) -> Option<Value> + Send + Sync + 'static,
    {
        self.derived.push((name.into(), Arc::new(compute)));
        self
    }

    /// Drop undeclared keys instead of rejecting them.
    pub fn lenient(mut self) -> Self {
        self.unknown_keys = UnknownKeys::Ignore;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    pub fn attribute_spec(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Validate a raw attribute map and freeze the result.
    pub fn validate(&self, raw: &Map<String, Value>) -> SynthResult<ValidatedAttributes> {
        let record = self.validate_record("", raw)?;
        let frozen = ValidatedAttributes::freeze(record);
        Ok(self.derived.iter().fold(frozen, |attrs, (name, compute)| match compute(&attrs) {
            Some(value) => attrs.with_derived(name.clone(), value),
            None => attrs,
        }))
    }

    /// Normalize keys, resolve every attribute and run the record validators,
    /// with attribute paths rooted at `prefix`.
    pub(crate) fn validate_record(
        &self,
        prefix: &str,
        raw: &Map<String, Value>,
    ) -> SynthResult<Record> {
        let input = self.normalize_keys(prefix, raw)?;

        let mut record = Record::new();
        for spec in &self.attributes {
            let path = join_path(prefix, &spec.name);
            if let Some(value) = spec.resolve(&path, input.get(spec.name.as_str()).copied())? {
                record.insert(spec.name.clone(), value);
            }
        }

        self.validators.iter().try_fold(record, |record, validator| validator(record))
    }

    fn normalize_keys<'a>(
        &self,
        prefix: &str,
        raw: &'a Map<String, Value>,
    ) -> SynthResult<IndexMap<String, &'a Value>> {
        let mut input = IndexMap::with_capacity(raw.len());
        for (key, value) in raw {
            let name = normalize_key(key);
            if self.attribute_spec(&name).is_none() {
                match self.unknown_keys {
                    UnknownKeys::Deny => {
                        return Err(SynthError::UnknownAttribute { field: join_path(prefix, key) });
                    }
                    UnknownKeys::Ignore => {
                        debug!(schema = %self.name, key = %key, "dropping undeclared attribute");
                        continue;
                    }
                }
            }
            if input.insert(name.clone(), value).is_some() {
                return Err(SynthError::invariant(format!(
                    "attribute `{}` supplied more than once",
                    join_path(prefix, &name)
                )));
            }
        }
        Ok(input)
    }
}

impl fmt::Debug for ResourceSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceSchema")
            .field("name", &self.name)
            .field("attributes", &self.attributes)
            .field("validators", &self.validators.len())
            .field("derived", &self.derived.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("unknown_keys", &self.unknown_keys)
            .finish()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() { name.to_string() } else { format!("{prefix}.{name}") }
}

/// `camelCase`, `kebab-case` and padded keys all map onto `snake_case`.
pub fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for c in key.trim().chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c == '-' || c == ' ' {
            out.push('_');
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    out
}
