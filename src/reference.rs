//! Symbolic references to declared resources.
//!
//! Outputs are only known once the provisioning tool has run, so they are
//! represented by `${kind.name.output}` placeholders. Computed properties are
//! derived purely from validated inputs and exist for authoring convenience.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::attrs::ValidatedAttributes;

pub type ComputeFn = Arc<dyn Fn(&ValidatedAttributes) -> Value + Send + Sync>;

/// A named, total function over validated attributes.
#[derive(Clone)]
pub struct ComputedProperty {
    name: String,
    compute: ComputeFn,
}

impl ComputedProperty {
    pub fn new<F>(name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&ValidatedAttributes) -> Value + Send + Sync + 'static,
    {
        Self { name: name.into(), compute: Arc::new(compute) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, attrs: &ValidatedAttributes) -> Value {
        (self.compute)(attrs)
    }
}

impl fmt::Debug for ComputedProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComputedProperty({})", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceReference {
    kind: String,
    name: String,
    outputs: IndexMap<String, String>,
    computed: IndexMap<String, Value>,
}

impl ResourceReference {
    /// Build the reference for `kind.name`. Never fails.
    pub fn emit<S: AsRef<str>>(
        kind: &str,
        name: &str,
        outputs: &[S],
        computed: &[ComputedProperty],
        attrs: &ValidatedAttributes,
    ) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            outputs: outputs
                .iter()
                .map(|o| (o.as_ref().to_string(), placeholder(kind, name, o.as_ref())))
                .collect(),
            computed: computed
                .iter()
                .map(|c| (c.name.clone(), c.evaluate(attrs)))
                .collect(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `kind.name`
    pub fn address(&self) -> String {
        format!("{}.{}", self.kind, self.name)
    }

    pub fn output(&self, name: &str) -> Option<&str> {
        self.outputs.get(name).map(String::as_str)
    }

    pub fn outputs(&self) -> &IndexMap<String, String> {
        &self.outputs
    }

    pub fn computed(&self, name: &str) -> Option<&Value> {
        self.computed.get(name)
    }

    pub fn computed_values(&self) -> &IndexMap<String, Value> {
        &self.computed
    }

    /// Placeholder for an attribute that is not among the declared outputs.
    pub fn interpolate(&self, attribute: &str) -> String {
        placeholder(&self.kind, &self.name, attribute)
    }
}

impl fmt::Display for ResourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.name)
    }
}

pub fn placeholder(kind: &str, name: &str, attribute: &str) -> String {
    format!("${{{kind}.{name}.{attribute}}}")
}

/// Whether `s` is a whole `${...}` interpolation, left for the provisioning
/// tool to resolve.
pub fn is_interpolation(s: &str) -> bool {
    s.len() > 3 && s.starts_with("${") && s.ends_with('}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::Record;
    use serde_json::json;

    fn attrs() -> ValidatedAttributes {
        let mut record = Record::new();
        record.insert("protocol", json!("HTTPS"));
        ValidatedAttributes::freeze(record)
    }

    #[test]
    fn outputs_follow_the_placeholder_law() {
        let r = ResourceReference::emit("aws_lb_listener", "web", &["id", "arn"], &[], &attrs());
        assert_eq!(r.output("id"), Some("${aws_lb_listener.web.id}"));
        assert_eq!(r.output("arn"), Some("${aws_lb_listener.web.arn}"));
        assert_eq!(r.output("dns_name"), None);
        assert_eq!(r.interpolate("dns_name"), "${aws_lb_listener.web.dns_name}");
        assert_eq!(r.address(), "aws_lb_listener.web");
    }

    #[test]
    fn computed_properties_are_evaluated() {
        let secure =
            ComputedProperty::new("is_secure", |a| Value::from(a.str("protocol") == Some("HTTPS")));
        let r = ResourceReference::emit("aws_lb_listener", "web", &["id"], &[secure], &attrs());
        assert_eq!(r.computed("is_secure"), Some(&json!(true)));
    }

    #[test]
    fn interpolation_detection() {
        assert!(is_interpolation("${aws_vpc.main.id}"));
        assert!(!is_interpolation("${}"));
        assert!(!is_interpolation("prefix-${aws_vpc.main.id}"));
        assert!(!is_interpolation("plain"));
    }
}
