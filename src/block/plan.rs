use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::trace;

use crate::attrs::FieldSource;
use crate::reference::is_interpolation;

use super::{sanitize_key, BlockValue, ConfigBlock};

pub type Transform = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

static NULL: Value = Value::Null;

/// When a governing attribute counts as "not there" and its step is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Omit {
    /// Absent or `null`.
    Absent,
    /// Also empty strings, arrays and maps.
    #[default]
    Empty,
    /// Also `false` and zero.
    Falsy,
    /// Always emitted; an absent value is written as `null`.
    Never,
}

impl Omit {
    fn skips(self, value: Option<&Value>) -> bool {
        let Some(value) = value else {
            return self != Omit::Never;
        };
        match (self, value) {
            (Omit::Never, _) => false,
            (_, Value::Null) => true,
            (Omit::Absent, _) => false,
            (_, Value::String(s)) => s.is_empty(),
            (_, Value::Array(xs)) => xs.is_empty(),
            (_, Value::Object(m)) => m.is_empty(),
            (Omit::Falsy, Value::Bool(b)) => !b,
            (Omit::Falsy, Value::Number(n)) => n.as_f64() == Some(0.0),
            _ => false,
        }
    }
}

#[derive(Clone)]
pub enum EmitStep {
    Scalar {
        field: String,
        key: String,
        omit: Omit,
        transform: Option<Transform>,
    },
    /// Nested block from an object attribute.
    Block { field: String, key: String, plan: EmissionPlan },
    /// One nested block per element of an array attribute, in order.
    Repeated { field: String, key: String, plan: EmissionPlan },
    /// Block keyed by the (sanitized) keys of a map attribute.
    Keyed { field: String, key: String, plan: Option<EmissionPlan> },
    /// Union: only the first branch whose governing attribute is present.
    OneOf(Vec<EmitStep>),
    /// Value computed by a schema-level derived accessor.
    Derived { name: String, key: String, omit: Omit },
}

impl EmitStep {
    pub fn scalar(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::Scalar { key: field.clone(), field, omit: Omit::default(), transform: None }
    }

    pub fn block(field: impl Into<String>, plan: EmissionPlan) -> Self {
        let field = field.into();
        Self::Block { key: field.clone(), field, plan }
    }

    pub fn repeated(field: impl Into<String>, plan: EmissionPlan) -> Self {
        let field = field.into();
        Self::Repeated { key: field.clone(), field, plan }
    }

    pub fn keyed(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::Keyed { key: field.clone(), field, plan: None }
    }

    pub fn keyed_with(field: impl Into<String>, plan: EmissionPlan) -> Self {
        let field = field.into();
        Self::Keyed { key: field.clone(), field, plan: Some(plan) }
    }

    pub fn derived(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::Derived { key: name.clone(), name, omit: Omit::default() }
    }

    /// Emit under a different key than the attribute name.
    pub fn as_key(mut self, new_key: impl Into<String>) -> Self {
        match &mut self {
            Self::Scalar { key, .. }
            | Self::Block { key, .. }
            | Self::Repeated { key, .. }
            | Self::Keyed { key, .. }
            | Self::Derived { key, .. } => *key = new_key.into(),
            Self::OneOf(_) => {}
        }
        self
    }

    pub fn omit(mut self, policy: Omit) -> Self {
        match &mut self {
            Self::Scalar { omit, .. } | Self::Derived { omit, .. } => *omit = policy,
            _ => {}
        }
        self
    }

    /// Rewrite scalar values before emission. Interpolations are left alone.
    pub fn transform<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        if let Self::Scalar { transform, .. } = &mut self {
            *transform = Some(Arc::new(f));
        }
        self
    }

    fn governing_value<'a, S: FieldSource + ?Sized>(&self, source: &'a S) -> Option<&'a Value> {
        match self {
            Self::Scalar { field, .. }
            | Self::Block { field, .. }
            | Self::Repeated { field, .. }
            | Self::Keyed { field, .. } => source.field(field),
            Self::Derived { name, .. } => source.derived(name),
            Self::OneOf(branches) => branches.iter().find_map(|b| b.present_value(source)),
        }
    }

    fn present_value<'a, S: FieldSource + ?Sized>(&self, source: &'a S) -> Option<&'a Value> {
        let omit = match self {
            Self::Scalar { omit, .. } | Self::Derived { omit, .. } => *omit,
            _ => Omit::Empty,
        };
        let value = self.governing_value(source);
        if omit.skips(value) { None } else { value.or(Some(&NULL)) }
    }

    fn emit<S: FieldSource + ?Sized>(&self, source: &S, out: &mut ConfigBlock) {
        if let Self::OneOf(branches) = self {
            if let Some(branch) = branches.iter().find(|b| b.present_value(source).is_some()) {
                branch.emit(source, out);
            }
            return;
        }
        let Some(value) = self.present_value(source) else {
            return;
        };
        match self {
            Self::Scalar { key, transform, .. } => {
                let value = match transform {
                    Some(f) if !value.as_str().is_some_and(is_interpolation) => f(value),
                    _ => value.clone(),
                };
                trace!(key = %key, "emit scalar");
                out.insert(key.clone(), BlockValue::Scalar(value));
            }
            Self::Derived { key, .. } => {
                out.insert(key.clone(), BlockValue::Scalar(value.clone()));
            }
            Self::Block { key, plan, .. } => {
                if let Value::Object(fields) = value {
                    trace!(key = %key, "emit block");
                    out.insert(key.clone(), BlockValue::Block(plan.synthesize_map(fields)));
                }
            }
            Self::Repeated { key, plan, .. } => {
                let Value::Array(elements) = value else {
                    return;
                };
                let blocks: Vec<ConfigBlock> = elements
                    .iter()
                    .filter_map(Value::as_object)
                    .map(|fields| plan.synthesize_map(fields))
                    .collect();
                trace!(key = %key, count = blocks.len(), "emit repeated blocks");
                out.insert(key.clone(), BlockValue::Blocks(blocks));
            }
            Self::Keyed { key, plan, .. } => {
                let Value::Object(entries) = value else {
                    return;
                };
                let mut block = ConfigBlock::new();
                for (k, v) in entries {
                    let child = match (plan, v) {
                        (Some(plan), Value::Object(fields)) => {
                            BlockValue::Block(plan.synthesize_map(fields))
                        }
                        _ => BlockValue::Scalar(v.clone()),
                    };
                    block.insert(sanitize_key(k), child);
                }
                trace!(key = %key, "emit keyed block");
                out.insert(key.clone(), BlockValue::Block(block));
            }
            Self::OneOf(_) => {}
        }
    }
}

impl fmt::Debug for EmitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar { field, key, omit, transform } => f
                .debug_struct("Scalar")
                .field("field", field)
                .field("key", key)
                .field("omit", omit)
                .field("transform", &transform.is_some())
                .finish(),
            Self::Block { field, key, plan } => f
                .debug_struct("Block")
                .field("field", field)
                .field("key", key)
                .field("plan", plan)
                .finish(),
            Self::Repeated { field, key, plan } => f
                .debug_struct("Repeated")
                .field("field", field)
                .field("key", key)
                .field("plan", plan)
                .finish(),
            Self::Keyed { field, key, plan } => f
                .debug_struct("Keyed")
                .field("field", field)
                .field("key", key)
                .field("plan", plan)
                .finish(),
            Self::OneOf(branches) => f.debug_tuple("OneOf").field(branches).finish(),
            Self::Derived { name, key, omit } => f
                .debug_struct("Derived")
                .field("name", name)
                .field("key", key)
                .field("omit", omit)
                .finish(),
        }
    }
}

/// Ordered list of emission steps.
#[derive(Debug, Clone, Default)]
pub struct EmissionPlan {
    steps: Vec<EmitStep>,
}

impl EmissionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: EmitStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn scalar(self, field: impl Into<String>) -> Self {
        self.step(EmitStep::scalar(field))
    }

    /// Several plain scalars in one go.
    pub fn scalars<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        fields.into_iter().fold(self, |plan, f| plan.scalar(f))
    }

    pub fn block(self, field: impl Into<String>, plan: EmissionPlan) -> Self {
        self.step(EmitStep::block(field, plan))
    }

    pub fn repeated(self, field: impl Into<String>, plan: EmissionPlan) -> Self {
        self.step(EmitStep::repeated(field, plan))
    }

    pub fn keyed(self, field: impl Into<String>) -> Self {
        self.step(EmitStep::keyed(field))
    }

    pub fn one_of(self, branches: Vec<EmitStep>) -> Self {
        self.step(EmitStep::OneOf(branches))
    }

    pub fn derived(self, name: impl Into<String>) -> Self {
        self.step(EmitStep::derived(name))
    }

    pub fn steps(&self) -> &[EmitStep] {
        &self.steps
    }

    pub fn synthesize<S: FieldSource + ?Sized>(&self, source: &S) -> ConfigBlock {
        let mut out = ConfigBlock::new();
        for step in &self.steps {
            step.emit(source, &mut out);
        }
        out
    }

    fn synthesize_map(&self, fields: &Map<String, Value>) -> ConfigBlock {
        self.synthesize(fields)
    }
}
