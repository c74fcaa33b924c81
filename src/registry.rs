//! Resource kinds grouped into namespaced modules.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::attrs::ValidatedAttributes;
use crate::block::{ConfigBlock, EmissionPlan};
use crate::error::{SynthError, SynthResult};
use crate::reference::{ComputedProperty, ResourceReference};
use crate::schema::ResourceSchema;

/// Everything needed to turn a raw declaration of one kind into a block and a
/// reference.
#[derive(Debug, Clone)]
pub struct ResourceKind {
    kind: String,
    schema: Arc<ResourceSchema>,
    plan: EmissionPlan,
    outputs: Vec<String>,
    computed: Vec<ComputedProperty>,
}

impl ResourceKind {
    pub fn new(schema: ResourceSchema, plan: EmissionPlan) -> Self {
        Self {
            kind: schema.name().to_string(),
            schema: Arc::new(schema),
            plan,
            outputs: vec!["id".to_string()],
            computed: Vec::new(),
        }
    }

    /// Replace the default `["id"]` output list.
    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn computed<F>(mut self, name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&ValidatedAttributes) -> Value + Send + Sync + 'static,
    {
        self.computed.push(ComputedProperty::new(name, compute));
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn computed_properties(&self) -> &[ComputedProperty] {
        &self.computed
    }

    pub fn validate(&self, raw: &Map<String, Value>) -> SynthResult<ValidatedAttributes> {
        self.schema.validate(raw)
    }

    pub fn synthesize(&self, attrs: &ValidatedAttributes) -> ConfigBlock {
        self.plan.synthesize(attrs)
    }

    pub fn reference(&self, name: &str, attrs: &ValidatedAttributes) -> ResourceReference {
        ResourceReference::emit(&self.kind, name, &self.outputs, &self.computed, attrs)
    }
}

/// The set of resource kinds one namespace contributes.
#[derive(Debug, Clone)]
pub struct ResourceModule {
    namespace: String,
    kinds: Vec<Arc<ResourceKind>>,
}

impl ResourceModule {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), kinds: Vec::new() }
    }

    pub fn kind(mut self, kind: ResourceKind) -> Self {
        self.kinds.push(Arc::new(kind));
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn kinds(&self) -> &[Arc<ResourceKind>] {
        &self.kinds
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    modules: IndexMap<String, Arc<ResourceModule>>,
    kinds: IndexMap<String, Arc<ResourceKind>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. Registering a namespace again is a no-op and
    /// returns `false`.
    pub fn register(&mut self, module: ResourceModule) -> bool {
        if self.modules.contains_key(&module.namespace) {
            debug!(namespace = %module.namespace, "namespace already registered");
            return false;
        }
        for kind in &module.kinds {
            if self.kinds.contains_key(&kind.kind) {
                warn!(
                    kind = %kind.kind,
                    namespace = %module.namespace,
                    "kind already provided by another namespace; keeping the first"
                );
                continue;
            }
            self.kinds.insert(kind.kind.clone(), kind.clone());
        }
        info!(
            namespace = %module.namespace,
            kinds = module.kinds.len(),
            "registered resource module"
        );
        self.modules.insert(module.namespace.clone(), Arc::new(module));
        true
    }

    pub fn lookup(&self, namespace: &str) -> Option<Arc<ResourceModule>> {
        self.modules.get(namespace).cloned()
    }

    pub fn resolve(&self, kind: &str) -> SynthResult<Arc<ResourceKind>> {
        self.kinds
            .get(kind)
            .cloned()
            .ok_or_else(|| SynthError::UnknownResourceKind { kind: kind.to_string() })
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn modules(&self) -> impl Iterator<Item = &Arc<ResourceModule>> {
        self.modules.values()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &Arc<ResourceKind>> {
        self.kinds.values()
    }
}
