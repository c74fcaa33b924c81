//! One synthesis run: a registry, a manifest, and the validate → synthesize →
//! emit pipeline between them.
//!
//! Both accumulators sit behind locks so a `&Session` can be shared with
//! worker threads; every mutation of either map goes through its exclusive
//! section.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::block::ConfigBlock;
use crate::declaration::Declaration;
use crate::error::{SynthError, SynthResult};
use crate::manifest::Manifest;
use crate::reference::ResourceReference;
use crate::registry::{Registry, ResourceKind, ResourceModule};

static RESOURCE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("static regex"));

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Validate and synthesize batch declarations on the rayon pool.
    pub parallel: bool,
    /// Reject resource names that are not valid block identifiers.
    pub validate_names: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { parallel: true, validate_names: true }
    }
}

/// A declaration that passed every check and is ready to be committed.
#[derive(Debug)]
struct Prepared {
    kind: String,
    name: String,
    block: ConfigBlock,
    reference: ResourceReference,
}

#[derive(Debug, Default)]
pub struct Session {
    config: SessionConfig,
    registry: RwLock<Registry>,
    manifest: Mutex<Manifest>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self { config, registry: RwLock::default(), manifest: Mutex::default() }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn register(&self, module: ResourceModule) -> bool {
        self.registry.write().unwrap_or_else(PoisonError::into_inner).register(module)
    }

    pub fn lookup(&self, namespace: &str) -> Option<Arc<ResourceModule>> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner).lookup(namespace)
    }

    pub fn resolve(&self, kind: &str) -> SynthResult<Arc<ResourceKind>> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner).resolve(kind)
    }

    pub fn modules(&self) -> Vec<Arc<ResourceModule>> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner).modules().cloned().collect()
    }

    /// Every registered kind, in registration order.
    pub fn kinds(&self) -> Vec<Arc<ResourceKind>> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner).kinds().cloned().collect()
    }

    /// Validate, synthesize and commit one resource.
    pub fn declare(
        &self,
        kind: &str,
        name: &str,
        raw: &Map<String, Value>,
    ) -> SynthResult<ResourceReference> {
        let prepared = self.prepare(kind, name, raw)?;
        self.commit(prepared)
    }

    /// Run the pipeline without touching the manifest.
    pub fn check(
        &self,
        kind: &str,
        name: &str,
        raw: &Map<String, Value>,
    ) -> SynthResult<ResourceReference> {
        self.prepare(kind, name, raw).map(|p| p.reference)
    }

    /// Declare a batch in order, stopping at the first failure.
    ///
    /// With `parallel` set, preparation fans out over rayon; commits still
    /// happen one at a time in declaration order, so the error reported and
    /// the resources committed before it match a sequential run.
    pub fn declare_all(&self, declarations: &[Declaration]) -> SynthResult<Vec<ResourceReference>> {
        let references = if self.config.parallel {
            let prepared: Vec<SynthResult<Prepared>> = declarations
                .par_iter()
                .map(|d| self.prepare(&d.kind, &d.name, &d.attributes))
                .collect();
            prepared
                .into_iter()
                .map(|p| p.and_then(|p| self.commit(p)))
                .collect::<SynthResult<Vec<_>>>()?
        } else {
            declarations
                .iter()
                .map(|d| self.declare(&d.kind, &d.name, &d.attributes))
                .collect::<SynthResult<Vec<_>>>()?
        };
        info!(count = references.len(), parallel = self.config.parallel, "declared resources");
        Ok(references)
    }

    /// Snapshot of the manifest so far.
    pub fn manifest(&self) -> Manifest {
        self.lock_manifest().clone()
    }

    pub fn into_manifest(self) -> Manifest {
        self.manifest.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn document(&self) -> Value {
        self.lock_manifest().to_document()
    }

    fn prepare(&self, kind: &str, name: &str, raw: &Map<String, Value>) -> SynthResult<Prepared> {
        let resource = self.resolve(kind)?;
        if self.config.validate_names && !RESOURCE_NAME.is_match(name) {
            return Err(SynthError::InvalidResourceName {
                name: name.to_string(),
                reason: "must start with a letter or underscore and contain only [A-Za-z0-9_-]"
                    .to_string(),
            });
        }
        let attrs = resource.validate(raw)?;
        let block = resource.synthesize(&attrs);
        let reference = resource.reference(name, &attrs);
        debug!(kind, name, keys = block.len(), "prepared resource");
        Ok(Prepared { kind: kind.to_string(), name: name.to_string(), block, reference })
    }

    fn commit(&self, prepared: Prepared) -> SynthResult<ResourceReference> {
        let Prepared { kind, name, block, reference } = prepared;
        self.lock_manifest().insert(&kind, &name, block)?;
        Ok(reference)
    }

    fn lock_manifest(&self) -> MutexGuard<'_, Manifest> {
        self.manifest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::EmissionPlan;
    use crate::descriptor::TypeDescriptor;
    use crate::schema::{AttributeSpec, ResourceSchema};
    use serde_json::json;

    fn queue_module() -> ResourceModule {
        let schema = ResourceSchema::new("aws_sqs_queue")
            .attribute(AttributeSpec::required("name", TypeDescriptor::string()))
            .attribute(AttributeSpec::optional("delay_seconds", TypeDescriptor::integer()));
        let plan = EmissionPlan::new().scalars(["name", "delay_seconds"]);
        ResourceModule::new("aws.sqs")
            .kind(ResourceKind::new(schema, plan).with_outputs(["id", "arn", "url"]))
    }

    fn attrs(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("fixture must be an object"),
        }
    }

    fn session(parallel: bool) -> Session {
        let session = Session::new(SessionConfig { parallel, ..SessionConfig::default() });
        session.register(queue_module());
        session
    }

    #[test]
    fn declare_commits_and_returns_reference() {
        let session = session(false);
        let r = session.declare("aws_sqs_queue", "jobs", &attrs(json!({"name": "jobs"}))).unwrap();
        assert_eq!(r.output("url"), Some("${aws_sqs_queue.jobs.url}"));
        assert_eq!(
            session.document(),
            json!({"resource": {"aws_sqs_queue": {"jobs": {"name": "jobs"}}}})
        );
    }

    #[test]
    fn duplicate_declaration_is_rejected() {
        let session = session(false);
        session.declare("aws_sqs_queue", "jobs", &attrs(json!({"name": "a"}))).unwrap();
        let err = session
            .declare("aws_sqs_queue", "jobs", &attrs(json!({"name": "b"})))
            .unwrap_err();
        assert_eq!(
            err,
            SynthError::DuplicateResourceDefinition {
                kind: "aws_sqs_queue".into(),
                name: "jobs".into()
            }
        );
        assert_eq!(session.manifest().len(), 1);
    }

    #[test]
    fn invalid_input_adds_nothing() {
        let session = session(false);
        let err = session
            .declare("aws_sqs_queue", "jobs", &attrs(json!({"delay_seconds": 5})))
            .unwrap_err();
        assert_eq!(err, SynthError::missing("name"));
        assert!(session.manifest().is_empty());
    }

    #[test]
    fn check_does_not_commit() {
        let session = session(false);
        session.check("aws_sqs_queue", "jobs", &attrs(json!({"name": "a"}))).unwrap();
        assert!(session.manifest().is_empty());
    }

    #[test]
    fn names_and_kinds_are_checked() {
        let session = session(false);
        assert!(matches!(
            session.declare("aws_sqs_queue", "9lives", &attrs(json!({"name": "a"}))),
            Err(SynthError::InvalidResourceName { .. })
        ));
        assert!(matches!(
            session.declare("aws_sns_topic", "t", &attrs(json!({}))),
            Err(SynthError::UnknownResourceKind { .. })
        ));
    }

    #[test]
    fn batches_stop_at_first_failure_in_order() {
        for parallel in [false, true] {
            let session = session(parallel);
            let decls = vec![
                Declaration::new("aws_sqs_queue", "a", attrs(json!({"name": "a"}))),
                Declaration::new("aws_sqs_queue", "b", attrs(json!({"name": 1}))),
                Declaration::new("aws_sqs_queue", "c", attrs(json!({}))),
            ];
            let err = session.declare_all(&decls).unwrap_err();
            assert!(matches!(err, SynthError::TypeMismatch { ref field, .. } if field == "name"));
            let manifest = session.manifest();
            assert!(manifest.contains("aws_sqs_queue", "a"));
            assert!(!manifest.contains("aws_sqs_queue", "c"));
        }
    }

    #[test]
    fn parallel_and_sequential_documents_match() {
        let decls: Vec<_> = (0..32)
            .map(|i| {
                let name = format!("q{i}");
                let input = attrs(json!({"name": name, "delay_seconds": i}));
                Declaration::new("aws_sqs_queue", name, input)
            })
            .collect();
        let a = session(true);
        let b = session(false);
        a.declare_all(&decls).unwrap();
        b.declare_all(&decls).unwrap();
        assert_eq!(
            serde_json::to_string(&a.document()).unwrap(),
            serde_json::to_string(&b.document()).unwrap()
        );
    }

    #[test]
    fn sessions_are_independent() {
        let a = session(false);
        let b = session(false);
        a.declare("aws_sqs_queue", "jobs", &attrs(json!({"name": "a"}))).unwrap();
        b.declare("aws_sqs_queue", "jobs", &attrs(json!({"name": "b"}))).unwrap();
        assert_eq!(a.manifest().len(), 1);
        assert_eq!(b.manifest().len(), 1);
    }
}
