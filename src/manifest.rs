//! The accumulated output of one synthesis run.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::block::ConfigBlock;
use crate::error::{SynthError, SynthResult};

/// `kind → name → ConfigBlock`, serialized as `{"resource": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Manifest {
    #[serde(rename = "resource")]
    resources: IndexMap<String, IndexMap<String, ConfigBlock>>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource; a second definition of the same `(kind, name)` is a
    /// caller error and leaves the manifest untouched.
    pub fn insert(&mut self, kind: &str, name: &str, block: ConfigBlock) -> SynthResult<()> {
        let names = self.resources.entry(kind.to_string()).or_default();
        if names.contains_key(name) {
            return Err(SynthError::DuplicateResourceDefinition {
                kind: kind.to_string(),
                name: name.to_string(),
            });
        }
        debug!(kind, name, "manifest insert");
        names.insert(name.to_string(), block);
        Ok(())
    }

    pub fn contains(&self, kind: &str, name: &str) -> bool {
        self.get(kind, name).is_some()
    }

    pub fn get(&self, kind: &str, name: &str) -> Option<&ConfigBlock> {
        self.resources.get(kind).and_then(|names| names.get(name))
    }

    /// Number of resources across all kinds.
    pub fn len(&self) -> usize {
        self.resources.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn to_document(&self) -> Value {
        let by_kind: Map<String, Value> = self
            .resources
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .map(|(kind, names)| {
                let by_name: Map<String, Value> = names
                    .iter()
                    .map(|(name, block)| (name.clone(), block.to_value()))
                    .collect();
                (kind.clone(), Value::Object(by_name))
            })
            .collect();
        let mut doc = Map::new();
        doc.insert("resource".to_string(), Value::Object(by_kind));
        Value::Object(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockValue;
    use serde_json::json;

    fn block(id: &str) -> ConfigBlock {
        let mut b = ConfigBlock::new();
        b.insert("id", BlockValue::Scalar(json!(id)));
        b
    }

    #[test]
    fn rejects_duplicates_without_overwriting() {
        let mut manifest = Manifest::new();
        manifest.insert("aws_sqs_queue", "jobs", block("first")).unwrap();
        let err = manifest.insert("aws_sqs_queue", "jobs", block("second")).unwrap_err();
        assert_eq!(
            err,
            SynthError::DuplicateResourceDefinition {
                kind: "aws_sqs_queue".into(),
                name: "jobs".into()
            }
        );
        assert_eq!(manifest.get("aws_sqs_queue", "jobs"), Some(&block("first")));
        // same name under another kind is fine
        manifest.insert("aws_sns_topic", "jobs", block("topic")).unwrap();
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn document_shape() {
        let mut manifest = Manifest::new();
        manifest.insert("aws_sqs_queue", "jobs", block("q")).unwrap();
        let expected = json!({"resource": {"aws_sqs_queue": {"jobs": {"id": "q"}}}});
        assert_eq!(manifest.to_document(), expected);
        assert_eq!(serde_json::to_value(&manifest).unwrap(), expected);
    }
}
