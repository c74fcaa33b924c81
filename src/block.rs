//! Nested configuration blocks and their synthesis.
//!
//! A `ConfigBlock` is the declarative representation of one resource's
//! configuration. It is ordered: keys appear in the order the emission plan
//! produced them, so equal inputs serialize to byte-identical documents.
pub mod plan;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

pub use plan::{EmissionPlan, EmitStep, Omit};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BlockValue {
    Scalar(Value),
    Block(ConfigBlock),
    Blocks(Vec<ConfigBlock>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConfigBlock {
    entries: IndexMap<String, BlockValue>,
}

impl ConfigBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: BlockValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&BlockValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_value()))
            .collect();
        Value::Object(map)
    }
}

impl BlockValue {
    pub fn to_value(&self) -> Value {
        match self {
            Self::Scalar(v) => v.clone(),
            Self::Block(b) => b.to_value(),
            Self::Blocks(bs) => Value::Array(bs.iter().map(ConfigBlock::to_value).collect()),
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&ConfigBlock> {
        match self {
            Self::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_blocks(&self) -> Option<&[ConfigBlock]> {
        match self {
            Self::Blocks(bs) => Some(bs),
            _ => None,
        }
    }
}

static INVALID_KEY_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("static regex"));

/// Turn an arbitrary map key (a tag name, say) into a valid block key.
pub fn sanitize_key(key: &str) -> String {
    let mut out = INVALID_KEY_CHARS.replace_all(key.trim(), "_").into_owned();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
