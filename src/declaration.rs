//! Host-side resource declarations.
//!
//! A declaration document is either `{"resources": [...]}` or a bare array of
//! declarations; NDJSON input carries one declaration per line.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SynthError, SynthResult};
use crate::path_de::{from_str_with_path, from_value_with_path};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Declaration {
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        attributes: Map<String, Value>,
    ) -> Self {
        Self { kind: kind.into(), name: name.into(), attributes }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Wrapped {
    resources: Vec<Declaration>,
}

/// Parse a whole declaration document.
pub fn parse_document(value: Value) -> SynthResult<Vec<Declaration>> {
    // pick the shape up front; untagged enums would lose the failing path
    if value.is_array() {
        from_value_with_path::<Vec<Declaration>>(value)
    } else {
        from_value_with_path::<Wrapped>(value).map(|doc| doc.resources)
    }
}

/// Parse a whole declaration document from source text.
pub fn parse_document_str(src: &str, pointer: Option<&str>) -> SynthResult<Vec<Declaration>> {
    let value = from_str_with_path::<Value>(src)?;
    parse_document(select(value, pointer)?)
}

/// Parse newline-delimited declarations, skipping blank lines.
///
/// With a `pointer`, each line's declaration is the node it selects. Errors
/// carry the 1-based line number.
pub fn parse_ndjson(src: &str, pointer: Option<&str>) -> SynthResult<Vec<Declaration>> {
    src.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            from_str_with_path::<Value>(line)
                .and_then(|value| select(value, pointer))
                .and_then(from_value_with_path::<Declaration>)
                .map_err(|error| SynthError::Line { line: index + 1, error: Box::new(error) })
        })
        .collect()
}

/// The node `pointer` selects (RFC 6901), or the whole value without one.
pub fn select(value: Value, pointer: Option<&str>) -> SynthResult<Value> {
    let Some(pointer) = pointer else {
        return Ok(value);
    };
    value.pointer(pointer).cloned().ok_or_else(|| SynthError::Document {
        path: pointer.to_string(),
        message: "json pointer selects nothing".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wrapped_and_bare_documents() {
        let wrapped = json!({"resources": [{"kind": "k", "name": "a", "attributes": {"x": 1}}]});
        let bare = json!([{"kind": "k", "name": "a", "attributes": {"x": 1}}]);
        assert_eq!(parse_document(wrapped).unwrap(), parse_document(bare).unwrap());
    }

    #[test]
    fn attributes_default_to_empty() {
        let decls = parse_document(json!([{"kind": "k", "name": "a"}])).unwrap();
        assert!(decls[0].attributes.is_empty());
    }

    #[test]
    fn errors_carry_the_json_path() {
        let doc = json!([{"kind": "k", "name": "a"}, {"kind": "k", "name": 3}]);
        let err = parse_document(doc).unwrap_err();
        match err {
            SynthError::Document { path, .. } => assert_eq!(path, "[1].name"),
            other => panic!("unexpected error: {other}"),
        }

        let err = parse_document(json!({"resources": [{"kind": "k"}]})).unwrap_err();
        assert!(matches!(
            err,
            SynthError::Document { ref path, .. } if path.starts_with("resources[0]")
        ));
    }

    #[test]
    fn ndjson_lines() {
        let src = "{\"kind\":\"k\",\"name\":\"a\"}\n\n{\"kind\":\"k\",\"name\":\"b\"}\n";
        let decls = parse_ndjson(src, None).unwrap();
        assert_eq!(decls.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn ndjson_errors_carry_the_line() {
        let src = "{\"kind\":\"k\",\"name\":\"a\"}\n\n{\"kind\":\"k\"}\n";
        match parse_ndjson(src, None).unwrap_err() {
            SynthError::Line { line, error } => {
                assert_eq!(line, 3);
                assert!(matches!(*error, SynthError::Document { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn pointers_select_the_declarations() {
        let doc = r#"{"stack": {"resources": [{"kind": "k", "name": "a"}]}}"#;
        assert_eq!(parse_document_str(doc, Some("/stack")).unwrap().len(), 1);
        assert!(matches!(
            parse_document_str(doc, Some("/missing")),
            Err(SynthError::Document { ref path, .. }) if path == "/missing"
        ));

        let lines = "{\"event\": {\"kind\": \"k\", \"name\": \"a\"}}\n";
        assert_eq!(parse_ndjson(lines, Some("/event")).unwrap()[0].name, "a");
    }
}
