use serde::de::DeserializeOwned;

use crate::error::{SynthError, SynthResult};

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> SynthResult<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(into_document_error)
}

pub fn from_value_with_path<T: DeserializeOwned>(value: serde_json::Value) -> SynthResult<T> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(into_document_error)
}

fn into_document_error<E: std::fmt::Display>(err: serde_path_to_error::Error<E>) -> SynthError {
    SynthError::Document {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    }
}
