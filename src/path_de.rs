use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::DecodeError;

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, DecodeError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(into_decode_error)
}

/// Same as [`from_str_with_path`] for an already parsed value (e.g. a result row).
pub fn from_value_with_path<T: DeserializeOwned>(value: Value) -> Result<T, DecodeError> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(into_decode_error)
}

fn into_decode_error<E: std::fmt::Display>(err: serde_path_to_error::Error<E>) -> DecodeError {
    let path = err.path().to_string();
    DecodeError { path, message: err.into_inner().to_string() }
}
