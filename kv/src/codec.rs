//! JSON value codec for structured values.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{KVError, KVResult};

/// Encode an object as compact JSON text.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> KVResult<String> {
    serde_json::to_string(value).map_err(|e| KVError::Encode(e.to_string()))
}

/// Decode JSON text into `T`.
pub fn decode<T: DeserializeOwned>(data: &str) -> KVResult<T> {
    serde_json::from_str(data).map_err(|e| KVError::Decode(e.to_string()))
}
