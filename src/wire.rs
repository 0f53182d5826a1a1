//! JSON form of the values that cross the engine boundary.
//!
//! | Value | Shape |
//! |---|---|
//! | enumerations (orientation, chroma mode, modes, alpha info, ...) | numeric code |
//! | color model | string identifier |
//! | image format | `{"identifier": "jpeg", "encoded": true}` |
//! | pixel specification | attribute record `{color_model, bytes_per_pixel, alpha_info, components_order}` |
//! | crop region | tagged by `"type"`: `absolute_to_origin` / `relative_to_origin` |
//! | options, configuration, result | objects; unset fields are omitted |
//!
//! Decoding re-runs every constructor check, so a value read back from JSON
//! upholds the same invariants as one built in code, and equals the value
//! that was written.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, WireError> {
    Ok(serde_json::to_string(value)?)
}

pub fn to_json_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String, WireError> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T, WireError> {
    Ok(serde_json::from_str(json)?)
}

/// Reads a JSON document from disk.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, WireError> {
    let content = fs::read_to_string(path)?;
    from_json(&content)
}
