//! Shared plumbing for the JSON-file backed collaborator stores.

use std::path::Path;

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors that can occur while reading a persisted store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reads a JSON array from `path`.
///
/// A missing file is not an error and yields `None`.
pub(crate) async fn read_json_list<T: DeserializeOwned>(
    path: &Path,
) -> Result<Option<Vec<T>>, StoreError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&text)?))
}

/// File names are derived from actor ids, so keep them to a safe alphabet.
pub(crate) fn sanitize_actor(actor: &str) -> String {
    actor
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
