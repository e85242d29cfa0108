//! On-disk artifact envelope.
//!
//! Each training artifact is a JSON document of the form
//! `{format_version, kind, run_id, created_at, checksum, payload}` where
//! `checksum` is the BLAKE3 hash of the payload's serialized bytes.

use crate::errors::{ArtifactKind, ChurnError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// Envelope layout version written by this build
pub const FORMAT_VERSION: u32 = 1;

/// Identity of the training run that produced an artifact set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl RunInfo {
    /// Fresh identity for a new training run
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }
}

impl Default for RunInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope<P> {
    format_version: u32,
    kind: ArtifactKind,
    run_id: Uuid,
    created_at: DateTime<Utc>,
    checksum: String,
    payload: P,
}

/// A verified artifact read from disk
#[derive(Debug, Clone)]
pub struct Artifact<T> {
    pub run: RunInfo,
    pub checksum: String,
    pub payload: T,
}

fn checksum(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Write `payload` wrapped in an envelope; returns the payload checksum
pub fn save<T: Serialize>(
    path: &Path,
    kind: ArtifactKind,
    run: &RunInfo,
    payload: &T,
) -> Result<String> {
    let raw = serde_json::value::to_raw_value(payload)?;
    let checksum = checksum(raw.get().as_bytes());

    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        kind,
        run_id: run.run_id,
        created_at: run.created_at,
        checksum: checksum.clone(),
        payload: &*raw,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&envelope)?)?;

    debug!(%kind, path = %path.display(), checksum = %checksum, "Artifact written");
    Ok(checksum)
}

/// Read and verify an artifact of the given kind
pub fn load<T: DeserializeOwned>(path: &Path, kind: ArtifactKind) -> Result<Artifact<T>> {
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ChurnError::ArtifactNotFound {
            kind,
            path: path.to_path_buf(),
        },
        _ => ChurnError::Io(e),
    })?;

    let invalid = |reason: String| ChurnError::InvalidArtifact { kind, reason };

    let envelope: Envelope<Box<RawValue>> =
        serde_json::from_str(&text).map_err(|e| invalid(format!("malformed envelope: {e}")))?;

    if envelope.format_version != FORMAT_VERSION {
        return Err(invalid(format!(
            "unsupported format version {} (expected {FORMAT_VERSION})",
            envelope.format_version
        )));
    }
    if envelope.kind != kind {
        return Err(invalid(format!("file holds a {} artifact", envelope.kind)));
    }

    let actual = checksum(envelope.payload.get().as_bytes());
    if actual != envelope.checksum {
        return Err(invalid(format!(
            "checksum mismatch (recorded {}, computed {actual})",
            envelope.checksum
        )));
    }

    let payload = serde_json::from_str(envelope.payload.get())
        .map_err(|e| invalid(format!("malformed payload: {e}")))?;

    Ok(Artifact {
        run: RunInfo {
            run_id: envelope.run_id,
            created_at: envelope.created_at,
        },
        checksum: actual,
        payload,
    })
}
