//! Run Manifests - SHA-256 Over Written Outputs
//!
//! Every batch writer reports what it wrote, with a content hash per file and
//! a manifest hash over the canonical (sorted-key) JSON of the whole report.

use base64::Engine;
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WrittenFile {
    pub id: String,
    pub filename: String,
    pub size: [u32; 2],
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepFailure {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunManifest {
    pub engine_version: String,
    pub canvas_size: u32,
    pub files: Vec<WrittenFile>,
    #[serde(default)]
    pub failures: Vec<StepFailure>,
    #[serde(default)]
    pub manifest_hash: String,
}

impl RunManifest {
    pub fn new(canvas_size: u32) -> Self {
        Self {
            engine_version: crate::ENGINE_VERSION.to_string(),
            canvas_size,
            files: vec![],
            failures: vec![],
            manifest_hash: String::new(),
        }
    }

    pub fn record_failure(&mut self, id: impl Into<String>, error: impl ToString) {
        self.failures.push(StepFailure {
            id: id.into(),
            error: error.to_string(),
        });
    }

    /// Seals the manifest. The hash covers everything except itself.
    pub fn finish(mut self) -> Result<Self> {
        self.manifest_hash = String::new();
        self.manifest_hash = compute_manifest_hash(&self)?;
        Ok(self)
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .fold(String::with_capacity(64), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        })
}

/// Compact JSON with every object's keys in sorted order.
///
/// Requires `serde_json` without `preserve_order`, so [`serde_json::Value`]
/// maps iterate by key.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_value(value)?.to_string())
}

pub fn compute_manifest_hash<T: Serialize>(manifest: &T) -> Result<String> {
    Ok(sha256_hex(canonical_json(manifest)?.as_bytes()))
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

/// Encodes `image` as PNG, writes it to `path` and describes the result.
pub fn write_png(id: &str, image: &RgbaImage, path: &Path) -> Result<WrittenFile> {
    let bytes = encode_png(image)?;
    fs::write(path, &bytes)?;
    Ok(WrittenFile {
        id: id.to_string(),
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        size: [image.width(), image.height()],
        sha256: sha256_hex(&bytes),
    })
}

/// `data:image/png;base64,...` form handed back to upload clients.
pub fn encode_data_uri(png: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    )
}
