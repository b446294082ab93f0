use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::AppError;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ModelEntry {
    pub hash: String,
    pub name: String,
    pub file: String,
}

/// Known checkpoints. Entry order is both the sort priority and the table of contents order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelTable {
    entries: Vec<ModelEntry>,
}

const BUILTIN_MODELS: &[(&str, &str, &str)] = &[
    (
        "7460a6fa",
        "stable diffusion v1.4",
        "models/Stable-diffusion/sd-v1.4.ckpt",
    ),
    (
        "08bf2ce2",
        "finetuned: epoch 000307",
        "models/Stable-diffusion/finetuned: epoch=000307.ckpt",
    ),
    (
        "9a4c6612",
        "finetuned: epoch 000461",
        "models/Stable-diffusion/epoch=000461.ckpt",
    ),
    (
        "2efa9d2e",
        "finetuned: last",
        "models/Stable-diffusion/finetuned: last.ckpt",
    ),
];

impl Default for ModelTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelTable {
    pub fn builtin() -> Self {
        let entries = BUILTIN_MODELS
            .iter()
            .map(|(hash, name, file)| ModelEntry {
                hash: hash.to_string(),
                name: name.to_string(),
                file: file.to_string(),
            })
            .collect();
        Self { entries }
    }

    pub fn new(entries: Vec<ModelEntry>) -> Result<Self, AppError> {
        if entries.is_empty() {
            return Err(AppError::Invalid("model table is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for e in &entries {
            if !seen.insert(e.hash.as_str()) {
                return Err(AppError::Invalid(format!(
                    "duplicate model hash in table: {}",
                    e.hash
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Reads a JSON array of `{ "hash", "name", "file" }` objects.
    pub fn from_json_file(path: &Path) -> Result<Self, AppError> {
        let data = fs::read(path).map_err(|source| AppError::File {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: Vec<ModelEntry> = serde_json::from_slice(&data)?;
        Self::new(entries)
    }

    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    pub fn priority(&self, hash: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.hash == hash)
    }

    pub fn get(&self, hash: &str) -> Option<&ModelEntry> {
        self.entries.iter().find(|e| e.hash == hash)
    }

    pub fn name(&self, hash: &str) -> Option<&str> {
        self.get(hash).map(|e| e.name.as_str())
    }
}
