//! On-disk records.

use crate::PersistenceError;
use author_core::{
    Block, BlockTypeSupervisor, ProjectSettings, PropertiesDictionary, TextSpanCollection,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

pub(crate) const PROJECT_FILE: &str = "project.json";
pub(crate) const CONTENT_FILE: &str = "content.json";
pub(crate) const METADATA_FILE: &str = "metadata.json";

/// A user-defined block type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct BlockTypeRecord {
    pub name: String,
    #[serde(default)]
    pub structural: bool,
}

/// `project.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ProjectFile {
    pub settings: ProjectSettings,
    pub block_types: Vec<BlockTypeRecord>,
}

impl ProjectFile {
    pub fn user_block_types(types: &BlockTypeSupervisor) -> Vec<BlockTypeRecord> {
        types
            .names()
            .into_iter()
            .filter_map(|name| {
                let block_type = types.get(&name).ok()?;
                (!block_type.is_system()).then(|| BlockTypeRecord {
                    structural: block_type.is_structural(),
                    name,
                })
            })
            .collect()
    }
}

/// One entry of `content.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ContentRecord {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: String,
}

/// One block entry of `metadata.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct BlockMetadata {
    pub hash: String,
    pub properties: PropertiesDictionary,
    pub text_spans: TextSpanCollection,
}

impl BlockMetadata {
    pub fn capture(block: &Block) -> Self {
        let state = block.read();
        Self {
            hash: content_hash(state.text()),
            properties: state.properties().clone(),
            text_spans: state.text_spans().clone(),
        }
    }
}

/// `metadata.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct MetadataFile {
    pub properties: PropertiesDictionary,
    pub blocks: Vec<BlockMetadata>,
}

/// SHA-256 of `text`, hex encoded.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PersistenceError> {
    let bytes = fs::read(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, bytes).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })
}
