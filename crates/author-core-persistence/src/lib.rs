#![warn(missing_docs)]
//! Directory-based JSON persistence for `author-core` projects.
//!
//! A project directory holds three files:
//!
//! - `project.json` - [`ProjectSettings`] and user-defined block types
//! - `content.json` - the blocks in order, as `{ "type": ..., "text": ... }`
//! - `metadata.json` - project properties, and per block the SHA-256 of its text with the
//!   properties and text spans plugins derived from it
//!
//! Metadata is a cache. On load it is applied only if every block hash matches the loaded
//! text; otherwise all of it is dropped and the plugins rebuild it. Either way every block is
//! re-analyzed after loading.
//!
//! ```rust
//! use author_core::{PluginRegistry, Project, SetText};
//! use std::sync::Arc;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let registry = Arc::new(PluginRegistry::new());
//!
//! let project = Project::new(registry.clone());
//! let key = project.blocks().first().key();
//! project.do_command(SetText::new(key, "Call me Ishmael.")).unwrap();
//! author_core_persistence::save(&project, dir.path()).unwrap();
//!
//! let (loaded, report) = author_core_persistence::load(registry, dir.path()).unwrap();
//! assert_eq!(loaded.texts(), vec!["Call me Ishmael."]);
//! assert_eq!(report.blocks, 1);
//! ```

mod error;
mod format;

pub use error::PersistenceError;
pub use format::content_hash;

use author_core::{Block, PluginRegistry, Project, ProjectSettings};
use format::{
    BlockMetadata, CONTENT_FILE, ContentRecord, METADATA_FILE, MetadataFile, PROJECT_FILE,
    ProjectFile, read_json, write_json,
};
use log::{debug, warn};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// What happened to `metadata.json` during a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataStatus {
    /// Every block matched; properties and spans were restored.
    Applied,
    /// There was no metadata file.
    Missing,
    /// The file exists but could not be parsed.
    Unreadable,
    /// The file describes a different number of blocks.
    BlockCountMismatch {
        /// Blocks in `content.json`.
        content: usize,
        /// Block entries in `metadata.json`.
        metadata: usize,
    },
    /// The block at `index` was edited outside the application.
    HashMismatch {
        /// Index of the first mismatching block.
        index: usize,
    },
}

/// Outcome of [`load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Number of blocks loaded.
    pub blocks: usize,
    /// Whether cached metadata was used.
    pub metadata: MetadataStatus,
}

/// Write `project` to `dir`, creating it if needed.
///
/// Waits for pending block analysis first so the saved metadata matches the saved text.
pub fn save(project: &Project, dir: &Path) -> Result<(), PersistenceError> {
    project.wait_for_block_analyzers();
    fs::create_dir_all(dir).map_err(|source| PersistenceError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let project_file = ProjectFile {
        settings: project.settings().clone(),
        block_types: ProjectFile::user_block_types(project.block_types()),
    };

    let (content, metadata) = {
        let blocks = project.blocks().read();
        let mut content = Vec::with_capacity(blocks.len());
        let mut metadata = MetadataFile {
            properties: project.properties().clone(),
            blocks: Vec::with_capacity(blocks.len()),
        };
        for block in blocks.iter() {
            let state = block.read();
            content.push(ContentRecord {
                block_type: state.block_type().name().to_string(),
                text: state.text().to_string(),
            });
            drop(state);
            metadata.blocks.push(BlockMetadata::capture(block));
        }
        (content, metadata)
    };

    write_json(&dir.join(PROJECT_FILE), &project_file)?;
    write_json(&dir.join(CONTENT_FILE), &content)?;
    write_json(&dir.join(METADATA_FILE), &metadata)?;
    debug!("saved {} blocks to '{}'", content.len(), dir.display());
    Ok(())
}

/// Load the project stored in `dir`, resolving its plugins through `registry`.
///
/// Unknown plugins or block types fail the load. Bad metadata does not; see
/// [`LoadReport::metadata`].
pub fn load(
    registry: Arc<PluginRegistry>,
    dir: &Path,
) -> Result<(Arc<Project>, LoadReport), PersistenceError> {
    let project_file: ProjectFile = read_json(&dir.join(PROJECT_FILE))?;
    let project = Project::with_settings(registry, project_file.settings)?;
    for block_type in &project_file.block_types {
        project
            .block_types()
            .add(&block_type.name, block_type.structural);
    }

    let content: Vec<ContentRecord> = read_json(&dir.join(CONTENT_FILE))?;
    let blocks = content
        .iter()
        .map(|record| -> Result<Arc<Block>, PersistenceError> {
            let block_type = project.block_types().get(&record.block_type)?;
            Ok(Block::new(block_type, record.text.as_str()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if !blocks.is_empty() {
        project.replace_blocks(blocks.clone())?;
    }

    let metadata = apply_metadata(&project, &blocks, &dir.join(METADATA_FILE));
    if metadata != MetadataStatus::Applied {
        warn!("ignoring metadata in '{}': {metadata:?}", dir.display());
    }

    project.reanalyze_all();
    debug!("loaded {} blocks from '{}'", blocks.len(), dir.display());
    let report = LoadReport {
        blocks: blocks.len(),
        metadata,
    };
    Ok((project, report))
}

/// Restore cached metadata onto freshly loaded blocks, all or nothing.
fn apply_metadata(project: &Project, blocks: &[Arc<Block>], path: &Path) -> MetadataStatus {
    if !path.exists() {
        return MetadataStatus::Missing;
    }
    let metadata: MetadataFile = match read_json(path) {
        Ok(metadata) => metadata,
        Err(err) => {
            warn!("{err}");
            return MetadataStatus::Unreadable;
        }
    };
    if metadata.blocks.len() != blocks.len() {
        return MetadataStatus::BlockCountMismatch {
            content: blocks.len(),
            metadata: metadata.blocks.len(),
        };
    }
    if let Some(index) = blocks
        .iter()
        .zip(&metadata.blocks)
        .position(|(block, cached)| content_hash(block.read().text()) != cached.hash)
    {
        return MetadataStatus::HashMismatch { index };
    }

    for (block, cached) in blocks.iter().zip(metadata.blocks) {
        let mut state = block.write();
        *state.properties_mut() = cached.properties;
        *state.text_spans_mut() = cached.text_spans;
    }
    *project.properties_mut() = metadata.properties;
    MetadataStatus::Applied
}

/// Settings stored in `dir`, without building the project.
pub fn read_settings(dir: &Path) -> Result<ProjectSettings, PersistenceError> {
    let project_file: ProjectFile = read_json(&dir.join(PROJECT_FILE))?;
    Ok(project_file.settings)
}
