//! Error types shared across the kernel.

use crate::block::BlockKey;
use thiserror::Error;

/// Errors produced while applying, undoing or redoing a block command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown block {0}")]
    /// The referenced block is not part of the project's collection.
    UnknownBlock(BlockKey),

    #[error("text index {index} is outside block {key} (length {len})")]
    /// A character index lies past the end of the block text.
    InvalidTextIndex {
        /// The block being edited.
        key: BlockKey,
        /// The offending character index.
        index: usize,
        /// Character length of the block text.
        len: usize,
    },

    #[error("invalid text range {start}..{end} in block {key}")]
    /// A character range is reversed or extends past the end of the block text.
    InvalidRange {
        /// The block being edited.
        key: BlockKey,
        /// Inclusive start character index.
        start: usize,
        /// Exclusive end character index.
        end: usize,
    },

    #[error("block index {index} is outside the collection (length {len})")]
    /// A positional index into the block collection is out of range.
    InvalidBlockIndex {
        /// The offending index.
        index: usize,
        /// Number of blocks in the collection.
        len: usize,
    },

    #[error("the last block of a project cannot be removed")]
    /// Removing the block would leave the collection empty.
    LastBlock,

    #[error("command expected a lock on block {expected} but holds {actual}")]
    /// A block-scoped command was handed the guard of a different block.
    ScopeMismatch {
        /// The block the command targets.
        expected: BlockKey,
        /// The block whose guard was supplied.
        actual: BlockKey,
    },

    #[error("command requires the collection lock")]
    /// A structural command was handed a single-block guard.
    CollectionScopeRequired,

    #[error("command failed ({source}) and rolling back also failed ({rollback})")]
    /// A composite command failed part way and could not be fully reverted.
    Rollback {
        /// The original failure.
        source: Box<CommandError>,
        /// The failure raised while reverting already-applied children.
        rollback: Box<CommandError>,
    },

    #[error(transparent)]
    /// A project-level lookup failed while executing the command.
    Project(#[from] ProjectError),
}

/// Fail-fast configuration and lookup errors.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("unknown plugin '{0}'")]
    /// No provider with this name is registered.
    UnknownPlugin(String),

    #[error("unknown block type '{0}'")]
    /// No block type with this name exists in the project.
    UnknownBlockType(String),

    #[error("block type '{0}' is a system type and cannot be removed")]
    /// System block types are permanent.
    SystemBlockType(String),

    #[error("invalid settings for plugin '{plugin}': {source}")]
    /// A plugin's settings section could not be deserialized.
    PluginSettings {
        /// The plugin key.
        plugin: String,
        /// The underlying deserialization error.
        source: serde_json::Error,
    },
}

/// Failure reported by an analyzer plugin.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("{plugin}: {message}")]
    /// The plugin could not complete its analysis.
    Analysis {
        /// The plugin key.
        plugin: String,
        /// Human readable reason.
        message: String,
    },
}

impl PluginError {
    /// Build an [`PluginError::Analysis`] value.
    pub fn analysis(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        PluginError::Analysis {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}
