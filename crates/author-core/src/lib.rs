#![warn(missing_docs)]
//! Author Core - Headless Kernel for Long-Form Writing
//!
//! # Overview
//!
//! `author-core` models a manuscript as an ordered collection of versioned paragraph blocks.
//! Edits go through undoable commands; plugins derive information (word counts, spelling)
//! in the background, and the kernel guarantees that a derived result is never written back
//! for a block that changed after the analysis started.
//!
//! # Core Features
//!
//! - **Versioned Blocks**: every text or type mutation bumps the block version by one
//! - **Two-Level Locking**: per-block reader/writer locks plus a collection lock for structure
//! - **Undo/Redo**: reversible commands, composites with rollback, deferred follow-up commands
//! - **Plugins**: background analyzers, immediate editors, outline observers, frameworks
//! - **Drain Barrier**: wait until every scheduled analysis has finished
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Project (commands, plugins, properties)    │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  BlockCommandSupervisor / PluginSupervisor  │  ← Execution & Dispatch
//! ├─────────────────────────────────────────────┤
//! │  BlockOwnerCollection (outline structure)   │  ← Collection Lock
//! ├─────────────────────────────────────────────┤
//! │  Block / BlockState                         │  ← Block Locks & Versions
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use author_core::{BlockPosition, InsertText, PluginRegistry, Project, SplitBlock};
//! use std::sync::Arc;
//!
//! let project = Project::new(Arc::new(PluginRegistry::new()));
//! let first = project.blocks().first().key();
//!
//! project
//!     .do_command(InsertText::new(BlockPosition::new(first, 0), "Call me Ishmael."))
//!     .unwrap();
//! let cursor = project
//!     .do_command(SplitBlock::new(BlockPosition::new(first, 8)))
//!     .unwrap()
//!     .unwrap();
//!
//! assert_eq!(project.texts(), vec!["Call me ", "Ishmael."]);
//! assert_eq!(cursor.text_index, 0);
//!
//! project.undo().unwrap();
//! assert_eq!(project.texts(), vec!["Call me Ishmael."]);
//! ```
//!
//! # Module Description
//!
//! - [`block`] - blocks, keys, positions and versioned block state
//! - [`block_type`] - the per-project block type registry
//! - [`collection`] - the ordered block collection and outline structure
//! - [`commands`] - undoable block commands
//! - [`supervisor`] - command execution and undo/redo history
//! - [`plugins`] - plugin contracts, registry and supervisor
//! - [`project`] - the project tying everything together
//!
//! # Locking
//!
//! Acquire the collection lock before any block lock, hold at most one block lock at a time,
//! and never acquire the collection lock while holding a block lock. Project properties are
//! a leaf lock.

pub mod block;
pub mod block_type;
pub mod collection;
pub mod commands;
pub mod error;
pub mod plugins;
pub mod project;
pub mod properties;
pub mod settings;
pub mod supervisor;
pub mod text_spans;

pub use block::{Block, BlockKey, BlockPosition, BlockState};
pub use block_type::{BlockType, BlockTypeSupervisor};
pub use collection::{BlockCollectionReadGuard, BlockCollectionWriteGuard, BlockOwnerCollection};
pub use commands::{
    BlockCommand, BlockCommandContext, ChangeBlockType, CommandTarget, CompositeCommand,
    DeleteBlock, DeleteText, DoTypes, InsertBlock, InsertMultilineText, InsertText, LockScope,
    Operation, ReplaceText, SetText, SplitBlock,
};
pub use error::{CommandError, PluginError, ProjectError};
pub use plugins::{
    BlockAnalyzer, BlockAnalyzerPlugin, BlockRelationshipPlugin, ImmediateEdit,
    ImmediateEditorPlugin, PluginCapabilities, PluginFrameworkPlugin, PluginRegistry,
    PluginSupervisor, ProjectPluginController, ProjectPluginProvider,
};
pub use project::{HistoryStep, Project};
pub use properties::{HierarchicalPath, PropertiesDictionary};
pub use settings::ProjectSettings;
pub use supervisor::{BlockCommandSupervisor, DEFAULT_UNDO_LIMIT};
pub use text_spans::{TextSpan, TextSpanCollection};
