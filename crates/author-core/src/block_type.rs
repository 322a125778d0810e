//! Project-scoped block type registry.
//!
//! Block types are interned by name: every block of type "Chapter" in a project points at the
//! same [`BlockType`] value. Structural types take part in the document outline; see
//! [`crate::collection`] for how parents are derived from them.

use crate::error::ProjectError;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Name of the system chapter type.
pub const CHAPTER: &str = "Chapter";
/// Name of the system scene type.
pub const SCENE: &str = "Scene";
/// Name of the system epigraph type.
pub const EPIGRAPH: &str = "Epigraph";
/// Name of the system epigraph attribution type.
pub const EPIGRAPH_ATTRIBUTION: &str = "Epigraph Attribution";
/// Name of the system paragraph type.
pub const PARAGRAPH: &str = "Paragraph";

/// Outline depth assigned to user-defined structural types.
pub const DEFAULT_OUTLINE_DEPTH: u8 = 2;

/// A named kind of block.
pub struct BlockType {
    name: String,
    is_system: bool,
    is_structural: AtomicBool,
    outline_depth: u8,
}

impl BlockType {
    fn new(name: &str, is_system: bool, is_structural: bool, outline_depth: u8) -> Self {
        Self {
            name: name.to_string(),
            is_system,
            is_structural: AtomicBool::new(is_structural),
            outline_depth,
        }
    }

    /// The interned name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// System types are registered by the project itself and cannot be removed.
    pub fn is_system(&self) -> bool {
        self.is_system
    }

    /// Structural types open a new level in the document outline.
    pub fn is_structural(&self) -> bool {
        self.is_structural.load(Ordering::Acquire)
    }

    /// Outline depth for structural types (0 = top level); `None` for leaf types.
    pub fn outline_depth(&self) -> Option<u8> {
        self.is_structural().then_some(self.outline_depth)
    }
}

impl fmt::Debug for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockType")
            .field("name", &self.name)
            .field("is_system", &self.is_system)
            .field("is_structural", &self.is_structural())
            .finish()
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl PartialEq for BlockType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for BlockType {}

/// Registry of the block types available in one project.
#[derive(Debug)]
pub struct BlockTypeSupervisor {
    types: RwLock<BTreeMap<String, Arc<BlockType>>>,
    chapter: Arc<BlockType>,
    scene: Arc<BlockType>,
    epigraph: Arc<BlockType>,
    epigraph_attribution: Arc<BlockType>,
    paragraph: Arc<BlockType>,
}

impl Default for BlockTypeSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockTypeSupervisor {
    /// Create a registry containing the system types.
    pub fn new() -> Self {
        let chapter = Arc::new(BlockType::new(CHAPTER, true, true, 0));
        let scene = Arc::new(BlockType::new(SCENE, true, true, 1));
        let epigraph = Arc::new(BlockType::new(EPIGRAPH, true, false, 0));
        let epigraph_attribution = Arc::new(BlockType::new(EPIGRAPH_ATTRIBUTION, true, false, 0));
        let paragraph = Arc::new(BlockType::new(PARAGRAPH, true, false, 0));

        let types = [&chapter, &scene, &epigraph, &epigraph_attribution, &paragraph]
            .into_iter()
            .map(|t| (t.name().to_string(), t.clone()))
            .collect();

        Self {
            types: RwLock::new(types),
            chapter,
            scene,
            epigraph,
            epigraph_attribution,
            paragraph,
        }
    }

    /// Intern a user type. Returns the existing type if `name` is already registered.
    pub fn add(&self, name: &str, is_structural: bool) -> Arc<BlockType> {
        self.types
            .write()
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(BlockType::new(
                    name,
                    false,
                    is_structural,
                    DEFAULT_OUTLINE_DEPTH,
                ))
            })
            .clone()
    }

    /// Look up a type by name.
    pub fn get(&self, name: &str) -> Result<Arc<BlockType>, ProjectError> {
        self.types
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ProjectError::UnknownBlockType(name.to_string()))
    }

    /// `true` if a type with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.types.read().contains_key(name)
    }

    /// Remove a user type. Returns `false` if no such type exists.
    pub fn remove(&self, name: &str) -> Result<bool, ProjectError> {
        let mut types = self.types.write();
        match types.get(name) {
            Some(block_type) if block_type.is_system() => {
                Err(ProjectError::SystemBlockType(name.to_string()))
            }
            Some(_) => {
                types.remove(name);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Change whether a type takes part in the outline.
    ///
    /// Callers are responsible for recomputing the outline afterwards.
    pub fn set_structural(&self, name: &str, is_structural: bool) -> Result<(), ProjectError> {
        let block_type = self.get(name)?;
        block_type
            .is_structural
            .store(is_structural, Ordering::Release);
        Ok(())
    }

    /// All registered type names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.types.read().keys().cloned().collect()
    }

    /// The system paragraph type.
    pub fn paragraph(&self) -> Arc<BlockType> {
        self.paragraph.clone()
    }

    /// The system chapter type.
    pub fn chapter(&self) -> Arc<BlockType> {
        self.chapter.clone()
    }

    /// The system scene type.
    pub fn scene(&self) -> Arc<BlockType> {
        self.scene.clone()
    }

    /// The system epigraph type.
    pub fn epigraph(&self) -> Arc<BlockType> {
        self.epigraph.clone()
    }

    /// The system epigraph attribution type.
    pub fn epigraph_attribution(&self) -> Arc<BlockType> {
        self.epigraph_attribution.clone()
    }
}
