//! # Live Block Graph
//!
//! The editor owns the live graph. The compiler sees it only through the
//! [`Workspace`] trait: it reads types, fields and connections, and writes
//! back nothing but constructor names, disablement reasons and warnings.

mod memory;

pub use memory::MemoryWorkspace;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Stable identity of a live block, assigned by the editor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Capability-limited view of the editor's block graph.
pub trait Workspace {
    /// Every live block, in creation order.
    fn block_ids(&self) -> Vec<BlockId>;

    /// Blocks without a parent, in the editor's order.
    fn top_blocks(&self) -> Vec<BlockId>;

    fn block_type(&self, id: &BlockId) -> Option<String>;

    fn field_value(&self, id: &BlockId, field: &str) -> Option<String>;

    fn set_field_value(&mut self, id: &BlockId, field: &str, value: &str);

    /// Block plugged into the named value or statement input.
    fn input_target(&self, id: &BlockId, input: &str) -> Option<BlockId>;

    /// Block attached below a statement block.
    fn next_block(&self, id: &BlockId) -> Option<BlockId>;

    /// Enclosing block: the block whose input or next connection holds `id`.
    fn parent(&self, id: &BlockId) -> Option<BlockId>;

    fn has_disabled_reason(&self, id: &BlockId, reason: &str) -> bool;

    fn set_disabled_reason(&mut self, id: &BlockId, reason: &str, disabled: bool);

    /// Whether any disablement reason is set.
    fn is_disabled(&self, id: &BlockId) -> bool;

    fn warning(&self, id: &BlockId, key: &str) -> Option<String>;

    /// Set or clear (`None`) the warning registered under `key`.
    fn set_warning(&mut self, id: &BlockId, key: &str, text: Option<String>);

    /// Topmost ancestor through parent links. A parent cycle ends the walk
    /// at the last block before it repeats.
    fn root(&self, id: &BlockId) -> BlockId {
        let mut seen = HashSet::new();
        let mut current = id.clone();
        seen.insert(current.clone());
        while let Some(parent) = self.parent(&current) {
            if !seen.insert(parent.clone()) {
                break;
            }
            current = parent;
        }
        current
    }

    fn blocks_of_type(&self, block_type: &str) -> Vec<BlockId> {
        self.block_ids()
            .into_iter()
            .filter(|id| self.block_type(id).as_deref() == Some(block_type))
            .collect()
    }
}

/// Structural events the editor forwards to the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEvent {
    Create { ids: Vec<BlockId> },
    Delete { ids: Vec<BlockId> },
    Move { id: BlockId },
    Change {
        id: BlockId,
        field: String,
        old_value: Option<String>,
        new_value: Option<String>,
    },
}

impl WorkspaceEvent {
    pub fn is_create(&self) -> bool {
        matches!(self, WorkspaceEvent::Create { .. })
    }
}

/// Palette operations the tidy rule needs from the editor.
pub trait ToolboxView {
    fn collapse_all(&mut self);
    fn clear_selection(&mut self);
}
