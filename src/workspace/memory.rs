use super::{BlockId, Workspace};
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
struct MemoryBlock {
    block_type: String,
    fields: IndexMap<String, String>,
    inputs: IndexMap<String, BlockId>,
    next: Option<BlockId>,
    parent: Option<BlockId>,
    disabled: BTreeSet<String>,
    warnings: BTreeMap<String, String>,
}

/// Owned block graph for hosts without an object model of their own, and
/// for driving the compiler in tests.
///
/// Editing methods (`add_block`, `connect_input`, ...) play the editor's
/// part. The [`Workspace`] setters are the compiler's part and are counted
/// in [`MemoryWorkspace::writes`].
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkspace {
    blocks: IndexMap<BlockId, MemoryBlock>,
    next_id: usize,
    writes: usize,
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_block(&mut self, block_type: &str) -> BlockId {
        loop {
            self.next_id += 1;
            let id = BlockId(format!("b{}", self.next_id));
            if !self.blocks.contains_key(&id) {
                return self.add_block_with_id(id, block_type);
            }
        }
    }

    pub fn add_block_with_id(&mut self, id: BlockId, block_type: &str) -> BlockId {
        self.blocks.insert(
            id.clone(),
            MemoryBlock {
                block_type: block_type.to_string(),
                ..MemoryBlock::default()
            },
        );
        id
    }

    /// Editor-side field edit; not counted as a compiler write.
    pub fn set_field(&mut self, id: &BlockId, field: &str, value: &str) {
        if let Some(block) = self.blocks.get_mut(id) {
            block.fields.insert(field.to_string(), value.to_string());
        }
    }

    pub fn connect_input(&mut self, parent: &BlockId, input: &str, child: &BlockId) {
        self.disconnect(child);
        if let Some(previous) = self
            .blocks
            .get_mut(parent)
            .and_then(|block| block.inputs.insert(input.to_string(), child.clone()))
        {
            if let Some(old) = self.blocks.get_mut(&previous) {
                old.parent = None;
            }
        }
        if let Some(block) = self.blocks.get_mut(child) {
            block.parent = Some(parent.clone());
        }
    }

    pub fn connect_next(&mut self, previous: &BlockId, next: &BlockId) {
        self.disconnect(next);
        if let Some(displaced) = self
            .blocks
            .get_mut(previous)
            .and_then(|block| block.next.replace(next.clone()))
        {
            if let Some(old) = self.blocks.get_mut(&displaced) {
                old.parent = None;
            }
        }
        if let Some(block) = self.blocks.get_mut(next) {
            block.parent = Some(previous.clone());
        }
    }

    /// Detach a block (with everything below it) from its parent.
    pub fn disconnect(&mut self, child: &BlockId) {
        let Some(parent) = self.blocks.get_mut(child).and_then(|block| block.parent.take()) else {
            return;
        };
        if let Some(block) = self.blocks.get_mut(&parent) {
            block.inputs.retain(|_, target| target != child);
            if block.next.as_ref() == Some(child) {
                block.next = None;
            }
        }
    }

    /// Delete a block together with its inputs and the blocks chained below it.
    pub fn delete(&mut self, id: &BlockId) -> Vec<BlockId> {
        self.disconnect(id);
        let mut removed = Vec::new();
        let mut pending = vec![id.clone()];
        while let Some(current) = pending.pop() {
            if let Some(block) = self.blocks.shift_remove(&current) {
                pending.extend(block.inputs.into_values());
                pending.extend(block.next);
                removed.push(current);
            }
        }
        removed
    }

    /// Number of writes the compiler has made through the [`Workspace`] trait.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn warnings(&self, id: &BlockId) -> Vec<String> {
        self.blocks
            .get(id)
            .map(|block| block.warnings.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl Workspace for MemoryWorkspace {
    fn block_ids(&self) -> Vec<BlockId> {
        self.blocks.keys().cloned().collect()
    }

    fn top_blocks(&self) -> Vec<BlockId> {
        self.blocks
            .iter()
            .filter(|(_, block)| block.parent.is_none())
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn block_type(&self, id: &BlockId) -> Option<String> {
        self.blocks.get(id).map(|block| block.block_type.clone())
    }

    fn field_value(&self, id: &BlockId, field: &str) -> Option<String> {
        self.blocks.get(id).and_then(|block| block.fields.get(field).cloned())
    }

    fn set_field_value(&mut self, id: &BlockId, field: &str, value: &str) {
        self.writes += 1;
        self.set_field(id, field, value);
    }

    fn input_target(&self, id: &BlockId, input: &str) -> Option<BlockId> {
        self.blocks.get(id).and_then(|block| block.inputs.get(input).cloned())
    }

    fn next_block(&self, id: &BlockId) -> Option<BlockId> {
        self.blocks.get(id).and_then(|block| block.next.clone())
    }

    fn parent(&self, id: &BlockId) -> Option<BlockId> {
        self.blocks.get(id).and_then(|block| block.parent.clone())
    }

    fn has_disabled_reason(&self, id: &BlockId, reason: &str) -> bool {
        self.blocks
            .get(id)
            .map(|block| block.disabled.contains(reason))
            .unwrap_or(false)
    }

    fn set_disabled_reason(&mut self, id: &BlockId, reason: &str, disabled: bool) {
        self.writes += 1;
        if let Some(block) = self.blocks.get_mut(id) {
            if disabled {
                block.disabled.insert(reason.to_string());
            } else {
                block.disabled.remove(reason);
            }
        }
    }

    fn is_disabled(&self, id: &BlockId) -> bool {
        self.blocks
            .get(id)
            .map(|block| !block.disabled.is_empty())
            .unwrap_or(false)
    }

    fn warning(&self, id: &BlockId, key: &str) -> Option<String> {
        self.blocks.get(id).and_then(|block| block.warnings.get(key).cloned())
    }

    fn set_warning(&mut self, id: &BlockId, key: &str, text: Option<String>) {
        self.writes += 1;
        if let Some(block) = self.blocks.get_mut(id) {
            match text {
                Some(text) => {
                    block.warnings.insert(key.to_string(), text);
                }
                None => {
                    block.warnings.remove(key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_blocks_share_a_root() {
        let mut ws = MemoryWorkspace::new();
        let start = ws.add_block("start");
        let a = ws.add_block("a");
        let b = ws.add_block("b");
        ws.connect_input(&start, "CODE", &a);
        ws.connect_next(&a, &b);

        assert_eq!(ws.root(&b), start);
        assert_eq!(ws.top_blocks(), vec![start.clone()]);

        ws.disconnect(&a);
        assert_eq!(ws.root(&b), a);
        assert_eq!(ws.input_target(&start, "CODE"), None);
    }

    #[test]
    fn root_stops_at_a_parent_cycle() {
        let mut ws = MemoryWorkspace::new();
        let a = ws.add_block("a");
        let b = ws.add_block("b");
        ws.connect_input(&b, "SELF", &b);
        ws.connect_next(&b, &a);

        assert_eq!(ws.root(&a), b);
        assert_eq!(ws.root(&b), b);
    }

    #[test]
    fn delete_removes_descendants() {
        let mut ws = MemoryWorkspace::new();
        let start = ws.add_block("start");
        let a = ws.add_block("a");
        let value = ws.add_block("v");
        ws.connect_input(&start, "CODE", &a);
        ws.connect_input(&a, "X", &value);

        let removed = ws.delete(&a);
        assert_eq!(removed.len(), 2);
        assert_eq!(ws.len(), 1);
        assert!(ws.input_target(&start, "CODE").is_none());
    }
}
