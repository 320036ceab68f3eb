//! # Toolbox Assembly
//!
//! Merges the category trees of all library documents into the single
//! palette the editor renders, registering every block definition on the
//! way.

pub mod i18n;

use crate::error::Result;
use crate::library::{validate_document, LibraryBody, LibraryDocument, LibraryItem, RawDocument, Style};
use crate::registry::BlockRegistry;
use i18n::Messages;
use indexmap::IndexMap;
use std::collections::HashSet;
use serde::Serialize;
use serde_json::Value;

/// One entry of a category, in the editor's toolbox JSON format.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum ToolboxItem {
    #[serde(rename = "category")]
    Category(ToolboxCategory),
    #[serde(rename = "block")]
    Block {
        #[serde(rename = "type")]
        block_type: String,
    },
    #[serde(rename = "label")]
    Label { text: String },
    #[serde(rename = "sep")]
    Separator {
        #[serde(skip_serializing_if = "Option::is_none")]
        gap: Option<u32>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolboxCategory {
    #[serde(rename = "toolboxitemid")]
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colour: Option<String>,
    #[serde(rename = "categorystyle", skip_serializing_if = "Option::is_none")]
    pub category_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "docs", skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<String>,
    /// Name of the host renderer for externally rendered categories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
    pub contents: Vec<ToolboxItem>,
    #[serde(skip)]
    pub priority: Option<i64>,
    #[serde(skip)]
    pub load_index: usize,
    #[serde(skip)]
    parent: Option<String>,
}

impl ToolboxCategory {
    fn from_document(doc: &LibraryDocument, load_index: usize) -> Self {
        let (colour, category_style) = match &doc.style {
            Some(Style::Colour(colour)) => (Some(colour.clone()), None),
            Some(Style::Named(style)) => (None, Some(style.clone())),
            None => (None, None),
        };
        let (custom, contents) = match &doc.body {
            LibraryBody::Custom(renderer) => (Some(renderer.clone()), Vec::new()),
            LibraryBody::Contents(items) => (None, palette_items(items)),
        };
        Self {
            id: doc.category.clone(),
            name: doc.name.clone(),
            colour,
            category_style,
            description: doc.description.clone(),
            docs_url: doc.docs_url.clone(),
            custom,
            contents,
            priority: doc.priority,
            load_index,
            parent: doc.parent.clone(),
        }
    }

    /// Stand-in for a parent no document defines.
    fn placeholder(id: &str, load_index: usize) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            colour: None,
            category_style: None,
            description: None,
            docs_url: None,
            custom: None,
            contents: Vec::new(),
            priority: None,
            load_index,
            parent: None,
        }
    }

    /// Append the items of a later document with the same identifier,
    /// skipping blocks and labels this category already has.
    fn merge(&mut self, later: ToolboxCategory) {
        if self.custom.is_some() {
            if !later.contents.is_empty() {
                tracing::warn!(
                    "[TOOLBOX] Category '{}' is rendered by '{}', ignoring merged contents",
                    self.id,
                    self.custom.as_deref().unwrap_or_default()
                );
            }
            return;
        }
        for item in later.contents {
            self.push_unique(item);
        }
    }

    fn push_unique(&mut self, item: ToolboxItem) {
        let duplicate = match &item {
            ToolboxItem::Block { block_type } => self.has_block(block_type),
            ToolboxItem::Label { text } => self
                .contents
                .iter()
                .any(|existing| matches!(existing, ToolboxItem::Label { text: t } if t == text)),
            _ => false,
        };
        if duplicate {
            tracing::debug!("[TOOLBOX] Dropping duplicate {:?} from category '{}'", item, self.id);
        } else {
            self.contents.push(item);
        }
    }

    pub fn has_block(&self, block_type: &str) -> bool {
        self.contents
            .iter()
            .any(|item| matches!(item, ToolboxItem::Block { block_type: t } if t == block_type))
    }

    /// Block types shown directly in this category, in order.
    pub fn block_types(&self) -> Vec<&str> {
        self.contents
            .iter()
            .filter_map(|item| match item {
                ToolboxItem::Block { block_type } => Some(block_type.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn subcategories(&self) -> impl Iterator<Item = &ToolboxCategory> {
        self.contents.iter().filter_map(|item| match item {
            ToolboxItem::Category(category) => Some(category),
            _ => None,
        })
    }
}

fn palette_items(items: &[LibraryItem]) -> Vec<ToolboxItem> {
    items
        .iter()
        .filter_map(|item| match item {
            LibraryItem::Block(def) if def.hidden => None,
            LibraryItem::Block(def) => Some(ToolboxItem::Block {
                block_type: def.block_type.clone(),
            }),
            LibraryItem::Label(text) => Some(ToolboxItem::Label { text: text.clone() }),
            LibraryItem::Separator(gap) => Some(ToolboxItem::Separator { gap: *gap }),
        })
        .collect()
}

/// The assembled palette.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Toolbox {
    pub kind: String,
    pub contents: Vec<ToolboxItem>,
}

impl Default for Toolbox {
    fn default() -> Self {
        Self {
            kind: "categoryToolbox".to_string(),
            contents: Vec::new(),
        }
    }
}

impl Toolbox {
    /// Top-level categories in display order.
    pub fn categories(&self) -> impl Iterator<Item = &ToolboxCategory> {
        self.contents.iter().filter_map(|item| match item {
            ToolboxItem::Category(category) => Some(category),
            _ => None,
        })
    }

    /// Find a category anywhere in the tree.
    pub fn category(&self, id: &str) -> Option<&ToolboxCategory> {
        fn find<'t>(categories: impl Iterator<Item = &'t ToolboxCategory>, id: &str) -> Option<&'t ToolboxCategory> {
            for category in categories {
                if category.id == id {
                    return Some(category);
                }
                if let Some(found) = find(category.subcategories(), id) {
                    return Some(found);
                }
            }
            None
        }
        find(self.categories(), id)
    }

    /// Number of categories, nested ones included.
    pub fn category_count(&self) -> usize {
        fn count<'t>(categories: impl Iterator<Item = &'t ToolboxCategory>) -> usize {
            categories.map(|c| 1 + count(c.subcategories())).sum()
        }
        count(self.categories())
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Builds the toolbox from library documents, registering their blocks.
pub struct ToolboxAssembler<'a> {
    registry: &'a mut BlockRegistry,
    messages: &'a Messages,
}

impl<'a> ToolboxAssembler<'a> {
    pub fn new(registry: &'a mut BlockRegistry, messages: &'a Messages) -> Self {
        Self { registry, messages }
    }

    /// Localize, validate and register each document in order, then merge
    /// the categories. The first invalid document aborts the whole assembly;
    /// documents before it stay registered.
    pub fn assemble(&mut self, documents: &[RawDocument]) -> Result<Toolbox> {
        tracing::info!("[TOOLBOX] Assembling toolbox from {} documents", documents.len());

        let mut categories: IndexMap<String, ToolboxCategory> = IndexMap::new();
        for (load_index, raw) in documents.iter().enumerate() {
            let mut content = raw.content.clone();
            self.messages.localize_document(&mut content);

            let doc = validate_document(&raw.source, &content).map_err(|err| {
                tracing::error!("[TOOLBOX] {}", err);
                err
            })?;
            self.registry.register_library(&doc)?;

            let category = ToolboxCategory::from_document(&doc, load_index);
            match categories.get_mut(&doc.category) {
                Some(existing) => {
                    tracing::debug!(
                        "[TOOLBOX] Category '{}' from {} merged into first definition",
                        doc.category,
                        raw.source
                    );
                    existing.merge(category);
                }
                None => {
                    categories.insert(doc.category.clone(), category);
                }
            }
        }

        let toolbox = build_tree(categories);
        tracing::info!(
            "[TOOLBOX] Toolbox ready: {} categories, {} registered block types",
            toolbox.category_count(),
            self.registry.len()
        );
        Ok(toolbox)
    }

}

/// Nest sub-categories under their parents and order every level by
/// explicit priority first, then load order.
fn build_tree(mut categories: IndexMap<String, ToolboxCategory>) -> Toolbox {
    let parents: Vec<(String, String, usize)> = categories
        .values()
        .filter_map(|c| c.parent.clone().map(|p| (c.id.clone(), p, c.load_index)))
        .collect();
    for (_, parent, load_index) in &parents {
        if !categories.contains_key(parent) {
            categories.insert(parent.clone(), ToolboxCategory::placeholder(parent, *load_index));
        }
    }

    // A parent chain that loops back makes the category top-level.
    let mut top_level = Vec::new();
    let mut children: IndexMap<String, Vec<String>> = IndexMap::new();
    for category in categories.values() {
        match &category.parent {
            Some(parent) if !leads_back(&categories, &category.id) => {
                children.entry(parent.clone()).or_default().push(category.id.clone());
            }
            Some(parent) => {
                tracing::warn!(
                    "[TOOLBOX] Category '{}' has a cyclic parent '{}', placing it at top level",
                    category.id,
                    parent
                );
                top_level.push(category.id.clone());
            }
            None => top_level.push(category.id.clone()),
        }
    }

    let mut toolbox = Toolbox::default();
    for id in sorted(&categories, top_level) {
        if let Some(category) = take_subtree(&mut categories, &children, &id) {
            toolbox.contents.push(ToolboxItem::Category(category));
        }
    }
    toolbox
}

/// True when `start` is part of a parent cycle. A chain that runs into a
/// cycle not containing `start` nests normally under its parent.
fn leads_back(categories: &IndexMap<String, ToolboxCategory>, start: &str) -> bool {
    let mut seen = HashSet::new();
    let mut current = categories.get(start).and_then(|c| c.parent.as_deref());
    while let Some(id) = current {
        if id == start {
            return true;
        }
        if !seen.insert(id) {
            return false;
        }
        current = categories.get(id).and_then(|c| c.parent.as_deref());
    }
    false
}

fn sorted(categories: &IndexMap<String, ToolboxCategory>, mut ids: Vec<String>) -> Vec<String> {
    ids.sort_by_key(|id| {
        categories
            .get(id)
            .map(|c| (c.priority.is_none(), c.priority.unwrap_or_default(), c.load_index))
            .unwrap_or((true, 0, usize::MAX))
    });
    ids
}

fn take_subtree(
    categories: &mut IndexMap<String, ToolboxCategory>,
    children: &IndexMap<String, Vec<String>>,
    id: &str,
) -> Option<ToolboxCategory> {
    let mut category = categories.shift_remove(id)?;
    let kids = children.get(id).cloned().unwrap_or_default();
    for child in sorted(categories, kids) {
        if let Some(sub) = take_subtree(categories, children, &child) {
            category.contents.push(ToolboxItem::Category(sub));
        }
    }
    Some(category)
}
