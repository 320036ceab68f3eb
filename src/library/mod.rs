//! # Block Libraries
//!
//! Typed model of library documents and the block definitions they carry.
//! Documents arrive as raw JSON ([`RawDocument`]) and only become a
//! [`LibraryDocument`] after passing [`schema::validate_document`].

pub mod schema;

use crate::codegen::Order;
use crate::config::DropdownOption;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use schema::{validate_block, validate_document};

/// A library document as handed over by the host, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    /// Identity of the document in error messages, usually its file name.
    pub source: String,
    pub content: Value,
}

impl RawDocument {
    pub fn new(source: impl Into<String>, content: Value) -> Self {
        Self {
            source: source.into(),
            content,
        }
    }
}

/// Visual style of a category or block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Style {
    /// Hex string or hue, passed to the editor as `colour`.
    Colour(String),
    /// Named theme style.
    Named(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryDocument {
    pub source: String,
    pub category: String,
    pub name: String,
    pub description: Option<String>,
    pub docs_url: Option<String>,
    pub style: Option<Style>,
    pub imports: Vec<String>,
    pub priority: Option<i64>,
    pub parent: Option<String>,
    pub body: LibraryBody,
}

impl LibraryDocument {
    /// Block definitions in document order.
    pub fn blocks(&self) -> impl Iterator<Item = &BlockDefinition> {
        let items: &[LibraryItem] = match &self.body {
            LibraryBody::Contents(items) => items,
            LibraryBody::Custom(_) => &[],
        };
        items.iter().filter_map(|item| match item {
            LibraryItem::Block(def) => Some(def),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LibraryBody {
    Contents(Vec<LibraryItem>),
    /// Category rendered by the host under this name.
    Custom(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LibraryItem {
    Block(BlockDefinition),
    Label(String),
    Separator(Option<u32>),
}

/// How a block connects to its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Top-level block that nothing can precede. Its code ends with a newline.
    Root,
    /// Chainable statement.
    Statement,
    /// Expression-producing block plugged into value inputs.
    Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    pub check: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockDefinition {
    pub block_type: String,
    pub message: String,
    pub args: Vec<ArgSpec>,
    pub code: Option<String>,
    pub previous: bool,
    pub next: bool,
    pub output: Option<OutputSpec>,
    pub order: Order,
    pub program_start: bool,
    pub constructs: Option<ConstructorSpec>,
    pub hidden: bool,
    pub tooltip: Option<String>,
    pub help_url: Option<String>,
    pub style: Option<Style>,
    pub inputs_inline: Option<bool>,
    /// Keys the compiler does not interpret, forwarded to the editor.
    pub extra: Map<String, Value>,
}

impl BlockDefinition {
    pub fn kind(&self) -> BlockKind {
        if self.output.is_some() {
            BlockKind::Value
        } else if self.previous {
            BlockKind::Statement
        } else {
            BlockKind::Root
        }
    }

    pub fn arg(&self, name: &str) -> Option<&ArgSpec> {
        self.args.iter().find(|arg| arg.name == name)
    }

    /// Dropdown fields bound to an instance system, as (field, system).
    pub fn instance_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.args.iter().filter_map(|arg| match &arg.kind {
            ArgKind::Dropdown(DropdownSource::Instances(system)) => {
                Some((arg.name.as_str(), system.as_str()))
            }
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArgSpec {
    pub name: String,
    pub kind: ArgKind,
}

impl ArgSpec {
    pub fn new(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgKind {
    TextInput { default: String },
    Number { default: f64, min: Option<f64>, max: Option<f64> },
    Checkbox { checked: bool },
    Dropdown(DropdownSource),
    Value { check: Option<String>, order: Order },
    Statement { check: Option<String> },
}

impl ArgKind {
    /// Unchecked value input substituted without parentheses.
    pub fn value() -> Self {
        ArgKind::Value {
            check: None,
            order: Order::None,
        }
    }

    /// Name of the kind in library documents and in editor shapes.
    pub fn type_name(&self) -> &'static str {
        match self {
            ArgKind::TextInput { .. } => "field_input",
            ArgKind::Number { .. } => "field_number",
            ArgKind::Checkbox { .. } => "field_checkbox",
            ArgKind::Dropdown(_) => "field_dropdown",
            ArgKind::Value { .. } => "input_value",
            ArgKind::Statement { .. } => "input_statement",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropdownSource {
    Static(Vec<DropdownOption>),
    /// Options are the live instances of this system.
    Instances(String),
}

/// Marks a block type as the constructor of a named system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorSpec {
    pub system: String,
    /// Names are `prefix<int>`; the unassigned name is `prefix` plus the configured suffix.
    pub prefix: String,
    /// Text field holding the instance name.
    pub name_field: String,
    pub virtual_instances: Vec<VirtualInstanceDef>,
}

/// A sub-object of a constructed instance that another system's blocks may reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualInstanceDef {
    pub instance_of: String,
    pub name: String,
    /// Expression template; the constructor's name field placeholder is the instance variable.
    pub connection: String,
}
