//! # Block Program Compiler (blockc)
//!
//! Compiler for visual block programs: declarative JSON block libraries go
//! in, a categorized editor palette and generated program source come out.
//!
//! blockc provides:
//! - Validation of block library documents with exact error paths
//! - `$[NAME]` code templates with operator-precedence aware parenthesization
//! - Constructor blocks that declare named instances of hardware systems
//! - Workspace rules that disable blocks unreachable from a program start
//! - Toolbox assembly with category merging and `%{BKY_KEY}` localization
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use blockc::{BlockCompiler, CompilerConfig, MemoryWorkspace, RawDocument};
//!
//! let library = std::fs::read_to_string("libraries/motors.json")?;
//! let mut compiler = BlockCompiler::new(CompilerConfig::default());
//! compiler.load_libraries(&[RawDocument::new("motors.json", serde_json::from_str(&library)?)])?;
//!
//! let mut workspace = MemoryWorkspace::new();
//! let start = workspace.add_block("on_start");
//! // ... connect blocks
//!
//! match compiler.compile_workspace(&workspace) {
//!     Ok(code) => std::fs::write("main.ts", code)?,
//!     Err(e) => eprintln!("Compilation failed: {}", e),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! blockc follows a multi-phase pipeline:
//!
//! 1. **Localization** - Resolve message references in raw documents
//! 2. **Validation** - Turn raw JSON into typed library documents
//! 3. **Registration** - Register block shapes and generators, index constructors
//! 4. **Toolbox Assembly** - Merge, order and nest categories
//! 5. **Workspace Rules** - Name instances, disable unreachable blocks, check selections
//! 6. **Code Generation** - Expand templates along the block graph

pub mod codegen;
pub mod compiler;
pub mod config;
pub mod error;
pub mod instances;
pub mod library;
pub mod registry;
pub mod rules;
pub mod template;
pub mod toolbox;
pub mod workspace;

// Re-export the main compilation API
pub use compiler::{compile_workspace, BlockCompiler, EventReport};

pub use codegen::{BlockCodeGenerator, Generated, Order};
pub use config::{CompilerConfig, DropdownOption};
pub use error::{CompileError, ErrorKind, Result};
pub use instances::{InstanceResolver, NameChange, VirtualInstanceRef};
pub use library::{
    validate_block, validate_document, ArgKind, ArgSpec, BlockDefinition, BlockKind, ConstructorSpec,
    LibraryDocument, RawDocument,
};
pub use registry::BlockRegistry;
pub use rules::{tidy_toolbox, ReachabilityReport, ReachabilityRule};
pub use toolbox::i18n::Messages;
pub use toolbox::{Toolbox, ToolboxAssembler, ToolboxCategory, ToolboxItem};
pub use workspace::{BlockId, MemoryWorkspace, ToolboxView, Workspace, WorkspaceEvent};
