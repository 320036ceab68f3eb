//! # Compiler Errors
//!
//! Every fatal failure of the load and generate entry points is a
//! [`CompileError`]. Non-fatal conditions (stale dropdown references,
//! duplicate categories, duplicate instance names) never surface here.

use crate::workspace::BlockId;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Closed classification of [`CompileError`], for hosts that render
/// messages per failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidConfiguration,
    MissingCodeTemplate,
    UnknownBlockType,
    BlockNotFound,
    CodeGeneration,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    /// A library document (or compiler config) does not match the expected shape.
    #[error("invalid configuration in {source_name} at `{path}`: {reason}")]
    InvalidConfiguration {
        source_name: String,
        path: String,
        reason: String,
    },

    /// Generation was attempted on a block that declares no code template.
    #[error("block type `{block_type}` has no code template")]
    MissingCodeTemplate { block_type: String },

    #[error("no generator registered for block type `{0}`")]
    UnknownBlockType(String),

    #[error("block `{0}` does not exist in the workspace")]
    BlockNotFound(BlockId),

    #[error("code generation failed: {0}")]
    CodeGeneration(String),
}

impl CompileError {
    pub fn invalid(source_name: impl Into<String>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            source_name: source_name.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfiguration { .. } => ErrorKind::InvalidConfiguration,
            Self::MissingCodeTemplate { .. } => ErrorKind::MissingCodeTemplate,
            Self::UnknownBlockType(_) => ErrorKind::UnknownBlockType,
            Self::BlockNotFound(_) => ErrorKind::BlockNotFound,
            Self::CodeGeneration(_) => ErrorKind::CodeGeneration,
        }
    }

    /// Block type the error is about, when there is one.
    pub fn block_type(&self) -> Option<&str> {
        match self {
            Self::MissingCodeTemplate { block_type } => Some(block_type),
            Self::UnknownBlockType(block_type) => Some(block_type),
            _ => None,
        }
    }
}
