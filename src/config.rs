//! # Compiler Configuration
//!
//! Tunables shared by the generator, the instance resolver and the rule
//! engine. Hosts usually ship these as a small JSON object; every key is
//! optional.

use crate::error::{CompileError, Result};
use serde::{Deserialize, Serialize};

/// A single dropdown entry as the editor renders it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DropdownOption {
    pub label: String,
    pub value: String,
}

impl DropdownOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Indentation applied to statement inputs.
    pub indent: String,
    /// Substituted for value inputs with nothing connected.
    pub null_literal: String,
    /// Appended to a constructor prefix to form the unassigned name.
    pub unassigned_suffix: String,
    /// Returned by instance dropdowns that have nothing to offer.
    pub no_instance: DropdownOption,
    /// Disablement reason owned by the reachability rule.
    pub unreachable_reason: String,
    /// Root types that count as program entry points besides program-start blocks.
    pub procedure_root_types: Vec<String>,
    /// Comment block emitted at the top of every generated program.
    pub header: Option<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            null_literal: "null".to_string(),
            unassigned_suffix: "?".to_string(),
            no_instance: DropdownOption::new("No instance available", ""),
            unreachable_reason: "UNREACHABLE".to_string(),
            procedure_root_types: vec![
                "procedures_defnoreturn".to_string(),
                "procedures_defreturn".to_string(),
            ],
            header: None,
        }
    }
}

impl CompilerConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            CompileError::invalid("config", format!("line {}, column {}", e.line(), e.column()), e.to_string())
        })
    }

    pub fn is_procedure_root(&self, block_type: &str) -> bool {
        self.procedure_root_types.iter().any(|t| t == block_type)
    }
}
