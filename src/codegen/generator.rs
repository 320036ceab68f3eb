//! # Template Code Generator
//!
//! Generates program source from the live block graph, one block at a time,
//! by expanding each block's code template with the code of whatever is
//! connected to its inputs.

use super::Order;
use crate::config::CompilerConfig;
use crate::error::{CompileError, Result};
use crate::instances::{InstanceResolver, VirtualInstanceRef};
use crate::library::{ArgKind, ArgSpec, BlockDefinition, BlockKind, DropdownSource};
use crate::registry::{BlockRegistry, Generator};
use crate::template::{expand_template, prefix_lines};
use crate::workspace::{BlockId, Workspace};
use std::collections::{HashMap, HashSet};

/// Code produced by a single block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generated {
    /// Statement code. Root blocks end with a newline, chainable blocks do not.
    Statement(String),
    /// Expression plus the precedence class it binds with.
    Value(String, Order),
}

impl Generated {
    pub fn code(&self) -> &str {
        match self {
            Generated::Statement(code) | Generated::Value(code, _) => code,
        }
    }
}

/// Block-graph code generator
pub struct BlockCodeGenerator<'a> {
    workspace: &'a dyn Workspace,
    registry: &'a BlockRegistry,
    instances: &'a InstanceResolver,
    config: &'a CompilerConfig,
    visiting: HashSet<BlockId>,
}

impl<'a> BlockCodeGenerator<'a> {
    pub fn new(
        workspace: &'a dyn Workspace,
        registry: &'a BlockRegistry,
        instances: &'a InstanceResolver,
        config: &'a CompilerConfig,
    ) -> Self {
        Self {
            workspace,
            registry,
            instances,
            config,
            visiting: HashSet::new(),
        }
    }

    pub fn workspace(&self) -> &'a dyn Workspace {
        self.workspace
    }

    pub fn config(&self) -> &'a CompilerConfig {
        self.config
    }

    /// Generate the complete program: header, imports, then every enabled
    /// root block with the chain below it.
    pub fn generate_program(&mut self) -> Result<String> {
        let mut code = String::new();

        if let Some(header) = &self.config.header {
            code.push_str(header);
            if !header.ends_with('\n') {
                code.push('\n');
            }
            code.push('\n');
        }

        let imports = self.collect_imports();
        for import in &imports {
            code.push_str(import);
            code.push('\n');
        }
        if !imports.is_empty() {
            code.push('\n');
        }

        let mut roots = Vec::new();
        for top in self.workspace.top_blocks() {
            if self.workspace.is_disabled(&top) {
                tracing::debug!("[CODEGEN] Skipping disabled top block {}", top);
                continue;
            }
            let block_type = self.block_type(&top)?;
            let kind = self
                .registry
                .get(&block_type)
                .map(|b| b.kind)
                .ok_or_else(|| CompileError::UnknownBlockType(block_type.clone()))?;
            if kind != BlockKind::Root {
                tracing::debug!("[CODEGEN] Skipping detached {} block {}", block_type, top);
                continue;
            }
            roots.push(self.chain_to_code(&top)?);
        }

        if roots.is_empty() {
            tracing::warn!("[CODEGEN] No enabled root blocks in workspace");
        }
        code.push_str(&roots.join("\n"));

        Ok(code)
    }

    /// Imports of every library with an enabled block in the workspace.
    fn collect_imports(&self) -> Vec<String> {
        let types: Vec<String> = self
            .workspace
            .block_ids()
            .iter()
            .filter(|id| !self.workspace.is_disabled(id))
            .filter_map(|id| self.workspace.block_type(id))
            .collect();
        self.registry.imports_for(types.iter().map(String::as_str))
    }

    /// Generate a single block.
    pub fn generate(&mut self, id: &BlockId) -> Result<Generated> {
        if !self.visiting.insert(id.clone()) {
            return Err(CompileError::CodeGeneration(format!(
                "block {} is connected to itself",
                id
            )));
        }
        let result = self.generate_block(id);
        self.visiting.remove(id);
        result
    }

    fn generate_block(&mut self, id: &BlockId) -> Result<Generated> {
        let block_type = self.block_type(id)?;
        let registry = self.registry;
        let registered = registry
            .get(&block_type)
            .ok_or_else(|| CompileError::UnknownBlockType(block_type.clone()))?;

        match &registered.generator {
            Generator::Native(native) => native(self, id),
            Generator::Missing => Err(CompileError::MissingCodeTemplate { block_type }),
            Generator::Template(template) => {
                let def = registered.definition.as_ref().ok_or_else(|| {
                    CompileError::CodeGeneration(format!("template block `{}` has no definition", block_type))
                })?;
                self.generate_template(id, def, template)
            }
        }
    }

    fn generate_template(&mut self, id: &BlockId, def: &BlockDefinition, template: &str) -> Result<Generated> {
        let mut fragments = HashMap::with_capacity(def.args.len());
        for arg in &def.args {
            if !crate::template::has_placeholder(template, &arg.name) {
                continue;
            }
            let fragment = match &arg.kind {
                ArgKind::Value { order, .. } => self.value_to_code(id, &arg.name, *order)?,
                ArgKind::Statement { .. } => self.statement_to_code(id, &arg.name)?,
                _ => self.field_to_code(id, arg),
            };
            fragments.insert(arg.name.clone(), fragment);
        }

        let code = expand_template(template, &def.args, &fragments);
        tracing::debug!("[CODEGEN] {} ({}) -> {} bytes", id, def.block_type, code.len());

        Ok(match def.kind() {
            BlockKind::Value => Generated::Value(code, def.order),
            BlockKind::Statement => Generated::Statement(code),
            BlockKind::Root => {
                let mut code = code;
                if !code.ends_with('\n') {
                    code.push('\n');
                }
                Generated::Statement(code)
            }
        })
    }

    /// Expression for the block plugged into `input`, parenthesized for a
    /// position requiring `required`. Empty inputs yield the null literal.
    pub fn value_to_code(&mut self, id: &BlockId, input: &str, required: Order) -> Result<String> {
        let Some(target) = self.workspace.input_target(id, input) else {
            return Ok(self.config.null_literal.clone());
        };
        if self.workspace.is_disabled(&target) {
            return Ok(self.config.null_literal.clone());
        }
        match self.generate(&target)? {
            Generated::Value(code, inner) => Ok(required.wrap(&code, inner)),
            Generated::Statement(_) => Err(CompileError::CodeGeneration(format!(
                "statement block {} is plugged into value input {}.{}",
                target, id, input
            ))),
        }
    }

    /// Indented statements for the chain plugged into `input`; empty when
    /// nothing is connected.
    pub fn statement_to_code(&mut self, id: &BlockId, input: &str) -> Result<String> {
        match self.workspace.input_target(id, input) {
            Some(first) => {
                let chain = self.chain_to_code(&first)?;
                Ok(prefix_lines(&chain, &self.config.indent))
            }
            None => Ok(String::new()),
        }
    }

    /// Code for `first` and every block chained below it, one
    /// newline-terminated fragment per block. Disabled blocks are skipped.
    pub fn chain_to_code(&mut self, first: &BlockId) -> Result<String> {
        let mut code = String::new();
        let mut seen = HashSet::new();
        let mut current = Some(first.clone());

        while let Some(id) = current {
            if !seen.insert(id.clone()) {
                return Err(CompileError::CodeGeneration(format!("statement chain loops at block {}", id)));
            }
            if !self.workspace.is_disabled(&id) {
                match self.generate(&id)? {
                    Generated::Statement(fragment) => {
                        code.push_str(&fragment);
                        if !fragment.is_empty() && !fragment.ends_with('\n') {
                            code.push('\n');
                        }
                    }
                    Generated::Value(..) => {
                        return Err(CompileError::CodeGeneration(format!(
                            "value block {} is used as a statement",
                            id
                        )));
                    }
                }
            }
            current = self.workspace.next_block(&id);
        }

        Ok(code)
    }

    /// Literal value of a field argument, falling back to its default.
    pub fn field_to_code(&self, id: &BlockId, arg: &ArgSpec) -> String {
        let raw = self.workspace.field_value(id, &arg.name);
        match &arg.kind {
            ArgKind::TextInput { default } => raw.unwrap_or_else(|| default.clone()),
            ArgKind::Number { default, .. } => raw.unwrap_or_else(|| format_number(*default)),
            ArgKind::Checkbox { checked } => {
                let checked = raw.map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(*checked);
                checked.to_string()
            }
            ArgKind::Dropdown(DropdownSource::Static(options)) => raw
                .or_else(|| options.first().map(|o| o.value.clone()))
                .unwrap_or_default(),
            ArgKind::Dropdown(DropdownSource::Instances(_)) => {
                let raw = raw.unwrap_or_default();
                if VirtualInstanceRef::decode(&raw).is_some() {
                    match self.instances.resolve_virtual_instance(self.workspace, &raw) {
                        Some(expression) => expression,
                        None => {
                            tracing::warn!("[CODEGEN] Stale virtual instance on block {}: {}", id, raw);
                            raw
                        }
                    }
                } else {
                    raw
                }
            }
            ArgKind::Value { .. } | ArgKind::Statement { .. } => String::new(),
        }
    }

    fn block_type(&self, id: &BlockId) -> Result<String> {
        self.workspace
            .block_type(id)
            .ok_or_else(|| CompileError::BlockNotFound(id.clone()))
    }
}

/// Integral values print without a fractional part.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
