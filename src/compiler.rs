//! # Block Compiler
//!
//! Main entry points for the host editor: loading libraries, reacting to
//! workspace events, populating instance dropdowns and compiling the
//! workspace to program source.

use crate::codegen::{BlockCodeGenerator, Generated};
use crate::config::{CompilerConfig, DropdownOption};
use crate::error::{CompileError, Result};
use crate::instances::{InstanceResolver, NameChange};
use crate::library::{ArgKind, DropdownSource, RawDocument};
use crate::registry::BlockRegistry;
use crate::rules::{tidy_toolbox, ReachabilityReport, ReachabilityRule};
use crate::toolbox::i18n::Messages;
use crate::toolbox::{Toolbox, ToolboxAssembler};
use crate::workspace::{BlockId, ToolboxView, Workspace, WorkspaceEvent};

/// Compile a workspace to program source
///
/// This is the stateless entry point: it uses an already populated registry
/// and indexes constructor instances on the fly.
///
/// # Arguments
///
/// * `workspace` - The live block graph
/// * `registry` - Block generators, usually filled by [`ToolboxAssembler`]
/// * `config` - Generator settings
///
/// # Returns
///
/// * `Ok(String)` - The generated program source
/// * `Err(CompileError)` - A typed error if generation fails
pub fn compile_workspace(
    workspace: &dyn Workspace,
    registry: &BlockRegistry,
    config: &CompilerConfig,
) -> Result<String> {
    let mut instances = InstanceResolver::new(config);
    instances.rebuild(registry);
    BlockCodeGenerator::new(workspace, registry, &instances, config).generate_program()
}

/// What [`BlockCompiler::handle_event`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventReport {
    pub reachability: ReachabilityReport,
    pub names: Vec<(BlockId, NameChange)>,
    pub invalid_selections: usize,
    pub toolbox_tidied: bool,
}

/// Compiler session owning the registries for one editor.
#[derive(Debug)]
pub struct BlockCompiler {
    config: CompilerConfig,
    messages: Messages,
    registry: BlockRegistry,
    instances: InstanceResolver,
    toolbox: Toolbox,
}

impl Default for BlockCompiler {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}

impl BlockCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        let instances = InstanceResolver::new(&config);
        Self {
            config,
            messages: Messages::new(),
            registry: BlockRegistry::new(),
            instances,
            toolbox: Toolbox::default(),
        }
    }

    /// Translations used by the next [`BlockCompiler::load_libraries`].
    pub fn with_messages(mut self, messages: Messages) -> Self {
        self.messages = messages;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// For registering host-native generators after loading.
    pub fn registry_mut(&mut self) -> &mut BlockRegistry {
        &mut self.registry
    }

    pub fn instances(&self) -> &InstanceResolver {
        &self.instances
    }

    pub fn toolbox(&self) -> &Toolbox {
        &self.toolbox
    }

    /// Reset all registrations and load `documents` in order.
    ///
    /// Fails on the first invalid document. Blocks of the documents before
    /// it stay registered, but the toolbox is left empty.
    pub fn load_libraries(&mut self, documents: &[RawDocument]) -> Result<&Toolbox> {
        tracing::info!("[BLOCKC] Loading {} library documents", documents.len());
        self.registry.reset();
        self.instances.invalidate();
        self.toolbox = Toolbox::default();

        let assembled = ToolboxAssembler::new(&mut self.registry, &self.messages).assemble(documents);
        self.instances.rebuild(&self.registry);
        self.toolbox = assembled?;

        tracing::info!("[BLOCKC] Loaded {} block types", self.registry.len());
        Ok(&self.toolbox)
    }

    /// Run every workspace rule for one structural event.
    pub fn handle_event(
        &mut self,
        ws: &mut dyn Workspace,
        event: &WorkspaceEvent,
        view: Option<&mut dyn ToolboxView>,
    ) -> EventReport {
        let mut report = EventReport::default();

        if matches!(event, WorkspaceEvent::Delete { .. }) {
            self.instances.invalidate();
        }
        self.instances.rebuild(&self.registry);

        match event {
            WorkspaceEvent::Create { ids } => {
                for id in ids {
                    if self.is_constructor(ws, id) {
                        let change = self.instances.on_constructor_change(ws, id, None);
                        report.names.push((id.clone(), change));
                    }
                }
            }
            WorkspaceEvent::Change { id, field, old_value, .. } if self.is_constructor(ws, id) => {
                let name_field = ws
                    .block_type(id)
                    .and_then(|t| self.instances.spec_for(&t).map(|s| s.name_field.clone()));
                let change = if name_field.as_deref() == Some(field.as_str()) {
                    self.instances.on_constructor_change(ws, id, old_value.as_deref())
                } else {
                    match self.instances.auto_name(ws, id) {
                        Some(name) => NameChange::Assigned(name),
                        None => NameChange::Unchanged,
                    }
                };
                report.names.push((id.clone(), change));
            }
            WorkspaceEvent::Move { id } if self.is_constructor(ws, id) => {
                if let Some(name) = self.instances.auto_name(ws, id) {
                    report.names.push((id.clone(), NameChange::Assigned(name)));
                }
            }
            _ => {}
        }

        report.reachability = ReachabilityRule::new(&self.registry, &self.config).apply(ws);
        report.invalid_selections = self.instances.validate_all(ws, &self.registry);
        if let Some(view) = view {
            report.toolbox_tidied = tidy_toolbox(event, view);
        }

        tracing::debug!("[BLOCKC] Handled {:?}: {:?}", event, report);
        report
    }

    fn is_constructor(&self, ws: &dyn Workspace, id: &BlockId) -> bool {
        ws.block_type(id)
            .map(|t| self.instances.spec_for(&t).is_some())
            .unwrap_or(false)
    }

    /// Options for an instance dropdown on a live block.
    pub fn instance_options(
        &self,
        ws: &dyn Workspace,
        id: &BlockId,
        field: &str,
        restoring: Option<&str>,
    ) -> Result<Vec<DropdownOption>> {
        let block_type = ws.block_type(id).ok_or_else(|| CompileError::BlockNotFound(id.clone()))?;
        let def = self
            .registry
            .definition(&block_type)
            .ok_or_else(|| CompileError::UnknownBlockType(block_type.clone()))?;
        let system = match def.arg(field).map(|a| &a.kind) {
            Some(ArgKind::Dropdown(DropdownSource::Instances(system))) => system,
            _ => {
                return Err(CompileError::CodeGeneration(format!(
                    "field `{}` of `{}` is not an instance dropdown",
                    field, block_type
                )))
            }
        };
        let current = ws.field_value(id, field);
        Ok(self
            .instances
            .list_instance_options(ws, system, current.as_deref(), restoring))
    }

    /// Generate a single block.
    pub fn generate_block(&self, ws: &dyn Workspace, id: &BlockId) -> Result<Generated> {
        BlockCodeGenerator::new(ws, &self.registry, &self.instances, &self.config).generate(id)
    }

    /// Compile the whole workspace to program source.
    pub fn compile_workspace(&self, ws: &dyn Workspace) -> Result<String> {
        tracing::info!("[BLOCKC] Compiling workspace ({} blocks)", ws.block_ids().len());
        let code = BlockCodeGenerator::new(ws, &self.registry, &self.instances, &self.config).generate_program()?;
        tracing::info!("[BLOCKC] Code generation complete ({} bytes)", code.len());
        Ok(code)
    }
}
