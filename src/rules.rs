//! # Workspace Rules
//!
//! Rules the compiler enforces on the live graph after each structural
//! event. Reachability owns exactly one disablement reason; toolbox tidying
//! is presentation only.

use crate::config::CompilerConfig;
use crate::registry::BlockRegistry;
use crate::workspace::{ToolboxView, Workspace, WorkspaceEvent};

/// Outcome of one reachability pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReachabilityReport {
    pub reachable: usize,
    pub unreachable: usize,
    /// Blocks whose disablement reason was set or cleared by this pass.
    pub changed: usize,
}

/// Disables every block whose root is neither a program-start block nor a
/// procedure definition.
pub struct ReachabilityRule<'a> {
    registry: &'a BlockRegistry,
    config: &'a CompilerConfig,
}

impl<'a> ReachabilityRule<'a> {
    pub fn new(registry: &'a BlockRegistry, config: &'a CompilerConfig) -> Self {
        Self { registry, config }
    }

    pub fn is_entry_point(&self, block_type: &str) -> bool {
        self.registry.is_program_start(block_type) || self.config.is_procedure_root(block_type)
    }

    /// Walk every block once. Writes only where the current state differs,
    /// so repeating the pass without intervening changes writes nothing.
    pub fn apply(&self, ws: &mut dyn Workspace) -> ReachabilityReport {
        let reason = self.config.unreachable_reason.as_str();
        let mut report = ReachabilityReport::default();

        for id in ws.block_ids() {
            let root = ws.root(&id);
            let reachable = ws
                .block_type(&root)
                .map(|t| self.is_entry_point(&t))
                .unwrap_or(false);

            let disabled = ws.has_disabled_reason(&id, reason);
            if reachable {
                report.reachable += 1;
                if disabled {
                    ws.set_disabled_reason(&id, reason, false);
                    report.changed += 1;
                }
            } else {
                report.unreachable += 1;
                if !disabled {
                    ws.set_disabled_reason(&id, reason, true);
                    report.changed += 1;
                }
            }
        }

        tracing::debug!(
            "[RULES] Reachability: {} reachable, {} unreachable, {} changed",
            report.reachable,
            report.unreachable,
            report.changed
        );
        report
    }
}

/// Collapse the palette and drop its selection whenever a block is created.
/// Returns whether the view was touched.
pub fn tidy_toolbox(event: &WorkspaceEvent, view: &mut dyn ToolboxView) -> bool {
    if !event.is_create() {
        return false;
    }
    view.collapse_all();
    view.clear_selection();
    true
}
