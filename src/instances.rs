//! # Constructor Instances
//!
//! Some block types construct a named instance of a system (`nvs_0`,
//! `robutek_main`, ...) that other blocks pick from a dropdown. A
//! constructor may also expose *virtual instances*: sub-objects of its
//! instance usable wherever an instance of another system is expected.
//!
//! Virtual instances are referenced by the provider block's id, never by
//! its name, so a selection survives renaming the provider.

use crate::config::{CompilerConfig, DropdownOption};
use crate::library::ConstructorSpec;
use crate::registry::BlockRegistry;
use crate::template::expand_named;
use crate::workspace::{BlockId, Workspace};
use serde_json::json;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Dropdown value selecting a virtual instance: (provider type, provider id, name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualInstanceRef {
    pub provider_type: String,
    pub provider_id: BlockId,
    pub name: String,
}

impl VirtualInstanceRef {
    pub fn new(provider_type: impl Into<String>, provider_id: BlockId, name: impl Into<String>) -> Self {
        Self {
            provider_type: provider_type.into(),
            provider_id,
            name: name.into(),
        }
    }

    /// JSON triple, e.g. `["robutek","b7","r_differential"]`.
    pub fn encode(&self) -> String {
        json!([self.provider_type, self.provider_id.as_str(), self.name]).to_string()
    }

    pub fn decode(value: &str) -> Option<Self> {
        if !value.starts_with('[') {
            return None;
        }
        let (provider_type, provider_id, name): (String, String, String) = serde_json::from_str(value).ok()?;
        Some(Self::new(provider_type, BlockId(provider_id), name))
    }
}

/// What [`InstanceResolver::on_constructor_change`] did to the name field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameChange {
    Unchanged,
    Assigned(String),
    Reverted(String),
}

/// Index of constructor block types and the instances they expose.
///
/// The index is derived from the registry; [`InstanceResolver::rebuild`]
/// runs on every full rule pass and after [`InstanceResolver::invalidate`].
#[derive(Debug, Clone)]
pub struct InstanceResolver {
    unassigned_suffix: String,
    no_instance: DropdownOption,
    /// system -> constructor block type
    constructors: HashMap<String, String>,
    /// constructor block type -> spec with its virtual instances
    specs: HashMap<String, ConstructorSpec>,
    /// target system -> constructor types exposing virtual instances of it
    providers: HashMap<String, Vec<String>>,
}

impl Default for InstanceResolver {
    fn default() -> Self {
        Self::new(&CompilerConfig::default())
    }
}

impl InstanceResolver {
    pub fn new(config: &CompilerConfig) -> Self {
        Self {
            unassigned_suffix: config.unassigned_suffix.clone(),
            no_instance: config.no_instance.clone(),
            constructors: HashMap::new(),
            specs: HashMap::new(),
            providers: HashMap::new(),
        }
    }

    pub fn invalidate(&mut self) {
        self.constructors.clear();
        self.specs.clear();
        self.providers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn rebuild(&mut self, registry: &BlockRegistry) {
        self.invalidate();

        let mut defs: Vec<_> = registry
            .definitions()
            .filter_map(|def| def.constructs.as_ref().map(|spec| (def.block_type.as_str(), spec)))
            .collect();
        defs.sort_by(|a, b| a.0.cmp(b.0));

        for (block_type, spec) in defs {
            match self.constructors.get(&spec.system) {
                Some(existing) => tracing::warn!(
                    "[INSTANCES] System '{}' already constructed by '{}', ignoring '{}' as its constructor",
                    spec.system,
                    existing,
                    block_type
                ),
                None => {
                    self.constructors.insert(spec.system.clone(), block_type.to_string());
                }
            }
            for vi in &spec.virtual_instances {
                let providers = self.providers.entry(vi.instance_of.clone()).or_default();
                if !providers.iter().any(|p| p == block_type) {
                    providers.push(block_type.to_string());
                }
            }
            self.specs.insert(block_type.to_string(), spec.clone());
        }

        tracing::debug!(
            "[INSTANCES] Indexed {} constructors, {} systems with virtual instances",
            self.specs.len(),
            self.providers.len()
        );
    }

    pub fn spec_for(&self, block_type: &str) -> Option<&ConstructorSpec> {
        self.specs.get(block_type)
    }

    pub fn unassigned_name(&self, spec: &ConstructorSpec) -> String {
        format!("{}{}", spec.prefix, self.unassigned_suffix)
    }

    /// Live instances of a constructor type with their current names.
    pub fn instance_names(&self, ws: &dyn Workspace, block_type: &str) -> Vec<(BlockId, String)> {
        let Some(spec) = self.specs.get(block_type) else {
            return Vec::new();
        };
        ws.blocks_of_type(block_type)
            .into_iter()
            .filter_map(|id| ws.field_value(&id, &spec.name_field).map(|name| (id, name)))
            .collect()
    }

    /// Give a constructor still carrying the unassigned name the next free
    /// `prefix<int>` name. Returns the assigned name.
    pub fn auto_name(&self, ws: &mut dyn Workspace, id: &BlockId) -> Option<String> {
        let block_type = ws.block_type(id)?;
        let spec = self.specs.get(&block_type)?;
        let current = ws.field_value(id, &spec.name_field);
        if current.is_some() && current.as_deref() != Some(self.unassigned_name(spec).as_str()) {
            return None;
        }

        let name = self.next_free_name(&*ws, &block_type, spec);
        ws.set_field_value(id, &spec.name_field, &name);
        tracing::debug!("[INSTANCES] Named {} '{}'", id, name);
        Some(name)
    }

    fn next_free_name(&self, ws: &dyn Workspace, block_type: &str, spec: &ConstructorSpec) -> String {
        let taken: HashSet<u64> = self
            .instance_names(ws, block_type)
            .iter()
            .filter_map(|(_, name)| numeric_suffix(name, &spec.prefix))
            .collect();
        let next = match taken.iter().max() {
            None => 0,
            Some(max) => match max.checked_add(1) {
                Some(next) => next,
                // Highest suffix is saturated; take the lowest free one.
                None => (0..).find(|n| !taken.contains(n)).unwrap_or_default(),
            },
        };
        format!("{}{}", spec.prefix, next)
    }

    /// Handle any change to a constructor instance: assign a name if it has
    /// none, and reject a name already taken by another instance of the same
    /// type by restoring `previous`.
    pub fn on_constructor_change(&self, ws: &mut dyn Workspace, id: &BlockId, previous: Option<&str>) -> NameChange {
        if let Some(name) = self.auto_name(ws, id) {
            return NameChange::Assigned(name);
        }
        let Some(block_type) = ws.block_type(id) else {
            return NameChange::Unchanged;
        };
        let Some(spec) = self.specs.get(&block_type) else {
            return NameChange::Unchanged;
        };
        let Some(current) = ws.field_value(id, &spec.name_field) else {
            return NameChange::Unchanged;
        };

        let taken = self
            .instance_names(&*ws, &block_type)
            .iter()
            .any(|(other, name)| other != id && *name == current);
        if !taken {
            return NameChange::Unchanged;
        }

        match previous.filter(|p| *p != current) {
            Some(previous) => {
                tracing::warn!(
                    "[INSTANCES] Name '{}' already used by another {}, reverting {} to '{}'",
                    current,
                    block_type,
                    id,
                    previous
                );
                ws.set_field_value(id, &spec.name_field, previous);
                NameChange::Reverted(previous.to_string())
            }
            None => {
                // Duplicated block: nothing to revert to.
                let name = self.next_free_name(&*ws, &block_type, spec);
                ws.set_field_value(id, &spec.name_field, &name);
                NameChange::Assigned(name)
            }
        }
    }

    /// Options of a dropdown bound to `system`.
    ///
    /// `current` is the field's raw value, kept even when stale; `restoring`
    /// is a persisted value whose block is not materialized yet.
    pub fn list_instance_options(
        &self,
        ws: &dyn Workspace,
        system: &str,
        current: Option<&str>,
        restoring: Option<&str>,
    ) -> Vec<DropdownOption> {
        let mut options: Vec<DropdownOption> = Vec::new();

        if let Some(constructor) = self.constructors.get(system) {
            let placeholder = self.specs.get(constructor).map(|spec| self.unassigned_name(spec));
            for (_, name) in self.instance_names(ws, constructor) {
                if name.is_empty() || Some(&name) == placeholder.as_ref() {
                    continue;
                }
                options.push(DropdownOption::new(name.clone(), name));
            }
        }

        for provider in self.providers.get(system).into_iter().flatten() {
            let Some(spec) = self.specs.get(provider) else {
                continue;
            };
            for (provider_id, var) in self.instance_names(ws, provider) {
                for vi in spec.virtual_instances.iter().filter(|vi| vi.instance_of == system) {
                    let value = VirtualInstanceRef::new(provider.clone(), provider_id.clone(), vi.name.clone());
                    options.push(DropdownOption::new(format!("{}.{}", var, vi.name), value.encode()));
                }
            }
        }

        for extra in [current, restoring].into_iter().flatten() {
            if extra.is_empty() || extra == self.no_instance.value {
                continue;
            }
            options.push(DropdownOption::new(self.label_for(ws, extra), extra));
        }

        let mut seen = HashSet::new();
        options.retain(|option| seen.insert(option.value.clone()));
        options.sort_by(|a, b| natural_cmp(&a.label, &b.label));

        if options.is_empty() {
            options.push(self.no_instance.clone());
        }
        options
    }

    fn label_for(&self, ws: &dyn Workspace, value: &str) -> String {
        let Some(reference) = VirtualInstanceRef::decode(value) else {
            return value.to_string();
        };
        let var = self
            .specs
            .get(&reference.provider_type)
            .and_then(|spec| ws.field_value(&reference.provider_id, &spec.name_field));
        match var {
            Some(var) => format!("{}.{}", var, reference.name),
            None => reference.name,
        }
    }

    /// Connection expression of an encoded virtual instance, or `None` when
    /// the value does not decode, the provider block is gone, or it exposes
    /// no virtual instance of that name.
    pub fn resolve_virtual_instance(&self, ws: &dyn Workspace, encoded: &str) -> Option<String> {
        let reference = VirtualInstanceRef::decode(encoded)?;
        if ws.block_type(&reference.provider_id)? != reference.provider_type {
            return None;
        }
        let spec = self.specs.get(&reference.provider_type)?;
        let vi = spec.virtual_instances.iter().find(|vi| vi.name == reference.name)?;
        let var = ws.field_value(&reference.provider_id, &spec.name_field)?;

        let mut values = HashMap::new();
        values.insert(spec.name_field.clone(), var);
        Some(expand_named(&vi.connection, &values))
    }

    /// Re-check a dropdown selection and attach or clear a warning on the
    /// block. Returns whether the selection is valid.
    pub fn validate_selection(&self, ws: &mut dyn Workspace, id: &BlockId, field: &str, system: &str) -> bool {
        let value = ws.field_value(id, field).unwrap_or_default();

        let problem = if value.is_empty() || value == self.no_instance.value {
            Some(format!("No {} instance selected", system))
        } else if VirtualInstanceRef::decode(&value).is_some() {
            match self.resolve_virtual_instance(&*ws, &value) {
                Some(_) => None,
                None => Some(format!("Selected {} instance no longer exists", system)),
            }
        } else {
            let known = self
                .constructors
                .get(system)
                .map(|constructor| {
                    self.instance_names(&*ws, constructor)
                        .iter()
                        .any(|(_, name)| *name == value)
                })
                .unwrap_or(false);
            if known {
                None
            } else {
                Some(format!("Instance '{}' of {} does not exist", value, system))
            }
        };

        if ws.warning(id, field) != problem {
            if let Some(text) = &problem {
                tracing::warn!("[INSTANCES] {}: {}", id, text);
            }
            ws.set_warning(id, field, problem.clone());
        }
        problem.is_none()
    }

    /// Validate every instance dropdown in the workspace. Returns the number
    /// of invalid selections.
    pub fn validate_all(&self, ws: &mut dyn Workspace, registry: &BlockRegistry) -> usize {
        let mut invalid = 0;
        for id in ws.block_ids() {
            let Some(def) = ws.block_type(&id).and_then(|t| registry.definition(&t)) else {
                continue;
            };
            for (field, system) in def.instance_fields() {
                if !self.validate_selection(ws, &id, field, system) {
                    invalid += 1;
                }
            }
        }
        invalid
    }
}

/// `n` when `name` is exactly `prefix` followed by decimal digits.
fn numeric_suffix(name: &str, prefix: &str) -> Option<u64> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Case-insensitive ordering that compares digit runs by value, so
/// `motor_2` sorts before `motor_10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ln = take_digits(&mut left);
                let rn = take_digits(&mut right);
                let ord = ln
                    .trim_start_matches('0')
                    .len()
                    .cmp(&rn.trim_start_matches('0').len())
                    .then_with(|| ln.trim_start_matches('0').cmp(rn.trim_start_matches('0')));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                let ord = l.to_lowercase().cmp(r.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        chars.next();
    }
    digits
}
