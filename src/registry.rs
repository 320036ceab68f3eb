//! # Block Registry
//!
//! Maps every known block type to the shape the editor renders and the
//! generator that turns an instance into code. Registrations persist until
//! [`BlockRegistry::reset`], which the session calls before each full reload.

use crate::codegen::{BlockCodeGenerator, Generated};
use crate::error::{CompileError, Result};
use crate::library::{ArgKind, BlockDefinition, BlockKind, DropdownSource, LibraryDocument, Style};
use crate::template::build_input_order;
use crate::workspace::BlockId;
use serde_json::{json, Map, Value};
use std::collections::{BTreeSet, HashMap};

/// Generator for blocks whose code is not template-driven, e.g. the host's
/// procedure definitions.
pub type NativeGenerator = fn(&mut BlockCodeGenerator<'_>, &BlockId) -> Result<Generated>;

#[derive(Debug, Clone)]
pub enum Generator {
    Template(String),
    /// Declared without code; generation fails lazily.
    Missing,
    Native(NativeGenerator),
}

#[derive(Debug, Clone)]
pub struct RegisteredBlock {
    pub kind: BlockKind,
    pub program_start: bool,
    /// Category of the library that registered the block.
    pub library: Option<String>,
    /// Program imports declared by the document the block came from.
    pub imports: Vec<String>,
    pub definition: Option<BlockDefinition>,
    /// Editor-facing shape descriptor.
    pub shape: Option<Value>,
    pub generator: Generator,
}

#[derive(Debug, Default)]
pub struct BlockRegistry {
    blocks: HashMap<String, RegisteredBlock>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        tracing::debug!("[REGISTRY] Clearing {} block registrations", self.blocks.len());
        self.blocks.clear();
    }

    /// Register every block of a validated document together with the
    /// imports that document declares.
    pub fn register_library(&mut self, document: &LibraryDocument) -> Result<()> {
        for def in document.blocks() {
            self.insert(&document.category, def.clone(), document.imports.clone())?;
        }
        Ok(())
    }

    /// Install the shape and generator of `def`. A type registered before is
    /// overwritten: the last loaded document wins.
    pub fn register_block(&mut self, library: &str, def: BlockDefinition) -> Result<()> {
        self.insert(library, def, Vec::new())
    }

    fn insert(&mut self, library: &str, def: BlockDefinition, imports: Vec<String>) -> Result<()> {
        validate_for_kind(library, &def)?;

        let block_type = def.block_type.clone();
        let generator = match &def.code {
            Some(code) => Generator::Template(code.clone()),
            None => Generator::Missing,
        };
        let registered = RegisteredBlock {
            kind: def.kind(),
            program_start: def.program_start,
            library: Some(library.to_string()),
            imports,
            shape: Some(block_shape(&def)),
            generator,
            definition: Some(def),
        };

        if let Some(previous) = self.blocks.insert(block_type.clone(), registered) {
            tracing::warn!(
                "[REGISTRY] Block type '{}' from '{}' replaced by '{}'",
                block_type,
                previous.library.as_deref().unwrap_or("<native>"),
                library
            );
        } else {
            tracing::debug!("[REGISTRY] Registered '{}' from '{}'", block_type, library);
        }
        Ok(())
    }

    pub fn register_native(&mut self, block_type: &str, kind: BlockKind, generator: NativeGenerator) {
        self.blocks.insert(
            block_type.to_string(),
            RegisteredBlock {
                kind,
                program_start: false,
                library: None,
                imports: Vec::new(),
                definition: None,
                shape: None,
                generator: Generator::Native(generator),
            },
        );
    }

    pub fn get(&self, block_type: &str) -> Option<&RegisteredBlock> {
        self.blocks.get(block_type)
    }

    pub fn definition(&self, block_type: &str) -> Option<&BlockDefinition> {
        self.get(block_type).and_then(|b| b.definition.as_ref())
    }

    pub fn shape(&self, block_type: &str) -> Option<&Value> {
        self.get(block_type).and_then(|b| b.shape.as_ref())
    }

    pub fn is_program_start(&self, block_type: &str) -> bool {
        self.get(block_type).map(|b| b.program_start).unwrap_or(false)
    }

    /// Every template-defined block, in no particular order.
    pub fn definitions(&self) -> impl Iterator<Item = &BlockDefinition> {
        self.blocks.values().filter_map(|b| b.definition.as_ref())
    }

    /// Sorted, deduplicated imports of the documents that registered `block_types`.
    pub fn imports_for<'t>(&self, block_types: impl IntoIterator<Item = &'t str>) -> Vec<String> {
        let mut imports = BTreeSet::new();
        for block_type in block_types {
            if let Some(block) = self.get(block_type) {
                imports.extend(block.imports.iter().cloned());
            }
        }
        imports.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Checks a definition against what its kind needs. Definitions coming out
/// of the schema validator always pass; hand-built ones may not.
fn validate_for_kind(library: &str, def: &BlockDefinition) -> Result<()> {
    let path = def.block_type.as_str();
    if def.block_type.is_empty() {
        return Err(CompileError::invalid(library, "type", "block type is empty"));
    }
    if def.output.is_some() && (def.previous || def.next) {
        return Err(CompileError::invalid(
            library,
            path,
            "a value block cannot also connect to previous or next statements",
        ));
    }
    if def.program_start && def.kind() != BlockKind::Root {
        return Err(CompileError::invalid(library, path, "a program start block must be a root block"));
    }
    if let Some(spec) = &def.constructs {
        if !matches!(def.arg(&spec.name_field).map(|a| &a.kind), Some(ArgKind::TextInput { .. })) {
            return Err(CompileError::invalid(
                library,
                path,
                format!("constructor name field `{}` must be a field_input", spec.name_field),
            ));
        }
    }
    for (field, system) in def.instance_fields() {
        if system.is_empty() {
            return Err(CompileError::invalid(
                library,
                format!("{}.{}", path, field),
                "instance dropdown names no system",
            ));
        }
    }
    Ok(())
}

/// Editor shape descriptor in the editor's JSON block format.
pub fn block_shape(def: &BlockDefinition) -> Value {
    let layout = build_input_order(&def.message, &def.args);
    let args: Vec<Value> = layout
        .args
        .iter()
        .map(|arg| {
            let mut obj = Map::new();
            obj.insert("type".into(), json!(arg.kind.type_name()));
            obj.insert("name".into(), json!(arg.name));
            match &arg.kind {
                ArgKind::TextInput { default } => {
                    obj.insert("text".into(), json!(default));
                }
                ArgKind::Number { default, min, max } => {
                    obj.insert("value".into(), json!(default));
                    if let Some(min) = min {
                        obj.insert("min".into(), json!(min));
                    }
                    if let Some(max) = max {
                        obj.insert("max".into(), json!(max));
                    }
                }
                ArgKind::Checkbox { checked } => {
                    obj.insert("checked".into(), json!(checked));
                }
                ArgKind::Dropdown(DropdownSource::Static(options)) => {
                    let pairs: Vec<Value> = options.iter().map(|o| json!([o.label, o.value])).collect();
                    obj.insert("options".into(), Value::Array(pairs));
                }
                ArgKind::Dropdown(DropdownSource::Instances(system)) => {
                    obj.insert("instanceOf".into(), json!(system));
                }
                ArgKind::Value { check, .. } | ArgKind::Statement { check } => {
                    if let Some(check) = check {
                        obj.insert("check".into(), json!(check));
                    }
                }
            }
            Value::Object(obj)
        })
        .collect();

    let mut shape = Map::new();
    shape.insert("type".into(), json!(def.block_type));
    shape.insert("message0".into(), json!(layout.message));
    shape.insert("args0".into(), Value::Array(args));
    if def.previous {
        shape.insert("previousStatement".into(), Value::Null);
    }
    if def.next {
        shape.insert("nextStatement".into(), Value::Null);
    }
    if let Some(output) = &def.output {
        shape.insert("output".into(), json!(output.check));
    }
    match &def.style {
        Some(Style::Colour(colour)) => {
            shape.insert("colour".into(), json!(colour));
        }
        Some(Style::Named(style)) => {
            shape.insert("style".into(), json!(style));
        }
        None => {}
    }
    if let Some(tooltip) = &def.tooltip {
        shape.insert("tooltip".into(), json!(tooltip));
    }
    if let Some(url) = &def.help_url {
        shape.insert("helpUrl".into(), json!(url));
    }
    if let Some(inline) = def.inputs_inline {
        shape.insert("inputsInline".into(), json!(inline));
    }
    for (key, value) in &def.extra {
        shape.entry(key.clone()).or_insert_with(|| value.clone());
    }
    Value::Object(shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::validate_block;

    fn spin() -> BlockDefinition {
        validate_block(
            "motors.json",
            "",
            &json!({
                "type": "motor_spin",
                "message": "spin $[SPEED]",
                "args": [
                    {"name": "PORT", "type": "field_dropdown", "options": [["A", "0"], ["B", "1"]]},
                    {"name": "SPEED", "type": "input_value", "check": "Number"}
                ],
                "code": "motor.spin($[SPEED]);",
                "previous": true,
                "next": true,
                "tooltip": "Spin the motor"
            }),
        )
        .unwrap()
    }

    #[test]
    fn shape_orders_arguments_by_message() {
        let shape = block_shape(&spin());
        assert_eq!(shape["message0"], json!("spin %1 %2"));
        assert_eq!(shape["args0"][0]["name"], json!("SPEED"));
        assert_eq!(shape["args0"][1]["options"], json!([["A", "0"], ["B", "1"]]));
        assert!(shape.as_object().unwrap().contains_key("previousStatement"));
        assert!(!shape.as_object().unwrap().contains_key("output"));
    }

    #[test]
    fn reregistration_overwrites() {
        let mut registry = BlockRegistry::new();
        registry.register_block("motors", spin()).unwrap();
        let mut replacement = spin();
        replacement.code = Some("motor.go($[SPEED]);".to_string());
        registry.register_block("drive", replacement).unwrap();

        assert_eq!(registry.len(), 1);
        let block = registry.get("motor_spin").unwrap();
        assert_eq!(block.library.as_deref(), Some("drive"));
        assert!(matches!(&block.generator, Generator::Template(code) if code.starts_with("motor.go")));
    }

    #[test]
    fn hand_built_program_start_must_be_root() {
        let mut def = spin();
        def.program_start = true;
        let err = BlockRegistry::new().register_block("motors", def).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn imports_follow_the_registering_document() {
        let mut registry = BlockRegistry::new();
        for (source, block_type, import) in [("a.json", "spin_a", "import a;"), ("b.json", "spin_b", "import b;")] {
            let doc = crate::library::validate_document(
                source,
                &json!({
                    "category": "motors",
                    "imports": [import],
                    "contents": [{"type": block_type, "message": "go", "previous": true, "code": "go();"}]
                }),
            )
            .unwrap();
            registry.register_library(&doc).unwrap();
        }

        assert_eq!(registry.imports_for(["spin_a"]), vec!["import a;".to_string()]);
        assert_eq!(registry.imports_for(["spin_a", "spin_b", "spin_a"]), vec!["import a;", "import b;"]);
    }

    #[test]
    fn reset_clears_everything() {
        let mut registry = BlockRegistry::new();
        registry.register_block("motors", spin()).unwrap();
        registry.reset();
        assert!(registry.is_empty());
        assert!(registry.imports_for(["motor_spin"]).is_empty());
    }
}
