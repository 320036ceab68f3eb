//! # Schema Validation
//!
//! Turns raw JSON into typed library documents. Validation is total and
//! side-effect-free: the first mismatch aborts with an
//! [`CompileError::InvalidConfiguration`] naming the document and the path
//! of the offending field.

use super::{
    ArgKind, ArgSpec, BlockDefinition, ConstructorSpec, DropdownSource, LibraryBody, LibraryDocument,
    LibraryItem, OutputSpec, Style, VirtualInstanceDef,
};
use crate::codegen::Order;
use crate::config::DropdownOption;
use crate::error::{CompileError, Result};
use crate::template;
use serde_json::{Map, Value};
use std::collections::HashSet;

const DOCUMENT_KEYS: &[&str] = &[
    "category",
    "name",
    "description",
    "docs",
    "color",
    "style",
    "imports",
    "priority",
    "parent",
    "contents",
    "custom",
];

const BLOCK_KEYS: &[&str] = &[
    "kind",
    "type",
    "message",
    "args",
    "code",
    "previous",
    "next",
    "output",
    "order",
    "programStart",
    "constructs",
    "hidden",
    "tooltip",
    "helpUrl",
    "color",
    "style",
    "inputsInline",
];

/// Validate a whole library document.
pub fn validate_document(source: &str, value: &Value) -> Result<LibraryDocument> {
    let v = Validator { source };
    let obj = v.object(value, "")?;
    v.reject_unknown(obj, DOCUMENT_KEYS, "")?;

    let category = v.required_identifier(obj, "category", "")?;
    let name = v.optional_str(obj, "name", "")?.unwrap_or_else(|| category.clone());
    let imports = v
        .optional_array(obj, "imports", "")?
        .iter()
        .enumerate()
        .map(|(i, item)| v.string(item, &index(&join("", "imports"), i)))
        .collect::<Result<Vec<_>>>()?;

    let body = match (obj.get("contents"), obj.get("custom")) {
        (Some(_), Some(_)) => {
            return Err(v.error("custom", "a category has either `contents` or `custom`, not both"));
        }
        (None, None) => {
            return Err(v.error("contents", "missing required field"));
        }
        (None, Some(custom)) => LibraryBody::Custom(v.string(custom, "custom")?),
        (Some(contents), None) => LibraryBody::Contents(v.contents(contents)?),
    };

    let document = LibraryDocument {
        source: source.to_string(),
        category,
        name,
        description: v.optional_str(obj, "description", "")?,
        docs_url: v.optional_str(obj, "docs", "")?,
        style: v.style(obj, "")?,
        imports,
        priority: v.optional_i64(obj, "priority", "")?,
        parent: v.optional_str(obj, "parent", "")?,
        body,
    };

    tracing::debug!(
        "[SCHEMA] {} validated: category '{}', {} blocks",
        source,
        document.category,
        document.blocks().count()
    );
    Ok(document)
}

/// Validate one block definition found at `path` inside `source`.
pub fn validate_block(source: &str, path: &str, value: &Value) -> Result<BlockDefinition> {
    Validator { source }.block(value, path)
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn index(path: &str, i: usize) -> String {
    format!("{}[{}]", path, i)
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

struct Validator<'a> {
    source: &'a str,
}

impl<'a> Validator<'a> {
    fn error(&self, path: &str, reason: impl Into<String>) -> CompileError {
        CompileError::invalid(self.source, path, reason)
    }

    fn object<'v>(&self, value: &'v Value, path: &str) -> Result<&'v Map<String, Value>> {
        value
            .as_object()
            .ok_or_else(|| self.error(path, format!("expected an object, found {}", describe(value))))
    }

    fn string(&self, value: &Value, path: &str) -> Result<String> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.error(path, format!("expected a string, found {}", describe(value))))
    }

    fn reject_unknown(&self, obj: &Map<String, Value>, allowed: &[&str], path: &str) -> Result<()> {
        match obj.keys().find(|key| !allowed.contains(&key.as_str())) {
            Some(key) => Err(self.error(&join(path, key), "unknown field")),
            None => Ok(()),
        }
    }

    fn required_str(&self, obj: &Map<String, Value>, key: &str, path: &str) -> Result<String> {
        let field = join(path, key);
        match obj.get(key) {
            Some(value) => self.string(value, &field),
            None => Err(self.error(&field, "missing required field")),
        }
    }

    fn required_identifier(&self, obj: &Map<String, Value>, key: &str, path: &str) -> Result<String> {
        let text = self.required_str(obj, key, path)?;
        if text.is_empty() || text.chars().any(char::is_whitespace) {
            return Err(self.error(&join(path, key), format!("`{}` is not a valid identifier", text)));
        }
        Ok(text)
    }

    fn optional_str(&self, obj: &Map<String, Value>, key: &str, path: &str) -> Result<Option<String>> {
        match obj.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.string(value, &join(path, key)).map(Some),
        }
    }

    fn optional_bool(&self, obj: &Map<String, Value>, key: &str, path: &str) -> Result<Option<bool>> {
        match obj.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.error(&join(path, key), format!("expected a boolean, found {}", describe(other)))),
        }
    }

    fn optional_i64(&self, obj: &Map<String, Value>, key: &str, path: &str) -> Result<Option<i64>> {
        match obj.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| self.error(&join(path, key), format!("expected an integer, found {}", describe(value)))),
        }
    }

    fn optional_f64(&self, obj: &Map<String, Value>, key: &str, path: &str) -> Result<Option<f64>> {
        match obj.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.error(&join(path, key), format!("expected a number, found {}", describe(value)))),
        }
    }

    fn optional_array<'v>(&self, obj: &'v Map<String, Value>, key: &str, path: &str) -> Result<&'v [Value]> {
        match obj.get(key) {
            None | Some(Value::Null) => Ok(&[]),
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(self.error(&join(path, key), format!("expected an array, found {}", describe(other)))),
        }
    }

    fn style(&self, obj: &Map<String, Value>, path: &str) -> Result<Option<Style>> {
        let colour = match obj.get("color") {
            None | Some(Value::Null) => None,
            Some(Value::String(hex)) => Some(Style::Colour(hex.clone())),
            Some(Value::Number(n)) => match n.as_u64() {
                Some(hue) if hue <= 360 => Some(Style::Colour(hue.to_string())),
                _ => return Err(self.error(&join(path, "color"), "hue must be an integer between 0 and 360")),
            },
            Some(other) => {
                return Err(self.error(
                    &join(path, "color"),
                    format!("expected a colour string or hue, found {}", describe(other)),
                ))
            }
        };
        let named = self.optional_str(obj, "style", path)?;
        match (colour, named) {
            (Some(_), Some(_)) => Err(self.error(&join(path, "style"), "`color` and `style` are mutually exclusive")),
            (Some(colour), None) => Ok(Some(colour)),
            (None, Some(name)) => Ok(Some(Style::Named(name))),
            (None, None) => Ok(None),
        }
    }

    fn contents(&self, value: &Value) -> Result<Vec<LibraryItem>> {
        let items = value
            .as_array()
            .ok_or_else(|| self.error("contents", format!("expected an array, found {}", describe(value))))?;

        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let path = index("contents", i);
            let obj = self.object(item, &path)?;
            let kind = self.optional_str(obj, "kind", &path)?;
            match kind.as_deref() {
                None | Some("block") => {
                    let def = self.block(item, &path)?;
                    if !seen.insert(def.block_type.clone()) {
                        return Err(self.error(
                            &join(&path, "type"),
                            format!("block type `{}` is defined twice in this document", def.block_type),
                        ));
                    }
                    out.push(LibraryItem::Block(def));
                }
                Some("label") => {
                    self.reject_unknown(obj, &["kind", "text"], &path)?;
                    out.push(LibraryItem::Label(self.required_str(obj, "text", &path)?));
                }
                Some("sep") | Some("separator") => {
                    self.reject_unknown(obj, &["kind", "gap"], &path)?;
                    let gap = match self.optional_i64(obj, "gap", &path)? {
                        Some(gap) => Some(
                            u32::try_from(gap).map_err(|_| self.error(&join(&path, "gap"), "gap must be non-negative"))?,
                        ),
                        None => None,
                    };
                    out.push(LibraryItem::Separator(gap));
                }
                Some(other) => {
                    return Err(self.error(&join(&path, "kind"), format!("unknown item kind `{}`", other)));
                }
            }
        }
        Ok(out)
    }

    fn block(&self, value: &Value, path: &str) -> Result<BlockDefinition> {
        let obj = self.object(value, path)?;
        let block_type = self.required_identifier(obj, "type", path)?;
        let message = self.optional_str(obj, "message", path)?.unwrap_or_default();

        let mut args: Vec<ArgSpec> = Vec::new();
        for (i, raw) in self.optional_array(obj, "args", path)?.iter().enumerate() {
            let arg_path = index(&join(path, "args"), i);
            let arg = self.arg(raw, &arg_path)?;
            if args.iter().any(|a| a.name == arg.name) {
                return Err(self.error(&join(&arg_path, "name"), format!("duplicate argument `{}`", arg.name)));
            }
            args.push(arg);
        }

        let mut mentioned = HashSet::new();
        for name in template::placeholders(&message) {
            if !mentioned.insert(name) {
                return Err(self.error(
                    &join(path, "message"),
                    format!("placeholder `$[{}]` appears more than once", name),
                ));
            }
            if !args.iter().any(|a| a.name == name) {
                return Err(self.error(
                    &join(path, "message"),
                    format!("placeholder `$[{}]` has no matching argument", name),
                ));
            }
        }

        let output = match obj.get("output") {
            None | Some(Value::Null) | Some(Value::Bool(false)) => None,
            Some(Value::Bool(true)) => Some(OutputSpec { check: None }),
            Some(Value::String(check)) => Some(OutputSpec {
                check: Some(check.clone()),
            }),
            Some(other) => {
                return Err(self.error(
                    &join(path, "output"),
                    format!("expected a boolean or type name, found {}", describe(other)),
                ))
            }
        };
        let previous = self.optional_bool(obj, "previous", path)?.unwrap_or(false);
        let next = self.optional_bool(obj, "next", path)?.unwrap_or(false);
        if output.is_some() && (previous || next) {
            return Err(self.error(
                &join(path, "output"),
                "a value block cannot also connect to previous or next statements",
            ));
        }

        let order = match obj.get("order") {
            None | Some(Value::Null) => Order::default(),
            Some(raw) => self.order(raw, &join(path, "order"))?,
        };

        let program_start = self.optional_bool(obj, "programStart", path)?.unwrap_or(false);
        if program_start && (previous || output.is_some()) {
            return Err(self.error(
                &join(path, "programStart"),
                "a program start block cannot have a previous connection or an output",
            ));
        }

        let constructs = match obj.get("constructs") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(self.constructor(raw, &join(path, "constructs"), &args)?),
        };

        let extra: Map<String, Value> = obj
            .iter()
            .filter(|(key, _)| !BLOCK_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(BlockDefinition {
            block_type,
            message,
            args,
            code: self.optional_str(obj, "code", path)?,
            previous,
            next,
            output,
            order,
            program_start,
            constructs,
            hidden: self.optional_bool(obj, "hidden", path)?.unwrap_or(false),
            tooltip: self.optional_str(obj, "tooltip", path)?,
            help_url: self.optional_str(obj, "helpUrl", path)?,
            style: self.style(obj, path)?,
            inputs_inline: self.optional_bool(obj, "inputsInline", path)?,
            extra,
        })
    }

    fn order(&self, value: &Value, path: &str) -> Result<Order> {
        serde_json::from_value(value.clone())
            .map_err(|_| self.error(path, format!("unknown precedence class {}", value)))
    }

    fn arg(&self, value: &Value, path: &str) -> Result<ArgSpec> {
        let obj = self.object(value, path)?;
        let name = self.required_str(obj, "name", path)?;
        if !is_identifier(&name) {
            return Err(self.error(&join(path, "name"), format!("`{}` is not a valid argument name", name)));
        }
        let type_name = self.required_str(obj, "type", path)?;

        let kind = match type_name.as_str() {
            "field_input" => ArgKind::TextInput {
                default: self.optional_str(obj, "text", path)?.unwrap_or_default(),
            },
            "field_number" => ArgKind::Number {
                default: self.optional_f64(obj, "value", path)?.unwrap_or(0.0),
                min: self.optional_f64(obj, "min", path)?,
                max: self.optional_f64(obj, "max", path)?,
            },
            "field_checkbox" => ArgKind::Checkbox {
                checked: self.optional_bool(obj, "checked", path)?.unwrap_or(false),
            },
            "field_dropdown" => ArgKind::Dropdown(self.dropdown(obj, path)?),
            "input_value" => ArgKind::Value {
                check: self.optional_str(obj, "check", path)?,
                order: match obj.get("order") {
                    None | Some(Value::Null) => Order::None,
                    Some(raw) => self.order(raw, &join(path, "order"))?,
                },
            },
            "input_statement" => ArgKind::Statement {
                check: self.optional_str(obj, "check", path)?,
            },
            other => {
                return Err(self.error(&join(path, "type"), format!("unknown argument type `{}`", other)));
            }
        };

        Ok(ArgSpec { name, kind })
    }

    fn dropdown(&self, obj: &Map<String, Value>, path: &str) -> Result<DropdownSource> {
        match (obj.get("options"), self.optional_str(obj, "instanceOf", path)?) {
            (Some(_), Some(_)) => Err(self.error(
                &join(path, "instanceOf"),
                "a dropdown has either static `options` or `instanceOf`, not both",
            )),
            (None, Some(system)) => Ok(DropdownSource::Instances(system)),
            (None, None) => Err(self.error(&join(path, "options"), "missing required field")),
            (Some(raw), None) => {
                let options_path = join(path, "options");
                let items = raw.as_array().ok_or_else(|| {
                    self.error(&options_path, format!("expected an array, found {}", describe(raw)))
                })?;
                if items.is_empty() {
                    return Err(self.error(&options_path, "a dropdown needs at least one option"));
                }
                let options = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let item_path = index(&options_path, i);
                        match item.as_array().map(Vec::as_slice) {
                            Some([label, value]) => Ok(DropdownOption::new(
                                self.string(label, &index(&item_path, 0))?,
                                self.string(value, &index(&item_path, 1))?,
                            )),
                            _ => Err(self.error(&item_path, "expected a [label, value] pair")),
                        }
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(DropdownSource::Static(options))
            }
        }
    }

    fn constructor(&self, value: &Value, path: &str, args: &[ArgSpec]) -> Result<ConstructorSpec> {
        let spec = match value {
            Value::String(system) => ConstructorSpec {
                system: system.clone(),
                prefix: format!("{}_", system),
                name_field: "NAME".to_string(),
                virtual_instances: Vec::new(),
            },
            Value::Object(obj) => {
                self.reject_unknown(obj, &["system", "prefix", "field", "virtualInstances"], path)?;
                let system = self.required_identifier(obj, "system", path)?;
                let mut virtual_instances = Vec::new();
                for (i, raw) in self.optional_array(obj, "virtualInstances", path)?.iter().enumerate() {
                    let vi_path = index(&join(path, "virtualInstances"), i);
                    let vi = self.object(raw, &vi_path)?;
                    self.reject_unknown(vi, &["instanceOf", "name", "connection"], &vi_path)?;
                    let def = VirtualInstanceDef {
                        instance_of: self.required_identifier(vi, "instanceOf", &vi_path)?,
                        name: self.required_identifier(vi, "name", &vi_path)?,
                        connection: self.required_str(vi, "connection", &vi_path)?,
                    };
                    if virtual_instances.iter().any(|d: &VirtualInstanceDef| d.name == def.name) {
                        return Err(self.error(
                            &join(&vi_path, "name"),
                            format!("duplicate virtual instance `{}`", def.name),
                        ));
                    }
                    virtual_instances.push(def);
                }
                ConstructorSpec {
                    prefix: self.optional_str(obj, "prefix", path)?.unwrap_or_else(|| format!("{}_", system)),
                    name_field: self.optional_str(obj, "field", path)?.unwrap_or_else(|| "NAME".to_string()),
                    system,
                    virtual_instances,
                }
            }
            other => {
                return Err(self.error(path, format!("expected a system name or object, found {}", describe(other))));
            }
        };

        match args.iter().find(|a| a.name == spec.name_field) {
            Some(ArgSpec {
                kind: ArgKind::TextInput { .. },
                ..
            }) => Ok(spec),
            Some(_) => Err(self.error(
                path,
                format!("name field `{}` must be a field_input", spec.name_field),
            )),
            None => Err(self.error(
                path,
                format!("name field `{}` is not an argument of the block", spec.name_field),
            )),
        }
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path_of(err: CompileError) -> String {
        match err {
            CompileError::InvalidConfiguration { path, .. } => path,
            other => panic!("expected invalid configuration, got {other:?}"),
        }
    }

    fn motor_doc() -> Value {
        json!({
            "category": "motors",
            "name": "Motors",
            "color": 210,
            "imports": ["import * as motor from \"motor\";"],
            "contents": [
                {"kind": "label", "text": "Basics"},
                {
                    "type": "motor_spin",
                    "message": "spin $[SPEED]",
                    "args": [{"name": "SPEED", "type": "input_value", "check": "Number"}],
                    "code": "motor.spin($[SPEED]);",
                    "previous": true,
                    "next": true
                },
                {"kind": "sep", "gap": 8}
            ]
        })
    }

    #[test]
    fn accepts_well_formed_document() {
        let doc = validate_document("motors.json", &motor_doc()).unwrap();
        assert_eq!(doc.category, "motors");
        assert_eq!(doc.style, Some(Style::Colour("210".to_string())));
        assert_eq!(doc.imports.len(), 1);
        let blocks: Vec<_> = doc.blocks().collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind(), crate::library::BlockKind::Statement);
    }

    #[test]
    fn reports_path_of_bad_argument_type() {
        let mut doc = motor_doc();
        doc["contents"][1]["args"][0]["type"] = json!("input_banana");
        let err = validate_document("motors.json", &doc).unwrap_err();
        assert_eq!(path_of(err), "contents[1].args[0].type");
    }

    #[test]
    fn rejects_placeholder_without_argument() {
        let mut doc = motor_doc();
        doc["contents"][1]["message"] = json!("spin $[SPEED] for $[TIME]");
        let err = validate_document("motors.json", &doc).unwrap_err();
        assert_eq!(path_of(err.clone()), "contents[1].message");
        assert!(err.to_string().contains("TIME"));
    }

    #[test]
    fn rejects_value_block_with_statement_connections() {
        let mut doc = motor_doc();
        doc["contents"][1]["output"] = json!("Number");
        let err = validate_document("motors.json", &doc).unwrap_err();
        assert_eq!(path_of(err), "contents[1].output");
    }

    #[test]
    fn rejects_contents_and_custom_together() {
        let mut doc = motor_doc();
        doc["custom"] = json!("VARIABLE");
        assert_eq!(path_of(validate_document("x", &doc).unwrap_err()), "custom");
    }

    #[test]
    fn rejects_unknown_document_field() {
        let mut doc = motor_doc();
        doc["colour"] = json!("#fff");
        assert_eq!(path_of(validate_document("x", &doc).unwrap_err()), "colour");
    }

    #[test]
    fn constructor_shorthand_uses_defaults() {
        let def = validate_block(
            "nvs.json",
            "contents[0]",
            &json!({
                "type": "nvs_open",
                "message": "open $[NAME]",
                "args": [{"name": "NAME", "type": "field_input", "text": "nvs_?"}],
                "code": "const $[NAME] = nvs.open();",
                "constructs": "nvs"
            }),
        )
        .unwrap();
        let spec = def.constructs.as_ref().unwrap();
        assert_eq!(spec.prefix, "nvs_");
        assert_eq!(spec.name_field, "NAME");
        assert_eq!(def.kind(), crate::library::BlockKind::Root);
    }

    #[test]
    fn constructor_needs_text_name_field() {
        let err = validate_block(
            "nvs.json",
            "contents[0]",
            &json!({
                "type": "nvs_open",
                "args": [{"name": "NAME", "type": "field_number"}],
                "constructs": {"system": "nvs"}
            }),
        )
        .unwrap_err();
        assert_eq!(path_of(err), "contents[0].constructs");
    }

    #[test]
    fn unknown_block_keys_are_forwarded() {
        let def = validate_block("x", "", &json!({"type": "a", "extensions": ["math_op"]})).unwrap();
        assert_eq!(def.extra.get("extensions"), Some(&json!(["math_op"])));
    }

    #[test]
    fn static_dropdown_requires_pairs() {
        let err = validate_block(
            "x",
            "contents[3]",
            &json!({
                "type": "pick",
                "args": [{"name": "P", "type": "field_dropdown", "options": [["a", "A"], ["b"]]}]
            }),
        )
        .unwrap_err();
        assert_eq!(path_of(err), "contents[3].args[0].options[1]");
    }
}
