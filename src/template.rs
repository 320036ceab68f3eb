//! # Message and Code Templates
//!
//! Both the human-readable message of a block and its code template use
//! `$[NAME]` placeholders. The message decides the visual order of fields
//! and inputs; the code template is expanded at generation time with one
//! fragment per argument.

use crate::library::ArgSpec;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\[([A-Za-z_][A-Za-z0-9_]*)\]").expect("placeholder pattern is valid")
    })
}

/// Placeholder names in order of appearance, duplicates included.
pub fn placeholders(text: &str) -> Vec<&str> {
    placeholder_regex()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Whether `text` contains `$[name]`.
pub fn has_placeholder(text: &str, name: &str) -> bool {
    placeholders(text).contains(&name)
}

/// Visual layout of a block: the message with placeholders replaced by
/// positional slots (`%1`, `%2`, ...) and the arguments in slot order.
#[derive(Debug, Clone, PartialEq)]
pub struct InputOrder<'a> {
    pub message: String,
    pub args: Vec<&'a ArgSpec>,
}

/// Assign every placeholder of `message` a positional slot in order of
/// appearance, then append a trailing slot for each argument the message
/// never mentions.
///
/// A placeholder without a matching argument stays in the message as text.
pub fn build_input_order<'a>(message: &str, args: &'a [ArgSpec]) -> InputOrder<'a> {
    let mut ordered: Vec<&'a ArgSpec> = Vec::with_capacity(args.len());

    let mut rendered = placeholder_regex()
        .replace_all(message, |caps: &Captures| {
            let name = &caps[1];
            match args.iter().find(|arg| arg.name == name) {
                Some(arg) if !ordered.iter().any(|a| a.name == arg.name) => {
                    ordered.push(arg);
                    format!("%{}", ordered.len())
                }
                _ => caps[0].to_string(),
            }
        })
        .into_owned();

    for arg in args {
        if !ordered.iter().any(|a| a.name == arg.name) {
            ordered.push(arg);
            if !rendered.is_empty() {
                rendered.push(' ');
            }
            rendered.push_str(&format!("%{}", ordered.len()));
        }
    }

    InputOrder {
        message: rendered,
        args: ordered,
    }
}

/// Substitute resolved fragments into a code template.
///
/// Only arguments of the block are substituted; any other placeholder is
/// left as literal text. Fragments are inserted verbatim in a single pass,
/// so placeholders inside them are never expanded.
pub fn expand_template(code: &str, args: &[ArgSpec], fragments: &HashMap<String, String>) -> String {
    placeholder_regex()
        .replace_all(code, |caps: &Captures| {
            let name = &caps[1];
            if args.iter().any(|arg| arg.name == name) {
                if let Some(fragment) = fragments.get(name) {
                    return fragment.clone();
                }
            }
            caps[0].to_string()
        })
        .into_owned()
}

/// Expand a template with ad-hoc named values, ignoring argument specs.
/// Used for virtual-instance connection expressions.
pub fn expand_named(code: &str, values: &HashMap<String, String>) -> String {
    placeholder_regex()
        .replace_all(code, |caps: &Captures| {
            values
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Indent every non-empty line of `code`.
pub fn prefix_lines(code: &str, indent: &str) -> String {
    let mut out = String::with_capacity(code.len());
    for line in code.split_inclusive('\n') {
        if !line.trim().is_empty() {
            out.push_str(indent);
        }
        out.push_str(line);
    }
    out
}
