//! # Message References
//!
//! Library documents may refer to translations with `%{BKY_KEY}`. The
//! localization pass swaps every reference in display strings for the text
//! of the active [`Messages`] catalog before a document is validated.

use crate::error::{CompileError, Result};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Keys whose string values are display text.
const LOCALIZED_KEYS: &[&str] = &["name", "description", "tooltip", "message", "text"];

/// Translations resolve through at most this many nested references.
const MAX_DEPTH: usize = 4;

fn reference_regex() -> &'static Regex {
    static REFERENCE: OnceLock<Regex> = OnceLock::new();
    REFERENCE.get_or_init(|| Regex::new(r"%\{BKY_([A-Za-z0-9_]+)\}").expect("reference pattern is valid"))
}

/// Translation catalog, keyed without the `BKY_` prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Messages(HashMap<String, String>);

impl Messages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            CompileError::invalid("messages", format!("line {}, column {}", e.line(), e.column()), e.to_string())
        })
    }

    pub fn insert(&mut self, key: impl Into<String>, text: impl Into<String>) {
        self.0.insert(key.into(), text.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace every `%{BKY_KEY}` in `text`. Unknown keys stay as written.
    pub fn resolve(&self, text: &str) -> String {
        let mut current = text.to_string();
        for _ in 0..MAX_DEPTH {
            if !reference_regex().is_match(&current) {
                break;
            }
            let mut replaced_any = false;
            let next = reference_regex()
                .replace_all(&current, |caps: &Captures| match self.get(&caps[1]) {
                    Some(text) => {
                        replaced_any = true;
                        text.to_string()
                    }
                    None => {
                        tracing::warn!("[I18N] No translation for message key '{}'", &caps[1]);
                        caps[0].to_string()
                    }
                })
                .into_owned();
            current = next;
            if !replaced_any {
                break;
            }
        }
        current
    }

    /// Localize display strings of a raw library document in place: names,
    /// descriptions, tooltips, messages, label text and dropdown option labels.
    pub fn localize_document(&self, value: &mut Value) {
        match value {
            Value::Object(obj) => {
                for (key, child) in obj.iter_mut() {
                    match child {
                        Value::String(text) if LOCALIZED_KEYS.contains(&key.as_str()) => {
                            *text = self.resolve(text);
                        }
                        Value::Array(options) if key == "options" => {
                            for option in options.iter_mut() {
                                if let Some(Value::String(label)) = option.get_mut(0) {
                                    *label = self.resolve(label);
                                }
                            }
                        }
                        _ => self.localize_document(child),
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.localize_document(item);
                }
            }
            _ => {}
        }
    }
}

impl FromIterator<(String, String)> for Messages {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
