//! Field filtering
//!
//! The same `FilterConfig` decides which flat fields leave the system for
//! translation and how the translated values are merged back:
//!
//! - `ignore`: fields whose path contains one of the names never travel
//! - `copy_by_name` / `copy_by_regex`: fields copied to the target untranslated
//! - `drop_empty`: zero-length values are not sent
//!
//! Nothing filtered here is lost: the decoder rebuilds every field from the
//! source snapshot and only overlays what came back translated.

use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::TranscodeError;
use crate::flatten::FlatField;
use crate::tree::Node;

/// Inclusion/exclusion rules for flat fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Path substrings excluded from translation and from the decoded result
    pub ignore: Vec<String>,
    /// Path substrings copied without translation
    pub copy_by_name: Vec<String>,
    /// Value patterns (case-insensitive) copied without translation
    pub copy_by_regex: Vec<String>,
    /// Skip zero-length values on send
    pub drop_empty: bool,
    /// Wire `key` classification: class name -> path substrings
    pub key: IndexMap<String, Vec<String>>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            copy_by_name: Vec::new(),
            copy_by_regex: Vec::new(),
            drop_empty: true,
            key: IndexMap::new(),
        }
    }
}

#[derive(Debug)]
enum ValuePattern {
    Compiled(Regex),
    /// Matches every value so the guarded fields stay untranslated
    Invalid { pattern: String, reason: String },
}

impl ValuePattern {
    fn compile(pattern: &str) -> Self {
        let built = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .unicode(true)
            .dot_matches_new_line(true)
            .build();

        match built {
            Ok(regex) => ValuePattern::Compiled(regex),
            Err(e) => {
                error!(
                    "Invalid copy pattern '{}': {}. Matching fields are kept untranslated.",
                    pattern, e
                );
                ValuePattern::Invalid {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }

    fn is_match(&self, value: &str) -> bool {
        match self {
            ValuePattern::Compiled(regex) => regex.is_match(value),
            ValuePattern::Invalid { .. } => true,
        }
    }
}

/// Compiled form of a `FilterConfig`
#[derive(Debug)]
pub struct FieldFilter {
    ignore: Vec<String>,
    copy_by_name: Vec<String>,
    copy_by_regex: Vec<ValuePattern>,
    drop_empty: bool,
    key: IndexMap<String, Vec<String>>,
}

impl FieldFilter {
    /// Compile the configuration
    ///
    /// Never fails: invalid patterns are logged, reported by `config_errors`
    /// and treated as matching everything.
    pub fn compile(config: &FilterConfig) -> Self {
        Self {
            ignore: config.ignore.clone(),
            copy_by_name: config.copy_by_name.clone(),
            copy_by_regex: config
                .copy_by_regex
                .iter()
                .map(|pattern| ValuePattern::compile(pattern))
                .collect(),
            drop_empty: config.drop_empty,
            key: config.key.clone(),
        }
    }

    /// Configuration problems found while compiling
    pub fn config_errors(&self) -> Vec<TranscodeError> {
        self.copy_by_regex
            .iter()
            .filter_map(|pattern| match pattern {
                ValuePattern::Invalid { pattern, reason } => {
                    Some(TranscodeError::ConfigurationError(format!(
                        "Invalid copy pattern '{}': {}",
                        pattern, reason
                    )))
                }
                ValuePattern::Compiled(_) => None,
            })
            .collect()
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignore.iter().any(|name| path.contains(name.as_str()))
    }

    pub fn is_copied_by_name(&self, path: &str) -> bool {
        self.copy_by_name.iter().any(|name| path.contains(name.as_str()))
    }

    pub fn is_copied_by_value(&self, value: &str) -> bool {
        self.copy_by_regex.iter().any(|pattern| pattern.is_match(value))
    }

    /// Remove everything that must not be sent for translation
    ///
    /// Order of the remaining fields is unchanged.
    pub fn filter_outbound(&self, fields: Vec<FlatField>) -> Vec<FlatField> {
        fields
            .into_iter()
            .filter(|field| {
                if self.is_ignored(&field.path) {
                    debug!("Field '{}' is ignored, not sending", field.path);
                    false
                } else if self.is_copied_by_name(&field.path) {
                    debug!("Field '{}' is copied by name, not sending", field.path);
                    false
                } else if self.is_copied_by_value(&field.value) {
                    debug!("Field '{}' is copied by value pattern, not sending", field.path);
                    false
                } else if self.drop_empty && field.value.is_empty() {
                    debug!("Field '{}' is empty, not sending", field.path);
                    false
                } else {
                    true
                }
            })
            .collect()
    }

    /// Wire `key` class for a path, first configured match wins
    pub fn classify(&self, path: &str) -> Option<&str> {
        self.key
            .iter()
            .find(|(_, names)| names.iter().any(|name| path.contains(name.as_str())))
            .map(|(class, _)| class.as_str())
    }
}

/// One leaf of an inbound merge
#[derive(Debug, Clone, PartialEq)]
pub struct MergedLeaf {
    pub path: String,
    pub value: Node,
    /// The value came back from translation different from the original
    pub translated: bool,
}

/// Overlay translated values onto the full original field set
///
/// Starts from every original leaf (filtered or not), replaces the value of
/// each path present in `translated`, and keeps the original typed leaf when
/// the translation equals its flat form. Translated paths unknown to the
/// original are appended in wire order.
pub fn restore_on_inbound(original: &[(String, Node)], translated: &[FlatField]) -> Vec<MergedLeaf> {
    let mut merged: IndexMap<String, MergedLeaf> = original
        .iter()
        .map(|(path, value)| {
            (
                path.clone(),
                MergedLeaf {
                    path: path.clone(),
                    value: value.clone(),
                    translated: false,
                },
            )
        })
        .collect();

    for field in translated {
        match merged.get_mut(&field.path) {
            Some(leaf) => {
                if leaf.value.is_container() || leaf.value.to_flat_string() != field.value {
                    leaf.value = Node::text(field.value.as_str());
                    leaf.translated = true;
                }
            }
            None => {
                debug!("Translated field '{}' has no original counterpart", field.path);
                merged.insert(
                    field.path.clone(),
                    MergedLeaf {
                        path: field.path.clone(),
                        value: Node::text(field.value.as_str()),
                        translated: true,
                    },
                );
            }
        }
    }

    merged.into_values().collect()
}
