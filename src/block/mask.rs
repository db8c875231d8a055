//! Per-block attribute masking
//!
//! Some blocks carry attributes that must never reach translators even
//! though the generic field rules would send them (identifiers, URLs,
//! layout settings). A masker registered for the block name removes them
//! before filtering; `unmask` can put back whatever it set aside.

use std::collections::HashMap;

use crate::flatten::{FlatField, leaf_name};

/// Hook run around field filtering for one block type
pub trait AttributeMasker {
    fn mask(&self, fields: Vec<FlatField>) -> Vec<FlatField>;

    fn unmask(&self, fields: Vec<FlatField>) -> Vec<FlatField> {
        fields
    }
}

/// Drops attributes by leaf name
#[derive(Debug, Clone, Default)]
pub struct ExcludeAttributes {
    names: Vec<String>,
}

impl ExcludeAttributes {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl AttributeMasker for ExcludeAttributes {
    fn mask(&self, fields: Vec<FlatField>) -> Vec<FlatField> {
        fields
            .into_iter()
            .filter(|field| !self.names.iter().any(|name| name == leaf_name(&field.path)))
            .collect()
    }
}

/// Maskers keyed by block name
#[derive(Default)]
pub struct MaskRegistry {
    maskers: HashMap<String, Box<dyn AttributeMasker>>,
}

impl MaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, block_name: impl Into<String>, masker: Box<dyn AttributeMasker>) {
        self.maskers.insert(block_name.into(), masker);
    }

    pub fn with(mut self, block_name: impl Into<String>, masker: Box<dyn AttributeMasker>) -> Self {
        self.register(block_name, masker);
        self
    }

    pub fn mask(&self, block_name: &str, fields: Vec<FlatField>) -> Vec<FlatField> {
        match self.maskers.get(block_name) {
            Some(masker) => masker.mask(fields),
            None => fields,
        }
    }

    pub fn unmask(&self, block_name: &str, fields: Vec<FlatField>) -> Vec<FlatField> {
        match self.maskers.get(block_name) {
            Some(masker) => masker.unmask(fields),
            None => fields,
        }
    }
}

impl std::fmt::Debug for MaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskRegistry")
            .field("blocks", &self.maskers.keys().collect::<Vec<_>>())
            .finish()
    }
}
