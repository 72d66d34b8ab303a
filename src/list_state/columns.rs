//! Default vs. custom column selection

use std::collections::HashSet;
use tracing::warn;

use crate::errors::{ListError, ListResult};
use crate::models::{ColumnDescriptor, ColumnSet};

pub const NOTHING_TO_SAVE: &str = "Please select different columns to apply changes.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSelection {
    default_fields: Vec<ColumnDescriptor>,
    custom_fields: Vec<ColumnDescriptor>,
    persisted: Vec<ColumnDescriptor>,
    loaded: bool,
    /// Save button busy
    pub saving: bool,
    /// Reset button busy
    pub resetting: bool,
}

impl ColumnSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_fields(&self) -> &[ColumnDescriptor] {
        &self.default_fields
    }

    pub fn custom_fields(&self) -> &[ColumnDescriptor] {
        &self.custom_fields
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Current choice equals the defaults
    pub fn is_default(&self) -> bool {
        self.custom_fields == self.default_fields
    }

    /// Unsaved local edits exist
    pub fn is_modified(&self) -> bool {
        self.custom_fields != self.persisted
    }

    /// Names of the visible columns, in display order
    pub fn visible_columns(&self) -> Vec<&str> {
        self.custom_fields
            .iter()
            .filter(|column| column.visible)
            .map(|column| column.name.as_str())
            .collect()
    }

    /// Take the server's column sets. A missing custom set falls back to the
    /// defaults.
    pub fn load(&mut self, set: ColumnSet) {
        let custom = if set.custom_fields.is_empty() {
            set.default_fields.clone()
        } else {
            reconcile(&set.default_fields, set.custom_fields)
        };
        self.default_fields = set.default_fields;
        self.persisted = custom.clone();
        self.custom_fields = custom;
        self.loaded = true;
    }

    /// Set a column's visibility explicitly
    pub fn set_visible(&mut self, name: &str, visible: bool) -> ListResult<()> {
        let column = self
            .custom_fields
            .iter_mut()
            .find(|column| column.name == name)
            .ok_or_else(|| ListError::UnknownColumn(name.to_string()))?;
        column.visible = visible;
        Ok(())
    }

    /// Flip a column's visibility; returns the new value
    pub fn toggle(&mut self, name: &str) -> ListResult<bool> {
        let current = self
            .custom_fields
            .iter()
            .find(|column| column.name == name)
            .map(|column| column.visible)
            .ok_or_else(|| ListError::UnknownColumn(name.to_string()))?;
        self.set_visible(name, !current)?;
        Ok(!current)
    }

    /// Move the column at `from` to position `to`
    pub fn reorder(&mut self, from: usize, to: usize) -> ListResult<()> {
        let len = self.custom_fields.len();
        if from >= len || to >= len {
            return Err(ListError::Validation(format!(
                "Column position out of range ({} -> {}, {} columns)",
                from, to, len
            )));
        }
        let column = self.custom_fields.remove(from);
        self.custom_fields.insert(to, column);
        Ok(())
    }

    /// Drop unsaved edits
    pub fn cancel(&mut self) {
        self.custom_fields = self.persisted.clone();
    }

    /// Columns to persist, or `NoOp` when they equal the defaults
    pub fn prepare_save(&self) -> ListResult<Vec<ColumnDescriptor>> {
        if self.is_default() {
            return Err(ListError::NoOp(NOTHING_TO_SAVE.to_string()));
        }
        Ok(self.custom_fields.clone())
    }

    pub fn mark_saved(&mut self, fields: Vec<ColumnDescriptor>) {
        self.persisted = fields;
    }

    pub fn mark_reset(&mut self) {
        self.custom_fields = self.default_fields.clone();
        self.persisted = self.default_fields.clone();
    }
}

/// Keep the custom order and visibility for known columns, drop columns the
/// defaults no longer have and append defaults the custom set is missing.
fn reconcile(defaults: &[ColumnDescriptor], custom: Vec<ColumnDescriptor>) -> Vec<ColumnDescriptor> {
    let known: HashSet<&str> = defaults.iter().map(|c| c.name.as_str()).collect();
    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity(defaults.len());

    for column in custom {
        if !known.contains(column.name.as_str()) {
            warn!("Dropping unknown persisted column '{}'", column.name);
            continue;
        }
        if seen.insert(column.name.clone()) {
            result.push(column);
        }
    }

    for column in defaults {
        if !seen.contains(&column.name) {
            result.push(column.clone());
        }
    }

    result
}
