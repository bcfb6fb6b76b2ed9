//! Style templates and the store that owns them.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TemplateError;
use crate::presets;

/// Opaque identifier of a style.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleKey(String);

impl StyleKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// A key that cannot collide with built-in or previously generated keys.
    pub fn generate() -> Self {
        Self(format!("STYLE_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StyleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StyleKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Everything the generator needs to write in one style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateConfig {
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub examples: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed,
    /// The requested name was blank; the stored name was kept.
    Reverted,
}

/// Mapping from style key to template, plus the order styles are shown in.
///
/// Every key in `order` resolves in `templates` and appears in `order`
/// exactly once. Records are only ever replaced whole.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    templates: HashMap<StyleKey, TemplateConfig>,
    order: Vec<StyleKey>,
}

impl Default for TemplateStore {
    fn default() -> Self {
        let mut store = Self::empty();
        for (key, config) in presets::all() {
            store.upsert(key, config);
        }
        store
    }
}

impl TemplateStore {
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn get(&self, key: &StyleKey) -> Result<&TemplateConfig, TemplateError> {
        self.templates
            .get(key)
            .ok_or_else(|| TemplateError::NotFound(key.clone()))
    }

    pub fn contains(&self, key: &StyleKey) -> bool {
        self.templates.contains_key(key)
    }

    /// Replaces the record for `key`, registering the key in display order if new.
    pub fn upsert(&mut self, key: StyleKey, config: TemplateConfig) {
        if self.templates.insert(key.clone(), config).is_none() {
            self.order.push(key);
        }
    }

    /// Renames a style. A blank name leaves the record untouched.
    pub fn rename(&mut self, key: &StyleKey, new_name: &str) -> Result<RenameOutcome, TemplateError> {
        let current = self.get(key)?;
        let trimmed = new_name.trim();
        if trimmed.is_empty() {
            return Ok(RenameOutcome::Reverted);
        }

        let renamed = TemplateConfig {
            name: trimmed.to_string(),
            ..current.clone()
        };
        self.upsert(key.clone(), renamed);
        Ok(RenameOutcome::Renamed)
    }

    /// Adds a placeholder style and returns its key so it can be selected.
    pub fn add_style(&mut self) -> StyleKey {
        let mut key = StyleKey::generate();
        while self.contains(&key) {
            key = StyleKey::generate();
        }
        self.upsert(key.clone(), presets::placeholder());
        tracing::debug!(style = %key, "added style");
        key
    }

    /// Styles in display order.
    pub fn styles(&self) -> impl Iterator<Item = (&StyleKey, &TemplateConfig)> {
        self.order
            .iter()
            .filter_map(|key| self.templates.get(key).map(|config| (key, config)))
    }

    pub fn keys(&self) -> &[StyleKey] {
        &self.order
    }

    pub fn position(&self, key: &StyleKey) -> Option<usize> {
        self.order.iter().position(|k| k == key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Display name for a key that may no longer resolve.
    pub fn display_name(&self, key: &StyleKey) -> &str {
        self.templates
            .get(key)
            .map(|config| config.name.as_str())
            .unwrap_or("Unknown")
    }

    /// The shipped template for a built-in key, for resetting edits.
    pub fn default_template(key: &StyleKey) -> Option<TemplateConfig> {
        presets::built_in(key.as_str())
    }
}
