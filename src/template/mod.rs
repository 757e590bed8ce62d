//! Selector templates
//!
//! A template is a JSON object with a `"selectors"` object mapping category
//! names to selector strings (CSS or XPath, detected per selector). Key order
//! is significant: categories appear in records in template order.
//!
//! A category whose name ends in [`EXCLUSION_SUFFIX`] is an exclusion: its
//! matches are removed from the document before any other category is
//! evaluated.
//!
//! ```
//! use template_scraper::template::Template;
//!
//! let template = Template::from_json_str(
//!     r#"{"selectors": {"title": "h1", "ads_excluded": ".ad"}}"#,
//! ).unwrap();
//! assert_eq!(template.categories().count(), 1);
//! assert_eq!(template.exclusions().count(), 1);
//! ```

use crate::{TemplateError, TemplateResult};
use serde_json::Value;
use std::path::Path;

/// Category-name suffix marking an exclusion selector
pub const EXCLUSION_SUFFIX: &str = "_excluded";

/// One category → selector mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateEntry {
    pub category: String,
    pub selector: String,
}

impl TemplateEntry {
    pub fn is_exclusion(&self) -> bool {
        self.category.ends_with(EXCLUSION_SUFFIX)
    }
}

/// Parsed, validated selector template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    entries: Vec<TemplateEntry>,
}

impl Template {
    /// Loads a template from a JSON file
    pub fn load(path: &Path) -> TemplateResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Parses a template from JSON text
    pub fn from_json_str(content: &str) -> TemplateResult<Self> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_value(&value)
    }

    /// Builds a template from an already-parsed JSON document
    pub fn from_value(value: &Value) -> TemplateResult<Self> {
        let selectors = value
            .get("selectors")
            .and_then(Value::as_object)
            .ok_or(TemplateError::MissingSelectors)?;

        let mut entries = Vec::with_capacity(selectors.len());
        for (category, selector) in selectors {
            match selector {
                Value::String(s) => entries.push(TemplateEntry {
                    category: category.clone(),
                    selector: s.clone(),
                }),
                _ => {
                    return Err(TemplateError::NonStringSelector {
                        category: category.clone(),
                    })
                }
            }
        }

        Self::from_entries(entries)
    }

    /// Builds a template from explicit entries, validating them
    pub fn from_entries(entries: Vec<TemplateEntry>) -> TemplateResult<Self> {
        for entry in &entries {
            if entry.category.trim().is_empty() {
                return Err(TemplateError::Invalid(
                    "category names cannot be empty".to_string(),
                ));
            }
            if entry.selector.trim().is_empty() {
                return Err(TemplateError::Invalid(format!(
                    "selector for category '{}' is empty",
                    entry.category
                )));
            }
        }

        if !entries.iter().any(|e| !e.is_exclusion()) {
            return Err(TemplateError::Invalid(
                "template must define at least one non-excluded category".to_string(),
            ));
        }

        Ok(Self { entries })
    }

    /// All entries in template order
    pub fn entries(&self) -> &[TemplateEntry] {
        &self.entries
    }

    /// Exclusion entries in template order
    pub fn exclusions(&self) -> impl Iterator<Item = &TemplateEntry> {
        self.entries.iter().filter(|e| e.is_exclusion())
    }

    /// Normal (extracted) entries in template order
    pub fn categories(&self) -> impl Iterator<Item = &TemplateEntry> {
        self.entries.iter().filter(|e| !e.is_exclusion())
    }

    /// Names of the normal categories in template order
    pub fn category_names(&self) -> Vec<String> {
        self.categories().map(|e| e.category.clone()).collect()
    }

    /// Returns true if `category` is a normal category of this template
    pub fn has_category(&self, category: &str) -> bool {
        self.categories().any(|e| e.category == category)
    }
}
