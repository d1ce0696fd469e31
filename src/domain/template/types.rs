//! Template types and error definitions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Template-specific error type
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Field index {index} out of range (template has {len} fields)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Template not found: {0}")]
    NotFound(u64),

    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    #[error("Template {id} was modified concurrently")]
    Conflict { id: u64 },

    #[error("Template {0} is inactive")]
    Inactive(u64),

    #[error("Snapshot failed: {0}")]
    Snapshot(String),
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Business category a template belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Prestation,
    Partenariat,
    Maintenance,
    Vente,
    #[serde(rename = "Confidentialité")]
    Confidentialite,
    Emploi,
    Autre,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Prestation,
        Category::Partenariat,
        Category::Maintenance,
        Category::Vente,
        Category::Confidentialite,
        Category::Emploi,
        Category::Autre,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Prestation => "Prestation",
            Category::Partenariat => "Partenariat",
            Category::Maintenance => "Maintenance",
            Category::Vente => "Vente",
            Category::Confidentialite => "Confidentialité",
            Category::Emploi => "Emploi",
            Category::Autre => "Autre",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == trimmed)
            .ok_or_else(|| TemplateError::Validation(format!("unknown category: {}", trimmed)))
    }
}

/// Kind of value a field accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Date,
    Select,
    Textarea,
}

/// What the resolver does with a token that has no value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Leave `{{token}}` verbatim and report it
    #[default]
    Strict,
    /// Substitute the empty string
    Blank,
}

/// Ordering applied by `TemplateStore::list`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    LastModifiedDesc,
    LastModifiedAsc,
    NameAsc,
    UsageDesc,
}

/// Filter for listing templates
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListFilter {
    pub category: Option<Category>,
    pub is_active: Option<bool>,
    /// Falls back to the store's configured default when unset
    pub sort: Option<SortOrder>,
}

impl ListFilter {
    pub fn category(category: Category) -> Self {
        Self {
            category: Some(category),
            ..Default::default()
        }
    }

    pub fn active() -> Self {
        Self {
            is_active: Some(true),
            ..Default::default()
        }
    }

    pub fn sorted_by(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self
    }
}

/// Output of a render
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedText {
    /// Content with every resolvable token substituted
    pub text: String,

    /// Tokens left unresolved under the strict policy, in first-seen order
    pub missing: Vec<String>,
}

impl RenderedText {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}
