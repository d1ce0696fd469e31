//! Dynamic field schema

use serde::{Deserialize, Serialize};

use super::types::{FieldType, TemplateError, TemplateResult};

/// Derive a field id from its display name.
///
/// Lowercases the name and joins whitespace-separated words with `_`, so
/// `"Client  Name"` becomes `"client_name"`. Leading and trailing whitespace
/// is dropped.
pub fn derive_id(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// A typed, named slot that template content can reference as `{{id}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Slug derived from `name`
    pub id: String,

    /// Human-readable label
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub required: bool,

    /// Input hint, never rendered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    /// Choices for `select` fields; empty for every other type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

/// Input for creating a field
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldSpec {
    pub name: String,

    #[serde(rename = "type", default)]
    pub field_type: FieldType,

    #[serde(default)]
    pub required: bool,

    pub placeholder: Option<String>,

    #[serde(default)]
    pub options: Option<Vec<String>>,

    pub default_value: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            ..Default::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_value = Some(default.into());
        self
    }
}

/// Partial replacement of a field's attributes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldPatch {
    pub name: Option<String>,

    #[serde(rename = "type")]
    pub field_type: Option<FieldType>,

    pub required: Option<bool>,

    /// Use `Some(None)` to clear
    pub placeholder: Option<Option<String>>,

    pub options: Option<Vec<String>>,

    /// Use `Some(None)` to clear
    pub default_value: Option<Option<String>>,
}

impl FieldSchema {
    /// Build a field, deriving its id and normalizing select options
    pub fn create(spec: FieldSpec) -> TemplateResult<Self> {
        if spec.name.trim().is_empty() {
            return Err(TemplateError::Validation(
                "Field name must not be empty".to_string(),
            ));
        }

        let options = normalize_options(spec.field_type, spec.options)?;

        Ok(Self {
            id: derive_id(&spec.name),
            name: spec.name,
            field_type: spec.field_type,
            required: spec.required,
            placeholder: spec.placeholder,
            options,
            default_value: spec.default_value,
        })
    }

    /// Apply a patch, re-deriving the id from the resulting name
    pub fn update(&self, patch: FieldPatch) -> TemplateResult<Self> {
        let spec = FieldSpec {
            name: patch.name.unwrap_or_else(|| self.name.clone()),
            field_type: patch.field_type.unwrap_or(self.field_type),
            required: patch.required.unwrap_or(self.required),
            placeholder: patch.placeholder.unwrap_or_else(|| self.placeholder.clone()),
            options: Some(patch.options.unwrap_or_else(|| self.options.clone())),
            default_value: patch
                .default_value
                .unwrap_or_else(|| self.default_value.clone()),
        };

        Self::create(spec)
    }
}

fn normalize_options(
    field_type: FieldType,
    options: Option<Vec<String>>,
) -> TemplateResult<Vec<String>> {
    if field_type != FieldType::Select {
        // Options only mean something for select fields
        return Ok(Vec::new());
    }

    let options: Vec<String> = options
        .unwrap_or_default()
        .into_iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();

    if options.is_empty() {
        return Err(TemplateError::Validation(
            "Select fields need at least one option".to_string(),
        ));
    }

    Ok(options)
}
