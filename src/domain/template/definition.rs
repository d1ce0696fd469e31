//! Template definition and authoring operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::field::FieldSchema;
use super::resolver::placeholders;
use super::types::{Category, TemplateError, TemplateResult};

fn default_active() -> bool {
    true
}

/// A named, categorized document skeleton
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    /// Assigned by the store; `None` while the template is a draft
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    pub name: String,

    pub category: Category,

    pub description: String,

    /// Display and edit order
    #[serde(default)]
    pub fields: Vec<FieldSchema>,

    /// Body text with `{{field_id}}` tokens
    #[serde(default)]
    pub content: String,

    /// Set by the store on every persist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,

    #[serde(default)]
    pub usage_count: u64,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl TemplateDefinition {
    /// Start an unpersisted draft with no fields and an empty body
    pub fn draft(
        name: impl Into<String>,
        category: Category,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            category,
            description: description.into(),
            fields: Vec::new(),
            content: String::new(),
            last_modified: None,
            usage_count: 0,
            is_active: true,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Look up a field by id
    pub fn field(&self, id: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Append `field`, or replace the field at `editing` when given.
    ///
    /// A field whose id collides with any other field (the edited slot
    /// excluded) is rejected.
    pub fn add_field(&mut self, field: FieldSchema, editing: Option<usize>) -> TemplateResult<()> {
        if let Some(index) = editing {
            self.check_index(index)?;
        }

        let collides = self
            .fields
            .iter()
            .enumerate()
            .any(|(i, f)| Some(i) != editing && f.id == field.id);
        if collides {
            return Err(TemplateError::Validation(format!(
                "Duplicate field id: {}",
                field.id
            )));
        }

        match editing {
            Some(index) => self.fields[index] = field,
            None => self.fields.push(field),
        }

        Ok(())
    }

    /// Remove the field at `index`; tokens in `content` are left untouched
    pub fn remove_field(&mut self, index: usize) -> TemplateResult<FieldSchema> {
        self.check_index(index)?;
        Ok(self.fields.remove(index))
    }

    /// Append a `{{field_id}}` token to the end of the body
    pub fn insert_placeholder(&mut self, field_id: &str) {
        self.content.push_str("{{");
        self.content.push_str(field_id);
        self.content.push_str("}}");
    }

    /// Check the template can be persisted.
    ///
    /// Content and field consistency is not checked here; see
    /// [`Self::undeclared_placeholders`] and [`Self::unreferenced_fields`].
    pub fn validate_for_save(&self) -> TemplateResult<()> {
        if self.name.trim().is_empty() {
            return Err(TemplateError::Validation(
                "Template name must not be empty".to_string(),
            ));
        }

        if self.description.trim().is_empty() {
            return Err(TemplateError::Validation(
                "Template description must not be empty".to_string(),
            ));
        }

        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.id == field.id) {
                return Err(TemplateError::Validation(format!(
                    "Duplicate field id: {}",
                    field.id
                )));
            }
        }

        Ok(())
    }

    /// Tokens in `content` that name no declared field, in first-seen order
    pub fn undeclared_placeholders(&self) -> Vec<String> {
        let mut undeclared: Vec<String> = Vec::new();
        for token in placeholders(&self.content) {
            if self.field(token).is_none() && !undeclared.iter().any(|t| t == token) {
                undeclared.push(token.to_string());
            }
        }
        undeclared
    }

    /// Declared fields never referenced by `content`
    pub fn unreferenced_fields(&self) -> Vec<&FieldSchema> {
        let referenced: Vec<&str> = placeholders(&self.content).collect();
        self.fields
            .iter()
            .filter(|f| !referenced.contains(&f.id.as_str()))
            .collect()
    }

    fn check_index(&self, index: usize) -> TemplateResult<()> {
        if index >= self.fields.len() {
            return Err(TemplateError::IndexOutOfRange {
                index,
                len: self.fields.len(),
            });
        }
        Ok(())
    }
}
