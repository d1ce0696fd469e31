//! Placeholder resolution for template bodies
//!
//! The grammar is a flat set of `{{identifier}}` tokens. An identifier is any
//! non-empty run of characters without whitespace or braces; anything else
//! between double braces is treated as literal text. There is no escaping,
//! nesting, looping or conditional logic.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Instant;

use chrono::NaiveDate;

use super::definition::TemplateDefinition;
use super::field::FieldSchema;
use super::types::{FieldType, MissingPolicy, RenderedText, TemplateError, TemplateResult};
use crate::config::RenderConfig;
use crate::metrics::TemplateMetrics;

/// Mapping from field id to the value supplied by the caller
pub type FieldValues = HashMap<String, String>;

const ISO_DATE: &str = "%Y-%m-%d";

/// Piece of a template body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Token(&'a str),
}

/// Left-to-right scanner over a template body
pub struct Segments<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }

        let Some(open) = self.rest.find("{{") else {
            return Some(Segment::Text(std::mem::take(&mut self.rest)));
        };

        if open > 0 {
            let (text, rest) = self.rest.split_at(open);
            self.rest = rest;
            return Some(Segment::Text(text));
        }

        let inner = &self.rest[2..];
        let stop = inner
            .char_indices()
            .find(|&(_, c)| ends_identifier(c))
            .map_or(inner.len(), |(i, _)| i);

        if stop > 0 && inner[stop..].starts_with("}}") {
            let token = &inner[..stop];
            self.rest = &inner[stop + 2..];
            return Some(Segment::Token(token));
        }

        // Not a token. A brace right after `{{` may open one, so step past a single brace.
        let consumed = if stop == 0 && inner.starts_with('{') {
            1
        } else {
            2 + stop
        };
        let (text, rest) = self.rest.split_at(consumed);
        self.rest = rest;
        Some(Segment::Text(text))
    }
}

fn ends_identifier(c: char) -> bool {
    c.is_whitespace() || c == '{' || c == '}'
}

/// Split a body into literal text and tokens
pub fn segments(content: &str) -> Segments<'_> {
    Segments { rest: content }
}

/// Tokens of a body in order of appearance, repeats included
pub fn placeholders(content: &str) -> impl Iterator<Item = &str> {
    segments(content).filter_map(|segment| match segment {
        Segment::Token(token) => Some(token),
        Segment::Text(_) => None,
    })
}

/// Convert a JSON object into field values
pub fn values_from_json(values: &serde_json::Value) -> TemplateResult<FieldValues> {
    let map = match values {
        serde_json::Value::Object(map) => map,
        _ => {
            return Err(TemplateError::Validation(
                "Values must be an object".to_string(),
            ))
        }
    };

    Ok(map
        .iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Null => String::new(),
                // Arrays and objects keep their JSON representation
                _ => value.to_string(),
            };
            (key.clone(), value)
        })
        .collect())
}

/// Substitutes `{{field_id}}` tokens with supplied values
#[derive(Debug, Clone, Default)]
pub struct PlaceholderResolver {
    policy: MissingPolicy,
    date_format: Option<String>,
}

impl PlaceholderResolver {
    pub fn new(policy: MissingPolicy) -> Self {
        Self {
            policy,
            date_format: None,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            policy: config.missing_policy,
            date_format: config.date_format.clone(),
        }
    }

    /// Reformat ISO dates in `date` fields with a chrono format string
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = Some(format.into());
        self
    }

    pub fn policy(&self) -> MissingPolicy {
        self.policy
    }

    /// Render `template` and count the use on success
    pub fn render(
        &self,
        template: &mut TemplateDefinition,
        values: &FieldValues,
    ) -> TemplateResult<RenderedText> {
        let started = Instant::now();

        let rendered = match self.preview(template, values) {
            Ok(rendered) => rendered,
            Err(e) => {
                if matches!(e, TemplateError::MissingRequiredField(_)) {
                    TemplateMetrics::record_render_missing_required();
                }
                return Err(e);
            }
        };

        template.usage_count += 1;

        TemplateMetrics::record_render_success(started.elapsed().as_secs_f64());
        TemplateMetrics::record_unresolved(rendered.missing.len() as u64);

        tracing::debug!(
            template_id = ?template.id,
            usage_count = template.usage_count,
            missing = rendered.missing.len(),
            "Template rendered"
        );

        Ok(rendered)
    }

    /// Render without touching the usage count
    pub fn preview(
        &self,
        template: &TemplateDefinition,
        values: &FieldValues,
    ) -> TemplateResult<RenderedText> {
        check_required(template, values)?;

        let mut text = String::with_capacity(template.content.len());
        let mut missing: Vec<String> = Vec::new();

        for segment in segments(&template.content) {
            match segment {
                Segment::Text(literal) => text.push_str(literal),
                Segment::Token(token) => match self.resolve(template.field(token), token, values) {
                    Some(value) => text.push_str(&value),
                    None => match self.policy {
                        MissingPolicy::Strict => {
                            text.push_str("{{");
                            text.push_str(token);
                            text.push_str("}}");
                            if !missing.iter().any(|m| m == token) {
                                missing.push(token.to_string());
                            }
                        }
                        MissingPolicy::Blank => {}
                    },
                },
            }
        }

        Ok(RenderedText { text, missing })
    }

    fn resolve(
        &self,
        field: Option<&FieldSchema>,
        token: &str,
        values: &FieldValues,
    ) -> Option<String> {
        let supplied = values.get(token);

        if let Some(value) = supplied.filter(|v| !v.is_empty()) {
            return Some(self.format_value(field, value));
        }

        if let Some(default) = field.and_then(|f| f.default_value.as_deref()) {
            return Some(self.format_value(field, default));
        }

        supplied.cloned()
    }

    fn format_value(&self, field: Option<&FieldSchema>, value: &str) -> String {
        match field.map(|f| f.field_type) {
            Some(FieldType::Number) => value.trim().to_string(),
            Some(FieldType::Date) => self.format_date(value),
            _ => value.to_string(),
        }
    }

    fn format_date(&self, value: &str) -> String {
        let Some(format) = self.date_format.as_deref() else {
            return value.to_string();
        };

        let Ok(date) = NaiveDate::parse_from_str(value.trim(), ISO_DATE) else {
            return value.to_string();
        };

        let mut formatted = String::new();
        match write!(formatted, "{}", date.format(format)) {
            Ok(()) => formatted,
            Err(_) => {
                tracing::warn!(format = %format, "Invalid date format, leaving value as-is");
                value.to_string()
            }
        }
    }
}

fn check_required(template: &TemplateDefinition, values: &FieldValues) -> TemplateResult<()> {
    for field in template.fields.iter().filter(|f| f.required) {
        let present = values.get(&field.id).is_some_and(|v| !v.is_empty());
        if !present {
            return Err(TemplateError::MissingRequiredField(field.id.clone()));
        }
    }
    Ok(())
}
