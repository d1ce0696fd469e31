//! Document template system.
//!
//! This module provides:
//! - Field schemas with derived ids and select options
//! - Template definitions with `{{field_id}}` placeholders in their body
//! - A placeholder resolver with strict or blank handling of missing values
//! - In-memory template storage with id assignment and JSON snapshots
//!
//! # Example
//!
//! ```ignore
//! let store = TemplateStore::new();
//!
//! let mut draft = TemplateDefinition::draft("Cover letter", Category::Prestation, "Client letter")
//!     .with_content("Dear ");
//! draft.add_field(
//!     FieldSchema::create(FieldSpec::new("Client Name", FieldType::Text).required())?,
//!     None,
//! )?;
//! draft.insert_placeholder("client_name");
//!
//! let created = store.create(draft)?;
//!
//! let values = values_from_json(&json!({ "client_name": "Acme" }))?;
//! let rendered = store.render(created.id.unwrap(), &values)?;
//! assert_eq!(rendered.text, "Dear Acme");
//! ```

mod definition;
mod field;
mod resolver;
mod snapshot;
mod store;
mod types;

pub use definition::TemplateDefinition;
pub use field::{derive_id, FieldPatch, FieldSchema, FieldSpec};
pub use resolver::{
    placeholders, segments, values_from_json, FieldValues, PlaceholderResolver, Segment, Segments,
};
pub use snapshot::TemplateSnapshot;
pub use store::{create_template_store, TemplateStore, UpdateTemplateRequest};
pub use types::{
    Category, FieldType, ListFilter, MissingPolicy, RenderedText, SortOrder, TemplateError,
    TemplateResult,
};
