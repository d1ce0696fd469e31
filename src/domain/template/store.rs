//! Template storage with identity assignment

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use super::definition::TemplateDefinition;
use super::resolver::{FieldValues, PlaceholderResolver};
use super::snapshot::{read_snapshot, write_snapshot, TemplateSnapshot};
use super::types::{ListFilter, RenderedText, SortOrder, TemplateError, TemplateResult};
use crate::config::Settings;
use crate::metrics::TemplateMetrics;

/// Full-record replacement of a stored template
#[derive(Debug, Clone)]
pub struct UpdateTemplateRequest {
    /// New record; its `id`, `last_modified` and `usage_count` are ignored
    pub template: TemplateDefinition,

    /// Overrides the stored usage count when set
    pub usage_count: Option<u64>,

    /// Reject the update unless the stored record still has this timestamp
    pub expected_last_modified: Option<DateTime<Utc>>,
}

impl UpdateTemplateRequest {
    pub fn new(template: TemplateDefinition) -> Self {
        Self {
            template,
            usage_count: None,
            expected_last_modified: None,
        }
    }

    pub fn with_usage_count(mut self, usage_count: u64) -> Self {
        self.usage_count = Some(usage_count);
        self
    }

    pub fn if_unmodified_since(mut self, last_modified: DateTime<Utc>) -> Self {
        self.expected_last_modified = Some(last_modified);
        self
    }
}

impl From<TemplateDefinition> for UpdateTemplateRequest {
    fn from(template: TemplateDefinition) -> Self {
        Self::new(template)
    }
}

/// In-memory template storage.
///
/// Records are keyed by a store-assigned integer id. Writes to one id are
/// serialized by the map's entry lock, so concurrent editors either see
/// last-writer-wins or, with `expected_last_modified`, a `Conflict`.
pub struct TemplateStore {
    templates: DashMap<u64, TemplateDefinition>,
    next_id: AtomicU64,
    resolver: PlaceholderResolver,
    default_sort: SortOrder,
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateStore {
    /// Create an empty store with the strict resolver
    pub fn new() -> Self {
        Self::with_resolver(PlaceholderResolver::default())
    }

    pub fn with_resolver(resolver: PlaceholderResolver) -> Self {
        Self {
            templates: DashMap::new(),
            next_id: AtomicU64::new(1),
            resolver,
            default_sort: SortOrder::default(),
        }
    }

    pub fn with_default_sort(mut self, sort: SortOrder) -> Self {
        self.default_sort = sort;
        self
    }

    /// Build a store from settings, loading the configured snapshot if present
    pub fn from_settings(settings: &Settings) -> TemplateResult<Self> {
        let store = Self::with_resolver(PlaceholderResolver::from_config(&settings.render))
            .with_default_sort(settings.store.default_sort);

        if let Some(path) = settings.store.snapshot_path.as_deref() {
            if Path::new(path).exists() {
                let restored = store.load_snapshot(path)?;
                tracing::info!(path = %path, templates = restored, "Template snapshot loaded");
            } else {
                tracing::info!(path = %path, "No template snapshot found, starting empty");
            }
        }

        Ok(store)
    }

    /// Persist a draft, assigning its id
    #[tracing::instrument(name = "template.create", skip(self, draft), fields(name = %draft.name))]
    pub fn create(&self, mut draft: TemplateDefinition) -> TemplateResult<TemplateDefinition> {
        draft.validate_for_save()?;

        let id = self
            .next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| id.checked_add(1))
            .map_err(|_| TemplateError::Validation("No template ids left to assign".to_string()))?;
        draft.id = Some(id);
        draft.last_modified = Some(Utc::now());

        self.templates.insert(id, draft.clone());

        TemplateMetrics::record_created();
        TemplateMetrics::set_stored(self.templates.len());
        tracing::info!(
            template_id = id,
            category = %draft.category,
            field_count = draft.fields.len(),
            "Template created"
        );

        Ok(draft)
    }

    /// Replace a stored template wholesale
    #[tracing::instrument(name = "template.update", skip(self, request))]
    pub fn update(
        &self,
        id: u64,
        request: impl Into<UpdateTemplateRequest>,
    ) -> TemplateResult<TemplateDefinition> {
        let request: UpdateTemplateRequest = request.into();

        let mut entry = self
            .templates
            .get_mut(&id)
            .ok_or(TemplateError::NotFound(id))?;

        if let Some(expected) = request.expected_last_modified {
            if entry.last_modified != Some(expected) {
                TemplateMetrics::record_conflict();
                tracing::warn!(template_id = id, "Template update rejected, record changed");
                return Err(TemplateError::Conflict { id });
            }
        }

        let mut template = request.template;
        template.validate_for_save()?;

        template.id = Some(id);
        template.usage_count = request.usage_count.unwrap_or(entry.usage_count);
        template.last_modified = Some(touch(entry.last_modified));

        *entry = template.clone();

        TemplateMetrics::record_updated();
        tracing::info!(template_id = id, field_count = template.fields.len(), "Template updated");

        Ok(template)
    }

    /// Activate or deactivate a template
    #[tracing::instrument(name = "template.set_active", skip(self))]
    pub fn set_active(&self, id: u64, active: bool) -> TemplateResult<TemplateDefinition> {
        let mut entry = self
            .templates
            .get_mut(&id)
            .ok_or(TemplateError::NotFound(id))?;

        entry.is_active = active;
        entry.last_modified = Some(touch(entry.last_modified));

        TemplateMetrics::record_updated();
        tracing::info!(template_id = id, active, "Template activation changed");

        Ok(entry.clone())
    }

    /// Get a template by ID
    pub fn get(&self, id: u64) -> TemplateResult<TemplateDefinition> {
        self.templates
            .get(&id)
            .map(|t| t.clone())
            .ok_or(TemplateError::NotFound(id))
    }

    /// List templates matching `filter`
    pub fn list(&self, filter: &ListFilter) -> Vec<TemplateDefinition> {
        let mut templates: Vec<TemplateDefinition> = self
            .templates
            .iter()
            .filter(|entry| filter.category.map_or(true, |c| entry.category == c))
            .filter(|entry| filter.is_active.map_or(true, |a| entry.is_active == a))
            .map(|entry| entry.value().clone())
            .collect();

        sort_templates(&mut templates, filter.sort.unwrap_or(self.default_sort));
        templates
    }

    /// Templates eligible for rendering
    pub fn list_renderable(&self) -> Vec<TemplateDefinition> {
        self.list(&ListFilter::active())
    }

    /// Check if a template exists
    pub fn exists(&self, id: u64) -> bool {
        self.templates.contains_key(&id)
    }

    /// Get the number of templates
    pub fn count(&self) -> usize {
        self.templates.len()
    }

    /// Render a stored template and count the use
    #[tracing::instrument(name = "template.render", skip(self, values))]
    pub fn render(&self, id: u64, values: &FieldValues) -> TemplateResult<RenderedText> {
        let mut entry = self
            .templates
            .get_mut(&id)
            .ok_or(TemplateError::NotFound(id))?;

        if !entry.is_active {
            TemplateMetrics::record_render_inactive();
            return Err(TemplateError::Inactive(id));
        }

        self.resolver.render(&mut entry, values)
    }

    /// Render a stored template without counting the use
    pub fn preview(&self, id: u64, values: &FieldValues) -> TemplateResult<RenderedText> {
        let entry = self
            .templates
            .get(&id)
            .ok_or(TemplateError::NotFound(id))?;

        self.resolver.preview(&entry, values)
    }

    /// Capture every stored template
    pub fn snapshot(&self) -> TemplateSnapshot {
        let mut templates: Vec<TemplateDefinition> = self
            .templates
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        templates.sort_by_key(|t| t.id);

        TemplateSnapshot {
            next_id: self.next_id.load(Ordering::SeqCst),
            templates,
        }
    }

    /// Merge a snapshot into the store, replacing records with the same id
    ///
    /// The whole snapshot is rejected, and nothing inserted, if any record
    /// lacks an id, repeats an id or fails save validation.
    pub fn restore(&self, snapshot: TemplateSnapshot) -> TemplateResult<usize> {
        let mut seen = HashSet::with_capacity(snapshot.templates.len());
        let mut highest: u64 = 0;
        for template in &snapshot.templates {
            let id = template.id.ok_or_else(|| {
                TemplateError::Snapshot(format!("template '{}' has no id", template.name))
            })?;

            if !seen.insert(id) {
                return Err(TemplateError::Snapshot(format!("duplicate template id {}", id)));
            }

            template
                .validate_for_save()
                .map_err(|e| TemplateError::Snapshot(format!("template {}: {}", id, e)))?;

            highest = highest.max(id);
        }

        let after_highest = highest.checked_add(1).ok_or_else(|| {
            TemplateError::Snapshot(format!("template id {} leaves no room for new ids", highest))
        })?;

        let restored = snapshot.templates.len();
        for template in snapshot.templates {
            if let Some(id) = template.id {
                self.templates.insert(id, template);
            }
        }

        self.next_id
            .fetch_max(snapshot.next_id.max(after_highest), Ordering::SeqCst);
        TemplateMetrics::set_stored(self.templates.len());

        Ok(restored)
    }

    /// Write every stored template to a JSON file
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> TemplateResult<()> {
        let snapshot = self.snapshot();
        write_snapshot(path.as_ref(), &snapshot)?;
        tracing::info!(
            path = %path.as_ref().display(),
            templates = snapshot.templates.len(),
            "Template snapshot saved"
        );
        Ok(())
    }

    /// Load templates from a JSON file written by `save_snapshot`
    pub fn load_snapshot(&self, path: impl AsRef<Path>) -> TemplateResult<usize> {
        let snapshot = read_snapshot(path.as_ref())?;
        self.restore(snapshot)
    }
}

/// Create an Arc-wrapped template store
pub fn create_template_store() -> Arc<TemplateStore> {
    Arc::new(TemplateStore::new())
}

/// Next modification timestamp, strictly after `previous`
fn touch(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(prev) if prev >= now => prev + Duration::microseconds(1),
        _ => now,
    }
}

fn sort_templates(templates: &mut [TemplateDefinition], order: SortOrder) {
    match order {
        SortOrder::LastModifiedDesc => {
            templates.sort_by(|a, b| b.last_modified.cmp(&a.last_modified).then(a.id.cmp(&b.id)))
        }
        SortOrder::LastModifiedAsc => {
            templates.sort_by(|a, b| a.last_modified.cmp(&b.last_modified).then(a.id.cmp(&b.id)))
        }
        SortOrder::NameAsc => templates.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        }),
        SortOrder::UsageDesc => {
            templates.sort_by(|a, b| b.usage_count.cmp(&a.usage_count).then(a.id.cmp(&b.id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Category, FieldSchema, FieldSpec, FieldType, MissingPolicy};

    fn draft(name: &str, category: Category) -> TemplateDefinition {
        TemplateDefinition::draft(name, category, format!("{} template", name))
    }

    fn letter() -> TemplateDefinition {
        let mut template = draft("Letter", Category::Prestation).with_content("Dear {{client_name}},");
        template
            .add_field(
                FieldSchema::create(FieldSpec::new("Client Name", FieldType::Text).required()).unwrap(),
                None,
            )
            .unwrap();
        template
    }

    fn values(pairs: &[(&str, &str)]) -> FieldValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_store_create_and_get() {
        let store = TemplateStore::new();

        let created = store.create(letter()).unwrap();
        assert_eq!(created.id, Some(1));
        assert!(created.last_modified.is_some());
        assert_eq!(created.usage_count, 0);

        let retrieved = store.get(1).unwrap();
        assert_eq!(retrieved, created);
        assert_eq!(retrieved.fields, letter().fields);
    }

    #[test]
    fn test_store_create_assigns_unique_ids() {
        let store = TemplateStore::new();
        let a = store.create(letter()).unwrap();
        let b = store.create(letter()).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_store_create_rejects_invalid() {
        let store = TemplateStore::new();
        let mut template = letter();
        template.description = String::new();

        assert!(matches!(store.create(template), Err(TemplateError::Validation(_))));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_store_get_missing() {
        let store = TemplateStore::new();
        assert_eq!(store.get(42), Err(TemplateError::NotFound(42)));
    }

    #[test]
    fn test_store_update() {
        let store = TemplateStore::new();
        let created = store.create(letter()).unwrap();
        store.render(1, &values(&[("client_name", "Acme")])).unwrap();

        let mut edited = created.clone();
        edited.name = "Cover Letter".to_string();
        edited.id = None;
        edited.usage_count = 99;

        let updated = store.update(1, edited).unwrap();
        assert_eq!(updated.id, Some(1));
        assert_eq!(updated.name, "Cover Letter");
        assert_eq!(updated.usage_count, 1);
        assert!(updated.last_modified > created.last_modified);
    }

    #[test]
    fn test_store_update_overrides_usage_count() {
        let store = TemplateStore::new();
        store.create(letter()).unwrap();

        let updated = store
            .update(1, UpdateTemplateRequest::new(letter()).with_usage_count(7))
            .unwrap();
        assert_eq!(updated.usage_count, 7);
    }

    #[test]
    fn test_store_update_missing() {
        let store = TemplateStore::new();
        assert_eq!(store.update(5, letter()), Err(TemplateError::NotFound(5)));
    }

    #[test]
    fn test_store_update_invalid_keeps_record() {
        let store = TemplateStore::new();
        let created = store.create(letter()).unwrap();

        let mut invalid = letter();
        invalid.name.clear();
        assert!(matches!(store.update(1, invalid), Err(TemplateError::Validation(_))));
        assert_eq!(store.get(1).unwrap(), created);
    }

    #[test]
    fn test_store_update_conflict() {
        let store = TemplateStore::new();
        let created = store.create(letter()).unwrap();
        let seen = created.last_modified.unwrap();

        store
            .update(1, UpdateTemplateRequest::new(letter()).if_unmodified_since(seen))
            .unwrap();

        let stale = store.update(1, UpdateTemplateRequest::new(letter()).if_unmodified_since(seen));
        assert_eq!(stale, Err(TemplateError::Conflict { id: 1 }));
    }

    #[test]
    fn test_store_render_counts_usage() {
        let store = TemplateStore::new();
        store.create(letter()).unwrap();

        let rendered = store.render(1, &values(&[("client_name", "Acme")])).unwrap();
        assert_eq!(rendered.text, "Dear Acme,");
        assert_eq!(store.get(1).unwrap().usage_count, 1);

        assert!(matches!(
            store.render(1, &FieldValues::new()),
            Err(TemplateError::MissingRequiredField(_))
        ));
        assert_eq!(store.get(1).unwrap().usage_count, 1);
    }

    #[test]
    fn test_store_preview_does_not_count() {
        let store = TemplateStore::new();
        store.create(letter()).unwrap();

        store.preview(1, &values(&[("client_name", "Acme")])).unwrap();
        assert_eq!(store.get(1).unwrap().usage_count, 0);
    }

    #[test]
    fn test_store_inactive_template() {
        let store = TemplateStore::new();
        store.create(letter()).unwrap();
        store.create(draft("Offer", Category::Emploi)).unwrap();

        let deactivated = store.set_active(1, false).unwrap();
        assert!(!deactivated.is_active);

        assert_eq!(
            store.render(1, &values(&[("client_name", "Acme")])),
            Err(TemplateError::Inactive(1))
        );

        let renderable = store.list_renderable();
        assert_eq!(renderable.len(), 1);
        assert_eq!(renderable[0].name, "Offer");

        // Still editable
        let mut edited = letter();
        edited.is_active = false;
        edited.content = "Hello {{client_name}}".to_string();
        assert!(store.update(1, edited).is_ok());
    }

    #[test]
    fn test_store_list_filters() {
        let store = TemplateStore::new();
        store.create(draft("NDA", Category::Confidentialite)).unwrap();
        store.create(draft("Job Offer", Category::Emploi)).unwrap();
        store.create(draft("Quote", Category::Vente)).unwrap();
        store.set_active(3, false).unwrap();

        assert_eq!(store.list(&ListFilter::default()).len(), 3);
        assert_eq!(store.list(&ListFilter::category(Category::Emploi)).len(), 1);

        let inactive = store.list(&ListFilter {
            is_active: Some(false),
            ..Default::default()
        });
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].name, "Quote");
    }

    #[test]
    fn test_store_list_sorting() {
        let store = TemplateStore::new();
        store.create(draft("b-second", Category::Autre)).unwrap();
        store.create(draft("a-first", Category::Autre)).unwrap();
        store.create(draft("c-third", Category::Autre)).unwrap();
        store.update(1, draft("b-second", Category::Autre)).unwrap();

        let newest_first: Vec<_> = store
            .list(&ListFilter::default())
            .into_iter()
            .map(|t| t.id.unwrap())
            .collect();
        assert_eq!(newest_first[0], 1);

        let by_name: Vec<_> = store
            .list(&ListFilter::default().sorted_by(SortOrder::NameAsc))
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(by_name, vec!["a-first", "b-second", "c-third"]);
    }

    #[test]
    fn test_store_blank_policy() {
        let store = TemplateStore::with_resolver(PlaceholderResolver::new(MissingPolicy::Blank));
        store
            .create(draft("t", Category::Autre).with_content("[{{nothing}}]"))
            .unwrap();

        let rendered = store.render(1, &FieldValues::new()).unwrap();
        assert_eq!(rendered.text, "[]");
    }

    #[test]
    fn test_snapshot_restore_continues_ids() {
        let store = TemplateStore::new();
        store.create(letter()).unwrap();
        store.create(draft("Quote", Category::Vente)).unwrap();

        let restored = TemplateStore::new();
        assert_eq!(restored.restore(store.snapshot()).unwrap(), 2);
        assert_eq!(restored.get(1).unwrap(), store.get(1).unwrap());

        let next = restored.create(draft("Invoice", Category::Vente)).unwrap();
        assert_eq!(next.id, Some(3));
    }

    #[test]
    fn test_restore_rejects_unpersisted() {
        let store = TemplateStore::new();
        let snapshot = TemplateSnapshot {
            next_id: 1,
            templates: vec![letter()],
        };
        assert!(matches!(store.restore(snapshot), Err(TemplateError::Snapshot(_))));
        assert_eq!(store.count(), 0);
    }

    fn persisted(id: u64, template: TemplateDefinition) -> TemplateDefinition {
        TemplateDefinition {
            id: Some(id),
            ..template
        }
    }

    #[test]
    fn test_restore_rejects_max_id() {
        let store = TemplateStore::new();
        let snapshot = TemplateSnapshot {
            next_id: 1,
            templates: vec![persisted(u64::MAX, letter())],
        };

        assert!(matches!(store.restore(snapshot), Err(TemplateError::Snapshot(_))));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_create_fails_when_ids_exhausted() {
        let store = TemplateStore::new();
        let snapshot = TemplateSnapshot {
            next_id: u64::MAX,
            templates: vec![persisted(u64::MAX - 1, letter())],
        };
        store.restore(snapshot).unwrap();

        assert!(matches!(store.create(letter()), Err(TemplateError::Validation(_))));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_restore_rejects_invalid_record() {
        let store = TemplateStore::new();
        let mut blank = persisted(3, letter());
        blank.name.clear();
        blank.description.clear();

        let snapshot = TemplateSnapshot {
            next_id: 4,
            templates: vec![persisted(1, letter()), blank],
        };

        assert!(matches!(store.restore(snapshot), Err(TemplateError::Snapshot(_))));
        assert_eq!(store.count(), 0);
        assert!(!store.exists(1));
    }

    #[test]
    fn test_restore_rejects_duplicate_field_ids() {
        let store = TemplateStore::new();
        let mut template = persisted(1, letter());
        let duplicate = template.fields[0].clone();
        template.fields.push(duplicate);

        let snapshot = TemplateSnapshot {
            next_id: 2,
            templates: vec![template],
        };

        assert!(matches!(store.restore(snapshot), Err(TemplateError::Snapshot(_))));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_restore_rejects_duplicate_template_ids() {
        let store = TemplateStore::new();
        let snapshot = TemplateSnapshot {
            next_id: 3,
            templates: vec![persisted(2, letter()), persisted(2, draft("Quote", Category::Vente))],
        };

        assert!(matches!(store.restore(snapshot), Err(TemplateError::Snapshot(_))));
        assert_eq!(store.count(), 0);
    }
}
