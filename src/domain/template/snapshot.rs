//! JSON snapshots of the template store

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::definition::TemplateDefinition;
use super::types::{TemplateError, TemplateResult};

/// Serializable copy of a store's contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSnapshot {
    /// Next id the store will assign
    pub next_id: u64,

    /// Persisted templates ordered by id
    pub templates: Vec<TemplateDefinition>,
}

pub(crate) fn write_snapshot(path: &Path, snapshot: &TemplateSnapshot) -> TemplateResult<()> {
    let json = serde_json::to_string_pretty(snapshot)
        .map_err(|e| TemplateError::Snapshot(format!("serialize: {}", e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| TemplateError::Snapshot(format!("{}: {}", parent.display(), e)))?;
    }

    fs::write(path, json).map_err(|e| TemplateError::Snapshot(format!("{}: {}", path.display(), e)))
}

pub(crate) fn read_snapshot(path: &Path) -> TemplateResult<TemplateSnapshot> {
    let json = fs::read_to_string(path)
        .map_err(|e| TemplateError::Snapshot(format!("{}: {}", path.display(), e)))?;

    serde_json::from_str(&json)
        .map_err(|e| TemplateError::Snapshot(format!("{}: {}", path.display(), e)))
}
