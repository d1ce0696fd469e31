use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::template::{MissingPolicy, SortOrder};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderConfig {
    /// What to do with tokens that have no value
    #[serde(default)]
    pub missing_policy: MissingPolicy,
    /// chrono format applied to ISO dates in `date` fields
    #[serde(default)]
    pub date_format: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub default_sort: SortOrder,
    /// JSON snapshot loaded at startup when the file exists
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = builder_with_defaults()?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // TEMPLATES__RENDER__MISSING_POLICY, TEMPLATES__STORE__SNAPSHOT_PATH, etc.
            .add_source(
                Environment::with_prefix("TEMPLATES")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("render.missing_policy", "strict")?
        .set_default("store.default_sort", "last_modified_desc")?
        .set_default("logging.level", "info")?
        .set_default("logging.json", false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.render.missing_policy, MissingPolicy::Strict);
        assert_eq!(settings.render.date_format, None);
        assert_eq!(settings.store.default_sort, SortOrder::LastModifiedDesc);
        assert_eq!(settings.logging.level, "info");
        assert!(!settings.logging.json);
    }

    #[test]
    fn test_defaults_from_builder() {
        let settings: Settings = builder_with_defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.render.missing_policy, MissingPolicy::Strict);
        assert_eq!(settings.store.snapshot_path, None);
    }

    #[test]
    fn test_file_overrides() {
        let toml = r#"
            [render]
            missing_policy = "blank"
            date_format = "%d/%m/%Y"

            [store]
            default_sort = "name_asc"
            snapshot_path = "data/templates.json"

            [logging]
            json = true
        "#;

        let settings: Settings = builder_with_defaults()
            .unwrap()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.render.missing_policy, MissingPolicy::Blank);
        assert_eq!(settings.render.date_format.as_deref(), Some("%d/%m/%Y"));
        assert_eq!(settings.store.default_sort, SortOrder::NameAsc);
        assert_eq!(settings.store.snapshot_path.as_deref(), Some("data/templates.json"));
        assert!(settings.logging.json);
        assert_eq!(settings.logging.level, "info");
    }
}
