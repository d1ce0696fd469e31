mod settings;

pub use settings::{LoggingConfig, RenderConfig, Settings, StoreConfig};
