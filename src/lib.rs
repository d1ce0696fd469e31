// Infrastructure layer (shared components)
pub mod infrastructure;

pub use infrastructure::config;
pub use infrastructure::error;
pub use infrastructure::metrics;

// Domain layer (business logic)
pub mod domain;

pub use domain::template;

// Supporting modules
pub mod telemetry;
