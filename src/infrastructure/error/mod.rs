use serde::Serialize;
use thiserror::Error;

use crate::telemetry::TelemetryError;
use crate::template::TemplateError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
}

/// Error payload handed to the presentation layer
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl AppError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Telemetry(_) => "TELEMETRY_ERROR",
            AppError::Template(e) => match e {
                TemplateError::Validation(_) => "VALIDATION_ERROR",
                TemplateError::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
                TemplateError::NotFound(_) => "NOT_FOUND",
                TemplateError::MissingRequiredField(_) => "MISSING_REQUIRED_FIELD",
                TemplateError::Conflict { .. } => "CONFLICT",
                TemplateError::Inactive(_) => "TEMPLATE_INACTIVE",
                TemplateError::Snapshot(_) => "SNAPSHOT_ERROR",
            },
        }
    }

    /// Whether the user can fix this by correcting their input
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AppError::Template(
                TemplateError::Validation(_)
                    | TemplateError::IndexOutOfRange { .. }
                    | TemplateError::NotFound(_)
                    | TemplateError::MissingRequiredField(_)
                    | TemplateError::Conflict { .. }
                    | TemplateError::Inactive(_)
            )
        )
    }

    /// Log the error and build the payload shown to the user
    pub fn to_body(&self) -> ErrorBody {
        let code = self.code();
        let log_message = self.to_string();

        let client_message = if self.is_user_error() || !is_production() {
            log_message.clone()
        } else {
            match self {
                AppError::Config(_) => "Configuration error".to_string(),
                _ => "Internal error".to_string(),
            }
        };

        // Always log the detailed error
        if self.is_user_error() {
            tracing::warn!(code = %code, message = %log_message, "Template operation rejected");
        } else {
            tracing::error!(code = %code, message = %log_message, "Template engine error");
        }

        ErrorBody {
            code: code.to_string(),
            message: client_message,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
