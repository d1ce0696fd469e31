//! Prometheus metrics for the template engine.
//!
//! This module provides metrics for monitoring template usage:
//! - Store metrics (created, updated, stored count, update conflicts)
//! - Render metrics (outcomes, unresolved placeholders, latency)

mod helpers;

pub use helpers::{encode_metrics, TemplateMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "ara_template";

lazy_static! {
    // ============================================================================
    // Store Metrics
    // ============================================================================

    /// Total templates persisted for the first time
    pub static ref TEMPLATES_CREATED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_created_total", METRIC_PREFIX),
        "Total templates created"
    ).unwrap();

    /// Total full-record replacements and activation changes
    pub static ref TEMPLATES_UPDATED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_updated_total", METRIC_PREFIX),
        "Total template updates"
    ).unwrap();

    /// Updates rejected because the record changed underneath the editor
    pub static ref TEMPLATE_UPDATE_CONFLICTS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_update_conflicts_total", METRIC_PREFIX),
        "Total template updates rejected by a concurrent modification"
    ).unwrap();

    /// Templates currently held by the store
    pub static ref TEMPLATES_STORED: IntGauge = register_int_gauge!(
        format!("{}_stored", METRIC_PREFIX),
        "Number of templates in the store"
    ).unwrap();

    // ============================================================================
    // Render Metrics
    // ============================================================================

    /// Renders by outcome (success, missing_required, inactive)
    pub static ref RENDERS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_renders_total", METRIC_PREFIX),
        "Total template renders by outcome",
        &["outcome"]
    ).unwrap();

    /// Tokens left unresolved by successful renders
    pub static ref UNRESOLVED_PLACEHOLDERS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_unresolved_placeholders_total", METRIC_PREFIX),
        "Total placeholder tokens left unresolved"
    ).unwrap();

    /// Time spent rendering a template
    pub static ref RENDER_LATENCY: Histogram = register_histogram!(
        format!("{}_render_latency_seconds", METRIC_PREFIX),
        "Template render latency in seconds",
        vec![0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01]
    ).unwrap();
}
