//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    RENDERS_TOTAL, RENDER_LATENCY, TEMPLATES_CREATED_TOTAL, TEMPLATES_STORED,
    TEMPLATES_UPDATED_TOTAL, TEMPLATE_UPDATE_CONFLICTS_TOTAL, UNRESOLVED_PLACEHOLDERS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording template metrics
pub struct TemplateMetrics;

impl TemplateMetrics {
    /// Record a newly persisted template
    pub fn record_created() {
        TEMPLATES_CREATED_TOTAL.inc();
    }

    /// Record a template update
    pub fn record_updated() {
        TEMPLATES_UPDATED_TOTAL.inc();
    }

    /// Record an update rejected by a stale timestamp
    pub fn record_conflict() {
        TEMPLATE_UPDATE_CONFLICTS_TOTAL.inc();
    }

    /// Set the number of stored templates
    pub fn set_stored(count: usize) {
        TEMPLATES_STORED.set(count as i64);
    }

    /// Record a successful render and its duration
    pub fn record_render_success(duration_secs: f64) {
        RENDERS_TOTAL.with_label_values(&["success"]).inc();
        RENDER_LATENCY.observe(duration_secs);
    }

    /// Record a render rejected for a missing required value
    pub fn record_render_missing_required() {
        RENDERS_TOTAL.with_label_values(&["missing_required"]).inc();
    }

    /// Record a render rejected because the template is inactive
    pub fn record_render_inactive() {
        RENDERS_TOTAL.with_label_values(&["inactive"]).inc();
    }

    /// Record tokens left unresolved by a render
    pub fn record_unresolved(count: u64) {
        if count > 0 {
            UNRESOLVED_PLACEHOLDERS_TOTAL.inc_by(count);
        }
    }
}
