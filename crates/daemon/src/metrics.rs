//! Prometheus registry for the daemon.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntGauge, Registry, TextEncoder};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Downloads the monitor is watching.
pub static ACTIVE_DOWNLOADS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "digger_active_downloads",
        "Number of enqueued downloads not yet settled",
    )
    .expect("valid metric")
});

fn register_metrics(registry: &Registry) {
    for metric in digger_core::metrics::all_metrics() {
        if let Err(e) = registry.register(metric) {
            tracing::warn!("Failed to register core metric: {}", e);
        }
    }
    if let Err(e) = registry.register(Box::new(ACTIVE_DOWNLOADS.clone())) {
        tracing::warn!("Failed to register daemon metric: {}", e);
    }
}

/// Encode all metrics in Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
