//! Extender Metrics
//!
//! Prometheus counters and latency histograms for predicate and priority
//! calls, kept in a registry owned by the extender.

use crate::error::{Error, Result};
use crate::scheduling::PluginCategory;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;

const NAMESPACE: &str = "hostpath_extender";

/// Metric handles of one extender
#[derive(Clone)]
pub struct ExtenderMetrics {
    registry: Registry,
    /// Node verdicts per predicate: admitted, rejected, error
    predicate_verdicts: IntCounterVec,
    /// Calls per priority: ok, error
    priority_calls: IntCounterVec,
    request_duration: HistogramVec,
}

impl ExtenderMetrics {
    /// Create the metric set in a fresh registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let predicate_verdicts = IntCounterVec::new(
            Opts::new("predicate_node_verdicts_total", "Node verdicts by predicate")
                .namespace(NAMESPACE),
            &["plugin", "verdict"],
        )
        .map_err(metrics_error)?;
        let priority_calls = IntCounterVec::new(
            Opts::new("priority_calls_total", "Scoring calls by priority and result")
                .namespace(NAMESPACE),
            &["plugin", "result"],
        )
        .map_err(metrics_error)?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "request_duration_seconds",
                "Duration of extender callbacks",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["category", "plugin"],
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(predicate_verdicts.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(priority_calls.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(request_duration.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            predicate_verdicts,
            priority_calls,
            request_duration,
        })
    }

    /// Record the outcome of one filter call
    pub fn record_filter(&self, plugin: &str, admitted: usize, rejected: usize, errors: usize) {
        for (verdict, count) in [("admitted", admitted), ("rejected", rejected), ("error", errors)] {
            if count > 0 {
                self.predicate_verdicts
                    .with_label_values(&[plugin, verdict])
                    .inc_by(count as u64);
            }
        }
    }

    /// Record the outcome of one prioritize call
    pub fn record_priority(&self, plugin: &str, ok: bool) {
        let result = if ok { "ok" } else { "error" };
        self.priority_calls
            .with_label_values(&[plugin, result])
            .inc();
    }

    pub fn observe_duration(&self, category: PluginCategory, plugin: &str, elapsed: Duration) {
        self.request_duration
            .with_label_values(&[category.as_str(), plugin])
            .observe(elapsed.as_secs_f64());
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode the registry in the text exposition format
    pub fn encode(&self) -> Result<(String, Vec<u8>)> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("metrics error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_recorded_metrics() {
        let metrics = ExtenderMetrics::new().unwrap();
        metrics.record_filter("hostpathpvaffinity", 2, 1, 0);
        metrics.record_priority("hostpathpvspread", false);
        metrics.observe_duration(
            PluginCategory::Priorities,
            "hostpathpvspread",
            Duration::from_millis(3),
        );

        let (content_type, body) = metrics.encode().unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(content_type.starts_with("text/plain"));
        assert!(text.contains(
            r#"hostpath_extender_predicate_node_verdicts_total{plugin="hostpathpvaffinity",verdict="admitted"} 2"#
        ));
        assert!(!text.contains(r#"verdict="error""#));
        assert!(text.contains(
            r#"hostpath_extender_priority_calls_total{plugin="hostpathpvspread",result="error"} 1"#
        ));
        assert!(text.contains("hostpath_extender_request_duration_seconds_bucket"));
    }
}
