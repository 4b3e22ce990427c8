//! Error-rate instrumentation.
//!
//! Every 4xx/5xx response increments a counter keyed by a short stable
//! label, backed by the same in-memory time-series store the rest of the
//! platform uses for metrics.

use std::time::Duration;

use claw_metrics::storage::MetricStore;
use claw_metrics::types::{MetricName, MetricPoint};
use tracing::error;

use crate::error::ServiceError;

/// Counts error responses by label.
pub struct ErrorCounters {
    store: MetricStore,
}

impl ErrorCounters {
    /// Creates a counter registry retaining points for 24 hours.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: MetricStore::new(Duration::from_secs(24 * 60 * 60)),
        }
    }

    /// Records one occurrence of `err` under `context` (e.g.
    /// `ExternalPoliciesCreate`), logging the full error chain.
    pub fn record(&self, context: &str, err: &ServiceError) {
        let label = err.label(context);
        error!(label = %label, error = %err, "request failed");

        let Ok(name) = MetricName::new(format!("policy_service_errors_{label}")) else {
            return;
        };
        let _ = self.store.push(&name, MetricPoint::now(1.0));
    }
}

impl Default for ErrorCounters {
    fn default() -> Self {
        Self::new()
    }
}
