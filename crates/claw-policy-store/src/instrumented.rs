//! Call-duration and error-count instrumentation around [`PolicyStore`].
//!
//! Every method records `<method>_time` on success and
//! `<method>_error_time` on failure into the same in-memory metric store
//! the rest of the platform uses, rather than introducing a second
//! metrics mechanism.

use std::time::Instant;

use claw_metrics::storage::MetricStore;
use claw_metrics::types::{MetricName, MetricPoint};

use crate::models::{EgressPolicy, IngressPolicy, TagMapping};
use crate::{PolicyStore, Result};

/// Wraps a [`PolicyStore`], timing every call and recording it under
/// `policy_store_<method>_time` (or `_error_time` on failure).
pub struct InstrumentedStore {
    inner: PolicyStore,
    metrics: MetricStore,
}

impl InstrumentedStore {
    /// Wraps `inner`, retaining call-duration samples for 24 hours.
    #[must_use]
    pub fn new(inner: PolicyStore) -> Self {
        Self {
            inner,
            metrics: MetricStore::new(std::time::Duration::from_secs(24 * 60 * 60)),
        }
    }

    fn record(&self, method: &str, elapsed_ms: f64, failed: bool) {
        let suffix = if failed { "error_time" } else { "time" };
        let Ok(name) = MetricName::new(format!("policy_store_{method}_{suffix}")) else {
            return;
        };
        let _ = self.metrics.push(&name, MetricPoint::now(elapsed_ms));
    }

    async fn timed<T>(
        &self,
        method: &str,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        let start = Instant::now();
        let result = fut.await;
        #[allow(clippy::cast_precision_loss)]
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.record(method, elapsed_ms, result.is_err());
        result
    }

    /// Timed [`crate::ingress::IngressStore::create`].
    pub async fn create_ingress(&self, policies: &[IngressPolicy]) -> Result<()> {
        self.timed("create_ingress", self.inner.ingress.create(policies)).await
    }

    /// Timed [`crate::ingress::IngressStore::delete`].
    pub async fn delete_ingress(&self, policies: &[IngressPolicy]) -> Result<()> {
        self.timed("delete_ingress", self.inner.ingress.delete(policies)).await
    }

    /// Timed [`crate::ingress::IngressStore::all`].
    pub async fn all_ingress(&self) -> Result<Vec<IngressPolicy>> {
        self.timed("all_ingress", self.inner.ingress.all()).await
    }

    /// Timed [`crate::ingress::IngressStore::by_guids`].
    pub async fn ingress_by_guids(&self, guids: &[String]) -> Result<Vec<IngressPolicy>> {
        self.timed("ingress_by_guids", self.inner.ingress.by_guids(guids)).await
    }

    /// Timed [`crate::ingress::IngressStore::tags`].
    pub async fn tags(&self) -> Result<Vec<TagMapping>> {
        self.timed("tags", self.inner.ingress.tags()).await
    }

    /// Timed [`crate::egress::EgressStore::create`].
    pub async fn create_egress(&self, policies: &[EgressPolicy]) -> Result<()> {
        self.timed("create_egress", self.inner.egress.create(policies)).await
    }

    /// Timed [`crate::egress::EgressStore::delete`].
    pub async fn delete_egress(&self, policies: &[EgressPolicy]) -> Result<()> {
        self.timed("delete_egress", self.inner.egress.delete(policies)).await
    }

    /// Timed [`crate::egress::EgressStore::all`].
    pub async fn all_egress(&self) -> Result<Vec<EgressPolicy>> {
        self.timed("all_egress", self.inner.egress.all()).await
    }
}
