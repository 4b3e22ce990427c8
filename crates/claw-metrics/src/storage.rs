//! In-memory metric storage with retention policies.
//!
//! This module provides the [`MetricStore`] which stores metric data points
//! in memory with automatic expiry based on retention duration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{MetricsError, Result};
use crate::types::{Aggregation, MetricName, MetricPoint, TimeRange};

/// Thread-safe in-memory storage for metrics.
///
/// The store automatically expires data older than the configured retention period.
/// All operations are thread-safe and optimized for concurrent access.
#[derive(Debug)]
pub struct MetricStore {
    /// The retention duration for metrics (in milliseconds).
    retention_millis: i64,
    /// The actual data storage, keyed by metric name.
    data: Arc<RwLock<HashMap<MetricName, Vec<MetricPoint>>>>,
}

impl MetricStore {
    /// Creates a new metric store with the given retention duration.
    ///
    /// Data points older than the retention duration will be automatically
    /// removed during query and push operations.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Retention durations won't exceed i64::MAX ms (~292M years)
    pub fn new(retention: Duration) -> Self {
        Self {
            retention_millis: retention.as_millis() as i64,
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the retention duration in milliseconds.
    #[must_use]
    pub const fn retention_millis(&self) -> i64 {
        self.retention_millis
    }

    /// Pushes a new metric point to the store.
    ///
    /// The point will be inserted in timestamp order and old data will be
    /// expired according to the retention policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    #[allow(clippy::significant_drop_tightening)] // Lock needed for multi-step atomic operation
    pub fn push(&self, name: &MetricName, point: MetricPoint) -> Result<()> {
        let cutoff = MetricPoint::now_timestamp() - self.retention_millis;

        let mut data = self.data.write();
        let points = data.entry(name.clone()).or_default();

        // Remove expired points
        points.retain(|p| p.timestamp >= cutoff);

        // Insert new point maintaining timestamp order
        let insert_pos = points
            .binary_search_by_key(&point.timestamp, |p| p.timestamp)
            .unwrap_or_else(|pos| pos);
        points.insert(insert_pos, point);

        debug!(
            metric = %name,
            points_count = points.len(),
            "pushed metric point"
        );

        Ok(())
    }

    /// Pushes multiple metric points in a batch.
    ///
    /// This is more efficient than calling `push` multiple times.
    ///
    /// # Errors
    ///
    /// Returns an error if any storage operation fails.
    #[allow(clippy::significant_drop_tightening)] // Lock needed for batch atomic operation
    pub fn push_batch(&self, metrics: Vec<(MetricName, MetricPoint)>) -> Result<()> {
        let cutoff = MetricPoint::now_timestamp() - self.retention_millis;

        let mut data = self.data.write();

        for (name, point) in metrics {
            let points = data.entry(name).or_default();

            // Remove expired points
            points.retain(|p| p.timestamp >= cutoff);

            // Insert new point maintaining timestamp order
            let insert_pos = points
                .binary_search_by_key(&point.timestamp, |p| p.timestamp)
                .unwrap_or_else(|pos| pos);
            points.insert(insert_pos, point);
        }

        Ok(())
    }

    /// Queries metric points within the given time range.
    ///
    /// If an aggregation is specified, the returned vector will contain
    /// a single point with the aggregated value.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::MetricNotFound` if the metric doesn't exist.
    #[allow(clippy::significant_drop_tightening)] // Lock scope is intentional for consistency
    pub fn query(
        &self,
        name: &MetricName,
        range: TimeRange,
        aggregation: Option<Aggregation>,
    ) -> Result<Vec<MetricPoint>> {
        let data = self.data.read();

        let points = data.get(name).ok_or_else(|| MetricsError::MetricNotFound {
            name: name.to_string(),
        })?;

        // Filter points within the time range
        let filtered: Vec<&MetricPoint> = points
            .iter()
            .filter(|p| range.contains(p.timestamp))
            .collect();

        match aggregation {
            Some(agg) => {
                let values: Vec<f64> = filtered.iter().map(|p| p.value).collect();

                agg.apply(&values).map_or_else(
                    || Ok(vec![]),
                    |result| {
                        // Use the latest timestamp for the aggregated result
                        let timestamp = filtered
                            .last()
                            .map_or_else(MetricPoint::now_timestamp, |p| p.timestamp);

                        Ok(vec![MetricPoint::new(timestamp, result)])
                    },
                )
            }
            None => Ok(filtered.into_iter().cloned().collect()),
        }
    }

    /// Returns a list of all metric names in the store.
    #[must_use]
    pub fn metrics_list(&self) -> Vec<MetricName> {
        let data = self.data.read();
        data.keys().cloned().collect()
    }

    /// Returns the number of data points for a given metric.
    ///
    /// Returns 0 if the metric doesn't exist.
    #[must_use]
    pub fn metric_count(&self, name: &MetricName) -> usize {
        let data = self.data.read();
        data.get(name).map_or(0, Vec::len)
    }

    /// Removes all data points for a given metric.
    ///
    /// Returns `true` if the metric existed and was removed.
    #[must_use]
    pub fn remove_metric(&self, name: &MetricName) -> bool {
        let mut data = self.data.write();
        data.remove(name).is_some()
    }

    /// Clears all metrics from the store.
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
    }

    /// Manually triggers expiry of old data across all metrics.
    ///
    /// This is automatically done during push operations, but can be
    /// called manually to free up memory.
    pub fn expire_old_data(&self) {
        let cutoff = MetricPoint::now_timestamp() - self.retention_millis;

        let mut data = self.data.write();

        for points in data.values_mut() {
            points.retain(|p| p.timestamp >= cutoff);
        }

        // Remove empty metric series
        data.retain(|_, v| !v.is_empty());
    }
}

impl Clone for MetricStore {
    fn clone(&self) -> Self {
        Self {
            retention_millis: self.retention_millis,
            data: Arc::clone(&self.data),
        }
    }
}

impl Default for MetricStore {
    fn default() -> Self {
        // Default retention of 1 hour
        Self::new(Duration::from_secs(3600))
    }
}
