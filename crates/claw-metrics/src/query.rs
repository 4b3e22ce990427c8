//! Query helpers for common metric operations.
//!
//! This module provides convenient functions for common metric queries
//! without needing to construct time ranges and aggregations manually.

use std::time::Duration;

use crate::error::Result;
use crate::storage::MetricStore;
use crate::types::{Aggregation, MetricName, MetricPoint, TimeRange};

/// Converts a Duration to milliseconds as i64.
/// Durations exceeding ~292 million years will be truncated.
#[allow(clippy::cast_possible_truncation)]
const fn duration_to_millis(duration: Duration) -> i64 {
    duration.as_millis() as i64
}

/// Returns the last (most recent) value for a metric.
///
/// # Arguments
///
/// * `store` - The metric store to query
/// * `name` - The metric name to look up
///
/// # Returns
///
/// Returns `Some(value)` if the metric has any data points, `None` otherwise.
#[must_use]
pub fn last_value(store: &MetricStore, name: &MetricName) -> Option<f64> {
    let range = TimeRange::last_hours(24); // Look back 24 hours for "last" value
    let points = store.query(name, range, Some(Aggregation::Last)).ok()?;
    points.first().map(|p| p.value)
}

/// Returns the average value over a duration.
///
/// # Arguments
///
/// * `store` - The metric store to query
/// * `name` - The metric name to look up
/// * `duration` - The duration to look back from now
///
/// # Returns
///
/// Returns `Some(average)` if the metric has data in the range, `None` otherwise.
#[must_use]
pub fn average_over(store: &MetricStore, name: &MetricName, duration: Duration) -> Option<f64> {
    let range = TimeRange::last_millis(duration_to_millis(duration));
    let points = store.query(name, range, Some(Aggregation::Avg)).ok()?;
    points.first().map(|p| p.value)
}

/// Returns the maximum value over a duration.
///
/// # Arguments
///
/// * `store` - The metric store to query
/// * `name` - The metric name to look up
/// * `duration` - The duration to look back from now
///
/// # Returns
///
/// Returns `Some(max)` if the metric has data in the range, `None` otherwise.
#[must_use]
pub fn max_over(store: &MetricStore, name: &MetricName, duration: Duration) -> Option<f64> {
    let range = TimeRange::last_millis(duration_to_millis(duration));
    let points = store.query(name, range, Some(Aggregation::Max)).ok()?;
    points.first().map(|p| p.value)
}

/// Returns the minimum value over a duration.
///
/// # Arguments
///
/// * `store` - The metric store to query
/// * `name` - The metric name to look up
/// * `duration` - The duration to look back from now
///
/// # Returns
///
/// Returns `Some(min)` if the metric has data in the range, `None` otherwise.
#[must_use]
pub fn min_over(store: &MetricStore, name: &MetricName, duration: Duration) -> Option<f64> {
    let range = TimeRange::last_millis(duration_to_millis(duration));
    let points = store.query(name, range, Some(Aggregation::Min)).ok()?;
    points.first().map(|p| p.value)
}

/// Returns the sum of values over a duration.
///
/// # Arguments
///
/// * `store` - The metric store to query
/// * `name` - The metric name to look up
/// * `duration` - The duration to look back from now
///
/// # Returns
///
/// Returns `Some(sum)` if the metric has data in the range, `None` otherwise.
#[must_use]
pub fn sum_over(store: &MetricStore, name: &MetricName, duration: Duration) -> Option<f64> {
    let range = TimeRange::last_millis(duration_to_millis(duration));
    let points = store.query(name, range, Some(Aggregation::Sum)).ok()?;
    points.first().map(|p| p.value)
}

/// Calculates the rate of change per second over a duration.
///
/// This is useful for counter-type metrics where you want to know
/// the rate of increase (e.g., requests per second).
///
/// # Arguments
///
/// * `store` - The metric store to query
/// * `name` - The metric name to look up
/// * `duration` - The duration to look back from now
///
/// # Returns
///
/// Returns `Some(rate)` if there are at least 2 data points, `None` otherwise.
/// The rate is calculated as `(last_value - first_value) / time_diff_seconds`.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Timestamp diff precision loss acceptable for rate calculation
pub fn rate(store: &MetricStore, name: &MetricName, duration: Duration) -> Option<f64> {
    let range = TimeRange::last_millis(duration_to_millis(duration));
    let points = store.query(name, range, None).ok()?;

    if points.len() < 2 {
        return None;
    }

    let first = points.first()?;
    let last = points.last()?;

    let time_diff_seconds = (last.timestamp - first.timestamp) as f64 / 1000.0;

    if time_diff_seconds <= 0.0 {
        return None;
    }

    Some((last.value - first.value) / time_diff_seconds)
}

/// Calculates the percentage increase over a duration.
///
/// # Arguments
///
/// * `store` - The metric store to query
/// * `name` - The metric name to look up
/// * `duration` - The duration to look back from now
///
/// # Returns
///
/// Returns `Some(percentage)` if there are at least 2 data points and the first
/// value is non-zero, `None` otherwise.
#[must_use]
pub fn percentage_change(
    store: &MetricStore,
    name: &MetricName,
    duration: Duration,
) -> Option<f64> {
    let range = TimeRange::last_millis(duration_to_millis(duration));
    let points = store.query(name, range, None).ok()?;

    if points.len() < 2 {
        return None;
    }

    let first = points.first()?;
    let last = points.last()?;

    if first.value.abs() < f64::EPSILON {
        return None;
    }

    Some(((last.value - first.value) / first.value) * 100.0)
}

/// Returns the count of data points over a duration.
///
/// # Arguments
///
/// * `store` - The metric store to query
/// * `name` - The metric name to look up
/// * `duration` - The duration to look back from now
///
/// # Returns
///
/// Returns `Some(count)` if the metric exists, `None` otherwise.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Count is always a non-negative integer
pub fn count_over(store: &MetricStore, name: &MetricName, duration: Duration) -> Option<u64> {
    let range = TimeRange::last_millis(duration_to_millis(duration));
    let points = store.query(name, range, Some(Aggregation::Count)).ok()?;
    points.first().map(|p| p.value as u64)
}

/// Returns all points for a metric within a time range, with optional filtering.
///
/// # Arguments
///
/// * `store` - The metric store to query
/// * `name` - The metric name to look up
/// * `range` - The time range to query
/// * `label_filter` - Optional label key-value pair to filter by
///
/// # Errors
///
/// Returns an error if the metric doesn't exist.
pub fn points_with_filter(
    store: &MetricStore,
    name: &MetricName,
    range: TimeRange,
    label_filter: Option<(&str, &str)>,
) -> Result<Vec<MetricPoint>> {
    let points = store.query(name, range, None)?;

    match label_filter {
        Some((key, value)) => Ok(points
            .into_iter()
            .filter(|p| p.labels.get(key).is_some_and(|v| v == value))
            .collect()),
        None => Ok(points),
    }
}

/// A builder for constructing complex queries.
#[derive(Debug)]
pub struct QueryBuilder<'a> {
    store: &'a MetricStore,
    name: MetricName,
    range: Option<TimeRange>,
    aggregation: Option<Aggregation>,
    label_filters: Vec<(String, String)>,
}

impl<'a> QueryBuilder<'a> {
    /// Creates a new query builder.
    #[must_use]
    pub const fn new(store: &'a MetricStore, name: MetricName) -> Self {
        Self {
            store,
            name,
            range: None,
            aggregation: None,
            label_filters: Vec::new(),
        }
    }

    /// Sets the time range for the query.
    #[must_use]
    pub const fn range(mut self, range: TimeRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Sets the query to look back a specific duration from now.
    #[must_use]
    pub fn last(mut self, duration: Duration) -> Self {
        self.range = Some(TimeRange::last_millis(duration_to_millis(duration)));
        self
    }

    /// Sets the aggregation function.
    #[must_use]
    pub const fn aggregate(mut self, agg: Aggregation) -> Self {
        self.aggregation = Some(agg);
        self
    }

    /// Adds a label filter.
    #[must_use]
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.label_filters.push((key.into(), value.into()));
        self
    }

    /// Executes the query and returns the matching points.
    ///
    /// # Errors
    ///
    /// Returns an error if the metric doesn't exist.
    pub fn execute(self) -> Result<Vec<MetricPoint>> {
        let range = self.range.unwrap_or_else(|| TimeRange::last_hours(1));

        let points = self.store.query(&self.name, range, None)?;

        // Apply label filters
        let filtered: Vec<MetricPoint> = points
            .into_iter()
            .filter(|p| {
                self.label_filters
                    .iter()
                    .all(|(k, v)| p.labels.get(k).is_some_and(|pv| pv == v))
            })
            .collect();

        // Apply aggregation if specified
        match self.aggregation {
            Some(agg) => {
                let values: Vec<f64> = filtered.iter().map(|p| p.value).collect();
                agg.apply(&values).map_or_else(
                    || Ok(vec![]),
                    |result| {
                        let timestamp = filtered
                            .last()
                            .map_or_else(MetricPoint::now_timestamp, |p| p.timestamp);
                        Ok(vec![MetricPoint::new(timestamp, result)])
                    },
                )
            }
            None => Ok(filtered),
        }
    }

    /// Executes the query and returns just the value (for aggregated queries).
    ///
    /// # Errors
    ///
    /// Returns an error if the metric doesn't exist.
    pub fn value(self) -> Result<Option<f64>> {
        let points = self.execute()?;
        Ok(points.first().map(|p| p.value))
    }
}
