// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire shape of a single metric observation pushed to the collector.

use serde::{Serialize, Serializer};
use std::time::UNIX_EPOCH;

use crate::constants::STEP_SECS;

/// Numeric value of a metric. Both variants land on the wire as plain JSON
/// numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            MetricValue::Int(value) => serializer.serialize_i64(value),
            MetricValue::Float(value) if value.is_finite() => serializer.serialize_f64(value),
            // serde_json would write `null` for these.
            MetricValue::Float(_) => serializer.serialize_f64(0.0),
        }
    }
}

impl MetricValue {
    /// Builds a float value, mapping NaN and infinities to `0.0` since JSON has no
    /// representation for them.
    pub fn float(value: f64) -> Self {
        if value.is_finite() {
            MetricValue::Float(value)
        } else {
            MetricValue::Float(0.0)
        }
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        MetricValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Int(value)
    }
}

/// Kind of metric as understood by the collector. Only gauges are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CounterType {
    // The collector expects this exact spelling.
    #[serde(rename = "GUAGE")]
    Gauge,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub endpoint: String,
    pub metric: String,
    pub value: MetricValue,
    pub step: i64,
    #[serde(rename = "counterType")]
    pub counter_type: CounterType,
    pub tags: String,
    pub timestamp: i64,
}

impl MetricRecord {
    /// Creates a gauge record with the collection step and empty tags.
    pub fn gauge(
        endpoint: impl Into<String>,
        metric: impl Into<String>,
        value: impl Into<MetricValue>,
        timestamp: i64,
    ) -> Self {
        MetricRecord {
            endpoint: endpoint.into(),
            metric: metric.into(),
            value: value.into(),
            step: STEP_SECS as i64,
            counter_type: CounterType::Gauge,
            tags: String::new(),
            timestamp,
        }
    }
}

/// Current Unix time in seconds, or 0 if the clock is set before the epoch.
pub fn now_unix_secs() -> i64 {
    UNIX_EPOCH
        .elapsed()
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
        .try_into()
        .unwrap_or_default()
}
