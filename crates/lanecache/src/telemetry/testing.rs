// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test utilities for telemetry validation.

use std::{collections::HashMap, fmt, sync::Arc};

use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::{
    InMemoryMetricExporter, SdkMeterProvider,
    data::{AggregatedMetrics, MetricData, ResourceMetrics, ScopeMetrics},
};
use parking_lot::Mutex;
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{Layer, layer::Context, layer::SubscriberExt};

use super::{CacheActivity, CacheOperation, attributes, metrics};

/// Reads back the metrics a cache recorded.
#[derive(Debug)]
pub(crate) struct MetricTester {
    exporter: InMemoryMetricExporter,
    provider: SdkMeterProvider,
}

impl MetricTester {
    #[must_use]
    pub fn new() -> Self {
        let in_memory = InMemoryMetricExporter::default();

        Self {
            exporter: in_memory.clone(),
            provider: SdkMeterProvider::builder().with_periodic_exporter(in_memory).build(),
        }
    }

    #[must_use]
    pub fn meter_provider(&self) -> &SdkMeterProvider {
        &self.provider
    }

    /// Number of `activity` events counted for `cache`.
    pub fn event_count(&self, cache: &'static str, activity: CacheActivity) -> u64 {
        let wanted = [
            KeyValue::new(attributes::CACHE_NAME, cache),
            KeyValue::new(attributes::CACHE_ACTIVITY_NAME, activity.as_str()),
        ];

        self.read(metrics::CACHE_EVENT_COUNT_NAME, |data| match data {
            AggregatedMetrics::U64(MetricData::Sum(sum)) => sum
                .data_points()
                .filter(|point| carries(point.attributes(), &wanted))
                .map(|point| point.value())
                .sum(),
            _ => 0,
        })
        .unwrap_or(0)
    }

    /// Number of timed `operation` runs on `cache`.
    pub fn duration_samples(&self, cache: &'static str, operation: CacheOperation) -> u64 {
        let wanted = [
            KeyValue::new(attributes::CACHE_NAME, cache),
            KeyValue::new(attributes::CACHE_OPERATION_NAME, operation.as_str()),
        ];

        self.read(metrics::CACHE_OPERATION_DURATION_NAME, |data| match data {
            AggregatedMetrics::F64(MetricData::Histogram(histogram)) => histogram
                .data_points()
                .filter(|point| carries(point.attributes(), &wanted))
                .map(|point| point.count())
                .sum(),
            _ => 0,
        })
        .unwrap_or(0)
    }

    /// Last resident-entry count reported for `cache`.
    pub fn size(&self, cache: &'static str) -> Option<u64> {
        let wanted = [KeyValue::new(attributes::CACHE_NAME, cache)];

        self.read(metrics::CACHE_SIZE_NAME, |data| match data {
            AggregatedMetrics::U64(MetricData::Gauge(gauge)) => gauge
                .data_points()
                .find(|point| carries(point.attributes(), &wanted))
                .map(|point| point.value()),
            _ => None,
        })
        .flatten()
    }

    fn read<T>(&self, name: &str, extract: impl FnOnce(&AggregatedMetrics) -> T) -> Option<T> {
        self.provider.force_flush().expect("metrics flush");
        let latest: ResourceMetrics = self.exporter.get_finished_metrics().expect("finished metrics").pop()?;

        latest
            .scope_metrics()
            .flat_map(ScopeMetrics::metrics)
            .find(|metric| metric.name() == name)
            .map(|metric| extract(metric.data()))
    }
}

fn carries<'a>(attributes: impl Iterator<Item = &'a KeyValue>, wanted: &[KeyValue]) -> bool {
    let attributes: Vec<&KeyValue> = attributes.collect();
    wanted.iter().all(|kv| attributes.contains(&kv))
}

/// One `tracing` event with its fields rendered as text.
#[derive(Debug, Clone)]
pub(crate) struct CapturedEvent {
    pub level: Level,
    fields: HashMap<&'static str, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

struct FieldRecorder<'a>(&'a mut HashMap<&'static str, String>);

impl Visit for FieldRecorder<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name(), value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name(), format!("{value:?}"));
    }
}

/// Captures `tracing` events as structured records.
#[derive(Debug, Clone, Default)]
pub(crate) struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().clone()
    }

    /// Activities logged for `cache`, oldest first.
    pub fn activities(&self, cache: &str) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.field(attributes::CACHE_NAME) == Some(cache))
            .filter_map(|event| event.field(attributes::CACHE_ACTIVITY_NAME).map(str::to_owned))
            .collect()
    }

    /// Creates a subscriber that records into this capture. Use with `set_default()`.
    #[must_use]
    pub fn subscriber(&self) -> impl Subscriber {
        tracing_subscriber::registry().with(self.clone())
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = HashMap::new();
        event.record(&mut FieldRecorder(&mut fields));
        self.events.lock().push(CapturedEvent {
            level: *event.metadata().level(),
            fields,
        });
    }
}
