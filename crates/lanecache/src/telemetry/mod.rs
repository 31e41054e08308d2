// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache telemetry.
//!
//! Every cache operation can be reported as a structured `tracing` event and,
//! with the `metrics` feature, as OpenTelemetry metrics. Both sinks are off
//! until enabled on the builder.

use std::{sync::Arc, time::Duration};

#[cfg(any(feature = "metrics", test))]
use opentelemetry::{
    KeyValue,
    metrics::{Counter, Gauge, Histogram, Meter},
};
use tracing::Level;

use crate::cache::CacheName;

#[cfg(any(feature = "metrics", test))]
pub(crate) mod attributes;
#[cfg(any(feature = "metrics", test))]
pub(crate) mod metrics;
#[cfg(test)]
pub(crate) mod testing;

#[derive(Debug, Clone, Copy)]
pub(crate) enum CacheOperation {
    Access,
    Update,
    Invalidate,
    Delete,
    Evict,
}

impl CacheOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "cache.access",
            Self::Update => "cache.update",
            Self::Invalidate => "cache.invalidate",
            Self::Delete => "cache.delete",
            Self::Evict => "cache.evict",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum CacheActivity {
    Hit,
    Miss,
    NotFound,
    Updated,
    Invalidated,
    Deleted,
    Evicted,
    Error,
}

impl CacheActivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::NotFound => "cache.not_found",
            Self::Updated => "cache.updated",
            Self::Invalidated => "cache.invalidated",
            Self::Deleted => "cache.deleted",
            Self::Evicted => "cache.evicted",
            Self::Error => "cache.error",
        }
    }

    pub fn level(self) -> Level {
        match self {
            Self::Hit | Self::Miss | Self::NotFound | Self::Evicted => Level::DEBUG,
            Self::Updated | Self::Invalidated | Self::Deleted => Level::INFO,
            Self::Error => Level::ERROR,
        }
    }
}

#[derive(Debug, Default)]
struct CacheTelemetryInner {
    logging_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    event_counter: Option<Counter<u64>>,
    #[cfg(any(feature = "metrics", test))]
    operation_duration: Option<Histogram<f64>>,
    #[cfg(any(feature = "metrics", test))]
    cache_size: Option<Gauge<u64>>,
}

/// Records cache operations as logs and metrics.
#[derive(Clone, Debug, Default)]
pub(crate) struct CacheTelemetry {
    inner: Arc<CacheTelemetryInner>,
}

impl CacheTelemetry {
    pub fn new(logging_enabled: bool) -> Self {
        Self {
            inner: Arc::new(CacheTelemetryInner {
                logging_enabled,
                #[cfg(any(feature = "metrics", test))]
                event_counter: None,
                #[cfg(any(feature = "metrics", test))]
                operation_duration: None,
                #[cfg(any(feature = "metrics", test))]
                cache_size: None,
            }),
        }
    }

    #[cfg(any(feature = "metrics", test))]
    pub fn with_meter(logging_enabled: bool, meter: &Meter) -> Self {
        Self {
            inner: Arc::new(CacheTelemetryInner {
                logging_enabled,
                event_counter: Some(metrics::create_event_counter(meter)),
                operation_duration: Some(metrics::create_operation_duration_histogram(meter)),
                cache_size: Some(metrics::create_cache_size_gauge(meter)),
            }),
        }
    }

    /// Records one completed operation.
    #[inline]
    pub fn record(&self, cache_name: CacheName, operation: CacheOperation, activity: CacheActivity, duration: Option<Duration>) {
        #[cfg(any(feature = "metrics", test))]
        {
            let attrs = [
                KeyValue::new(attributes::CACHE_NAME, cache_name),
                KeyValue::new(attributes::CACHE_OPERATION_NAME, operation.as_str()),
                KeyValue::new(attributes::CACHE_ACTIVITY_NAME, activity.as_str()),
            ];

            if let Some(c) = &self.inner.event_counter {
                c.add(1, &attrs);
            }

            if let (Some(d), Some(h)) = (duration, &self.inner.operation_duration) {
                h.record(d.as_secs_f64(), &attrs);
            }
        }

        if self.inner.logging_enabled {
            Self::emit(cache_name, operation, activity, duration);
        }
    }

    /// Records the current number of resident entries.
    #[inline]
    #[cfg_attr(not(any(feature = "metrics", test)), expect(unused_variables, reason = "only metrics consume the size"))]
    pub fn record_size(&self, cache_name: CacheName, size: usize) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(g) = &self.inner.cache_size {
            g.record(u64::try_from(size).unwrap_or(u64::MAX), &[KeyValue::new(attributes::CACHE_NAME, cache_name)]);
        }
    }

    fn emit(cache_name: CacheName, operation: CacheOperation, activity: CacheActivity, duration: Option<Duration>) {
        let op = operation.as_str();
        let act = activity.as_str();
        let duration_ns = duration.map(|d| d.as_nanos());

        // Tracing levels must be constant, hence one arm per level.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    cache.name = cache_name,
                    cache.operation = op,
                    cache.activity = act,
                    cache.duration_ns = ?duration_ns,
                    "cache.event"
                )
            };
        }

        let level = activity.level();
        if level == Level::ERROR {
            emit_event!(error);
        } else if level == Level::INFO {
            emit_event!(info);
        } else {
            emit_event!(debug);
        }
    }
}
