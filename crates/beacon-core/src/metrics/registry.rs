use std::collections::HashMap;

use crate::error::{BeaconError, Result};

use super::family::{CounterVec, Gauge, HistogramVec};
use super::{
    ACTIVE_CONNECTIONS, BUSINESS_OPERATIONS_TOTAL, DATA_PROCESSING_DURATION_SECONDS,
    DEFAULT_BUCKETS, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS, PROCESSING_BUCKETS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Histogram,
    Gauge,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Histogram => "histogram",
            MetricKind::Gauge => "gauge",
        }
    }
}

#[derive(Debug)]
enum Family {
    Counter(CounterVec),
    Histogram(HistogramVec),
    Gauge(Gauge),
}

impl Family {
    fn kind(&self) -> MetricKind {
        match self {
            Family::Counter(_) => MetricKind::Counter,
            Family::Histogram(_) => MetricKind::Histogram,
            Family::Gauge(_) => MetricKind::Gauge,
        }
    }
}

#[derive(Debug)]
struct Entry {
    help: String,
    family: Family,
}

/// Declares the metric set. Names must be unique.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: Vec<(String, Entry)>,
    error: Option<BeaconError>,
}

impl RegistryBuilder {
    fn push(mut self, name: &str, help: &str, family: Result<Family>) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.entries.iter().any(|(n, _)| n == name) {
            self.error = Some(BeaconError::DuplicateMetric(name.to_string()));
            return self;
        }
        match family {
            Ok(family) => self.entries.push((
                name.to_string(),
                Entry {
                    help: help.to_string(),
                    family,
                },
            )),
            Err(e) => self.error = Some(e),
        }
        self
    }

    pub fn counter(self, name: &str, help: &str, labels: &[&str]) -> Self {
        self.push(name, help, Ok(Family::Counter(CounterVec::new(name, labels))))
    }

    pub fn histogram(self, name: &str, help: &str, labels: &[&str], buckets: &[f64]) -> Self {
        let family = HistogramVec::new(name, labels, buckets).map(Family::Histogram);
        self.push(name, help, family)
    }

    pub fn gauge(self, name: &str, help: &str) -> Self {
        self.push(name, help, Ok(Family::Gauge(Gauge::new(name))))
    }

    /// Fails with the first declaration error encountered.
    pub fn build(self) -> Result<Registry> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let order = self.entries.iter().map(|(n, _)| n.clone()).collect();
        Ok(Registry {
            families: self.entries.into_iter().collect(),
            order,
        })
    }
}

/// Process-wide metric registry.
///
/// The family table is fixed after construction; only series state mutates.
#[derive(Debug)]
pub struct Registry {
    families: HashMap<String, Entry>,
    order: Vec<String>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// The service's fixed metric set.
    pub fn standard() -> Result<Self> {
        Self::builder()
            .counter(
                HTTP_REQUESTS_TOTAL,
                "Total number of HTTP requests",
                &["method", "path", "status"],
            )
            .histogram(
                HTTP_REQUEST_DURATION_SECONDS,
                "HTTP request duration in seconds",
                &["method", "path"],
                &DEFAULT_BUCKETS,
            )
            .gauge(ACTIVE_CONNECTIONS, "Number of active connections")
            .counter(
                BUSINESS_OPERATIONS_TOTAL,
                "Total number of business operations",
                &["operation", "status"],
            )
            .histogram(
                DATA_PROCESSING_DURATION_SECONDS,
                "Duration of data processing operations",
                &[],
                &PROCESSING_BUCKETS,
            )
            .build()
    }

    fn entry(&self, name: &str) -> Result<&Entry> {
        self.families
            .get(name)
            .ok_or_else(|| BeaconError::UnknownMetric(name.to_string()))
    }

    fn kind_error(name: &str, expected: MetricKind, actual: MetricKind) -> BeaconError {
        BeaconError::MetricKind {
            name: name.to_string(),
            expected: expected.as_str(),
            actual: actual.as_str(),
        }
    }

    /// Add 1 to the series identified by `labels`, creating it on first use.
    pub fn increment(&self, name: &str, labels: &[&str]) -> Result<()> {
        self.counter(name)?.inc(labels)
    }

    /// Record `value` into a histogram series.
    pub fn observe(&self, name: &str, labels: &[&str], value: f64) -> Result<()> {
        self.histogram(name)?.observe(labels, value)
    }

    /// Replace a gauge's value.
    pub fn set(&self, name: &str, value: f64) -> Result<()> {
        self.gauge(name)?.set(value);
        Ok(())
    }

    pub fn counter(&self, name: &str) -> Result<&CounterVec> {
        match &self.entry(name)?.family {
            Family::Counter(c) => Ok(c),
            other => Err(Self::kind_error(name, MetricKind::Counter, other.kind())),
        }
    }

    pub fn histogram(&self, name: &str) -> Result<&HistogramVec> {
        match &self.entry(name)?.family {
            Family::Histogram(h) => Ok(h),
            other => Err(Self::kind_error(name, MetricKind::Histogram, other.kind())),
        }
    }

    pub fn gauge(&self, name: &str) -> Result<&Gauge> {
        match &self.entry(name)?.family {
            Family::Gauge(g) => Ok(g),
            other => Err(Self::kind_error(name, MetricKind::Gauge, other.kind())),
        }
    }

    /// Copy every family, one series at a time, in declaration order.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let families = self
            .order
            .iter()
            .filter_map(|name| self.families.get(name).map(|e| (name, e)))
            .map(|(name, entry)| {
                let (label_names, series) = match &entry.family {
                    Family::Counter(c) => (
                        c.label_names().to_vec(),
                        c.collect()
                            .into_iter()
                            .map(|(labels, v)| SeriesSnapshot {
                                labels,
                                value: SeriesValue::Counter(v),
                            })
                            .collect(),
                    ),
                    Family::Histogram(h) => (
                        h.label_names().to_vec(),
                        h.collect()
                            .into_iter()
                            .map(|(labels, state)| SeriesSnapshot {
                                labels,
                                value: SeriesValue::Histogram {
                                    buckets: h.bounds().iter().copied().zip(state.buckets).collect(),
                                    sum: state.sum,
                                    count: state.count,
                                },
                            })
                            .collect(),
                    ),
                    Family::Gauge(g) => (
                        Vec::new(),
                        vec![SeriesSnapshot {
                            labels: Vec::new(),
                            value: SeriesValue::Gauge(g.get()),
                        }],
                    ),
                };
                FamilySnapshot {
                    name: name.clone(),
                    help: entry.help.clone(),
                    kind: entry.family.kind(),
                    label_names,
                    series,
                }
            })
            .collect();
        RegistrySnapshot { families }
    }
}

/// Point-in-time copy of the registry.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub families: Vec<FamilySnapshot>,
}

impl RegistrySnapshot {
    pub fn family(&self, name: &str) -> Option<&FamilySnapshot> {
        self.families.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct FamilySnapshot {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub label_names: Vec<String>,
    pub series: Vec<SeriesSnapshot>,
}

#[derive(Debug, Clone)]
pub struct SeriesSnapshot {
    pub labels: Vec<String>,
    pub value: SeriesValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesValue {
    Counter(u64),
    Gauge(f64),
    /// Cumulative `(upper_bound, count)` pairs, excluding `+Inf`.
    Histogram {
        buckets: Vec<(f64, u64)>,
        sum: f64,
        count: u64,
    },
}
