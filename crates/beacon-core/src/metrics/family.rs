use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use dashmap::DashMap;

use crate::error::{BeaconError, Result};

type LabelKey = Vec<String>;

fn label_key(name: &str, label_names: &[String], values: &[&str]) -> Result<LabelKey> {
    if values.len() != label_names.len() {
        return Err(BeaconError::LabelCardinality {
            name: name.to_string(),
            expected: label_names.len(),
            got: values.len(),
        });
    }
    Ok(values.iter().map(|v| v.to_string()).collect())
}

/// Sorted copy of every series, so exports are deterministic.
fn sorted<T>(mut rows: Vec<(LabelKey, T)>) -> Vec<(LabelKey, T)> {
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows
}

/// Monotonic counters keyed by label values, in declared label order.
#[derive(Debug)]
pub struct CounterVec {
    name: String,
    label_names: Vec<String>,
    series: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    pub fn new(name: impl Into<String>, label_names: &[&str]) -> Self {
        let vec = Self {
            name: name.into(),
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
            series: DashMap::new(),
        };
        if vec.label_names.is_empty() {
            vec.series.insert(Vec::new(), AtomicU64::new(0));
        }
        vec
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Increment by 1.
    pub fn inc(&self, values: &[&str]) -> Result<()> {
        self.add(values, 1)
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, values: &[&str], v: u64) -> Result<()> {
        let key = label_key(&self.name, &self.label_names, values)?;
        let counter = self.series.entry(key).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
        Ok(())
    }

    /// Current count, or `None` if the series was never touched.
    pub fn get(&self, values: &[&str]) -> Option<u64> {
        let key: LabelKey = values.iter().map(|v| v.to_string()).collect();
        self.series.get(&key).map(|c| c.load(Ordering::Relaxed))
    }

    pub(crate) fn collect(&self) -> Vec<(LabelKey, u64)> {
        sorted(
            self.series
                .iter()
                .map(|r| (r.key().clone(), r.value().load(Ordering::Relaxed)))
                .collect(),
        )
    }
}

/// One histogram series. Guarded as a unit so readers never see a torn
/// bucket/count/sum combination.
#[derive(Debug, Clone)]
pub(crate) struct HistogramState {
    pub(crate) buckets: Vec<u64>,
    pub(crate) sum: f64,
    pub(crate) count: u64,
}

impl HistogramState {
    fn new(n: usize) -> Self {
        Self {
            buckets: vec![0; n],
            sum: 0.0,
            count: 0,
        }
    }
}

/// Histograms with fixed cumulative buckets, keyed by label values.
#[derive(Debug)]
pub struct HistogramVec {
    name: String,
    label_names: Vec<String>,
    bounds: Vec<f64>,
    series: DashMap<LabelKey, Mutex<HistogramState>>,
}

impl HistogramVec {
    /// Buckets must be finite, non-empty and strictly ascending.
    pub fn new(name: impl Into<String>, label_names: &[&str], bounds: &[f64]) -> Result<Self> {
        let name = name.into();
        let ascending = bounds.windows(2).all(|w| w[0] < w[1]);
        if bounds.is_empty() || !ascending || bounds.iter().any(|b| !b.is_finite()) {
            return Err(BeaconError::InvalidBuckets(name));
        }
        let vec = Self {
            name,
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
            bounds: bounds.to_vec(),
            series: DashMap::new(),
        };
        if vec.label_names.is_empty() {
            vec.series
                .insert(Vec::new(), Mutex::new(HistogramState::new(vec.bounds.len())));
        }
        Ok(vec)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    /// Record `value` into every bucket whose upper bound is >= `value`.
    pub fn observe(&self, values: &[&str], value: f64) -> Result<()> {
        let key = label_key(&self.name, &self.label_names, values)?;
        let n = self.bounds.len();
        let series = self
            .series
            .entry(key)
            .or_insert_with(|| Mutex::new(HistogramState::new(n)))
            .downgrade();
        let mut state = series.lock().unwrap_or_else(PoisonError::into_inner);
        state.count += 1;
        state.sum += value;
        for (i, &le) in self.bounds.iter().enumerate() {
            if value <= le {
                state.buckets[i] += 1;
            }
        }
        Ok(())
    }

    /// Observation count for a series, or `None` if never observed.
    pub fn count(&self, values: &[&str]) -> Option<u64> {
        let key: LabelKey = values.iter().map(|v| v.to_string()).collect();
        self.series
            .get(&key)
            .map(|s| s.lock().unwrap_or_else(PoisonError::into_inner).count)
    }

    pub(crate) fn collect(&self) -> Vec<(LabelKey, HistogramState)> {
        sorted(
            self.series
                .iter()
                .map(|r| {
                    let state = r.value().lock().unwrap_or_else(PoisonError::into_inner).clone();
                    (r.key().clone(), state)
                })
                .collect(),
        )
    }
}

/// Single last-write-wins value, stored as f64 bits.
#[derive(Debug)]
pub struct Gauge {
    name: String,
    bits: AtomicU64,
}

impl Gauge {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}
