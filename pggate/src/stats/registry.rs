//! Registered counters.
//!
//! The webserver serves whatever table was registered last.
//! Counters are plain atomics, so incrementing them never
//! takes the registry lock.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use tracing::info;

use super::open_metric::{Measurement, Metric, MetricType, OpenMetric};
use super::Error;

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::default);

// OpenMetrics metric name grammar.
static METRIC_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").expect("valid regex"));

/// Longest metric name, in bytes.
pub const MAX_METRIC_NAME_LEN: usize = 99;

/// A named counter pair: number of calls and time spent in them.
#[derive(Debug)]
pub struct Entry {
    name: String,
    calls: AtomicU64,
    /// Microseconds.
    total_time: AtomicU64,
}

impl Entry {
    pub fn new(name: impl ToString) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            calls: AtomicU64::new(0),
            total_time: AtomicU64::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Cumulative time, in microseconds.
    pub fn total_time(&self) -> u64 {
        self.total_time.load(Ordering::Relaxed)
    }

    /// Count one call that took `elapsed`.
    pub fn record(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.total_time.fetch_add(micros, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
struct Table {
    node_name: String,
    entries: Vec<Arc<Entry>>,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Calls,
    TotalTime,
}

struct EntryMetric {
    entry: Arc<Entry>,
    node_name: String,
    field: Field,
}

impl OpenMetric for EntryMetric {
    fn name(&self) -> String {
        match self.field {
            Field::Calls => format!("{}_calls", self.entry.name()),
            Field::TotalTime => format!("{}_time_microseconds", self.entry.name()),
        }
    }

    fn measurements(&self) -> Vec<Measurement> {
        let value = match self.field {
            Field::Calls => self.entry.calls(),
            Field::TotalTime => self.entry.total_time(),
        };

        vec![Measurement {
            labels: vec![("node".into(), self.node_name.clone())],
            value,
        }]
    }

    fn unit(&self) -> Option<String> {
        match self.field {
            Field::Calls => None,
            Field::TotalTime => Some("microseconds".into()),
        }
    }

    fn metric_type(&self) -> MetricType {
        MetricType::Counter
    }

    fn help(&self) -> Option<String> {
        match self.field {
            Field::Calls => Some(format!("Number of {} calls.", self.entry.name())),
            Field::TotalTime => Some(format!("Time spent in {} calls.", self.entry.name())),
        }
    }
}

/// JSON view of one entry.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EntrySnapshot {
    pub name: String,
    pub calls: u64,
    pub total_time_us: u64,
}

/// JSON view of the registry.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub node: String,
    pub timestamp: String,
    pub metrics: Vec<EntrySnapshot>,
}

/// Table of counters served by the webserver.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    table: Arc<Mutex<Arc<Table>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry.
    pub fn global() -> Registry {
        REGISTRY.clone()
    }

    /// Replace the served table.
    ///
    /// Every name must be a valid OpenMetrics name of at most
    /// [`MAX_METRIC_NAME_LEN`] bytes, and unique in the table.
    /// Nothing changes if any of them isn't.
    pub fn register(&self, entries: Vec<Arc<Entry>>, node_name: &str) -> Result<(), Error> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.name().len() > MAX_METRIC_NAME_LEN
                || !METRIC_NAME.is_match(entry.name())
            {
                return Err(Error::InvalidMetricName(entry.name().to_owned()));
            }
            if !seen.insert(entry.name()) {
                return Err(Error::DuplicateMetricName(entry.name().to_owned()));
            }
        }

        info!(
            "registered {} metrics for node \"{}\"",
            entries.len(),
            node_name
        );

        *self.table.lock() = Arc::new(Table {
            node_name: node_name.to_owned(),
            entries,
        });

        Ok(())
    }

    /// Registered entries.
    pub fn entries(&self) -> Vec<Arc<Entry>> {
        self.table.lock().entries.clone()
    }

    fn current(&self) -> Arc<Table> {
        self.table.lock().clone()
    }

    /// Render all entries in the OpenMetrics text format.
    pub fn openmetrics(&self) -> String {
        let table = self.current();
        let mut output = String::new();

        for entry in &table.entries {
            for field in [Field::Calls, Field::TotalTime] {
                let metric = Metric::new(EntryMetric {
                    entry: entry.clone(),
                    node_name: table.node_name.clone(),
                    field,
                });
                output.push_str(&metric.to_string());
            }
        }

        output.push_str("# EOF\n");
        output
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> Snapshot {
        let table = self.current();

        Snapshot {
            node: table.node_name.clone(),
            timestamp: Utc::now().to_rfc3339(),
            metrics: table
                .entries
                .iter()
                .map(|entry| EntrySnapshot {
                    name: entry.name().to_owned(),
                    calls: entry.calls(),
                    total_time_us: entry.total_time(),
                })
                .collect(),
        }
    }
}
