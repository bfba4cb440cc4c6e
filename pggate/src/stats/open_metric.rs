//! OpenMetrics text format.

use std::fmt::Display;
use std::ops::Deref;

use crate::config::config;

/// Something that can be rendered as an OpenMetrics metric family.
pub trait OpenMetric: Send + Sync {
    fn name(&self) -> String;
    /// Samples.
    fn measurements(&self) -> Vec<Measurement>;
    /// Metric unit. Must be a suffix of the name.
    fn unit(&self) -> Option<String> {
        None
    }

    fn metric_type(&self) -> MetricType {
        MetricType::Gauge
    }

    fn help(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricType {
    Counter,
    Gauge,
}

impl Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Counter => write!(f, "counter"),
            Self::Gauge => write!(f, "gauge"),
        }
    }
}

/// One sample.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub labels: Vec<(String, String)>,
    pub value: u64,
}

impl Measurement {
    pub fn render(&self, name: &str) -> String {
        let labels = if self.labels.is_empty() {
            "".into()
        } else {
            let labels = self
                .labels
                .iter()
                .map(|(name, value)| format!("{}=\"{}\"", name, escape_label(value)))
                .collect::<Vec<_>>();
            format!("{{{}}}", labels.join(","))
        };
        format!("{}{} {}", name, labels, self.value)
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Metric family, ready to render.
pub struct Metric {
    metric: Box<dyn OpenMetric>,
    namespace: String,
}

impl Metric {
    /// Metric prefixed with the configured namespace.
    pub fn new(metric: impl OpenMetric + 'static) -> Self {
        let namespace = config()
            .general
            .openmetrics_namespace
            .clone()
            .unwrap_or_default();
        Self::with_namespace(metric, namespace)
    }

    /// Metric prefixed with `namespace`.
    pub fn with_namespace(metric: impl OpenMetric + 'static, namespace: impl ToString) -> Self {
        Self {
            metric: Box::new(metric),
            namespace: namespace.to_string(),
        }
    }
}

impl Deref for Metric {
    type Target = Box<dyn OpenMetric>;

    fn deref(&self) -> &Self::Target {
        &self.metric
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = format!("{}{}", self.namespace, self.name());
        let metric_type = self.metric_type();

        writeln!(f, "# TYPE {} {}", name, metric_type)?;
        if let Some(unit) = self.unit() {
            writeln!(f, "# UNIT {} {}", name, unit)?;
        }
        if let Some(help) = self.help() {
            writeln!(f, "# HELP {} {}", name, help)?;
        }

        // Counter samples carry the _total suffix.
        let sample = match metric_type {
            MetricType::Counter => format!("{}_total", name),
            MetricType::Gauge => name,
        };

        for measurement in self.measurements() {
            writeln!(f, "{}", measurement.render(&sample))?;
        }
        Ok(())
    }
}
