//! Metrics bridge.
//!
//! Statement counters, rendered in the OpenMetrics text format
//! and served over HTTP for scraping.

pub mod error;
pub mod http_server;
pub mod open_metric;
pub mod registry;
pub mod statements;

pub use error::Error;
pub use http_server::{ServerHandle, Webserver};
pub use open_metric::{Measurement, Metric, MetricType, OpenMetric};
pub use registry::{Entry, Registry};
pub use statements::StatementMetrics;
