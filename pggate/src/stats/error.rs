//! Metrics errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to bind metrics webserver to \"{address}\": {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no listen address")]
    NoListenAddress,

    #[error("invalid metric name \"{0}\"")]
    InvalidMetricName(String),

    #[error("metric \"{0}\" registered twice")]
    DuplicateMetricName(String),
}
