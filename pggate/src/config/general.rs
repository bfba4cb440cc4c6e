use std::time::Duration;

use serde::{Deserialize, Serialize};

/// General settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct General {
    /// Number of Tokio worker threads. 0 means current-thread runtime.
    #[serde(default = "General::default_workers")]
    pub workers: usize,
    /// How long a write request can wait for the storage tier, in ms.
    #[serde(default = "General::default_dispatch_timeout")]
    pub dispatch_timeout: u64,
    /// Allow DELETE statements to bind non-key columns as equality filters.
    #[serde(default)]
    pub conditional_delete: bool,
    /// Prefix added to every metric name.
    #[serde(default)]
    pub openmetrics_namespace: Option<String>,
}

impl Default for General {
    fn default() -> Self {
        Self {
            workers: Self::default_workers(),
            dispatch_timeout: Self::default_dispatch_timeout(),
            conditional_delete: false,
            openmetrics_namespace: None,
        }
    }
}

impl General {
    fn default_workers() -> usize {
        2
    }

    fn default_dispatch_timeout() -> u64 {
        u64::MAX
    }

    /// Dispatch timeout. The default means no timeout.
    pub fn dispatch_timeout(&self) -> Duration {
        match self.dispatch_timeout {
            u64::MAX => Duration::MAX,
            ms => Duration::from_millis(ms),
        }
    }
}
