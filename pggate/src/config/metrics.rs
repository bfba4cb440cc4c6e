use serde::{Deserialize, Serialize};

use super::Error;

/// Metrics webserver settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Metrics {
    /// Address the webserver binds to.
    #[serde(default = "Metrics::default_listen_address")]
    pub listen_address: String,
    /// Port to serve metrics on. Metrics are not served if not set.
    #[serde(default)]
    pub port: Option<u16>,
    /// Value of the `node` label attached to every measurement.
    #[serde(default = "Metrics::default_node_name")]
    pub node_name: String,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            listen_address: Self::default_listen_address(),
            port: None,
            node_name: Self::default_node_name(),
        }
    }
}

impl Metrics {
    fn default_listen_address() -> String {
        "0.0.0.0".into()
    }

    fn default_node_name() -> String {
        "pggate".into()
    }

    pub(crate) fn check(&self) -> Result<(), Error> {
        if self.listen_address.trim().is_empty() {
            return Err(Error::EmptyListenAddress);
        }

        if self.node_name.trim().is_empty() {
            return Err(Error::EmptyNodeName);
        }

        Ok(())
    }
}
