//! Configuration.

pub mod error;
pub mod general;
pub mod metrics;

pub use error::Error;
pub use general::General;
pub use metrics::Metrics;

use std::fs::read_to_string;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

static CONFIG: Lazy<ArcSwap<Config>> = Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// Load the current configuration.
pub fn config() -> Arc<Config> {
    CONFIG.load().clone()
}

/// Load configuration from disk and make it current.
pub fn load(path: &Path) -> Result<Arc<Config>, Error> {
    let config = Config::load(path)?;
    set(config)
}

/// Replace the current configuration.
pub fn set(config: Config) -> Result<Arc<Config>, Error> {
    config.check()?;
    let config = Arc::new(config);
    CONFIG.store(config.clone());
    Ok(config)
}

/// pggate.toml
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: General,
    /// Metrics webserver.
    #[serde(default)]
    pub metrics: Metrics,
}

impl Config {
    /// Read configuration from a TOML file.
    ///
    /// A missing file is not an error: defaults are used instead.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let config = match read_to_string(path) {
            Ok(contents) => {
                let config: Config = toml::from_str(&contents)
                    .map_err(|err| Error::Parse(path.to_owned(), err))?;
                info!("loaded \"{}\"", path.display());
                config
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "\"{}\" doesn't exist, loading defaults instead",
                    path.display()
                );
                Config::default()
            }
            Err(err) => return Err(Error::Io(path.to_owned(), err)),
        };

        Ok(config)
    }

    /// Validate settings that serde can't.
    pub fn check(&self) -> Result<(), Error> {
        self.metrics.check()
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_parse_full() {
        let config: Config = toml::from_str(
            r#"
[general]
workers = 0
dispatch_timeout = 250
conditional_delete = true
openmetrics_namespace = "yb_"

[metrics]
listen_address = "127.0.0.1"
port = 13000
node_name = "ysql"
"#,
        )
        .unwrap();

        assert_eq!(config.general.workers, 0);
        assert_eq!(config.general.dispatch_timeout, 250);
        assert!(config.general.conditional_delete);
        assert_eq!(config.general.openmetrics_namespace.as_deref(), Some("yb_"));
        assert_eq!(config.metrics.port, Some(13000));
        assert_eq!(config.metrics.node_name, "ysql");
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_unknown_field() {
        let config = toml::from_str::<Config>("[general]\nno_such_setting = 1\n");
        assert!(config.is_err());
    }

    #[test]
    fn test_missing_file_defaults() {
        let config = Config::load(&PathBuf::from("/definitely/not/here/pggate.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_check_empty_node_name() {
        let mut config = Config::default();
        config.metrics.node_name = " ".into();
        assert!(matches!(config.check(), Err(Error::EmptyNodeName)));
    }
}
