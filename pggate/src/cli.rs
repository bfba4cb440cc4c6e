use std::fs::read_to_string;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::{self, Config};

/// pggate, the write path between the SQL layer and distributed storage.
#[derive(Parser, Debug)]
#[command(name = "", version)]
pub struct Cli {
    /// Path to the configuration file. Default: "pggate.toml"
    #[arg(short, long, default_value = "pggate.toml")]
    pub config: PathBuf,
    /// Subcommand.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run pggate.
    Run,

    /// Check configuration.
    Configcheck {
        /// Path to the configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Error)]
pub enum ConfigCheckError {
    #[error("I/O error on `{0}`: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("TOML parse error in `{0}`: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("invalid configuration in `{0}`: {1}")]
    Invalid(PathBuf, #[source] config::Error),
}

/// Confirm that the configuration file is valid.
///
/// Unlike loading, a missing file is an error here.
pub fn config_check(path: PathBuf) -> Result<Config, ConfigCheckError> {
    let contents = read_to_string(&path).map_err(|e| ConfigCheckError::Io(path.clone(), e))?;
    let config: Config =
        toml::from_str(&contents).map_err(|e| ConfigCheckError::Parse(path.clone(), e))?;
    config
        .check()
        .map_err(|e| ConfigCheckError::Invalid(path, e))?;

    Ok(config)
}
