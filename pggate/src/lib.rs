//! pggate turns bound INSERT, UPDATE and DELETE statements into
//! write requests for a distributed storage tier.
//!
//! See [`gate`] for the statement lifecycle and [`storage`] for the
//! interface to the storage nodes.

pub mod cli;
pub mod config;
pub mod gate;
pub mod stats;
pub mod storage;
pub mod util;

use std::io::IsTerminal;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// Level defaults to INFO and can be changed with `RUST_LOG`.
/// Safe to call more than once.
pub fn logger() {
    let format = fmt::layer()
        .with_ansi(std::io::stderr().is_terminal())
        .with_file(false);
    #[cfg(not(debug_assertions))]
    let format = format.with_target(false);

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let _ = tracing_subscriber::registry()
        .with(format)
        .with(filter)
        .try_init();
}
