//! pggate, the write path between the SQL layer and distributed storage.

use clap::Parser;
use pggate::cli::{self, Commands};
use pggate::config;
use pggate::stats::{Registry, StatementMetrics, Webserver};
use tokio::runtime::Builder;
use tokio::signal::ctrl_c;
use tracing::{error, info};

use std::process::exit;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::Cli::parse();

    pggate::logger();

    if let Some(Commands::Configcheck { config }) = args.command {
        let path = config.unwrap_or(args.config);
        if let Err(e) = cli::config_check(path) {
            eprintln!("Configuration error: {}", e);
            exit(1);
        }

        println!("Configuration valid");
        exit(0);
    }

    info!("pggate v{}", env!("CARGO_PKG_VERSION"));
    let config = config::load(&args.config)?;

    let runtime = match config.general.workers {
        0 => {
            let mut binding = Builder::new_current_thread();
            binding.enable_all();
            binding
        }
        workers => {
            info!("spawning {} workers", workers);
            let mut builder = Builder::new_multi_thread();
            builder.worker_threads(workers).enable_all();
            builder
        }
    }
    .build()?;

    runtime.block_on(async move { pggate().await })?;

    Ok(())
}

async fn pggate() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::config();
    let registry = Registry::global();

    StatementMetrics::global().register(&registry, &config.metrics.node_name)?;

    // Metrics are optional: a bind failure is logged, not fatal.
    let server = match config.metrics.port {
        Some(port) => match Webserver::new(&config.metrics.listen_address, port)
            .with_registry(registry)
            .start()
            .await
        {
            Ok(server) => Some(server),
            Err(err) => {
                error!("{}", err);
                None
            }
        },
        None => None,
    };

    ctrl_c().await?;

    info!("pggate is shutting down");

    if let Some(server) = server {
        server.shutdown().await;
    }

    Ok(())
}
