use clap::{Parser, Subcommand};
use setcache_core::config::ENDPOINT_ENV;
use setcache_core::{CacheConfig, ConfigError};

mod commands;

use commands::run_command;

#[derive(Parser, Debug)]
#[command(name = "setcache", version)]
#[command(about = "Setcache CLI - guarded set operations against a Redis endpoint")]
struct Cli {
    /// Endpoint as host:port (overrides SETCACHE_REDIS_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the reference workflow: add, count, test, scan, pop, remove
    Demo {
        #[arg(long, default_value = "setcache:demo")]
        key: String,
    },
    /// Add members (each parsed as JSON, falling back to a string)
    Add { key: String, members: Vec<String> },
    /// Count members
    Card { key: String },
    /// Test membership of one value
    IsMember { key: String, member: String },
    /// List every member
    Members { key: String },
    /// Pop random members
    Pop {
        key: String,
        #[arg(long)]
        count: Option<usize>,
    },
    /// Remove members
    Remove { key: String, members: Vec<String> },
    /// Scan a full pass
    Scan {
        key: String,
        /// MATCH pattern
        #[arg(long)]
        pattern: Option<String>,
        /// COUNT hint per step
        #[arg(long)]
        count: Option<usize>,
    },
}

fn load_config(endpoint: Option<String>) -> Result<CacheConfig, ConfigError> {
    match endpoint {
        Some(endpoint) => {
            let config = CacheConfig::new(endpoint);
            config.validate()?;
            Ok(config)
        }
        None => CacheConfig::from_env(),
    }
}

#[tokio::main]
async fn main() {
    // Initialize JSON logging once.
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let env_filter = match "info".parse() {
        Ok(directive) => env_filter.add_directive(directive),
        Err(_) => env_filter,
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .json()
        .try_init();

    let cli = Cli::parse();

    let config = match load_config(cli.endpoint) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, env = ENDPOINT_ENV, "Invalid cache configuration");
            std::process::exit(1);
        }
    };

    let cache = setcache_redis::redis_set_cache(config);
    cache.connect().await;

    run_command(&cache, cli.command).await;

    let health = cache.health();
    tracing::info!(
        connected = health.connected,
        succeeded = health.metrics.succeeded,
        failed = health.metrics.failed,
        unavailable = health.metrics.unavailable,
        "Done"
    );
}
