//! Main entry point for the cowval demo.

use cowval_config::{apply_env_overrides, Config, ConfigLoader};
use cowval_demo::logging::init_logging;
use cowval_demo::{run_until, DemoResult, DemoSettings};
use std::env;
use tracing::{error, info};

#[tokio::main]
async fn main() -> DemoResult<()> {
    // Load configuration
    let config = load_config().await?;

    // Initialize tracing
    init_logging(&config.logging)?;

    info!(
        "Starting cowval demo, refresh every {}s",
        config.reloader.refresh_interval_secs
    );

    let summary = run_until(config, DemoSettings::default(), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    })
    .await?;

    info!(
        "Demo stopped: {} changes submitted, {} cycle errors, {} routes at revision {}",
        summary.submitted,
        summary.errors,
        summary.table.len(),
        summary.table.revision()
    );
    Ok(())
}

async fn load_config() -> DemoResult<Config> {
    let path = env::args().nth(1).or_else(|| env::var("COWVAL_CONFIG").ok());

    let config = match path {
        Some(path) => ConfigLoader::new(path).load().await?,
        None => {
            let mut config = Config::default();
            apply_env_overrides(&mut config)?;
            config.validate()?;
            config
        }
    };
    Ok(config)
}
