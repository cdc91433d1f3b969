#![cfg(not(tarpaulin_include))]

use beta_portal::{Config, app};

/// Main entry point for the beta portal web server
///
/// Reads the configuration from the environment and serves the API and the
/// static front-end until the process is stopped.
///
/// # Environment
/// * `RUST_LOG` - Log filter, `info` when unset
/// * See [`Config::from_env`] for everything else
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    app::run(config).await?;
    Ok(())
}
