use std::time::Duration;

use anyhow::{bail, Result};
use lib_trem::loggers::{init_tracing, LoggerOptions};
use tracing::{error, info, warn};

mod trem_logic;
use trem_logic::{config, session};
use session::SessionExit;

/// Pause before rebuilding a session that asked for a reload.
const RELOAD_DELAY: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = config::load_config()?;
    let _guard = init_tracing(&LoggerOptions {
        app_name: "server_trem".to_string(),
        log_dir: settings.server.log_dir.clone(),
        level: settings.server.log_level.clone().unwrap_or_else(|| "info".to_string()),
        json: settings.server.log_json.unwrap_or(false),
        use_tty: true,
    })?;

    let mut simulation = settings
        .server
        .simulate
        .as_deref()
        .map(session::load_simulation)
        .transpose()?;

    loop {
        match session::run(&settings.trem, simulation.take()).await? {
            SessionExit::Shutdown => break,
            SessionExit::Reload(reason) => {
                warn!("Reloading session: {}", reason);
                tokio::select! {
                    _ = tokio::time::sleep(RELOAD_DELAY) => {}
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            SessionExit::Reauthenticate(reason) => {
                error!("Re-authentication required: {}", reason);
                bail!("the streaming access token was rejected ({reason}); update it and restart");
            }
        }
    }

    info!("Shutdown complete.");
    Ok(())
}
