use std::path::Path;

use anyhow::{Context, Result};
use lib_trem::core::{AcquisitionCoordinator, Dispatcher, HostEvent, JsonFileStore, OperationMode};
use lib_trem::ingestors::{ExpTechHttpClient, ExpTechWsClient};
use lib_trem::models::{CanonicalEew, NotificationRecord};
use lib_trem::TremConfig;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

type Session = AcquisitionCoordinator<ExpTechHttpClient, ExpTechWsClient, JsonFileStore>;

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionExit {
    /// Ctrl-C.
    Shutdown,
    /// Rebuild the session from scratch.
    Reload(String),
    /// The streaming token must be replaced before restarting.
    Reauthenticate(String),
}

/// Reads a notification JSON file to replay as a simulation.
pub fn load_simulation(path: &Path) -> Result<NotificationRecord> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading simulation file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing simulation file {}", path.display()))
}

/// One line describing the canonical record.
pub fn describe(eew: &CanonicalEew) -> String {
    let eq = &eew.record.eq;
    let max = eq.max.map(lib_trem::earthquake::intensity_label).unwrap_or_else(|| "-".into());
    format!(
        "[{:?}] {} M{:.1} depth {:.0}km {} max {} ({} regions)",
        eew.source,
        eew.record.id,
        eq.mag,
        eq.depth,
        eq.loc,
        max,
        eew.intensity.len()
    )
}

fn build(config: &TremConfig, dispatcher: &Dispatcher) -> Result<Session> {
    let http = ExpTechHttpClient::new(config)?;
    let ws = if config.streaming_enabled() {
        Some(ExpTechWsClient::new(config, dispatcher.clone())?)
    } else {
        info!("No access token configured, running on HTTP only");
        None
    };
    let store = JsonFileStore::new(&config.store_dir);
    Ok(AcquisitionCoordinator::new(config.clone(), http, ws, store, dispatcher.clone()))
}

/// Reacts to one host event. `Some` ends the session.
fn react(event: &HostEvent, session: &Session) -> Option<SessionExit> {
    match event {
        HostEvent::ReloadRequested { reason } => Some(SessionExit::Reload(reason.clone())),
        HostEvent::ReauthenticationRequired { reason } => Some(SessionExit::Reauthenticate(reason.clone())),
        HostEvent::ServerStatus(status) => {
            info!(
                "Server status: {} via {} (latency {}, unavailable {:?})",
                status.protocol,
                status.current_node.as_deref().unwrap_or("-"),
                status.latency.as_deref().unwrap_or("-"),
                status.unavailable
            );
            None
        }
        HostEvent::EarthquakeUpdated { .. }
        | HostEvent::SimulationChanged { .. }
        | HostEvent::ReportsRefreshed { .. } => {
            if let Some(eew) = session.load_eew_data(None) {
                info!("{}", describe(&eew));
            }
            None
        }
    }
}

/// Runs one session until it has to be rebuilt or the process is stopped.
pub async fn run(config: &TremConfig, simulation: Option<NotificationRecord>) -> Result<SessionExit> {
    let dispatcher = Dispatcher::default();
    let mut events = dispatcher.subscribe();
    let mut session = build(config, &dispatcher)?;

    // 1. Start up; a failed handshake already queued a reload event.
    if let Err(e) = session.initialize().await {
        warn!("Session start failed: {}", e);
    }
    if let Some(record) = simulation {
        session.simulate(Some(record)).await?;
    }

    loop {
        // 2. One tick
        match session.tick().await {
            OperationMode::Reinitializing => {
                session.shutdown().await?;
                return Ok(SessionExit::Reload("session reinitializing".into()));
            }
            OperationMode::Suspended => {
                session.shutdown().await?;
                return Ok(SessionExit::Reauthenticate("session suspended".into()));
            }
            _ => {}
        }

        // 3. Sleep, reacting to events and Ctrl-C meanwhile
        let sleep = tokio::time::sleep(session.update_interval());
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                _ = signal::ctrl_c() => {
                    info!("Ctrl-C received, initiating shutdown.");
                    session.shutdown().await?;
                    return Ok(SessionExit::Shutdown);
                }
                event = events.recv() => match event {
                    Ok(event) => {
                        if let Some(exit) = react(&event, &session) {
                            session.shutdown().await?;
                            return Ok(exit);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => warn!("Dropped {} host events", skipped),
                    Err(RecvError::Closed) => {
                        error!("Host event channel closed");
                        session.shutdown().await?;
                        return Ok(SessionExit::Shutdown);
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn simulation_file_is_a_notification() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"id": "sim-1", "author": "trem", "eq": {{"lat": 23.21, "lon": 120.4, "depth": 7.3, "mag": 4.9}}}}"#
        )
        .unwrap();

        let record = load_simulation(file.path()).unwrap();
        assert_eq!(record.id, "sim-1");
        assert_eq!(record.eq.mag, 4.9);
        assert!(load_simulation(Path::new("/nonexistent/sim.json")).is_err());
    }
}
