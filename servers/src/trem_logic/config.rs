use clap::Parser;
use lib_trem::TremConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "TREM earthquake early-warning client", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "TREM_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "TREM_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "TREM_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "TREM_LOG_JSON", help = "Write the log file as JSON lines.")]
    pub log_json: Option<bool>,

    #[clap(long, env = "TREM_PROVIDER", help = "Only adopt notifications from this author (e.g. cwa).")]
    pub provider: Option<String>,

    #[clap(long, env = "TREM_ACCESS_TOKEN", help = "ExpTech streaming token. Streaming is disabled without it.")]
    pub access_token: Option<String>,

    #[clap(long, env = "TREM_HTTP_NODE", help = "Pin the HTTP transport to a named node.")]
    pub http_node: Option<String>,

    #[clap(long, env = "TREM_HTTP_URL", help = "Pin the HTTP transport to a custom URL (fast polling).")]
    pub http_url: Option<String>,

    #[clap(long, env = "TREM_WS_NODE", help = "Pin the WebSocket transport to a named node.")]
    pub ws_node: Option<String>,

    #[clap(long, env = "TREM_WS_URL", help = "Pin the WebSocket transport to a custom URL.")]
    pub ws_url: Option<String>,

    #[clap(long, env = "TREM_BASE_INTERVAL_SECS", help = "Seconds between two polls.")]
    pub base_interval_secs: Option<u64>,

    #[clap(long, env = "TREM_STORE_DIR", help = "Directory for the persisted caches.")]
    pub store_dir: Option<PathBuf>,

    #[clap(long, help = "Start with this notification JSON file as a simulation.")]
    #[serde(skip)]
    pub simulate: Option<PathBuf>,
}

impl Config {
    // 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            log_json: other.log_json.or(self.log_json),
            provider: other.provider.or(self.provider),
            access_token: other.access_token.or(self.access_token),
            http_node: other.http_node.or(self.http_node),
            http_url: other.http_url.or(self.http_url),
            ws_node: other.ws_node.or(self.ws_node),
            ws_url: other.ws_url.or(self.ws_url),
            base_interval_secs: other.base_interval_secs.or(self.base_interval_secs),
            store_dir: other.store_dir.or(self.store_dir),
            simulate: other.simulate.or(self.simulate),
        }
    }

    /// Overlays the command-line settings onto a library configuration.
    pub fn apply_to(&self, mut trem: TremConfig) -> anyhow::Result<TremConfig> {
        if let Some(provider) = &self.provider {
            trem.provider = provider.clone();
        }
        if let Some(secs) = self.base_interval_secs {
            trem.base_interval_secs = secs;
        }
        if let Some(dir) = &self.store_dir {
            trem.store_dir = dir.clone();
        }
        trem.access_token = self.access_token.clone().or(trem.access_token);
        trem.http_node = self.http_node.clone().or(trem.http_node);
        trem.http_url = self.http_url.clone().or(trem.http_url);
        trem.ws_node = self.ws_node.clone().or(trem.ws_node);
        trem.ws_url = self.ws_url.clone().or(trem.ws_url);
        trem.validate()?;
        Ok(trem)
    }
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: Config,
    pub trem: TremConfig,
}

pub fn load_config() -> anyhow::Result<Settings> {
    // 1. Defaults
    let default_config = Config {
        log_dir: Some(PathBuf::from("./logs")),
        log_level: Some("info".to_string()),
        log_json: Some(false),
        ..Default::default()
    };

    // 2. Config file (server_trem.conf, or --config-path). It holds the
    //    library settings; the server-only keys are read from the same file.
    let cli = Config::parse();
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("server_trem.conf"));

    let mut current_config = default_config;
    let mut trem = TremConfig::default();

    if config_file_path.exists() {
        trem = TremConfig::from_file(&config_file_path)?;
        let raw = std::fs::read_to_string(&config_file_path)?;
        match serde_json::from_str::<Config>(&raw) {
            Ok(file_config) => current_config = current_config.merge(file_config),
            Err(e) => tracing::warn!(
                "Failed to parse server keys of {}: {}",
                config_file_path.display(),
                e
            ),
        }
    } else {
        tracing::info!(
            "Config file not found at {}. Using defaults and environment/CLI variables.",
            config_file_path.display()
        );
    }

    // 3. Environment variables and CLI arguments win
    current_config = current_config.merge(cli);

    // 4. Default store location
    if current_config.store_dir.is_none() && trem.store_dir == TremConfig::default().store_dir {
        if let Some(data_dir) = dirs::data_local_dir() {
            current_config.store_dir = Some(data_dir.join("trem"));
        } else {
            tracing::warn!("Could not determine the local data directory, keeping {}", trem.store_dir.display());
        }
    }

    let trem = current_config.apply_to(trem)?;
    Ok(Settings { server: current_config, trem })
}
