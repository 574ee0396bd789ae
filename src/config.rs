use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Lifeline safety-alert server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "lifeline-server", version, about = "Lifeline safety-alert server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "LIFELINE_PORT", default_value = "8080")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "LIFELINE_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./lifeline.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "LIFELINE_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, keys)
    #[arg(long, env = "LIFELINE_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Push transport configuration (loaded from [push] section in TOML)
    #[arg(skip)]
    #[serde(default)]
    pub push: Option<PushConfig>,
}

/// Configuration for the browser/OS push transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Whether push delivery is attempted at all (default: true)
    #[serde(default = "default_push_enabled")]
    pub enabled: bool,

    /// Per-send timeout in seconds; a send exceeding this is treated
    /// as a transient failure (default: 8)
    #[serde(default = "default_push_timeout")]
    pub timeout_secs: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 8,
        }
    }
}

fn default_push_enabled() -> bool {
    true
}

fn default_push_timeout() -> u64 {
    8
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            config: "./lifeline.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            push: Some(PushConfig::default()),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (LIFELINE_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("LIFELINE_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Lifeline Safety-Alert Server Configuration
# Place this file at ./lifeline.toml or specify with --config <path>
# All settings can be overridden via environment variables (LIFELINE_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for SQLite database and JWT signing key
# data_dir = "./data"

# ---- Browser/OS Push Delivery ----
# [push]

# Whether push delivery is attempted at all (default: true)
# enabled = true

# Per-send timeout in seconds; a send exceeding this counts as a
# transient failure and the subscription is kept (default: 8)
# timeout_secs = 8
"#
    .to_string()
}
