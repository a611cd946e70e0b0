//! Application settings.
//!
//! Read from `settings.toml` (optional, path overridable with `--config`),
//! then from `TALLY__<SECTION>__<KEY>` environment variables, then from the
//! command line flags.

use std::time::Duration;

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use engine::OpenAiConfig;
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "settings";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind: String,
    pub port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

const DEFAULT_SQLITE_PATH: &str = "./tally.db";

/// `memory` keeps the ledger only for the lifetime of the process.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Default for Database {
    fn default() -> Self {
        Self::Sqlite(DEFAULT_SQLITE_PATH.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    /// HMAC secret for bearer tokens, at least 32 bytes.
    pub secret: String,
    #[serde(default = "default_token_lifetime_hours")]
    pub token_lifetime_hours: i64,
}

fn default_token_lifetime_hours() -> i64 {
    24
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Llm {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for Llm {
    fn default() -> Self {
        let defaults = OpenAiConfig::default();
        Self {
            base_url: defaults.base_url,
            model: defaults.model,
            api_key: defaults.api_key,
            temperature: defaults.temperature,
            timeout_secs: defaults.timeout.as_secs(),
        }
    }
}

impl From<Llm> for OpenAiConfig {
    fn from(value: Llm) -> Self {
        Self {
            base_url: value.base_url,
            model: value.model,
            api_key: value.api_key,
            temperature: value.temperature,
            timeout: Duration::from_secs(value.timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub database: Database,
    pub auth: Auth,
    #[serde(default)]
    pub llm: Llm,
}

#[derive(Debug, Parser)]
#[command(name = "tally", version, about = "Personal ledger with text extraction")]
struct Args {
    /// Optional settings file path (TOML, extension may be omitted).
    #[arg(long)]
    config: Option<String>,
    /// Override the listen address.
    #[arg(long)]
    bind: Option<String>,
    /// Override the listen port.
    #[arg(long)]
    port: Option<u16>,
    /// Use this SQLite file instead of the configured database.
    #[arg(long)]
    sqlite: Option<String>,
    /// Override the log level.
    #[arg(long)]
    level: Option<String>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let args = Args::parse();

        let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
        let mut settings: Settings = Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix("TALLY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        if let Some(bind) = args.bind {
            settings.server.bind = bind;
        }
        if let Some(port) = args.port {
            settings.server.port = port;
        }
        if let Some(path) = args.sqlite {
            settings.database = Database::Sqlite(path);
        }
        if let Some(level) = args.level {
            settings.app.level = level;
        }

        Ok(settings)
    }
}
