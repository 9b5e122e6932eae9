//! Configuration for the dashboard.
//!
//! Resolved from, highest priority first:
//! 1. CLI arguments
//! 2. Environment variables (clap `env`, `.env` is loaded before parsing)
//! 3. TOML config file (`~/.config/taskflow/config.toml` unless `--config`)
//! 4. Compiled defaults
//!
//! A missing default config file is not an error; a missing `--config` path is.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::models::{Identity, RecordId};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    #[error("remote backend needs {0} (flag, environment or config file)")]
    MissingRemote(&'static str),

    #[error("no user identity configured; pass --user or set TASKFLOW_USER")]
    MissingIdentity,
}

/// Which record store the services talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Remote,
    Fixture,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub tasks: String,
    pub staff: String,
    pub tags: String,
}

impl Default for TableNames {
    fn default() -> Self {
        TableNames {
            tasks: "task_c".to_string(),
            staff: "staff_c".to_string(),
            tags: "tag_c".to_string(),
        }
    }
}

// TOML file structs, every field optional

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    backend: BackendFileConfig,
    tables: TablesFileConfig,
    identity: IdentityFileConfig,
    ui: UiFileConfig,
    fixture: FixtureFileConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BackendFileConfig {
    mode: Option<Backend>,
    instance_url: Option<String>,
    api_key: Option<String>,
    page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TablesFileConfig {
    tasks: Option<String>,
    staff: Option<String>,
    tags: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IdentityFileConfig {
    id: Option<RecordId>,
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UiFileConfig {
    debounce_ms: Option<u64>,
    toast_secs: Option<u64>,
    poll_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FixtureFileConfig {
    data_dir: Option<PathBuf>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Backend,
    pub instance_url: Option<String>,
    pub api_key: Option<String>,
    pub tables: TableNames,
    /// Fixed page size for list fetches.
    pub page_size: u32,
    pub identity: Identity,
    /// Where the fixture store mirrors its tables. `None` keeps them in memory.
    pub data_dir: Option<PathBuf>,
    pub debounce: Duration,
    pub toast_ttl: Duration,
    pub poll_timeout: Duration,
}

impl Config {
    pub const DEFAULT_PAGE_SIZE: u32 = 100;
    pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
    pub const DEFAULT_TOAST_SECS: u64 = 4;
    pub const DEFAULT_POLL_MS: u64 = 100;

    /// Load configuration by merging CLI args, env vars and the TOML file.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file, std::env::var("USER").ok())
    }

    /// Merge already-parsed sources. `login_name` is the fallback identity.
    fn resolve(
        cli: &CliArgs,
        file: &ConfigFile,
        login_name: Option<String>,
    ) -> Result<Self, ConfigError> {
        let instance_url = cli
            .instance_url
            .clone()
            .or_else(|| file.backend.instance_url.clone());
        let api_key = cli.api_key.clone().or_else(|| file.backend.api_key.clone());

        let backend = cli.backend.or(file.backend.mode).unwrap_or(if instance_url.is_some() {
            Backend::Remote
        } else {
            Backend::Fixture
        });

        if backend == Backend::Remote {
            if instance_url.is_none() {
                return Err(ConfigError::MissingRemote("INSTANCE_URL"));
            }
            if api_key.is_none() {
                return Err(ConfigError::MissingRemote("API_KEY"));
            }
        }

        let name = cli
            .user
            .clone()
            .or_else(|| file.identity.name.clone())
            .or(login_name)
            .filter(|n| !n.trim().is_empty())
            .ok_or(ConfigError::MissingIdentity)?;
        let id = cli.user_id.or(file.identity.id).unwrap_or(0);

        let data_dir = if cli.no_mirror {
            None
        } else {
            cli.data_dir
                .clone()
                .or_else(|| file.fixture.data_dir.clone())
                .or_else(|| dirs::data_dir().map(|d| d.join("taskflow")))
        };

        let defaults = TableNames::default();
        let tables = TableNames {
            tasks: file.tables.tasks.clone().unwrap_or(defaults.tasks),
            staff: file.tables.staff.clone().unwrap_or(defaults.staff),
            tags: file.tables.tags.clone().unwrap_or(defaults.tags),
        };

        Ok(Config {
            backend,
            instance_url,
            api_key,
            tables,
            page_size: file.backend.page_size.unwrap_or(Self::DEFAULT_PAGE_SIZE),
            identity: Identity::new(id, name.trim()),
            data_dir,
            debounce: Duration::from_millis(
                file.ui.debounce_ms.unwrap_or(Self::DEFAULT_DEBOUNCE_MS),
            ),
            toast_ttl: Duration::from_secs(file.ui.toast_secs.unwrap_or(Self::DEFAULT_TOAST_SECS)),
            poll_timeout: Duration::from_millis(file.ui.poll_ms.unwrap_or(Self::DEFAULT_POLL_MS)),
        })
    }
}

fn load_config_file(explicit: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match dirs::config_dir() {
            Some(dir) => {
                let path = dir.join("taskflow").join("config.toml");
                if !path.exists() {
                    return Ok(ConfigFile::default());
                }
                path
            }
            None => return Ok(ConfigFile::default()),
        },
    };

    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadFile {
        path: path.clone(),
        source,
    })?;
    Ok(toml::from_str(&text)?)
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Terminal dashboard for tasks, staff and tags")]
pub struct CliArgs {
    /// Record store backend (defaults to remote when an instance URL is set).
    #[arg(long, value_enum, env = "TASKFLOW_BACKEND")]
    pub backend: Option<Backend>,

    /// Base URL of the record store.
    #[arg(long, env = "INSTANCE_URL")]
    pub instance_url: Option<String>,

    /// API key sent as a bearer token.
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Display name recorded on creates and updates.
    #[arg(long, env = "TASKFLOW_USER")]
    pub user: Option<String>,

    /// Record id of the acting user.
    #[arg(long, env = "TASKFLOW_USER_ID")]
    pub user_id: Option<RecordId>,

    /// Directory for the fixture backend's mirrored tables.
    #[arg(long, env = "TASKFLOW_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Keep fixture data in memory only.
    #[arg(long)]
    pub no_mirror: bool,

    /// Path to config file (default: `~/.config/taskflow/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (overridden by `RUST_LOG`).
    #[arg(long, default_value = "info", env = "TASKFLOW_LOG")]
    pub log_level: String,

    /// Log file path (default: `taskflow.log` in the system temp directory).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl CliArgs {
    /// `--log-file` if given, else `taskflow.log` under the system temp directory.
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("taskflow.log"))
    }
}
