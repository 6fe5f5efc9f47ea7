use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use sa_backend::DEFAULT_BASE_URL;

const USER_ID_FILE: &str = "user_id";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub user: UserConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Root URL of the chat backend.
    pub base_url: String,
    pub connect_timeout_secs: u64,
    /// Stop a streamed answer after this many seconds. Unset means no limit.
    pub stream_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_secs: 10,
            stream_timeout_secs: None,
        }
    }
}

impl ServerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn stream_timeout(&self) -> Option<Duration> {
        self.stream_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct UserConfig {
    /// Fixed user id. When unset, one is generated once and kept in the data directory.
    pub id: Option<String>,
    /// Custom data directory. Defaults to ~/.local/share/superagent/.
    pub data_dir: Option<String>,
}

impl UserConfig {
    /// Resolve the data directory, using the configured path or the XDG default.
    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(ref custom) = self.data_dir {
            return PathBuf::from(custom);
        }

        let base = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".local").join("share")
            });
        base.join("superagent")
    }

    /// The configured id, else the persisted one, else a fresh id that gets persisted.
    pub fn resolve_user_id(&self) -> io::Result<String> {
        if let Some(id) = self.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            return Ok(id.to_string());
        }
        load_or_create_user_id(&self.resolve_data_dir())
    }
}

fn load_or_create_user_id(data_dir: &Path) -> io::Result<String> {
    let path = data_dir.join(USER_ID_FILE);
    match std::fs::read_to_string(&path) {
        Ok(contents) if !contents.trim().is_empty() => return Ok(contents.trim().to_string()),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let id = generate_user_id();
    std::fs::create_dir_all(data_dir)?;
    std::fs::write(&path, format!("{id}\n"))?;
    tracing::debug!(path = %path.display(), "created user id");
    Ok(id)
}

/// `user_` followed by nine random lowercase alphanumerics.
pub fn generate_user_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("user_{}", &random[..9])
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive, e.g. `warn` or `sa_backend=debug`.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load the default config file. A missing file means defaults.
    pub fn load_or_default() -> Self {
        let path = config_path();
        match Self::load_from(&path) {
            Ok(cfg) => cfg,
            Err(ConfigError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Config::default()
            }
            Err(e) => {
                eprintln!("warning: {e}");
                Config::default()
            }
        }
    }

    /// Load a config file that must exist and parse.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("superagent").join("config.toml")
}
