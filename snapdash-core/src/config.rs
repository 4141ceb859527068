//! Configuration management for snapdash.
//!
//! Loads configuration from an optional TOML file with environment variable
//! overrides (`SNAPDASH__<SECTION>__<KEY>`), on top of built-in defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SNAPDASH";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub snapper: SnapperConfig,
    pub diff: DiffConfig,
    pub privilege: PrivilegeConfig,
    pub commands: CommandsConfig,
    pub sync: SyncConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP API binds to
    pub bind: String,

    /// HTTP/WebSocket port
    pub port: u16,

    /// Directory of a built web client to serve, if any
    pub ui_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapperConfig {
    /// Snapshot manager binary
    pub binary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Diff tool binary; its absence disables compare/diff features
    pub binary: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivilegeConfig {
    /// Command prefix used to gain root when not already running as root
    pub escalation: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Upper bound for any external call; 0 disables the bound
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    Dbus,
    Poll,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Where change notifications come from
    pub notifier: NotifierKind,

    /// Interval for the polling notifier
    pub poll_interval_secs: u64,

    /// Binary used to watch the system bus
    pub dbus_monitor: String,

    /// Bus interface whose signals mean "something changed"
    pub dbus_interface: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Full,
    Compact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output layout
    pub format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 9095,
            ui_dir: None,
        }
    }
}

impl Default for SnapperConfig {
    fn default() -> Self {
        Self {
            binary: "snapper".to_string(),
        }
    }
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("/usr/bin/sndiff"),
        }
    }
}

impl Default for PrivilegeConfig {
    fn default() -> Self {
        Self {
            escalation: vec!["sudo".to_string(), "-n".to_string()],
        }
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            notifier: NotifierKind::Dbus,
            poll_interval_secs: 30,
            dbus_monitor: "dbus-monitor".to_string(),
            dbus_interface: "org.opensuse.Snapper".to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
        }
    }
}

impl CommandsConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl Config {
    /// Load configuration from an optional TOML file plus environment overrides.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load configuration from a TOML file, ignoring the environment
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}
