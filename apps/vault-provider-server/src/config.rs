use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::Level;
use vault_provider::VaultConfig;

/// Command line of the provider process. Flags override every other layer.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "vault-provider-server", version, about = "OCI Vault provider for the Secrets Store CSI driver")]
pub struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// gRPC endpoint, `unix:///path/to.sock`
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Socket file mode in octal, e.g. 0600
    #[arg(long, value_parser = parse_mode)]
    pub endpoint_permissions: Option<u32>,

    /// Port of the `/health` HTTP listener
    #[arg(long)]
    pub healthz_port: Option<u16>,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub print_config: bool,

    /// Raise console verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn parse_mode(value: &str) -> Result<u32, String> {
    let digits = value.strip_prefix("0o").unwrap_or(value);
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|mode| *mode <= 0o7777)
        .ok_or_else(|| format!("invalid octal file mode: {value}"))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_endpoint_permissions")]
    pub endpoint_permissions: u32,
    #[serde(default = "default_healthz_port")]
    pub healthz_port: u16,
    /// Upper bound for resolving one mount; unbounded when absent.
    #[serde(default)]
    pub mount_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            endpoint_permissions: default_endpoint_permissions(),
            healthz_port: default_healthz_port(),
            mount_timeout_secs: None,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn mount_timeout(&self) -> Option<Duration> {
        self.mount_timeout_secs.map(Duration::from_secs)
    }
}

fn default_endpoint() -> String {
    "unix:///opt/provider/sockets/oci.sock".to_owned()
}

fn default_endpoint_permissions() -> u32 {
    0o600
}

fn default_healthz_port() -> u16 {
    8098
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(
        default = "optional_level_serde::default",
        with = "optional_level_serde"
    )]
    pub console_level: Option<Level>,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub file: Option<LogFileConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_level: optional_level_serde::default(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

/// Size-rotated JSON log file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogFileConfig {
    pub path: PathBuf,
    #[serde(
        default = "optional_level_serde::default",
        with = "optional_level_serde"
    )]
    pub file_level: Option<Level>,
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
}

fn default_max_size_mb() -> u64 {
    100
}

fn default_max_backups() -> usize {
    3
}

// Levels are written as strings; "off" disables the sink.
mod optional_level_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::Level;

    #[allow(clippy::ref_option, clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S>(level: &Option<Level>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(level.map_or("off", |l| l.as_str()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Level>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.to_lowercase().as_str() {
            "trace" => Ok(Some(Level::TRACE)),
            "debug" => Ok(Some(Level::DEBUG)),
            "info" => Ok(Some(Level::INFO)),
            "warn" => Ok(Some(Level::WARN)),
            "error" => Ok(Some(Level::ERROR)),
            "off" | "none" => Ok(None),
            _ => Err(serde::de::Error::custom(format!("invalid level: {s}"))),
        }
    }

    #[allow(clippy::unnecessary_wraps)]
    pub fn default() -> Option<Level> {
        Some(Level::INFO)
    }
}

impl AppConfig {
    /// Layers defaults, the optional YAML file and `VAULT_PROVIDER__*` variables.
    ///
    /// `VAULT_PROVIDER__SERVER__HEALTHZ_PORT=9000` maps to `server.healthz_port`.
    ///
    /// # Errors
    /// Returns an error when the file does not exist or a layer does not
    /// deserialize into the configuration.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Yaml},
        };

        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = config_path {
            ensure!(
                path.is_file(),
                "config file does not exist: {}",
                path.to_string_lossy()
            );
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed("VAULT_PROVIDER__").split("__"))
            .extract()
            .with_context(|| "Failed to extract config from figment".to_owned())
    }

    /// Applies flags given on the command line.
    pub fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(endpoint) = &cli.endpoint {
            self.server.endpoint.clone_from(endpoint);
        }
        if let Some(mode) = cli.endpoint_permissions {
            self.server.endpoint_permissions = mode;
        }
        if let Some(port) = cli.healthz_port {
            self.server.healthz_port = port;
        }
        self.logging.console_level = match cli.verbose {
            0 => self.logging.console_level,
            1 => Some(Level::DEBUG),
            _ => Some(Level::TRACE),
        };
    }

    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self).context("Failed to serialize config to YAML")
    }
}
